mod app;
pub mod fill;
pub mod history;
pub mod members;
mod net;
pub mod persistence;
pub mod raster;
pub mod reconnect;
pub mod render;
pub mod selection;
pub mod session;
mod ws;

pub use app::run;
pub use session::{ClientSession, Effect, Notice, RelayError};
