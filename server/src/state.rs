use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
    pub ping_interval: Duration,
}

impl AppState {
    pub fn new(ping_interval: Duration) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::new())),
            ping_interval,
        }
    }
}
