use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use web_sys::{
    CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, ImageData,
    KeyboardEvent, MouseEvent, PointerEvent,
};

use inkroom_shared::{ClientMessage, Point, SessionError, StrokeStyle};

use crate::net::session_from_location;
use crate::reconnect::ReconnectState;
use crate::session::{ClientSession, Effect, Notice, RelayError};
use crate::ws::{Connection, WsEvent};

struct App {
    session: RefCell<ClientSession>,
    connection: RefCell<Option<Connection>>,
    link: Option<(String, Option<String>)>,
    ctx: CanvasRenderingContext2d,
    canvas: HtmlCanvasElement,
    status: Option<HtmlElement>,
    give_up_button: Option<HtmlElement>,
    drawing: Cell<bool>,
}

impl App {
    fn send(&self, message: &ClientMessage) {
        if let Some(connection) = self.connection.borrow().as_ref() {
            connection.send(message);
        }
    }

    fn connection_status(&self) -> ReconnectState {
        self.connection
            .borrow()
            .as_ref()
            .map_or(ReconnectState::Connecting, Connection::state)
    }

    /// Stops reconnecting for good; the canvas stays usable offline.
    fn give_up(&self) {
        if let Some(connection) = self.connection.borrow().as_ref() {
            connection.give_up();
        }
        self.show_status();
    }

    fn show_status(&self) {
        let status = self.connection_status();
        log::info!("connection status={status:?}");
        if let Some(element) = &self.status {
            element.set_text_content(Some(&status.to_string()));
        }
        if let Some(button) = &self.give_up_button {
            button.set_hidden(!status.is_retrying());
        }
    }

    fn dispatch(&self, result: Result<Option<ClientMessage>, RelayError>) {
        match result {
            Ok(Some(message)) => self.send(&message),
            Ok(None) => {}
            Err(err) => log::info!("local edit ignored: {err}"),
        }
        self.present();
    }

    fn handle_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(message) => self.send(&message),
                Effect::Notify(notice) => self.handle_notice(notice),
            }
        }
    }

    fn handle_notice(&self, notice: Notice) {
        log::debug!("notice {notice:?}");
        let reply = match (&notice, &self.link) {
            (Notice::Connected { .. }, Some((session_id, password))) => Some(
                self.session
                    .borrow_mut()
                    .join_session(session_id.clone(), password.clone()),
            ),
            (Notice::Connected { .. }, None) => {
                Some(self.session.borrow_mut().create_session(None, None))
            }
            (Notice::SessionError(SessionError::NoSuchSession), Some((session_id, password))) => {
                Some(
                    self.session
                        .borrow_mut()
                        .create_session(Some(session_id.clone()), password.clone()),
                )
            }
            _ => None,
        };
        if let Some(reply) = reply {
            self.send(&reply);
        }
    }

    fn present(&self) {
        let view = self.session.borrow().view();
        let (width, height) = (view.width(), view.height());
        if self.canvas.width() != width || self.canvas.height() != height {
            self.canvas.set_width(width);
            self.canvas.set_height(height);
        }
        match ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(view.pixels().data.as_slice()),
            width,
            height,
        ) {
            Ok(image) => {
                let _ = self.ctx.put_image_data(&image, 0.0, 0.0);
            }
            Err(err) => web_sys::console::error_2(&"present failed".into(), &err),
        }
    }
}

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

fn event_point(event: &PointerEvent) -> Point {
    Point::new(event.offset_x() as f32, event.offset_y() as f32)
}

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    let canvas: HtmlCanvasElement = get_element(&document, "canvas")?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("Missing 2d context"))?
        .dyn_into::<CanvasRenderingContext2d>()?;

    let app = Rc::new(App {
        session: RefCell::new(ClientSession::default()),
        connection: RefCell::new(None),
        link: session_from_location(&window),
        ctx,
        canvas: canvas.clone(),
        status: get_element(&document, "status").ok(),
        give_up_button: get_element(&document, "give-up").ok(),
        drawing: Cell::new(false),
    });
    app.present();

    let connection = {
        let app = app.clone();
        Connection::connect(&window, move |event| match event {
            WsEvent::Open { reconnected } => {
                log::info!("WS open reconnected={reconnected}");
                app.show_status();
            }
            WsEvent::Close { retrying } => {
                log::warn!("WS closed retrying={retrying}");
                app.show_status();
            }
            WsEvent::Error => web_sys::console::warn_1(&"WS error".into()),
            WsEvent::Message(message) => {
                let effects = app.session.borrow_mut().handle_server_message(message);
                app.handle_effects(effects);
                app.present();
            }
        })?
    };
    app.connection.replace(Some(connection));
    app.show_status();

    if let Some(button) = app.give_up_button.clone() {
        let app = app.clone();
        let onclick = Closure::<dyn FnMut(MouseEvent)>::new(move |_event: MouseEvent| {
            app.give_up();
        });
        button.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    {
        let app = app.clone();
        let onpointerdown = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            app.drawing.set(true);
            let result = app
                .session
                .borrow_mut()
                .begin_stroke(StrokeStyle::default(), event_point(&event));
            app.dispatch(result);
        });
        canvas.add_event_listener_with_callback(
            "pointerdown",
            onpointerdown.as_ref().unchecked_ref(),
        )?;
        onpointerdown.forget();
    }

    {
        let app = app.clone();
        let onpointermove = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if !app.drawing.get() {
                return;
            }
            let result = app.session.borrow_mut().extend_stroke(event_point(&event));
            app.dispatch(result);
        });
        canvas.add_event_listener_with_callback(
            "pointermove",
            onpointermove.as_ref().unchecked_ref(),
        )?;
        onpointermove.forget();
    }

    {
        let app = app.clone();
        let onpointerup = Closure::<dyn FnMut(PointerEvent)>::new(move |_event: PointerEvent| {
            if app.drawing.replace(false) {
                let result = app.session.borrow_mut().end_action();
                app.dispatch(result);
            }
        });
        canvas
            .add_event_listener_with_callback("pointerup", onpointerup.as_ref().unchecked_ref())?;
        onpointerup.forget();
    }

    {
        let app = app.clone();
        let onkeydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if !(event.ctrl_key() || event.meta_key()) {
                return;
            }
            let key = event.key().to_lowercase();
            let result = match (key.as_str(), event.shift_key()) {
                ("z", false) => app.session.borrow_mut().undo(),
                ("z", true) | ("y", _) => app.session.borrow_mut().redo(),
                _ => return,
            };
            event.prevent_default();
            app.dispatch(result);
        });
        window.add_event_listener_with_callback("keydown", onkeydown.as_ref().unchecked_ref())?;
        onkeydown.forget();
    }

    Ok(())
}
