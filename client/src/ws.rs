use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket, Window};

use inkroom_shared::{decode_message, encode_message, ClientMessage, ServerMessage};

use crate::net::websocket_url;
use crate::reconnect::{ReconnectState, Reconnector};

#[derive(Debug)]
pub enum WsEvent {
    /// `reconnected` is true when this open follows a dropped connection.
    Open { reconnected: bool },
    /// `retrying` is false once the user gave up.
    Close { retrying: bool },
    Error,
    Message(ServerMessage),
}

type Handler = Rc<RefCell<dyn FnMut(WsEvent)>>;

struct Inner {
    window: Window,
    url: String,
    socket: RefCell<Option<WebSocket>>,
    reconnector: RefCell<Reconnector>,
    on_event: Handler,
}

/// A WebSocket that reopens itself after a drop until `give_up` is called.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<Inner>,
}

impl Connection {
    pub fn connect(
        window: &Window,
        on_event: impl 'static + FnMut(WsEvent),
    ) -> Result<Connection, JsValue> {
        let inner = Rc::new(Inner {
            window: window.clone(),
            url: websocket_url(window)?,
            socket: RefCell::new(None),
            reconnector: RefCell::new(Reconnector::new()),
            on_event: Rc::new(RefCell::new(on_event)),
        });
        open_socket(&inner)?;

        {
            let connection = Connection {
                inner: inner.clone(),
            };
            let onbeforeunload = Closure::<dyn FnMut(Event)>::new(move |_| connection.give_up());
            window.add_event_listener_with_callback(
                "beforeunload",
                onbeforeunload.as_ref().unchecked_ref(),
            )?;
            onbeforeunload.forget();
        }

        Ok(Connection { inner })
    }

    pub fn state(&self) -> ReconnectState {
        self.inner.reconnector.borrow().state()
    }

    pub fn send(&self, message: &ClientMessage) {
        let socket = self.inner.socket.borrow();
        let Some(socket) = socket.as_ref().filter(|socket| socket.ready_state() == WebSocket::OPEN)
        else {
            return;
        };
        match encode_message(message) {
            Ok(payload) => {
                let _ = socket.send_with_u8_array(&payload);
            }
            Err(error) => web_sys::console::error_1(
                &format!("WS encode error kind={} error={error}", message.kind()).into(),
            ),
        }
    }

    /// Stops reconnecting and closes the socket.
    pub fn give_up(&self) {
        self.inner.reconnector.borrow_mut().give_up();
        if let Some(socket) = self.inner.socket.borrow().as_ref() {
            let _ = socket.close();
        }
    }
}

fn emit(inner: &Inner, event: WsEvent) {
    let handler = inner.on_event.clone();
    let mut handler = handler.borrow_mut();
    (*handler)(event);
}

fn open_socket(inner: &Rc<Inner>) -> Result<(), JsValue> {
    web_sys::console::log_1(&format!("WS connecting url={}", inner.url).into());
    let socket = WebSocket::new(&inner.url)?;
    let _ = Reflect::set(
        socket.as_ref(),
        &JsValue::from_str("binaryType"),
        &JsValue::from_str("arraybuffer"),
    );

    {
        let inner_cb = inner.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
            let reconnected = inner_cb.reconnector.borrow_mut().on_connected();
            emit(&inner_cb, WsEvent::Open { reconnected });
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }

    {
        let inner_cb = inner.clone();
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
            web_sys::console::warn_1(
                &format!("WS closed code={} reason={:?}", event.code(), event.reason()).into(),
            );
            let delay = inner_cb.reconnector.borrow_mut().on_disconnect();
            emit(
                &inner_cb,
                WsEvent::Close {
                    retrying: delay.is_some(),
                },
            );
            if let Some(delay) = delay {
                schedule_reconnect(&inner_cb, delay.as_millis() as i32);
            }
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    {
        let inner_cb = inner.clone();
        let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
            emit(&inner_cb, WsEvent::Error);
        });
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    {
        let inner_cb = inner.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let message = if let Ok(buffer) = event.data().dyn_into::<js_sys::ArrayBuffer>() {
                let bytes = Uint8Array::new(&buffer).to_vec();
                match decode_message::<ServerMessage>(&bytes) {
                    Ok(message) => message,
                    Err(error) => {
                        web_sys::console::error_1(
                            &format!("WS message bincode parse error: {error}").into(),
                        );
                        return;
                    }
                }
            } else if let Some(text) = event.data().as_string() {
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => message,
                    Err(error) => {
                        let snippet: String = text.chars().take(200).collect();
                        web_sys::console::error_1(
                            &format!("WS message JSON parse error: {error} payload={snippet:?}")
                                .into(),
                        );
                        return;
                    }
                }
            } else {
                web_sys::console::error_2(
                    &"WS message data is not a string or arraybuffer".into(),
                    &event.data(),
                );
                return;
            };
            emit(&inner_cb, WsEvent::Message(message));
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    inner.socket.replace(Some(socket));
    Ok(())
}

fn schedule_reconnect(inner: &Rc<Inner>, delay_ms: i32) {
    let inner_cb = inner.clone();
    let retry = Closure::once_into_js(move || {
        if inner_cb.reconnector.borrow().state() == ReconnectState::GaveUp {
            return;
        }
        if let Err(err) = open_socket(&inner_cb) {
            web_sys::console::error_2(&"WS reconnect failed".into(), &err);
            if let Some(delay) = inner_cb.reconnector.borrow_mut().on_disconnect() {
                schedule_reconnect(&inner_cb, delay.as_millis() as i32);
            }
        }
    });
    let _ = inner
        .window
        .set_timeout_with_callback_and_timeout_and_arguments_0(retry.unchecked_ref(), delay_ms);
}
