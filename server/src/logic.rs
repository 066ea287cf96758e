use inkroom_shared::{ClientId, ClientMessage, Point, MAX_CHAT_LEN, MAX_NAME_LEN};

use crate::registry::Registry;

pub const MAX_PASSWORD_LEN: usize = 128;

/// Applies one message from `sender`. Returns the sender's new id when a
/// reconnect re-keyed the connection.
pub fn apply_client_message(
    registry: &mut Registry,
    sender: &str,
    message: ClientMessage,
) -> Option<ClientId> {
    let result = match message {
        ClientMessage::CreateSession {
            session_id,
            password,
        } => registry
            .create(sender, session_id, sanitize_password(password))
            .map(|_| ()),
        ClientMessage::JoinSession {
            session_id,
            password,
        } => registry.join(sender, &session_id, password.as_deref()),
        ClientMessage::LeaveSession => {
            registry.leave(sender);
            Ok(())
        }
        ClientMessage::RenameSession { session_id } => registry.rename_session(sender, session_id),
        ClientMessage::SetPassword { password } => {
            registry.set_password(sender, sanitize_password(password))
        }
        ClientMessage::SetName { name } => {
            registry.set_name(sender, sanitize_name(name));
            Ok(())
        }
        ClientMessage::Reconnect {
            client_id,
            name,
            session_id,
            password,
        } => {
            return Some(registry.reconnect(
                sender,
                client_id,
                sanitize_name(name),
                session_id,
                sanitize_password(password),
            ));
        }
        ClientMessage::CanvasResponse { to, snapshot } => {
            registry.forward_canvas(sender, &to, snapshot)
        }
        ClientMessage::Chat { text, to } => match sanitize_chat(text) {
            Some(text) => registry.chat(sender, text, to.as_deref()),
            None => Ok(()),
        },
        ClientMessage::Cursor { point } => {
            if let Some(point) = normalize_point(point) {
                registry.cursor(sender, point);
            }
            Ok(())
        }
        ClientMessage::CursorUpdates { enabled } => {
            registry.set_cursor_updates(sender, enabled);
            Ok(())
        }
        ClientMessage::Relay(message) => registry.relay(sender, message),
    };
    if let Err(error) = result {
        log::info!("rejected conn={sender} error={error}");
        registry.send_error(sender, error);
    }
    None
}

pub fn sanitize_name(name: Option<String>) -> Option<String> {
    let name = name?;
    let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub fn sanitize_password(password: Option<String>) -> Option<String> {
    password
        .filter(|password| !password.is_empty())
        .map(|password| password.chars().take(MAX_PASSWORD_LEN).collect())
}

pub fn sanitize_chat(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_CHAT_LEN).collect())
}

pub fn normalize_point(point: Point) -> Option<Point> {
    if point.is_finite() {
        Some(point)
    } else {
        None
    }
}
