use std::collections::HashMap;

use inkroom_shared::{
    is_valid_session_id, CanvasSnapshot, ClientId, MemberInfo, Point, RelayMessage,
    ServerMessage, SessionError, SessionId, MAX_ID_LEN,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

const SHORT_ID_LEN: usize = 8;

pub struct Connection {
    tx: Outbox,
    pub name: Option<String>,
    pub session: Option<SessionId>,
    pub receive_cursors: bool,
}

#[derive(Default)]
pub struct Session {
    pub password: Option<String>,
    pub members: Vec<ClientId>,
    /// Bootstrap snapshots still owed, as `(newcomer, provider)`.
    pub pending_canvas: Vec<(ClientId, ClientId)>,
}

impl Session {
    fn is_waiting(&self, member: &str) -> bool {
        self.pending_canvas
            .iter()
            .any(|(newcomer, _)| newcomer == member)
    }

    /// First member that already has a canvas to hand out.
    fn provider_for(&self, newcomer: &str) -> Option<ClientId> {
        self.members
            .iter()
            .find(|member| member.as_str() != newcomer && !self.is_waiting(member))
            .cloned()
    }
}

/// Connection identities and session membership. Holds no canvas data.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ClientId, Connection>,
    sessions: HashMap<SessionId, Session>,
}

pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..SHORT_ID_LEN].to_string()
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn send(&self, to: &str, message: ServerMessage) {
        if let Some(connection) = self.connections.get(to) {
            let _ = connection.tx.send(message);
        }
    }

    pub fn send_error(&self, to: &str, error: SessionError) {
        self.send(to, ServerMessage::Error(error));
    }

    /// Registers a new connection under a fresh id and welcomes it.
    pub fn connect(&mut self, tx: Outbox) -> ClientId {
        let mut id = short_id();
        while self.connections.contains_key(&id) {
            id = short_id();
        }
        self.connections.insert(
            id.clone(),
            Connection {
                tx,
                name: None,
                session: None,
                receive_cursors: true,
            },
        );
        self.send(
            &id,
            ServerMessage::Welcome {
                client_id: id.clone(),
            },
        );
        id
    }

    pub fn disconnect(&mut self, member: &str) {
        self.leave(member);
        self.connections.remove(member);
        log::info!(
            "disconnected conn={member} connections={} sessions={}",
            self.connections.len(),
            self.sessions.len()
        );
    }

    fn session_of(&self, member: &str) -> Option<&SessionId> {
        self.connections
            .get(member)
            .and_then(|connection| connection.session.as_ref())
    }

    fn fresh_session_id(&self) -> SessionId {
        let mut id = short_id();
        while self.sessions.contains_key(&id) {
            id = short_id();
        }
        id
    }

    pub fn create(
        &mut self,
        member: &str,
        session_id: Option<SessionId>,
        password: Option<String>,
    ) -> Result<SessionId, SessionError> {
        let session_id = match session_id {
            Some(id) if !is_valid_session_id(&id) => return Err(SessionError::InvalidSessionId),
            Some(id) if self.sessions.contains_key(&id) => {
                return Err(SessionError::AlreadyExists)
            }
            Some(id) => id,
            None => self.fresh_session_id(),
        };
        if !self.connections.contains_key(member) {
            return Err(SessionError::NotInSession);
        }
        self.leave(member);
        self.sessions.insert(
            session_id.clone(),
            Session {
                password,
                ..Session::default()
            },
        );
        log::info!("session created session={session_id} by={member}");
        self.add_member(member, &session_id);
        Ok(session_id)
    }

    /// Joins an existing session. A wrong or missing password answers with
    /// a challenge and leaves membership untouched.
    pub fn join(
        &mut self,
        member: &str,
        session_id: &str,
        password: Option<&str>,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(SessionError::NoSuchSession)?;
        if let Some(expected) = session.password.as_deref() {
            if password != Some(expected) {
                log::info!("password challenge session={session_id} conn={member}");
                self.send(
                    member,
                    ServerMessage::PasswordRequired {
                        session_id: session_id.to_string(),
                        incorrect: password.is_some(),
                    },
                );
                return Ok(());
            }
        }
        if self.session_of(member).map(String::as_str) == Some(session_id) {
            return Ok(());
        }
        self.leave(member);
        self.add_member(member, session_id);
        Ok(())
    }

    fn add_member(&mut self, member: &str, session_id: &str) {
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        let provider = session.provider_for(member);
        session.members.push(member.to_string());
        if let Some(provider) = &provider {
            session
                .pending_canvas
                .push((member.to_string(), provider.clone()));
        }
        let has_password = session.password.is_some();
        let others: Vec<ClientId> = session
            .members
            .iter()
            .filter(|other| other.as_str() != member)
            .cloned()
            .collect();
        if let Some(connection) = self.connections.get_mut(member) {
            connection.session = Some(session_id.to_string());
        }

        self.send(
            member,
            ServerMessage::SessionJoined {
                session_id: session_id.to_string(),
                members: self.roster(session_id),
                has_password,
                awaiting_canvas: provider.is_some(),
            },
        );
        let info = self.member_info(member);
        for other in &others {
            self.send(
                other,
                ServerMessage::MemberJoined {
                    member: info.clone(),
                },
            );
        }
        if let Some(provider) = provider {
            self.send(
                &provider,
                ServerMessage::RequestCanvas {
                    for_client: member.to_string(),
                },
            );
        }
        log::info!(
            "joined session={session_id} conn={member} members={}",
            others.len() + 1
        );
    }

    fn member_info(&self, member: &str) -> MemberInfo {
        MemberInfo {
            client_id: member.to_string(),
            name: self
                .connections
                .get(member)
                .and_then(|connection| connection.name.clone()),
        }
    }

    fn roster(&self, session_id: &str) -> Vec<MemberInfo> {
        self.sessions
            .get(session_id)
            .map(|session| {
                session
                    .members
                    .iter()
                    .map(|member| self.member_info(member))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes `member` from its session, re-routing any snapshot it still
    /// owed, and deletes the session once it is empty.
    pub fn leave(&mut self, member: &str) -> Option<SessionId> {
        let session_id = self
            .connections
            .get_mut(member)
            .and_then(|connection| connection.session.take())?;
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Some(session_id);
        };
        session.members.retain(|other| other != member);
        session
            .pending_canvas
            .retain(|(newcomer, _)| newcomer != member);

        let orphaned: Vec<ClientId> = session
            .pending_canvas
            .iter()
            .filter(|(_, provider)| provider == member)
            .map(|(newcomer, _)| newcomer.clone())
            .collect();
        session
            .pending_canvas
            .retain(|(_, provider)| provider != member);
        let mut requests = Vec::new();
        let mut stranded = Vec::new();
        for newcomer in orphaned {
            match session.provider_for(&newcomer) {
                Some(provider) => {
                    session
                        .pending_canvas
                        .push((newcomer.clone(), provider.clone()));
                    requests.push((provider, newcomer));
                }
                None => stranded.push(newcomer),
            }
        }
        let remaining = session.members.clone();
        let has_password = session.password.is_some();

        self.send(member, ServerMessage::SessionLeft);
        if remaining.is_empty() {
            self.sessions.remove(&session_id);
            log::info!("session closed session={session_id}");
            return Some(session_id);
        }
        for other in &remaining {
            self.send(
                other,
                ServerMessage::MemberLeft {
                    client_id: member.to_string(),
                },
            );
        }
        for (provider, newcomer) in requests {
            log::info!("canvas re-requested session={session_id} from={provider} for={newcomer}");
            self.send(
                &provider,
                ServerMessage::RequestCanvas {
                    for_client: newcomer,
                },
            );
        }
        // Nobody left to copy from: start from the newcomer's own canvas.
        for newcomer in stranded {
            self.send(
                &newcomer,
                ServerMessage::SessionJoined {
                    session_id: session_id.clone(),
                    members: self.roster(&session_id),
                    has_password,
                    awaiting_canvas: false,
                },
            );
        }
        log::info!(
            "left session={session_id} conn={member} members={}",
            remaining.len()
        );
        Some(session_id)
    }

    /// Routes a bootstrap snapshot to the newcomer that is waiting for it
    /// from `from`. Anything else is dropped.
    pub fn forward_canvas(
        &mut self,
        from: &str,
        to: &str,
        snapshot: CanvasSnapshot,
    ) -> Result<(), SessionError> {
        let session_id = self
            .session_of(from)
            .cloned()
            .ok_or(SessionError::NotInSession)?;
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Err(SessionError::NotInSession);
        };
        let Some(index) = session
            .pending_canvas
            .iter()
            .position(|(newcomer, provider)| newcomer == to && provider == from)
        else {
            log::warn!("unrequested canvas session={session_id} from={from} to={to}");
            return Ok(());
        };
        session.pending_canvas.remove(index);
        log::info!(
            "canvas forwarded session={session_id} from={from} to={to} entries={}",
            snapshot.history.len()
        );
        self.send(
            to,
            ServerMessage::CanvasResponse {
                from: from.to_string(),
                snapshot,
            },
        );
        Ok(())
    }

    /// Sends `message` to every member of `session_id` except `except` for
    /// which `filter` holds.
    pub fn broadcast(
        &self,
        session_id: &str,
        message: &ServerMessage,
        except: Option<&str>,
        filter: impl Fn(&Connection) -> bool,
    ) {
        let Some(session) = self.sessions.get(session_id) else {
            return;
        };
        for member in &session.members {
            if Some(member.as_str()) == except {
                continue;
            }
            if let Some(connection) = self.connections.get(member) {
                if filter(connection) {
                    let _ = connection.tx.send(message.clone());
                }
            }
        }
    }

    pub fn relay(&self, member: &str, message: RelayMessage) -> Result<(), SessionError> {
        let session_id = self.session_of(member).ok_or(SessionError::NotInSession)?;
        self.broadcast(
            session_id,
            &ServerMessage::Relayed {
                from: member.to_string(),
                message,
            },
            Some(member),
            |_| true,
        );
        Ok(())
    }

    pub fn chat(
        &self,
        member: &str,
        text: String,
        to: Option<&str>,
    ) -> Result<(), SessionError> {
        let session_id = self.session_of(member).ok_or(SessionError::NotInSession)?;
        match to {
            Some(recipient) => {
                if self.session_of(recipient) == Some(session_id) {
                    self.send(
                        recipient,
                        ServerMessage::Chat {
                            from: member.to_string(),
                            text,
                            direct: true,
                        },
                    );
                }
            }
            None => self.broadcast(
                session_id,
                &ServerMessage::Chat {
                    from: member.to_string(),
                    text,
                    direct: false,
                },
                Some(member),
                |_| true,
            ),
        }
        Ok(())
    }

    pub fn cursor(&self, member: &str, point: Point) {
        if let Some(session_id) = self.session_of(member) {
            self.broadcast(
                session_id,
                &ServerMessage::Cursor {
                    from: member.to_string(),
                    point,
                },
                Some(member),
                |connection| connection.receive_cursors,
            );
        }
    }

    pub fn set_cursor_updates(&mut self, member: &str, enabled: bool) {
        if let Some(connection) = self.connections.get_mut(member) {
            connection.receive_cursors = enabled;
        }
    }

    /// Re-keys the member's session. Fails with no side effects when the
    /// new id is taken.
    pub fn rename_session(&mut self, member: &str, new_id: SessionId) -> Result<(), SessionError> {
        let old_id = self
            .session_of(member)
            .cloned()
            .ok_or(SessionError::NotInSession)?;
        if !is_valid_session_id(&new_id) {
            return Err(SessionError::InvalidSessionId);
        }
        if new_id == old_id {
            return Ok(());
        }
        if self.sessions.contains_key(&new_id) {
            return Err(SessionError::IdTaken);
        }
        let Some(session) = self.sessions.remove(&old_id) else {
            return Err(SessionError::NotInSession);
        };
        for other in &session.members {
            if let Some(connection) = self.connections.get_mut(other) {
                connection.session = Some(new_id.clone());
            }
        }
        self.sessions.insert(new_id.clone(), session);
        log::info!("session renamed from={old_id} to={new_id}");
        self.broadcast(
            &new_id,
            &ServerMessage::SessionRenamed {
                session_id: new_id.clone(),
            },
            None,
            |_| true,
        );
        Ok(())
    }

    pub fn set_password(
        &mut self,
        member: &str,
        password: Option<String>,
    ) -> Result<(), SessionError> {
        let session_id = self
            .session_of(member)
            .cloned()
            .ok_or(SessionError::NotInSession)?;
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Err(SessionError::NotInSession);
        };
        session.password = password;
        let has_password = session.password.is_some();
        self.broadcast(
            &session_id,
            &ServerMessage::PasswordChanged { has_password },
            None,
            |_| true,
        );
        Ok(())
    }

    pub fn set_name(&mut self, member: &str, name: Option<String>) {
        let Some(connection) = self.connections.get_mut(member) else {
            return;
        };
        connection.name = name.clone();
        if let Some(session_id) = connection.session.clone() {
            self.broadcast(
                &session_id,
                &ServerMessage::MemberRenamed {
                    client_id: member.to_string(),
                    name,
                },
                None,
                |_| true,
            );
        }
    }

    /// Restores a remembered identity on a fresh connection `conn`. Returns
    /// the id the connection ends up with.
    pub fn reconnect(
        &mut self,
        conn: &str,
        old_id: ClientId,
        name: Option<String>,
        session_id: Option<SessionId>,
        password: Option<String>,
    ) -> ClientId {
        let restored = old_id == conn
            || (!old_id.is_empty()
                && old_id.len() <= MAX_ID_LEN
                && !self.connections.contains_key(&old_id)
                && self.connections.contains_key(conn));
        let id = if restored && old_id != conn {
            self.leave(conn);
            if let Some(connection) = self.connections.remove(conn) {
                self.connections.insert(old_id.clone(), connection);
            }
            old_id
        } else if restored {
            old_id
        } else {
            conn.to_string()
        };
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.name = name;
        }
        log::info!("reconnect conn={conn} id={id} restored={restored}");
        self.send(
            &id,
            ServerMessage::Reconnected {
                client_id: id.clone(),
                restored,
            },
        );

        if let Some(session_id) = session_id {
            let result = if self.sessions.contains_key(&session_id) {
                self.join(&id, &session_id, password.as_deref())
            } else {
                self.create(&id, Some(session_id), password).map(|_| ())
            };
            if let Err(error) = result {
                self.send_error(&id, error);
            }
        }
        id
    }
}
