//! Client side of the session protocol.
//!
//! `ClientSession` is transport agnostic: server messages go in through
//! `handle_server_message`, and everything the caller has to do in response
//! comes back as a list of `Effect`s. Local edits are applied through the
//! same `apply_relay` path as edits relayed from other members, then handed
//! back as the message to send.

use inkroom_shared::{
    Action, BaseData, CanvasSnapshot, ClientId, ClientMessage, FillData, Handle, LineData,
    MemberAction, MemberInfo, PastActionKind, Point, Rect, RelayMessage, ResizeData, Rgba,
    SelectionData, ServerMessage, SessionError, SessionId, ShapeData, ShapeKind, ShapeStyle,
    StrokeData, StrokeStyle, MAX_CHAT_LEN, MAX_NAME_LEN, MAX_STROKE_WIDTH,
};

pub use inkroom_shared::MAX_CANVAS_SIDE;

use crate::history::{valid_base, valid_pixels, valid_size, History, HistoryError};
use crate::members::Members;
use crate::persistence::{self, LoadError};
use crate::raster::Surface;
use crate::selection::SelectionGeometry;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

/// Key of the local member before the server has assigned an id.
const LOCAL_ID: &str = "";

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(ClientMessage),
    Notify(Notice),
}

/// Things the user interface may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Connected { client_id: ClientId },
    Reconnected { restored: bool },
    SessionJoined { session_id: SessionId },
    SessionLeft,
    MemberJoined { client_id: ClientId },
    MemberLeft { client_id: ClientId },
    MemberRenamed { client_id: ClientId },
    SessionRenamed { session_id: SessionId },
    PasswordChanged { has_password: bool },
    PasswordRequired { session_id: SessionId, incorrect: bool },
    SessionError(SessionError),
    CanvasLoading,
    CanvasReady,
    CanvasRejected(String),
    HistoryChanged,
    Chat { from: ClientId, text: String, direct: bool },
    Cursor { from: ClientId, point: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("no live action to update")]
    NoLiveAction,
    #[error("the live action is a different kind")]
    WrongAction,
    #[error("no active selection")]
    NoSelection,
    #[error("the selection holds no pixels")]
    EmptySelection,
    #[error("invalid canvas size or image")]
    InvalidCanvas,
    #[error(transparent)]
    History(#[from] HistoryError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub password: Option<String>,
    pub has_password: bool,
}

#[derive(Debug, Clone)]
pub struct ClientSession {
    client_id: Option<ClientId>,
    name: Option<String>,
    session: Option<SessionInfo>,
    /// Password sent with the last create/join, kept until it is accepted.
    pending_password: Option<String>,
    awaiting_canvas: bool,
    cursor_updates: bool,
    members: Members,
    history: History,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new(BaseData::blank(DEFAULT_WIDTH, DEFAULT_HEIGHT))
    }
}

impl ClientSession {
    pub fn new(base: BaseData) -> Self {
        let mut members = Members::new(base.width, base.height);
        members.insert(LOCAL_ID.to_string(), None);
        Self {
            client_id: None,
            name: None,
            session: None,
            pending_password: None,
            awaiting_canvas: false,
            cursor_updates: true,
            members,
            history: History::new(base),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|info| info.session_id.as_str())
    }

    pub fn is_awaiting_canvas(&self) -> bool {
        self.awaiting_canvas
    }

    pub fn receives_cursor_updates(&self) -> bool {
        self.cursor_updates
    }

    pub fn members(&self) -> &Members {
        &self.members
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The local member's live action.
    pub fn action(&self) -> &Action {
        self.members.action(self.me()).unwrap_or(&Action::None)
    }

    fn me(&self) -> &str {
        self.client_id.as_deref().unwrap_or(LOCAL_ID)
    }

    /// Committed canvas, live actions in action order, then selection
    /// overlays on top.
    pub fn view(&self) -> Surface {
        let mut view = self.members.compose(self.history.canvas());
        self.members.draw_overlays(&mut view);
        view
    }

    pub fn handle_server_message(&mut self, message: ServerMessage) -> Vec<Effect> {
        let mut effects = Vec::new();
        match message {
            ServerMessage::Welcome { client_id } => {
                if self.client_id.is_some() {
                    // The old id is kept until the server confirms or
                    // replaces it.
                    if let Some(reconnect) = self.reconnect_message() {
                        effects.push(Effect::Send(reconnect));
                    }
                } else {
                    self.adopt_id(client_id.clone());
                    effects.push(Effect::Notify(Notice::Connected { client_id }));
                }
            }
            ServerMessage::Reconnected {
                client_id,
                restored,
            } => {
                self.adopt_id(client_id);
                if !restored {
                    // The server rejoins us itself; the password must
                    // survive until its SessionJoined arrives.
                    self.pending_password = self
                        .pending_password
                        .take()
                        .or_else(|| self.session.as_ref().and_then(|info| info.password.clone()));
                    self.drop_session();
                }
                effects.push(Effect::Notify(Notice::Reconnected { restored }));
            }
            ServerMessage::SessionJoined {
                session_id,
                members,
                has_password,
                awaiting_canvas,
            } => {
                let password = self
                    .pending_password
                    .take()
                    .or_else(|| self.session.as_ref().and_then(|info| info.password.clone()))
                    .filter(|_| has_password);
                self.session = Some(SessionInfo {
                    session_id: session_id.clone(),
                    password,
                    has_password,
                });
                self.set_roster(members);
                self.awaiting_canvas = awaiting_canvas;
                effects.push(Effect::Notify(Notice::SessionJoined { session_id }));
                if awaiting_canvas {
                    effects.push(Effect::Notify(Notice::CanvasLoading));
                }
            }
            ServerMessage::SessionLeft => {
                self.drop_session();
                effects.push(Effect::Notify(Notice::SessionLeft));
            }
            ServerMessage::MemberJoined { member } => {
                let client_id = member.client_id.clone();
                if client_id != self.me() {
                    self.members.insert(member.client_id, member.name);
                    effects.push(Effect::Notify(Notice::MemberJoined { client_id }));
                }
            }
            ServerMessage::MemberLeft { client_id } => {
                if client_id != self.me() {
                    self.members.remove(&client_id);
                    effects.push(Effect::Notify(Notice::MemberLeft { client_id }));
                }
            }
            ServerMessage::MemberRenamed { client_id, name } => {
                if self.members.rename(&client_id, name) {
                    effects.push(Effect::Notify(Notice::MemberRenamed { client_id }));
                }
            }
            ServerMessage::SessionRenamed { session_id } => {
                if let Some(info) = self.session.as_mut() {
                    info.session_id = session_id.clone();
                    effects.push(Effect::Notify(Notice::SessionRenamed { session_id }));
                }
            }
            ServerMessage::PasswordChanged { has_password } => {
                if let Some(info) = self.session.as_mut() {
                    info.has_password = has_password;
                    if !has_password {
                        info.password = None;
                    }
                }
                effects.push(Effect::Notify(Notice::PasswordChanged { has_password }));
            }
            ServerMessage::PasswordRequired {
                session_id,
                incorrect,
            } => {
                self.pending_password = None;
                effects.push(Effect::Notify(Notice::PasswordRequired {
                    session_id,
                    incorrect,
                }));
            }
            ServerMessage::Error(error) => {
                log::warn!("session error: {error}");
                self.pending_password = None;
                effects.push(Effect::Notify(Notice::SessionError(error)));
            }
            ServerMessage::RequestCanvas { for_client } => {
                if self.awaiting_canvas {
                    log::warn!("canvas requested while still waiting for one, for={for_client}");
                }
                let snapshot = self.canvas_snapshot(&for_client);
                effects.push(Effect::Send(ClientMessage::CanvasResponse {
                    to: for_client,
                    snapshot,
                }));
            }
            ServerMessage::CanvasResponse { from, snapshot } => {
                if !self.awaiting_canvas {
                    log::debug!("ignoring unrequested canvas from={from}");
                    return effects;
                }
                self.awaiting_canvas = false;
                match self.apply_snapshot(snapshot) {
                    Ok(()) => {
                        effects.push(Effect::Notify(Notice::CanvasReady));
                        effects.push(Effect::Notify(Notice::HistoryChanged));
                    }
                    Err(err) => {
                        log::warn!("rejected canvas from={from}: {err}");
                        effects.push(Effect::Notify(Notice::CanvasRejected(err.to_string())));
                    }
                }
            }
            ServerMessage::Chat { from, text, direct } => {
                effects.push(Effect::Notify(Notice::Chat { from, text, direct }));
            }
            ServerMessage::Cursor { from, point } => {
                if self.cursor_updates {
                    effects.push(Effect::Notify(Notice::Cursor { from, point }));
                }
            }
            ServerMessage::Relayed { from, message } => {
                if self.awaiting_canvas {
                    log::debug!(
                        "dropping {} from={from} while waiting for canvas",
                        message.kind()
                    );
                    return effects;
                }
                if from == self.me() {
                    return effects;
                }
                let touches_history = changes_history(&message);
                match self.apply_relay(&from, &message) {
                    Ok(()) if touches_history => {
                        effects.push(Effect::Notify(Notice::HistoryChanged));
                    }
                    Ok(()) => {}
                    Err(err) => {
                        log::warn!("ignoring {} from={from}: {err}", message.kind());
                    }
                }
            }
        }
        effects
    }

    fn adopt_id(&mut self, client_id: ClientId) {
        let old = self.me().to_string();
        self.members.rekey(&old, client_id.clone());
        self.members.insert(client_id.clone(), self.name.clone());
        self.client_id = Some(client_id);
    }

    fn drop_session(&mut self) {
        self.session = None;
        self.awaiting_canvas = false;
        let me = self.me().to_string();
        let others: Vec<ClientId> = self.members.ids().filter(|id| **id != me).cloned().collect();
        for id in others {
            self.members.remove(&id);
        }
    }

    fn set_roster(&mut self, roster: Vec<MemberInfo>) {
        let me = self.me().to_string();
        let stale: Vec<ClientId> = self
            .members
            .ids()
            .filter(|id| **id != me && !roster.iter().any(|member| &member.client_id == *id))
            .cloned()
            .collect();
        for id in stale {
            self.members.remove(&id);
        }
        for member in roster {
            if member.client_id != me {
                self.members.insert(member.client_id, member.name);
            }
        }
    }

    /// Everything `for_client` needs to reproduce this canvas.
    pub fn canvas_snapshot(&self, for_client: &str) -> CanvasSnapshot {
        let (history, pos) = self.history.snapshot();
        let (actions, action_order) = self.members.snapshot_actions(for_client);
        CanvasSnapshot {
            history,
            cursor: pos as u32,
            actions,
            action_order,
        }
    }

    /// Replaces history and live actions with a peer's snapshot. The local
    /// member's own live action survives. Nothing changes on error.
    pub fn apply_snapshot(&mut self, snapshot: CanvasSnapshot) -> Result<(), HistoryError> {
        self.history
            .restore(snapshot.history, snapshot.cursor as usize)?;
        let me = self.me().to_string();
        let own = self.members.finish_action(&me);
        let actions = snapshot
            .actions
            .into_iter()
            .filter(|entry| entry.client_id != me)
            .map(|entry| MemberAction {
                action: sanitize_action(entry.action),
                ..entry
            })
            .collect();
        self.sync_canvas_size();
        self.members.restore_actions(actions, snapshot.action_order);
        if !own.is_none() {
            self.members.start_action(&me, own);
        }
        Ok(())
    }

    pub fn reconnect_message(&self) -> Option<ClientMessage> {
        let client_id = self.client_id.clone()?;
        Some(ClientMessage::Reconnect {
            client_id,
            name: self.name.clone(),
            session_id: self.session.as_ref().map(|info| info.session_id.clone()),
            password: self.session.as_ref().and_then(|info| info.password.clone()),
        })
    }

    fn sync_canvas_size(&mut self) {
        let canvas = self.history.canvas();
        let (width, height) = (canvas.width(), canvas.height());
        if self.members.width() != width || self.members.height() != height {
            self.members.resize_all(width, height);
        }
    }

    /// Applies one drawing message from `from` to the local state.
    pub fn apply_relay(&mut self, from: &str, message: &RelayMessage) -> Result<(), RelayError> {
        match message {
            RelayMessage::StrokeStart { style, point } => {
                self.members.start_action(
                    from,
                    Action::Stroke(StrokeData {
                        style: sanitize_stroke_style(*style),
                        points: vec![*point],
                    }),
                );
            }
            RelayMessage::StrokeAdd { point } => {
                if !self.members.extend_stroke(from, *point) {
                    return Err(self.live_action_error(from));
                }
            }
            RelayMessage::LineStart { style, point } => {
                self.members.start_action(
                    from,
                    Action::Line(LineData {
                        style: sanitize_stroke_style(*style),
                        from: *point,
                        to: *point,
                    }),
                );
            }
            RelayMessage::LineUpdate { point } => {
                self.update_live(from, |action| match action {
                    Action::Line(line) => {
                        line.to = *point;
                        true
                    }
                    _ => false,
                })?;
            }
            RelayMessage::ShapeStart { kind, style, point } => {
                let (x, y) = point.to_grid();
                let shape = ShapeData {
                    style: sanitize_shape_style(*style),
                    rect: Rect::new(x, y, 0, 0),
                };
                let action = match kind {
                    ShapeKind::Rect => Action::Rect(shape),
                    ShapeKind::Ellipse => Action::Ellipse(shape),
                };
                self.members.start_action(from, action);
            }
            RelayMessage::ShapeUpdate { point } => {
                self.update_live(from, |action| match action {
                    Action::Rect(shape) | Action::Ellipse(shape) => {
                        let (x, y) = point.to_grid();
                        shape.rect.width = x.saturating_sub(shape.rect.x);
                        shape.rect.height = y.saturating_sub(shape.rect.y);
                        shape.rect = shape.rect.clamped();
                        true
                    }
                    _ => false,
                })?;
            }
            RelayMessage::ActionEnd => self.end_live(from)?,
            RelayMessage::ActionCancel => {
                self.members.finish_action(from);
            }
            RelayMessage::Fill(fill) => {
                let mut fill = fill.clone();
                fill.opacity = sanitize_opacity(fill.opacity);
                self.history.append(PastActionKind::Fill(fill));
            }
            RelayMessage::Clear { color } => self.history.append(PastActionKind::Clear(*color)),
            RelayMessage::ClearBlank => self.history.append(PastActionKind::ClearBlank),
            RelayMessage::SelectionStart { point } => {
                let (x, y) = point.to_grid();
                self.members.start_action(
                    from,
                    Action::Selecting(SelectionData::new(Rect::new(x, y, 0, 0))),
                );
            }
            RelayMessage::SelectionMoveStart => {
                self.update_selection(from, |action| {
                    if let Some(mut selection) = action.selection().cloned() {
                        selection.normalize(None);
                        selection.old_rect = Some(selection.rect);
                        *action = Action::SelectionMove(selection);
                    }
                })?;
            }
            RelayMessage::SelectionResizeStart { handle } => {
                let handle = *handle;
                self.update_selection(from, |action| {
                    if let Some(mut selection) = action.selection().cloned() {
                        selection.normalize(None);
                        selection.old_rect = Some(selection.rect);
                        *action = Action::SelectionResize { selection, handle };
                    }
                })?;
            }
            RelayMessage::SelectionDrag { dx, dy } => {
                let (dx, dy) = (*dx, *dy);
                self.update_selection(from, |action| match action {
                    Action::Selecting(selection) => selection.resize(Handle::SouthEast, dx, dy),
                    Action::SelectionMove(selection) => selection.translate(dx, dy),
                    Action::SelectionResize { selection, handle } => {
                        selection.resize(*handle, dx, dy);
                        selection.normalize(Some(handle));
                    }
                    _ => {}
                })?;
            }
            RelayMessage::SelectionFlip { horizontal } => {
                let horizontal = *horizontal;
                self.update_selection(from, |action| {
                    if let Some(selection) = action.selection_mut() {
                        if horizontal {
                            selection.flip_x = !selection.flip_x;
                        } else {
                            selection.flip_y = !selection.flip_y;
                        }
                    }
                })?;
            }
            RelayMessage::SelectionCopy => {
                let canvas = self.history.canvas().clone();
                self.update_selection(from, |action| {
                    if let Some(selection) = action.selection_mut() {
                        selection.copy_from(&canvas);
                    }
                })?;
            }
            RelayMessage::SelectionCut { color } => {
                let canvas = self.history.canvas().clone();
                let mut clear = None;
                self.update_selection(from, |action| {
                    if let Some(selection) = action.selection_mut() {
                        clear = Some(selection.cut(&canvas, *color));
                    }
                })?;
                if let Some(clear) = clear {
                    self.history.append(PastActionKind::SelectionClear(clear));
                }
            }
            RelayMessage::SelectionPaste => {
                let selection = self.selection_of(from)?;
                let paste = selection.paste_data().ok_or(RelayError::EmptySelection)?;
                self.history.append(PastActionKind::SelectionPaste(paste));
            }
            RelayMessage::SelectionClear { color } => {
                let clear = self.selection_of(from)?.clear_data(*color);
                self.history.append(PastActionKind::SelectionClear(clear));
            }
            RelayMessage::SelectionRemove => {
                self.selection_of(from)?;
                self.members.finish_action(from);
            }
            RelayMessage::ImportCanvas(base) => {
                if !valid_base(base) {
                    return Err(RelayError::InvalidCanvas);
                }
                self.history.reset(base.clone());
            }
            RelayMessage::ResizeCanvas(size) => {
                if !valid_size(size.width, size.height) {
                    return Err(RelayError::InvalidCanvas);
                }
                self.history.append(PastActionKind::ResizeCanvas(*size));
            }
            RelayMessage::HistoryMove { target } => self.history.move_to(*target as usize)?,
            RelayMessage::HistoryToggle { index } => {
                self.history.toggle_action(*index as usize)?
            }
            RelayMessage::HistoryReorder { index, offset } => {
                self.history.move_action(*index as usize, *offset as i64)?
            }
            RelayMessage::LoadHistory { history, cursor } => {
                self.history.restore(history.clone(), *cursor as usize)?;
            }
        }
        self.sync_canvas_size();
        Ok(())
    }

    fn live_action_error(&self, from: &str) -> RelayError {
        match self.members.action(from) {
            None | Some(Action::None) => RelayError::NoLiveAction,
            Some(_) => RelayError::WrongAction,
        }
    }

    fn update_live(
        &mut self,
        from: &str,
        update: impl FnOnce(&mut Action) -> bool,
    ) -> Result<(), RelayError> {
        let mut applied = false;
        let found = self
            .members
            .update_action(from, |action| applied = update(action));
        match (found, applied) {
            (true, true) => Ok(()),
            (false, _) => Err(RelayError::NoLiveAction),
            (true, false) => Err(RelayError::WrongAction),
        }
    }

    fn update_selection(
        &mut self,
        from: &str,
        update: impl FnOnce(&mut Action),
    ) -> Result<(), RelayError> {
        self.selection_of(from)?;
        self.members.update_action(from, update);
        Ok(())
    }

    fn selection_of(&self, from: &str) -> Result<&SelectionData, RelayError> {
        self.members
            .action(from)
            .and_then(Action::selection)
            .ok_or(RelayError::NoSelection)
    }

    /// Drawing actions are committed; a selection stays active, normalised
    /// and back in its idle state.
    fn end_live(&mut self, from: &str) -> Result<(), RelayError> {
        let action = self.members.action(from).ok_or(RelayError::NoLiveAction)?;
        match action {
            Action::None => Err(RelayError::NoLiveAction),
            Action::Selecting(selection) if selection.payload.is_none() => {
                let mut selection = selection.clone();
                selection.normalize(None);
                if selection.rect.is_empty() {
                    self.members.finish_action(from);
                } else {
                    self.members
                        .update_action(from, |action| *action = Action::Selecting(selection));
                }
                Ok(())
            }
            Action::Selecting(_) | Action::SelectionMove(_) | Action::SelectionResize { .. } => {
                self.members.update_action(from, |action| {
                    if let Some(mut selection) = action.selection().cloned() {
                        selection.normalize(None);
                        selection.old_rect = None;
                        *action = Action::Selecting(selection);
                    }
                });
                Ok(())
            }
            _ => {
                let action = self.members.finish_action(from);
                if let Some(past) = action.to_past() {
                    self.history.append(past);
                }
                Ok(())
            }
        }
    }

    /// Applies a locally produced message and returns what to send. Nothing
    /// is sent outside a session.
    fn local(&mut self, message: RelayMessage) -> Result<Option<ClientMessage>, RelayError> {
        let me = self.me().to_string();
        self.apply_relay(&me, &message)?;
        Ok(self
            .session
            .is_some()
            .then_some(ClientMessage::Relay(message)))
    }

    pub fn begin_stroke(
        &mut self,
        style: StrokeStyle,
        point: Point,
    ) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::StrokeStart { style, point })
    }

    pub fn extend_stroke(&mut self, point: Point) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::StrokeAdd { point })
    }

    pub fn begin_line(
        &mut self,
        style: StrokeStyle,
        point: Point,
    ) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::LineStart { style, point })
    }

    pub fn update_line(&mut self, point: Point) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::LineUpdate { point })
    }

    pub fn begin_shape(
        &mut self,
        kind: ShapeKind,
        style: ShapeStyle,
        point: Point,
    ) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ShapeStart { kind, style, point })
    }

    pub fn update_shape(&mut self, point: Point) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ShapeUpdate { point })
    }

    pub fn end_action(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ActionEnd)
    }

    pub fn cancel_action(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ActionCancel)
    }

    pub fn fill(&mut self, fill: FillData) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::Fill(fill))
    }

    pub fn clear(&mut self, color: Rgba) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::Clear { color })
    }

    pub fn clear_blank(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ClearBlank)
    }

    pub fn select_start(&mut self, point: Point) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionStart { point })
    }

    /// Drags the free corner of a marquee to `point`.
    pub fn select_update(&mut self, point: Point) -> Result<Option<ClientMessage>, RelayError> {
        let Action::Selecting(selection) = self.action() else {
            return Err(RelayError::NoSelection);
        };
        let rect = selection.rect;
        let (x, y) = point.to_grid();
        self.selection_drag(x.saturating_sub(rect.right()), y.saturating_sub(rect.bottom()))
    }

    pub fn selection_move_start(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionMoveStart)
    }

    pub fn selection_resize_start(
        &mut self,
        handle: Handle,
    ) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionResizeStart { handle })
    }

    pub fn selection_drag(&mut self, dx: i32, dy: i32) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionDrag { dx, dy })
    }

    pub fn selection_flip(&mut self, horizontal: bool) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionFlip { horizontal })
    }

    pub fn selection_copy(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionCopy)
    }

    pub fn selection_cut(&mut self, color: Rgba) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionCut { color })
    }

    pub fn selection_paste(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionPaste)
    }

    pub fn selection_clear(&mut self, color: Rgba) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionClear { color })
    }

    pub fn selection_remove(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::SelectionRemove)
    }

    pub fn import_canvas(&mut self, base: BaseData) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ImportCanvas(base))
    }

    pub fn resize_canvas(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::ResizeCanvas(ResizeData { width, height }))
    }

    pub fn undo(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        let target = self
            .history
            .pos()
            .checked_sub(1)
            .ok_or(HistoryError::OutOfRange(-1))?;
        self.move_to(target)
    }

    pub fn redo(&mut self) -> Result<Option<ClientMessage>, RelayError> {
        self.move_to(self.history.pos() + 1)
    }

    pub fn move_to(&mut self, target: usize) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::HistoryMove {
            target: target as u32,
        })
    }

    pub fn toggle_action(&mut self, index: usize) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::HistoryToggle {
            index: index as u32,
        })
    }

    pub fn move_action(
        &mut self,
        index: usize,
        offset: i32,
    ) -> Result<Option<ClientMessage>, RelayError> {
        self.local(RelayMessage::HistoryReorder {
            index: index as u32,
            offset,
        })
    }

    pub fn save_file(&self) -> Vec<u8> {
        persistence::save(&self.history)
    }

    /// Opens a saved canvas and shares the loaded log with the session. A
    /// bad file leaves everything as it was.
    pub fn open_file(&mut self, bytes: &[u8]) -> Result<Option<ClientMessage>, LoadError> {
        persistence::open(&mut self.history, bytes)?;
        self.sync_canvas_size();
        let (history, pos) = self.history.snapshot();
        Ok(self.session.is_some().then(|| {
            ClientMessage::Relay(RelayMessage::LoadHistory {
                history,
                cursor: pos as u32,
            })
        }))
    }

    pub fn create_session(
        &mut self,
        session_id: Option<SessionId>,
        password: Option<String>,
    ) -> ClientMessage {
        let password = password.filter(|value| !value.is_empty());
        self.pending_password = password.clone();
        ClientMessage::CreateSession {
            session_id,
            password,
        }
    }

    pub fn join_session(
        &mut self,
        session_id: SessionId,
        password: Option<String>,
    ) -> ClientMessage {
        let password = password.filter(|value| !value.is_empty());
        self.pending_password = password.clone();
        ClientMessage::JoinSession {
            session_id,
            password,
        }
    }

    pub fn leave_session(&mut self) -> ClientMessage {
        ClientMessage::LeaveSession
    }

    pub fn rename_session(&mut self, session_id: SessionId) -> ClientMessage {
        ClientMessage::RenameSession { session_id }
    }

    pub fn set_password(&mut self, password: Option<String>) -> ClientMessage {
        let password = password.filter(|value| !value.is_empty());
        if let Some(info) = self.session.as_mut() {
            info.password = password.clone();
        }
        ClientMessage::SetPassword { password }
    }

    pub fn set_name(&mut self, name: Option<String>) -> ClientMessage {
        let name = name
            .map(|value| value.trim().chars().take(MAX_NAME_LEN).collect::<String>())
            .filter(|value| !value.is_empty());
        self.name = name.clone();
        let me = self.me().to_string();
        self.members.rename(&me, name.clone());
        ClientMessage::SetName { name }
    }

    pub fn send_chat(&self, text: &str, to: Option<ClientId>) -> Option<ClientMessage> {
        let text = text.trim();
        if text.is_empty() || self.session.is_none() {
            return None;
        }
        Some(ClientMessage::Chat {
            text: text.chars().take(MAX_CHAT_LEN).collect(),
            to,
        })
    }

    pub fn send_cursor(&self, point: Point) -> Option<ClientMessage> {
        (self.session.is_some() && point.is_finite()).then_some(ClientMessage::Cursor { point })
    }

    pub fn set_cursor_updates(&mut self, enabled: bool) -> ClientMessage {
        self.cursor_updates = enabled;
        ClientMessage::CursorUpdates { enabled }
    }
}

fn changes_history(message: &RelayMessage) -> bool {
    matches!(
        message,
        RelayMessage::ActionEnd
            | RelayMessage::Fill(_)
            | RelayMessage::Clear { .. }
            | RelayMessage::ClearBlank
            | RelayMessage::SelectionCut { .. }
            | RelayMessage::SelectionPaste
            | RelayMessage::SelectionClear { .. }
            | RelayMessage::ImportCanvas(_)
            | RelayMessage::ResizeCanvas(_)
            | RelayMessage::HistoryMove { .. }
            | RelayMessage::HistoryToggle { .. }
            | RelayMessage::HistoryReorder { .. }
            | RelayMessage::LoadHistory { .. }
    )
}

fn sanitize_opacity(opacity: f32) -> f32 {
    if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn sanitize_width(width: f32) -> f32 {
    if width.is_finite() {
        width.clamp(0.0, MAX_STROKE_WIDTH)
    } else {
        1.0
    }
}

pub fn sanitize_stroke_style(style: StrokeStyle) -> StrokeStyle {
    StrokeStyle {
        width: sanitize_width(style.width),
        opacity: sanitize_opacity(style.opacity),
        ..style
    }
}

pub fn sanitize_shape_style(style: ShapeStyle) -> ShapeStyle {
    ShapeStyle {
        width: sanitize_width(style.width),
        opacity: sanitize_opacity(style.opacity),
        ..style
    }
}

fn sanitize_shape(shape: ShapeData) -> ShapeData {
    ShapeData {
        style: sanitize_shape_style(shape.style),
        rect: shape.rect.clamped(),
    }
}

/// Brings a peer's live action back inside the limits every relay is held
/// to. Oversized clipboard payloads are dropped.
fn sanitize_action(action: Action) -> Action {
    match action {
        Action::Stroke(stroke) => Action::Stroke(StrokeData {
            style: sanitize_stroke_style(stroke.style),
            ..stroke
        }),
        Action::Line(line) => Action::Line(LineData {
            style: sanitize_stroke_style(line.style),
            ..line
        }),
        Action::Rect(shape) => Action::Rect(sanitize_shape(shape)),
        Action::Ellipse(shape) => Action::Ellipse(sanitize_shape(shape)),
        mut action => {
            if let Some(selection) = action.selection_mut() {
                selection.rect = selection.rect.clamped();
                selection.old_rect = selection.old_rect.map(|rect| rect.clamped());
                if !selection.payload.as_ref().map_or(true, valid_pixels) {
                    selection.payload = None;
                }
            }
            action
        }
    }
}

#[cfg(test)]
mod tests {
    use inkroom_shared::{BlendMode, FillChannel, PastAction, PasteData, PixelBuffer, MAX_COORD};

    use super::*;

    fn joined(id: &str, others: &[&str]) -> ClientSession {
        let mut session = ClientSession::new(BaseData::blank(32, 32));
        session.handle_server_message(ServerMessage::Welcome {
            client_id: id.into(),
        });
        let mut members = vec![MemberInfo {
            client_id: id.into(),
            name: None,
        }];
        members.extend(others.iter().map(|other| MemberInfo {
            client_id: other.to_string(),
            name: None,
        }));
        session.handle_server_message(ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members,
            has_password: false,
            awaiting_canvas: false,
        });
        session
    }

    fn style() -> StrokeStyle {
        StrokeStyle {
            color: Rgba::BLACK,
            width: 3.0,
            opacity: 1.0,
            blend: BlendMode::Normal,
        }
    }

    fn relayed(from: &str, message: RelayMessage) -> ServerMessage {
        ServerMessage::Relayed {
            from: from.into(),
            message,
        }
    }

    #[test]
    fn welcome_assigns_identity_and_rekeys_local_member() {
        let mut session = ClientSession::default();
        session.begin_stroke(style(), Point::new(1.0, 1.0)).unwrap();
        let effects = session.handle_server_message(ServerMessage::Welcome {
            client_id: "me".into(),
        });
        assert_eq!(
            effects,
            vec![Effect::Notify(Notice::Connected {
                client_id: "me".into()
            })]
        );
        assert_eq!(session.client_id(), Some("me"));
        assert!(matches!(session.action(), Action::Stroke(_)));
        assert_eq!(session.members().action_order(), &["me".to_string()]);
    }

    #[test]
    fn second_welcome_asks_to_reconnect() {
        let mut session = joined("me", &[]);
        session.set_name(Some("  Ada  ".into()));
        let effects = session.handle_server_message(ServerMessage::Welcome {
            client_id: "fresh".into(),
        });
        assert_eq!(
            effects,
            vec![Effect::Send(ClientMessage::Reconnect {
                client_id: "me".into(),
                name: Some("Ada".into()),
                session_id: Some("abcd".into()),
                password: None,
            })]
        );
        session.handle_server_message(ServerMessage::Reconnected {
            client_id: "me".into(),
            restored: true,
        });
        assert_eq!(session.client_id(), Some("me"));
        assert_eq!(session.session_id(), Some("abcd"));
    }

    #[test]
    fn failed_restore_takes_the_new_id() {
        let mut session = joined("me", &["other"]);
        session.handle_server_message(ServerMessage::Reconnected {
            client_id: "fresh".into(),
            restored: false,
        });
        assert_eq!(session.client_id(), Some("fresh"));
        assert!(session.session().is_none());
        assert_eq!(session.members().len(), 1);
    }

    #[test]
    fn local_edits_are_not_sent_outside_a_session() {
        let mut session = ClientSession::new(BaseData::blank(16, 16));
        assert_eq!(session.begin_stroke(style(), Point::new(2.0, 2.0)), Ok(None));
        assert_eq!(session.end_action(), Ok(None));
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn remote_stroke_commits_on_end() {
        let mut session = joined("me", &["other"]);
        session.handle_server_message(relayed(
            "other",
            RelayMessage::StrokeStart {
                style: style(),
                point: Point::new(2.0, 2.0),
            },
        ));
        session.handle_server_message(relayed(
            "other",
            RelayMessage::StrokeAdd {
                point: Point::new(20.0, 20.0),
            },
        ));
        assert_eq!(session.history().len(), 1);
        assert_ne!(session.view(), *session.history().canvas());

        let effects = session.handle_server_message(relayed("other", RelayMessage::ActionEnd));
        assert_eq!(effects, vec![Effect::Notify(Notice::HistoryChanged)]);
        assert_eq!(session.history().len(), 2);
        assert!(session.members().action_order().is_empty());
        assert_eq!(session.view(), *session.history().canvas());
    }

    #[test]
    fn malformed_relays_are_dropped_without_side_effects() {
        let mut session = joined("me", &["other"]);
        let before = session.history().snapshot();
        for message in [
            RelayMessage::StrokeAdd {
                point: Point::new(1.0, 1.0),
            },
            RelayMessage::ActionEnd,
            RelayMessage::HistoryMove { target: 99 },
            RelayMessage::HistoryToggle { index: 0 },
            RelayMessage::SelectionPaste,
            RelayMessage::ResizeCanvas(ResizeData {
                width: 0,
                height: 10,
            }),
            RelayMessage::ImportCanvas(BaseData::blank(MAX_CANVAS_SIDE + 1, 1)),
        ] {
            assert!(session.handle_server_message(relayed("other", message)).is_empty());
        }
        assert_eq!(session.history().snapshot(), before);
    }

    #[test]
    fn own_echo_is_ignored() {
        let mut session = joined("me", &[]);
        session.handle_server_message(relayed("me", RelayMessage::ClearBlank));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn request_canvas_excludes_newcomer() {
        let mut session = joined("me", &["other"]);
        session.begin_stroke(style(), Point::new(1.0, 1.0)).unwrap();
        session.handle_server_message(ServerMessage::MemberJoined {
            member: MemberInfo {
                client_id: "new".into(),
                name: None,
            },
        });
        let effects = session.handle_server_message(ServerMessage::RequestCanvas {
            for_client: "new".into(),
        });
        let [Effect::Send(ClientMessage::CanvasResponse { to, snapshot })] = effects.as_slice()
        else {
            panic!("expected a canvas response, got {effects:?}");
        };
        assert_eq!(to, "new");
        assert_eq!(snapshot.cursor, 0);
        assert_eq!(snapshot.action_order, vec!["me".to_string()]);
        assert_eq!(snapshot.actions.len(), 1);
    }

    #[test]
    fn waiting_member_drops_relays_until_snapshot() {
        let mut session = ClientSession::new(BaseData::blank(32, 32));
        session.handle_server_message(ServerMessage::Welcome {
            client_id: "new".into(),
        });
        let effects = session.handle_server_message(ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members: vec![],
            has_password: false,
            awaiting_canvas: true,
        });
        assert!(effects.contains(&Effect::Notify(Notice::CanvasLoading)));
        session.handle_server_message(relayed("host", RelayMessage::ClearBlank));
        assert_eq!(session.history().len(), 1);

        let mut host = History::new(BaseData::blank(20, 10));
        host.append(PastActionKind::Clear(Rgba::BLACK));
        let (history, _) = host.snapshot();
        let effects = session.handle_server_message(ServerMessage::CanvasResponse {
            from: "host".into(),
            snapshot: CanvasSnapshot {
                history,
                cursor: 1,
                actions: vec![MemberAction {
                    client_id: "host".into(),
                    action: Action::Selecting(SelectionData::new(Rect::new(1, 1, 4, 4))),
                }],
                action_order: vec!["host".into()],
            },
        });
        assert!(effects.contains(&Effect::Notify(Notice::CanvasReady)));
        assert!(!session.is_awaiting_canvas());
        assert_eq!(session.history().canvas(), host.canvas());
        assert_eq!(session.members().action_order(), &["host".to_string()]);
        assert!(session.members().contains("host"));
        assert_eq!(session.members().get("new").unwrap().surface().width(), 20);

        session.handle_server_message(relayed("host", RelayMessage::ClearBlank));
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn invalid_snapshot_keeps_local_canvas() {
        let mut session = joined("new", &[]);
        session.handle_server_message(ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members: vec![],
            has_password: false,
            awaiting_canvas: true,
        });
        let effects = session.handle_server_message(ServerMessage::CanvasResponse {
            from: "host".into(),
            snapshot: CanvasSnapshot {
                history: vec![],
                cursor: 0,
                actions: vec![],
                action_order: vec![],
            },
        });
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notice::CanvasRejected(_))]
        ));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn marquee_selection_is_normalised_on_end() {
        let mut session = joined("me", &[]);
        session.select_start(Point::new(10.0, 10.0)).unwrap();
        session.select_update(Point::new(4.0, 2.0)).unwrap();
        session.end_action().unwrap();
        let Action::Selecting(selection) = session.action() else {
            panic!("selection should stay active");
        };
        assert_eq!(selection.rect, Rect::new(4, 2, 6, 8));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn cut_and_paste_round_trip() {
        let mut session = joined("me", &[]);
        session.fill(FillData {
            x: 0,
            y: 0,
            color: Rgba::new(255, 0, 0, 255),
            opacity: 1.0,
            blend: BlendMode::Normal,
            threshold: 0,
            channel: FillChannel::Rgba,
        })
        .unwrap();
        session.select_start(Point::new(0.0, 0.0)).unwrap();
        session.selection_drag(4, 4).unwrap();
        session.end_action().unwrap();
        let sent = session.selection_cut(Rgba::WHITE).unwrap();
        assert_eq!(
            sent,
            Some(ClientMessage::Relay(RelayMessage::SelectionCut {
                color: Rgba::WHITE
            }))
        );
        assert_eq!(session.history().canvas().pixel(1, 1), Rgba::WHITE);

        session.selection_move_start().unwrap();
        session.selection_drag(10, 10).unwrap();
        session.end_action().unwrap();
        session.selection_paste().unwrap();
        let canvas = session.history().canvas();
        assert_eq!(canvas.pixel(11, 11), Rgba::new(255, 0, 0, 255));
        assert_eq!(canvas.pixel(1, 1), Rgba::WHITE);
        assert_eq!(session.history().len(), 4);
    }

    #[test]
    fn resize_handle_remaps_while_dragging() {
        let mut session = joined("me", &[]);
        session.select_start(Point::new(10.0, 10.0)).unwrap();
        session.selection_drag(10, 10).unwrap();
        session.end_action().unwrap();
        session.selection_resize_start(Handle::West).unwrap();
        session.selection_drag(15, 0).unwrap();
        let Action::SelectionResize { selection, handle } = session.action() else {
            panic!("expected a resize");
        };
        assert_eq!(*handle, Handle::East);
        assert_eq!(selection.rect, Rect::new(20, 10, 5, 10));
        assert_eq!(selection.old_rect, Some(Rect::new(10, 10, 10, 10)));
    }

    #[test]
    fn undo_and_redo_are_relayed() {
        let mut session = joined("me", &[]);
        session.clear(Rgba::BLACK).unwrap();
        assert_eq!(
            session.undo(),
            Ok(Some(ClientMessage::Relay(RelayMessage::HistoryMove {
                target: 0
            })))
        );
        assert_eq!(
            session.undo(),
            Err(RelayError::History(HistoryError::OutOfRange(-1)))
        );
        session.redo().unwrap();
        assert_eq!(session.history().pos(), 1);
        assert!(session.redo().is_err());
    }

    #[test]
    fn resize_keeps_member_surfaces_in_step() {
        let mut session = joined("me", &["other"]);
        session.resize_canvas(40, 12).unwrap();
        assert_eq!(session.members().get("other").unwrap().surface().width(), 40);
        session.undo().unwrap();
        assert_eq!(session.members().get("other").unwrap().surface().width(), 32);
    }

    #[test]
    fn opening_a_file_is_shared_and_bad_files_change_nothing() {
        let mut source = joined("me", &[]);
        source.clear(Rgba::BLACK).unwrap();
        let bytes = source.save_file();

        let mut session = joined("you", &[]);
        let before = session.history().snapshot();
        assert!(session.open_file(b"garbage").is_err());
        assert_eq!(session.history().snapshot(), before);

        let sent = session.open_file(&bytes).unwrap();
        assert!(matches!(
            sent,
            Some(ClientMessage::Relay(RelayMessage::LoadHistory { cursor: 1, .. }))
        ));
        assert_eq!(session.history().canvas(), source.history().canvas());
    }

    #[test]
    fn password_is_remembered_once_accepted() {
        let mut session = ClientSession::default();
        session.handle_server_message(ServerMessage::Welcome {
            client_id: "me".into(),
        });
        session.join_session("abcd".into(), Some("secret".into()));
        session.handle_server_message(ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members: vec![],
            has_password: true,
            awaiting_canvas: false,
        });
        assert_eq!(
            session.session().and_then(|info| info.password.as_deref()),
            Some("secret")
        );
        session.handle_server_message(ServerMessage::PasswordChanged {
            has_password: false,
        });
        assert_eq!(session.reconnect_message().and_then(|message| match message {
            ClientMessage::Reconnect { password, .. } => password,
            _ => None,
        }), None);
    }

    #[test]
    fn cursor_updates_can_be_muted() {
        let mut session = joined("me", &["other"]);
        let cursor = ServerMessage::Cursor {
            from: "other".into(),
            point: Point::new(1.0, 2.0),
        };
        assert_eq!(session.handle_server_message(cursor.clone()).len(), 1);
        assert_eq!(
            session.set_cursor_updates(false),
            ClientMessage::CursorUpdates { enabled: false }
        );
        assert!(session.handle_server_message(cursor).is_empty());
    }

    fn reconnect_password(session: &ClientSession) -> Option<String> {
        match session.reconnect_message()? {
            ClientMessage::Reconnect { password, .. } => password,
            _ => None,
        }
    }

    #[test]
    fn password_survives_a_reconnect_under_a_new_id() {
        let mut session = ClientSession::default();
        session.handle_server_message(ServerMessage::Welcome {
            client_id: "me".into(),
        });
        session.join_session("abcd".into(), Some("secret".into()));
        let joined = ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members: vec![],
            has_password: true,
            awaiting_canvas: false,
        };
        session.handle_server_message(joined.clone());

        session.handle_server_message(ServerMessage::Welcome {
            client_id: "fresh".into(),
        });
        session.handle_server_message(ServerMessage::Reconnected {
            client_id: "fresh".into(),
            restored: false,
        });
        assert!(session.session().is_none());
        session.handle_server_message(joined);
        assert_eq!(session.session_id(), Some("abcd"));
        assert_eq!(reconnect_password(&session).as_deref(), Some("secret"));
    }

    #[test]
    fn extreme_selection_drags_stay_bounded() {
        let mut session = joined("me", &["other"]);
        session.handle_server_message(relayed(
            "other",
            RelayMessage::SelectionStart {
                point: Point::new(10.0, 10.0),
            },
        ));
        for _ in 0..2 {
            session.handle_server_message(relayed(
                "other",
                RelayMessage::SelectionDrag {
                    dx: i32::MAX,
                    dy: i32::MAX,
                },
            ));
        }
        let selection = session.members().action("other").and_then(Action::selection);
        assert!(selection.is_some_and(|selection| selection.rect.is_bounded()));

        session.handle_server_message(relayed("other", RelayMessage::SelectionMoveStart));
        session.handle_server_message(relayed(
            "other",
            RelayMessage::SelectionDrag {
                dx: i32::MIN,
                dy: i32::MIN,
            },
        ));
        let selection = session.members().action("other").and_then(Action::selection);
        assert!(selection.is_some_and(|selection| selection.rect.is_bounded()));
        // The overlay is drawn for whatever ended up in range.
        assert_eq!(session.view().width(), 32);
    }

    #[test]
    fn shapes_from_far_off_points_are_pinned() {
        let mut session = joined("me", &["other"]);
        session.handle_server_message(relayed(
            "other",
            RelayMessage::ShapeStart {
                kind: ShapeKind::Rect,
                style: ShapeStyle::default(),
                point: Point::new(-3e9, 0.0),
            },
        ));
        session.handle_server_message(relayed(
            "other",
            RelayMessage::ShapeUpdate {
                point: Point::new(3e9, 5.0),
            },
        ));
        let Some(Action::Rect(shape)) = session.members().action("other") else {
            panic!("expected a live rect");
        };
        assert_eq!(shape.rect, Rect::new(-MAX_COORD, 0, 2 * MAX_COORD, 5));

        let effects = session.handle_server_message(relayed("other", RelayMessage::ActionEnd));
        assert_eq!(effects, vec![Effect::Notify(Notice::HistoryChanged)]);
        let (log, pos) = session.history().snapshot();
        assert!(crate::history::validate(&log, pos).is_ok());
    }

    #[test]
    fn huge_selection_copies_only_the_canvas() {
        let mut session = joined("me", &["other"]);
        for message in [
            RelayMessage::SelectionStart {
                point: Point::new(0.0, 0.0),
            },
            RelayMessage::SelectionDrag {
                dx: 1 << 30,
                dy: 1 << 30,
            },
            RelayMessage::ActionEnd,
            RelayMessage::SelectionCopy,
        ] {
            session.handle_server_message(relayed("other", message));
        }
        let selection = session.members().action("other").and_then(Action::selection);
        let Some(payload) = selection.and_then(|selection| selection.payload.as_ref()) else {
            panic!("copy should leave a payload");
        };
        assert_eq!((payload.width, payload.height), (32, 32));
    }

    #[test]
    fn oversized_history_relays_are_rejected() {
        let mut session = joined("me", &["other"]);
        let before = session.history().snapshot();
        let entry = |kind| PastAction {
            kind,
            enabled: true,
        };
        for history in [
            vec![entry(PastActionKind::Base(BaseData::blank(200_000, 200_000)))],
            vec![
                entry(PastActionKind::Base(BaseData::blank(8, 8))),
                entry(PastActionKind::SelectionPaste(PasteData {
                    rect: Rect::new(0, 0, i32::MAX, 4),
                    pixels: PixelBuffer::new(1, 1),
                    flip_x: false,
                    flip_y: false,
                })),
            ],
        ] {
            let message = RelayMessage::LoadHistory { history, cursor: 0 };
            assert!(session.handle_server_message(relayed("other", message)).is_empty());
        }
        let tall = PixelBuffer {
            width: 1,
            height: MAX_CANVAS_SIDE + 1,
            data: vec![0; (MAX_CANVAS_SIDE as usize + 1) * 4],
        };
        let import = RelayMessage::ImportCanvas(BaseData {
            image: Some(tall),
            ..BaseData::blank(8, 8)
        });
        assert!(session.handle_server_message(relayed("other", import)).is_empty());
        assert_eq!(session.history().snapshot(), before);
    }

    #[test]
    fn oversized_snapshot_base_is_rejected() {
        let mut session = joined("new", &[]);
        session.handle_server_message(ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members: vec![],
            has_password: false,
            awaiting_canvas: true,
        });
        let effects = session.handle_server_message(ServerMessage::CanvasResponse {
            from: "host".into(),
            snapshot: CanvasSnapshot {
                history: vec![PastAction {
                    kind: PastActionKind::Base(BaseData::blank(200_000, 200_000)),
                    enabled: true,
                }],
                cursor: 0,
                actions: vec![],
                action_order: vec![],
            },
        });
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notice::CanvasRejected(_))]
        ));
        assert_eq!(session.history().canvas().width(), 32);
    }

    #[test]
    fn snapshot_live_actions_are_brought_into_range() {
        let mut session = joined("new", &[]);
        session.handle_server_message(ServerMessage::SessionJoined {
            session_id: "abcd".into(),
            members: vec![],
            has_password: false,
            awaiting_canvas: true,
        });
        let host = History::new(BaseData::blank(16, 16));
        let (history, _) = host.snapshot();
        let wide = PixelBuffer {
            width: MAX_CANVAS_SIDE + 1,
            height: 1,
            data: vec![0; (MAX_CANVAS_SIDE as usize + 1) * 4],
        };
        let mut selection = SelectionData::new(Rect::new(i32::MIN, 0, i32::MAX, 4));
        selection.payload = Some(wide);
        let effects = session.handle_server_message(ServerMessage::CanvasResponse {
            from: "host".into(),
            snapshot: CanvasSnapshot {
                history,
                cursor: 0,
                actions: vec![
                    MemberAction {
                        client_id: "host".into(),
                        action: Action::SelectionMove(selection),
                    },
                    MemberAction {
                        client_id: "guest".into(),
                        action: Action::Stroke(StrokeData {
                            style: StrokeStyle {
                                width: f32::INFINITY,
                                ..style()
                            },
                            points: vec![Point::new(1.0, 1.0)],
                        }),
                    },
                ],
                action_order: vec!["host".into(), "guest".into()],
            },
        });
        assert!(effects.contains(&Effect::Notify(Notice::CanvasReady)));

        let Some(Action::SelectionMove(selection)) = session.members().action("host") else {
            panic!("expected the host's selection");
        };
        assert!(selection.rect.is_bounded());
        assert_eq!(selection.payload, None);
        let Some(Action::Stroke(stroke)) = session.members().action("guest") else {
            panic!("expected the guest's stroke");
        };
        assert!(stroke.style.width <= MAX_STROKE_WIDTH);
    }
}
