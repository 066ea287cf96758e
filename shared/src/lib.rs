use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

mod session_format;

pub use session_format::{
    decode_canvas_file, encode_canvas_file, CanvasFileData, SessionFileDecodeError,
    CANVAS_FILE_MAGIC, CANVAS_FILE_VERSION,
};

pub type ClientId = String;
pub type SessionId = String;

pub const MAX_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_CHAT_LEN: usize = 2000;
/// Largest canvas width or height anyone may create.
pub const MAX_CANVAS_SIDE: u32 = 8192;
/// Bound on every rectangle coordinate and extent.
pub const MAX_COORD: i32 = 2 * MAX_CANVAS_SIDE as i32;
pub const MAX_STROKE_WIDTH: f32 = 200.0;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Pixel cell under this point, pinned to `[-MAX_COORD, MAX_COORD]`.
    pub fn to_grid(self) -> (i32, i32) {
        fn cell(value: f32) -> i32 {
            if value.is_finite() {
                value.floor().clamp(-MAX_COORD as f32, MAX_COORD as f32) as i32
            } else {
                0
            }
        }
        (cell(self.x), cell(self.y))
    }
}

#[derive(
    Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq, Hash,
)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const fn from_array(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

/// Integer rectangle. Width and height may be negative while a drag is in
/// progress; see `Rect::normalized`.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn normalized(&self) -> Rect {
        let mut rect = *self;
        if rect.width < 0 {
            rect.x = rect.x.saturating_add(rect.width);
            rect.width = rect.width.saturating_neg();
        }
        if rect.height < 0 {
            rect.y = rect.y.saturating_add(rect.height);
            rect.height = rect.height.saturating_neg();
        }
        rect
    }

    /// Pins both edges on each axis to `[-MAX_COORD, MAX_COORD]`, so the
    /// normalized rect stays in range too.
    pub fn clamped(&self) -> Rect {
        let pin = |value: i32| value.clamp(-MAX_COORD, MAX_COORD);
        let (x, y) = (pin(self.x), pin(self.y));
        Rect::new(x, y, pin(self.right()) - x, pin(self.bottom()) - y)
    }

    pub fn is_bounded(&self) -> bool {
        self.clamped() == *self
    }

    /// Overlap of the two normalized rects; empty when they are disjoint.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let (a, b) = (self.normalized(), other.normalized());
        let x = a.x.max(b.x);
        let y = a.y.max(b.y);
        let right = a.right().min(b.right());
        let bottom = a.bottom().min(b.bottom());
        Rect::new(
            x,
            y,
            right.saturating_sub(x).max(0),
            bottom.saturating_sub(y).max(0),
        )
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        let rect = self.normalized();
        x >= rect.x as f32 && x <= rect.right() as f32 && y >= rect.y as f32 && y <= rect.bottom() as f32
    }
}

/// Raw RGBA8 pixels, row major, no padding.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let buffer = Self {
            width,
            height,
            data,
        };
        buffer.is_valid().then_some(buffer)
    }

    pub fn is_valid(&self) -> bool {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|area| area.checked_mul(4))
            == Some(self.data.len())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        if x >= self.width || y >= self.height {
            return Rgba::TRANSPARENT;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        match self.data.get(offset..offset + 4) {
            Some(bytes) => Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            None => Rgba::TRANSPARENT,
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        if let Some(bytes) = self.data.get_mut(offset..offset + 4) {
            bytes.copy_from_slice(&color.to_array());
        }
    }

    pub fn flipped(&self, flip_x: bool, flip_y: bool) -> PixelBuffer {
        if !flip_x && !flip_y {
            return self.clone();
        }
        let mut out = PixelBuffer::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let sx = if flip_x { self.width - 1 - x } else { x };
                let sy = if flip_y { self.height - 1 - y } else { y };
                out.set_pixel(x, y, self.pixel(sx, sy));
            }
        }
        out
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    #[default]
    Normal,
    Erase,
    Multiply,
    Screen,
    Darken,
    Lighten,
    Difference,
}

/// Which channels the flood fill compares against the seed colour.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillChannel {
    #[default]
    Rgba,
    Rgb,
    Red,
    Green,
    Blue,
    Alpha,
}

/// Resize handles around a selection, clockwise from the top-left corner.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::NorthWest,
        Handle::North,
        Handle::NorthEast,
        Handle::East,
        Handle::SouthEast,
        Handle::South,
        Handle::SouthWest,
        Handle::West,
    ];
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub width: f32,
    pub opacity: f32,
    pub blend: BlendMode,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            width: 4.0,
            opacity: 1.0,
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct ShapeStyle {
    pub fill: Option<Rgba>,
    pub outline: Option<Rgba>,
    pub width: f32,
    pub opacity: f32,
    pub blend: BlendMode,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: None,
            outline: Some(Rgba::BLACK),
            width: 2.0,
            opacity: 1.0,
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Rect,
    Ellipse,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct StrokeData {
    pub style: StrokeStyle,
    pub points: Vec<Point>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct LineData {
    pub style: StrokeStyle,
    pub from: Point,
    pub to: Point,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct ShapeData {
    pub style: ShapeStyle,
    pub rect: Rect,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct FillData {
    pub x: i32,
    pub y: i32,
    pub color: Rgba,
    pub opacity: f32,
    pub blend: BlendMode,
    pub threshold: u8,
    pub channel: FillChannel,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, Default, PartialEq)]
pub struct SelectionData {
    pub rect: Rect,
    pub payload: Option<PixelBuffer>,
    pub flip_x: bool,
    pub flip_y: bool,
    pub old_rect: Option<Rect>,
}

impl SelectionData {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct PasteData {
    pub rect: Rect,
    pub pixels: PixelBuffer,
    pub flip_x: bool,
    pub flip_y: bool,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct SelectionClearData {
    pub rect: Rect,
    pub color: Rgba,
}

/// Initial state of a canvas: a background colour and an optional image
/// drawn at the origin.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct BaseData {
    pub width: u32,
    pub height: u32,
    pub background: Rgba,
    pub image: Option<PixelBuffer>,
}

impl BaseData {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: Rgba::WHITE,
            image: None,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeData {
    pub width: u32,
    pub height: u32,
}

/// A member's in-progress, uncommitted edit.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, Default, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Action {
    #[default]
    None,
    Stroke(StrokeData),
    Line(LineData),
    Rect(ShapeData),
    Ellipse(ShapeData),
    Selecting(SelectionData),
    SelectionMove(SelectionData),
    SelectionResize {
        selection: SelectionData,
        handle: Handle,
    },
}

impl Action {
    pub fn is_none(&self) -> bool {
        matches!(self, Action::None)
    }

    pub fn is_selection(&self) -> bool {
        self.selection().is_some()
    }

    pub fn selection(&self) -> Option<&SelectionData> {
        match self {
            Action::Selecting(selection) | Action::SelectionMove(selection) => Some(selection),
            Action::SelectionResize { selection, .. } => Some(selection),
            _ => None,
        }
    }

    pub fn selection_mut(&mut self) -> Option<&mut SelectionData> {
        match self {
            Action::Selecting(selection) | Action::SelectionMove(selection) => Some(selection),
            Action::SelectionResize { selection, .. } => Some(selection),
            _ => None,
        }
    }

    /// Blend mode and opacity used when compositing this action's surface.
    pub fn composite_mode(&self) -> Option<(BlendMode, f32)> {
        match self {
            Action::Stroke(stroke) => Some((stroke.style.blend, stroke.style.opacity)),
            Action::Line(line) => Some((line.style.blend, line.style.opacity)),
            Action::Rect(shape) | Action::Ellipse(shape) => {
                Some((shape.style.blend, shape.style.opacity))
            }
            _ => None,
        }
    }

    /// The history entry this action becomes when committed, if any.
    pub fn to_past(&self) -> Option<PastActionKind> {
        match self {
            Action::Stroke(stroke) => Some(PastActionKind::Stroke(stroke.clone())),
            Action::Line(line) => Some(PastActionKind::Line(line.clone())),
            Action::Rect(shape) => Some(PastActionKind::Rect(shape.clone())),
            Action::Ellipse(shape) => Some(PastActionKind::Ellipse(shape.clone())),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum PastActionKind {
    Base(BaseData),
    Stroke(StrokeData),
    Fill(FillData),
    Line(LineData),
    Rect(ShapeData),
    Ellipse(ShapeData),
    SelectionPaste(PasteData),
    SelectionClear(SelectionClearData),
    Clear(Rgba),
    ClearBlank,
    ResizeCanvas(ResizeData),
}

impl PastActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            PastActionKind::Base(_) => "base",
            PastActionKind::Stroke(_) => "stroke",
            PastActionKind::Fill(_) => "fill",
            PastActionKind::Line(_) => "line",
            PastActionKind::Rect(_) => "rect",
            PastActionKind::Ellipse(_) => "ellipse",
            PastActionKind::SelectionPaste(_) => "selection paste",
            PastActionKind::SelectionClear(_) => "selection clear",
            PastActionKind::Clear(_) => "clear",
            PastActionKind::ClearBlank => "clear blank",
            PastActionKind::ResizeCanvas(_) => "resize canvas",
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct PastAction {
    pub enabled: bool,
    pub kind: PastActionKind,
}

impl PastAction {
    pub fn new(kind: PastActionKind) -> Self {
        Self {
            enabled: true,
            kind,
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct MemberAction {
    pub client_id: ClientId,
    pub action: Action,
}

/// Everything a newcomer needs to reproduce a peer's canvas.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct CanvasSnapshot {
    pub history: Vec<PastAction>,
    pub cursor: u32,
    pub actions: Vec<MemberAction>,
    pub action_order: Vec<ClientId>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    pub client_id: ClientId,
    pub name: Option<String>,
}

/// Messages one client sends to every other session member. The server
/// forwards these without looking inside.
#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum RelayMessage {
    #[serde(rename = "stroke:start")]
    StrokeStart { style: StrokeStyle, point: Point },
    #[serde(rename = "stroke:add")]
    StrokeAdd { point: Point },
    #[serde(rename = "line:start")]
    LineStart { style: StrokeStyle, point: Point },
    #[serde(rename = "line:update")]
    LineUpdate { point: Point },
    #[serde(rename = "shape:start")]
    ShapeStart {
        kind: ShapeKind,
        style: ShapeStyle,
        point: Point,
    },
    #[serde(rename = "shape:update")]
    ShapeUpdate { point: Point },
    #[serde(rename = "action:end")]
    ActionEnd,
    #[serde(rename = "action:cancel")]
    ActionCancel,
    #[serde(rename = "fill")]
    Fill(FillData),
    #[serde(rename = "clear")]
    Clear { color: Rgba },
    #[serde(rename = "clear:blank")]
    ClearBlank,
    #[serde(rename = "selection:start")]
    SelectionStart { point: Point },
    #[serde(rename = "selection:move")]
    SelectionMoveStart,
    #[serde(rename = "selection:resize")]
    SelectionResizeStart { handle: Handle },
    #[serde(rename = "selection:drag")]
    SelectionDrag { dx: i32, dy: i32 },
    #[serde(rename = "selection:flip")]
    SelectionFlip { horizontal: bool },
    #[serde(rename = "selection:copy")]
    SelectionCopy,
    #[serde(rename = "selection:cut")]
    SelectionCut { color: Rgba },
    #[serde(rename = "selection:paste")]
    SelectionPaste,
    #[serde(rename = "selection:clear")]
    SelectionClear { color: Rgba },
    #[serde(rename = "selection:remove")]
    SelectionRemove,
    #[serde(rename = "canvas:import")]
    ImportCanvas(BaseData),
    #[serde(rename = "canvas:resize")]
    ResizeCanvas(ResizeData),
    #[serde(rename = "history:move")]
    HistoryMove { target: u32 },
    #[serde(rename = "history:toggle")]
    HistoryToggle { index: u32 },
    #[serde(rename = "history:reorder")]
    HistoryReorder { index: u32, offset: i32 },
    /// A whole log opened from a save file.
    #[serde(rename = "history:load")]
    LoadHistory {
        history: Vec<PastAction>,
        cursor: u32,
    },
}

impl RelayMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::StrokeStart { .. } => "stroke:start",
            RelayMessage::StrokeAdd { .. } => "stroke:add",
            RelayMessage::LineStart { .. } => "line:start",
            RelayMessage::LineUpdate { .. } => "line:update",
            RelayMessage::ShapeStart { .. } => "shape:start",
            RelayMessage::ShapeUpdate { .. } => "shape:update",
            RelayMessage::ActionEnd => "action:end",
            RelayMessage::ActionCancel => "action:cancel",
            RelayMessage::Fill(_) => "fill",
            RelayMessage::Clear { .. } => "clear",
            RelayMessage::ClearBlank => "clear:blank",
            RelayMessage::SelectionStart { .. } => "selection:start",
            RelayMessage::SelectionMoveStart => "selection:move",
            RelayMessage::SelectionResizeStart { .. } => "selection:resize",
            RelayMessage::SelectionDrag { .. } => "selection:drag",
            RelayMessage::SelectionFlip { .. } => "selection:flip",
            RelayMessage::SelectionCopy => "selection:copy",
            RelayMessage::SelectionCut { .. } => "selection:cut",
            RelayMessage::SelectionPaste => "selection:paste",
            RelayMessage::SelectionClear { .. } => "selection:clear",
            RelayMessage::SelectionRemove => "selection:remove",
            RelayMessage::ImportCanvas(_) => "canvas:import",
            RelayMessage::ResizeCanvas(_) => "canvas:resize",
            RelayMessage::HistoryMove { .. } => "history:move",
            RelayMessage::HistoryToggle { .. } => "history:toggle",
            RelayMessage::HistoryReorder { .. } => "history:reorder",
            RelayMessage::LoadHistory { .. } => "history:load",
        }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "session:create")]
    CreateSession {
        session_id: Option<SessionId>,
        password: Option<String>,
    },
    #[serde(rename = "session:join")]
    JoinSession {
        session_id: SessionId,
        password: Option<String>,
    },
    #[serde(rename = "session:leave")]
    LeaveSession,
    #[serde(rename = "session:rename")]
    RenameSession { session_id: SessionId },
    #[serde(rename = "session:password")]
    SetPassword { password: Option<String> },
    #[serde(rename = "name")]
    SetName { name: Option<String> },
    #[serde(rename = "reconnect")]
    Reconnect {
        client_id: ClientId,
        name: Option<String>,
        session_id: Option<SessionId>,
        password: Option<String>,
    },
    #[serde(rename = "canvas:response")]
    CanvasResponse {
        to: ClientId,
        snapshot: CanvasSnapshot,
    },
    #[serde(rename = "chat")]
    Chat { text: String, to: Option<ClientId> },
    #[serde(rename = "cursor")]
    Cursor { point: Point },
    #[serde(rename = "cursor:updates")]
    CursorUpdates { enabled: bool },
    #[serde(rename = "relay")]
    Relay(RelayMessage),
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::CreateSession { .. } => "session:create",
            ClientMessage::JoinSession { .. } => "session:join",
            ClientMessage::LeaveSession => "session:leave",
            ClientMessage::RenameSession { .. } => "session:rename",
            ClientMessage::SetPassword { .. } => "session:password",
            ClientMessage::SetName { .. } => "name",
            ClientMessage::Reconnect { .. } => "reconnect",
            ClientMessage::CanvasResponse { .. } => "canvas:response",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Cursor { .. } => "cursor",
            ClientMessage::CursorUpdates { .. } => "cursor:updates",
            ClientMessage::Relay(message) => message.kind(),
        }
    }
}

#[derive(
    Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, thiserror::Error,
)]
pub enum SessionError {
    #[error("no such session")]
    NoSuchSession,
    #[error("a session with that id already exists")]
    AlreadyExists,
    #[error("that session id is already taken")]
    IdTaken,
    #[error("invalid session id")]
    InvalidSessionId,
    #[error("not in a session")]
    NotInSession,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome { client_id: ClientId },
    #[serde(rename = "reconnected")]
    Reconnected { client_id: ClientId, restored: bool },
    #[serde(rename = "session:joined")]
    SessionJoined {
        session_id: SessionId,
        members: Vec<MemberInfo>,
        has_password: bool,
        awaiting_canvas: bool,
    },
    #[serde(rename = "session:left")]
    SessionLeft,
    #[serde(rename = "member:joined")]
    MemberJoined { member: MemberInfo },
    #[serde(rename = "member:left")]
    MemberLeft { client_id: ClientId },
    #[serde(rename = "member:renamed")]
    MemberRenamed {
        client_id: ClientId,
        name: Option<String>,
    },
    #[serde(rename = "session:renamed")]
    SessionRenamed { session_id: SessionId },
    #[serde(rename = "session:password")]
    PasswordChanged { has_password: bool },
    #[serde(rename = "session:password_required")]
    PasswordRequired {
        session_id: SessionId,
        incorrect: bool,
    },
    #[serde(rename = "error")]
    Error(SessionError),
    #[serde(rename = "canvas:request")]
    RequestCanvas { for_client: ClientId },
    #[serde(rename = "canvas:response")]
    CanvasResponse {
        from: ClientId,
        snapshot: CanvasSnapshot,
    },
    #[serde(rename = "chat")]
    Chat {
        from: ClientId,
        text: String,
        direct: bool,
    },
    #[serde(rename = "cursor")]
    Cursor { from: ClientId, point: Point },
    #[serde(rename = "relayed")]
    Relayed {
        from: ClientId,
        message: RelayMessage,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::Reconnected { .. } => "reconnected",
            ServerMessage::SessionJoined { .. } => "session:joined",
            ServerMessage::SessionLeft => "session:left",
            ServerMessage::MemberJoined { .. } => "member:joined",
            ServerMessage::MemberLeft { .. } => "member:left",
            ServerMessage::MemberRenamed { .. } => "member:renamed",
            ServerMessage::SessionRenamed { .. } => "session:renamed",
            ServerMessage::PasswordChanged { .. } => "session:password",
            ServerMessage::PasswordRequired { .. } => "session:password_required",
            ServerMessage::Error(_) => "error",
            ServerMessage::RequestCanvas { .. } => "canvas:request",
            ServerMessage::CanvasResponse { .. } => "canvas:response",
            ServerMessage::Chat { .. } => "chat",
            ServerMessage::Cursor { .. } => "cursor",
            ServerMessage::Relayed { .. } => "relayed",
        }
    }
}

pub fn encode_message<T: Encode>(message: &T) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::encode_to_vec(message, bincode::config::standard())
}

pub fn decode_message<T: Decode<()>>(payload: &[u8]) -> Result<T, bincode::error::DecodeError> {
    bincode::decode_from_slice(payload, bincode::config::standard()).map(|(message, _)| message)
}

/// Session ids double as URL path segments.
pub fn is_valid_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
