//! Live, uncommitted actions of every session member and the order in which
//! they are composited over the committed canvas.

use std::collections::HashMap;

use inkroom_shared::{Action, ClientId, MemberAction, Point};

use crate::raster::Surface;
use crate::render::{draw_action, draw_selection_overlay};

#[derive(Clone, Debug)]
pub struct Member {
    pub name: Option<String>,
    pub action: Action,
    surface: Surface,
}

impl Member {
    fn new(name: Option<String>, width: u32, height: u32) -> Self {
        Self {
            name,
            action: Action::None,
            surface: Surface::new(width, height),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

#[derive(Clone, Debug)]
pub struct Members {
    width: u32,
    height: u32,
    members: HashMap<ClientId, Member>,
    order: Vec<ClientId>,
}

impl Members {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            members: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ClientId> {
        self.members.keys()
    }

    /// Members with a live action, oldest first.
    pub fn action_order(&self) -> &[ClientId] {
        &self.order
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.members.get(id).map(|member| &member.action)
    }

    /// Adds a member if it is not known yet; an existing member keeps its
    /// action and only has its name updated.
    pub fn insert(&mut self, id: ClientId, name: Option<String>) {
        let (width, height) = (self.width, self.height);
        self.members
            .entry(id)
            .and_modify(|member| member.name = name.clone())
            .or_insert_with(|| Member::new(name, width, height));
    }

    pub fn remove(&mut self, id: &str) -> Option<Member> {
        self.order.retain(|other| other != id);
        self.members.remove(id)
    }

    pub fn rename(&mut self, id: &str, name: Option<String>) -> bool {
        match self.members.get_mut(id) {
            Some(member) => {
                member.name = name;
                true
            }
            None => false,
        }
    }

    /// Moves a member, its live action included, to a new id.
    pub fn rekey(&mut self, old: &str, new: ClientId) {
        if old == new {
            return;
        }
        let Some(member) = self.members.remove(old) else {
            return;
        };
        for id in self.order.iter_mut().filter(|id| id.as_str() == old) {
            *id = new.clone();
        }
        self.members.insert(new, member);
    }

    /// Replaces the member's action and moves it to the end of the action
    /// order. Unknown members are added on the fly.
    pub fn start_action(&mut self, id: &str, action: Action) {
        if !self.members.contains_key(id) {
            self.insert(id.to_string(), None);
        }
        self.order.retain(|other| other != id);
        if !action.is_none() {
            self.order.push(id.to_string());
        }
        if let Some(member) = self.members.get_mut(id) {
            member.action = action;
            draw_action(&mut member.surface, &member.action);
        }
    }

    /// Edits the live action in place and redraws its surface. Returns false
    /// when the member has no live action.
    pub fn update_action(&mut self, id: &str, update: impl FnOnce(&mut Action)) -> bool {
        let Some(member) = self.members.get_mut(id) else {
            return false;
        };
        if member.action.is_none() {
            return false;
        }
        update(&mut member.action);
        draw_action(&mut member.surface, &member.action);
        true
    }

    /// Appends a point to a live stroke, drawing only the new segment.
    pub fn extend_stroke(&mut self, id: &str, point: Point) -> bool {
        let Some(member) = self.members.get_mut(id) else {
            return false;
        };
        let Action::Stroke(stroke) = &mut member.action else {
            return false;
        };
        let segment = match stroke.points.last() {
            Some(last) => vec![*last, point],
            None => vec![point],
        };
        stroke.points.push(point);
        member
            .surface
            .stroke(&segment, stroke.style.width, stroke.style.color);
        true
    }

    /// Ends the member's live action, returning it and clearing the surface.
    pub fn finish_action(&mut self, id: &str) -> Action {
        self.order.retain(|other| other != id);
        match self.members.get_mut(id) {
            Some(member) => {
                member.surface.clear();
                std::mem::take(&mut member.action)
            }
            None => Action::None,
        }
    }

    /// Matches every temporary surface to a new canvas size and redraws the
    /// live actions on it.
    pub fn resize_all(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        for member in self.members.values_mut() {
            member.surface = Surface::new(width, height);
            draw_action(&mut member.surface, &member.action);
        }
    }

    /// The committed canvas with every live drawing action layered on top,
    /// in the order the members started them.
    pub fn compose(&self, canvas: &Surface) -> Surface {
        let mut view = canvas.clone();
        for member in self.order.iter().filter_map(|id| self.members.get(id)) {
            if let Some((blend, opacity)) = member.action.composite_mode() {
                view.compose(&member.surface, opacity, blend);
            }
        }
        view
    }

    pub fn draw_overlays(&self, view: &mut Surface) {
        for member in self.order.iter().filter_map(|id| self.members.get(id)) {
            if let Some(selection) = member.action.selection() {
                draw_selection_overlay(view, selection);
            }
        }
    }

    /// Live actions and their order for a bootstrap snapshot, leaving out
    /// `exclude` (the newcomer).
    pub fn snapshot_actions(&self, exclude: &str) -> (Vec<MemberAction>, Vec<ClientId>) {
        let mut actions: Vec<MemberAction> = self
            .members
            .iter()
            .filter(|(id, member)| id.as_str() != exclude && !member.action.is_none())
            .map(|(id, member)| MemberAction {
                client_id: id.clone(),
                action: member.action.clone(),
            })
            .collect();
        actions.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        let order = self
            .order
            .iter()
            .filter(|id| id.as_str() != exclude)
            .cloned()
            .collect();
        (actions, order)
    }

    /// Installs the live actions received in a bootstrap snapshot. Entries
    /// for members not in `actions` keep no live action.
    pub fn restore_actions(&mut self, actions: Vec<MemberAction>, order: Vec<ClientId>) {
        for member in self.members.values_mut() {
            member.action = Action::None;
            member.surface.clear();
        }
        self.order.clear();
        for entry in actions {
            self.insert_action(entry.client_id, entry.action);
        }
        let mut restored: Vec<ClientId> = order
            .into_iter()
            .filter(|id| self.action(id).is_some_and(|action| !action.is_none()))
            .collect();
        restored.dedup();
        // Anything with a live action that the order list forgot goes last.
        let mut missing: Vec<ClientId> = self
            .members
            .iter()
            .filter(|(id, member)| !member.action.is_none() && !restored.contains(id))
            .map(|(id, _)| id.clone())
            .collect();
        missing.sort();
        restored.extend(missing);
        self.order = restored;
    }

    fn insert_action(&mut self, id: ClientId, action: Action) {
        let (width, height) = (self.width, self.height);
        let member = self
            .members
            .entry(id)
            .or_insert_with(|| Member::new(None, width, height));
        member.action = action;
        draw_action(&mut member.surface, &member.action);
    }
}
