use std::collections::HashSet;
use std::sync::Arc;

use ratatui::widgets::ListState;

use crate::source::{PersonCard, Snapshot};
use crate::sync::SyncView;

pub struct App {
    /// Latest state published by the sync engine.
    pub view: SyncView,
    /// Person ids whose card is showing its back.
    flipped: HashSet<String>,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Set by the refresh key, cleared by the main loop once forwarded.
    pub refresh_requested: bool,
}

impl App {
    pub fn new(view: SyncView) -> Self {
        Self {
            view,
            flipped: HashSet::new(),
            list_state: ListState::default(),
            quit: false,
            refresh_requested: false,
        }
    }

    pub fn cards(&self) -> &Arc<Snapshot> {
        &self.view.cards
    }

    /// Take a new view from the sync engine.  Flip state follows the person,
    /// not the row, and is forgotten for people who dropped out.
    pub fn apply_view(&mut self, view: SyncView) {
        self.view = view;

        let present: HashSet<&str> = self.view.cards.iter().map(|c| c.person_id.as_str()).collect();
        self.flipped.retain(|id| present.contains(id.as_str()));

        let len = self.view.cards.len();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    pub fn is_flipped(&self, card: &PersonCard) -> bool {
        self.flipped.contains(&card.person_id)
    }

    /// Turn the selected card over.
    pub fn toggle_flip(&mut self) {
        let Some(card) = self.list_state.selected().and_then(|i| self.view.cards.get(i)) else {
            return;
        };
        if !self.flipped.remove(&card.person_id) {
            self.flipped.insert(card.person_id.clone());
        }
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        let len = self.view.cards.len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.view.cards.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.view.cards.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.view.cards.is_empty() {
            self.list_state.select(Some(self.view.cards.len() - 1));
        }
    }
}
