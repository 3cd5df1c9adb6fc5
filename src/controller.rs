use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, SortColumn, TVConfig, TVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Wait up to the poll time for a key press and map it to a Message.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.map_key(key, model.raw_keyevents()));
        }
        Ok(None)
    }

    fn map_key(&self, key: event::KeyEvent, raw: bool) -> Option<Message> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }
        // While the search bar is focused every other key goes to the line editor
        if raw {
            return Some(Message::RawKey(key));
        }
        self.handle_key(key)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown, _) => Some(Message::NextPage),
            (KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp, _) => {
                Some(Message::PreviousPage)
            }
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::FirstPage),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::LastPage),
            (KeyCode::Char('1'), _) => Some(Message::SortBy(SortColumn::Name)),
            (KeyCode::Char('2'), _) => Some(Message::SortBy(SortColumn::Population)),
            (KeyCode::Char('3'), _) => Some(Message::SortBy(SortColumn::Area)),
            (KeyCode::Char('m'), _) => Some(Message::ToggleMetric),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('r'), _) => Some(Message::Retry),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
