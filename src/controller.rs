use std::time::Duration;
use tracing::trace;

use crate::domain::{CTConfig, CTError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &CTConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, CTError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    self.handle_key(key, model.raw_keyevents())
                }
                Event::Resize(width, height) => {
                    Some(Message::Resize(width as usize, height as usize))
                }
                _ => None,
            });
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent, raw: bool) -> Option<Message> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }
        if raw {
            return Some(Message::RawKey(key));
        }
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Tab | KeyCode::BackTab => Some(Message::SwitchFocus),
            KeyCode::Char('b') => Some(Message::ToggleSidebar),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('f') => Some(Message::FilterColumn),
            KeyCode::Char('d') | KeyCode::Delete => Some(Message::RemoveFilter),
            KeyCode::Char('v') => Some(Message::ToggleVisibility),
            KeyCode::Char('g') => Some(Message::ToggleGrouping),
            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Char('x') => Some(Message::ClearSort),
            KeyCode::Char('<') => Some(Message::MoveColumnLeft),
            KeyCode::Char('>') => Some(Message::MoveColumnRight),
            KeyCode::Char('o') => Some(Message::OpenFile),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
