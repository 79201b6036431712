//! Client input decoding and update sequencing

use shared::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Action(Action),
    Quit,
}

/// Turns input lines into game events and hands out sequence numbers
pub struct InputManager {
    next_sequence: i64,
}

impl InputManager {
    pub fn new() -> Self {
        Self { next_sequence: 1 }
    }

    /// Continues numbering after `acknowledged`, the highest sequence the
    /// server has already applied for this identity
    pub fn resume_after(acknowledged: i64) -> Self {
        Self {
            next_sequence: acknowledged.max(0) + 1,
        }
    }

    /// Returns a fresh sequence number, strictly greater than every earlier one
    pub fn next_sequence(&mut self) -> i64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Decodes one line of keys; unknown keys are skipped.
    ///
    /// `w`/`a`/`s`/`d` move, `e` interacts and `q` quits.
    pub fn decode(&self, line: &str) -> Vec<InputEvent> {
        line.chars()
            .filter_map(|key| match key.to_ascii_lowercase() {
                'w' => Some(InputEvent::Action(Action::Move { dx: 0, dy: -1 })),
                'a' => Some(InputEvent::Action(Action::Move { dx: -1, dy: 0 })),
                's' => Some(InputEvent::Action(Action::Move { dx: 0, dy: 1 })),
                'd' => Some(InputEvent::Action(Action::Move { dx: 1, dy: 0 })),
                'e' => Some(InputEvent::Action(Action::Interact)),
                'q' => Some(InputEvent::Quit),
                _ => None,
            })
            .collect()
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
