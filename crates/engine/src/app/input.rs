#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Interact,
    Quit,
}

/// Edge of a single action, forwarded to the scene between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Pressed(InputAction),
    Released(InputAction),
}

const ACTION_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    /// Records the new state and returns the edge, if the state changed.
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) -> Option<InputEvent> {
        let was_down = std::mem::replace(&mut self.down[action.index()], is_down);
        match (was_down, is_down) {
            (false, true) => Some(InputEvent::Pressed(action)),
            (true, false) => Some(InputEvent::Released(action)),
            _ => None,
        }
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::Interact,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Interact => 4,
            InputAction::Quit => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_edges_only_on_change() {
        let mut states = ActionStates::default();
        assert_eq!(
            states.set(InputAction::Interact, true),
            Some(InputEvent::Pressed(InputAction::Interact))
        );
        assert_eq!(states.set(InputAction::Interact, true), None);
        assert!(states.is_down(InputAction::Interact));
        assert_eq!(
            states.set(InputAction::Interact, false),
            Some(InputEvent::Released(InputAction::Interact))
        );
        assert!(!states.is_down(InputAction::Interact));
    }
}
