//! Keyboard input with edge detection, one action map per local side

use macroquad::prelude::{is_key_down, KeyCode};
use shared::control::{ActionMap, InputSource, Key, KeyAction};
use shared::Side;
use std::collections::HashSet;

/// Reads the macroquad keyboard and reports key transitions since the last poll.
pub struct InputManager {
    bindings: Vec<(Side, ActionMap)>,
    // Keys held during the previous poll
    held: HashSet<Key>,
}

impl InputManager {
    pub fn new(side: Side, action_map: ActionMap) -> Self {
        Self::with_bindings(vec![(side, action_map)])
    }

    pub fn with_bindings(bindings: Vec<(Side, ActionMap)>) -> Self {
        Self {
            bindings,
            held: HashSet::new(),
        }
    }

    fn collect(&mut self, is_down: impl Fn(Key) -> bool) -> Vec<(KeyAction, Side)> {
        let current: HashSet<Key> = self
            .bindings
            .iter()
            .flat_map(|(_, map)| map.bindings())
            .map(|(key, _)| key)
            .filter(|key| is_down(*key))
            .collect();

        let mut actions = Vec::new();
        for (side, map) in &self.bindings {
            for (key, action) in map.bindings() {
                let now = current.contains(&key);
                let before = self.held.contains(&key);
                if now && !before {
                    actions.push((KeyAction::Pressed(action), *side));
                } else if !now && before {
                    actions.push((KeyAction::Released(action), *side));
                }
            }
        }

        self.held = current;
        actions
    }
}

impl InputSource for InputManager {
    fn poll_actions(&mut self) -> Vec<(KeyAction, Side)> {
        self.collect(|key| is_key_down(key_code(key)))
    }
}

fn key_code(key: Key) -> KeyCode {
    match key {
        Key::W => KeyCode::W,
        Key::A => KeyCode::A,
        Key::S => KeyCode::S,
        Key::D => KeyCode::D,
        Key::I => KeyCode::I,
        Key::J => KeyCode::J,
        Key::K => KeyCode::K,
        Key::L => KeyCode::L,
        Key::Up => KeyCode::Up,
        Key::Down => KeyCode::Down,
        Key::Left => KeyCode::Left,
        Key::Right => KeyCode::Right,
        Key::Kp2 => KeyCode::Kp2,
        Key::Kp4 => KeyCode::Kp4,
        Key::Kp6 => KeyCode::Kp6,
        Key::Kp8 => KeyCode::Kp8,
        Key::Escape => KeyCode::Escape,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::control::PlayerAction;

    #[test]
    fn test_press_is_reported_once_then_release() {
        let mut input = InputManager::new(Side::Left, ActionMap::wasd());

        let actions = input.collect(|key| key == Key::W);
        assert_eq!(actions, vec![(KeyAction::Pressed(PlayerAction::MoveUp), Side::Left)]);

        assert!(input.collect(|key| key == Key::W).is_empty());

        let actions = input.collect(|_| false);
        assert_eq!(actions, vec![(KeyAction::Released(PlayerAction::MoveUp), Side::Left)]);
    }

    #[test]
    fn test_each_side_uses_its_own_map() {
        let mut input = InputManager::with_bindings(vec![
            (Side::Left, ActionMap::wasd()),
            (Side::Right, ActionMap::arrow_keys()),
        ]);

        let actions = input.collect(|key| key == Key::Down || key == Key::Escape);
        assert!(actions.contains(&(KeyAction::Pressed(PlayerAction::MoveDown), Side::Right)));
        // Escape quits for every local side.
        assert!(actions.contains(&(KeyAction::Pressed(PlayerAction::Quit), Side::Left)));
        assert!(actions.contains(&(KeyAction::Pressed(PlayerAction::Quit), Side::Right)));
        assert_eq!(actions.len(), 3);
    }
}
