//! Several players sharing one keyboard, with no coordinator involved

use crate::rendering::HudState;
use log::{debug, info};
use shared::control::{event_for, ActionMap, InputSource};
use shared::protocol::Event;
use shared::{Pong, PongError, Side};

/// A match simulated entirely in this process.
pub struct LocalMatch {
    pong: Pong,
    stopped: bool,
}

impl LocalMatch {
    /// Adds a paddle for each of `sides` and launches the ball.
    pub fn new(mut pong: Pong, sides: &[Side]) -> Result<Self, PongError> {
        for side in sides {
            pong.add_paddle(*side, None)?;
        }
        pong.reset_ball(None);
        info!("Local match with {} players", pong.paddle_count());
        Ok(Self {
            pong,
            stopped: false,
        })
    }

    /// Key presets handed out to `sides` in order.
    pub fn bindings(sides: &[Side]) -> Vec<(Side, ActionMap)> {
        sides
            .iter()
            .copied()
            .zip(ActionMap::all_mappings())
            .collect()
    }

    pub fn pong(&self) -> &Pong {
        &self.pong
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn hud(&self, fps: i32) -> HudState {
        HudState {
            joined: true,
            players: self.pong.paddle_count(),
            fps,
            ..HudState::default()
        }
    }

    /// Applies this frame's input and advances the game.
    ///
    /// Any player quitting ends the match for everybody.
    pub fn frame(&mut self, dt: f32, input: &mut dyn InputSource) -> bool {
        if self.stopped {
            return false;
        }

        for (key_action, side) in input.poll_actions() {
            match event_for(key_action, side) {
                Some(Event::PaddleMove { side, direction }) => {
                    if let Err(e) = self.pong.move_paddle(side, direction) {
                        debug!("Move for {} not applied: {}", side, e);
                    }
                }
                Some(Event::PlayerLeave { side }) => {
                    info!("Player {} quit, game over", side);
                    self.stopped = true;
                    return false;
                }
                _ => {}
            }
        }

        self.pong.update(dt);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::control::{Key, KeyAction, PlayerAction, ScriptedInput};
    use shared::{Config, Vector2};

    fn arena() -> Pong {
        Pong::with_seed(Vector2::new(160.0, 90.0), Config::default(), 3).unwrap()
    }

    #[test]
    fn test_every_side_gets_a_paddle_and_its_own_keys() {
        let sides = [Side::Left, Side::Right, Side::Up];
        let local = LocalMatch::new(arena(), &sides).unwrap();
        assert_eq!(local.pong().sides(), vec![Side::Up, Side::Left, Side::Right]);
        assert!(local.pong().ball.body.velocity.magnitude() > 0.0);

        let bindings = LocalMatch::bindings(&sides);
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[0], (Side::Left, ActionMap::wasd()));
        assert_eq!(bindings[1].1.action_for(Key::Down), Some(PlayerAction::MoveDown));
        assert_eq!(bindings[2].1.action_for(Key::J), Some(PlayerAction::MoveLeft));
    }

    #[test]
    fn test_duplicate_sides_are_rejected() {
        let result = LocalMatch::new(arena(), &[Side::Down, Side::Down]);
        assert!(matches!(result, Err(PongError::SideOccupied(Side::Down))));
    }

    #[test]
    fn test_input_moves_only_the_bound_paddle() {
        let mut local = LocalMatch::new(arena(), &[Side::Left, Side::Right]).unwrap();
        let mut input = ScriptedInput::new([
            vec![(KeyAction::Pressed(PlayerAction::MoveUp), Side::Left)],
            vec![(KeyAction::Released(PlayerAction::MoveUp), Side::Left)],
        ]);

        assert!(local.frame(0.1, &mut input));
        let left = local.pong().paddle(Side::Left).unwrap().body.velocity;
        let right = local.pong().paddle(Side::Right).unwrap().body.velocity;
        assert!(left.y < 0.0);
        assert_eq!(right, Vector2::ZERO);

        assert!(local.frame(0.1, &mut input));
        let left = local.pong().paddle(Side::Left).unwrap().body.velocity;
        assert_eq!(left, Vector2::ZERO);
        assert_eq!(local.pong().updates(), 2);
    }

    #[test]
    fn test_any_quit_ends_the_match() {
        let mut local = LocalMatch::new(arena(), &[Side::Up, Side::Down]).unwrap();
        let mut input =
            ScriptedInput::new([vec![(KeyAction::Pressed(PlayerAction::Quit), Side::Down)]]);

        assert!(!local.frame(0.1, &mut input));
        assert!(!local.is_running());
        assert!(!local.frame(0.1, &mut input));
        assert_eq!(local.pong().updates(), 0);
        assert_eq!(local.hud(60).players, 2);
    }
}
