//! Authoritative match state and event arbitration

use log::{debug, info};
use shared::protocol::Event;
use shared::{Pong, PongError, Vector2};

/// What the run loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    GameOver,
}

/// The canonical `Pong` plus the snapshot sequence counter.
#[derive(Debug)]
pub struct GameState {
    pong: Pong,
    seq: u64,
}

impl GameState {
    /// Takes ownership of `pong` and parks the ball until someone joins.
    pub fn new(mut pong: Pong) -> Self {
        pong.reset_ball(Some(Vector2::ZERO));
        Self { pong, seq: 0 }
    }

    pub fn pong(&self) -> &Pong {
        &self.pong
    }

    /// Sequence number of the last snapshot handed out.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn handle(&mut self, event: Event) -> Result<Outcome, PongError> {
        match event {
            Event::PlayerJoin { side } => {
                self.pong.add_paddle(side, None)?;
                self.pong.reset_ball(None);
                info!("Player {} joined, {} in game", side, self.pong.paddle_count());
                Ok(Outcome::Continue)
            }
            Event::PlayerLeave { side } => {
                self.pong.remove_paddle(side)?;
                if self.pong.paddle_count() == 0 {
                    info!("Player {} left, nobody remains", side);
                    return Ok(Outcome::GameOver);
                }
                self.pong.reset_ball(None);
                info!("Player {} left, {} in game", side, self.pong.paddle_count());
                Ok(Outcome::Continue)
            }
            Event::PaddleMove { side, direction } => {
                self.pong.move_paddle(side, direction)?;
                Ok(Outcome::Continue)
            }
            Event::TimeElapsed { dt, snapshot, .. } => {
                if snapshot.is_some() {
                    debug!("Ignoring foreign snapshot");
                    return Ok(Outcome::Continue);
                }
                self.pong.update(dt);
                Ok(Outcome::Continue)
            }
            Event::Heartbeat { .. } => Ok(Outcome::Continue),
            Event::GameOver => Ok(Outcome::GameOver),
        }
    }

    /// Advances the simulation and returns the snapshot event to broadcast.
    pub fn tick(&mut self, dt: f32) -> Event {
        self.pong.update(dt);
        self.seq += 1;
        Event::snapshot(dt, &self.pong, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Config, Direction, Side};

    fn game() -> GameState {
        let pong = Pong::with_seed(Vector2::new(160.0, 90.0), Config::default(), 11).unwrap();
        GameState::new(pong)
    }

    #[test]
    fn test_ball_rests_until_first_join() {
        let mut game = game();
        assert_eq!(game.pong().ball.body.velocity, Vector2::ZERO);

        game.handle(Event::PlayerJoin { side: Side::Left }).unwrap();
        assert!(game.pong().has_paddle(Side::Left));
        assert_approx_eq!(game.pong().ball.body.velocity.magnitude(), 9.0, 1e-4);
    }

    #[test]
    fn test_duplicate_join_is_a_domain_error() {
        let mut game = game();
        game.handle(Event::PlayerJoin { side: Side::Up }).unwrap();
        assert_eq!(
            game.handle(Event::PlayerJoin { side: Side::Up }),
            Err(PongError::SideOccupied(Side::Up))
        );
    }

    #[test]
    fn test_last_leave_ends_the_game() {
        let mut game = game();
        game.handle(Event::PlayerJoin { side: Side::Left }).unwrap();
        game.handle(Event::PlayerJoin { side: Side::Right }).unwrap();

        let outcome = game.handle(Event::PlayerLeave { side: Side::Left }).unwrap();
        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(game.pong().ball.body.position, Vector2::new(80.0, 45.0));

        let outcome = game.handle(Event::PlayerLeave { side: Side::Right }).unwrap();
        assert_eq!(outcome, Outcome::GameOver);
    }

    #[test]
    fn test_leave_for_unknown_side_fails() {
        let mut game = game();
        assert_eq!(
            game.handle(Event::PlayerLeave { side: Side::Down }),
            Err(PongError::PaddleNotFound(Side::Down))
        );
    }

    #[test]
    fn test_moves_and_ticks() {
        let mut game = game();
        game.handle(Event::PlayerJoin { side: Side::Right }).unwrap();
        game.handle(Event::PaddleMove {
            side: Side::Right,
            direction: Direction::Down,
        })
        .unwrap();
        let before = game.pong().paddle(Side::Right).unwrap().body.position;

        game.handle(Event::tick(1.0)).unwrap();
        let after = game.pong().paddle(Side::Right).unwrap().body.position;
        assert_approx_eq!(after.y - before.y, 4.5, 1e-4);
        assert_eq!(game.pong().updates(), 1);
    }

    #[test]
    fn test_tick_produces_increasing_snapshots() {
        let mut game = game();
        game.handle(Event::PlayerJoin { side: Side::Left }).unwrap();

        for expected in 1..=3 {
            match game.tick(0.016) {
                Event::TimeElapsed {
                    snapshot: Some(pong),
                    seq: Some(seq),
                    ..
                } => {
                    assert_eq!(seq, expected);
                    assert_eq!(pong.sides(), vec![Side::Left]);
                    assert_eq!(pong.updates(), expected);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(game.seq(), 3);
    }

    #[test]
    fn test_game_over_event() {
        let mut game = game();
        assert_eq!(game.handle(Event::GameOver).unwrap(), Outcome::GameOver);
        assert_eq!(
            game.handle(Event::Heartbeat {
                side: Side::Left,
                timestamp: 0
            })
            .unwrap(),
            Outcome::Continue
        );
    }
}
