//! Terminal-side game state: a local mirror of the coordinator's simulation
//!
//! Local input is applied straight away (speculation) and the mirror keeps
//! simulating between snapshots. Whenever a fresh snapshot arrives, the mirror
//! is overridden with it.

use log::{debug, warn};
use shared::protocol::Event;
use shared::{Pong, PongError, Side};

pub struct ClientGameState {
    pong: Pong,
    side: Side,
    last_seq: Option<u64>,
    accepted: u64,
    discarded: u64,
}

impl ClientGameState {
    /// Wraps `pong` and creates the local paddle before any snapshot is seen.
    pub fn new(mut pong: Pong, side: Side) -> Self {
        if let Err(e) = pong.add_paddle(side, None) {
            debug!("Local paddle already present: {}", e);
        }
        Self {
            pong,
            side,
            last_seq: None,
            accepted: 0,
            discarded: 0,
        }
    }

    pub fn pong(&self) -> &Pong {
        &self.pong
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Number of snapshots applied and discarded as stale.
    pub fn snapshot_counts(&self) -> (u64, u64) {
        (self.accepted, self.discarded)
    }

    /// Applies a locally produced event to the mirror ahead of the coordinator.
    pub fn apply_prediction(&mut self, event: &Event) -> Result<(), PongError> {
        match event {
            Event::PaddleMove { side, direction } => self.pong.move_paddle(*side, *direction),
            Event::PlayerLeave { side } => self.pong.remove_paddle(*side).map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn step(&mut self, dt: f32) {
        self.pong.update(dt);
    }

    /// Overrides the mirror with `snapshot` unless it is older than the last one applied.
    ///
    /// Snapshots without a sequence number are always applied.
    pub fn apply_server_state(&mut self, snapshot: &Pong, seq: Option<u64>) -> bool {
        match (seq, self.last_seq) {
            (Some(seq), Some(last)) if seq <= last => {
                debug!("Discarding stale snapshot {} (last {})", seq, last);
                self.discarded += 1;
                return false;
            }
            (Some(seq), _) => self.last_seq = Some(seq),
            (None, _) => debug!("Applying unsequenced snapshot"),
        }

        self.pong.override_with(snapshot);
        self.accepted += 1;
        if !self.pong.has_paddle(self.side) {
            warn!("Snapshot has no paddle for {}", self.side);
        }
        true
    }

    /// Whether the coordinator has acknowledged our paddle.
    pub fn is_joined(&self) -> bool {
        self.last_seq.is_some() && self.pong.has_paddle(self.side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Config, Direction, Vector2};

    fn arena() -> Pong {
        Pong::with_seed(Vector2::new(160.0, 90.0), Config::default(), 1).unwrap()
    }

    fn snapshot(ball_x: f32, sides: &[Side]) -> Pong {
        let mut pong = arena();
        for side in sides {
            pong.add_paddle(*side, None).unwrap();
        }
        pong.ball.body.position.x = ball_x;
        pong
    }

    #[test]
    fn test_local_paddle_is_created_up_front() {
        let state = ClientGameState::new(arena(), Side::Right);
        assert!(state.pong().has_paddle(Side::Right));
        assert!(!state.is_joined());
    }

    #[test]
    fn test_out_of_order_snapshots_apply_only_newer_ones() {
        let mut state = ClientGameState::new(arena(), Side::Left);
        let mut applied = Vec::new();

        for (seq, x) in [(5, 50.0), (3, 30.0), (7, 70.0)] {
            if state.apply_server_state(&snapshot(x, &[Side::Left]), Some(seq)) {
                applied.push(seq);
            }
        }

        assert_eq!(applied, vec![5, 7]);
        assert_eq!(state.last_seq(), Some(7));
        assert_eq!(state.pong().ball.body.position.x, 70.0);
        assert_eq!(state.snapshot_counts(), (2, 1));
        assert!(state.is_joined());
    }

    #[test]
    fn test_duplicate_sequence_is_stale() {
        let mut state = ClientGameState::new(arena(), Side::Left);
        assert!(state.apply_server_state(&snapshot(10.0, &[Side::Left]), Some(1)));
        assert!(!state.apply_server_state(&snapshot(20.0, &[Side::Left]), Some(1)));
        assert_eq!(state.pong().ball.body.position.x, 10.0);
    }

    #[test]
    fn test_unsequenced_snapshots_are_always_applied() {
        let mut state = ClientGameState::new(arena(), Side::Up);
        assert!(state.apply_server_state(&snapshot(40.0, &[Side::Up]), Some(9)));
        assert!(state.apply_server_state(&snapshot(41.0, &[Side::Up]), None));
        assert_eq!(state.pong().ball.body.position.x, 41.0);
        assert_eq!(state.last_seq(), Some(9));
    }

    #[test]
    fn test_override_drops_paddles_missing_remotely() {
        let mut state = ClientGameState::new(arena(), Side::Left);
        state.apply_server_state(&snapshot(80.0, &[Side::Right]), Some(1));
        assert_eq!(state.pong().sides(), vec![Side::Right]);
        assert!(!state.is_joined());
    }

    #[test]
    fn test_prediction_moves_local_paddle() {
        let mut state = ClientGameState::new(arena(), Side::Left);
        let before = state.pong().paddle(Side::Left).unwrap().body.position;

        state
            .apply_prediction(&Event::PaddleMove {
                side: Side::Left,
                direction: Direction::Down,
            })
            .unwrap();
        state.step(1.0);

        let after = state.pong().paddle(Side::Left).unwrap().body.position;
        assert!(after.y > before.y);
        assert_eq!(
            state.apply_prediction(&Event::PaddleMove {
                side: Side::Right,
                direction: Direction::Up,
            }),
            Err(PongError::PaddleNotFound(Side::Right))
        );
    }
}
