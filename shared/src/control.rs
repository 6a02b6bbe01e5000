//! Player controls: key bindings, actions and the collaborators that carry them
//!
//! Front-ends implement `InputSource` to report key presses per side, and
//! `event_for` turns each one into the protocol event it stands for.

use crate::geometry::Direction;
use crate::model::Side;
use crate::protocol::Event;
use log::debug;
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Keys the bindings can refer to, independent of any windowing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    I,
    J,
    K,
    L,
    Up,
    Down,
    Left,
    Right,
    Kp2,
    Kp4,
    Kp6,
    Kp8,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Stop,
    Quit,
}

impl PlayerAction {
    /// The paddle direction this action requests. `Quit` has none.
    pub fn to_direction(self) -> Option<Direction> {
        match self {
            PlayerAction::MoveUp => Some(Direction::Up),
            PlayerAction::MoveDown => Some(Direction::Down),
            PlayerAction::MoveLeft => Some(Direction::Left),
            PlayerAction::MoveRight => Some(Direction::Right),
            PlayerAction::Stop => Some(Direction::None),
            PlayerAction::Quit => None,
        }
    }

    pub fn is_move(self) -> bool {
        matches!(
            self,
            PlayerAction::MoveUp
                | PlayerAction::MoveDown
                | PlayerAction::MoveLeft
                | PlayerAction::MoveRight
        )
    }
}

/// One key per movement direction plus a quit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMap {
    pub move_up: Key,
    pub move_down: Key,
    pub move_left: Key,
    pub move_right: Key,
    pub quit: Key,
}

impl ActionMap {
    pub const fn new(move_up: Key, move_down: Key, move_left: Key, move_right: Key) -> Self {
        Self {
            move_up,
            move_down,
            move_left,
            move_right,
            quit: Key::Escape,
        }
    }

    pub const fn wasd() -> Self {
        Self::new(Key::W, Key::S, Key::A, Key::D)
    }

    pub const fn arrow_keys() -> Self {
        Self::new(Key::Up, Key::Down, Key::Left, Key::Right)
    }

    pub const fn ijkl() -> Self {
        Self::new(Key::I, Key::K, Key::J, Key::L)
    }

    pub const fn numpad() -> Self {
        Self::new(Key::Kp8, Key::Kp2, Key::Kp4, Key::Kp6)
    }

    /// Presets in the order they are handed out to local players.
    pub const fn all_mappings() -> [ActionMap; 4] {
        [Self::wasd(), Self::arrow_keys(), Self::ijkl(), Self::numpad()]
    }

    pub fn bindings(&self) -> [(Key, PlayerAction); 5] {
        [
            (self.move_up, PlayerAction::MoveUp),
            (self.move_down, PlayerAction::MoveDown),
            (self.move_left, PlayerAction::MoveLeft),
            (self.move_right, PlayerAction::MoveRight),
            (self.quit, PlayerAction::Quit),
        ]
    }

    pub fn action_for(&self, key: Key) -> Option<PlayerAction> {
        self.bindings()
            .into_iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Pressed(PlayerAction),
    Released(PlayerAction),
}

/// Something that reports player actions once per frame.
pub trait InputSource {
    fn poll_actions(&mut self) -> Vec<(KeyAction, Side)>;
}

/// Destination for events produced locally.
pub trait EventSink {
    /// Queues `event`. Returns false when nobody is listening any more.
    fn post(&self, event: Event) -> bool;
}

/// Maps a key transition to the event it produces for `side`.
///
/// Pressing a move key starts the paddle, releasing it stops the paddle, and
/// pressing quit leaves the game.
pub fn event_for(key_action: KeyAction, side: Side) -> Option<Event> {
    match key_action {
        KeyAction::Pressed(PlayerAction::Quit) => Some(Event::PlayerLeave { side }),
        KeyAction::Pressed(action) => action
            .to_direction()
            .map(|direction| Event::PaddleMove { side, direction }),
        KeyAction::Released(action) if action.is_move() => Some(Event::PaddleMove {
            side,
            direction: Direction::None,
        }),
        KeyAction::Released(_) => None,
    }
}

/// An `EventSink` feeding an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn post(&self, event: Event) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("Event sink closed, dropping {}", e.0.kind());
                false
            }
        }
    }
}

/// Replays pre-recorded frames of actions. Empty once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: VecDeque<Vec<(KeyAction, Side)>>,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = Vec<(KeyAction, Side)>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: Vec<(KeyAction, Side)>) {
        self.frames.push_back(frame);
    }

    pub fn is_exhausted(&self) -> bool {
        self.frames.is_empty()
    }
}

impl InputSource for ScriptedInput {
    fn poll_actions(&mut self) -> Vec<(KeyAction, Side)> {
        self.frames.pop_front().unwrap_or_default()
    }
}
