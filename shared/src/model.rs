//! Simulation model: game objects, the table and the `Pong` aggregate
//!
//! A `Pong` is owned by exactly one process. The coordinator holds the canonical
//! instance and terminals hold mirrors that are periodically overridden with
//! decoded snapshots. Nothing in here is shared across threads.

use crate::error::PongError;
use crate::geometry::{Direction, Hits, Rectangle, Vector2};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::fmt;

/// The edge of the table a paddle guards. Also identifies the player owning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "SideRepr", try_from = "SideRepr")]
pub enum Side {
    Up,
    Down,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Up, Side::Down, Side::Left, Side::Right];

    /// Outward normal of the guarded edge.
    pub fn direction(self) -> Direction {
        match self {
            Side::Up => Direction::Up,
            Side::Down => Direction::Down,
            Side::Left => Direction::Left,
            Side::Right => Direction::Right,
        }
    }

    /// UP and DOWN sides guard horizontal edges with wide paddles.
    pub fn is_vertical(self) -> bool {
        self.direction().is_vertical()
    }

    pub fn is_horizontal(self) -> bool {
        self.direction().is_horizontal()
    }

    pub fn name(self) -> &'static str {
        self.direction().name()
    }

    pub fn from_name(name: &str) -> Option<Side> {
        Direction::from_name(name).and_then(|direction| Side::try_from(direction).ok())
    }
}

impl TryFrom<Direction> for Side {
    type Error = Direction;

    fn try_from(direction: Direction) -> Result<Self, Self::Error> {
        match direction {
            Direction::Up => Ok(Side::Up),
            Direction::Down => Ok(Side::Down),
            Direction::Left => Ok(Side::Left),
            Direction::Right => Ok(Side::Right),
            Direction::None => Err(direction),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Side::from_name(&s.to_ascii_uppercase()).ok_or_else(|| format!("unknown side {:?}", s))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "$type", rename = "Side")]
struct SideRepr {
    name: String,
}

impl From<Side> for SideRepr {
    fn from(side: Side) -> Self {
        Self {
            name: side.name().to_string(),
        }
    }
}

impl TryFrom<SideRepr> for Side {
    type Error = String;

    fn try_from(repr: SideRepr) -> Result<Self, Self::Error> {
        Side::from_name(&repr.name).ok_or_else(|| format!("unknown side {:?}", repr.name))
    }
}

/// A named, moving, axis-aligned body. `position` is its center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub struct GameObject {
    pub size: Vector2,
    pub position: Vector2,
    pub velocity: Vector2,
    pub name: String,
}

impl GameObject {
    pub fn new(name: impl Into<String>, size: Vector2, position: Vector2) -> Self {
        Self {
            size,
            position,
            velocity: Vector2::ZERO,
            name: name.into(),
        }
    }

    pub fn bounding_box(&self) -> Rectangle {
        Rectangle::from_center(self.position, self.size)
    }

    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    pub fn hits(&self, target: &Rectangle) -> Hits {
        self.bounding_box().hits(target)
    }

    /// Pushes the body out of `target` and reflects its velocity on every breached axis.
    ///
    /// Zero-depth contacts are returned but leave the body untouched.
    pub fn bounce_off(&mut self, target: &Rectangle) -> Hits {
        let hits = self.hits(target);
        for (&direction, &depth) in &hits {
            if depth == 0.0 {
                continue;
            }
            self.position += direction.unit() * -depth;
            if direction.is_horizontal() {
                self.velocity.x = -self.velocity.x;
            } else if direction.is_vertical() {
                self.velocity.y = -self.velocity.y;
            }
        }
        hits
    }

    /// Pushes the body out of `target` without altering its velocity.
    pub fn clip_against(&mut self, target: &Rectangle) -> Hits {
        let hits = self.hits(target);
        for (&direction, &depth) in &hits {
            if depth > 0.0 {
                self.position += direction.unit() * -depth;
            }
        }
        hits
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "BodyRepr", from = "BodyRepr")]
pub struct Ball {
    pub body: GameObject,
}

impl Ball {
    pub fn new(size: Vector2, position: Vector2) -> Self {
        Self {
            body: GameObject::new("ball", size, position),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "$type", rename = "Ball")]
struct BodyRepr {
    size: Vector2,
    position: Vector2,
    velocity: Vector2,
    name: String,
}

impl From<Ball> for BodyRepr {
    fn from(ball: Ball) -> Self {
        let GameObject {
            size,
            position,
            velocity,
            name,
        } = ball.body;
        Self {
            size,
            position,
            velocity,
            name,
        }
    }
}

impl From<BodyRepr> for Ball {
    fn from(repr: BodyRepr) -> Self {
        Self {
            body: GameObject {
                size: repr.size,
                position: repr.position,
                velocity: repr.velocity,
                name: repr.name,
            },
        }
    }
}

/// A paddle permanently bound to one side of the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PaddleRepr", from = "PaddleRepr")]
pub struct Paddle {
    side: Side,
    pub body: GameObject,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "$type", rename = "Paddle")]
struct PaddleRepr {
    side: Side,
    size: Vector2,
    position: Vector2,
    velocity: Vector2,
    name: String,
}

impl From<Paddle> for PaddleRepr {
    fn from(paddle: Paddle) -> Self {
        Self {
            side: paddle.side,
            size: paddle.body.size,
            position: paddle.body.position,
            velocity: paddle.body.velocity,
            name: paddle.body.name,
        }
    }
}

impl From<PaddleRepr> for Paddle {
    fn from(repr: PaddleRepr) -> Self {
        Self {
            side: repr.side,
            body: GameObject {
                size: repr.size,
                position: repr.position,
                velocity: repr.velocity,
                name: repr.name,
            },
        }
    }
}

impl Paddle {
    pub fn new(side: Side, size: Vector2, position: Vector2) -> Self {
        Self {
            side,
            body: GameObject::new(format!("paddle_{}", side.name().to_lowercase()), size, position),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

/// Collision targets surrounding the arena. Never rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    size: Vector2,
    borders: BTreeMap<Direction, GameObject>,
}

impl Table {
    pub fn new(size: Vector2) -> Self {
        let (w, h) = (size.x, size.y);
        let rects = [
            (
                Direction::Up,
                Rectangle::new(Vector2::new(-w, 0.0), Vector2::new(w * 2.0, -h)),
            ),
            (
                Direction::Down,
                Rectangle::new(Vector2::new(-w, h), Vector2::new(w * 2.0, h * 2.0)),
            ),
            (
                Direction::Left,
                Rectangle::new(Vector2::new(0.0, -h), Vector2::new(-w, h * 2.0)),
            ),
            (
                Direction::Right,
                Rectangle::new(Vector2::new(w, -h), Vector2::new(w * 2.0, h * 2.0)),
            ),
        ];
        let borders = rects
            .into_iter()
            .map(|(direction, rect)| {
                let name = format!("border_{}", direction.name().to_lowercase());
                (direction, GameObject::new(name, rect.size(), rect.center()))
            })
            .collect();
        Self { size, borders }
    }

    pub fn size(&self) -> Vector2 {
        self.size
    }

    pub fn border(&self, direction: Direction) -> Option<&GameObject> {
        self.borders.get(&direction)
    }

    pub fn borders(&self) -> impl Iterator<Item = &GameObject> {
        self.borders.values()
    }
}

/// Size and speed ratios, all relative to the arena size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub struct Config {
    /// Thickness and length of a LEFT/RIGHT paddle. Swapped for UP/DOWN paddles.
    pub paddle_ratio: Vector2,
    pub ball_ratio: f32,
    pub ball_speed_ratio: f32,
    pub paddle_speed_ratio: f32,
    pub paddle_padding: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paddle_ratio: Vector2::new(0.01, 0.1),
            ball_ratio: 0.05,
            ball_speed_ratio: 0.1,
            paddle_speed_ratio: 0.05,
            paddle_padding: 0.05,
        }
    }
}

/// The whole simulation state: arena, ball, paddles and tick counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "PongRepr", try_from = "PongRepr")]
pub struct Pong {
    size: Vector2,
    config: Config,
    pub ball: Ball,
    paddles: BTreeMap<Side, Paddle>,
    table: Table,
    updates: u64,
    time: f64,
    rng: StdRng,
}

impl Pong {
    pub fn new(size: Vector2, config: Config) -> Result<Self, PongError> {
        Self::with_rng(size, config, StdRng::from_entropy())
    }

    /// Deterministic construction, for tests and reproducible runs.
    pub fn with_seed(size: Vector2, config: Config, seed: u64) -> Result<Self, PongError> {
        Self::with_rng(size, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(size: Vector2, config: Config, rng: StdRng) -> Result<Self, PongError> {
        if !(size.x > 0.0 && size.y > 0.0) {
            return Err(PongError::InvalidSize);
        }
        let ball = Ball::new(Vector2::splat(size.min_component() * config.ball_ratio), size / 2.0);
        let mut pong = Self {
            size,
            config,
            ball,
            paddles: BTreeMap::new(),
            table: Table::new(size),
            updates: 0,
            time: 0.0,
            rng,
        };
        pong.reset_ball(None);
        Ok(pong)
    }

    pub fn size(&self) -> Vector2 {
        self.size
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn paddle(&self, side: Side) -> Option<&Paddle> {
        self.paddles.get(&side)
    }

    pub fn has_paddle(&self, side: Side) -> bool {
        self.paddles.contains_key(&side)
    }

    pub fn paddles(&self) -> impl Iterator<Item = &Paddle> {
        self.paddles.values()
    }

    pub fn sides(&self) -> Vec<Side> {
        self.paddles.keys().copied().collect()
    }

    pub fn paddle_count(&self) -> usize {
        self.paddles.len()
    }

    /// Everything the ball can bounce off: paddles first, then borders.
    pub fn hittables(&self) -> Vec<Rectangle> {
        self.paddles
            .values()
            .map(|paddle| paddle.body.bounding_box())
            .chain(self.table.borders().map(GameObject::bounding_box))
            .collect()
    }

    /// Recenters the ball. Without an explicit velocity it is launched at a random angle.
    pub fn reset_ball(&mut self, speed: Option<Vector2>) {
        self.ball.body.position = self.size / 2.0;
        self.ball.body.velocity = match speed {
            Some(speed) => speed,
            None => {
                let magnitude = self.size.min_component() * self.config.ball_speed_ratio;
                let angle = self.rng.gen_range(0.0..TAU);
                Vector2::from_polar(magnitude, angle)
            }
        };
        debug!("Ball reset with velocity {}", self.ball.body.velocity);
    }

    /// Default paddle geometry for `side`, kept clear of its edge by the padding ratio.
    pub fn default_paddle(&self, side: Side) -> Paddle {
        let ratio = if side.is_vertical() {
            self.config.paddle_ratio.swapped()
        } else {
            self.config.paddle_ratio
        };
        let size = self.size.elementwise(ratio);
        let center = self.size / 2.0;
        let position = match side {
            Side::Left => Vector2::new(self.size.x * self.config.paddle_padding + size.x / 2.0, center.y),
            Side::Right => Vector2::new(
                self.size.x - self.size.x * self.config.paddle_padding - size.x / 2.0,
                center.y,
            ),
            Side::Up => Vector2::new(center.x, self.size.y * self.config.paddle_padding + size.y / 2.0),
            Side::Down => Vector2::new(
                center.x,
                self.size.y - self.size.y * self.config.paddle_padding - size.y / 2.0,
            ),
        };
        Paddle::new(side, size, position)
    }

    pub fn add_paddle(&mut self, side: Side, paddle: Option<Paddle>) -> Result<&Paddle, PongError> {
        if self.paddles.contains_key(&side) {
            return Err(PongError::SideOccupied(side));
        }
        let paddle = match paddle {
            Some(paddle) if paddle.side() == side => paddle,
            Some(paddle) => Paddle {
                side,
                body: paddle.body,
            },
            None => self.default_paddle(side),
        };
        info!("Added paddle {} at {}", side, paddle.body.position);
        Ok(self.paddles.entry(side).or_insert(paddle))
    }

    pub fn remove_paddle(&mut self, side: Side) -> Result<Paddle, PongError> {
        let paddle = self
            .paddles
            .remove(&side)
            .ok_or(PongError::PaddleNotFound(side))?;
        info!("Removed paddle {}", side);
        Ok(paddle)
    }

    /// Sets a paddle moving along its free axis, or stops it for `Direction::None`.
    ///
    /// Directions along the paddle's bound axis are ignored.
    pub fn move_paddle(&mut self, side: Side, direction: Direction) -> Result<(), PongError> {
        let size = self.size;
        let speed_ratio = self.config.paddle_speed_ratio;
        let paddle = self
            .paddles
            .get_mut(&side)
            .ok_or(PongError::PaddleNotFound(side))?;

        let velocity = if direction == Direction::None {
            Vector2::ZERO
        } else if side.is_horizontal() && direction.is_vertical() {
            direction.unit() * size.y * speed_ratio
        } else if side.is_vertical() && direction.is_horizontal() {
            direction.unit() * size.x * speed_ratio
        } else {
            debug!("Ignoring move {} for paddle {}", direction, side);
            return Ok(());
        };
        paddle.body.velocity = velocity;
        Ok(())
    }

    pub fn stop_paddle(&mut self, side: Side) -> Result<(), PongError> {
        self.move_paddle(side, Direction::None)
    }

    /// Advances the simulation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.ball.body.advance(dt);
        for paddle in self.paddles.values_mut() {
            paddle.body.advance(dt);
        }
        self.handle_collisions();
        self.updates += 1;
        self.time += f64::from(dt);
    }

    fn handle_collisions(&mut self) {
        for target in self.hittables() {
            self.ball.body.bounce_off(&target);
        }
        let borders: Vec<Rectangle> = self.table.borders().map(GameObject::bounding_box).collect();
        for paddle in self.paddles.values_mut() {
            for border in &borders {
                paddle.body.clip_against(border);
            }
        }
    }

    /// Adopts `other`'s state while keeping local paddle objects that still exist there.
    pub fn override_with(&mut self, other: &Pong) {
        self.size = other.size;
        self.config = other.config;
        self.table = other.table.clone();
        self.updates = other.updates;
        self.time = other.time;

        let ball = &mut self.ball.body;
        ball.position = other.ball.body.position;
        ball.velocity = other.ball.body.velocity;
        ball.size = other.ball.body.size;

        self.paddles.retain(|side, _| other.paddles.contains_key(side));
        for (side, remote) in &other.paddles {
            match self.paddles.get_mut(side) {
                Some(local) => {
                    local.body.position = remote.body.position;
                    local.body.velocity = remote.body.velocity;
                    local.body.size = remote.body.size;
                }
                None => {
                    self.paddles.insert(*side, remote.clone());
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "$type", rename = "Pong")]
struct PongRepr {
    size: Vector2,
    config: Config,
    ball: Ball,
    paddles: Vec<Paddle>,
    updates: u64,
    time: f64,
}

impl From<Pong> for PongRepr {
    fn from(pong: Pong) -> Self {
        Self {
            size: pong.size,
            config: pong.config,
            ball: pong.ball,
            paddles: pong.paddles.into_values().collect(),
            updates: pong.updates,
            time: pong.time,
        }
    }
}

impl TryFrom<PongRepr> for Pong {
    type Error = PongError;

    fn try_from(repr: PongRepr) -> Result<Self, Self::Error> {
        let mut pong = Pong::new(repr.size, repr.config)?;
        pong.ball = repr.ball;
        pong.updates = repr.updates;
        pong.time = repr.time;
        for paddle in repr.paddles {
            let side = paddle.side();
            if pong.paddles.insert(side, paddle).is_some() {
                return Err(PongError::DuplicateSide(side));
            }
        }
        Ok(pong)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn pong() -> Pong {
        Pong::with_seed(Vector2::new(160.0, 90.0), Config::default(), 7).unwrap()
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("left".parse::<Side>().unwrap(), Side::Left);
        assert_eq!("DOWN".parse::<Side>().unwrap(), Side::Down);
        assert!("none".parse::<Side>().is_err());
        assert_eq!(Side::try_from(Direction::None), Err(Direction::None));
    }

    #[test]
    fn test_invalid_size_is_rejected() {
        let result = Pong::new(Vector2::new(0.0, 10.0), Config::default());
        assert_eq!(result.err(), Some(PongError::InvalidSize));
    }

    #[test]
    fn test_new_pong_has_centered_ball_with_expected_speed() {
        let pong = pong();
        assert_eq!(pong.ball.body.position, Vector2::new(80.0, 45.0));
        assert_eq!(pong.ball.body.size, Vector2::splat(4.5));
        assert_approx_eq!(pong.ball.body.velocity.magnitude(), 9.0, 1e-4);
        assert_eq!(pong.paddle_count(), 0);
    }

    #[test]
    fn test_reset_ball_with_explicit_speed() {
        let mut pong = pong();
        pong.ball.body.position = Vector2::new(3.0, 3.0);
        pong.reset_ball(Some(Vector2::ZERO));
        assert_eq!(pong.ball.body.position, Vector2::new(80.0, 45.0));
        assert_eq!(pong.ball.body.velocity, Vector2::ZERO);
    }

    #[test]
    fn test_default_paddles_geometry() {
        let mut pong = pong();
        for side in Side::ALL {
            pong.add_paddle(side, None).unwrap();
        }

        let left = &pong.paddle(Side::Left).unwrap().body;
        assert_approx_eq!(left.size.x, 1.6, 1e-4);
        assert_approx_eq!(left.size.y, 9.0, 1e-4);
        assert_approx_eq!(left.position.x, 8.8, 1e-4);
        assert_approx_eq!(left.position.y, 45.0, 1e-4);
        assert_eq!(left.name, "paddle_left");

        let right = &pong.paddle(Side::Right).unwrap().body;
        assert_approx_eq!(right.position.x, 151.2, 1e-4);

        let up = &pong.paddle(Side::Up).unwrap().body;
        assert_approx_eq!(up.size.x, 16.0, 1e-4);
        assert_approx_eq!(up.size.y, 0.9, 1e-4);
        assert_approx_eq!(up.position.x, 80.0, 1e-4);
        assert_approx_eq!(up.position.y, 4.95, 1e-4);

        let down = &pong.paddle(Side::Down).unwrap().body;
        assert_approx_eq!(down.position.y, 85.05, 1e-4);
    }

    #[test]
    fn test_add_paddle_twice_fails() {
        let mut pong = pong();
        pong.add_paddle(Side::Left, None).unwrap();
        assert_eq!(
            pong.add_paddle(Side::Left, None).err(),
            Some(PongError::SideOccupied(Side::Left))
        );
    }

    #[test]
    fn test_add_paddle_rebinds_foreign_paddle_to_requested_side() {
        let mut pong = pong();
        let template = pong.default_paddle(Side::Right);
        let added = pong.add_paddle(Side::Left, Some(template)).unwrap();
        assert_eq!(added.side(), Side::Left);
    }

    #[test]
    fn test_remove_missing_paddle_fails() {
        let mut pong = pong();
        assert_eq!(
            pong.remove_paddle(Side::Up).err(),
            Some(PongError::PaddleNotFound(Side::Up))
        );
        pong.add_paddle(Side::Up, None).unwrap();
        assert_eq!(pong.remove_paddle(Side::Up).unwrap().side(), Side::Up);
        assert!(!pong.has_paddle(Side::Up));
    }

    #[test]
    fn test_move_paddle_along_free_axis_only() {
        let mut pong = pong();
        pong.add_paddle(Side::Left, None).unwrap();
        pong.add_paddle(Side::Up, None).unwrap();

        pong.move_paddle(Side::Left, Direction::Down).unwrap();
        assert_eq!(pong.paddle(Side::Left).unwrap().body.velocity, Vector2::new(0.0, 4.5));

        // Moving along the bound axis is a no-op.
        pong.move_paddle(Side::Left, Direction::Right).unwrap();
        assert_eq!(pong.paddle(Side::Left).unwrap().body.velocity, Vector2::new(0.0, 4.5));

        pong.move_paddle(Side::Up, Direction::Left).unwrap();
        assert_eq!(pong.paddle(Side::Up).unwrap().body.velocity, Vector2::new(-8.0, 0.0));

        pong.stop_paddle(Side::Left).unwrap();
        assert_eq!(pong.paddle(Side::Left).unwrap().body.velocity, Vector2::ZERO);

        assert_eq!(
            pong.move_paddle(Side::Right, Direction::Up).err(),
            Some(PongError::PaddleNotFound(Side::Right))
        );
    }

    #[test]
    fn test_update_integrates_positions() {
        let mut pong = pong();
        pong.add_paddle(Side::Left, None).unwrap();
        pong.add_paddle(Side::Right, None).unwrap();
        pong.move_paddle(Side::Right, Direction::Down).unwrap();
        pong.move_paddle(Side::Left, Direction::Up).unwrap();

        let left = pong.paddle(Side::Left).unwrap().body.clone();
        let right = pong.paddle(Side::Right).unwrap().body.clone();
        let ball = pong.ball.body.clone();

        pong.update(2.0);

        let expected_left = left.position + left.velocity * 2.0;
        let expected_right = right.position + right.velocity * 2.0;
        let expected_ball = ball.position + ball.velocity * 2.0;
        let now_left = pong.paddle(Side::Left).unwrap().body.position;
        let now_right = pong.paddle(Side::Right).unwrap().body.position;
        assert_approx_eq!(now_left.x, expected_left.x, 1e-4);
        assert_approx_eq!(now_left.y, expected_left.y, 1e-4);
        assert_approx_eq!(now_right.x, expected_right.x, 1e-4);
        assert_approx_eq!(now_right.y, expected_right.y, 1e-4);
        assert_approx_eq!(pong.ball.body.position.x, expected_ball.x, 1e-4);
        assert_approx_eq!(pong.ball.body.position.y, expected_ball.y, 1e-4);
        assert_eq!(pong.updates(), 1);
        assert_approx_eq!(pong.time(), 2.0);
    }

    #[test]
    fn test_ball_bounces_within_bounded_steps() {
        let dt = 0.1;
        let speed = 9.0;
        for direction in Direction::CARDINAL {
            let mut pong = pong();
            pong.reset_ball(Some(direction.unit() * speed));
            let ball = pong.ball.body.bounding_box();
            let distance = match direction {
                Direction::Up => ball.top_left().y,
                Direction::Down => 90.0 - ball.bottom_right().y,
                Direction::Left => ball.top_left().x,
                Direction::Right => 160.0 - ball.bottom_right().x,
                Direction::None => unreachable!(),
            };
            let budget = (distance / (speed * dt)).ceil() as usize + 1;

            let start = pong.ball.body.velocity;
            let flipped = (0..budget).any(|_| {
                pong.update(dt);
                let now = pong.ball.body.velocity;
                now.x * start.x < 0.0 || now.y * start.y < 0.0
            });
            assert!(flipped, "no bounce towards {direction} within {budget} steps");
        }
    }

    #[test]
    fn test_ball_bounces_off_paddle() {
        let mut pong = pong();
        pong.add_paddle(Side::Left, None).unwrap();
        pong.reset_ball(Some(Vector2::new(-9.0, 0.0)));
        let paddle_face = pong.paddle(Side::Left).unwrap().body.bounding_box().bottom_right().x;
        let distance = pong.ball.body.bounding_box().top_left().x - paddle_face;
        let dt = 0.05;
        let budget = (distance / (9.0 * dt)).ceil() as usize + 1;

        let bounced = (0..budget).any(|_| {
            pong.update(dt);
            pong.ball.body.velocity.x > 0.0
        });
        assert!(bounced);
        assert!(pong.ball.body.bounding_box().top_left().x >= paddle_face - 1e-3);
    }

    #[test]
    fn test_zero_depth_contact_does_not_bounce() {
        let mut body = GameObject::new("probe", Vector2::splat(2.0), Vector2::new(1.0, 5.0));
        body.velocity = Vector2::new(-3.0, 1.0);
        let wall = Rectangle::new(Vector2::new(-10.0, -10.0), Vector2::new(0.0, 20.0));
        let hits = body.bounce_off(&wall);
        assert_eq!(hits.get(&Direction::Left), Some(&0.0));
        assert_eq!(body.velocity, Vector2::new(-3.0, 1.0));
        assert_eq!(body.position, Vector2::new(1.0, 5.0));
    }

    #[test]
    fn test_paddles_are_clipped_to_the_arena() {
        let mut pong = pong();
        pong.add_paddle(Side::Left, None).unwrap();
        pong.move_paddle(Side::Left, Direction::Up).unwrap();
        for _ in 0..100 {
            pong.update(0.5);
        }
        let paddle = pong.paddle(Side::Left).unwrap().body.bounding_box();
        assert!(paddle.top_left().y >= -1e-3);
        assert_eq!(pong.paddle(Side::Left).unwrap().body.velocity, Vector2::new(0.0, -4.5));
    }

    #[test]
    fn test_override_diffs_paddles() {
        let mut local = pong();
        local.add_paddle(Side::Left, None).unwrap();
        local.add_paddle(Side::Up, None).unwrap();

        let mut remote = Pong::with_seed(Vector2::new(160.0, 90.0), Config::default(), 99).unwrap();
        remote.add_paddle(Side::Left, None).unwrap();
        remote.add_paddle(Side::Right, None).unwrap();
        remote.move_paddle(Side::Left, Direction::Down).unwrap();
        remote.update(1.0);

        local.override_with(&remote);

        assert_eq!(local.sides(), vec![Side::Left, Side::Right]);
        let local_left = &local.paddle(Side::Left).unwrap().body;
        let remote_left = &remote.paddle(Side::Left).unwrap().body;
        assert_eq!(local_left.position, remote_left.position);
        assert_eq!(local_left.velocity, remote_left.velocity);
        assert_eq!(local.ball.body.position, remote.ball.body.position);
        assert_eq!(local.ball.body.velocity, remote.ball.body.velocity);
        assert_eq!(local.updates(), remote.updates());
    }

    #[test]
    fn test_override_keeps_local_paddle_identity() {
        let mut local = pong();
        local.add_paddle(Side::Left, None).unwrap();
        local.paddles.get_mut(&Side::Left).unwrap().body.name = "mine".to_string();

        let mut remote = pong();
        remote.add_paddle(Side::Left, None).unwrap();
        remote.paddles.get_mut(&Side::Left).unwrap().body.position.y = 10.0;

        local.override_with(&remote);
        let left = &local.paddle(Side::Left).unwrap().body;
        assert_eq!(left.name, "mine");
        assert_eq!(left.position.y, 10.0);
    }

    #[test]
    fn test_table_borders_surround_arena() {
        let table = Table::new(Vector2::new(160.0, 90.0));
        let arena = Rectangle::new(Vector2::ZERO, Vector2::new(160.0, 90.0));
        for direction in Direction::CARDINAL {
            let border = table.border(direction).unwrap().bounding_box();
            let hits = arena.hits(&border);
            assert_eq!(hits.get(&direction), Some(&0.0), "border {direction}");
        }
    }
}
