//! Planar geometry: vectors, cardinal directions and axis-aligned rectangles
//!
//! Coordinates follow screen conventions: x grows to the right, y grows downwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Vector with both components set to `value`.
    pub const fn splat(value: f32) -> Self {
        Self { x: value, y: value }
    }

    /// Builds a vector from a magnitude and an angle in radians.
    pub fn from_polar(magnitude: f32, angle: f32) -> Self {
        Self {
            x: magnitude * angle.cos(),
            y: magnitude * angle.sin(),
        }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Component-wise product.
    pub fn elementwise(&self, other: Vector2) -> Vector2 {
        Vector2 {
            x: self.x * other.x,
            y: self.y * other.y,
        }
    }

    /// The same vector with its components exchanged.
    pub fn swapped(&self) -> Vector2 {
        Vector2 {
            x: self.y,
            y: self.x,
        }
    }

    pub fn min(&self, other: Vector2) -> Vector2 {
        Vector2::new(self.x.min(other.x), self.y.min(other.y))
    }

    pub fn max(&self, other: Vector2) -> Vector2 {
        Vector2::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// The smaller of the two components.
    pub fn min_component(&self) -> f32 {
        self.x.min(self.y)
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, other: Vector2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;

    fn mul(self, scalar: f32) -> Vector2 {
        self.scale(scalar)
    }
}

impl Div<f32> for Vector2 {
    type Output = Vector2;

    fn div(self, scalar: f32) -> Vector2 {
        Vector2::new(self.x / scalar, self.y / scalar)
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Cardinal unit vectors, plus the null direction used to stop a paddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "DirectionRepr", try_from = "DirectionRepr")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub const CARDINAL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn unit(self) -> Vector2 {
        match self {
            Direction::Up => Vector2::new(0.0, -1.0),
            Direction::Down => Vector2::new(0.0, 1.0),
            Direction::Left => Vector2::new(-1.0, 0.0),
            Direction::Right => Vector2::new(1.0, 0.0),
            Direction::None => Vector2::ZERO,
        }
    }

    /// True when only the y component of the unit vector is non-zero.
    pub fn is_vertical(self) -> bool {
        let unit = self.unit();
        unit.x == 0.0 && unit.y != 0.0
    }

    /// True when only the x component of the unit vector is non-zero.
    pub fn is_horizontal(self) -> bool {
        let unit = self.unit();
        unit.y == 0.0 && unit.x != 0.0
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::None => Direction::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
            Direction::None => "NONE",
        }
    }

    pub fn from_name(name: &str) -> Option<Direction> {
        match name {
            "UP" => Some(Direction::Up),
            "DOWN" => Some(Direction::Down),
            "LEFT" => Some(Direction::Left),
            "RIGHT" => Some(Direction::Right),
            "NONE" => Some(Direction::None),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "$type", rename = "Direction")]
struct DirectionRepr {
    name: String,
}

impl From<Direction> for DirectionRepr {
    fn from(direction: Direction) -> Self {
        Self {
            name: direction.name().to_string(),
        }
    }
}

impl TryFrom<DirectionRepr> for Direction {
    type Error = String;

    fn try_from(repr: DirectionRepr) -> Result<Self, Self::Error> {
        Direction::from_name(&repr.name).ok_or_else(|| format!("unknown direction {:?}", repr.name))
    }
}

/// Overlap depth per breached direction, as produced by [`Rectangle::hits`].
pub type Hits = BTreeMap<Direction, f32>;

/// Axis-aligned rectangle, normalized so that `top_left <= bottom_right` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "RectangleRepr", from = "RectangleRepr")]
pub struct Rectangle {
    top_left: Vector2,
    bottom_right: Vector2,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "$type", rename = "Rectangle")]
struct RectangleRepr {
    top_left: Vector2,
    bottom_right: Vector2,
}

impl From<Rectangle> for RectangleRepr {
    fn from(rect: Rectangle) -> Self {
        Self {
            top_left: rect.top_left,
            bottom_right: rect.bottom_right,
        }
    }
}

impl From<RectangleRepr> for Rectangle {
    fn from(repr: RectangleRepr) -> Self {
        Rectangle::new(repr.top_left, repr.bottom_right)
    }
}

// Corner bits, in the order returned by `Rectangle::corners`.
const TOP_LEFT: u8 = 0b0001;
const TOP_RIGHT: u8 = 0b0010;
const BOTTOM_LEFT: u8 = 0b0100;
const BOTTOM_RIGHT: u8 = 0b1000;
const ALL_CORNERS: u8 = 0b1111;

impl Rectangle {
    /// Builds a rectangle from any two opposite corners.
    pub fn new(a: Vector2, b: Vector2) -> Self {
        Self {
            top_left: a.min(b),
            bottom_right: a.max(b),
        }
    }

    pub fn from_center(center: Vector2, size: Vector2) -> Self {
        let half = size / 2.0;
        Self::new(center - half, center + half)
    }

    pub fn top_left(&self) -> Vector2 {
        self.top_left
    }

    pub fn bottom_right(&self) -> Vector2 {
        self.bottom_right
    }

    pub fn size(&self) -> Vector2 {
        self.bottom_right - self.top_left
    }

    pub fn center(&self) -> Vector2 {
        (self.top_left + self.bottom_right) / 2.0
    }

    /// Corners as `[top_left, top_right, bottom_left, bottom_right]`.
    pub fn corners(&self) -> [Vector2; 4] {
        [
            self.top_left,
            Vector2::new(self.bottom_right.x, self.top_left.y),
            Vector2::new(self.top_left.x, self.bottom_right.y),
            self.bottom_right,
        ]
    }

    /// Inclusive point containment: points on the boundary count as inside.
    pub fn contains_point(&self, point: Vector2) -> bool {
        point.x >= self.top_left.x
            && point.x <= self.bottom_right.x
            && point.y >= self.top_left.y
            && point.y <= self.bottom_right.y
    }

    pub fn is_inside(&self, other: &Rectangle) -> bool {
        self.top_left.x >= other.top_left.x
            && self.bottom_right.x <= other.bottom_right.x
            && self.top_left.y >= other.top_left.y
            && self.bottom_right.y <= other.bottom_right.y
    }

    pub fn contains(&self, other: &Rectangle) -> bool {
        other.is_inside(self)
    }

    /// Touching edges count as an overlap.
    pub fn overlaps(&self, other: &Rectangle) -> bool {
        self.top_left.x <= other.bottom_right.x
            && self.bottom_right.x >= other.top_left.x
            && self.top_left.y <= other.bottom_right.y
            && self.bottom_right.y >= other.top_left.y
    }

    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Rectangle::new(
            self.top_left.max(other.top_left),
            self.bottom_right.min(other.bottom_right),
        ))
    }

    /// Bit pattern of the corners of `other` lying inside `self`.
    fn corner_pattern(&self, other: &Rectangle) -> u8 {
        let bits = [TOP_LEFT, TOP_RIGHT, BOTTOM_LEFT, BOTTOM_RIGHT];
        other
            .corners()
            .iter()
            .zip(bits)
            .filter(|(corner, _)| self.contains_point(**corner))
            .fold(0, |pattern, (_, bit)| pattern | bit)
    }

    /// Works out which edges of `self` were breached by `other`, and how deep.
    ///
    /// The result maps each breached direction (seen from `self`) to the overlap
    /// depth along that direction's axis. Touching rectangles yield zero-depth
    /// entries, disjoint ones yield an empty map.
    ///
    /// # Panics
    ///
    /// Panics on a corner pattern no pair of rectangles can produce (three corners,
    /// or two diagonal ones). That only happens when the geometry itself is broken.
    pub fn hits(&self, other: &Rectangle) -> Hits {
        let mut hits = Hits::new();
        let Some(intersection) = self.intersection(other) else {
            return hits;
        };
        let depth = intersection.size();
        let mut record = |direction: Direction| {
            let value = if direction.is_horizontal() {
                depth.x
            } else {
                depth.y
            };
            hits.insert(direction, value);
        };

        match self.corner_pattern(other) {
            BOTTOM_RIGHT => {
                record(Direction::Left);
                record(Direction::Up);
            }
            BOTTOM_LEFT => {
                record(Direction::Right);
                record(Direction::Up);
            }
            TOP_RIGHT => {
                record(Direction::Left);
                record(Direction::Down);
            }
            TOP_LEFT => {
                record(Direction::Right);
                record(Direction::Down);
            }
            p if p == BOTTOM_LEFT | BOTTOM_RIGHT => record(Direction::Up),
            p if p == TOP_LEFT | TOP_RIGHT => record(Direction::Down),
            p if p == TOP_RIGHT | BOTTOM_RIGHT => record(Direction::Left),
            p if p == TOP_LEFT | BOTTOM_LEFT => record(Direction::Right),
            ALL_CORNERS => record(self.direction_towards(other.center())),
            0 => record(self.crossing_direction(other)),
            pattern => panic!(
                "unclassifiable corner pattern {:04b} between {:?} and {:?}",
                pattern, self, other
            ),
        }
        hits
    }

    /// Direction of `point` relative to the center, along the dominant axis.
    fn direction_towards(&self, point: Vector2) -> Direction {
        let offset = point - self.center();
        if offset.x.abs() >= offset.y.abs() {
            if offset.x < 0.0 {
                Direction::Left
            } else {
                Direction::Right
            }
        } else if offset.y < 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// Classifies an overlap where no corner of `other` lies inside `self`, so
    /// `other` spans `self` completely along at least one axis.
    fn crossing_direction(&self, other: &Rectangle) -> Direction {
        let spans_x = other.top_left.x <= self.top_left.x && other.bottom_right.x >= self.bottom_right.x;
        let spans_y = other.top_left.y <= self.top_left.y && other.bottom_right.y >= self.bottom_right.y;

        match (spans_x, spans_y) {
            (false, true) => {
                if other.top_left.x < self.top_left.x {
                    Direction::Left
                } else if other.bottom_right.x > self.bottom_right.x {
                    Direction::Right
                } else if other.center().x < self.center().x {
                    Direction::Left
                } else {
                    Direction::Right
                }
            }
            (true, false) => {
                if other.top_left.y < self.top_left.y {
                    Direction::Up
                } else if other.bottom_right.y > self.bottom_right.y {
                    Direction::Down
                } else if other.center().y < self.center().y {
                    Direction::Up
                } else {
                    Direction::Down
                }
            }
            // `self` is buried in `other`: report the side it can leave through fastest.
            _ => {
                let center = self.center();
                let exits = [
                    (other.bottom_right.x - center.x, Direction::Left),
                    (center.x - other.top_left.x, Direction::Right),
                    (other.bottom_right.y - center.y, Direction::Up),
                    (center.y - other.top_left.y, Direction::Down),
                ];
                exits
                    .iter()
                    .fold(exits[0], |best, exit| if exit.0 < best.0 { *exit } else { best })
                    .1
            }
        }
    }
}
