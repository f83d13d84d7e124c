//! Circular bodies: the shared physical state plus player and ball roles

use std::fmt;

use uuid::Uuid;

use crate::util::vec2::Vec2;
use crate::ws::protocol::Team;

pub type PlayerId = Uuid;

/// Identifies one body in a match world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyId {
    Player(PlayerId),
    Ball,
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyId::Player(id) => write!(f, "player:{}", id),
            BodyId::Ball => f.write_str("ball"),
        }
    }
}

/// Movable circle shared by players and the ball
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Vec2,
    /// Fixed for the body's lifetime
    pub radius: f64,
    /// Physical velocity ("bounce"), units/sec
    pub velocity: Vec2,
    /// Input-driven contribution, recomputed each tick and sub-step
    pub move_vector: Vec2,
}

impl Body {
    pub fn new(position: Vec2, radius: f64) -> Self {
        Self {
            position,
            radius,
            velocity: Vec2::ZERO,
            move_vector: Vec2::ZERO,
        }
    }

    /// Displacement rate used while advancing: velocity plus held input
    #[inline]
    pub fn motion(&self) -> Vec2 {
        self.velocity + self.move_vector
    }

    /// Straight-line advance by `time` seconds
    pub fn advance(&mut self, time: f64) {
        self.position += self.motion() * time;
    }

    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Rescale velocity down to `max_speed`. Returns true if it was too fast.
    pub fn govern_speed(&mut self, max_speed: f64) -> bool {
        if !self.velocity.is_finite() {
            self.velocity = Vec2::ZERO;
            return true;
        }
        if self.speed() > max_speed {
            self.velocity = self.velocity.clamp_length(max_speed);
            return true;
        }
        false
    }

    pub fn apply_friction(&mut self, decay: f64) {
        self.velocity = self.velocity * decay;
    }

    pub fn reset_motion(&mut self) {
        self.move_vector = Vec2::ZERO;
    }

    /// Place at `position` with no velocity and no move vector
    pub fn respawn(&mut self, position: Vec2) {
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.move_vector = Vec2::ZERO;
    }
}

/// Held direction keys of a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveCommands {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl MoveCommands {
    /// Drop opposing keys: left cancels right, up cancels down
    pub fn without_contradictions(self) -> Self {
        let horizontal = self.left && self.right;
        let vertical = self.up && self.down;
        Self {
            left: self.left && !horizontal,
            right: self.right && !horizontal,
            up: self.up && !vertical,
            down: self.down && !vertical,
        }
    }

    /// Axis-aligned move vector at `speed` per axis.
    ///
    /// Diagonals are the plain vector sum, so they are faster than a single
    /// axis. The y axis grows downward.
    pub fn move_vector(self, speed: f64) -> Vec2 {
        let keys = self.without_contradictions();
        let axis = |negative: bool, positive: bool| match (negative, positive) {
            (true, false) => -speed,
            (false, true) => speed,
            _ => 0.0,
        };
        Vec2::new(axis(keys.left, keys.right), axis(keys.up, keys.down))
    }
}

/// A participant's body and match state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub user_name: String,
    pub team: Team,
    pub body: Body,
    pub spawn_position: Vec2,
    pub goals_scored: u32,
    pub impulse_cooldown: f64,
    pub commands: MoveCommands,
    pub pending_impulse: bool,
}

impl Player {
    pub fn new(id: PlayerId, user_name: String, team: Team, spawn: Vec2, radius: f64) -> Self {
        Self {
            id,
            user_name,
            team,
            body: Body::new(spawn, radius),
            spawn_position: spawn,
            goals_scored: 0,
            impulse_cooldown: 0.0,
            commands: MoveCommands::default(),
            pending_impulse: false,
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        self.impulse_cooldown > 0.0
    }

    /// Back to spawn: stationary, impulse recharged
    pub fn respawn(&mut self) {
        self.body.respawn(self.spawn_position);
        self.impulse_cooldown = 0.0;
        self.pending_impulse = false;
    }
}

/// The match ball
#[derive(Debug, Clone)]
pub struct Ball {
    pub body: Body,
    pub spawn_position: Vec2,
}

impl Ball {
    pub fn new(spawn: Vec2, radius: f64) -> Self {
        Self {
            body: Body::new(spawn, radius),
            spawn_position: spawn,
        }
    }

    pub fn respawn(&mut self) {
        self.body.respawn(self.spawn_position);
    }
}
