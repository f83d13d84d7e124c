//! Snapshot building for network transmission

use crate::ws::protocol::{BallSnapshot, GoalSnapshot, PlayerSnapshot, ServerMsg, Snapshot};

use super::arena::Arena;
use super::body::Player;
use super::goal::Goals;
use super::world::World;

const COOLING_COLOR: &str = "red";
const READY_COLOR: &str = "green";

/// Builds room-wide snapshots; positions and sizes are fractions of the arena
pub struct SnapshotBuilder {
    arena: Arena,
}

impl SnapshotBuilder {
    pub fn new(arena: Arena) -> Self {
        Self { arena }
    }

    /// Build a snapshot message. `impulse_color` is left empty and filled
    /// per connection.
    pub fn build(&self, tick: u64, world: &World, countdown: f64, time_left: f64) -> ServerMsg {
        ServerMsg::Snapshot(Snapshot {
            tick,
            players: world.players().iter().map(|p| self.player(p)).collect(),
            ball: world.ball.as_ref().map(|ball| {
                let (x, y) = self.arena.normalize(ball.body.position);
                BallSnapshot {
                    x,
                    y,
                    radius_y: ball.body.radius / self.arena.height,
                }
            }),
            goals: world
                .goals
                .as_ref()
                .map(|goals| self.goals(goals))
                .unwrap_or_default(),
            countdown: whole_seconds(countdown),
            time_left: whole_seconds(time_left),
            impulse_color: String::new(),
        })
    }

    fn player(&self, player: &Player) -> PlayerSnapshot {
        let (x, y) = self.arena.normalize(player.body.position);
        PlayerSnapshot {
            user_id: player.id,
            x,
            y,
            radius_y: player.body.radius / self.arena.height,
            team: player.team,
            impulse_color: impulse_color(player).to_string(),
        }
    }

    fn goals(&self, goals: &Goals) -> Vec<GoalSnapshot> {
        goals
            .iter()
            .map(|goal| GoalSnapshot {
                team: goal.owner_team,
                x: goal.x(&self.arena) / self.arena.width,
                y: goal.y_top / self.arena.height,
                width: goal.width / self.arena.width,
                height: goal.height / self.arena.height,
                color: goal.owner_team.as_str().to_string(),
            })
            .collect()
    }
}

pub fn impulse_color(player: &Player) -> &'static str {
    if player.is_cooling_down() {
        COOLING_COLOR
    } else {
        READY_COLOR
    }
}

/// Round a timer up to whole seconds for display
fn whole_seconds(seconds: f64) -> u32 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.ceil() as u32
    } else {
        0
    }
}
