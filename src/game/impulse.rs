//! Impulse ability - wall kick-off and area push

use tracing::debug;

use crate::config::MatchSettings;

use super::arena::Wall;
use super::body::{BodyId, PlayerId};
use super::world::World;

/// What a fired impulse touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpulseResult {
    pub walls: Vec<Wall>,
    pub pushed: Vec<BodyId>,
}

/// Impulse system for cooldown gating and area boosts
pub struct ImpulseSystem;

impl ImpulseSystem {
    /// Check if a player may arm an impulse
    pub fn can_trigger(cooldown: f64, countdown: f64) -> bool {
        cooldown <= 0.0 && countdown <= 0.0
    }

    /// Tick the cooldown down by the measured elapsed time
    pub fn update_cooldown(cooldown: f64, elapsed: f64) -> f64 {
        (cooldown - elapsed).max(0.0)
    }

    /// Fire `player`'s impulse.
    ///
    /// The player bounces off every wall it rests on, and every other body
    /// whose surface lies within `impulse_range` gets `impulse_speed` added
    /// along the direction from the player toward it.
    pub fn fire(world: &mut World, player: PlayerId, settings: &MatchSettings) -> ImpulseResult {
        let arena = world.arena;
        let mut result = ImpulseResult::default();

        let Some(source) = world.player(player).map(|p| p.body.clone()) else {
            return result;
        };

        result.walls = arena.touching_walls(&source).collect();
        if let Some(body) = world.body_mut(BodyId::Player(player)) {
            let speed = settings.impulse_speed;
            for wall in &result.walls {
                match wall {
                    Wall::Left => body.velocity.x = speed,
                    Wall::Right => body.velocity.x = -speed,
                    Wall::Top => body.velocity.y = speed,
                    Wall::Bottom => body.velocity.y = -speed,
                }
            }
        }

        for id in world.body_ids() {
            if id == BodyId::Player(player) {
                continue;
            }
            let Some(target) = world.body_mut(id) else {
                continue;
            };
            let delta = target.position - source.position;
            let surface_distance = delta.length() - source.radius - target.radius;
            if surface_distance > settings.impulse_range {
                continue;
            }
            // Coincident centers have no push direction
            if let Some(direction) = delta.try_normalize() {
                target.velocity += direction * settings.impulse_speed;
                result.pushed.push(id);
            }
        }

        debug!(
            player_id = %player,
            walls = result.walls.len(),
            pushed = result.pushed.len(),
            "Impulse fired"
        );

        result
    }
}
