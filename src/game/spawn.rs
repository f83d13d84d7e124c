//! Kick-off placement and player sizing

use std::f64::consts::PI;

use crate::config::MatchSettings;
use crate::util::vec2::Vec2;
use crate::ws::protocol::Team;

use super::arena::{Arena, ROUNDING_ERROR};

/// Players per team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamCounts {
    pub orange: usize,
    pub blue: usize,
}

impl TeamCounts {
    pub fn from_teams<'a>(teams: impl IntoIterator<Item = &'a Team>) -> Self {
        let mut counts = Self::default();
        for team in teams {
            match team {
                Team::Orange => counts.orange += 1,
                Team::Blue => counts.blue += 1,
            }
        }
        counts
    }

    pub fn get(&self, team: Team) -> usize {
        match team {
            Team::Orange => self.orange,
            Team::Blue => self.blue,
        }
    }

    pub fn total(&self) -> usize {
        self.orange + self.blue
    }

    pub fn largest(&self) -> usize {
        self.orange.max(self.blue)
    }
}

/// Angular gap between neighbouring slots of a team of `count`
fn angle_interval(count: usize) -> f64 {
    PI / (count as f64 + 1.0)
}

/// Spawn circle around the arena center
#[derive(Debug, Clone, Copy)]
pub struct SpawnLayout {
    center: Vec2,
    spawn_radius: f64,
}

impl SpawnLayout {
    pub fn new(arena: &Arena, settings: &MatchSettings) -> Self {
        Self {
            center: arena.center(),
            spawn_radius: settings.spawn_radius,
        }
    }

    pub fn position(&self, angle: f64) -> Vec2 {
        self.center + Vec2::from_angle(angle) * self.spawn_radius
    }

    /// Player radius for a roster.
    ///
    /// Starts at `max · decay^players` and shrinks by 5% until two
    /// neighbouring slots of the largest team are more than `4r + ε` apart.
    pub fn player_radius(&self, counts: TeamCounts, settings: &MatchSettings) -> f64 {
        let interval = angle_interval(counts.largest());
        let slot_gap = self.position(0.0).distance_to(self.position(interval));
        let mut radius =
            settings.max_player_radius * settings.player_radius_decay.powi(counts.total() as i32);

        while slot_gap <= 4.0 * radius + ROUNDING_ERROR {
            radius *= 0.95;
        }
        radius
    }

    /// Spawn points for `teams`, in roster order.
    ///
    /// Orange fills the left half-circle starting past `π/2`, blue the right
    /// half starting past `−π/2`; neither team uses the end angles.
    pub fn positions(&self, teams: &[Team]) -> Vec<Vec2> {
        let counts = TeamCounts::from_teams(teams);
        let interval = |team| angle_interval(counts.get(team));
        let mut next_orange = PI / 2.0 + interval(Team::Orange);
        let mut next_blue = -PI / 2.0 + interval(Team::Blue);

        teams
            .iter()
            .map(|&team| {
                let slot = match team {
                    Team::Orange => &mut next_orange,
                    Team::Blue => &mut next_blue,
                };
                let position = self.position(*slot);
                *slot += interval(team);
                position
            })
            .collect()
    }
}
