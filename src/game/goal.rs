//! Goal apertures and team scoreboards

use crate::config::MatchSettings;
use crate::ws::protocol::Team;

use super::arena::Arena;
use super::body::{Body, PlayerId};

/// Side wall an aperture is cut into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A team's goal: the aperture it defends plus its own scoring record.
///
/// `goals_scored` counts goals the owner team put into the opposing
/// aperture; `last_toucher` is the owner team's player who touched the
/// ball most recently.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub side: Side,
    pub owner_team: Team,
    pub y_top: f64,
    pub height: f64,
    /// Drawn depth of the aperture; physics treats it as a wall segment
    pub width: f64,
    pub goals_scored: u32,
    pub last_toucher: Option<PlayerId>,
}

impl Goal {
    /// Whether `y` lies strictly inside the aperture span
    pub fn spans(&self, y: f64) -> bool {
        y > self.y_top && y < self.y_top + self.height
    }

    /// Left edge x of the drawn aperture
    pub fn x(&self, arena: &Arena) -> f64 {
        match self.side {
            Side::Left => 0.0,
            Side::Right => arena.width - self.width,
        }
    }
}

/// Orange defends the left aperture, blue the right
#[derive(Debug, Clone, PartialEq)]
pub struct Goals {
    pub left: Goal,
    pub right: Goal,
}

impl Goals {
    pub fn new(arena: &Arena, settings: &MatchSettings) -> Self {
        let y_top = arena.height / 2.0 - settings.goal_height / 2.0;
        let goal = |side, owner_team| Goal {
            side,
            owner_team,
            y_top,
            height: settings.goal_height,
            width: settings.goal_width,
            goals_scored: 0,
            last_toucher: None,
        };
        Self {
            left: goal(Side::Left, Team::Orange),
            right: goal(Side::Right, Team::Blue),
        }
    }

    pub fn for_team(&self, team: Team) -> &Goal {
        if self.left.owner_team == team {
            &self.left
        } else {
            &self.right
        }
    }

    pub fn for_team_mut(&mut self, team: Team) -> &mut Goal {
        if self.left.owner_team == team {
            &mut self.left
        } else {
            &mut self.right
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Goal> {
        [&self.left, &self.right].into_iter()
    }

    /// Remember `player` as their team's latest ball toucher
    pub fn record_touch(&mut self, team: Team, player: PlayerId) {
        self.for_team_mut(team).last_toucher = Some(player);
    }

    /// Team that scores if the ball touches a side wall inside an aperture.
    ///
    /// The ball must sit exactly on the wall (`x == r` or `x == W − r`).
    /// The two tests are exclusive, so one contact scores at most once.
    pub fn scoring_team(&self, ball: &Body, arena: &Arena) -> Option<Team> {
        let x = ball.position.x;
        let y = ball.position.y;
        if x == ball.radius && self.left.spans(y) {
            Some(self.left.owner_team.opponent())
        } else if x == arena.width - ball.radius && self.right.spans(y) {
            Some(self.right.owner_team.opponent())
        } else {
            None
        }
    }

    /// Count a goal for `team`; returns the player to credit, if any
    pub fn award(&mut self, team: Team) -> Option<PlayerId> {
        let goal = self.for_team_mut(team);
        goal.goals_scored += 1;
        goal.last_toucher
    }

    pub fn score(&self, team: Team) -> u32 {
        self.for_team(team).goals_scored
    }
}
