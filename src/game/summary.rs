//! End-of-match text: winner line and top scorer board

use chrono::Utc;

use crate::ws::protocol::{MatchSummary, ScorerLine, Team};

use super::body::Player;
use super::world::World;

/// Color of the board's fixed lines
const PLAIN_COLOR: &str = "black";

/// Scorer count past which the board ends with an ellipsis
const ELLIPSIS_AFTER: usize = 6;

/// "<team> team has won (w-l)" or "both teams tied (o-b)"
pub fn winner_text(orange: u32, blue: u32) -> String {
    if blue > orange {
        format!("{} team has won ({}-{})", Team::Blue, blue, orange)
    } else if orange > blue {
        format!("{} team has won ({}-{})", Team::Orange, orange, blue)
    } else {
        format!("both teams tied ({}-{})", orange, blue)
    }
}

fn plain(text: &str) -> ScorerLine {
    ScorerLine {
        color: PLAIN_COLOR.to_string(),
        text: text.to_string(),
    }
}

/// Header, then up to `limit` scorers in descending order colored by team
pub fn scorer_lines(players: &[Player], limit: usize) -> Vec<ScorerLine> {
    let mut scorers: Vec<&Player> = players.iter().filter(|p| p.goals_scored > 0).collect();
    // Stable: equal tallies keep roster order
    scorers.sort_by(|a, b| b.goals_scored.cmp(&a.goals_scored));

    let mut lines = vec![plain("top scorers:")];
    lines.extend(scorers.iter().take(limit).map(|p| ScorerLine {
        color: p.team.as_str().to_string(),
        text: format!("{}: {}", p.user_name, p.goals_scored),
    }));

    if scorers.is_empty() {
        lines.push(plain("absolutely nobody"));
    } else if scorers.len() > ELLIPSIS_AFTER {
        lines.push(plain("..."));
    }
    lines
}

pub fn build_summary(world: &World, scorer_limit: usize) -> MatchSummary {
    let (orange, blue) = world
        .goals
        .as_ref()
        .map(|g| (g.score(Team::Orange), g.score(Team::Blue)))
        .unwrap_or((0, 0));

    MatchSummary {
        summary: winner_text(orange, blue),
        scorers: scorer_lines(world.players(), scorer_limit),
        ended_at: Utc::now(),
    }
}

/// Sent when the engine gave up on the match
pub fn failure_summary() -> MatchSummary {
    MatchSummary {
        summary: "the match was stopped by a server error".to_string(),
        scorers: Vec::new(),
        ended_at: Utc::now(),
    }
}
