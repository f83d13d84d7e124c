//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Orange,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Self {
        match self {
            Team::Orange => Team::Blue,
            Team::Blue => Team::Orange,
        }
    }

    /// Display name, doubling as the team's draw color
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Orange => "orange",
            Team::Blue => "blue",
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Replace the held movement keys
    Move {
        #[serde(default)]
        left: bool,
        #[serde(default)]
        right: bool,
        #[serde(default)]
        up: bool,
        #[serde(default)]
        down: bool,
    },

    /// Trigger the impulse ability
    Impulse,

    /// Stop the match (room owner only)
    EndMatch,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current match
    LeaveMatch,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        room_id: Uuid,
        server_time: u64,
    },

    /// Player left the match
    PlayerLeft {
        user_id: Uuid,
        reason: String,
    },

    /// Game state snapshot (sent every tick)
    Snapshot(Snapshot),

    /// Match has ended
    MatchEnd {
        summary: MatchSummary,
    },

    /// Pong response
    Pong {
        /// Player the pong is addressed to
        user_id: Uuid,
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// Tailor a room-wide message for one connection.
    ///
    /// Snapshots get the recipient's own impulse color; pongs meant for
    /// someone else are dropped.
    pub fn for_recipient(&self, user_id: Uuid) -> Option<ServerMsg> {
        match self {
            ServerMsg::Snapshot(snapshot) => {
                let mut snapshot = snapshot.clone();
                snapshot.impulse_color = snapshot
                    .players
                    .iter()
                    .find(|p| p.user_id == user_id)
                    .map(|p| p.impulse_color.clone())
                    .unwrap_or_default();
                Some(ServerMsg::Snapshot(snapshot))
            }
            ServerMsg::Pong { user_id: to, .. } if *to != user_id => None,
            other => Some(other.clone()),
        }
    }
}

/// Per-tick room state; positions and sizes are normalized to the arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub ball: Option<BallSnapshot>,
    pub goals: Vec<GoalSnapshot>,
    /// Whole seconds until play resumes
    pub countdown: u32,
    /// Whole seconds of match time remaining
    pub time_left: u32,
    /// `"red"` while the recipient's impulse recharges, else `"green"`
    pub impulse_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub user_id: Uuid,
    pub x: f64,
    pub y: f64,
    /// Radius relative to arena height
    pub radius_y: f64,
    pub team: Team,
    pub impulse_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f64,
    pub y: f64,
    pub radius_y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSnapshot {
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

/// End-of-match summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Winner statement, e.g. "blue team has won (3-1)"
    pub summary: String,
    /// Scoreboard lines, header first
    pub scorers: Vec<ScorerLine>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
}

/// One colored line of the scoreboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerLine {
    pub color: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_message_parses_flat_flags() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"move","left":true,"up":true}"#).unwrap();
        match msg {
            ClientMsg::Move {
                left,
                right,
                up,
                down,
            } => {
                assert!(left && up);
                assert!(!right && !down);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_unit_commands_parse() {
        assert!(matches!(
            serde_json::from_str::<ClientMsg>(r#"{"type":"impulse"}"#).unwrap(),
            ClientMsg::Impulse
        ));
        assert!(matches!(
            serde_json::from_str::<ClientMsg>(r#"{"type":"end_match"}"#).unwrap(),
            ClientMsg::EndMatch
        ));
    }

    #[test]
    fn test_snapshot_is_tailored_per_recipient() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let player = |user_id, color: &str| PlayerSnapshot {
            user_id,
            x: 0.5,
            y: 0.5,
            radius_y: 0.05,
            team: Team::Orange,
            impulse_color: color.to_string(),
        };
        let msg = ServerMsg::Snapshot(Snapshot {
            tick: 1,
            players: vec![player(me, "red"), player(other, "green")],
            ball: None,
            goals: vec![],
            countdown: 0,
            time_left: 60,
            impulse_color: String::new(),
        });

        match msg.for_recipient(me) {
            Some(ServerMsg::Snapshot(s)) => assert_eq!(s.impulse_color, "red"),
            other => panic!("unexpected {:?}", other),
        }
        match msg.for_recipient(other) {
            Some(ServerMsg::Snapshot(s)) => assert_eq!(s.impulse_color, "green"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pong_only_reaches_its_sender() {
        let me = Uuid::new_v4();
        let pong = ServerMsg::Pong { user_id: me, t: 7 };
        assert!(pong.for_recipient(me).is_some());
        assert!(pong.for_recipient(Uuid::new_v4()).is_none());
    }
}
