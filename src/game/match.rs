//! Match state and authoritative tick loop

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MatchSettings;
use crate::util::time::{tick_duration, TickClock};
use crate::ws::protocol::{ClientMsg, MatchSummary, ServerMsg, Team};

use super::arena::Arena;
use super::body::{Ball, MoveCommands, Player, PlayerId};
use super::goal::Goals;
use super::impulse::ImpulseSystem;
use super::scheduler::CollisionScheduler;
use super::snapshot::SnapshotBuilder;
use super::spawn::{SpawnLayout, TeamCounts};
use super::summary::{build_summary, failure_summary};
use super::world::World;
use super::PlayerInput;

/// Consecutive iteration-capped ticks after which the match is abandoned
pub const FATAL_CAPPED_TICKS: u32 = 50;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// One participant as assigned by the lobby
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_id: Uuid,
    pub user_name: String,
    pub team: Team,
}

/// Everything needed to start a match in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRoster {
    pub owner_id: Uuid,
    pub players: Vec<RosterEntry>,
    /// `"<minutes>min"`, e.g. `"3min"`
    pub time_limit: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchSetupError {
    #[error("roster has no players")]
    EmptyRoster,

    #[error("invalid time limit {0:?}, expected \"<minutes>min\"")]
    InvalidTimeLimit(String),

    #[error("player {0} is listed more than once")]
    DuplicatePlayer(Uuid),

    #[error("room {0} already has a running match")]
    AlreadyRunning(Uuid),
}

/// Parse `"<n>min"` into seconds. Whole or fractional minutes, above zero.
pub fn parse_time_limit(raw: &str) -> Result<f64, MatchSetupError> {
    let invalid = || MatchSetupError::InvalidTimeLimit(raw.to_string());
    let minutes: f64 = raw
        .trim()
        .strip_suffix("min")
        .ok_or_else(invalid)?
        .trim()
        .parse()
        .map_err(|_| invalid())?;

    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(invalid());
    }
    Ok(minutes * SECONDS_PER_MINUTE)
}

/// Why a match stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    TimeUp,
    EndedByOwner,
    /// Every player left
    Abandoned,
    /// The physics engine kept hitting its iteration cap
    EngineFailure,
}

/// Match state (owned by match task)
pub struct MatchState {
    pub room_id: Uuid,
    pub owner_id: Uuid,
    pub tick: u64,
    pub world: World,
    settings: MatchSettings,
    scheduler: CollisionScheduler,
    /// Seconds until play resumes; the world is frozen while positive
    pub countdown: f64,
    /// Seconds of live play so far
    pub game_time: f64,
    pub time_limit: f64,
    capped_ticks: u32,
    pub ended: Option<EndReason>,
}

impl MatchState {
    pub fn new(
        room_id: Uuid,
        roster: &MatchRoster,
        settings: MatchSettings,
    ) -> Result<Self, MatchSetupError> {
        if roster.players.is_empty() {
            return Err(MatchSetupError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = roster.players.iter().find(|p| !seen.insert(p.user_id)) {
            return Err(MatchSetupError::DuplicatePlayer(dup.user_id));
        }
        let time_limit = parse_time_limit(&roster.time_limit)?;

        let arena = Arena::new(settings.arena_width, settings.arena_height);
        let layout = SpawnLayout::new(&arena, &settings);
        let teams: Vec<Team> = roster.players.iter().map(|p| p.team).collect();
        let radius = layout.player_radius(TeamCounts::from_teams(&teams), &settings);
        let spawns = layout.positions(&teams);

        let mut world = World::new(arena)
            .with_ball(Ball::new(arena.center(), settings.ball_radius))
            .with_goals(Goals::new(&arena, &settings));
        for (entry, spawn) in roster.players.iter().zip(spawns) {
            world.add_player(Player::new(
                entry.user_id,
                entry.user_name.clone(),
                entry.team,
                spawn,
                radius,
            ));
        }

        Ok(Self {
            room_id,
            owner_id: roster.owner_id,
            tick: 0,
            world,
            scheduler: CollisionScheduler::new(&settings),
            countdown: settings.goal_countdown,
            game_time: 0.0,
            time_limit,
            capped_ticks: 0,
            ended: None,
            settings,
        })
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn time_left(&self) -> f64 {
        (self.time_limit - self.game_time).max(0.0)
    }

    /// Replace a player's held keys
    pub fn set_move(&mut self, user_id: PlayerId, commands: MoveCommands) -> bool {
        match self.world.player_mut(user_id) {
            Some(player) => {
                player.commands = commands;
                true
            }
            None => {
                debug!(room_id = %self.room_id, user_id = %user_id, "Move from non-participant");
                false
            }
        }
    }

    /// Arm an impulse for the next tick if the player is allowed one
    pub fn request_impulse(&mut self, user_id: PlayerId) -> bool {
        let countdown = self.countdown;
        let cooldown = self.settings.impulse_cooldown;
        let room_id = self.room_id;
        let Some(player) = self.world.player_mut(user_id) else {
            debug!(room_id = %room_id, user_id = %user_id, "Impulse from non-participant");
            return false;
        };

        if player.pending_impulse || !ImpulseSystem::can_trigger(player.impulse_cooldown, countdown)
        {
            debug!(room_id = %room_id, user_id = %user_id, "Impulse rejected");
            return false;
        }

        player.pending_impulse = true;
        player.impulse_cooldown = cooldown;
        true
    }

    /// End the match on the owner's request
    pub fn request_end(&mut self, user_id: Uuid) -> bool {
        if user_id != self.owner_id {
            debug!(room_id = %self.room_id, user_id = %user_id, "End request from non-owner");
            return false;
        }
        self.finish(EndReason::EndedByOwner);
        true
    }

    /// Drop a departed player. The match ends once nobody is left.
    pub fn remove_player(&mut self, user_id: PlayerId) -> bool {
        if self.world.remove_player(user_id).is_none() {
            return false;
        }
        if self.world.player_count() == 0 {
            self.finish(EndReason::Abandoned);
        }
        true
    }

    fn finish(&mut self, reason: EndReason) {
        if self.ended.is_none() {
            self.ended = Some(reason);
        }
    }

    /// Advance the match by one tick. `elapsed` is the measured wall-clock
    /// time since the previous tick and drives the timers only.
    pub fn step(&mut self, elapsed: f64) -> Option<EndReason> {
        if self.ended.is_some() {
            return self.ended;
        }
        self.tick += 1;
        let elapsed = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };

        self.countdown -= elapsed;
        if self.countdown < 0.0 {
            self.countdown = 0.0;
            self.game_time += elapsed;
        }

        if self.game_time >= self.time_limit {
            self.finish(EndReason::TimeUp);
            return self.ended;
        }

        if self.countdown <= 0.0 {
            self.update_game(elapsed);
        }

        self.ended
    }

    fn update_game(&mut self, elapsed: f64) {
        // Impulse phase
        let pending: Vec<PlayerId> = self
            .world
            .players()
            .iter()
            .filter(|p| p.pending_impulse)
            .map(|p| p.id)
            .collect();
        for id in pending {
            ImpulseSystem::fire(&mut self.world, id, &self.settings);
        }
        for player in self.world.players_mut() {
            player.pending_impulse = false;
            player.impulse_cooldown = ImpulseSystem::update_cooldown(player.impulse_cooldown, elapsed);
        }

        let governed = self.world.govern_speeds(self.settings.max_speed);
        if governed > 0 {
            debug!(room_id = %self.room_id, governed, "Speeds capped");
        }

        self.world.refresh_all_move_vectors(self.settings.move_speed);
        let report = self.scheduler.run(&mut self.world);

        for fault in &report.faults {
            warn!(room_id = %self.room_id, tick = self.tick, %fault, "Physics fault recovered");
        }

        if report.hit_iteration_cap() {
            self.capped_ticks += 1;
            if self.capped_ticks >= FATAL_CAPPED_TICKS {
                error!(
                    room_id = %self.room_id,
                    ticks = self.capped_ticks,
                    "Collision loop keeps hitting its cap, stopping match"
                );
                self.finish(EndReason::EngineFailure);
            }
        } else {
            self.capped_ticks = 0;
        }

        if report.goal.is_some() {
            self.countdown = self.settings.goal_countdown;
        }

        self.world.reset_all_motion();
        self.world.apply_friction(self.settings.friction);
    }

    pub fn summary(&self) -> MatchSummary {
        match self.ended {
            Some(EndReason::EngineFailure) => failure_summary(),
            _ => build_summary(&self.world, self.settings.scorer_list_length),
        }
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub room_id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
    /// Roster members still in the match
    participants: Arc<DashSet<Uuid>>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    pub fn is_participant(&self, user_id: &Uuid) -> bool {
        self.participants.contains(user_id)
    }
}

/// Registry of all active matches, keyed by room
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, room_id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(room_id).map(|m| m.value().clone())
    }

    pub fn remove(&self, room_id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(room_id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }

    /// Create a match for `room_id` and spawn its task. The entry is
    /// removed when the match ends.
    pub fn start(
        self: &Arc<Self>,
        room_id: Uuid,
        roster: &MatchRoster,
        settings: MatchSettings,
    ) -> Result<MatchHandle, MatchSetupError> {
        let (game_match, handle) = match self.matches.entry(room_id) {
            Entry::Occupied(_) => return Err(MatchSetupError::AlreadyRunning(room_id)),
            Entry::Vacant(slot) => {
                let (game_match, handle) = GameMatch::new(room_id, roster, settings)?;
                slot.insert(handle.clone());
                (game_match, handle)
            }
        };

        info!(
            room_id = %room_id,
            player_count = roster.players.len(),
            time_limit = %roster.time_limit,
            "Created new match"
        );

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            game_match.run().await;
            registry.remove(&room_id);
            info!(room_id = %room_id, "Match removed from registry");
        });

        Ok(handle)
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game match
pub struct GameMatch {
    state: MatchState,
    input_rx: mpsc::Receiver<PlayerInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
    participants: Arc<DashSet<Uuid>>,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        room_id: Uuid,
        roster: &MatchRoster,
        settings: MatchSettings,
    ) -> Result<(Self, MatchHandle), MatchSetupError> {
        let state = MatchState::new(room_id, roster, settings)?;
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(state.world.player_count()));
        let participants: Arc<DashSet<Uuid>> =
            Arc::new(roster.players.iter().map(|p| p.user_id).collect());

        let handle = MatchHandle {
            room_id,
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
            participants: participants.clone(),
        };

        let game_match = Self {
            snapshot_builder: SnapshotBuilder::new(state.world.arena),
            state,
            input_rx,
            snapshot_tx,
            player_count,
            participants,
        };

        Ok((game_match, handle))
    }

    /// Run the authoritative tick loop, returning the final summary
    pub async fn run(mut self) -> MatchSummary {
        let room_id = self.state.room_id;
        info!(room_id = %room_id, players = self.state.world.player_count(), "Match started");

        let mut tick_interval = interval(tick_duration(self.state.settings().refresh_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = TickClock::new();

        loop {
            tick_interval.tick().await;

            // Drain input queue
            self.process_inputs();

            let ended = self.state.step(clock.lap_secs());

            let snapshot = self.snapshot_builder.build(
                self.state.tick,
                &self.state.world,
                self.state.countdown,
                self.state.time_left(),
            );
            // No receivers is fine
            let _ = self.snapshot_tx.send(snapshot);

            if let Some(reason) = ended {
                info!(room_id = %room_id, reason = ?reason, tick = self.state.tick, "Match ended");
                break;
            }
        }

        let summary = self.state.summary();
        let _ = self.snapshot_tx.send(ServerMsg::MatchEnd {
            summary: summary.clone(),
        });
        summary
    }

    /// Process all pending inputs from players
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input.msg {
                ClientMsg::Move {
                    left,
                    right,
                    up,
                    down,
                } => {
                    self.state.set_move(
                        input.user_id,
                        MoveCommands {
                            left,
                            right,
                            up,
                            down,
                        },
                    );
                }
                ClientMsg::Impulse => {
                    self.state.request_impulse(input.user_id);
                }
                ClientMsg::EndMatch => {
                    self.state.request_end(input.user_id);
                }
                ClientMsg::Ping { t } => {
                    let _ = self.snapshot_tx.send(ServerMsg::Pong {
                        user_id: input.user_id,
                        t,
                    });
                }
                ClientMsg::LeaveMatch => {
                    self.handle_leave(input.user_id);
                }
            }
        }
    }

    /// Handle player leave
    fn handle_leave(&mut self, user_id: Uuid) {
        if !self.state.remove_player(user_id) {
            return;
        }
        self.player_count
            .store(self.state.world.player_count(), Ordering::Relaxed);
        self.participants.remove(&user_id);

        let _ = self.snapshot_tx.send(ServerMsg::PlayerLeft {
            user_id,
            reason: "left".to_string(),
        });

        info!(
            room_id = %self.state.room_id,
            user_id = %user_id,
            "Player left match"
        );
    }
}
