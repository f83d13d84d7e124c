//! Body storage for one match: players, ball, goals and contact pairs

use std::collections::HashMap;

use tracing::info;

use crate::util::vec2::Vec2;

use super::arena::Arena;
use super::body::{Ball, Body, BodyId, Player, PlayerId};
use super::goal::Goals;
use crate::ws::protocol::Team;

/// Everything the collision scheduler moves
#[derive(Debug, Clone)]
pub struct World {
    pub arena: Arena,
    players: Vec<Player>,
    /// Player id -> index into `players`
    index: HashMap<PlayerId, usize>,
    pub ball: Option<Ball>,
    /// Scoring is only tracked when goals are present
    pub goals: Option<Goals>,
    /// Pairs checked for collisions: every (player, ball) plus every
    /// unordered pair of distinct players
    contacts: Vec<(BodyId, BodyId)>,
}

impl World {
    pub fn new(arena: Arena) -> Self {
        Self {
            arena,
            players: Vec::new(),
            index: HashMap::new(),
            ball: None,
            goals: None,
            contacts: Vec::new(),
        }
    }

    pub fn with_ball(mut self, ball: Ball) -> Self {
        self.ball = Some(ball);
        self.rebuild_contacts();
        self
    }

    pub fn with_goals(mut self, goals: Goals) -> Self {
        self.goals = Some(goals);
        self
    }

    /// Add a player. Returns false if the id is already present.
    pub fn add_player(&mut self, player: Player) -> bool {
        if self.index.contains_key(&player.id) {
            return false;
        }
        self.index.insert(player.id, self.players.len());
        self.players.push(player);
        self.rebuild_contacts();
        true
    }

    /// Remove a departed player from the bodies and the contact pairs
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let idx = self.index.remove(&id)?;
        let player = self.players.remove(idx);
        self.rebuild_index();
        self.rebuild_contacts();
        Some(player)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id, i))
            .collect();
    }

    fn rebuild_contacts(&mut self) {
        let has_ball = self.ball.is_some();
        let mut contacts = Vec::new();
        for (i, player) in self.players.iter().enumerate() {
            if has_ball {
                contacts.push((BodyId::Player(player.id), BodyId::Ball));
            }
            for other in &self.players[i + 1..] {
                contacts.push((BodyId::Player(player.id), BodyId::Player(other.id)));
            }
        }
        self.contacts = contacts;
    }

    pub fn contacts(&self) -> &[(BodyId, BodyId)] {
        &self.contacts
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.index.get(&id).map(|&i| &self.players[i])
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        let i = *self.index.get(&id)?;
        self.players.get_mut(i)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Every body id, players first
    pub fn body_ids(&self) -> Vec<BodyId> {
        let mut ids: Vec<BodyId> = self.players.iter().map(|p| BodyId::Player(p.id)).collect();
        if self.ball.is_some() {
            ids.push(BodyId::Ball);
        }
        ids
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        match id {
            BodyId::Player(pid) => self.player(pid).map(|p| &p.body),
            BodyId::Ball => self.ball.as_ref().map(|b| &b.body),
        }
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        match id {
            BodyId::Player(pid) => self.player_mut(pid).map(|p| &mut p.body),
            BodyId::Ball => self.ball.as_mut().map(|b| &mut b.body),
        }
    }

    pub fn bodies_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.players
            .iter_mut()
            .map(|p| &mut p.body)
            .chain(self.ball.iter_mut().map(|b| &mut b.body))
    }

    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.players
            .iter()
            .map(|p| &p.body)
            .chain(self.ball.iter().map(|b| &b.body))
    }

    /// Mutable access to two distinct bodies at once
    pub fn pair_mut(&mut self, a: BodyId, b: BodyId) -> Option<(&mut Body, &mut Body)> {
        match (a, b) {
            (BodyId::Player(pa), BodyId::Player(pb)) => {
                let ia = *self.index.get(&pa)?;
                let ib = *self.index.get(&pb)?;
                if ia == ib {
                    return None;
                }
                if ia < ib {
                    let (low, high) = self.players.split_at_mut(ib);
                    Some((&mut low[ia].body, &mut high[0].body))
                } else {
                    let (low, high) = self.players.split_at_mut(ia);
                    Some((&mut high[0].body, &mut low[ib].body))
                }
            }
            (BodyId::Player(pid), BodyId::Ball) => {
                let i = *self.index.get(&pid)?;
                let ball = self.ball.as_mut()?;
                Some((&mut self.players[i].body, &mut ball.body))
            }
            (BodyId::Ball, BodyId::Player(pid)) => {
                let i = *self.index.get(&pid)?;
                let ball = self.ball.as_mut()?;
                Some((&mut ball.body, &mut self.players[i].body))
            }
            (BodyId::Ball, BodyId::Ball) => None,
        }
    }

    /// Recompute a body's move vector from its held input, minus any push
    /// into a wall it is resting on
    pub fn refresh_move_vector(&mut self, id: BodyId, move_speed: f64) {
        let arena = self.arena;
        match id {
            BodyId::Player(pid) => {
                if let Some(player) = self.player_mut(pid) {
                    let input = player.commands.move_vector(move_speed);
                    player.body.move_vector = arena.block_input(&player.body, input);
                }
            }
            BodyId::Ball => {
                if let Some(ball) = self.ball.as_mut() {
                    ball.body.move_vector = Vec2::ZERO;
                }
            }
        }
    }

    pub fn refresh_all_move_vectors(&mut self, move_speed: f64) {
        for id in self.body_ids() {
            self.refresh_move_vector(id, move_speed);
        }
    }

    pub fn reset_all_motion(&mut self) {
        for body in self.bodies_mut() {
            body.reset_motion();
        }
    }

    /// Cap every velocity at `max_speed`; returns how many were too fast
    pub fn govern_speeds(&mut self, max_speed: f64) -> usize {
        self.bodies_mut()
            .map(|body| body.govern_speed(max_speed))
            .filter(|&governed| governed)
            .count()
    }

    pub fn apply_friction(&mut self, decay: f64) {
        for body in self.bodies_mut() {
            body.apply_friction(decay);
        }
    }

    /// Note a ball touch for goal credit when one side of the pair is the
    /// ball and goals are tracked
    pub fn record_ball_touch(&mut self, a: BodyId, b: BodyId) {
        let player = match (a, b) {
            (BodyId::Player(pid), BodyId::Ball) | (BodyId::Ball, BodyId::Player(pid)) => pid,
            _ => return,
        };
        let Some(team) = self.player(player).map(|p| p.team) else {
            return;
        };
        if let Some(goals) = self.goals.as_mut() {
            goals.record_touch(team, player);
        }
    }

    /// Score if the ball rests on a side wall inside an aperture.
    ///
    /// Credits the scoring team's last toucher and sends every body back
    /// to its spawn point.
    pub fn check_goal(&mut self) -> Option<Team> {
        let ball = self.ball.as_ref()?;
        let goals = self.goals.as_mut()?;
        let team = goals.scoring_team(&ball.body, &self.arena)?;
        let scorer = goals.award(team);
        let score = (goals.score(Team::Orange), goals.score(Team::Blue));

        if let Some(player) = scorer.and_then(|id| self.player_mut(id)) {
            player.goals_scored += 1;
        }

        info!(
            scoring_team = %team,
            scorer = ?scorer,
            orange = score.0,
            blue = score.1,
            "Goal scored"
        );

        self.reset_to_spawn();
        Some(team)
    }

    /// All bodies back to spawn with no motion; impulses recharged
    pub fn reset_to_spawn(&mut self) {
        for player in &mut self.players {
            player.respawn();
        }
        if let Some(ball) = self.ball.as_mut() {
            ball.respawn();
        }
    }
}
