//! Continuous collision scheduler for one tick.
//!
//! The tick budget is consumed in sub-steps: find the earliest wall or pair
//! collision, advance every body to that instant, resolve that single
//! collision, repeat. A repeat counter bounds the loop, and a post-condition
//! check after every sub-step recovers from overlap or runaway speed.

use std::f64::consts::SQRT_2;

use thiserror::Error;
use tracing::debug;

use crate::config::MatchSettings;
use crate::util::time::tick_delta;
use crate::ws::protocol::Team;

use super::arena::{Wall, ROUNDING_ERROR};
use super::body::BodyId;
use super::collision::{collision_time, overlap_depth, resolve_collision, separate};
use super::world::World;

/// Collisions resolved per tick before the loop gives up
pub const MAX_COLLISION_REPEATS: usize = 128;

/// The next event the scheduler has to resolve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collision {
    Wall { body: BodyId, wall: Wall, time: f64 },
    Pair { a: BodyId, b: BodyId, time: f64 },
}

impl Collision {
    pub fn time(&self) -> f64 {
        match self {
            Collision::Wall { time, .. } | Collision::Pair { time, .. } => *time,
        }
    }
}

/// Broken engine invariant, detected and recovered within the tick
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsFault {
    #[error("{a} and {b} overlap by {depth:.4}")]
    Overlap { a: BodyId, b: BodyId, depth: f64 },

    #[error("{body} moving at {speed:.1} past the speed cap")]
    Overspeed { body: BodyId, speed: f64 },

    #[error("collision loop stopped after {repeats} repeats")]
    IterationCap { repeats: usize },
}

/// Outcome of one scheduler run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Simulated seconds consumed, equal to the tick budget
    pub advanced: f64,
    /// Collisions resolved
    pub collisions: usize,
    pub faults: Vec<PhysicsFault>,
    /// Team that scored during the tick
    pub goal: Option<Team>,
}

impl StepReport {
    pub fn hit_iteration_cap(&self) -> bool {
        self.faults
            .iter()
            .any(|fault| matches!(fault, PhysicsFault::IterationCap { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct CollisionScheduler {
    budget: f64,
    max_speed: f64,
    /// Exchanges can carry up to two held inputs into velocity, so the
    /// post-condition only flags speeds past the cap plus this margin
    speed_slack: f64,
    move_speed: f64,
    max_repeats: usize,
}

impl CollisionScheduler {
    pub fn new(settings: &MatchSettings) -> Self {
        Self {
            budget: tick_delta(settings.refresh_rate),
            max_speed: settings.max_speed,
            speed_slack: 2.0 * SQRT_2 * settings.move_speed,
            move_speed: settings.move_speed,
            max_repeats: MAX_COLLISION_REPEATS,
        }
    }

    pub fn with_max_repeats(mut self, max_repeats: usize) -> Self {
        self.max_repeats = max_repeats;
        self
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Run one tick worth of motion over `world`
    pub fn run(&self, world: &mut World) -> StepReport {
        let mut report = StepReport::default();
        let mut remaining = self.budget;
        let mut repeats = 0;

        loop {
            self.check_invariants(world, &mut report.faults);

            let Some(collision) = next_collision(world).filter(|c| c.time() <= remaining) else {
                report.goal = advance(world, remaining);
                report.advanced += remaining;
                break;
            };

            repeats += 1;
            if repeats > self.max_repeats {
                // The rest of the tick counts as consumed without moving
                report.faults.push(PhysicsFault::IterationCap {
                    repeats: self.max_repeats,
                });
                report.advanced += remaining;
                break;
            }

            let time = collision.time();
            report.advanced += time;
            remaining -= time;

            if let Some(team) = advance(world, time) {
                // Bodies are back at spawn; nothing left to resolve
                report.goal = Some(team);
                report.advanced += remaining;
                break;
            }

            self.resolve(world, collision);
            report.collisions += 1;
        }

        self.check_invariants(world, &mut report.faults);
        report
    }

    fn resolve(&self, world: &mut World, collision: Collision) {
        match collision {
            Collision::Wall { body, wall, .. } => {
                let arena = world.arena;
                if let Some(b) = world.body_mut(body) {
                    arena.reflect(b, wall);
                }
                world.refresh_move_vector(body, self.move_speed);
            }
            Collision::Pair { a, b, .. } => {
                world.record_ball_touch(a, b);
                if let Some((body_a, body_b)) = world.pair_mut(a, b) {
                    resolve_collision(body_a, body_b);
                }
                world.refresh_move_vector(a, self.move_speed);
                world.refresh_move_vector(b, self.move_speed);
            }
        }
    }

    /// Report and repair overspeed and overlap, then keep everyone inside
    fn check_invariants(&self, world: &mut World, faults: &mut Vec<PhysicsFault>) {
        let limit = self.max_speed + self.speed_slack;
        for id in world.body_ids() {
            let Some(body) = world.body_mut(id) else {
                continue;
            };
            let speed = body.speed();
            // NaN fails the comparison too
            if !(speed <= limit) {
                faults.push(PhysicsFault::Overspeed { body: id, speed });
                body.govern_speed(self.max_speed);
            }
        }

        let arena = world.arena;
        for i in 0..world.contacts().len() {
            let (a, b) = world.contacts()[i];
            let Some((body_a, body_b)) = world.pair_mut(a, b) else {
                continue;
            };
            let depth = overlap_depth(body_a, body_b);
            if depth > ROUNDING_ERROR {
                faults.push(PhysicsFault::Overlap { a, b, depth });
                separate(body_a, body_b);
                arena.clamp_inside(body_a);
                arena.clamp_inside(body_b);
            }
        }

        for id in world.body_ids() {
            let Some(body) = world.body_mut(id) else {
                continue;
            };
            if !arena.contains(body) {
                debug!(body = %id, x = body.position.x, y = body.position.y, "Body outside arena");
            }
            arena.clamp_inside(body);
        }
    }
}

/// Earliest wall or pair collision from the current state. A wall
/// collision wins a tie with a pair.
pub fn next_collision(world: &World) -> Option<Collision> {
    let arena = world.arena;

    let wall = world
        .body_ids()
        .into_iter()
        .filter_map(|id| {
            let (time, wall) = arena.next_wall_collision(world.body(id)?)?;
            Some(Collision::Wall {
                body: id,
                wall,
                time,
            })
        })
        .min_by(|x, y| x.time().total_cmp(&y.time()));

    let pair = world
        .contacts()
        .iter()
        .filter_map(|&(a, b)| {
            let time = collision_time(world.body(a)?, world.body(b)?)?;
            Some(Collision::Pair { a, b, time })
        })
        .min_by(|x, y| x.time().total_cmp(&y.time()));

    match (wall, pair) {
        (Some(w), Some(p)) if p.time() < w.time() => Some(p),
        (Some(w), _) => Some(w),
        (None, p) => p,
    }
}

/// Move every body by `time`, then check whether the ball scored
fn advance(world: &mut World, time: f64) -> Option<Team> {
    let arena = world.arena;
    for body in world.bodies_mut() {
        body.advance(time);
        arena.clamp_inside(body);
    }
    world.check_goal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::Arena;
    use crate::game::body::{Ball, Player};
    use crate::game::goal::Goals;
    use crate::util::vec2::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn settings() -> MatchSettings {
        MatchSettings::default()
    }

    fn arena() -> Arena {
        Arena::new(16.0, 9.0)
    }

    fn add_player(world: &mut World, team: Team, at: Vec2, radius: f64) -> Uuid {
        let id = Uuid::new_v4();
        world.add_player(Player::new(id, "p".to_string(), team, at, radius));
        id
    }

    /// The engine part of a live tick
    fn tick(world: &mut World, scheduler: &CollisionScheduler, settings: &MatchSettings) -> StepReport {
        world.govern_speeds(settings.max_speed);
        world.refresh_all_move_vectors(settings.move_speed);
        let report = scheduler.run(world);
        world.reset_all_motion();
        world.apply_friction(settings.friction);
        report
    }

    #[test]
    fn test_free_flight_uses_whole_budget() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let mut world = World::new(arena()).with_ball(Ball::new(Vec2::new(8.0, 4.5), 0.25));
        world.ball.as_mut().unwrap().body.velocity = Vec2::new(10.0, 0.0);

        let report = scheduler.run(&mut world);
        assert_eq!(report.collisions, 0);
        assert!(report.faults.is_empty());
        assert!((report.advanced - 0.01).abs() < 1e-12);
        assert!((world.ball.as_ref().unwrap().body.position.x - 8.1).abs() < 1e-12);
    }

    #[test]
    fn test_wall_bounce_inside_the_tick() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let mut world = World::new(arena());
        let id = add_player(&mut world, Team::Orange, Vec2::new(15.4, 4.5), 0.5);
        world.player_mut(id).unwrap().body.velocity = Vec2::new(20.0, 0.0);

        let report = scheduler.run(&mut world);
        let body = &world.player(id).unwrap().body;
        assert_eq!(report.collisions, 1);
        assert_eq!(body.velocity, Vec2::new(-20.0, 0.0));
        // 0.005s out to the wall, 0.005s back
        assert!((body.position.x - 15.4).abs() < 1e-9);
        assert!((report.advanced - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_fast_bodies_do_not_tunnel() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let mut world = World::new(arena());
        let a = add_player(&mut world, Team::Orange, Vec2::new(6.0, 4.5), 0.5);
        let b = add_player(&mut world, Team::Blue, Vec2::new(9.0, 4.5), 0.5);
        world.player_mut(a).unwrap().body.velocity = Vec2::new(400.0, 0.0);
        world.player_mut(b).unwrap().body.velocity = Vec2::new(-400.0, 0.0);

        let report = scheduler.run(&mut world);
        assert!(report.collisions >= 1);
        let xa = world.player(a).unwrap().body.position.x;
        let xb = world.player(b).unwrap().body.position.x;
        assert!(xa < xb);
        assert!(xb - xa >= 1.0 - ROUNDING_ERROR);
        assert!(!report
            .faults
            .iter()
            .any(|f| matches!(f, PhysicsFault::Overlap { .. })));
    }

    #[test]
    fn test_player_pushes_ball_toward_right_wall() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let mut world = World::new(arena()).with_ball(Ball::new(Vec2::new(14.75, 4.5), 0.25));
        let id = add_player(&mut world, Team::Orange, Vec2::new(14.0, 4.5), 0.5);
        world.player_mut(id).unwrap().commands.right = true;

        let mut last_x = world.ball.as_ref().unwrap().body.position.x;
        for _ in 0..6 {
            tick(&mut world, &scheduler, &settings);
            let ball = &world.ball.as_ref().unwrap().body;
            assert!(ball.position.x > last_x);
            last_x = ball.position.x;
        }

        let ball = &world.ball.as_ref().unwrap().body;
        let player = &world.player(id).unwrap().body;
        assert!(ball.velocity.x > 0.0);
        assert!(ball.velocity.x > player.velocity.x);
    }

    #[test]
    fn test_ball_into_aperture_scores_and_resets() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let arena = arena();
        let mut world = World::new(arena)
            .with_ball(Ball::new(arena.center(), 0.25))
            .with_goals(Goals::new(&arena, &settings));
        let blue = add_player(&mut world, Team::Blue, Vec2::new(12.0, 4.5), 0.5);
        world.record_ball_touch(BodyId::Player(blue), BodyId::Ball);

        {
            let ball = world.ball.as_mut().unwrap();
            ball.body.position = Vec2::new(0.3, 4.5);
            ball.body.velocity = Vec2::new(-10.0, 0.0);
        }
        world.player_mut(blue).unwrap().body.position = Vec2::new(3.0, 2.0);
        world.player_mut(blue).unwrap().body.velocity = Vec2::new(5.0, 5.0);

        let report = scheduler.run(&mut world);
        assert_eq!(report.goal, Some(Team::Blue));
        assert!((report.advanced - 0.01).abs() < 1e-12);

        let goals = world.goals.as_ref().unwrap();
        assert_eq!(goals.score(Team::Blue), 1);
        assert_eq!(goals.score(Team::Orange), 0);
        assert_eq!(world.player(blue).unwrap().goals_scored, 1);

        let ball = &world.ball.as_ref().unwrap().body;
        assert_eq!(ball.position, arena.center());
        assert_eq!(ball.velocity, Vec2::ZERO);
        let player = &world.player(blue).unwrap().body;
        assert_eq!(player.position, Vec2::new(12.0, 4.5));
        assert_eq!(player.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_ball_hitting_wall_outside_aperture_bounces() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let arena = arena();
        let mut world = World::new(arena)
            .with_ball(Ball::new(arena.center(), 0.25))
            .with_goals(Goals::new(&arena, &settings));
        {
            let ball = world.ball.as_mut().unwrap();
            ball.body.position = Vec2::new(0.3, 1.0);
            ball.body.velocity = Vec2::new(-10.0, 0.0);
        }

        let report = scheduler.run(&mut world);
        assert_eq!(report.goal, None);
        assert_eq!(report.collisions, 1);
        assert!(world.ball.as_ref().unwrap().body.velocity.x > 0.0);
    }

    #[test]
    fn test_runaway_velocity_is_capped_before_collisions() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let mut world = World::new(arena());
        let id = add_player(&mut world, Team::Blue, Vec2::new(15.5, 5.0), 0.5);
        world.player_mut(id).unwrap().body.velocity = Vec2::new(-10_000.0, 0.0);

        let report = scheduler.run(&mut world);
        assert!(matches!(
            report.faults.first(),
            Some(PhysicsFault::Overspeed { .. })
        ));
        let body = &world.player(id).unwrap().body;
        assert!((body.speed() - 500.0).abs() < 1e-9);
        assert!(body.velocity.x < 0.0);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_iteration_cap_consumes_rest_of_tick() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings).with_max_repeats(0);
        let mut world = World::new(arena());
        let id = add_player(&mut world, Team::Blue, Vec2::new(15.4, 5.0), 0.5);
        world.player_mut(id).unwrap().body.velocity = Vec2::new(20.0, 0.0);

        let report = scheduler.run(&mut world);
        assert!(report.hit_iteration_cap());
        assert_eq!(report.collisions, 0);
        assert!((report.advanced - 0.01).abs() < 1e-12);
        assert_eq!(world.player(id).unwrap().body.position.x, 15.4);
    }

    #[test]
    fn test_overlap_is_reported_and_separated() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);
        let mut world = World::new(arena());
        let a = add_player(&mut world, Team::Orange, Vec2::new(5.0, 5.0), 0.5);
        let b = add_player(&mut world, Team::Blue, Vec2::new(5.5, 5.0), 0.5);

        let report = scheduler.run(&mut world);
        assert!(matches!(
            report.faults.first(),
            Some(PhysicsFault::Overlap { .. })
        ));
        let pa = world.player(a).unwrap().body.position;
        let pb = world.player(b).unwrap().body.position;
        assert!(pa.distance_to(pb) >= 1.0);
    }

    /// Random non-overlapping players plus a ball, with random velocities
    /// and held keys
    fn random_world(rng: &mut ChaCha8Rng, players: usize) -> World {
        let arena = arena();
        let mut world = World::new(arena).with_ball(Ball::new(arena.center(), 0.25));
        world.ball.as_mut().unwrap().body.velocity =
            Vec2::new(rng.gen_range(-200.0..200.0), rng.gen_range(-200.0..200.0));

        let radius = 0.5;
        while world.player_count() < players {
            let at = Vec2::new(
                rng.gen_range(radius..arena.width - radius),
                rng.gen_range(radius..arena.height - radius),
            );
            let clear = world
                .bodies()
                .all(|b| b.position.distance_to(at) > b.radius + radius + 0.01);
            if !clear {
                continue;
            }
            let team = if rng.gen_bool(0.5) { Team::Orange } else { Team::Blue };
            let id = add_player(&mut world, team, at, radius);
            let player = world.player_mut(id).unwrap();
            player.body.velocity =
                Vec2::new(rng.gen_range(-200.0..200.0), rng.gen_range(-200.0..200.0));
            player.commands.left = rng.gen_bool(0.3);
            player.commands.right = rng.gen_bool(0.3);
            player.commands.up = rng.gen_bool(0.3);
            player.commands.down = rng.gen_bool(0.3);
        }
        world
    }

    #[test]
    fn test_random_play_never_overlaps_and_conserves_budget() {
        let settings = settings();
        let scheduler = CollisionScheduler::new(&settings);

        for seed in 0..8 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut world = random_world(&mut rng, 10);

            for _ in 0..200 {
                let report = tick(&mut world, &scheduler, &settings);
                assert!((report.advanced - scheduler.budget()).abs() < 1e-9);
                assert!(
                    !report
                        .faults
                        .iter()
                        .any(|f| matches!(f, PhysicsFault::Overlap { .. })),
                    "overlap fault with seed {}",
                    seed
                );

                let arena = world.arena;
                for &(a, b) in world.contacts() {
                    let depth = overlap_depth(world.body(a).unwrap(), world.body(b).unwrap());
                    assert!(depth <= ROUNDING_ERROR, "seed {} depth {}", seed, depth);
                }
                assert!(world.bodies().all(|b| arena.contains(b)));
            }
        }
    }
}
