//! Arena bounds and wall collision math

use crate::util::vec2::Vec2;

use super::body::Body;

/// Tolerance for overlap checks and negative collision times
pub const ROUNDING_ERROR: f64 = 0.001;

/// Distance within which a position is treated as lying on a wall
const WALL_SNAP: f64 = 1e-9;

/// One of the four arena edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wall {
    Left,
    Right,
    Top,
    Bottom,
}

impl Wall {
    pub const ALL: [Wall; 4] = [Wall::Left, Wall::Right, Wall::Top, Wall::Bottom];
}

/// Fixed rectangular play area; y grows downward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
}

impl Arena {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Center coordinate a body of `radius` has when resting on `wall`
    pub fn boundary(&self, wall: Wall, radius: f64) -> f64 {
        match wall {
            Wall::Left | Wall::Top => radius,
            Wall::Right => self.width - radius,
            Wall::Bottom => self.height - radius,
        }
    }

    /// Earliest time the body reaches a wall at its current motion.
    ///
    /// Each direction gives `(boundary - position) / motion`; only walls
    /// the body moves toward count, small negatives round to zero, and NaN
    /// is discarded. Equal times resolve in `Wall::ALL` order.
    pub fn next_wall_collision(&self, body: &Body) -> Option<(f64, Wall)> {
        let motion = body.motion();
        Wall::ALL
            .iter()
            .filter_map(|&wall| {
                let (position, speed, approaching) = match wall {
                    Wall::Left => (body.position.x, motion.x, motion.x < 0.0),
                    Wall::Right => (body.position.x, motion.x, motion.x > 0.0),
                    Wall::Top => (body.position.y, motion.y, motion.y < 0.0),
                    Wall::Bottom => (body.position.y, motion.y, motion.y > 0.0),
                };
                if !approaching {
                    return None;
                }
                let time = round_small_negative((self.boundary(wall, body.radius) - position) / speed);
                (time >= 0.0).then_some((time, wall))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Reflect off `wall`: the perpendicular velocity component turns away
    /// from the wall, the tangential one is kept, and the body is placed
    /// exactly on the boundary.
    pub fn reflect(&self, body: &mut Body, wall: Wall) {
        let boundary = self.boundary(wall, body.radius);
        match wall {
            Wall::Left => {
                body.velocity.x = body.velocity.x.abs();
                body.position.x = boundary;
            }
            Wall::Right => {
                body.velocity.x = -body.velocity.x.abs();
                body.position.x = boundary;
            }
            Wall::Top => {
                body.velocity.y = body.velocity.y.abs();
                body.position.y = boundary;
            }
            Wall::Bottom => {
                body.velocity.y = -body.velocity.y.abs();
                body.position.y = boundary;
            }
        }
    }

    /// Within rounding distance of `wall`, as used for impulse bounces
    pub fn is_touching(&self, body: &Body, wall: Wall) -> bool {
        self.gap(body, wall) <= ROUNDING_ERROR
    }

    /// Lying exactly on `wall` once snapped
    pub fn is_resting_on(&self, body: &Body, wall: Wall) -> bool {
        self.gap(body, wall) <= WALL_SNAP
    }

    fn gap(&self, body: &Body, wall: Wall) -> f64 {
        let boundary = self.boundary(wall, body.radius);
        let position = match wall {
            Wall::Left | Wall::Right => body.position.x,
            Wall::Top | Wall::Bottom => body.position.y,
        };
        (position - boundary).abs()
    }

    pub fn touching_walls<'a>(&'a self, body: &'a Body) -> impl Iterator<Item = Wall> + 'a {
        Wall::ALL
            .into_iter()
            .filter(move |&wall| self.is_touching(body, wall))
    }

    /// Drop the components of `input` that push into a wall the body rests on
    pub fn block_input(&self, body: &Body, input: Vec2) -> Vec2 {
        let mut out = input;
        for wall in Wall::ALL.into_iter().filter(|&w| self.is_resting_on(body, w)) {
            match wall {
                Wall::Left if out.x < 0.0 => out.x = 0.0,
                Wall::Right if out.x > 0.0 => out.x = 0.0,
                Wall::Top if out.y < 0.0 => out.y = 0.0,
                Wall::Bottom if out.y > 0.0 => out.y = 0.0,
                _ => {}
            }
        }
        out
    }

    /// Keep the body inside the walls, snapping float dust onto the
    /// boundary. Returns the distance it had to be moved.
    pub fn clamp_inside(&self, body: &mut Body) -> f64 {
        let r = body.radius;
        let before = body.position;
        body.position.x = snap_clamp(body.position.x, r, self.width - r);
        body.position.y = snap_clamp(body.position.y, r, self.height - r);
        before.distance_to(body.position)
    }

    pub fn contains(&self, body: &Body) -> bool {
        let r = body.radius;
        let p = body.position;
        p.x >= r - ROUNDING_ERROR
            && p.x <= self.width - r + ROUNDING_ERROR
            && p.y >= r - ROUNDING_ERROR
            && p.y <= self.height - r + ROUNDING_ERROR
    }

    /// Position as fractions of the arena size
    pub fn normalize(&self, position: Vec2) -> (f64, f64) {
        (position.x / self.width, position.y / self.height)
    }
}

/// Treat tiny negative times produced by float error as "now"
pub fn round_small_negative(time: f64) -> f64 {
    if time < 0.0 && time > -ROUNDING_ERROR {
        0.0
    } else {
        time
    }
}

fn snap_clamp(value: f64, min: f64, max: f64) -> f64 {
    if value <= min + WALL_SNAP {
        min
    } else if value >= max - WALL_SNAP {
        max
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Arena {
        Arena::new(16.0, 9.0)
    }

    #[test]
    fn test_wall_time_is_closed_form_ratio() {
        let mut body = Body::new(Vec2::new(14.0, 4.5), 0.5);
        body.velocity = Vec2::new(15.0, 0.0);
        let (time, wall) = arena().next_wall_collision(&body).unwrap();
        assert_eq!(wall, Wall::Right);
        assert!((time - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_resting_body_has_no_wall_collision() {
        let body = Body::new(Vec2::new(0.5, 4.5), 0.5);
        assert!(arena().next_wall_collision(&body).is_none());
    }

    #[test]
    fn test_moving_away_from_touched_wall_is_not_a_collision() {
        let mut body = Body::new(Vec2::new(0.5, 4.5), 0.5);
        body.velocity = Vec2::new(3.0, 0.0);
        let (time, wall) = arena().next_wall_collision(&body).unwrap();
        assert_eq!(wall, Wall::Right);
        assert!(time > 1.0);
    }

    #[test]
    fn test_earliest_of_two_walls_wins() {
        let mut body = Body::new(Vec2::new(15.0, 8.0), 0.5);
        body.velocity = Vec2::new(1.0, 10.0);
        let (time, wall) = arena().next_wall_collision(&body).unwrap();
        assert_eq!(wall, Wall::Bottom);
        assert!((time - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_small_overshoot_rounds_to_now() {
        let mut body = Body::new(Vec2::new(15.5 + 1e-6, 4.5), 0.5);
        body.velocity = Vec2::new(2.0, 0.0);
        let (time, wall) = arena().next_wall_collision(&body).unwrap();
        assert_eq!(wall, Wall::Right);
        assert_eq!(time, 0.0);
    }

    #[test]
    fn test_reflection_negates_perpendicular_only() {
        let mut body = Body::new(Vec2::new(15.5, 4.0), 0.5);
        body.velocity = Vec2::new(7.0, -3.0);
        arena().reflect(&mut body, Wall::Right);
        assert_eq!(body.velocity, Vec2::new(-7.0, -3.0));
        assert_eq!(body.position.x, 15.5);
    }

    #[test]
    fn test_input_into_wall_is_blocked() {
        let body = Body::new(Vec2::new(5.0, 8.5), 0.5);
        let blocked = arena().block_input(&body, Vec2::new(15.0, 15.0));
        assert_eq!(blocked, Vec2::new(15.0, 0.0));
        let away = arena().block_input(&body, Vec2::new(0.0, -15.0));
        assert_eq!(away, Vec2::new(0.0, -15.0));
    }

    #[test]
    fn test_input_closes_sub_millimetre_gap() {
        let body = Body::new(Vec2::new(0.5005, 4.5), 0.5);
        assert!(arena().is_touching(&body, Wall::Left));
        assert!(!arena().is_resting_on(&body, Wall::Left));
        let input = arena().block_input(&body, Vec2::new(-15.0, 0.0));
        assert_eq!(input, Vec2::new(-15.0, 0.0));

        let snapped = Body::new(Vec2::new(0.5, 4.5), 0.5);
        assert_eq!(arena().block_input(&snapped, Vec2::new(-15.0, 0.0)), Vec2::ZERO);
    }

    #[test]
    fn test_clamp_snaps_float_dust_onto_wall() {
        let mut body = Body::new(Vec2::new(0.25 + 1e-12, 4.5), 0.25);
        arena().clamp_inside(&mut body);
        assert_eq!(body.position.x, 0.25);

        let mut outside = Body::new(Vec2::new(-1.0, 20.0), 0.25);
        arena().clamp_inside(&mut outside);
        assert_eq!(outside.position, Vec2::new(0.25, 8.75));
        assert!(arena().contains(&outside));
    }
}
