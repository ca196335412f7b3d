//! Footprint and line-of-sight tests against obstacle layouts.

use geo::{Intersects, Line, Rect, coord};
use psc_domain::{Obstacle, Point3};

/// XY footprint of an obstacle grown by `margin` meters on every side.
pub fn footprint(obstacle: &Obstacle, margin: f64) -> Rect<f64> {
    Rect::new(
        coord! { x: obstacle.origin_x - margin, y: obstacle.origin_y - margin },
        coord! { x: obstacle.x_max() + margin, y: obstacle.y_max() + margin },
    )
}

/// Inclusive point-in-footprint test.
pub fn point_in_obstacle(x: f64, y: f64, obstacle: &Obstacle) -> bool {
    x >= obstacle.origin_x && x <= obstacle.x_max() && y >= obstacle.origin_y && y <= obstacle.y_max()
}

/// True if the point lies inside any obstacle footprint.
pub fn inside_any(x: f64, y: f64, obstacles: &[Obstacle]) -> bool {
    obstacles.iter().any(|o| point_in_obstacle(x, y, o))
}

/// True if the candidate, grown by `gap`, touches any placed obstacle.
pub fn collides(candidate: &Obstacle, placed: &[Obstacle], gap: f64) -> bool {
    let grown = footprint(candidate, gap);
    placed.iter().any(|o| grown.intersects(&footprint(o, 0.0)))
}

/// Unobstructed straight line in the XY plane between two points.
///
/// Obstacles are treated as full-height walls; touching a wall counts as
/// blocked. A zero-length segment is visible unless it sits inside an
/// obstacle.
pub fn has_line_of_sight(from: &Point3, to: &Point3, obstacles: &[Obstacle]) -> bool {
    if from.x == to.x && from.y == to.y {
        return !inside_any(from.x, from.y, obstacles);
    }
    let line = Line::new(coord! { x: from.x, y: from.y }, coord! { x: to.x, y: to.y });
    !obstacles.iter().any(|o| line.intersects(&footprint(o, 0.0)))
}

/// Parameters in `[0, 1]` along `from -> to` where visibility from `anchor`
/// past `obstacle` can change.
///
/// The points hidden by a box form a convex region bounded by the box edges
/// and by the rays from `anchor` through its corners, so along a straight
/// path the hidden part is one interval whose ends are among these crossings.
pub fn shadow_breakpoints(from: &Point3, to: &Point3, anchor: &Point3, obstacle: &Obstacle) -> Vec<f64> {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let corners = [
        (obstacle.origin_x, obstacle.origin_y),
        (obstacle.x_max(), obstacle.origin_y),
        (obstacle.x_max(), obstacle.y_max()),
        (obstacle.origin_x, obstacle.y_max()),
    ];

    // crossing of the path with the line through (ux, uy) and (vx, vy)
    let crossing = |(ux, uy): (f64, f64), (vx, vy): (f64, f64)| {
        let (ex, ey) = (vx - ux, vy - uy);
        let denom = dx * ey - dy * ex;
        if denom.abs() < f64::EPSILON {
            return None;
        }
        let f = ((ux - from.x) * ey - (uy - from.y) * ex) / denom;
        (0.0..=1.0).contains(&f).then_some(f)
    };

    let mut breakpoints = Vec::with_capacity(8);
    for (k, corner) in corners.iter().enumerate() {
        breakpoints.extend(crossing((anchor.x, anchor.y), *corner));
        breakpoints.extend(crossing(*corner, corners[(k + 1) % 4]));
    }
    breakpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(x: f64, y: f64) -> Obstacle {
        Obstacle { id: 0, origin_x: x, origin_y: y, width: 20.0, length: 20.0, height: 3.0 }
    }

    #[test]
    fn test_line_of_sight_blocked_by_room() {
        let rooms = [room(0.0, 0.0)];
        let anchor = Point3::new(-1.0, -1.0, 2.5);

        assert!(has_line_of_sight(&anchor, &Point3::new(30.0, -1.75, 1.5), &rooms));
        assert!(!has_line_of_sight(&anchor, &Point3::new(21.0, 10.0, 1.5), &rooms));
    }

    #[test]
    fn test_collision_respects_gap() {
        let placed = [room(0.0, 0.0)];
        let candidate = room(21.0, 0.0);

        assert!(!collides(&candidate, &placed, 0.5));
        assert!(collides(&candidate, &placed, 1.5));
    }

    #[test]
    fn test_shadow_breakpoints_bound_thin_pole() {
        let pole = Obstacle { id: 0, origin_x: 0.0, origin_y: -5.0, width: 0.01, length: 1.0, height: 3.0 };
        let anchor = Point3::new(0.0, -10.0, 0.0);
        let (from, to) = (Point3::new(-4.9, 0.0, 0.0), Point3::new(5.1, 0.0, 0.0));

        let mut points = shadow_breakpoints(&from, &to, &anchor, &pole);
        points.sort_by(f64::total_cmp);
        // rays through the corners hit y = 0 at x = 0, 0.01 * 10 / 6 and 0.02
        assert!(points.iter().any(|f| (f - 0.49).abs() < 1e-12));
        assert!(points.iter().any(|f| (f - 0.492).abs() < 1e-12));
        assert!(points.iter().all(|f| (0.0..=1.0).contains(f)));

        let inside = from.lerp(&to, 0.491);
        assert!(!has_line_of_sight(&anchor, &inside, &[pole]));
    }

    #[test]
    fn test_degenerate_segment() {
        let rooms = [room(0.0, 0.0)];
        let p = Point3::new(5.0, 5.0, 0.0);
        assert!(!has_line_of_sight(&p, &p, &rooms));
        let q = Point3::new(-5.0, 5.0, 0.0);
        assert!(has_line_of_sight(&q, &q, &rooms));
    }
}
