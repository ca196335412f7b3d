//! Waypoint trajectories for teams and the relays they carry.

use psc_domain::{Obstacle, Point3, RelayMode, Result, ScenarioError, SpeedRange, Trajectory, Waypoint};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry;
use crate::rng::RandomNumberStream;

/// Default sampling step (m) when searching for the visibility boundary.
pub const DEFAULT_LOS_RESOLUTION_M: f64 = 0.25;

/// Bisection rounds refining the visibility boundary inside one step.
const LOS_REFINEMENT_ROUNDS: u32 = 30;

/// A team walking a route at one constant speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPath {
    pub speed_mps: f64,
    pub depart_s: f64,
    pub arrival_s: f64,
    pub trajectory: Trajectory,
}

/// Mobility path generator.
#[derive(Debug, Clone, Copy)]
pub struct MobilityPathGenerator {
    /// Sampling step along the carrier path for line-of-sight checks
    los_resolution_m: f64,
}

impl MobilityPathGenerator {
    pub fn new(los_resolution_m: f64) -> Self {
        Self {
            los_resolution_m: if los_resolution_m > 0.0 {
                los_resolution_m
            } else {
                DEFAULT_LOS_RESOLUTION_M
            },
        }
    }

    /// Walk `route` at a speed drawn from `speed_range`, leaving at `depart_s`.
    ///
    /// Consumes exactly one draw. The team holds its start position until
    /// departure and emits a waypoint at every route vertex.
    pub fn generate_team_path(
        &self,
        stream: &mut RandomNumberStream,
        route: &[Point3],
        speed_range: SpeedRange,
        depart_s: f64,
    ) -> Result<TeamPath> {
        speed_range.validate()?;
        let Some(start) = route.first() else {
            return Err(ScenarioError::InvalidParameter("team route is empty".to_string()));
        };

        let speed = stream.draw(speed_range.min_mps, speed_range.max_mps);

        let mut waypoints = Vec::with_capacity(route.len() + 1);
        if depart_s > 0.0 {
            waypoints.push(Waypoint::new(*start, 0.0));
        }
        let mut t = depart_s;
        waypoints.push(Waypoint::new(*start, t));
        for pair in route.windows(2) {
            t += pair[0].planar_distance_to(&pair[1]) / speed;
            waypoints.push(Waypoint::new(pair[1], t));
        }

        debug!(
            "Team path: {} vertices, {:.2} m/s, depart {:.3}s, arrive {:.3}s",
            route.len(),
            speed,
            depart_s,
            t
        );

        Ok(TeamPath {
            speed_mps: speed,
            depart_s,
            arrival_s: t,
            trajectory: Trajectory::new(waypoints),
        })
    }

    /// Same path delayed by `lag_s`, for members walking in file.
    pub fn trail(&self, path: &TeamPath, lag_s: f64) -> Trajectory {
        let mut waypoints: Vec<Waypoint> = path
            .trajectory
            .waypoints
            .iter()
            .map(|w| {
                let t = if w.time_s < path.depart_s { w.time_s } else { w.time_s + lag_s };
                Waypoint::new(w.position, t)
            })
            .collect();

        if let Some(first) = waypoints.first().copied() {
            if first.time_s > 0.0 {
                waypoints.insert(0, Waypoint::new(first.position, 0.0));
            }
        }
        Trajectory::new(waypoints)
    }

    /// Trajectory of a relay carried along `carrier`.
    ///
    /// With [`RelayMode::LineOfSightHold`] the relay follows the carrier only
    /// while the straight line to `anchor` clears every obstacle, and stays at
    /// the last visible point afterwards.
    pub fn derive_relay_path(
        &self,
        carrier: &Trajectory,
        mode: RelayMode,
        anchor: &Point3,
        obstacles: &[Obstacle],
    ) -> Trajectory {
        match mode {
            RelayMode::Follow => carrier.clone(),
            RelayMode::LineOfSightHold => self.hold_line_of_sight(carrier, anchor, obstacles),
        }
    }

    fn hold_line_of_sight(&self, carrier: &Trajectory, anchor: &Point3, obstacles: &[Obstacle]) -> Trajectory {
        let Some(first) = carrier.waypoints.first().copied() else {
            return carrier.clone();
        };
        if !geometry::has_line_of_sight(anchor, &first.position, obstacles) {
            debug!("Relay starts without line of sight; holding at start");
            return Trajectory::new(vec![first]);
        }

        let mut kept = vec![first];
        for pair in carrier.waypoints.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            match self.visibility_boundary(&from.position, &to.position, anchor, obstacles) {
                None => kept.push(to),
                Some(fraction) => {
                    let stop = from.position.lerp(&to.position, fraction);
                    let t = from.time_s + (to.time_s - from.time_s) * fraction;
                    if fraction > 0.0 {
                        kept.push(Waypoint::new(stop, t));
                    }
                    debug!("Relay holds at ({:.3}, {:.3}) from {:.3}s", stop.x, stop.y, t);
                    return Trajectory::new(kept);
                }
            }
        }
        Trajectory::new(kept)
    }

    /// Largest visible fraction of `from -> to`, or `None` if all of it is visible.
    ///
    /// Assumes `from` itself is visible. Candidates are the regular samples,
    /// every obstacle's shadow breakpoints and the midpoints between them, so
    /// a shadow narrower than one sample step is still hit.
    fn visibility_boundary(
        &self,
        from: &Point3,
        to: &Point3,
        anchor: &Point3,
        obstacles: &[Obstacle],
    ) -> Option<f64> {
        let length = from.planar_distance_to(to);
        let steps = (length / self.los_resolution_m).ceil().max(1.0) as u32;
        let visible = |f: f64| geometry::has_line_of_sight(anchor, &from.lerp(to, f), obstacles);

        let mut breakpoints: Vec<f64> = (1..=steps).map(|k| f64::from(k) / f64::from(steps)).collect();
        for obstacle in obstacles {
            breakpoints.extend(geometry::shadow_breakpoints(from, to, anchor, obstacle));
        }
        breakpoints.sort_by(f64::total_cmp);
        breakpoints.dedup();

        let mut lo = 0.0;
        for f in breakpoints {
            for candidate in [(lo + f) / 2.0, f] {
                if candidate <= lo {
                    continue;
                }
                if visible(candidate) {
                    lo = candidate;
                    continue;
                }
                let mut hi = candidate;
                for _ in 0..LOS_REFINEMENT_ROUNDS {
                    let mid = (lo + hi) / 2.0;
                    if visible(mid) {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                return Some(lo);
            }
        }
        None
    }
}

impl Default for MobilityPathGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_LOS_RESOLUTION_M)
    }
}

/// Horizon long enough for the slowest team to finish its worst-case route.
///
/// `app_start_s + worst_route_m / speed_range.min + trailing_margin_s`
pub fn required_horizon_s(
    worst_route_m: f64,
    speed_range: SpeedRange,
    app_start_s: f64,
    trailing_margin_s: f64,
) -> Result<f64> {
    speed_range.validate()?;
    Ok(app_start_s + worst_route_m / speed_range.min_mps + trailing_margin_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, Corner, GridLayoutGenerator};

    fn speeds() -> SpeedRange {
        SpeedRange::new(3.0, 5.0).unwrap()
    }

    #[test]
    fn test_team_path_timing() {
        let grid = GridLayoutGenerator::generate(4, 4, 2.0, 20.0, 20.0, 3.0).unwrap();
        let route = grid.corridor_route(Corner::SouthWest, Axis::X, 1.5);
        let mut stream = RandomNumberStream::new(1, 1);
        let path = MobilityPathGenerator::default()
            .generate_team_path(&mut stream, &route, speeds(), 0.5)
            .unwrap();

        assert_eq!(stream.draws(), 1);
        assert!(speeds().contains(path.speed_mps));
        assert_eq!(path.trajectory.waypoints.len(), route.len() + 1);
        assert_eq!(path.trajectory.position_at(0.25), route[0]);
        assert_eq!(path.trajectory.position_at(path.arrival_s + 1.0), grid.center(1.5));
        let expected = 0.5 + 88.0 / path.speed_mps;
        assert!((path.arrival_s - expected).abs() < 1e-9);
        assert!((path.trajectory.max_segment_speed_mps() - path.speed_mps).abs() < 1e-9);
    }

    #[test]
    fn test_horizon_covers_slowest_team() {
        let grid = GridLayoutGenerator::generate(4, 4, 3.5, 20.0, 20.0, 3.0).unwrap();
        let horizon = required_horizon_s(grid.worst_case_route_length(), speeds(), 0.5, 0.1).unwrap();
        let generator = MobilityPathGenerator::default();

        for seed in 1..10 {
            let mut stream = RandomNumberStream::new(seed, 1);
            for (k, corner) in Corner::ALL.iter().enumerate() {
                let axis = if k % 2 == 0 { Axis::X } else { Axis::Y };
                let route = grid.corridor_route(*corner, axis, 1.5);
                let path = generator.generate_team_path(&mut stream, &route, speeds(), 0.5).unwrap();
                assert!(path.arrival_s + 0.1 <= horizon);
            }
        }
    }

    #[test]
    fn test_invalid_speed_range() {
        let mut stream = RandomNumberStream::new(1, 1);
        let bad = SpeedRange { min_mps: 0.0, max_mps: 5.0 };
        let route = [Point3::default(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            MobilityPathGenerator::default().generate_team_path(&mut stream, &route, bad, 0.0),
            Err(ScenarioError::InvalidSpeedRange { .. })
        ));
        assert_eq!(stream.draws(), 0);
    }

    #[test]
    fn test_trailing_member_lags() {
        let route = [Point3::default(), Point3::new(10.0, 0.0, 0.0)];
        let mut stream = RandomNumberStream::new(2, 1);
        let generator = MobilityPathGenerator::default();
        let path = generator.generate_team_path(&mut stream, &route, speeds(), 1.0).unwrap();
        let member = generator.trail(&path, 0.5);

        assert_eq!(member.start_time_s(), 0.0);
        assert!((member.end_time_s() - (path.arrival_s + 0.5)).abs() < 1e-9);
        let t = 2.0;
        let lead = path.trajectory.position_at(t);
        let follower = member.position_at(t);
        assert!(follower.x < lead.x);
    }

    #[test]
    fn test_follow_relay_matches_carrier() {
        let route = [Point3::default(), Point3::new(10.0, 0.0, 0.0)];
        let mut stream = RandomNumberStream::new(2, 1);
        let generator = MobilityPathGenerator::default();
        let path = generator.generate_team_path(&mut stream, &route, speeds(), 0.0).unwrap();
        let relay = generator.derive_relay_path(&path.trajectory, RelayMode::Follow, &Point3::default(), &[]);
        assert_eq!(relay, path.trajectory);
    }

    #[test]
    fn test_line_of_sight_relay_stops_before_corner() {
        let grid = GridLayoutGenerator::generate(4, 4, 2.0, 20.0, 20.0, 3.0).unwrap();
        let route = grid.corridor_route(Corner::SouthWest, Axis::X, 1.5);
        let anchor = Point3::new(-1.0, -1.0, 2.5);
        let mut stream = RandomNumberStream::new(3, 1);
        let generator = MobilityPathGenerator::default();
        let path = generator.generate_team_path(&mut stream, &route, speeds(), 0.5).unwrap();

        let relay = generator.derive_relay_path(&path.trajectory, RelayMode::LineOfSightHold, &anchor, &grid.rooms);
        let stop = relay.position_at(f64::MAX);

        // halts right after rounding into the central corridor at x = 43
        assert!((stop.x - 43.0).abs() < 1e-6);
        assert!(stop.y > -1.0 && stop.y < 0.1);
        assert!(relay.end_time_s() < path.arrival_s);

        for k in 0..=100 {
            let t = relay.end_time_s() * f64::from(k) / 100.0;
            assert!(geometry::has_line_of_sight(&anchor, &relay.position_at(t), &grid.rooms));
        }
        let beyond = path.trajectory.position_at(relay.end_time_s() + 0.5);
        assert!(!geometry::has_line_of_sight(&anchor, &beyond, &grid.rooms));
    }

    #[test]
    fn test_line_of_sight_relay_stops_at_thin_pole() {
        let pole = Obstacle { id: 0, origin_x: 0.0, origin_y: -5.0, width: 0.01, length: 1.0, height: 3.0 };
        let anchor = Point3::new(0.0, -10.0, 0.0);
        let carrier = Trajectory::new(vec![
            Waypoint::new(Point3::new(-4.9, 0.0, 0.0), 0.0),
            Waypoint::new(Point3::new(5.1, 0.0, 0.0), 10.0),
        ]);

        let relay = MobilityPathGenerator::default().derive_relay_path(
            &carrier,
            RelayMode::LineOfSightHold,
            &anchor,
            &[pole],
        );
        let stop = relay.position_at(f64::MAX);
        assert!(stop.x <= 0.0 && stop.x > -1e-6, "stopped at {stop:?}");
        assert!(relay.end_time_s() < 4.9 + 1e-9);

        for k in 0..=1000 {
            let t = 10.0 * f64::from(k) / 1000.0;
            assert!(geometry::has_line_of_sight(&anchor, &relay.position_at(t), &[pole]), "hidden at {t}");
        }
    }

    #[test]
    fn test_line_of_sight_relay_without_obstacles_follows() {
        let route = [Point3::default(), Point3::new(10.0, 0.0, 0.0), Point3::new(10.0, 10.0, 0.0)];
        let mut stream = RandomNumberStream::new(2, 1);
        let generator = MobilityPathGenerator::default();
        let path = generator.generate_team_path(&mut stream, &route, speeds(), 0.0).unwrap();
        let relay = generator.derive_relay_path(
            &path.trajectory,
            RelayMode::LineOfSightHold,
            &Point3::new(-5.0, -5.0, 0.0),
            &[],
        );
        assert_eq!(relay, path.trajectory);
    }
}
