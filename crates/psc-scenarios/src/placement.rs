//! Constrained random placement of sites and user equipment.
//!
//! Rejection sampling with a per-candidate attempt cap: a candidate is drawn
//! uniformly in the bounds (x first, then y) and redrawn until it clears every
//! exclusion zone, keeps the minimum distance to all previously accepted
//! points and, when asked, stays out of obstacle footprints.

use psc_domain::{Bounds, Obstacle, Point3, Result, ScenarioError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry;
use crate::rng::RandomNumberStream;

/// Attempts allowed per accepted candidate before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5_000;

/// Circular area kept free of placed entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub center_x: f64,
    pub center_y: f64,
    pub radius_m: f64,
}

impl ExclusionZone {
    pub const fn new(center_x: f64, center_y: f64, radius_m: f64) -> Self {
        Self {
            center_x,
            center_y,
            radius_m,
        }
    }

    /// Strictly closer to the centre than the radius.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (x - self.center_x).hypot(y - self.center_y) < self.radius_m
    }
}

/// What to place and under which constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    /// Label used in logs and errors
    pub what: String,
    pub count: usize,
    pub bounds: Bounds,
    pub exclusion_zones: Vec<ExclusionZone>,
    pub min_pairwise_distance_m: f64,
    pub z_m: f64,
    pub avoid_obstacles: bool,
}

impl PlacementRequest {
    pub fn new(what: impl Into<String>, count: usize, bounds: Bounds) -> Self {
        Self {
            what: what.into(),
            count,
            bounds,
            exclusion_zones: Vec::new(),
            min_pairwise_distance_m: 0.0,
            z_m: 0.0,
            avoid_obstacles: false,
        }
    }

    #[must_use]
    pub fn excluding(mut self, zone: ExclusionZone) -> Self {
        self.exclusion_zones.push(zone);
        self
    }

    #[must_use]
    pub fn min_distance(mut self, meters: f64) -> Self {
        self.min_pairwise_distance_m = meters;
        self
    }

    #[must_use]
    pub fn at_height(mut self, z_m: f64) -> Self {
        self.z_m = z_m;
        self
    }

    #[must_use]
    pub fn outdoor(mut self) -> Self {
        self.avoid_obstacles = true;
        self
    }
}

/// Rejection sampler for points.
#[derive(Debug, Clone, Copy)]
pub struct ConstrainedPlacementSampler {
    max_attempts: u32,
}

impl ConstrainedPlacementSampler {
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Place `request.count` points.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::PlacementInfeasible`] when one candidate exhausts the
    /// attempt cap.
    pub fn place(
        &self,
        stream: &mut RandomNumberStream,
        request: &PlacementRequest,
        obstacles: &[Obstacle],
    ) -> Result<Vec<Point3>> {
        let mut accepted: Vec<Point3> = Vec::with_capacity(request.count);

        while accepted.len() < request.count {
            let mut found = None;
            for _ in 0..self.max_attempts {
                let x = stream.draw(request.bounds.x_min, request.bounds.x_max);
                let y = stream.draw(request.bounds.y_min, request.bounds.y_max);
                let candidate = Point3::new(x, y, request.z_m);
                if Self::admissible(&candidate, request, &accepted, obstacles) {
                    found = Some(candidate);
                    break;
                }
            }

            match found {
                Some(point) => {
                    debug!("{} #{} at ({:.2}, {:.2})", request.what, accepted.len(), point.x, point.y);
                    accepted.push(point);
                }
                None => {
                    return Err(ScenarioError::PlacementInfeasible {
                        what: request.what.clone(),
                        placed: accepted.len(),
                        requested: request.count,
                        attempts: self.max_attempts,
                    });
                }
            }
        }

        Ok(accepted)
    }

    fn admissible(
        candidate: &Point3,
        request: &PlacementRequest,
        accepted: &[Point3],
        obstacles: &[Obstacle],
    ) -> bool {
        if request
            .exclusion_zones
            .iter()
            .any(|z| z.contains(candidate.x, candidate.y))
        {
            return false;
        }
        if accepted
            .iter()
            .any(|p| p.planar_distance_to(candidate) < request.min_pairwise_distance_m)
        {
            return false;
        }
        !(request.avoid_obstacles && geometry::inside_any(candidate.x, candidate.y, obstacles))
    }

    /// Evenly spaced roadside units along `y`, starting at `x_min`.
    ///
    /// Deterministic; consumes no draws.
    pub fn drop_roadside(
        x_min: f64,
        x_max: f64,
        y: f64,
        z_m: f64,
        spacing_m: f64,
        count: usize,
    ) -> Result<Vec<Point3>> {
        if spacing_m <= 0.0 && count > 1 {
            return Err(ScenarioError::InvalidParameter(format!(
                "roadside spacing must be positive, got {spacing_m}"
            )));
        }
        let positions: Vec<Point3> = (0..count)
            .map(|i| Point3::new(x_min + i as f64 * spacing_m, y, z_m))
            .collect();

        if positions.iter().any(|p| p.x > x_max) {
            return Err(ScenarioError::PlacementInfeasible {
                what: "roadside units".to_string(),
                placed: positions.iter().filter(|p| p.x <= x_max).count(),
                requested: count,
                attempts: 1,
            });
        }
        Ok(positions)
    }

    /// Macro sites on a circle of `distance_m` around the scene origin.
    ///
    /// The first site sits on the negative y axis; further sites are spread
    /// evenly around the circle. Deterministic.
    pub fn drop_macro(distance_m: f64, z_m: f64, count: usize) -> Vec<Point3> {
        (0..count)
            .map(|k| {
                let angle = -std::f64::consts::FRAC_PI_2
                    + std::f64::consts::TAU * k as f64 / count as f64;
                Point3::new(distance_m * angle.cos(), distance_m * angle.sin(), z_m)
            })
            .collect()
    }
}

impl Default for ConstrainedPlacementSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_and_min_distance_hold() {
        let sampler = ConstrainedPlacementSampler::new();
        let zone = ExclusionZone::new(500.0, 500.0, 200.0);
        for seed in 1..6 {
            let mut stream = RandomNumberStream::new(seed, 1);
            let request = PlacementRequest::new("mmWave sites", 5, Bounds::square(1000.0).unwrap())
                .excluding(zone)
                .min_distance(60.0)
                .at_height(10.0);
            let sites = sampler.place(&mut stream, &request, &[]).unwrap();

            assert_eq!(sites.len(), 5);
            for (i, a) in sites.iter().enumerate() {
                assert!((a.x - 500.0).hypot(a.y - 500.0) >= 200.0);
                assert_eq!(a.z, 10.0);
                for b in &sites[i + 1..] {
                    assert!(a.planar_distance_to(b) >= 60.0);
                }
            }
        }
    }

    #[test]
    fn test_infeasible_placement_fails_instead_of_looping() {
        let sampler = ConstrainedPlacementSampler::with_max_attempts(500);
        let mut stream = RandomNumberStream::new(1, 1);
        let request = PlacementRequest::new("dense sites", 100, Bounds::square(100.0).unwrap())
            .min_distance(500.0);

        match sampler.place(&mut stream, &request, &[]) {
            Err(ScenarioError::PlacementInfeasible { placed, requested, .. }) => {
                assert_eq!(placed, 1);
                assert_eq!(requested, 100);
            }
            other => panic!("expected PlacementInfeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_outdoor_points_avoid_obstacles() {
        let building = Obstacle { id: 0, origin_x: 0.0, origin_y: 0.0, width: 90.0, length: 100.0, height: 20.0 };
        let mut stream = RandomNumberStream::new(3, 1);
        let request = PlacementRequest::new("responders", 20, Bounds::square(100.0).unwrap()).outdoor();
        let points = ConstrainedPlacementSampler::new()
            .place(&mut stream, &request, &[building])
            .unwrap();

        assert!(points.iter().all(|p| p.x > 90.0));
    }

    #[test]
    fn test_two_draws_per_candidate() {
        let mut stream = RandomNumberStream::new(1, 1);
        let request = PlacementRequest::new("free", 4, Bounds::square(10.0).unwrap());
        ConstrainedPlacementSampler::new().place(&mut stream, &request, &[]).unwrap();
        assert_eq!(stream.draws(), 8);
    }

    #[test]
    fn test_roadside_spacing() {
        let units = ConstrainedPlacementSampler::drop_roadside(-50.0, 50.0, -1.0, 5.0, 50.0, 2).unwrap();
        assert_eq!(units[0], Point3::new(-50.0, -1.0, 5.0));
        assert_eq!(units[1], Point3::new(0.0, -1.0, 5.0));

        assert!(ConstrainedPlacementSampler::drop_roadside(-50.0, 37.5, -1.0, 5.0, 50.0, 3).is_err());
    }

    #[test]
    fn test_macro_distance() {
        let sites = ConstrainedPlacementSampler::drop_macro(500.0, 15.0, 1);
        assert!(sites[0].x.abs() < 1e-9);
        assert!((sites[0].y + 500.0).abs() < 1e-9);
    }
}
