//! Random, non-overlapping rectangular obstacles (buildings, vehicles).

use psc_domain::{Bounds, Obstacle, Result, ScenarioError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry;
use crate::placement::DEFAULT_MAX_ATTEMPTS;
use crate::rng::RandomNumberStream;

/// Obstacles placed so far inside an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleLayout {
    pub area: Bounds,
    pub obstacles: Vec<Obstacle>,
}

impl ObstacleLayout {
    pub fn new(area: Bounds) -> Self {
        Self {
            area,
            obstacles: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

/// Size and count of randomly sized obstacles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    pub count: usize,
    pub min_size_m: f64,
    pub max_size_m: f64,
    pub min_height_m: f64,
    pub max_height_m: f64,
    pub area_width_m: f64,
    pub area_height_m: f64,
    /// Clearance kept between any two obstacles
    pub min_gap_m: f64,
}

/// Fresh layouts tried by [`ObstacleLayoutGenerator::place_all_fixed`] before
/// giving up.
pub const DEFAULT_LAYOUT_RESTARTS: u32 = 20;

/// Footprint and height of a fixed-size obstacle such as a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedFootprint {
    pub width_m: f64,
    pub length_m: f64,
    pub height_m: f64,
}

impl FixedFootprint {
    pub const fn new(width_m: f64, length_m: f64, height_m: f64) -> Self {
        Self {
            width_m,
            length_m,
            height_m,
        }
    }
}

/// Rejection sampler for boxes.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleLayoutGenerator {
    max_attempts: u32,
}

impl ObstacleLayoutGenerator {
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

    /// Generate `spec.count` obstacles in `[0, area_width] x [0, area_height]`.
    ///
    /// Per candidate the stream is drawn for width, length, x and y; the
    /// height is drawn once the candidate is accepted.
    pub fn generate(&self, stream: &mut RandomNumberStream, spec: &ObstacleSpec) -> Result<ObstacleLayout> {
        if spec.min_size_m <= 0.0 || spec.max_size_m < spec.min_size_m {
            return Err(ScenarioError::InvalidParameter(format!(
                "obstacle size range [{}, {}] is invalid",
                spec.min_size_m, spec.max_size_m
            )));
        }
        let mut layout = ObstacleLayout::new(Bounds::new(0.0, spec.area_width_m, 0.0, spec.area_height_m)?);

        for _ in 0..spec.count {
            self.try_place(
                stream,
                &mut layout,
                |s| (s.draw(spec.min_size_m, spec.max_size_m), s.draw(spec.min_size_m, spec.max_size_m)),
                (spec.min_height_m, spec.max_height_m),
                spec.min_gap_m,
                "buildings",
                spec.count,
            )?;
        }

        info!(
            "Generated {} obstacles in {}x{} m",
            layout.len(),
            spec.area_width_m,
            spec.area_height_m
        );
        Ok(layout)
    }

    /// Drop one fixed-footprint obstacle into an existing layout.
    pub fn place_fixed(
        &self,
        stream: &mut RandomNumberStream,
        layout: &mut ObstacleLayout,
        width_m: f64,
        length_m: f64,
        height_m: f64,
        min_gap_m: f64,
    ) -> Result<Obstacle> {
        if width_m > layout.area.width() || length_m > layout.area.height() {
            return Err(ScenarioError::PlacementInfeasible {
                what: format!("{width_m}x{length_m} m obstacle"),
                placed: 0,
                requested: 1,
                attempts: 0,
            });
        }
        let requested = layout.len() + 1;
        self.try_place(
            stream,
            layout,
            |_| (width_m, length_m),
            (height_m, height_m),
            min_gap_m,
            "vehicles",
            requested,
        )
    }

    /// Drop every footprint, in order, into a fresh layout over `area`.
    ///
    /// Sequential drops can leave no room for a later footprint even though
    /// the whole set fits. In that case the layout is cleared and redrawn
    /// from the same stream, up to `restarts` times.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::PlacementInfeasible`] when a footprint is larger than
    /// the area, or every restart dead-ends.
    pub fn place_all_fixed(
        &self,
        stream: &mut RandomNumberStream,
        area: Bounds,
        footprints: &[FixedFootprint],
        min_gap_m: f64,
        restarts: u32,
    ) -> Result<ObstacleLayout> {
        let mut round = 0;
        loop {
            let mut layout = ObstacleLayout::new(area);
            let placed = footprints.iter().try_for_each(|f| {
                self.place_fixed(stream, &mut layout, f.width_m, f.length_m, f.height_m, min_gap_m)
                    .map(|_| ())
            });
            match placed {
                Ok(()) => return Ok(layout),
                // oversized footprint: no restart can help
                Err(err @ ScenarioError::PlacementInfeasible { attempts: 0, .. }) => return Err(err),
                Err(err) if round >= restarts => return Err(err),
                Err(err) => {
                    debug!("Layout restart {} after: {}", round + 1, err);
                    round += 1;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_place<F>(
        &self,
        stream: &mut RandomNumberStream,
        layout: &mut ObstacleLayout,
        mut draw_size: F,
        heights: (f64, f64),
        min_gap_m: f64,
        what: &str,
        requested: usize,
    ) -> Result<Obstacle>
    where
        F: FnMut(&mut RandomNumberStream) -> (f64, f64),
    {
        let area = layout.area;
        for _ in 0..self.max_attempts {
            let (width, length) = draw_size(stream);
            let x = stream.draw(area.x_min, (area.x_max - width).max(area.x_min));
            let y = stream.draw(area.y_min, (area.y_max - length).max(area.y_min));

            let mut candidate = Obstacle {
                id: layout.obstacles.len() as u32,
                origin_x: x,
                origin_y: y,
                width,
                length,
                height: 0.0,
            };
            let inside = candidate.x_max() <= area.x_max && candidate.y_max() <= area.y_max;
            if !inside || geometry::collides(&candidate, &layout.obstacles, min_gap_m) {
                continue;
            }

            candidate.height = if heights.0 == heights.1 {
                heights.0
            } else {
                stream.draw(heights.0, heights.1)
            };
            debug!(
                "Obstacle {} at ({:.2}, {:.2}) size {:.2}x{:.2}x{:.2}",
                candidate.id, x, y, width, length, candidate.height
            );
            layout.obstacles.push(candidate);
            return Ok(candidate);
        }

        Err(ScenarioError::PlacementInfeasible {
            what: what.to_string(),
            placed: layout.len(),
            requested,
            attempts: self.max_attempts,
        })
    }
}

impl Default for ObstacleLayoutGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant() -> ObstacleSpec {
        ObstacleSpec {
            count: 10,
            min_size_m: 50.0,
            max_size_m: 300.0,
            min_height_m: 10.0,
            max_height_m: 40.0,
            area_width_m: 1000.0,
            area_height_m: 1000.0,
            min_gap_m: 2.0,
        }
    }

    #[test]
    fn test_generated_layout_is_disjoint_and_bounded() {
        let generator = ObstacleLayoutGenerator::new();
        for seed in 1..8 {
            let mut stream = RandomNumberStream::new(seed, 1);
            let spec = plant();
            let layout = generator.generate(&mut stream, &spec).unwrap();

            assert_eq!(layout.len(), spec.count);
            for (i, a) in layout.obstacles.iter().enumerate() {
                assert!(a.origin_x >= 0.0 && a.x_max() <= 1000.0);
                assert!(a.origin_y >= 0.0 && a.y_max() <= 1000.0);
                assert!((50.0..=300.0).contains(&a.width));
                assert!((10.0..=40.0).contains(&a.height));
                for b in &layout.obstacles[i + 1..] {
                    assert!(!a.overlaps(b, spec.min_gap_m), "{a:?} and {b:?} overlap");
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_layout() {
        let generator = ObstacleLayoutGenerator::new();
        let a = generator.generate(&mut RandomNumberStream::new(9, 4), &plant()).unwrap();
        let b = generator.generate(&mut RandomNumberStream::new(9, 4), &plant()).unwrap();
        assert_eq!(a, b);
    }

    const CAR: FixedFootprint = FixedFootprint::new(2.0, 4.0, 1.5);
    const TRUCK: FixedFootprint = FixedFootprint::new(2.5, 10.0, 3.0);

    fn street() -> Bounds {
        Bounds::new(0.0, 5.5, 0.0, 25.0).unwrap()
    }

    #[test]
    fn test_vehicles_fit_in_street() {
        let generator = ObstacleLayoutGenerator::new();
        for seed in 1..20 {
            let mut stream = RandomNumberStream::new(seed, 1);
            let street = generator
                .place_all_fixed(&mut stream, street(), &[TRUCK, CAR, CAR], 0.5, DEFAULT_LAYOUT_RESTARTS)
                .unwrap();

            assert_eq!(street.len(), 3);
            let truck = street.obstacles[0];
            assert_eq!((truck.width, truck.length, truck.height), (2.5, 10.0, 3.0));
            for (i, a) in street.obstacles.iter().enumerate() {
                assert_eq!(a.id as usize, i);
                assert!(a.origin_x >= 0.0 && a.x_max() <= 5.5);
                assert!(a.origin_y >= 0.0 && a.y_max() <= 25.0);
                for b in &street.obstacles[i + 1..] {
                    assert!(!a.overlaps(b, 0.5));
                }
            }
        }
    }

    #[test]
    fn test_cars_first_can_block_the_truck() {
        let generator = ObstacleLayoutGenerator::new();
        let mut stream = RandomNumberStream::new(1, 1);
        let mut street = ObstacleLayout::new(street());

        for _ in 0..2 {
            generator.place_fixed(&mut stream, &mut street, 2.0, 4.0, 1.5, 0.5).unwrap();
        }
        assert!(matches!(
            generator.place_fixed(&mut stream, &mut street, 2.5, 10.0, 3.0, 0.5),
            Err(ScenarioError::PlacementInfeasible { placed: 2, requested: 3, .. })
        ));
        assert_eq!(street.len(), 2);
    }

    #[test]
    fn test_dead_end_without_restarts_is_reported() {
        let generator = ObstacleLayoutGenerator::with_max_attempts(50);
        let mut stream = RandomNumberStream::new(1, 1);
        // two 3 x 13 m boxes fit neither side by side nor nose to tail
        let wide = FixedFootprint::new(3.0, 13.0, 3.0);
        assert!(matches!(
            generator.place_all_fixed(&mut stream, street(), &[wide, wide], 0.0, 3),
            Err(ScenarioError::PlacementInfeasible { placed: 1, requested: 2, .. })
        ));
    }

    #[test]
    fn test_oversized_footprint_fails_without_restarting() {
        let generator = ObstacleLayoutGenerator::new();
        let mut stream = RandomNumberStream::new(1, 1);
        let result = generator.place_all_fixed(
            &mut stream,
            street(),
            &[FixedFootprint::new(6.0, 4.0, 1.5)],
            0.0,
            DEFAULT_LAYOUT_RESTARTS,
        );
        assert!(matches!(result, Err(ScenarioError::PlacementInfeasible { attempts: 0, .. })));
        assert_eq!(stream.draws(), 0);
    }

    #[test]
    fn test_overfull_area_is_infeasible() {
        let generator = ObstacleLayoutGenerator::with_max_attempts(200);
        let mut stream = RandomNumberStream::new(1, 1);
        let spec = ObstacleSpec {
            count: 50,
            min_size_m: 40.0,
            max_size_m: 50.0,
            area_width_m: 100.0,
            area_height_m: 100.0,
            ..plant()
        };
        assert!(matches!(
            generator.generate(&mut stream, &spec),
            Err(ScenarioError::PlacementInfeasible { .. })
        ));
    }
}
