//! Deterministic building block: a grid of rooms separated by corridors.
//!
//! Rooms are indexed `(i, j)` with `i` along x (rows) and `j` along y
//! (columns). There is no corridor around the block; the outer lane used by
//! teams runs half a corridor width outside the walls.

use psc_domain::{Obstacle, Point3, Result, ScenarioError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Axis a route leg runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }
}

/// Corners of the outer lane, counter-clockwise from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    SouthWest,
    SouthEast,
    NorthEast,
    NorthWest,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::SouthWest,
        Corner::SouthEast,
        Corner::NorthEast,
        Corner::NorthWest,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }
}

/// Generated room grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: u32,
    pub columns: u32,
    pub corridor_m: f64,
    pub room_width_m: f64,
    pub room_depth_m: f64,
    pub room_height_m: f64,
    pub rooms: Vec<Obstacle>,
}

pub struct GridLayoutGenerator;

impl GridLayoutGenerator {
    /// Build a `rows x columns` grid.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::InvalidGridDimensions`] when either count is zero or
    /// odd: the block centre must fall on a corridor intersection.
    pub fn generate(
        rows: u32,
        columns: u32,
        corridor_m: f64,
        room_width_m: f64,
        room_depth_m: f64,
        room_height_m: f64,
    ) -> Result<GridLayout> {
        if rows == 0 || columns == 0 || rows % 2 != 0 || columns % 2 != 0 {
            return Err(ScenarioError::InvalidGridDimensions { rows, columns });
        }
        if corridor_m <= 0.0 || room_width_m <= 0.0 || room_depth_m <= 0.0 || room_height_m <= 0.0 {
            return Err(ScenarioError::InvalidParameter(
                "room and corridor dimensions must be positive".to_string(),
            ));
        }

        let count = rows.checked_mul(columns).ok_or_else(|| {
            ScenarioError::InvalidParameter(format!("{rows}x{columns} rooms exceed the room index range"))
        })?;

        let mut rooms = Vec::with_capacity(count as usize);
        for i in 0..rows {
            for j in 0..columns {
                rooms.push(Obstacle {
                    id: i * columns + j,
                    origin_x: f64::from(i) * (room_width_m + corridor_m),
                    origin_y: f64::from(j) * (room_depth_m + corridor_m),
                    width: room_width_m,
                    length: room_depth_m,
                    height: room_height_m,
                });
            }
        }

        let layout = GridLayout {
            rows,
            columns,
            corridor_m,
            room_width_m,
            room_depth_m,
            room_height_m,
            rooms,
        };
        info!(
            "Generated {}x{} room grid ({:.1} x {:.1} m)",
            rows,
            columns,
            layout.size_x(),
            layout.size_y()
        );
        Ok(layout)
    }
}

impl GridLayout {
    pub fn room(&self, i: u32, j: u32) -> Option<&Obstacle> {
        if i >= self.rows || j >= self.columns {
            return None;
        }
        let index = i.checked_mul(self.columns)?.checked_add(j)?;
        self.rooms.get(index as usize)
    }

    /// Building extent along x
    pub fn size_x(&self) -> f64 {
        f64::from(self.rows) * self.room_width_m + f64::from(self.rows - 1) * self.corridor_m
    }

    /// Building extent along y
    pub fn size_y(&self) -> f64 {
        f64::from(self.columns) * self.room_depth_m + f64::from(self.columns - 1) * self.corridor_m
    }

    /// Central corridor intersection
    pub fn center(&self, z: f64) -> Point3 {
        Point3::new(self.size_x() / 2.0, self.size_y() / 2.0, z)
    }

    /// Centre lines of the interior corridors running along y
    pub fn corridor_lines_x(&self) -> Vec<f64> {
        (1..self.rows)
            .map(|k| f64::from(k) * (self.room_width_m + self.corridor_m) - self.corridor_m / 2.0)
            .collect()
    }

    /// Centre lines of the interior corridors running along x
    pub fn corridor_lines_y(&self) -> Vec<f64> {
        (1..self.columns)
            .map(|k| f64::from(k) * (self.room_depth_m + self.corridor_m) - self.corridor_m / 2.0)
            .collect()
    }

    /// Outer-lane corner, half a corridor outside the block
    pub fn corner(&self, corner: Corner, z: f64) -> Point3 {
        let h = self.corridor_m / 2.0;
        let (x, y) = match corner {
            Corner::SouthWest => (-h, -h),
            Corner::SouthEast => (self.size_x() + h, -h),
            Corner::NorthEast => (self.size_x() + h, self.size_y() + h),
            Corner::NorthWest => (-h, self.size_y() + h),
        };
        Point3::new(x, y, z)
    }

    /// Route from an outer corner to the centre.
    ///
    /// The first leg runs along the outer lane on `first_axis` up to the
    /// central corridor, the second leg runs down that corridor to the
    /// centre. A vertex is emitted at every corridor crossing.
    pub fn corridor_route(&self, corner: Corner, first_axis: Axis, z: f64) -> Vec<Point3> {
        let start = self.corner(corner, z);
        let center = self.center(z);
        let mut route = vec![start];

        let mut current = start;
        for axis in [first_axis, first_axis.other()] {
            let (from, to, lines) = match axis {
                Axis::X => (current.x, center.x, self.corridor_lines_x()),
                Axis::Y => (current.y, center.y, self.corridor_lines_y()),
            };
            let mut crossings: Vec<f64> = lines
                .into_iter()
                .filter(|c| (c - from) * (to - c) > 1e-9)
                .collect();
            if to < from {
                crossings.reverse();
            }
            crossings.push(to);

            for c in crossings {
                current = match axis {
                    Axis::X => Point3::new(c, current.y, z),
                    Axis::Y => Point3::new(current.x, c, z),
                };
                route.push(current);
            }
        }
        route
    }

    /// Upper bound of any corner-to-centre route length.
    ///
    /// Half the block plus half a corridor per axis.
    pub fn worst_case_route_length(&self) -> f64 {
        let half_row = f64::from(self.rows / 2) * (self.room_width_m + self.corridor_m) + self.corridor_m / 2.0;
        let half_column =
            f64::from(self.columns / 2) * (self.room_depth_m + self.corridor_m) + self.corridor_m / 2.0;
        half_row + half_column
    }
}
