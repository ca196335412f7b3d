//! # Public-Safety Scenario Domain Model
//!
//! Geometry, node, mobility, flow and bearer descriptors for public-safety
//! network scenarios. These types are the single source of truth across the
//! generators, the engine seam and the output writers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Cartesian position in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance in the XY plane
    #[must_use]
    pub fn planar_distance_to(&self, other: &Point3) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Full 3D Euclidean distance
    #[must_use]
    pub fn distance_to(&self, other: &Point3) -> f64 {
        let dz = other.z - self.z;
        self.planar_distance_to(other).hypot(dz)
    }

    /// Linear interpolation, `progress` clamped to `[0, 1]`
    #[must_use]
    pub fn lerp(&self, to: &Point3, progress: f64) -> Point3 {
        let p = progress.clamp(0.0, 1.0);
        Point3 {
            x: self.x + (to.x - self.x) * p,
            y: self.y + (to.y - self.y) * p,
            z: self.z + (to.z - self.z) * p,
        }
    }
}

/// Axis-aligned rectangle in the XY plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// Build bounds, rejecting reversed or non-finite extents.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidParameter`] when `x_max < x_min`,
    /// `y_max < y_min` or any value is not finite.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Result<Self> {
        let finite = [x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite());
        if !finite || x_max < x_min || y_max < y_min {
            return Err(ScenarioError::InvalidParameter(format!(
                "invalid bounds x=[{x_min}, {x_max}] y=[{y_min}, {y_max}]"
            )));
        }
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    /// Square of side `side` anchored at the origin
    pub fn square(side: f64) -> Result<Self> {
        Self::new(0.0, side, 0.0, side)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Inclusive containment test
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// Permissible walking/driving speed range in m/s
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    pub min_mps: f64,
    pub max_mps: f64,
}

impl SpeedRange {
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidSpeedRange`] unless `0 < min <= max`.
    pub fn new(min_mps: f64, max_mps: f64) -> Result<Self> {
        let range = Self { min_mps, max_mps };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_mps > 0.0 && self.min_mps <= self.max_mps && self.max_mps.is_finite()) {
            return Err(ScenarioError::InvalidSpeedRange {
                min_mps: self.min_mps,
                max_mps: self.max_mps,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, speed_mps: f64) -> bool {
        speed_mps >= self.min_mps && speed_mps <= self.max_mps
    }
}

/// Start-time jitter window in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min_ms: f64,
    pub max_ms: f64,
}

impl JitterRange {
    pub const fn new(min_ms: f64, max_ms: f64) -> Self {
        Self { min_ms, max_ms }
    }
}

/// Identifier of a node handed to the external engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ENUMS
// =============================================================================

/// Role of a generated node in the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    RemoteHost,
    LteMacro,
    MmWaveBs,
    WiredDonor,
    IabRelay,
    FirstResponder,
    SwatOfficer,
    WheelbarrowRobot,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteHost => "REMOTE_HOST",
            Self::LteMacro => "LTE_MACRO",
            Self::MmWaveBs => "MMWAVE_BS",
            Self::WiredDonor => "WIRED_DONOR",
            Self::IabRelay => "IAB_RELAY",
            Self::FirstResponder => "FIRST_RESPONDER",
            Self::SwatOfficer => "SWAT_OFFICER",
            Self::WheelbarrowRobot => "WHEELBARROW_ROBOT",
        }
    }

    /// Site classification for infrastructure roles
    pub fn site_role(&self) -> Option<SiteRole> {
        match self {
            Self::LteMacro => Some(SiteRole::Macro),
            Self::MmWaveBs | Self::WiredDonor => Some(SiteRole::SmallCell),
            Self::IabRelay => Some(SiteRole::Relay),
            _ => None,
        }
    }
}

/// Base station / anchor classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteRole {
    Macro,
    SmallCell,
    Relay,
}

/// Network device installed on a node by the external engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceKind {
    MmWaveBs,
    LteBs,
    IabNode,
    /// Dual-connected (LTE + mmWave) user equipment
    MultiConnectivityUe,
    MmWaveUe,
}

/// Traffic direction relative to the user equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Uplink,
    Downlink,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uplink => "UL",
            Self::Downlink => "DL",
        }
    }
}

/// Movement policy of a relay carried by a team leader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMode {
    /// Relay moves with its carrier (mode 1)
    Follow,
    /// Relay halts where it would lose line of sight to its anchor (mode 2)
    LineOfSightHold,
}

impl RelayMode {
    /// Map the numeric scenario parameter to a mode
    pub fn from_mode_number(mode: u32) -> Result<Self> {
        match mode {
            1 => Ok(Self::Follow),
            2 => Ok(Self::LineOfSightHold),
            other => Err(ScenarioError::InvalidParameter(format!(
                "unknown relay mobility mode {other} (expected 1 or 2)"
            ))),
        }
    }
}

/// RLC transfer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RlcMode {
    Acknowledged,
    Unacknowledged,
}

/// EPS bearer QoS class identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QosClass {
    GbrConvVoice,
    GbrConvVideo,
    GbrGaming,
    GbrNonConvVideo,
    GbrMcPushToTalk,
    GbrNmcPushToTalk,
    GbrMcVideo,
    NgbrIms,
    NgbrVideoTcpOperator,
    NgbrVoiceVideoGaming,
    NgbrVideoTcpPremium,
    NgbrVideoTcpDefault,
    NgbrMcDelaySensitiveSignalling,
    NgbrMcData,
}

impl QosClass {
    /// QCI number
    pub fn qci(&self) -> u8 {
        match self {
            Self::GbrConvVoice => 1,
            Self::GbrConvVideo => 2,
            Self::GbrGaming => 3,
            Self::GbrNonConvVideo => 4,
            Self::NgbrIms => 5,
            Self::NgbrVideoTcpOperator => 6,
            Self::NgbrVoiceVideoGaming => 7,
            Self::NgbrVideoTcpPremium => 8,
            Self::NgbrVideoTcpDefault => 9,
            Self::GbrMcPushToTalk => 65,
            Self::GbrNmcPushToTalk => 66,
            Self::GbrMcVideo => 67,
            Self::NgbrMcDelaySensitiveSignalling => 69,
            Self::NgbrMcData => 70,
        }
    }

    /// Priority level scaled by ten (lower is more important)
    pub fn priority_level(&self) -> u8 {
        match self {
            Self::GbrConvVoice => 20,
            Self::GbrConvVideo => 40,
            Self::GbrGaming => 30,
            Self::GbrNonConvVideo => 50,
            Self::NgbrIms => 10,
            Self::NgbrVideoTcpOperator => 60,
            Self::NgbrVoiceVideoGaming => 70,
            Self::NgbrVideoTcpPremium => 80,
            Self::NgbrVideoTcpDefault => 90,
            Self::GbrMcPushToTalk => 7,
            Self::GbrNmcPushToTalk => 20,
            Self::GbrMcVideo => 15,
            Self::NgbrMcDelaySensitiveSignalling => 5,
            Self::NgbrMcData => 55,
        }
    }

    pub fn is_gbr(&self) -> bool {
        matches!(
            self,
            Self::GbrConvVoice
                | Self::GbrConvVideo
                | Self::GbrGaming
                | Self::GbrNonConvVideo
                | Self::GbrMcPushToTalk
                | Self::GbrNmcPushToTalk
                | Self::GbrMcVideo
        )
    }
}

/// Radio path the transport layer uses for a bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardingPath {
    Lte,
    MmWave,
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Axis-aligned box obstacle (building, room, vehicle)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub origin_x: f64,
    pub origin_y: f64,
    /// Extent along x
    pub width: f64,
    /// Extent along y
    pub length: f64,
    pub height: f64,
}

impl Obstacle {
    #[must_use]
    pub fn x_max(&self) -> f64 {
        self.origin_x + self.width
    }

    #[must_use]
    pub fn y_max(&self) -> f64 {
        self.origin_y + self.length
    }

    /// Footprint as bounds
    #[must_use]
    pub fn footprint(&self) -> Bounds {
        Bounds {
            x_min: self.origin_x,
            x_max: self.x_max(),
            y_min: self.origin_y,
            y_max: self.y_max(),
        }
    }

    /// Strict XY overlap, optionally requiring `gap` meters of clearance
    #[must_use]
    pub fn overlaps(&self, other: &Obstacle, gap: f64) -> bool {
        self.origin_x < other.x_max() + gap
            && other.origin_x < self.x_max() + gap
            && self.origin_y < other.y_max() + gap
            && other.origin_y < self.y_max() + gap
    }
}

/// Base station or anchor placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub node: NodeId,
    pub position: Point3,
    pub role: SiteRole,
}

/// Position sample of a piecewise-linear trajectory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Point3,
    pub time_s: f64,
}

impl Waypoint {
    pub const fn new(position: Point3, time_s: f64) -> Self {
        Self { position, time_s }
    }
}

/// Time-ordered waypoint sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub waypoints: Vec<Waypoint>,
}

impl Trajectory {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }

    /// Single-waypoint trajectory that never moves
    pub fn stationary(position: Point3) -> Self {
        Self {
            waypoints: vec![Waypoint::new(position, 0.0)],
        }
    }

    pub fn start_time_s(&self) -> f64 {
        self.waypoints.first().map_or(0.0, |w| w.time_s)
    }

    pub fn end_time_s(&self) -> f64 {
        self.waypoints.last().map_or(0.0, |w| w.time_s)
    }

    /// Interpolated position; clamps to the first/last waypoint outside the span
    pub fn position_at(&self, t_s: f64) -> Point3 {
        let Some(first) = self.waypoints.first() else {
            return Point3::default();
        };
        if t_s <= first.time_s {
            return first.position;
        }
        for pair in self.waypoints.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if t_s <= to.time_s {
                let span = to.time_s - from.time_s;
                if span <= 0.0 {
                    return to.position;
                }
                return from.position.lerp(&to.position, (t_s - from.time_s) / span);
            }
        }
        self.waypoints[self.waypoints.len() - 1].position
    }

    /// Velocity vector (m/s) of the segment active at `t_s`
    pub fn velocity_at(&self, t_s: f64) -> Point3 {
        for pair in self.waypoints.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if t_s >= from.time_s && t_s < to.time_s {
                let span = to.time_s - from.time_s;
                return Point3::new(
                    (to.position.x - from.position.x) / span,
                    (to.position.y - from.position.y) / span,
                    (to.position.z - from.position.z) / span,
                );
            }
        }
        Point3::default()
    }

    /// Total travelled distance in the XY plane
    pub fn path_length_m(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|p| p[0].position.planar_distance_to(&p[1].position))
            .sum()
    }

    /// Highest speed required between consecutive waypoints
    pub fn max_segment_speed_mps(&self) -> f64 {
        self.waypoints
            .windows(2)
            .filter_map(|p| {
                let dt = p[1].time_s - p[0].time_s;
                let d = p[0].position.planar_distance_to(&p[1].position);
                (d > 0.0).then(|| if dt > 0.0 { d / dt } else { f64::INFINITY })
            })
            .fold(0.0, f64::max)
    }

    /// Same trajectory with every waypoint moved to height `z`
    #[must_use]
    pub fn with_height(mut self, z: f64) -> Self {
        for w in &mut self.waypoints {
            w.position.z = z;
        }
        self
    }
}

/// How the external mobility subsystem positions a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeMobility {
    Constant { position: Point3 },
    Waypoints { trajectory: Trajectory },
}

impl NodeMobility {
    pub fn position_at(&self, t_s: f64) -> Point3 {
        match self {
            Self::Constant { position } => *position,
            Self::Waypoints { trajectory } => trajectory.position_at(t_s),
        }
    }

    pub fn velocity_at(&self, t_s: f64) -> Point3 {
        match self {
            Self::Constant { .. } => Point3::default(),
            Self::Waypoints { trajectory } => trajectory.velocity_at(t_s),
        }
    }
}

/// Mobile unit: trajectory plus the speed it was generated with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileUnit {
    pub node: NodeId,
    pub speed_range: SpeedRange,
    pub speed_mps: f64,
    pub trajectory: Trajectory,
    pub carried_relay: Option<NodeId>,
}

/// Packet trace stream a flow writes into
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceHandle {
    pub file_name: String,
}

impl TraceHandle {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

/// Periodic constant-bit-rate flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub source: NodeId,
    pub sink: NodeId,
    pub sink_address: Ipv4Addr,
    pub direction: Direction,
    pub port: u16,
    pub packet_size_bytes: u32,
    /// Inter-packet interval (not rounded)
    pub interval_us: f64,
    pub start_ms: f64,
    pub end_ms: f64,
    pub trace: TraceHandle,
}

impl Flow {
    /// Number of packets sent in `[start_ms, end_ms)`
    pub fn expected_packets(&self) -> u64 {
        let active_us = (self.end_ms - self.start_ms) * 1_000.0;
        if active_us <= 0.0 || self.interval_us <= 0.0 {
            return 0;
        }
        (active_us / self.interval_us).ceil() as u64
    }
}

/// Dedicated bearer installed for one flow on one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BearerAssignment {
    pub device: NodeId,
    pub port: u16,
    pub class: QosClass,
    pub path: ForwardingPath,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Scenario construction errors; any of them aborts the whole scenario
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(
        "Placement infeasible for {what}: placed {placed} of {requested} after {attempts} attempts"
    )]
    PlacementInfeasible {
        what: String,
        placed: usize,
        requested: usize,
        attempts: u32,
    },

    #[error("Invalid grid dimensions: {rows}x{columns} (room counts must be even and non-zero)")]
    InvalidGridDimensions { rows: u32, columns: u32 },

    #[error("Invalid rate: {rate_bps} bit/s (must be positive)")]
    InvalidRate { rate_bps: f64 },

    #[error("Invalid speed range: [{min_mps}, {max_mps}] m/s")]
    InvalidSpeedRange { min_mps: f64, max_mps: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Port {port} already in use")]
    PortCollision { port: u16 },

    #[error("No ports left for {direction:?} flows")]
    PortExhausted { direction: Direction },

    #[error("Bearer already assigned on device {device} port {port}")]
    BearerAlreadyAssigned { device: NodeId, port: u16 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ScenarioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScenarioError>;
