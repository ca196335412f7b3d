//! Active-shooter response inside an office floor.
//!
//! The floor is a grid of rooms split by corridors. Wired base stations sit
//! just outside the building corners. SWAT teams enter from the corners and
//! walk the corridors to the central intersection, officers in file behind
//! their leader. A leader may carry an IAB relay that either follows them or
//! holds its last position with line of sight to the nearest wired donor.

use clap::{ArgAction, Args};
use psc_domain::{
    DeviceKind, Direction, MobileUnit, NodeId, NodeMobility, NodeRole, Point3, RelayMode, Result, ScenarioError,
    SpeedRange, Trajectory,
};
use serde::Serialize;
use tracing::{debug, info};

use super::{ScenarioProgram, UPLINK_BASE_PORT, rlc_mode};
use crate::engine::Attachment;
use crate::grid::{Axis, Corner, GridLayout, GridLayoutGenerator};
use crate::mobility::{MobilityPathGenerator, TeamPath, required_horizon_s};
use crate::plan::{PlanBuilder, ScenarioPlan};
use crate::radio::{FrameOverrides, PropagationScenario, RadioConfig};
use crate::rng::RandomNumberStream;
use crate::traffic::{DEFAULT_GUARD_MS, FlowRequest, TrafficFlowScheduler};

/// Wired base stations fit only at the four building corners.
pub const MAX_WIRED_BS: u32 = 4;

#[derive(Args, Debug, Clone, PartialEq, Serialize)]
pub struct SwatParams {
    /// Applications start time in milliseconds; teams leave at the same time
    #[arg(long, default_value = "500")]
    pub app_start_ms: u32,

    /// Data rate of each officer's video [bit/s]
    #[arg(long, default_value = "100000000")]
    pub officers_video_rate: f64,

    /// Packet size [bytes]
    #[arg(long, default_value = "1024")]
    pub packet_size: u32,

    /// Corridor width in meters
    #[arg(long, default_value = "3.5")]
    pub corridor_width: f64,

    /// Room extent along x in meters
    #[arg(long, default_value = "20")]
    pub room_width_x: f64,

    /// Room extent along y in meters
    #[arg(long, default_value = "20")]
    pub room_width_y: f64,

    #[arg(long, default_value = "3")]
    pub room_height: f64,

    /// Rooms along x (even)
    #[arg(long, default_value = "4")]
    pub num_rooms_row: u32,

    /// Rooms along y (even)
    #[arg(long, default_value = "4")]
    pub num_rooms_column: u32,

    #[arg(long, default_value = "4")]
    pub num_swat_teams: u32,

    #[arg(long, default_value = "4")]
    pub num_officers_per_team: u32,

    /// Distance between officers walking in file, in meters
    #[arg(long, default_value = "1")]
    pub officer_spacing: f64,

    /// Maximum team speed [m/s]
    #[arg(long, default_value = "5")]
    pub swat_team_max_speed: f64,

    /// Minimum team speed [m/s]
    #[arg(long, default_value = "3")]
    pub swat_team_min_speed: f64,

    /// Wired base stations at the building corners (at most 4)
    #[arg(long, default_value = "4")]
    pub num_bs: u32,

    /// Carrier frequency in hertz
    #[arg(long, default_value = "30e9")]
    pub frequency: f64,

    /// Aggregated system bandwidth in hertz
    #[arg(long, default_value = "400e6")]
    pub bandwidth: f64,

    #[arg(long, default_value = "64")]
    pub num_bs_antenna_elements: u32,

    /// Wired BS antenna height in meters
    #[arg(long, default_value = "2.5")]
    pub bs_antenna_height: f64,

    /// Relay antenna height on the team leader in meters
    #[arg(long, default_value = "1.5")]
    pub iab_antenna_height: f64,

    #[arg(long, default_value = "16")]
    pub num_ue_antenna_elements: u32,

    #[arg(long, default_value = "1.5")]
    pub ue_antenna_height: f64,

    /// RLC acknowledged mode; unacknowledged when false
    #[arg(long, default_value = "true", action = ArgAction::Set)]
    pub rlc_am: bool,

    /// RLC transmit buffer in MiB
    #[arg(long, default_value = "10")]
    pub rlc_buf_size: u32,

    /// Team leaders carry an IAB relay
    #[arg(long, default_value = "true", action = ArgAction::Set)]
    pub use_iab: bool,

    /// 1: relay follows the team; 2: relay stops while it still sees its donor
    #[arg(long, default_value = "1")]
    pub mobility_mode: u32,

    /// Delay before officers attach to the relays, in milliseconds
    #[arg(long, default_value = "300")]
    pub relay_attach_delay_ms: f64,

    /// Sampling step along the leader path for the line-of-sight search, in meters
    #[arg(long, default_value = "0.25")]
    pub los_resolution: f64,

    /// Time after the last arrival before the simulation stops, in seconds
    #[arg(long, default_value = "0.1")]
    pub app_stop_margin_s: f64,
}

impl Default for SwatParams {
    fn default() -> Self {
        Self {
            app_start_ms: 500,
            officers_video_rate: 100e6,
            packet_size: 1024,
            corridor_width: 3.5,
            room_width_x: 20.0,
            room_width_y: 20.0,
            room_height: 3.0,
            num_rooms_row: 4,
            num_rooms_column: 4,
            num_swat_teams: 4,
            num_officers_per_team: 4,
            officer_spacing: 1.0,
            swat_team_max_speed: 5.0,
            swat_team_min_speed: 3.0,
            num_bs: 4,
            frequency: 30e9,
            bandwidth: 400e6,
            num_bs_antenna_elements: 64,
            bs_antenna_height: 2.5,
            iab_antenna_height: 1.5,
            num_ue_antenna_elements: 16,
            ue_antenna_height: 1.5,
            rlc_am: true,
            rlc_buf_size: 10,
            use_iab: true,
            mobility_mode: 1,
            relay_attach_delay_ms: 300.0,
            los_resolution: 0.25,
            app_stop_margin_s: 0.1,
        }
    }
}

/// One team's generated movement.
struct TeamMovement {
    path: TeamPath,
    officers: Vec<Trajectory>,
    relay: Option<Trajectory>,
}

impl SwatParams {
    fn radio(&self) -> RadioConfig {
        RadioConfig {
            bs_antenna_elements: self.num_bs_antenna_elements,
            ue_antenna_elements: self.num_ue_antenna_elements,
            iab_antenna_elements: Some(self.num_bs_antenna_elements),
            packet_size_bytes: self.packet_size,
            rlc_mode: rlc_mode(self.rlc_am),
            rlc_buffer_mb: self.rlc_buf_size,
            channel_update_period_ms: 100,
            directional_beams: false,
            propagation: PropagationScenario::IndoorOfficeMixed,
            frame: Some(FrameOverrides::default()),
            ..RadioConfig::new(self.frequency, self.bandwidth)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.num_bs > MAX_WIRED_BS {
            return Err(ScenarioError::InvalidParameter(format!(
                "{} wired base stations requested, the building has {MAX_WIRED_BS} corners",
                self.num_bs
            )));
        }
        if self.use_iab && self.num_bs == 0 {
            return Err(ScenarioError::InvalidParameter(
                "relays need at least one wired donor".to_string(),
            ));
        }
        if self.officer_spacing < 0.0 {
            return Err(ScenarioError::InvalidParameter(format!(
                "officer spacing {} must not be negative",
                self.officer_spacing
            )));
        }
        Ok(())
    }

    /// Wired donors just outside the corners, counter-clockwise from the origin.
    fn donor_positions(&self, grid: &GridLayout) -> Vec<Point3> {
        let (x, y, z) = (grid.size_x(), grid.size_y(), self.bs_antenna_height);
        [
            Point3::new(-1.0, -1.0, z),
            Point3::new(x + 1.0, -1.0, z),
            Point3::new(x + 1.0, y + 1.0, z),
            Point3::new(-1.0, y + 1.0, z),
        ]
        .into_iter()
        .take(self.num_bs as usize)
        .collect()
    }

    fn move_teams(
        &self,
        stream: &mut RandomNumberStream,
        grid: &GridLayout,
        speeds: SpeedRange,
        mode: RelayMode,
        donors: &[Point3],
    ) -> Result<Vec<TeamMovement>> {
        let generator = MobilityPathGenerator::new(self.los_resolution);
        let depart_s = f64::from(self.app_start_ms) / 1000.0;
        let mut teams = Vec::with_capacity(self.num_swat_teams as usize);

        for t in 0..self.num_swat_teams as usize {
            let corner = Corner::from_index(t);
            let first_axis = if t % 2 == 0 { Axis::X } else { Axis::Y };
            let route = grid.corridor_route(corner, first_axis, self.ue_antenna_height);
            let path = generator.generate_team_path(stream, &route, speeds, depart_s)?;

            let officers = (0..self.num_officers_per_team)
                .map(|k| generator.trail(&path, f64::from(k) * self.officer_spacing / path.speed_mps))
                .collect();

            let relay = if self.use_iab {
                let start = route[0];
                let anchor = donors
                    .iter()
                    .min_by(|a, b| a.planar_distance_to(&start).total_cmp(&b.planar_distance_to(&start)))
                    .copied()
                    .ok_or_else(|| ScenarioError::InvalidParameter("relays need at least one wired donor".to_string()))?;
                let carrier = path.trajectory.clone().with_height(self.iab_antenna_height);
                Some(generator.derive_relay_path(&carrier, mode, &anchor, &grid.rooms))
            } else {
                None
            };

            info!(
                "Team {} from {:?}: {:.2} m/s, arrives at {:.2} s",
                t, corner, path.speed_mps, path.arrival_s
            );
            teams.push(TeamMovement { path, officers, relay });
        }
        Ok(teams)
    }
}

impl ScenarioProgram for SwatParams {
    fn name(&self) -> &'static str {
        "swat"
    }

    fn build(&self, stream: &mut RandomNumberStream) -> Result<ScenarioPlan> {
        self.validate()?;
        let grid = GridLayoutGenerator::generate(
            self.num_rooms_row,
            self.num_rooms_column,
            self.corridor_width,
            self.room_width_x,
            self.room_width_y,
            self.room_height,
        )?;
        let speeds = SpeedRange::new(self.swat_team_min_speed, self.swat_team_max_speed)?;
        let mode = RelayMode::from_mode_number(self.mobility_mode)?;
        let radio = self.radio();
        radio.validate()?;

        // the last officer of the slowest team on the longest route
        let file_length = f64::from(self.num_officers_per_team.saturating_sub(1)) * self.officer_spacing;
        let max_duration_s = required_horizon_s(
            grid.worst_case_route_length() + file_length,
            speeds,
            f64::from(self.app_start_ms) / 1000.0,
            self.app_stop_margin_s,
        )?;
        let horizon_ms = (max_duration_s * 1000.0).ceil();
        debug!("Simulation stops at {:.3} s", max_duration_s);

        let donor_positions = self.donor_positions(&grid);
        let teams = self.move_teams(stream, &grid, speeds, mode, &donor_positions)?;

        let mut builder = PlanBuilder::new(self.name(), stream.seed(), stream.run(), radio.attributes());
        let host = builder.remote_host();
        let donors = builder.add_fixed_nodes(NodeRole::WiredDonor, Some(DeviceKind::MmWaveBs), &donor_positions);

        let mut relays: Vec<NodeId> = Vec::new();
        for team in &teams {
            if let Some(relay) = &team.relay {
                relays.push(builder.add_node(
                    NodeRole::IabRelay,
                    Some(DeviceKind::IabNode),
                    NodeMobility::Waypoints { trajectory: relay.clone() },
                ));
            }
        }

        let mut officers: Vec<NodeId> = Vec::new();
        for (t, team) in teams.iter().enumerate() {
            for (k, trajectory) in team.officers.iter().enumerate() {
                let id = builder.add_node(
                    NodeRole::SwatOfficer,
                    Some(DeviceKind::MmWaveUe),
                    NodeMobility::Waypoints { trajectory: trajectory.clone() },
                );
                builder.add_mobile_unit(MobileUnit {
                    node: id,
                    speed_range: speeds,
                    speed_mps: team.path.speed_mps,
                    trajectory: trajectory.clone(),
                    carried_relay: if k == 0 { relays.get(t).copied() } else { None },
                });
                officers.push(id);
            }
        }
        builder.install_ue_internet(&officers)?;

        if self.use_iab {
            builder.attach(Attachment::RelayToClosestDonor {
                relays: relays.clone(),
                donors,
            });
            builder.attach(Attachment::ClosestBsDelayed {
                ues: officers.clone(),
                candidates: relays,
                delay_ms: self.relay_attach_delay_ms,
            });
        } else {
            builder.attach(Attachment::ClosestBs {
                ues: officers.clone(),
                candidates: donors,
                lte_anchor: None,
            });
        }

        let mut scheduler = TrafficFlowScheduler::new(DEFAULT_GUARD_MS);
        scheduler.open_direction(Direction::Uplink, UPLINK_BASE_PORT);
        let trace = builder.trace("ul-app-trace.txt");
        for officer in &officers {
            let flow = scheduler.schedule_flow(
                stream,
                &FlowRequest {
                    source: *officer,
                    sink: host.0,
                    sink_address: host.1,
                    direction: Direction::Uplink,
                    rate_bps: self.officers_video_rate,
                    packet_size_bytes: self.packet_size,
                    jitter: None,
                    start_offset_ms: f64::from(self.app_start_ms),
                    horizon_ms,
                    trace: trace.clone(),
                },
            )?;
            builder.push_flow(flow);
        }

        builder.obstacles("rooms.txt", grid.rooms);
        builder.request_mobility_trace("mobility-trace-example.mob");
        Ok(builder.build(max_duration_s * 1000.0, serde_json::to_value(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::has_line_of_sight;
    use crate::scenarios::generate;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        params: SwatParams,
    }

    #[test]
    fn test_cli_defaults_match() {
        let parsed = Cli::parse_from(["swat"]).params;
        assert_eq!(parsed, SwatParams::default());
    }

    #[test]
    fn test_default_scenario() {
        let plan = generate(&SwatParams::default(), 1, 1).unwrap();

        assert_eq!(plan.obstacle_list_name, "rooms.txt");
        assert_eq!(plan.obstacles.len(), 16);
        assert_eq!(plan.nodes_with_role(NodeRole::WiredDonor).count(), 4);
        assert_eq!(plan.nodes_with_role(NodeRole::IabRelay).count(), 4);
        assert_eq!(plan.nodes_with_role(NodeRole::SwatOfficer).count(), 16);
        assert_eq!(plan.mobile_units.iter().filter(|u| u.carried_relay.is_some()).count(), 4);
        assert_eq!(plan.mobility_trace.as_deref(), Some("mobility-trace-example.mob"));

        // (97.5 m worst route + 3 m file) / 3 m/s + 0.5 s start + 0.1 s margin
        assert!((plan.stop_s() - 34.1).abs() < 1e-9);
        assert_eq!(plan.flows.len(), 16);
        assert_eq!(plan.flows[0].port, 1235);
        assert_eq!(plan.flows[15].port, 1250);
        for flow in &plan.flows {
            assert_eq!(flow.start_ms, 500.0);
            assert_eq!(flow.end_ms, 34_000.0);
        }
    }

    #[test]
    fn test_every_officer_arrives_before_the_horizon() {
        for seed in 1..6 {
            let plan = generate(&SwatParams::default(), seed, 1).unwrap();
            let speeds = SpeedRange::new(3.0, 5.0).unwrap();
            for unit in &plan.mobile_units {
                assert!(speeds.contains(unit.speed_mps));
                assert!(unit.trajectory.max_segment_speed_mps() <= unit.speed_mps + 1e-9);
                assert!(unit.trajectory.end_time_s() <= plan.stop_s() - 0.1 + 1e-9);
            }
        }
    }

    #[test]
    fn test_line_of_sight_relays_stay_visible() {
        let params = SwatParams {
            mobility_mode: 2,
            ..SwatParams::default()
        };
        let plan = generate(&params, 4, 1).unwrap();
        let donors: Vec<Point3> = plan
            .nodes_with_role(NodeRole::WiredDonor)
            .map(|n| n.mobility.position_at(0.0))
            .collect();

        for relay in plan.nodes_with_role(NodeRole::IabRelay) {
            let start = relay.mobility.position_at(0.0);
            let anchor = donors
                .iter()
                .min_by(|a, b| a.planar_distance_to(&start).total_cmp(&b.planar_distance_to(&start)))
                .unwrap();
            for k in 0..=200 {
                let t = plan.stop_s() * f64::from(k) / 200.0;
                assert!(has_line_of_sight(anchor, &relay.mobility.position_at(t), &plan.obstacles));
            }
            // never reaches the centre, which is hidden behind rooms
            let end = relay.mobility.position_at(plan.stop_s());
            assert!(end.planar_distance_to(&Point3::new(45.25, 45.25, end.z)) > 1.0);
        }
    }

    #[test]
    fn test_following_relay_reaches_centre() {
        let plan = generate(&SwatParams::default(), 2, 1).unwrap();
        for relay in plan.nodes_with_role(NodeRole::IabRelay) {
            let end = relay.mobility.position_at(plan.stop_s());
            assert!((end.x - 45.25).abs() < 1e-9 && (end.y - 45.25).abs() < 1e-9);
            assert_eq!(end.z, 1.5);
        }
    }

    #[test]
    fn test_without_relays() {
        let params = SwatParams {
            use_iab: false,
            ..SwatParams::default()
        };
        let plan = generate(&params, 1, 1).unwrap();
        assert_eq!(plan.nodes_with_role(NodeRole::IabRelay).count(), 0);
        assert!(matches!(plan.attachments.as_slice(), [Attachment::ClosestBs { .. }]));
    }

    #[test]
    fn test_invalid_configurations() {
        let too_many = SwatParams {
            num_bs: 5,
            ..SwatParams::default()
        };
        assert!(matches!(generate(&too_many, 1, 1), Err(ScenarioError::InvalidParameter(_))));

        let odd = SwatParams {
            num_rooms_row: 3,
            ..SwatParams::default()
        };
        assert!(matches!(
            generate(&odd, 1, 1),
            Err(ScenarioError::InvalidGridDimensions { rows: 3, .. })
        ));

        let mode = SwatParams {
            mobility_mode: 3,
            ..SwatParams::default()
        };
        assert!(generate(&mode, 1, 1).is_err());
    }

    #[test]
    fn test_same_seed_same_plan() {
        let params = SwatParams {
            mobility_mode: 2,
            ..SwatParams::default()
        };
        let a = serde_json::to_string(&generate(&params, 9, 2).unwrap()).unwrap();
        let b = serde_json::to_string(&generate(&params, 9, 2).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
