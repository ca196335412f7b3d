//! Motor-vehicle accident on a short street segment.
//!
//! Crashed cars and trucks block the street, mmWave road-side units line the
//! kerb, an LTE macro sits far away and first responders gather around the
//! wreck streaming video.

use clap::{ArgAction, Args};
use psc_domain::{Bounds, DeviceKind, NodeRole, Result};
use serde::Serialize;
use tracing::info;

use super::{ResponderVideo, ScenarioProgram, rlc_mode};
use crate::engine::Attachment;
use crate::obstacles::{DEFAULT_LAYOUT_RESTARTS, FixedFootprint, ObstacleLayoutGenerator};
use crate::placement::{ConstrainedPlacementSampler, PlacementRequest};
use crate::plan::{PlanBuilder, ScenarioPlan};
use crate::radio::RadioConfig;
use crate::rng::RandomNumberStream;
use crate::traffic::{DEFAULT_GUARD_MS, TrafficFlowScheduler};

#[derive(Args, Debug, Clone, PartialEq, Serialize)]
pub struct MvaParams {
    /// Simulation time in milliseconds
    #[arg(long, default_value = "1000")]
    pub sim_time_ms: u32,

    /// Applications start time in milliseconds
    #[arg(long, default_value = "500")]
    pub app_start_ms: u32,

    /// Data rate of each first responder video [bit/s]
    #[arg(long, default_value = "600000")]
    pub first_responders_video_rate: f64,

    /// Share of first responders watching a downlink video
    #[arg(long, default_value = "0.5")]
    pub ratio_dl_flows: f64,

    /// Packet size [bytes]
    #[arg(long, default_value = "1024")]
    pub packet_size: u32,

    /// Serve responders over mmWave; otherwise everything goes over LTE
    #[arg(long, default_value = "true", action = ArgAction::Set)]
    pub use_mm_wave: bool,

    /// Street width in meters
    #[arg(long, default_value = "5.5")]
    pub street_width: f64,

    /// Street length in meters
    #[arg(long, default_value = "25")]
    pub street_length: f64,

    #[arg(long, default_value = "2")]
    pub num_involved_cars: u32,
    #[arg(long, default_value = "2")]
    pub car_width: f64,
    #[arg(long, default_value = "4")]
    pub car_length: f64,
    #[arg(long, default_value = "1.5")]
    pub car_height: f64,

    #[arg(long, default_value = "1")]
    pub num_involved_trucks: u32,
    #[arg(long, default_value = "2.5")]
    pub truck_width: f64,
    #[arg(long, default_value = "10")]
    pub truck_length: f64,
    #[arg(long, default_value = "3")]
    pub truck_height: f64,

    /// Clearance between crashed vehicles in meters
    #[arg(long, default_value = "0")]
    pub vehicle_gap: f64,

    /// Number of road-side mmWave sites
    #[arg(long, default_value = "2")]
    pub num_bs: u32,

    /// Number of LTE macro sites
    #[arg(long, default_value = "1")]
    pub num_lte_bs: u32,

    /// Distance between road-side sites in meters
    #[arg(long, default_value = "50")]
    pub inter_bs_distance: f64,

    /// Distance of the LTE macro from the incident scene in meters
    #[arg(long, default_value = "500")]
    pub lte_distance_from_scenario: f64,

    #[arg(long, default_value = "10")]
    pub num_first_responders: u32,

    /// Carrier frequency in hertz
    #[arg(long, default_value = "30e9")]
    pub frequency: f64,

    /// Aggregated system bandwidth in hertz
    #[arg(long, default_value = "1e9")]
    pub bandwidth: f64,

    #[arg(long, default_value = "64")]
    pub num_bs_antenna_elements: u32,

    /// Road-side antenna height in meters
    #[arg(long, default_value = "5")]
    pub bs_antenna_height: f64,

    /// LTE antenna height in meters
    #[arg(long, default_value = "15")]
    pub lte_bs_antenna_height: f64,

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
}

impl Default for MvaParams {
    fn default() -> Self {
        Self {
            sim_time_ms: 1000,
            app_start_ms: 500,
            first_responders_video_rate: 600e3,
            ratio_dl_flows: 0.5,
            packet_size: 1024,
            use_mm_wave: true,
            street_width: 5.5,
            street_length: 25.0,
            num_involved_cars: 2,
            car_width: 2.0,
            car_length: 4.0,
            car_height: 1.5,
            num_involved_trucks: 1,
            truck_width: 2.5,
            truck_length: 10.0,
            truck_height: 3.0,
            vehicle_gap: 0.0,
            num_bs: 2,
            num_lte_bs: 1,
            inter_bs_distance: 50.0,
            lte_distance_from_scenario: 500.0,
            num_first_responders: 10,
            frequency: 30e9,
            bandwidth: 1e9,
            num_bs_antenna_elements: 64,
            bs_antenna_height: 5.0,
            lte_bs_antenna_height: 15.0,
            num_ue_antenna_elements: 16,
            ue_antenna_height: 1.5,
            rlc_am: true,
            rlc_buf_size: 10,
        }
    }
}

impl MvaParams {
    fn radio(&self) -> RadioConfig {
        RadioConfig {
            bs_antenna_elements: self.num_bs_antenna_elements,
            ue_antenna_elements: self.num_ue_antenna_elements,
            packet_size_bytes: self.packet_size,
            rlc_mode: rlc_mode(self.rlc_am),
            rlc_buffer_mb: self.rlc_buf_size,
            lte_only: !self.use_mm_wave,
            ..RadioConfig::new(self.frequency, self.bandwidth)
        }
    }
}

impl ScenarioProgram for MvaParams {
    fn name(&self) -> &'static str {
        "mva"
    }

    fn build(&self, stream: &mut RandomNumberStream) -> Result<ScenarioPlan> {
        let radio = self.radio();
        radio.validate()?;
        let mut builder = PlanBuilder::new(self.name(), stream.seed(), stream.run(), radio.attributes());
        let host = builder.remote_host();

        // street with the crashed vehicles; trucks first, the long footprints need the free street
        let trucks = (0..self.num_involved_trucks)
            .map(|_| FixedFootprint::new(self.truck_width, self.truck_length, self.truck_height));
        let cars = (0..self.num_involved_cars).map(|_| FixedFootprint::new(self.car_width, self.car_length, self.car_height));
        let vehicles: Vec<FixedFootprint> = trucks.chain(cars).collect();
        let street = ObstacleLayoutGenerator::new().place_all_fixed(
            stream,
            Bounds::new(0.0, self.street_width, 0.0, self.street_length)?,
            &vehicles,
            self.vehicle_gap,
            DEFAULT_LAYOUT_RESTARTS,
        )?;
        info!("Street blocked by {} vehicles", street.len());

        let rsu_positions = ConstrainedPlacementSampler::drop_roadside(
            -self.inter_bs_distance,
            self.street_length + self.inter_bs_distance / 2.0,
            -1.0,
            self.bs_antenna_height,
            self.inter_bs_distance,
            self.num_bs as usize,
        )?;
        let macro_positions = ConstrainedPlacementSampler::drop_macro(
            self.lte_distance_from_scenario,
            self.lte_bs_antenna_height,
            self.num_lte_bs as usize,
        );
        let scene = Bounds::new(-self.street_width / 2.0, self.street_width * 1.5, 0.0, self.street_length)?;
        let responder_positions = ConstrainedPlacementSampler::new().place(
            stream,
            &PlacementRequest::new("first responders", self.num_first_responders as usize, scene)
                .at_height(self.ue_antenna_height)
                .outdoor(),
            &street.obstacles,
        )?;

        builder.obstacles("obstacles.txt", street.obstacles);
        let rsus = builder.add_fixed_nodes(NodeRole::MmWaveBs, Some(DeviceKind::MmWaveBs), &rsu_positions);
        let macros = builder.add_fixed_nodes(NodeRole::LteMacro, Some(DeviceKind::LteBs), &macro_positions);
        let responders = builder.add_fixed_nodes(
            NodeRole::FirstResponder,
            Some(DeviceKind::MultiConnectivityUe),
            &responder_positions,
        );
        let addresses = builder.install_ue_internet(&responders)?;

        for lte in &macros {
            builder.connect_x2(*lte, &rsus);
        }
        builder.attach(Attachment::ClosestBs {
            ues: responders.clone(),
            candidates: rsus,
            lte_anchor: macros.first().copied(),
        });

        let mut scheduler = TrafficFlowScheduler::new(DEFAULT_GUARD_MS);
        let responder_pairs: Vec<_> = responders.into_iter().zip(addresses).collect();
        ResponderVideo {
            rate_bps: self.first_responders_video_rate,
            packet_size_bytes: self.packet_size,
            app_start_ms: f64::from(self.app_start_ms),
            horizon_ms: f64::from(self.sim_time_ms),
            ratio_dl: self.ratio_dl_flows,
            ul_trace: "ul-app-trace.txt",
            dl_trace: "dl-app-trace.txt",
            dl_port_gap: 0,
        }
        .schedule(&mut builder, &mut scheduler, stream, host, &responder_pairs)?;

        Ok(builder.build(f64::from(self.sim_time_ms), serde_json::to_value(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::generate;
    use clap::Parser;
    use psc_domain::{Direction, ScenarioError};

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        params: MvaParams,
    }

    #[test]
    fn test_cli_defaults_match() {
        let parsed = Cli::parse_from(["mva"]).params;
        assert_eq!(parsed, MvaParams::default());
    }

    #[test]
    fn test_default_layout() {
        let plan = generate(&MvaParams::default(), 1, 1).unwrap();

        assert_eq!(plan.obstacles.len(), 3);
        for (i, a) in plan.obstacles.iter().enumerate() {
            assert!(a.origin_x >= 0.0 && a.x_max() <= 5.5);
            assert!(a.origin_y >= 0.0 && a.y_max() <= 25.0);
            for b in &plan.obstacles[i + 1..] {
                assert!(!a.overlaps(b, 0.0));
            }
        }

        let rsus: Vec<_> = plan.nodes_with_role(NodeRole::MmWaveBs).collect();
        assert_eq!(rsus.len(), 2);
        assert_eq!(rsus[0].mobility.position_at(0.0).x, -50.0);
        assert_eq!(rsus[1].mobility.position_at(0.0).x, 0.0);
        let lte = plan.nodes_with_role(NodeRole::LteMacro).next().unwrap();
        assert!((lte.mobility.position_at(0.0).y + 500.0).abs() < 1e-9);
        assert_eq!(plan.nodes_with_role(NodeRole::FirstResponder).count(), 10);
        assert_eq!(plan.stop_ms, 1000.0);
    }

    #[test]
    fn test_flow_ports_and_times() {
        let plan = generate(&MvaParams::default(), 3, 2).unwrap();

        let ul: Vec<_> = plan.flows.iter().filter(|f| f.direction == Direction::Uplink).collect();
        let dl: Vec<_> = plan.flows.iter().filter(|f| f.direction == Direction::Downlink).collect();
        assert_eq!(ul.len(), 10);
        assert_eq!(dl.len(), 5);
        assert_eq!(ul[0].port, 1235);
        assert_eq!(ul[9].port, 1244);
        // downlink base = next uplink port + number of responders
        assert_eq!(dl[0].port, 1255);

        for flow in &plan.flows {
            assert!(flow.start_ms >= 500.0 && flow.start_ms <= 1100.0);
            assert_eq!(flow.end_ms, 900.0);
        }
        assert_eq!(dl[0].sink_address, plan.node(dl[0].sink).unwrap().address.unwrap());
    }

    #[test]
    fn test_default_street_builds_for_every_seed() {
        let params = MvaParams::default();
        for seed in 1..=300 {
            let plan = generate(&params, seed, 1).unwrap_or_else(|e| panic!("seed {seed}: {e}"));
            assert_eq!(plan.obstacles.len(), 3);
        }
    }

    #[test]
    fn test_same_seed_same_plan() {
        let params = MvaParams::default();
        let a = serde_json::to_string(&generate(&params, 7, 3).unwrap()).unwrap();
        let b = serde_json::to_string(&generate(&params, 7, 3).unwrap()).unwrap();
        let c = serde_json::to_string(&generate(&params, 7, 4).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_rate_aborts() {
        let params = MvaParams {
            first_responders_video_rate: 0.0,
            ..MvaParams::default()
        };
        assert!(matches!(
            generate(&params, 1, 1),
            Err(ScenarioError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_too_many_roadside_units() {
        let params = MvaParams {
            num_bs: 4,
            ..MvaParams::default()
        };
        assert!(matches!(
            generate(&params, 1, 1),
            Err(ScenarioError::PlacementInfeasible { .. })
        ));
    }
}
