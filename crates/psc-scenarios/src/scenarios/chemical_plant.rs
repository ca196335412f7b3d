//! Chemical plant incident.
//!
//! Random buildings cover the plant, an LTE macro stands at the origin and
//! mmWave sites are dropped outdoors, away from the incident area around the
//! plant centre. A wheelbarrow robot inside the incident area streams video
//! and is remote-controlled, optionally over a dedicated LTE bearer.

use clap::{ArgAction, Args};
use psc_domain::{Bounds, DeviceKind, Direction, NodeRole, Point3, QosClass, Result, ScenarioError};
use serde::Serialize;

use super::{ResponderVideo, ScenarioProgram, rlc_mode};
use crate::bearer::BearerQosMapper;
use crate::engine::Attachment;
use crate::obstacles::{ObstacleLayoutGenerator, ObstacleSpec};
use crate::placement::{ConstrainedPlacementSampler, ExclusionZone, PlacementRequest};
use crate::plan::{PlanBuilder, ScenarioPlan};
use crate::radio::RadioConfig;
use crate::rng::RandomNumberStream;
use crate::traffic::{DEFAULT_GUARD_MS, FlowRequest, TrafficFlowScheduler};

/// Remote-host port of the wheelbarrow video.
pub const WHEELBARROW_VIDEO_PORT: u16 = 1233;

/// Robot port of the wheelbarrow control traffic.
pub const WHEELBARROW_CONTROL_PORT: u16 = 1234;

#[derive(Args, Debug, Clone, PartialEq, Serialize)]
pub struct ChemicalPlantParams {
    /// Simulation time in milliseconds
    #[arg(long, default_value = "1000")]
    pub sim_time_ms: u32,

    /// Wheelbarrow robot applications start time in milliseconds
    #[arg(long, default_value = "500")]
    pub wheelbarrow_app_start_ms: u32,

    /// First responders applications start time in milliseconds
    #[arg(long, default_value = "500")]
    pub first_responders_app_start_ms: u32,

    /// Data rate of each first responder video [bit/s]
    #[arg(long, default_value = "600000")]
    pub first_responders_video_rate: f64,

    /// Share of first responders watching a downlink video
    #[arg(long, default_value = "0.5")]
    pub ratio_dl_flows: f64,

    /// Data rate of the wheelbarrow video [bit/s]
    #[arg(long, default_value = "4000000")]
    pub wheelbarrow_video_rate: f64,

    /// Data rate of the wheelbarrow control traffic [bit/s]
    #[arg(long, default_value = "50000")]
    pub wheelbarrow_ctrl_rate: f64,

    /// Carry the control traffic on a dedicated high-priority LTE bearer
    #[arg(long, default_value = "true", action = ArgAction::Set)]
    pub wheelbarrow_ctrl_on_lte: bool,

    /// Packet size [bytes]
    #[arg(long, default_value = "1024")]
    pub packet_size: u32,

    /// Radius of the incident area in meters
    #[arg(long, default_value = "200")]
    pub incident_area_radius: f64,

    /// Side of the square plant in meters
    #[arg(long, default_value = "1000")]
    pub plant_side: f64,

    #[arg(long, default_value = "50")]
    pub min_building_size: f64,
    #[arg(long, default_value = "300")]
    pub max_building_size: f64,
    #[arg(long, default_value = "10")]
    pub min_building_height: f64,
    #[arg(long, default_value = "40")]
    pub max_building_height: f64,

    /// Street width kept between buildings in meters
    #[arg(long, default_value = "2")]
    pub building_gap: f64,

    #[arg(long, default_value = "10")]
    pub num_of_buildings: u32,

    #[arg(long, default_value = "5")]
    pub num_of_mm_wave_bs: u32,

    /// Minimum distance between mmWave sites in meters
    #[arg(long, default_value = "60")]
    pub min_inter_site_distance: f64,

    #[arg(long, default_value = "10")]
    pub num_first_responders: u32,

    #[arg(long, default_value = "64")]
    pub num_bs_antenna_elements: u32,

    #[arg(long, default_value = "10")]
    pub mm_wave_bs_height: f64,

    #[arg(long, default_value = "30")]
    pub lte_bs_height: f64,

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

    /// Operating frequency in hertz
    #[arg(long, default_value = "30e9")]
    pub frequency: f64,

    /// System bandwidth in hertz
    #[arg(long, default_value = "1e9")]
    pub bandwidth: f64,
}

impl Default for ChemicalPlantParams {
    fn default() -> Self {
        Self {
            sim_time_ms: 1000,
            wheelbarrow_app_start_ms: 500,
            first_responders_app_start_ms: 500,
            first_responders_video_rate: 600e3,
            ratio_dl_flows: 0.5,
            wheelbarrow_video_rate: 4000e3,
            wheelbarrow_ctrl_rate: 50e3,
            wheelbarrow_ctrl_on_lte: true,
            packet_size: 1024,
            incident_area_radius: 200.0,
            plant_side: 1000.0,
            min_building_size: 50.0,
            max_building_size: 300.0,
            min_building_height: 10.0,
            max_building_height: 40.0,
            building_gap: 2.0,
            num_of_buildings: 10,
            num_of_mm_wave_bs: 5,
            min_inter_site_distance: 60.0,
            num_first_responders: 10,
            num_bs_antenna_elements: 64,
            mm_wave_bs_height: 10.0,
            lte_bs_height: 30.0,
            num_ue_antenna_elements: 16,
            ue_antenna_height: 1.5,
            rlc_am: true,
            rlc_buf_size: 10,
            frequency: 30e9,
            bandwidth: 1e9,
        }
    }
}

impl ChemicalPlantParams {
    fn radio(&self) -> RadioConfig {
        RadioConfig {
            bs_antenna_elements: self.num_bs_antenna_elements,
            ue_antenna_elements: self.num_ue_antenna_elements,
            packet_size_bytes: self.packet_size,
            rlc_mode: rlc_mode(self.rlc_am),
            rlc_buffer_mb: self.rlc_buf_size,
            // never hand over to LTE; only the dedicated control bearer uses it
            lte_outage_threshold_db: Some(-10_000.0),
            ..RadioConfig::new(self.frequency, self.bandwidth)
        }
    }
}

impl ScenarioProgram for ChemicalPlantParams {
    fn name(&self) -> &'static str {
        "chemical-plant"
    }

    fn build(&self, stream: &mut RandomNumberStream) -> Result<ScenarioPlan> {
        let radio = self.radio();
        radio.validate()?;
        if self.plant_side <= 0.0 || self.incident_area_radius < 0.0 {
            return Err(ScenarioError::InvalidParameter(format!(
                "plant side {} and incident radius {} must be positive",
                self.plant_side, self.incident_area_radius
            )));
        }
        let mut builder = PlanBuilder::new(self.name(), stream.seed(), stream.run(), radio.attributes());
        let host = builder.remote_host();

        let plant = ObstacleLayoutGenerator::new().generate(
            stream,
            &ObstacleSpec {
                count: self.num_of_buildings as usize,
                min_size_m: self.min_building_size,
                max_size_m: self.max_building_size,
                min_height_m: self.min_building_height,
                max_height_m: self.max_building_height,
                area_width_m: self.plant_side,
                area_height_m: self.plant_side,
                min_gap_m: self.building_gap,
            },
        )?;

        let centre = self.plant_side / 2.0;
        let sampler = ConstrainedPlacementSampler::new();
        let area = Bounds::square(self.plant_side)?;
        let mm_wave_positions = sampler.place(
            stream,
            &PlacementRequest::new("mmWave sites", self.num_of_mm_wave_bs as usize, area)
                .excluding(ExclusionZone::new(centre, centre, self.incident_area_radius))
                .min_distance(self.min_inter_site_distance)
                .at_height(self.mm_wave_bs_height)
                .outdoor(),
            &plant.obstacles,
        )?;
        let responder_positions = sampler.place(
            stream,
            &PlacementRequest::new("first responders", self.num_first_responders as usize, area)
                .at_height(self.ue_antenna_height)
                .outdoor(),
            &plant.obstacles,
        )?;
        let r = self.incident_area_radius;
        let incident = Bounds::new(centre - r, centre + r, centre - r, centre + r)?;
        let robot_positions = sampler.place(
            stream,
            &PlacementRequest::new("wheelbarrow robot", 1, incident)
                .at_height(self.ue_antenna_height)
                .outdoor(),
            &plant.obstacles,
        )?;

        builder.obstacles("obstacles.txt", plant.obstacles);
        let lte = builder.add_fixed_nodes(
            NodeRole::LteMacro,
            Some(DeviceKind::LteBs),
            &[Point3::new(0.0, 0.0, self.lte_bs_height)],
        );
        let mm_wave = builder.add_fixed_nodes(NodeRole::MmWaveBs, Some(DeviceKind::MmWaveBs), &mm_wave_positions);
        let responders = builder.add_fixed_nodes(
            NodeRole::FirstResponder,
            Some(DeviceKind::MultiConnectivityUe),
            &responder_positions,
        );
        let robot = builder.add_fixed_nodes(
            NodeRole::WheelbarrowRobot,
            Some(DeviceKind::MultiConnectivityUe),
            &robot_positions,
        );

        let mut ues = responders.clone();
        ues.extend(&robot);
        let addresses = builder.install_ue_internet(&ues)?;

        builder.connect_x2(lte[0], &mm_wave);
        builder.attach(Attachment::ClosestBs {
            ues: ues.clone(),
            candidates: mm_wave,
            lte_anchor: Some(lte[0]),
        });

        let mut scheduler = TrafficFlowScheduler::new(DEFAULT_GUARD_MS);
        let horizon_ms = f64::from(self.sim_time_ms);
        let responder_pairs: Vec<_> = responders.iter().copied().zip(addresses.iter().copied()).collect();
        ResponderVideo {
            rate_bps: self.first_responders_video_rate,
            packet_size_bytes: self.packet_size,
            app_start_ms: f64::from(self.first_responders_app_start_ms),
            horizon_ms,
            ratio_dl: self.ratio_dl_flows,
            ul_trace: "fr-ul-video-stream.txt",
            dl_trace: "fr-dl-video-stream.txt",
            dl_port_gap: 1,
        }
        .schedule(&mut builder, &mut scheduler, stream, host, &responder_pairs)?;

        let robot_id = robot[0];
        let robot_address = addresses[responders.len()];
        let video = FlowRequest {
            source: robot_id,
            sink: host.0,
            sink_address: host.1,
            direction: Direction::Uplink,
            rate_bps: self.wheelbarrow_video_rate,
            packet_size_bytes: self.packet_size,
            jitter: None,
            start_offset_ms: f64::from(self.wheelbarrow_app_start_ms),
            horizon_ms,
            trace: builder.trace("wb-ul-video-stream.txt"),
        };
        let video = scheduler.schedule_flow_on_port(stream, &video, WHEELBARROW_VIDEO_PORT)?;
        builder.push_flow(video);

        let control = FlowRequest {
            source: host.0,
            sink: robot_id,
            sink_address: robot_address,
            direction: Direction::Downlink,
            rate_bps: self.wheelbarrow_ctrl_rate,
            packet_size_bytes: self.packet_size,
            jitter: None,
            start_offset_ms: f64::from(self.wheelbarrow_app_start_ms),
            horizon_ms,
            trace: builder.trace("wb-ctrl-traffic.txt"),
        };
        let control = scheduler.schedule_flow_on_port(stream, &control, WHEELBARROW_CONTROL_PORT)?;
        if self.wheelbarrow_ctrl_on_lte {
            let bearer = BearerQosMapper::default().assign_bearer(
                &control,
                robot_id,
                QosClass::NgbrMcDelaySensitiveSignalling,
            )?;
            builder.push_bearer(bearer);
        }
        builder.push_flow(control);

        Ok(builder.build(horizon_ms, serde_json::to_value(self)?))
    }
}
