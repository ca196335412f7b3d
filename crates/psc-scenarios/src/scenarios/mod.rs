//! Scenario programs: flat parameters in, a complete [`ScenarioPlan`] out.

pub mod chemical_plant;
pub mod mva;
pub mod swat;

pub use chemical_plant::ChemicalPlantParams;
pub use mva::MvaParams;
pub use swat::SwatParams;

use std::net::Ipv4Addr;

use psc_domain::{Direction, JitterRange, NodeId, Result, RlcMode, ScenarioError};

use crate::plan::{PlanBuilder, ScenarioPlan};
use crate::rng::RandomNumberStream;
use crate::traffic::{FlowRequest, TrafficFlowScheduler, inter_packet_interval_us};

/// First port on the remote host for uplink responder flows.
pub const UPLINK_BASE_PORT: u16 = 1235;

/// Start jitter (ms) spreading responder applications.
pub const RESPONDER_JITTER: JitterRange = JitterRange::new(0.0, 600.0);

/// A scenario that can be generated from one random stream.
pub trait ScenarioProgram {
    /// Short name used in logs and outputs
    fn name(&self) -> &'static str;

    /// Generate every descriptor, drawing from `stream` in a fixed order.
    ///
    /// Fails without side effects on the engine: nothing is deployed until
    /// the returned plan is handed to [`crate::plan::deploy`].
    fn build(&self, stream: &mut RandomNumberStream) -> Result<ScenarioPlan>;
}

/// Build `program` from a fresh stream for `(seed, run)`.
pub fn generate<P: ScenarioProgram>(program: &P, seed: u64, run: u64) -> Result<ScenarioPlan> {
    let mut stream = RandomNumberStream::new(seed, run);
    program.build(&mut stream)
}

pub(crate) fn rlc_mode(acknowledged: bool) -> RlcMode {
    if acknowledged {
        RlcMode::Acknowledged
    } else {
        RlcMode::Unacknowledged
    }
}

/// Uplink video from every responder and downlink video to the first
/// `floor(n * ratio_dl)` of them.
pub(crate) struct ResponderVideo<'a> {
    pub rate_bps: f64,
    pub packet_size_bytes: u32,
    pub app_start_ms: f64,
    pub horizon_ms: f64,
    pub ratio_dl: f64,
    pub ul_trace: &'a str,
    pub dl_trace: &'a str,
    /// Extra ports skipped between the last uplink block and the downlink base
    pub dl_port_gap: u32,
}

impl ResponderVideo<'_> {
    pub(crate) fn schedule(
        &self,
        builder: &mut PlanBuilder,
        scheduler: &mut TrafficFlowScheduler,
        stream: &mut RandomNumberStream,
        host: (NodeId, Ipv4Addr),
        responders: &[(NodeId, Ipv4Addr)],
    ) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ratio_dl) {
            return Err(ScenarioError::InvalidParameter(format!(
                "downlink flow ratio {} outside [0, 1]",
                self.ratio_dl
            )));
        }
        // reject a bad rate even when there is no responder to schedule
        inter_packet_interval_us(self.packet_size_bytes, self.rate_bps)?;

        let ul_trace = builder.trace(self.ul_trace);
        let dl_trace = builder.trace(self.dl_trace);

        scheduler.open_direction(Direction::Uplink, UPLINK_BASE_PORT);
        for (node, _) in responders {
            let flow = scheduler.schedule_flow(
                stream,
                &FlowRequest {
                    source: *node,
                    sink: host.0,
                    sink_address: host.1,
                    direction: Direction::Uplink,
                    rate_bps: self.rate_bps,
                    packet_size_bytes: self.packet_size_bytes,
                    jitter: Some(RESPONDER_JITTER),
                    start_offset_ms: self.app_start_ms,
                    horizon_ms: self.horizon_ms,
                    trace: ul_trace.clone(),
                },
            )?;
            builder.push_flow(flow);
        }

        let ul_next = scheduler.peek_port(Direction::Uplink).unwrap_or(u32::from(UPLINK_BASE_PORT));
        let dl_base = ul_next + responders.len() as u32 + self.dl_port_gap;
        let dl_base = u16::try_from(dl_base).map_err(|_| ScenarioError::PortExhausted {
            direction: Direction::Downlink,
        })?;
        scheduler.open_direction(Direction::Downlink, dl_base);

        let dl_count = (responders.len() as f64 * self.ratio_dl).floor() as usize;
        for (node, address) in responders.iter().take(dl_count) {
            let flow = scheduler.schedule_flow(
                stream,
                &FlowRequest {
                    source: host.0,
                    sink: *node,
                    sink_address: *address,
                    direction: Direction::Downlink,
                    rate_bps: self.rate_bps,
                    packet_size_bytes: self.packet_size_bytes,
                    jitter: Some(RESPONDER_JITTER),
                    start_offset_ms: self.app_start_ms,
                    horizon_ms: self.horizon_ms,
                    trace: dl_trace.clone(),
                },
            )?;
            builder.push_flow(flow);
        }
        Ok(())
    }
}
