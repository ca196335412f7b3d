//! Constant-bit-rate flow descriptors and port allocation.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use psc_domain::{Direction, Flow, JitterRange, NodeId, Result, ScenarioError, TraceHandle};
use tracing::{debug, warn};

use crate::rng::RandomNumberStream;

/// Trailing margin (ms) between a flow's end and the simulation horizon.
pub const DEFAULT_GUARD_MS: f64 = 100.0;

/// Inter-packet interval in microseconds, not rounded.
///
/// # Errors
///
/// [`ScenarioError::InvalidRate`] unless `rate_bps` is positive and finite.
pub fn inter_packet_interval_us(packet_size_bytes: u32, rate_bps: f64) -> Result<f64> {
    if !(rate_bps > 0.0 && rate_bps.is_finite()) {
        return Err(ScenarioError::InvalidRate { rate_bps });
    }
    if packet_size_bytes == 0 {
        return Err(ScenarioError::InvalidParameter("packet size must be positive".to_string()));
    }
    Ok(f64::from(packet_size_bytes) * 8.0 / rate_bps * 1e6)
}

/// Everything a flow needs except its port.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequest {
    pub source: NodeId,
    pub sink: NodeId,
    pub sink_address: Ipv4Addr,
    pub direction: Direction,
    pub rate_bps: f64,
    pub packet_size_bytes: u32,
    /// Start jitter; `None` starts exactly at the offset and draws nothing
    pub jitter: Option<JitterRange>,
    pub start_offset_ms: f64,
    pub horizon_ms: f64,
    pub trace: TraceHandle,
}

/// Per-direction port counters over one shared set of claimed ports.
#[derive(Debug, Clone, Default)]
pub struct PortAllocator {
    next: BTreeMap<Direction, u32>,
    used: BTreeSet<u16>,
}

impl PortAllocator {
    pub fn open(&mut self, direction: Direction, base_port: u16) {
        self.next.insert(direction, u32::from(base_port));
    }

    /// Next counter value for `direction`; the counter only moves forward.
    pub fn next(&mut self, direction: Direction) -> Result<u16> {
        let Some(counter) = self.next.get_mut(&direction) else {
            return Err(ScenarioError::InvalidParameter(format!(
                "no base port configured for {} flows",
                direction.as_str()
            )));
        };
        let port = u16::try_from(*counter).map_err(|_| ScenarioError::PortExhausted { direction })?;
        *counter += 1;
        self.claim(port)?;
        Ok(port)
    }

    /// Reserve a fixed port.
    pub fn claim(&mut self, port: u16) -> Result<()> {
        if !self.used.insert(port) {
            return Err(ScenarioError::PortCollision { port });
        }
        Ok(())
    }

    pub fn is_used(&self, port: u16) -> bool {
        self.used.contains(&port)
    }
}

/// Builds flow descriptors for one scenario run.
#[derive(Debug, Clone)]
pub struct TrafficFlowScheduler {
    guard_ms: f64,
    ports: PortAllocator,
}

impl TrafficFlowScheduler {
    pub fn new(guard_ms: f64) -> Self {
        Self {
            guard_ms,
            ports: PortAllocator::default(),
        }
    }

    pub fn guard_ms(&self) -> f64 {
        self.guard_ms
    }

    /// Seed the port counter of `direction`.
    pub fn open_direction(&mut self, direction: Direction, base_port: u16) {
        self.ports.open(direction, base_port);
    }

    /// Next counter value of `direction`; other directions derive their base from it.
    pub fn peek_port(&self, direction: Direction) -> Option<u32> {
        self.ports.next.get(&direction).copied()
    }

    /// Schedule a flow on the next counter port of its direction.
    pub fn schedule_flow(&mut self, stream: &mut RandomNumberStream, request: &FlowRequest) -> Result<Flow> {
        let interval_us = inter_packet_interval_us(request.packet_size_bytes, request.rate_bps)?;
        let port = self.ports.next(request.direction)?;
        Ok(self.build(stream, request, port, interval_us))
    }

    /// Schedule a flow on a fixed, caller-chosen port.
    pub fn schedule_flow_on_port(
        &mut self,
        stream: &mut RandomNumberStream,
        request: &FlowRequest,
        port: u16,
    ) -> Result<Flow> {
        let interval_us = inter_packet_interval_us(request.packet_size_bytes, request.rate_bps)?;
        self.ports.claim(port)?;
        Ok(self.build(stream, request, port, interval_us))
    }

    fn build(&self, stream: &mut RandomNumberStream, request: &FlowRequest, port: u16, interval_us: f64) -> Flow {
        let jitter_ms = request.jitter.map_or(0.0, |j| stream.draw(j.min_ms, j.max_ms));
        let start_ms = request.start_offset_ms + jitter_ms;
        let end_ms = request.horizon_ms - self.guard_ms;

        if start_ms >= end_ms {
            warn!(
                "{} flow on port {} starts at {:.3} ms, after its end at {:.3} ms",
                request.direction.as_str(),
                port,
                start_ms,
                end_ms
            );
        }
        debug!(
            "{} flow {} -> {} port {} interval {:.3} us start {:.3} ms",
            request.direction.as_str(),
            request.source,
            request.sink,
            port,
            interval_us,
            start_ms
        );

        Flow {
            source: request.source,
            sink: request.sink,
            sink_address: request.sink_address,
            direction: request.direction,
            port,
            packet_size_bytes: request.packet_size_bytes,
            interval_us,
            start_ms,
            end_ms,
            trace: request.trace.clone(),
        }
    }
}

impl Default for TrafficFlowScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_GUARD_MS)
    }
}
