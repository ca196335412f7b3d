//! Seam to the external discrete-event engine.
//!
//! The scenario layer never talks to a simulator directly: a finished
//! [`crate::plan::ScenarioPlan`] is pushed through [`SimulationEngine`].
//! [`RecordingEngine`] keeps the calls instead of executing them.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use psc_domain::{
    BearerAssignment, DeviceKind, Flow, NodeId, NodeMobility, NodeRole, Result, ScenarioError, TraceHandle,
};
use serde::{Deserialize, Serialize};

use crate::radio::EngineAttribute;

/// Fixed address of the remote host behind the core network.
pub const REMOTE_HOST_ADDRESS: Ipv4Addr = Ipv4Addr::new(1, 0, 0, 2);

/// First address handed to user equipment.
pub const FIRST_UE_ADDRESS: Ipv4Addr = Ipv4Addr::new(7, 0, 0, 2);

/// How a group of devices is attached to base stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Attachment {
    /// Each UE to its closest candidate, optionally dual-connected to an LTE anchor
    ClosestBs {
        ues: Vec<NodeId>,
        candidates: Vec<NodeId>,
        lte_anchor: Option<NodeId>,
    },
    /// Each relay to its closest wired donor
    RelayToClosestDonor { relays: Vec<NodeId>, donors: Vec<NodeId> },
    /// Closest-candidate attachment deferred until relays are up
    ClosestBsDelayed {
        ues: Vec<NodeId>,
        candidates: Vec<NodeId>,
        delay_ms: f64,
    },
}

/// Operations the scenario layer needs from a simulator.
pub trait SimulationEngine {
    fn set_default(&mut self, attribute: &EngineAttribute) -> Result<()>;
    fn create_node(&mut self, node: NodeId, role: NodeRole) -> Result<()>;
    fn set_mobility(&mut self, node: NodeId, mobility: &NodeMobility) -> Result<()>;
    fn install_device(&mut self, node: NodeId, kind: DeviceKind) -> Result<()>;
    fn install_ue_internet(&mut self, node: NodeId, address: Ipv4Addr) -> Result<()>;
    fn add_x2_interface(&mut self, a: NodeId, b: NodeId) -> Result<()>;
    fn attach(&mut self, attachment: &Attachment) -> Result<()>;
    fn create_trace_stream(&mut self, trace: &TraceHandle) -> Result<()>;
    fn create_flow(&mut self, flow: &Flow) -> Result<()>;
    fn install_bearer(&mut self, bearer: &BearerAssignment) -> Result<()>;
    fn stop_at(&mut self, time_ms: f64) -> Result<()>;
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineCall {
    SetDefault(EngineAttribute),
    CreateNode { node: NodeId, role: NodeRole },
    SetMobility { node: NodeId, mobility: NodeMobility },
    InstallDevice { node: NodeId, kind: DeviceKind },
    InstallUeInternet { node: NodeId, address: Ipv4Addr },
    AddX2Interface { a: NodeId, b: NodeId },
    Attach(Attachment),
    CreateTraceStream(TraceHandle),
    CreateFlow(Flow),
    InstallBearer(BearerAssignment),
    StopAt { time_ms: f64 },
}

impl EngineCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetDefault(_) => "set_default",
            Self::CreateNode { .. } => "create_node",
            Self::SetMobility { .. } => "set_mobility",
            Self::InstallDevice { .. } => "install_device",
            Self::InstallUeInternet { .. } => "install_ue_internet",
            Self::AddX2Interface { .. } => "add_x2_interface",
            Self::Attach(_) => "attach",
            Self::CreateTraceStream(_) => "create_trace_stream",
            Self::CreateFlow(_) => "create_flow",
            Self::InstallBearer(_) => "install_bearer",
            Self::StopAt { .. } => "stop_at",
        }
    }
}

/// Engine that only records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Number of calls per operation name
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for call in &self.calls {
            *counts.entry(call.name()).or_insert(0) += 1;
        }
        counts
    }
}

impl SimulationEngine for RecordingEngine {
    fn set_default(&mut self, attribute: &EngineAttribute) -> Result<()> {
        self.calls.push(EngineCall::SetDefault(attribute.clone()));
        Ok(())
    }

    fn create_node(&mut self, node: NodeId, role: NodeRole) -> Result<()> {
        self.calls.push(EngineCall::CreateNode { node, role });
        Ok(())
    }

    fn set_mobility(&mut self, node: NodeId, mobility: &NodeMobility) -> Result<()> {
        self.calls.push(EngineCall::SetMobility {
            node,
            mobility: mobility.clone(),
        });
        Ok(())
    }

    fn install_device(&mut self, node: NodeId, kind: DeviceKind) -> Result<()> {
        self.calls.push(EngineCall::InstallDevice { node, kind });
        Ok(())
    }

    fn install_ue_internet(&mut self, node: NodeId, address: Ipv4Addr) -> Result<()> {
        self.calls.push(EngineCall::InstallUeInternet { node, address });
        Ok(())
    }

    fn add_x2_interface(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        self.calls.push(EngineCall::AddX2Interface { a, b });
        Ok(())
    }

    fn attach(&mut self, attachment: &Attachment) -> Result<()> {
        self.calls.push(EngineCall::Attach(attachment.clone()));
        Ok(())
    }

    fn create_trace_stream(&mut self, trace: &TraceHandle) -> Result<()> {
        self.calls.push(EngineCall::CreateTraceStream(trace.clone()));
        Ok(())
    }

    fn create_flow(&mut self, flow: &Flow) -> Result<()> {
        self.calls.push(EngineCall::CreateFlow(flow.clone()));
        Ok(())
    }

    fn install_bearer(&mut self, bearer: &BearerAssignment) -> Result<()> {
        self.calls.push(EngineCall::InstallBearer(*bearer));
        Ok(())
    }

    fn stop_at(&mut self, time_ms: f64) -> Result<()> {
        self.calls.push(EngineCall::StopAt { time_ms });
        Ok(())
    }
}

/// Deterministic core-network address assignment.
///
/// UEs receive consecutive addresses in install order.
#[derive(Debug, Clone)]
pub struct AddressPlan {
    next_ue: u32,
}

impl AddressPlan {
    pub fn new() -> Self {
        Self {
            next_ue: u32::from(FIRST_UE_ADDRESS),
        }
    }

    pub fn remote_host(&self) -> Ipv4Addr {
        REMOTE_HOST_ADDRESS
    }

    pub fn next_ue_address(&mut self) -> Result<Ipv4Addr> {
        let address = Ipv4Addr::from(self.next_ue);
        // stay inside 7.0.0.0/8 and off its broadcast address
        if address.octets()[0] != FIRST_UE_ADDRESS.octets()[0] || address.octets()[1..] == [255, 255, 255] {
            return Err(ScenarioError::InvalidParameter("UE address pool exhausted".to_string()));
        }
        self.next_ue += 1;
        Ok(address)
    }
}

impl Default for AddressPlan {
    fn default() -> Self {
        Self::new()
    }
}
