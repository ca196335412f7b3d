//! Complete scenario descriptor and its deployment into an engine.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use psc_domain::{
    BearerAssignment, DeviceKind, Flow, MobileUnit, NodeId, NodeMobility, NodeRole, Obstacle, Point3, Result,
    ScenarioError, Site, TraceHandle,
};
use serde::Serialize;
use tracing::info;

use crate::engine::{AddressPlan, Attachment, SimulationEngine};
use crate::radio::EngineAttribute;

/// A node with everything the engine needs to instantiate it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedNode {
    pub id: NodeId,
    pub role: NodeRole,
    pub device: Option<DeviceKind>,
    pub mobility: NodeMobility,
    pub address: Option<Ipv4Addr>,
}

/// Every generated descriptor of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioPlan {
    pub name: String,
    pub seed: u64,
    pub run: u64,
    pub parameters: serde_json::Value,
    pub defaults: Vec<EngineAttribute>,
    /// File name of the gnuplot obstacle list
    pub obstacle_list_name: String,
    pub obstacles: Vec<Obstacle>,
    pub nodes: Vec<PlannedNode>,
    pub mobile_units: Vec<MobileUnit>,
    pub x2_links: Vec<(NodeId, NodeId)>,
    pub attachments: Vec<Attachment>,
    pub traces: Vec<TraceHandle>,
    pub flows: Vec<Flow>,
    pub bearers: Vec<BearerAssignment>,
    pub stop_ms: f64,
    /// Mobility trace file the scenario asks for, if any
    pub mobility_trace: Option<String>,
}

impl ScenarioPlan {
    pub fn node(&self, id: NodeId) -> Option<&PlannedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &PlannedNode> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    /// Infrastructure nodes with their initial positions
    pub fn sites(&self) -> Vec<Site> {
        self.nodes
            .iter()
            .filter_map(|n| {
                n.role.site_role().map(|role| Site {
                    node: n.id,
                    position: n.mobility.position_at(0.0),
                    role,
                })
            })
            .collect()
    }

    /// Flows grouped by trace file
    pub fn flows_by_trace(&self) -> BTreeMap<&TraceHandle, Vec<&Flow>> {
        let mut grouped: BTreeMap<&TraceHandle, Vec<&Flow>> = BTreeMap::new();
        for flow in &self.flows {
            grouped.entry(&flow.trace).or_default().push(flow);
        }
        grouped
    }

    pub fn stop_s(&self) -> f64 {
        self.stop_ms / 1000.0
    }
}

/// Accumulates nodes and descriptors in creation order.
#[derive(Debug)]
pub struct PlanBuilder {
    name: String,
    seed: u64,
    run: u64,
    defaults: Vec<EngineAttribute>,
    obstacle_list_name: String,
    obstacles: Vec<Obstacle>,
    nodes: Vec<PlannedNode>,
    mobile_units: Vec<MobileUnit>,
    x2_links: Vec<(NodeId, NodeId)>,
    attachments: Vec<Attachment>,
    traces: Vec<TraceHandle>,
    flows: Vec<Flow>,
    bearers: Vec<BearerAssignment>,
    mobility_trace: Option<String>,
    addresses: AddressPlan,
}

impl PlanBuilder {
    pub fn new(name: impl Into<String>, seed: u64, run: u64, defaults: Vec<EngineAttribute>) -> Self {
        Self {
            name: name.into(),
            seed,
            run,
            defaults,
            obstacle_list_name: "obstacles.txt".to_string(),
            obstacles: Vec::new(),
            nodes: Vec::new(),
            mobile_units: Vec::new(),
            x2_links: Vec::new(),
            attachments: Vec::new(),
            traces: Vec::new(),
            flows: Vec::new(),
            bearers: Vec::new(),
            mobility_trace: None,
            addresses: AddressPlan::new(),
        }
    }

    pub fn obstacles(&mut self, list_name: &str, obstacles: Vec<Obstacle>) {
        self.obstacle_list_name = list_name.to_string();
        self.obstacles = obstacles;
    }

    /// Remote host behind the core network, with its fixed address.
    pub fn remote_host(&mut self) -> (NodeId, Ipv4Addr) {
        let address = self.addresses.remote_host();
        let id = self.add_node(NodeRole::RemoteHost, None, NodeMobility::Constant { position: Point3::default() });
        if let Some(node) = self.nodes.last_mut() {
            node.address = Some(address);
        }
        (id, address)
    }

    pub fn add_node(&mut self, role: NodeRole, device: Option<DeviceKind>, mobility: NodeMobility) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PlannedNode {
            id,
            role,
            device,
            mobility,
            address: None,
        });
        id
    }

    /// One stationary node per position.
    pub fn add_fixed_nodes(&mut self, role: NodeRole, device: Option<DeviceKind>, positions: &[Point3]) -> Vec<NodeId> {
        positions
            .iter()
            .map(|p| self.add_node(role, device, NodeMobility::Constant { position: *p }))
            .collect()
    }

    pub fn add_mobile_unit(&mut self, unit: MobileUnit) {
        self.mobile_units.push(unit);
    }

    /// Assign core-network addresses to `ues`, in order.
    pub fn install_ue_internet(&mut self, ues: &[NodeId]) -> Result<Vec<Ipv4Addr>> {
        let mut assigned = Vec::with_capacity(ues.len());
        for id in ues {
            let address = self.addresses.next_ue_address()?;
            self.node_mut(*id)?.address = Some(address);
            assigned.push(address);
        }
        Ok(assigned)
    }

    pub fn connect_x2(&mut self, anchor: NodeId, peers: &[NodeId]) {
        self.x2_links.extend(peers.iter().map(|p| (anchor, *p)));
    }

    pub fn attach(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Trace stream handle, registered once per file name.
    pub fn trace(&mut self, file_name: &str) -> TraceHandle {
        let handle = TraceHandle::new(file_name);
        if !self.traces.contains(&handle) {
            self.traces.push(handle.clone());
        }
        handle
    }

    pub fn push_flow(&mut self, flow: Flow) {
        self.flows.push(flow);
    }

    pub fn push_bearer(&mut self, bearer: BearerAssignment) {
        self.bearers.push(bearer);
    }

    pub fn request_mobility_trace(&mut self, file_name: &str) {
        self.mobility_trace = Some(file_name.to_string());
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut PlannedNode> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or_else(|| ScenarioError::InvalidParameter(format!("unknown node {id}")))
    }

    pub fn build(self, stop_ms: f64, parameters: serde_json::Value) -> ScenarioPlan {
        let plan = ScenarioPlan {
            name: self.name,
            seed: self.seed,
            run: self.run,
            parameters,
            defaults: self.defaults,
            obstacle_list_name: self.obstacle_list_name,
            obstacles: self.obstacles,
            nodes: self.nodes,
            mobile_units: self.mobile_units,
            x2_links: self.x2_links,
            attachments: self.attachments,
            traces: self.traces,
            flows: self.flows,
            bearers: self.bearers,
            stop_ms,
            mobility_trace: self.mobility_trace,
        };
        info!(
            "Plan '{}': {} nodes, {} obstacles, {} flows, {} bearers, stop at {:.3} s",
            plan.name,
            plan.nodes.len(),
            plan.obstacles.len(),
            plan.flows.len(),
            plan.bearers.len(),
            plan.stop_s()
        );
        plan
    }
}

/// Push a finished plan into `engine`.
///
/// Order: defaults, nodes with mobility, devices, UE addresses, X2 links,
/// attachments, trace streams, flows, bearers, stop time.
pub fn deploy<E: SimulationEngine>(plan: &ScenarioPlan, engine: &mut E) -> Result<()> {
    for attribute in &plan.defaults {
        engine.set_default(attribute)?;
    }
    for node in &plan.nodes {
        engine.create_node(node.id, node.role)?;
        engine.set_mobility(node.id, &node.mobility)?;
    }
    for node in &plan.nodes {
        if let Some(kind) = node.device {
            engine.install_device(node.id, kind)?;
        }
    }
    for node in plan.nodes.iter().filter(|n| n.device.is_some()) {
        if let Some(address) = node.address {
            engine.install_ue_internet(node.id, address)?;
        }
    }
    for (a, b) in &plan.x2_links {
        engine.add_x2_interface(*a, *b)?;
    }
    for attachment in &plan.attachments {
        engine.attach(attachment)?;
    }
    for trace in &plan.traces {
        engine.create_trace_stream(trace)?;
    }
    for flow in &plan.flows {
        engine.create_flow(flow)?;
    }
    for bearer in &plan.bearers {
        engine.install_bearer(bearer)?;
    }
    engine.stop_at(plan.stop_ms)?;

    info!("Deployed plan '{}'", plan.name);
    Ok(())
}
