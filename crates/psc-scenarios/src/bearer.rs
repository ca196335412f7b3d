//! Dedicated bearers for selected flows.

use std::collections::BTreeSet;

use psc_domain::{BearerAssignment, Flow, ForwardingPath, NodeId, QosClass, Result, ScenarioError};
use tracing::info;

/// Bearers whose priority level is below this go through LTE.
pub const DEFAULT_LTE_PRIORITY_THRESHOLD: u8 = 10;

#[derive(Debug, Clone)]
pub struct BearerQosMapper {
    lte_priority_threshold: u8,
    assigned: BTreeSet<(NodeId, u16)>,
}

impl BearerQosMapper {
    pub fn new(lte_priority_threshold: u8) -> Self {
        Self {
            lte_priority_threshold,
            assigned: BTreeSet::new(),
        }
    }

    /// Forwarding path chosen by the transport layer for `class`.
    pub fn forwarding_path(&self, class: QosClass) -> ForwardingPath {
        if class.priority_level() < self.lte_priority_threshold {
            ForwardingPath::Lte
        } else {
            ForwardingPath::MmWave
        }
    }

    /// Bind `flow`'s port on `device` to `class`.
    ///
    /// # Errors
    ///
    /// [`ScenarioError::BearerAlreadyAssigned`] if the device port already
    /// carries a dedicated bearer.
    pub fn assign_bearer(&mut self, flow: &Flow, device: NodeId, class: QosClass) -> Result<BearerAssignment> {
        if !self.assigned.insert((device, flow.port)) {
            return Err(ScenarioError::BearerAlreadyAssigned {
                device,
                port: flow.port,
            });
        }
        let path = self.forwarding_path(class);
        info!(
            "Dedicated {} bearer QCI {} on device {} port {} via {:?}",
            if class.is_gbr() { "GBR" } else { "non-GBR" },
            class.qci(),
            device,
            flow.port,
            path
        );
        Ok(BearerAssignment {
            device,
            port: flow.port,
            class,
            path,
        })
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

impl Default for BearerQosMapper {
    fn default() -> Self {
        Self::new(DEFAULT_LTE_PRIORITY_THRESHOLD)
    }
}
