//! Engine-wide radio and RLC defaults, set before any node exists.

use psc_domain::{Result, RlcMode, ScenarioError};
use serde::{Deserialize, Serialize};

/// 3GPP propagation scenario for the path-loss model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationScenario {
    UrbanMacro,
    IndoorOfficeMixed,
}

impl PropagationScenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrbanMacro => "UMa",
            Self::IndoorOfficeMixed => "InH-OfficeMixed",
        }
    }
}

/// Typed value of an engine attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeValue {
    Double(f64),
    Unsigned(u64),
    Bool(bool),
    Text(String),
    Micros(u64),
}

/// One `key = value` default handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineAttribute {
    pub key: String,
    pub value: AttributeValue,
}

impl EngineAttribute {
    fn new(key: &str, value: AttributeValue) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }
}

/// Frame numerology overrides used by the indoor scenario
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameOverrides {
    pub symbols_per_subframe: u32,
    pub subframe_period_us: f64,
    pub ul_sched_delay: u32,
    pub cqi_timer_threshold: u32,
}

impl Default for FrameOverrides {
    fn default() -> Self {
        Self {
            symbols_per_subframe: 240,
            subframe_period_us: 1000.0,
            ul_sched_delay: 1,
            cqi_timer_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    pub frequency_hz: f64,
    pub bandwidth_hz: f64,
    pub bs_antenna_elements: u32,
    pub ue_antenna_elements: u32,
    /// Access and backhaul arrays of IAB nodes, when any are deployed
    pub iab_antenna_elements: Option<u32>,
    pub packet_size_bytes: u32,
    pub rlc_mode: RlcMode,
    pub rlc_buffer_mb: u32,
    pub channel_update_period_ms: u32,
    /// Beam towards the exact receiver direction with 3GPP element patterns
    pub directional_beams: bool,
    pub propagation: PropagationScenario,
    /// Route all user-plane traffic over LTE
    pub lte_only: bool,
    pub lte_outage_threshold_db: Option<f64>,
    pub frame: Option<FrameOverrides>,
}

impl RadioConfig {
    /// Outdoor macro defaults at `frequency_hz` / `bandwidth_hz`.
    pub fn new(frequency_hz: f64, bandwidth_hz: f64) -> Self {
        Self {
            frequency_hz,
            bandwidth_hz,
            bs_antenna_elements: 64,
            ue_antenna_elements: 16,
            iab_antenna_elements: None,
            packet_size_bytes: 1024,
            rlc_mode: RlcMode::Acknowledged,
            rlc_buffer_mb: 10,
            channel_update_period_ms: 400,
            directional_beams: true,
            propagation: PropagationScenario::UrbanMacro,
            lte_only: false,
            lte_outage_threshold_db: None,
            frame: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.frequency_hz > 0.0 && self.bandwidth_hz > 0.0) {
            return Err(ScenarioError::InvalidParameter(format!(
                "frequency {} Hz and bandwidth {} Hz must be positive",
                self.frequency_hz, self.bandwidth_hz
            )));
        }
        if self.packet_size_bytes == 0 {
            return Err(ScenarioError::InvalidParameter("packet size must be positive".to_string()));
        }
        Ok(())
    }

    /// Resource-block chunks scale with bandwidth (72 per GHz), truncated.
    pub fn chunks_per_rb(&self) -> u64 {
        (72.0 * self.bandwidth_hz / 1e9) as u64
    }

    /// Reference subcarriers per symbol (864 per GHz), truncated.
    pub fn ref_subcarriers_per_symbol(&self) -> u64 {
        (864.0 * self.bandwidth_hz / 1e9) as u64
    }

    pub fn rlc_buffer_bytes(&self) -> u64 {
        u64::from(self.rlc_buffer_mb) * 1024 * 1024
    }

    /// Full attribute set, in the order the engine should apply it.
    pub fn attributes(&self) -> Vec<EngineAttribute> {
        use AttributeValue::{Bool, Double, Micros, Text, Unsigned};

        let mut attrs = vec![
            EngineAttribute::new("phy.center_frequency_hz", Double(self.frequency_hz)),
            EngineAttribute::new("phy.chunks_per_rb", Unsigned(self.chunks_per_rb())),
            EngineAttribute::new("phy.ref_subcarriers_per_symbol", Unsigned(self.ref_subcarriers_per_symbol())),
            EngineAttribute::new("bs.antenna_elements", Unsigned(u64::from(self.bs_antenna_elements))),
            EngineAttribute::new("ue.antenna_elements", Unsigned(u64::from(self.ue_antenna_elements))),
        ];
        if let Some(n) = self.iab_antenna_elements {
            attrs.push(EngineAttribute::new("iab.access_antenna_elements", Unsigned(u64::from(n))));
            attrs.push(EngineAttribute::new("iab.backhaul_antenna_elements", Unsigned(u64::from(n))));
        }

        let update_ms = if self.lte_only { 0 } else { self.channel_update_period_ms };
        attrs.push(EngineAttribute::new("channel.update_period", Micros(u64::from(update_ms) * 1000)));
        if self.directional_beams {
            attrs.push(EngineAttribute::new("channel.direct_beam", Bool(true)));
            attrs.push(EngineAttribute::new("antenna.isotropic_elements", Bool(false)));
        }
        attrs.push(EngineAttribute::new("channel.model", Text("3gpp".to_string())));
        attrs.push(EngineAttribute::new("pathloss.model", Text("3gpp-buildings".to_string())));
        attrs.push(EngineAttribute::new(
            "pathloss.scenario",
            Text(self.propagation.as_str().to_string()),
        ));
        attrs.push(EngineAttribute::new(
            "app.packet_size_bytes",
            Unsigned(u64::from(self.packet_size_bytes)),
        ));

        if let Some(frame) = self.frame {
            attrs.push(EngineAttribute::new(
                "phy.symbols_per_subframe",
                Unsigned(u64::from(frame.symbols_per_subframe)),
            ));
            attrs.push(EngineAttribute::new("phy.subframe_period_us", Double(frame.subframe_period_us)));
            attrs.push(EngineAttribute::new("phy.ul_sched_delay", Unsigned(u64::from(frame.ul_sched_delay))));
        }

        let buffer = self.rlc_buffer_bytes();
        attrs.extend([
            EngineAttribute::new("rlc.am.max_tx_buffer_bytes", Unsigned(buffer)),
            EngineAttribute::new("rlc.um.max_tx_buffer_bytes", Unsigned(buffer)),
            EngineAttribute::new("rlc.am.poll_retransmit_timer", Micros(1_000)),
            EngineAttribute::new("rlc.am.reordering_timer", Micros(2_000)),
            EngineAttribute::new("rlc.am.status_prohibit_timer", Micros(500)),
            EngineAttribute::new("rlc.am.report_buffer_status_timer", Micros(500)),
            EngineAttribute::new("rlc.um.report_buffer_status_timer", Micros(500)),
            EngineAttribute::new("rlc.am_enabled", Bool(self.rlc_mode == RlcMode::Acknowledged)),
        ]);

        if let Some(frame) = self.frame {
            attrs.push(EngineAttribute::new(
                "scheduler.cqi_timer_threshold",
                Unsigned(u64::from(frame.cqi_timer_threshold)),
            ));
        }
        if self.lte_only {
            attrs.push(EngineAttribute::new("pdcp.lte_uplink", Bool(true)));
            attrs.push(EngineAttribute::new("pdcp.lte_downlink", Bool(true)));
        }
        if let Some(threshold) = self.lte_outage_threshold_db {
            attrs.push(EngineAttribute::new("lte.outage_threshold_db", Double(threshold)));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(attrs: &'a [EngineAttribute], key: &str) -> Option<&'a AttributeValue> {
        attrs.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    #[test]
    fn test_bandwidth_derived_values() {
        let wide = RadioConfig::new(30e9, 1e9);
        assert_eq!(wide.chunks_per_rb(), 72);
        assert_eq!(wide.ref_subcarriers_per_symbol(), 864);

        let narrow = RadioConfig::new(30e9, 400e6);
        assert_eq!(narrow.chunks_per_rb(), 28);
        assert_eq!(narrow.ref_subcarriers_per_symbol(), 345);
        assert_eq!(narrow.rlc_buffer_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_lte_only_freezes_channel() {
        let config = RadioConfig {
            lte_only: true,
            ..RadioConfig::new(30e9, 1e9)
        };
        let attrs = config.attributes();

        assert_eq!(lookup(&attrs, "channel.update_period"), Some(&AttributeValue::Micros(0)));
        assert_eq!(lookup(&attrs, "pdcp.lte_uplink"), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_indoor_overrides() {
        let config = RadioConfig {
            propagation: PropagationScenario::IndoorOfficeMixed,
            frame: Some(FrameOverrides::default()),
            iab_antenna_elements: Some(64),
            rlc_mode: RlcMode::Unacknowledged,
            ..RadioConfig::new(30e9, 400e6)
        };
        let attrs = config.attributes();

        assert_eq!(
            lookup(&attrs, "pathloss.scenario"),
            Some(&AttributeValue::Text("InH-OfficeMixed".to_string()))
        );
        assert_eq!(lookup(&attrs, "phy.symbols_per_subframe"), Some(&AttributeValue::Unsigned(240)));
        assert_eq!(lookup(&attrs, "iab.backhaul_antenna_elements"), Some(&AttributeValue::Unsigned(64)));
        assert_eq!(lookup(&attrs, "rlc.am_enabled"), Some(&AttributeValue::Bool(false)));
        assert!(lookup(&attrs, "lte.outage_threshold_db").is_none());
    }

    #[test]
    fn test_validation() {
        assert!(RadioConfig::new(30e9, 1e9).validate().is_ok());
        assert!(RadioConfig::new(30e9, 0.0).validate().is_err());
    }
}
