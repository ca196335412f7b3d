//! Plain-text scenario outputs: gnuplot lists, packet traces, mobility trace
//! and the JSON plan summary.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use psc_domain::{Flow, NodeRole, Obstacle, Result, ScenarioError, TraceHandle};
use tracing::{debug, info};

use crate::plan::{PlannedNode, ScenarioPlan};

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// One gnuplot `set object` rectangle per obstacle, numbered from 1.
pub fn write_obstacle_list(path: &Path, obstacles: &[Obstacle]) -> Result<()> {
    let mut out = create(path)?;
    for (index, o) in obstacles.iter().enumerate() {
        writeln!(
            out,
            "set object {} rect from {},{} to {},{} front fs empty ",
            index + 1,
            o.origin_x,
            o.origin_y,
            o.x_max(),
            o.y_max()
        )?;
    }
    out.flush()?;
    debug!("Wrote {} obstacles to {}", obstacles.len(), path.display());
    Ok(())
}

fn label_color(role: NodeRole) -> &'static str {
    match role {
        NodeRole::LteMacro => "red",
        NodeRole::MmWaveBs | NodeRole::WiredDonor => "blue",
        NodeRole::IabRelay => "orange",
        _ => "black",
    }
}

/// One gnuplot label per node with a radio device, at its initial position.
pub fn write_node_list(path: &Path, nodes: &[PlannedNode]) -> Result<()> {
    let mut out = create(path)?;
    for node in nodes.iter().filter(|n| n.device.is_some()) {
        let p = node.mobility.position_at(0.0);
        let color = label_color(node.role);
        writeln!(
            out,
            "set label \"{}\" at {},{} left font \"Helvetica,8\" textcolor rgb \"{color}\" front point pt 1 ps 0.3 lc rgb \"{color}\" offset 0,0",
            node.id, p.x, p.y
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Per-direction packet trace files, created up front and appended to.
///
/// Lines are `time_ms<TAB>port<TAB>size_bytes`.
pub struct PacketTraceWriter {
    dir: PathBuf,
    streams: BTreeMap<TraceHandle, BufWriter<File>>,
}

impl PacketTraceWriter {
    /// Create (truncate) one file per handle in `dir`.
    pub fn create(dir: &Path, traces: &[TraceHandle]) -> Result<Self> {
        let mut streams = BTreeMap::new();
        for trace in traces {
            streams.insert(trace.clone(), create(&dir.join(&trace.file_name))?);
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            streams,
        })
    }

    pub fn record(&mut self, trace: &TraceHandle, time_ms: f64, port: u16, size_bytes: u32) -> Result<()> {
        let out = match self.streams.entry(trace.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(create(&self.dir.join(&trace.file_name))?),
        };
        writeln!(out, "{time_ms:.6}\t{port}\t{size_bytes}")?;
        Ok(())
    }

    /// Append the nominal send schedule of `flow`: one line per packet in
    /// `[start_ms, end_ms)`.
    pub fn record_schedule(&mut self, flow: &Flow) -> Result<u64> {
        let count = flow.expected_packets();
        for k in 0..count {
            let time_ms = flow.start_ms + k as f64 * flow.interval_us / 1000.0;
            self.record(&flow.trace, time_ms, flow.port, flow.packet_size_bytes)?;
        }
        Ok(count)
    }

    pub fn finish(mut self) -> Result<()> {
        for out in self.streams.values_mut() {
            out.flush()?;
        }
        Ok(())
    }
}

/// Sample every node at `step_s` up to `horizon_s`.
///
/// Lines follow the engine's ascii mobility format:
/// `now=<t>s node=<id> pos=<x>:<y>:<z> vel=<vx>:<vy>:<vz>`.
pub fn write_mobility_trace(path: &Path, nodes: &[PlannedNode], step_s: f64, horizon_s: f64) -> Result<usize> {
    if step_s.is_nan() || step_s <= 0.0 {
        return Err(ScenarioError::InvalidParameter(format!(
            "mobility trace step must be positive, got {step_s}"
        )));
    }
    let mut out = create(path)?;
    let steps = (horizon_s / step_s).floor().max(0.0) as u64;
    let mut lines = 0;
    for k in 0..=steps {
        let t = k as f64 * step_s;
        for node in nodes.iter().filter(|n| n.device.is_some()) {
            let p = node.mobility.position_at(t);
            let v = node.mobility.velocity_at(t);
            writeln!(
                out,
                "now={t:.3}s node={} pos={:.3}:{:.3}:{:.3} vel={:.3}:{:.3}:{:.3}",
                node.id, p.x, p.y, p.z, v.x, v.y, v.z
            )?;
            lines += 1;
        }
    }
    out.flush()?;
    Ok(lines)
}

pub fn write_plan_json(path: &Path, plan: &ScenarioPlan) -> Result<()> {
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, plan)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// What to write besides the always-present lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Force a mobility trace even if the scenario does not request one
    pub mobility_trace: bool,
    pub mobility_trace_step_s: f64,
    /// Fill packet traces with each flow's nominal send schedule
    pub nominal_packet_traces: bool,
}

/// Write every output of `plan` into `dir`.
pub fn write_all(dir: &Path, plan: &ScenarioPlan, options: OutputOptions) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    write_obstacle_list(&dir.join(&plan.obstacle_list_name), &plan.obstacles)?;
    write_node_list(&dir.join("nodes.txt"), &plan.nodes)?;

    let mut traces = PacketTraceWriter::create(dir, &plan.traces)?;
    if options.nominal_packet_traces {
        let packets: u64 = plan
            .flows
            .iter()
            .map(|flow| traces.record_schedule(flow))
            .sum::<Result<u64>>()?;
        info!("Wrote {} nominal packet records", packets);
    }
    traces.finish()?;

    let mobility_file = match (&plan.mobility_trace, options.mobility_trace) {
        (Some(name), _) => Some(name.clone()),
        (None, true) => Some("mobility-trace.mob".to_string()),
        (None, false) => None,
    };
    if let Some(name) = mobility_file {
        let step = if options.mobility_trace_step_s > 0.0 { options.mobility_trace_step_s } else { 0.1 };
        let lines = write_mobility_trace(&dir.join(&name), &plan.nodes, step, plan.stop_s())?;
        info!("Wrote {} mobility samples to {}", lines, name);
    }

    write_plan_json(&dir.join("scenario.json"), plan)?;
    info!("Outputs written to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{MvaParams, SwatParams, generate};
    use psc_domain::{DeviceKind, Direction, NodeId, NodeMobility, Point3, Trajectory, Waypoint};
    use std::net::Ipv4Addr;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn room() -> Obstacle {
        Obstacle { id: 0, origin_x: 0.0, origin_y: 0.0, width: 20.0, length: 20.0, height: 3.0 }
    }

    fn walker() -> PlannedNode {
        PlannedNode {
            id: NodeId(4),
            role: NodeRole::SwatOfficer,
            device: Some(DeviceKind::MmWaveUe),
            mobility: NodeMobility::Waypoints {
                trajectory: Trajectory::new(vec![
                    Waypoint::new(Point3::new(0.0, 0.0, 1.5), 0.0),
                    Waypoint::new(Point3::new(10.0, 0.0, 1.5), 2.0),
                ]),
            },
            address: Some(Ipv4Addr::new(7, 0, 0, 2)),
        }
    }

    #[test]
    fn test_obstacle_list_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.txt");
        let second = Obstacle { id: 1, origin_x: 23.5, ..room() };
        write_obstacle_list(&path, &[room(), second]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "set object 1 rect from 0,0 to 20,20 front fs empty ");
        assert_eq!(lines[1], "set object 2 rect from 23.5,0 to 43.5,20 front fs empty ");
    }

    #[test]
    fn test_node_list_skips_nodes_without_devices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.txt");
        let host = PlannedNode {
            id: NodeId(0),
            role: NodeRole::RemoteHost,
            device: None,
            mobility: NodeMobility::Constant { position: Point3::default() },
            address: None,
        };
        write_node_list(&path, &[host, walker()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("set label \"4\" at 0,0 "));
    }

    #[test]
    fn test_packet_traces_created_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let ul = TraceHandle::new("ul-app-trace.txt");
        let dl = TraceHandle::new("dl-app-trace.txt");
        let mut writer = PacketTraceWriter::create(dir.path(), &[ul.clone(), dl]).unwrap();

        let flow = Flow {
            source: NodeId(1),
            sink: NodeId(0),
            sink_address: Ipv4Addr::new(1, 0, 0, 2),
            direction: Direction::Uplink,
            port: 1235,
            packet_size_bytes: 1024,
            interval_us: 100_000.0,
            start_ms: 500.0,
            end_ms: 900.0,
            trace: ul,
        };
        assert_eq!(writer.record_schedule(&flow).unwrap(), 4);
        writer.finish().unwrap();

        let ul_text = std::fs::read_to_string(dir.path().join("ul-app-trace.txt")).unwrap();
        assert_eq!(ul_text.lines().next(), Some("500.000000\t1235\t1024"));
        assert_eq!(ul_text.lines().last(), Some("800.000000\t1235\t1024"));
        assert!(std::fs::read_to_string(dir.path().join("dl-app-trace.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_mobility_trace_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mobility.mob");
        let lines = write_mobility_trace(&path, &[walker()], 0.5, 2.0).unwrap();
        assert_eq!(lines, 5);

        let text = std::fs::read_to_string(&path).unwrap();
        let second = text.lines().nth(1).unwrap();
        assert_eq!(second, "now=0.500s node=4 pos=2.500:0.000:1.500 vel=5.000:0.000:0.000");
        assert!(write_mobility_trace(&path, &[walker()], 0.0, 2.0).is_err());
    }

    #[test]
    fn test_write_all_is_reproducible() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        for dir in [&first, &second] {
            let plan = generate(&SwatParams::default(), 5, 1).unwrap();
            write_all(dir.path(), &plan, OutputOptions::default()).unwrap();
        }

        let names = file_names(first.path());
        assert_eq!(
            names,
            ["mobility-trace-example.mob", "nodes.txt", "rooms.txt", "scenario.json", "ul-app-trace.txt"]
        );
        assert_eq!(file_names(second.path()), names);
        for name in &names {
            let a = std::fs::read(first.path().join(name)).unwrap();
            let b = std::fs::read(second.path().join(name)).unwrap();
            assert_eq!(a, b, "{name} differs");
        }

        let rooms = std::fs::read_to_string(first.path().join("rooms.txt")).unwrap();
        assert_eq!(rooms.lines().count(), 16);
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(first.path().join("scenario.json")).unwrap()).unwrap();
        assert_eq!(json["name"], "swat");
        assert_eq!(json["flows"].as_array().unwrap().len(), 16);
    }

    #[test]
    fn test_write_all_optional_outputs() {
        let plan = generate(&MvaParams::default(), 1, 1).unwrap();

        let plain = tempfile::tempdir().unwrap();
        write_all(plain.path(), &plan, OutputOptions::default()).unwrap();
        assert_eq!(
            file_names(plain.path()),
            ["dl-app-trace.txt", "nodes.txt", "obstacles.txt", "scenario.json", "ul-app-trace.txt"]
        );
        assert!(std::fs::read_to_string(plain.path().join("ul-app-trace.txt")).unwrap().is_empty());

        let forced = tempfile::tempdir().unwrap();
        let options = OutputOptions {
            mobility_trace: true,
            mobility_trace_step_s: 0.0,
            nominal_packet_traces: true,
        };
        write_all(forced.path(), &plan, options).unwrap();

        // step 0 falls back to 0.1 s: 11 samples over the 1 s run
        let devices = plan.nodes.iter().filter(|n| n.device.is_some()).count();
        let mobility = std::fs::read_to_string(forced.path().join("mobility-trace.mob")).unwrap();
        assert_eq!(mobility.lines().count(), 11 * devices);

        let ul = std::fs::read_to_string(forced.path().join("ul-app-trace.txt")).unwrap();
        let expected: u64 = plan
            .flows
            .iter()
            .filter(|f| f.direction == Direction::Uplink)
            .map(Flow::expected_packets)
            .sum();
        assert_eq!(ul.lines().count() as u64, expected);
    }
}
