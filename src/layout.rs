//! Layout-engine contract and request construction.
//!
//! The engine is an external collaborator: it receives a flat graph of
//! fixed-port children and port-to-port edges, and returns the same graph
//! annotated with coordinates, routed edge sections, and junction points.
//! The types here derive serde with camelCase names so the boundary is a
//! JSON-shaped contract.
//!
//! Hyperedges are not part of the contract, so multi-driver and
//! multi-rider nets without the opposite side are routed through
//! synthesized dummy children (`$d_n`, single port `.p`) that the
//! reconciler later removes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::flatten::{FlatCell, FlatModule, FlatPort, PortRef, PortSide, Wire};
use crate::flatten::{TYPE_DFF, TYPE_INPUT_EXT, TYPE_OUTPUT_EXT};
use crate::skin::{self, Skin};

const PORT_CONSTRAINTS: &str = "org.eclipse.elk.portConstraints";
const PRIORITY_DIRECTION: &str = "org.eclipse.elk.layered.priority.direction";
const EDGE_THICKNESS: &str = "org.eclipse.elk.edge.thickness";
const INLINE_EDGE_LABELS: &str = "org.eclipse.elk.edgeLabels.inline";

const LABEL_CHAR_WIDTH: f64 = 6.0;
const LABEL_HEIGHT: f64 = 11.0;

/// An orthogonal layout engine.
///
/// This is the pipeline's one asynchronous boundary; a blocking
/// implementation on the calling thread is an accepted realization.
/// Failures are propagated verbatim to the caller.
pub trait LayoutEngine {
    fn layout(
        &self,
        graph: LayoutGraph,
        options: &IndexMap<String, String>,
    ) -> std::result::Result<LayoutGraph, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub layout_options: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPort {
    pub id: String,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LayoutLabel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutChild {
    pub id: String,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub ports: Vec<LayoutPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LayoutLabel>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub layout_options: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// One routed span of an edge: start, optional bends, end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSection {
    pub start_point: Point,
    pub end_point: Point,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bend_points: Vec<Point>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LayoutLabel>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub layout_options: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<EdgeSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub junction_points: Vec<Point>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutGraph {
    pub id: String,
    #[serde(default)]
    pub children: Vec<LayoutChild>,
    #[serde(default)]
    pub edges: Vec<LayoutEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// A layout request plus the edge-id → canonical-net map the assembler
/// needs after the round trip.
#[derive(Debug, Clone)]
pub struct LayoutRequest {
    pub graph: LayoutGraph,
    pub edge_nets: IndexMap<String, String>,
}

/// Build the layout request for a flat module.
pub fn build_layout_graph(module: &FlatModule, skin: &Skin) -> Result<LayoutRequest> {
    let mut builder = GraphBuilder {
        module,
        children: Vec::new(),
        edges: Vec::new(),
        edge_nets: IndexMap::new(),
        edge_index: 0,
        dummy_num: 0,
    };
    for cell in &module.nodes {
        let child = build_child(cell, skin)?;
        builder.children.push(child);
    }
    for wire in &module.wires {
        builder.wire_edges(wire);
    }
    debug!(
        children = builder.children.len(),
        edges = builder.edges.len(),
        dummies = builder.dummy_num,
        "built layout request"
    );
    Ok(LayoutRequest {
        graph: LayoutGraph {
            id: module.name.clone(),
            children: builder.children,
            edges: builder.edges,
            width: None,
            height: None,
        },
        edge_nets: builder.edge_nets,
    })
}

struct GraphBuilder<'a> {
    module: &'a FlatModule,
    children: Vec<LayoutChild>,
    edges: Vec<LayoutEdge>,
    edge_nets: IndexMap<String, String>,
    edge_index: usize,
    dummy_num: usize,
}

impl<'a> GraphBuilder<'a> {
    fn wire_edges(&mut self, wire: &Wire) {
        let num_wires = wire.net.matches(',').count().saturating_sub(1);
        let has_drivers = !wire.drivers.is_empty();
        let has_riders = !wire.riders.is_empty();
        if has_drivers && has_riders && wire.laterals.is_empty() {
            self.route(wire, &wire.drivers, &wire.riders, num_wires);
        } else if (has_drivers || has_riders) && !wire.laterals.is_empty() {
            self.route(wire, &wire.drivers, &wire.laterals, num_wires);
            self.route(wire, &wire.laterals, &wire.riders, num_wires);
        } else if !has_riders && wire.drivers.len() > 1 {
            // fan-in with no consumers: gather all drivers onto a dummy
            let dummy = self.add_dummy();
            for &d in &wire.drivers {
                self.edge_into_dummy(wire, d, &dummy);
            }
        } else if !has_drivers && wire.riders.len() > 1 {
            // fan-out with no producer: feed all riders from a dummy
            let dummy = self.add_dummy();
            for &r in &wire.riders {
                self.edge_from_dummy(wire, &dummy, r);
            }
        } else if wire.laterals.len() > 1 {
            let (first, rest) = (wire.laterals[0], &wire.laterals[1..]);
            for &lateral in rest {
                self.plain_edge(wire, first, lateral);
            }
        }
    }

    /// Cartesian source→target edges with routing hints. Edges leaving a
    /// flip-flop are left without the forward priority so feedback arcs
    /// can route backwards.
    fn route(&mut self, wire: &Wire, sources: &[PortRef], targets: &[PortRef], num_wires: usize) {
        for &s in sources {
            for &t in targets {
                let (source_cell, source_port) = self.endpoint(s);
                let (target_cell, target_port) = self.endpoint(t);
                let mut edge = LayoutEdge {
                    id: self.next_edge_id(wire),
                    source: source_cell.key.clone(),
                    source_port,
                    target: target_cell.key.clone(),
                    target_port,
                    ..LayoutEdge::default()
                };
                if source_cell.cell_type != TYPE_DFF {
                    edge.layout_options.insert(PRIORITY_DIRECTION.to_string(), "10".to_string());
                }
                edge.layout_options.insert(
                    EDGE_THICKNESS.to_string(),
                    if num_wires > 1 { "2" } else { "1" }.to_string(),
                );
                if num_wires > 1 {
                    edge.labels.push(bus_label(&edge.id, num_wires));
                }
                self.edges.push(edge);
            }
        }
    }

    fn plain_edge(&mut self, wire: &Wire, source: PortRef, target: PortRef) {
        let (source_cell, source_port) = self.endpoint(source);
        let (target_cell, target_port) = self.endpoint(target);
        let edge = LayoutEdge {
            id: self.next_edge_id(wire),
            source: source_cell.key.clone(),
            source_port,
            target: target_cell.key.clone(),
            target_port,
            ..LayoutEdge::default()
        };
        self.edges.push(edge);
    }

    fn edge_into_dummy(&mut self, wire: &Wire, source: PortRef, dummy: &str) {
        let (cell, port) = self.endpoint(source);
        let edge = LayoutEdge {
            id: self.next_edge_id(wire),
            source: cell.key.clone(),
            source_port: port,
            target: dummy.to_string(),
            target_port: format!("{dummy}.p"),
            ..LayoutEdge::default()
        };
        self.edges.push(edge);
    }

    fn edge_from_dummy(&mut self, wire: &Wire, dummy: &str, target: PortRef) {
        let (cell, port) = self.endpoint(target);
        let edge = LayoutEdge {
            id: self.next_edge_id(wire),
            source: dummy.to_string(),
            source_port: format!("{dummy}.p"),
            target: cell.key.clone(),
            target_port: port,
            ..LayoutEdge::default()
        };
        self.edges.push(edge);
    }

    fn endpoint(&self, r: PortRef) -> (&'a FlatCell, String) {
        let cell = &self.module.nodes[r.cell];
        let port = self.module.port(r);
        (cell, format!("{}.{}", cell.key, port.key))
    }

    fn next_edge_id(&mut self, wire: &Wire) -> String {
        let id = format!("e{}", self.edge_index);
        self.edge_index += 1;
        self.edge_nets.insert(id.clone(), wire.net.clone());
        id
    }

    fn add_dummy(&mut self) -> String {
        let id = format!("$d_{}", self.dummy_num);
        self.dummy_num += 1;
        let mut child = LayoutChild {
            id: id.clone(),
            width: 2.0,
            height: 2.0,
            ..LayoutChild::default()
        };
        child.ports.push(LayoutPort {
            id: format!("{id}.p"),
            ..LayoutPort::default()
        });
        child.layout_options.insert(PORT_CONSTRAINTS.to_string(), "FIXED_SIDE".to_string());
        self.children.push(child);
        id
    }
}

fn bus_label(edge_id: &str, num_wires: usize) -> LayoutLabel {
    let mut label = LayoutLabel {
        id: Some(format!("{edge_id}.label")),
        text: num_wires.to_string(),
        x: 0.0,
        y: 0.0,
        width: 4.0,
        height: 6.0,
        ..LayoutLabel::default()
    };
    label.layout_options.insert(INLINE_EDGE_LABELS.to_string(), "true".to_string());
    label
}

/// Materialize a cell as a fixed-port layout child with skin geometry.
fn build_child(cell: &FlatCell, skin: &Skin) -> Result<LayoutChild> {
    let template = skin.find_template(&cell.cell_type)?;
    let ttype = skin::template_type(template);
    let mut child = LayoutChild {
        id: cell.key.clone(),
        width: template.num_attr("s:width").unwrap_or(0.0),
        height: template.num_attr("s:height").unwrap_or(0.0),
        ..LayoutChild::default()
    };
    child.layout_options.insert(PORT_CONSTRAINTS.to_string(), "FIXED_POS".to_string());

    if matches!(ttype, "generic" | "split" | "join") {
        child.height = skin::generic_height(template, cell.inputs.len(), cell.outputs.len());
        let in_slots = skin::ports_with_prefix(template, "in");
        let out_slots = skin::ports_with_prefix(template, "out");
        for (i, port) in cell.inputs.iter().enumerate() {
            child.ports.push(generic_port(cell, port, i, &in_slots, ttype, PortSide::Input));
        }
        for (i, port) in cell.outputs.iter().enumerate() {
            child.ports.push(generic_port(cell, port, i, &out_slots, ttype, PortSide::Output));
        }
        if ttype == "generic" {
            if let Some(anchor) = template.find("text") {
                child.labels.push(LayoutLabel {
                    id: Some(format!("{}.label", cell.key)),
                    text: cell.cell_type.clone(),
                    x: anchor.num_attr("x").unwrap_or(0.0) - 10.0,
                    y: anchor.num_attr("y").unwrap_or(0.0) - LABEL_HEIGHT,
                    width: LABEL_CHAR_WIDTH * cell.cell_type.chars().count() as f64,
                    height: LABEL_HEIGHT,
                    ..LayoutLabel::default()
                });
            }
        }
        return Ok(child);
    }

    for slot in skin::ports_with_prefix(template, "") {
        child.ports.push(LayoutPort {
            id: format!("{}.{}", cell.key, slot.attr("s:pid").unwrap_or_default()),
            x: slot.num_attr("s:x"),
            y: slot.num_attr("s:y"),
            ..LayoutPort::default()
        });
    }
    if matches!(cell.cell_type.as_str(), TYPE_INPUT_EXT | TYPE_OUTPUT_EXT) {
        if let Some(anchor) = template.find("text") {
            let chars = cell.key.chars().count() as f64;
            child.labels.push(LayoutLabel {
                id: Some(format!("{}.label", cell.key)),
                text: cell.key.clone(),
                x: anchor.num_attr("x").unwrap_or(0.0) + child.width / 2.0
                    - LABEL_CHAR_WIDTH / 2.0 * chars,
                y: anchor.num_attr("y").unwrap_or(0.0) - 9.0,
                width: LABEL_CHAR_WIDTH * chars,
                height: LABEL_HEIGHT,
                ..LayoutLabel::default()
            });
        }
    }
    Ok(child)
}

/// Port of a generic/split/join child: the first template slot anchors the
/// column, later ports step down by the template's inter-port gap.
fn generic_port(
    cell: &FlatCell,
    port: &FlatPort,
    index: usize,
    slots: &[&crate::tree::Element],
    ttype: &str,
    side: PortSide,
) -> LayoutPort {
    let base_x = slots.first().and_then(|s| s.num_attr("s:x")).unwrap_or(0.0);
    let base_y = slots.first().and_then(|s| s.num_attr("s:y")).unwrap_or(0.0);
    let gap = slots.get(1).and_then(|s| s.num_attr("s:y")).map_or(0.0, |y| y - base_y);
    let mut layout_port = LayoutPort {
        id: format!("{}.{}", cell.key, port.key),
        width: 1.0,
        height: 1.0,
        x: Some(base_x),
        y: Some(base_y + gap * index as f64),
        ..LayoutPort::default()
    };
    let labeled = match side {
        PortSide::Input => matches!(ttype, "generic" | "join"),
        PortSide::Output => matches!(ttype, "generic" | "split"),
    };
    if labeled {
        let width = LABEL_CHAR_WIDTH * port.key.chars().count() as f64;
        layout_port.labels.push(LayoutLabel {
            id: Some(format!("{}.{}.label", cell.key, port.key)),
            text: port.key.clone(),
            x: if side == PortSide::Input { 1.0 } else { -width - 1.0 },
            y: -5.5,
            width,
            height: LABEL_HEIGHT,
            ..LayoutLabel::default()
        });
    }
    layout_port
}
