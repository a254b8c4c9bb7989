//! Skin-template instantiation and final document assembly.
//!
//! Each flat cell is a deep clone of its skin template, retargeted with
//! the cell's own text and translated to its computed position. Routed
//! edges become polyline segments, junction points become dots, and the
//! whole drawing is serialized under the skin's root element.

use indexmap::IndexMap;

use crate::error::Result;
use crate::flatten::{FlatCell, FlatModule, FlatPort, TYPE_CONSTANT, TYPE_JOIN, TYPE_SPLIT};
use crate::layout::{LayoutChild, LayoutEdge, LayoutGraph, Point};
use crate::skin::{self, Skin};
use crate::tree::{self, Element, Node};

pub fn draw_module(
    graph: &LayoutGraph,
    module: &FlatModule,
    skin: &Skin,
    edge_nets: &IndexMap<String, String>,
) -> Result<String> {
    let mut root = Element::new(skin.root.name.clone());
    root.attrs = skin.root.attrs.clone();
    if let Some(width) = graph.width {
        root.set_attr("width", format!("{width}"));
    }
    if let Some(height) = graph.height {
        root.set_attr("height", format!("{height}"));
    }

    let mut style = Element::new("style");
    style.set_text(skin.styles());
    root.children.push(Node::Element(style));

    for cell in &module.nodes {
        let placed = graph.children.iter().find(|child| child.id == cell.key);
        root.children.push(Node::Element(render_cell(cell, placed, skin)?));
    }
    for edge in &graph.edges {
        let net = edge_nets.get(&edge.id).map(String::as_str);
        for el in edge_elements(edge, net) {
            root.children.push(Node::Element(el));
        }
    }
    Ok(tree::serialize(&root))
}

/// Instantiate one cell from its template.
fn render_cell(cell: &FlatCell, placed: Option<&LayoutChild>, skin: &Skin) -> Result<Element> {
    let template = skin.find_template(&cell.cell_type)?;
    let ttype = skin::template_type(template).to_string();
    let mut el = template.clone();

    set_text_attribute(&mut el, "ref", &cell.key);
    set_text_attribute(&mut el, "id", &cell.key);
    if let Some(value) = cell.attributes.get("value") {
        set_text_attribute(&mut el, "name", &attr_text(value));
    }
    if cell.cell_type == TYPE_CONSTANT && cell.key.len() > 1 {
        // multi-bit constants read better in hex
        if let Ok(bits) = u64::from_str_radix(&cell.key, 2) {
            set_text_attribute(&mut el, "ref", &format!("0x{bits:x}"));
        }
    }

    let (x, y) = placed.map_or((0.0, 0.0), |c| (c.x.unwrap_or(0.0), c.y.unwrap_or(0.0)));
    el.set_attr("id", format!("cell_{}", cell.key));
    el.set_attr("transform", format!("translate({x},{y})"));

    let grown = skin::generic_height(template, cell.inputs.len(), cell.outputs.len());
    match cell.cell_type.as_str() {
        TYPE_SPLIT => {
            resize_body(&mut el, grown);
            replicate_ports(&mut el, template, "out", &cell.outputs);
        }
        TYPE_JOIN => {
            resize_body(&mut el, grown);
            replicate_ports(&mut el, template, "in", &cell.inputs);
        }
        _ if ttype == "generic" => {
            resize_body(&mut el, grown);
            replicate_ports(&mut el, template, "in", &cell.inputs);
            replicate_ports(&mut el, template, "out", &cell.outputs);
            set_text_attribute(&mut el, "ref", &cell.cell_type);
        }
        _ => {}
    }

    strip_internal(&mut el);
    Ok(el)
}

/// Rewrite the content of every text element tagged `s:attribute=<attr>`.
fn set_text_attribute(el: &mut Element, attribute: &str, value: &str) {
    el.walk_mut(&mut |node| {
        if node.name == "text" && node.attr("s:attribute") == Some(attribute) {
            node.set_text(value);
        }
    });
}

/// Grow the template's body rectangle to the computed height.
fn resize_body(el: &mut Element, height: f64) {
    el.walk_mut(&mut |node| {
        if node.name == "rect" && node.attr("s:generic") == Some("body") {
            node.set_attr("height", format!("{height}"));
        }
    });
}

/// Drop the template's port slots for `prefix` and instantiate one slot
/// per actual port, stepped down the template's inter-port gap.
fn replicate_ports(el: &mut Element, template: &Element, prefix: &str, ports: &[FlatPort]) {
    let slots = skin::ports_with_prefix(template, prefix);
    let Some(first) = slots.first() else {
        return;
    };
    let base_x = first.num_attr("s:x").unwrap_or(0.0);
    let base_y = first.num_attr("s:y").unwrap_or(0.0);
    let gap = slots.get(1).and_then(|s| s.num_attr("s:y")).map_or(0.0, |y| y - base_y);

    el.children.retain(|child| match child {
        Node::Element(e) => !e.attr("s:pid").is_some_and(|pid| pid.starts_with(prefix)),
        Node::Text(_) => true,
    });
    for (i, port) in ports.iter().enumerate() {
        let mut slot = (*first).clone();
        slot.set_attr("transform", format!("translate({base_x},{})", base_y + gap * i as f64));
        set_first_text(&mut slot, &port.key);
        el.children.push(Node::Element(slot));
    }
}

fn set_first_text(el: &mut Element, value: &str) {
    let mut done = false;
    el.walk_mut(&mut |node| {
        if !done && node.name == "text" {
            node.set_text(value);
            done = true;
        }
    });
}

/// Remove skin-internal metadata from an instantiated template.
fn strip_internal(el: &mut Element) {
    el.attrs.retain(|key, _| !key.starts_with("s:"));
    el.children.retain(|child| match child {
        Node::Element(e) => !e.name.starts_with("s:"),
        Node::Text(_) => true,
    });
    for child in el.children.iter_mut() {
        if let Node::Element(e) = child {
            strip_internal(e);
        }
    }
}

fn attr_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Polyline segments plus junction dots for one routed edge.
fn edge_elements(edge: &LayoutEdge, net: Option<&str>) -> Vec<Element> {
    let num_wires = net.map_or(1, |n| n.matches(',').count().saturating_sub(1));
    let class = net_class(net, num_wires);
    let stroke = if num_wires > 1 { 2 } else { 1 };
    let mut out = Vec::new();
    for section in &edge.sections {
        let mut start = section.start_point;
        for bend in &section.bend_points {
            out.push(line(start, *bend, &class, stroke));
            start = *bend;
        }
        out.push(line(start, section.end_point, &class, stroke));
    }
    for junction in &edge.junction_points {
        out.push(junction_dot(*junction, num_wires, &class));
    }
    out
}

fn net_class(net: Option<&str>, num_wires: usize) -> String {
    match net {
        Some(n) => format!("net_{} width_{num_wires}", n.trim_matches(',').replace(',', "_")),
        None => format!("width_{num_wires}"),
    }
}

fn line(start: Point, end: Point, class: &str, stroke: usize) -> Element {
    let mut el = Element::new("line");
    el.set_attr("x1", format!("{}", start.x));
    el.set_attr("y1", format!("{}", start.y));
    el.set_attr("x2", format!("{}", end.x));
    el.set_attr("y2", format!("{}", end.y));
    el.set_attr("class", class);
    el.set_attr("style", format!("stroke-width: {stroke}"));
    el
}

fn junction_dot(at: Point, num_wires: usize, class: &str) -> Element {
    let mut el = Element::new("circle");
    el.set_attr("cx", format!("{}", at.x));
    el.set_attr("cy", format!("{}", at.y));
    el.set_attr("r", if num_wires > 1 { "3" } else { "2" });
    el.set_attr("class", format!("junction {class}"));
    el
}
