//! Flat node graph and hierarchical-netlist elaboration.
//!
//! The flat module is an arena: cells own their ports, and everything else
//! refers to ports through [`PortRef`] handles (cell index, side, port
//! index) instead of pointers.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::Result;
use crate::netlist::{vector_key, Module, PortDirection, Signal};
use crate::skin::{self, Skin};

/// Synthesized terminal cell for a module-level input port.
pub const TYPE_INPUT_EXT: &str = "$_inputExt_";
/// Synthesized terminal cell for a module-level output port.
pub const TYPE_OUTPUT_EXT: &str = "$_outputExt_";
/// Synthesized constant-driver cell.
pub const TYPE_CONSTANT: &str = "$_constant_";
/// Synthesized bus-split cell.
pub const TYPE_SPLIT: &str = "$_split_";
/// Synthesized bus-join cell.
pub const TYPE_JOIN: &str = "$_join_";
/// Cell type exempt from the forward-priority layout hint.
pub const TYPE_DFF: &str = "$dff";

/// A port of a flattened cell.
#[derive(Debug, Clone)]
pub struct FlatPort {
    pub key: String,
    pub value: Vec<Signal>,
    /// Index of the owning wire, filled in by net reconstruction.
    pub wire: Option<usize>,
}

impl FlatPort {
    pub fn new(key: impl Into<String>, value: Vec<Signal>) -> Self {
        FlatPort { key: key.into(), value, wire: None }
    }

    /// Canonical comma-delimited form of the port's signal vector.
    pub fn net_key(&self) -> String {
        vector_key(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    Input,
    Output,
}

/// Arena handle to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRef {
    pub cell: usize,
    pub side: PortSide,
    pub port: usize,
}

/// A cell of the flat module.
#[derive(Debug, Clone)]
pub struct FlatCell {
    pub key: String,
    pub cell_type: String,
    pub inputs: Vec<FlatPort>,
    pub outputs: Vec<FlatPort>,
    pub attributes: IndexMap<String, serde_json::Value>,
}

impl FlatCell {
    pub fn new(key: impl Into<String>, cell_type: impl Into<String>) -> Self {
        FlatCell {
            key: key.into(),
            cell_type: cell_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: IndexMap::new(),
        }
    }
}

/// All ports on one bit-vector net, partitioned by electrical role.
#[derive(Debug, Clone, Default)]
pub struct Wire {
    pub net: String,
    pub drivers: Vec<PortRef>,
    pub riders: Vec<PortRef>,
    pub laterals: Vec<PortRef>,
}

impl Wire {
    /// Every member port, drivers first.
    pub fn members(&self) -> impl Iterator<Item = PortRef> + '_ {
        self.drivers.iter().chain(&self.riders).chain(&self.laterals).copied()
    }
}

/// Flattened module: a node arena plus reconstructed wires.
#[derive(Debug, Clone)]
pub struct FlatModule {
    pub name: String,
    pub nodes: Vec<FlatCell>,
    pub wires: Vec<Wire>,
}

impl FlatModule {
    pub fn port(&self, r: PortRef) -> &FlatPort {
        let cell = &self.nodes[r.cell];
        match r.side {
            PortSide::Input => &cell.inputs[r.port],
            PortSide::Output => &cell.outputs[r.port],
        }
    }

    pub fn port_mut(&mut self, r: PortRef) -> &mut FlatPort {
        let cell = &mut self.nodes[r.cell];
        match r.side {
            PortSide::Input => &mut cell.inputs[r.port],
            PortSide::Output => &mut cell.outputs[r.port],
        }
    }
}

/// Elaborate one netlist module into a flat node graph. Wires are not
/// reconstructed here; synthesis passes run on the node arena first.
pub fn flatten(name: &str, module: &Module, skin: &Skin) -> Result<FlatModule> {
    let mut nodes = Vec::new();
    for (port_name, decl) in &module.ports {
        let cell = match decl.direction {
            PortDirection::Input => {
                let mut c = FlatCell::new(port_name, TYPE_INPUT_EXT);
                c.outputs.push(FlatPort::new("Y", decl.bits.clone()));
                c
            }
            PortDirection::Output => {
                let mut c = FlatCell::new(port_name, TYPE_OUTPUT_EXT);
                c.inputs.push(FlatPort::new("A", decl.bits.clone()));
                c
            }
        };
        nodes.push(cell);
    }
    for (cell_name, decl) in &module.cells {
        let template = skin.find_template(&decl.cell_type)?;
        let input_pids = skin::template_input_pids(template);
        let output_pids = skin::template_output_pids(template);
        let mut cell = FlatCell::new(cell_name, &decl.cell_type);
        cell.attributes = decl.attributes.clone();
        for (port_key, bits) in &decl.connections {
            let side = match decl.port_directions.get(port_key) {
                Some(PortDirection::Input) => PortSide::Input,
                Some(PortDirection::Output) => PortSide::Output,
                None if output_pids.contains(&port_key.as_str()) => PortSide::Output,
                None if input_pids.contains(&port_key.as_str()) => PortSide::Input,
                // unlisted pins ride the input side
                None => PortSide::Input,
            };
            let port = FlatPort::new(port_key, bits.clone());
            match side {
                PortSide::Input => cell.inputs.push(port),
                PortSide::Output => cell.outputs.push(port),
            }
        }
        nodes.push(cell);
    }
    debug!(module = name, nodes = nodes.len(), "flattened netlist module");
    Ok(FlatModule { name: name.to_string(), nodes, wires: Vec::new() })
}
