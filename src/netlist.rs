//! Typed model of the Yosys-style JSON netlist input.
//!
//! Maps are insertion-ordered because the input's declaration order is
//! semantic: the first module is the fallback render target and synthesized
//! cells are appended deterministically.

use std::fmt;
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{RenderError, Result};

/// One bit of a port connection: a module-unique net identifier or a
/// constant literal. After constant synthesis every signal is a `Net`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Net(u64),
    Zero,
    One,
}

impl Signal {
    /// The literal digit for constant bits.
    pub fn literal_char(&self) -> Option<char> {
        match self {
            Signal::Zero => Some('0'),
            Signal::One => Some('1'),
            Signal::Net(_) => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Net(n) => write!(f, "{n}"),
            Signal::Zero => f.write_str("0"),
            Signal::One => f.write_str("1"),
        }
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Net(u64),
            Literal(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Net(n) => Ok(Signal::Net(n)),
            Raw::Literal(s) => match s.as_str() {
                "0" => Ok(Signal::Zero),
                "1" => Ok(Signal::One),
                other => Err(serde::de::Error::custom(format!(
                    "unsupported signal literal {other:?}"
                ))),
            },
        }
    }
}

/// Canonical `","+csv+","` form of a signal vector. Used both as a net
/// grouping key and as the substring substrate of the split/join search.
pub fn vector_key(signals: &[Signal]) -> String {
    let mut out = String::from(",");
    for (i, sig) in signals.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{sig}");
    }
    out.push(',');
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// An external port of a module.
#[derive(Debug, Clone, Deserialize)]
pub struct PortDecl {
    pub direction: PortDirection,
    pub bits: Vec<Signal>,
}

/// A cell instance inside a module.
#[derive(Debug, Clone, Deserialize)]
pub struct CellDecl {
    #[serde(rename = "type")]
    pub cell_type: String,
    /// Explicit directions; when absent they are inferred from the skin
    /// template's port positions.
    #[serde(default)]
    pub port_directions: IndexMap<String, PortDirection>,
    #[serde(default)]
    pub connections: IndexMap<String, Vec<Signal>>,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub ports: IndexMap<String, PortDecl>,
    #[serde(default)]
    pub cells: IndexMap<String, CellDecl>,
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
}

/// A whole netlist document.
#[derive(Debug, Clone, Deserialize)]
pub struct Netlist {
    #[serde(default)]
    pub modules: IndexMap<String, Module>,
}

impl Netlist {
    /// The module to render: the one whose `attributes.top` coerces to 1,
    /// else the first by insertion order.
    pub fn top_module(&self) -> Result<(&str, &Module)> {
        for (name, module) in &self.modules {
            if module.attributes.get("top").is_some_and(attr_is_one) {
                return Ok((name.as_str(), module));
            }
        }
        self.modules
            .first()
            .map(|(name, module)| (name.as_str(), module))
            .ok_or(RenderError::EmptyNetlist)
    }
}

fn attr_is_one(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Number(n) => n.as_f64() == Some(1.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map_or(false, |v| v == 1.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_signals_and_literals() {
        let netlist: Netlist = serde_json::from_value(json!({
            "modules": {
                "m": {
                    "cells": {
                        "u0": {
                            "type": "$_and_",
                            "connections": { "A": [2, "0", "1"], "Y": [3] }
                        }
                    }
                }
            }
        }))
        .expect("netlist should deserialize");
        let cell = &netlist.modules["m"].cells["u0"];
        assert_eq!(
            cell.connections["A"],
            vec![Signal::Net(2), Signal::Zero, Signal::One]
        );
    }

    #[test]
    fn test_top_module_attribute_wins() {
        let netlist: Netlist = serde_json::from_value(json!({
            "modules": {
                "helper": {},
                "main": { "attributes": { "top": 1 } }
            }
        }))
        .expect("netlist should deserialize");
        assert_eq!(netlist.top_module().unwrap().0, "main");
    }

    #[test]
    fn test_top_module_falls_back_to_first() {
        let netlist: Netlist = serde_json::from_value(json!({
            "modules": { "a": {}, "b": {} }
        }))
        .expect("netlist should deserialize");
        assert_eq!(netlist.top_module().unwrap().0, "a");
    }

    #[test]
    fn test_top_attribute_string_coercion() {
        let netlist: Netlist = serde_json::from_value(json!({
            "modules": {
                "a": {},
                "b": { "attributes": { "top": "00000000000000000000000000000001" } }
            }
        }))
        .expect("netlist should deserialize");
        assert_eq!(netlist.top_module().unwrap().0, "b");
    }

    #[test]
    fn test_empty_netlist_is_an_error() {
        let netlist: Netlist = serde_json::from_value(json!({ "modules": {} })).unwrap();
        assert!(matches!(netlist.top_module(), Err(RenderError::EmptyNetlist)));
    }

    #[test]
    fn test_vector_key_form() {
        assert_eq!(vector_key(&[Signal::Net(3), Signal::Zero]), ",3,0,");
        assert_eq!(vector_key(&[]), ",,");
    }
}
