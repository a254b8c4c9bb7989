//! Constant-driver synthesis.
//!
//! Literal `0`/`1` bits inside input-port vectors are replaced by fresh
//! net identifiers driven by synthesized `$_constant_` cells. Runs of
//! consecutive literals form one driver; identical literal patterns (keyed
//! by the reversed literal string) share a single driver cell.

use indexmap::IndexMap;
use tracing::debug;

use crate::flatten::{FlatCell, FlatModule, FlatPort, TYPE_CONSTANT};
use crate::netlist::Signal;

pub fn add_constants(module: &mut FlatModule) {
    let max = module
        .nodes
        .iter()
        .flat_map(|node| node.outputs.iter())
        .flat_map(|port| port.value.iter())
        .filter_map(|sig| match sig {
            Signal::Net(n) => Some(*n),
            _ => None,
        })
        .max();
    let mut next = max.map_or(0, |m| m + 1);

    let mut runs_by_name: IndexMap<String, Vec<Signal>> = IndexMap::new();
    let mut synthesized: Vec<FlatCell> = Vec::new();
    for cell in &mut module.nodes {
        for port in &mut cell.inputs {
            let mut run_name = String::new();
            let mut run: Vec<Signal> = Vec::new();
            for i in 0..=port.value.len() {
                let literal = port.value.get(i).and_then(|sig| sig.literal_char());
                if let Some(digit) = literal {
                    let fresh = Signal::Net(next);
                    next += 1;
                    run_name.push(digit);
                    port.value[i] = fresh;
                    run.push(fresh);
                } else if !run.is_empty() {
                    assign_run(&mut port.value, i, &run_name, &run, &mut runs_by_name, &mut synthesized);
                    run_name.clear();
                    run.clear();
                }
            }
        }
    }
    if !synthesized.is_empty() {
        debug!(cells = synthesized.len(), "synthesized constant drivers");
    }
    module.nodes.extend(synthesized);
}

/// Close out a literal run ending (exclusively) at `end`. The run's name is
/// the reversed literal string, so identical patterns coalesce onto one
/// driver and the port slots are rewritten to its signals.
fn assign_run(
    value: &mut [Signal],
    end: usize,
    run_name: &str,
    run: &[Signal],
    runs_by_name: &mut IndexMap<String, Vec<Signal>>,
    synthesized: &mut Vec<FlatCell>,
) {
    let name: String = run_name.chars().rev().collect();
    if let Some(existing) = runs_by_name.get(&name) {
        value[end - existing.len()..end].copy_from_slice(existing);
    } else {
        let mut cell = FlatCell::new(&name, TYPE_CONSTANT);
        cell.outputs.push(FlatPort::new("Y", run.to_vec()));
        runs_by_name.insert(name, run.to_vec());
        synthesized.push(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer(key: &str, bits: Vec<Signal>) -> FlatCell {
        let mut cell = FlatCell::new(key, "$_and_");
        cell.inputs.push(FlatPort::new("A", bits));
        cell
    }

    fn module_of(nodes: Vec<FlatCell>) -> FlatModule {
        FlatModule { name: "t".to_string(), nodes, wires: Vec::new() }
    }

    #[test]
    fn test_literals_replaced_with_fresh_nets() {
        let mut driver = FlatCell::new("d", "$_not_");
        driver.outputs.push(FlatPort::new("Y", vec![Signal::Net(7)]));
        let mut module = module_of(vec![
            driver,
            consumer("u0", vec![Signal::Zero, Signal::One, Signal::Net(7)]),
        ]);
        add_constants(&mut module);

        let u0 = &module.nodes[1];
        assert_eq!(u0.inputs[0].value, vec![Signal::Net(8), Signal::Net(9), Signal::Net(7)]);
        let constant = &module.nodes[2];
        assert_eq!(constant.cell_type, TYPE_CONSTANT);
        assert_eq!(constant.key, "10");
        assert_eq!(constant.outputs[0].value, vec![Signal::Net(8), Signal::Net(9)]);
    }

    #[test]
    fn test_identical_patterns_share_a_driver() {
        let mut module = module_of(vec![
            consumer("u0", vec![Signal::Zero, Signal::Zero, Signal::One]),
            consumer("u1", vec![Signal::Zero, Signal::Zero, Signal::One]),
        ]);
        add_constants(&mut module);

        let constants: Vec<&FlatCell> =
            module.nodes.iter().filter(|n| n.cell_type == TYPE_CONSTANT).collect();
        assert_eq!(constants.len(), 1);
        assert_eq!(constants[0].key, "100");
        assert_eq!(module.nodes[0].inputs[0].value, constants[0].outputs[0].value);
        assert_eq!(module.nodes[1].inputs[0].value, constants[0].outputs[0].value);
    }

    #[test]
    fn test_no_literals_survive() {
        let mut module = module_of(vec![consumer(
            "u0",
            vec![Signal::One, Signal::Net(3), Signal::Zero, Signal::Zero],
        )]);
        add_constants(&mut module);
        for node in &module.nodes {
            for port in node.inputs.iter().chain(&node.outputs) {
                assert!(port.value.iter().all(|sig| matches!(sig, Signal::Net(_))));
            }
        }
        // two runs, split by the non-literal bit
        let keys: Vec<&str> = module
            .nodes
            .iter()
            .filter(|n| n.cell_type == TYPE_CONSTANT)
            .map(|n| n.key.as_str())
            .collect();
        assert_eq!(keys, vec!["1", "00"]);
    }

    #[test]
    fn test_rerun_is_a_fixed_point() {
        let mut module = module_of(vec![consumer("u0", vec![Signal::Zero, Signal::One])]);
        add_constants(&mut module);
        let nodes_after_first = module.nodes.len();
        add_constants(&mut module);
        assert_eq!(module.nodes.len(), nodes_after_first);
    }
}
