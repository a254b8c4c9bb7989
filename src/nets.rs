//! Net reconstruction: group ports into wires by canonical signal vector.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::Result;
use crate::flatten::{FlatModule, PortRef, PortSide, Wire};
use crate::skin::{self, Skin, SkinProperties};

/// Partition every port onto a wire record. A port is a *driver* if it is
/// a non-lateral output, a *rider* if a non-lateral input, and a *lateral*
/// if its template pin says so (or for any `generic` port under the
/// `genericsLaterals` option).
pub fn build_wires(module: &mut FlatModule, skin: &Skin, props: &SkinProperties) -> Result<()> {
    let mut drivers_by: IndexMap<String, Vec<PortRef>> = IndexMap::new();
    let mut riders_by: IndexMap<String, Vec<PortRef>> = IndexMap::new();
    let mut laterals_by: IndexMap<String, Vec<PortRef>> = IndexMap::new();

    for (cell_index, cell) in module.nodes.iter().enumerate() {
        let template = skin.find_template(&cell.cell_type)?;
        let lateral_pids = skin::lateral_pids(template);
        let all_lateral = skin::template_type(template) == "generic" && props.generics_laterals;
        for (port_index, port) in cell.inputs.iter().enumerate() {
            let r = PortRef { cell: cell_index, side: PortSide::Input, port: port_index };
            if all_lateral || lateral_pids.contains(&port.key.as_str()) {
                laterals_by.entry(port.net_key()).or_default().push(r);
            } else {
                riders_by.entry(port.net_key()).or_default().push(r);
            }
        }
        for (port_index, port) in cell.outputs.iter().enumerate() {
            let r = PortRef { cell: cell_index, side: PortSide::Output, port: port_index };
            if all_lateral || lateral_pids.contains(&port.key.as_str()) {
                laterals_by.entry(port.net_key()).or_default().push(r);
            } else {
                drivers_by.entry(port.net_key()).or_default().push(r);
            }
        }
    }

    let mut nets: IndexSet<String> = IndexSet::new();
    for key in drivers_by.keys().chain(riders_by.keys()).chain(laterals_by.keys()) {
        nets.insert(key.clone());
    }

    module.wires.clear();
    for net in nets {
        let wire = Wire {
            drivers: drivers_by.swap_remove(&net).unwrap_or_default(),
            riders: riders_by.swap_remove(&net).unwrap_or_default(),
            laterals: laterals_by.swap_remove(&net).unwrap_or_default(),
            net,
        };
        let members: Vec<PortRef> = wire.members().collect();
        let wire_index = module.wires.len();
        for member in members {
            module.port_mut(member).wire = Some(wire_index);
        }
        module.wires.push(wire);
    }
    debug!(module = module.name.as_str(), wires = module.wires.len(), "reconstructed nets");
    Ok(())
}
