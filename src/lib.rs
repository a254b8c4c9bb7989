//! Schematic rendering for Yosys-style JSON netlists.
//!
//! Given a netlist and a "skin" of parametric drawing templates, `netdraw`
//! elaborates the netlist into a flat node/wire graph, synthesizes
//! constant drivers and bus splits/joins, hands an orthogonal layout
//! engine a pin-accurate graph (with dummy nodes standing in for
//! hyperedge fan-outs), and reassembles the engine's geometry into the
//! final SVG drawing.
//!
//! The pipeline is strictly sequential:
//!
//! ```text
//! Netlist → flatten → constants → splits/joins → wires
//!         → layout request → [layout engine] → reconcile → draw
//! ```
//!
//! The layout engine itself is external; implement [`LayoutEngine`] to
//! plug one in.

pub mod constants;
pub mod draw;
pub mod error;
pub mod flatten;
pub mod layout;
pub mod netlist;
pub mod nets;
pub mod reconcile;
pub mod skin;
pub mod splitjoin;
pub mod tree;

pub use error::{EngineError, RenderError, Result};
pub use flatten::FlatModule;
pub use layout::{LayoutEngine, LayoutGraph};
pub use netlist::Netlist;
pub use skin::Skin;

use tracing::debug;

/// Render a netlist with the given skin and layout engine, producing the
/// final drawing text.
pub fn render(skin_text: &str, netlist: &Netlist, engine: &dyn LayoutEngine) -> Result<String> {
    let skin = Skin::parse(skin_text)?;
    let props = skin.properties();
    let (name, module) = netlist.top_module()?;
    debug!(module = name, "rendering netlist module");

    let mut flat = flatten::flatten(name, module, &skin)?;
    if props.constants {
        constants::add_constants(&mut flat);
    }
    if props.splits_and_joins {
        splitjoin::add_splits_joins(&mut flat);
    }
    nets::build_wires(&mut flat, &skin, &props)?;

    let request = layout::build_layout_graph(&flat, &skin)?;
    let mut laid_out = engine
        .layout(request.graph, &props.layout_engine)
        .map_err(RenderError::Engine)?;
    reconcile::remove_dummies(&mut laid_out)?;
    draw::draw_module(&laid_out, &flat, &skin, &request.edge_nets)
}
