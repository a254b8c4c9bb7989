//! Shared fixtures: a complete test skin and a deterministic stub engine.

use indexmap::IndexMap;
use netdraw::layout::{EdgeSection, LayoutGraph, Point};
use netdraw::{EngineError, LayoutEngine, Netlist, Skin};

pub const TEST_SKIN: &str = r#"
<svg xmlns="http://www.w3.org/2000/svg" xmlns:s="https://example.invalid/netdraw-skin" width="800" height="600">
  <s:properties constants="true" splitsAndJoins="true" genericsLaterals="false" gridSize="5">
    <s:layoutEngine org.eclipse.elk.layered.spacing.nodeNodeBetweenLayers="35"/>
  </s:properties>
  <style>
    svg { stroke: #000; fill: none; }
    .junction { fill: #000; }
  </style>
  <g s:type="not" s:width="30" s:height="20">
    <s:alias val="$_not_"/>
    <s:alias val="$not"/>
    <path d="M0,0 L0,20 L20,10 Z"/>
    <circle cx="24" cy="10" r="3"/>
    <g s:x="0" s:y="10" s:pid="A" s:position="left"/>
    <g s:x="27" s:y="10" s:pid="Y" s:position="right"/>
  </g>
  <g s:type="and" s:width="30" s:height="25">
    <s:alias val="$_and_"/>
    <s:alias val="$and"/>
    <path d="M0,0 L0,25 L15,25 A15 12.5 0 0 0 15,0 Z"/>
    <g s:x="0" s:y="5" s:pid="A" s:position="left"/>
    <g s:x="0" s:y="20" s:pid="B" s:position="left"/>
    <g s:x="30" s:y="12.5" s:pid="Y" s:position="right"/>
  </g>
  <g s:type="dff" s:width="35" s:height="40">
    <s:alias val="$dff"/>
    <rect width="35" height="40"/>
    <path d="M0,35 L5,30 L0,25"/>
    <g s:x="0" s:y="10" s:pid="D" s:position="left"/>
    <g s:x="0" s:y="30" s:pid="CLK" s:position="left"/>
    <g s:x="35" s:y="10" s:pid="Q" s:position="right"/>
  </g>
  <g s:type="inputExt" s:width="30" s:height="20">
    <s:alias val="$_inputExt_"/>
    <text x="15" y="-4" s:attribute="ref">input</text>
    <path d="M0,0 L0,20 L20,20 L30,10 L20,0 Z"/>
    <g s:x="30" s:y="10" s:pid="Y" s:position="right"/>
  </g>
  <g s:type="outputExt" s:width="30" s:height="20">
    <s:alias val="$_outputExt_"/>
    <text x="15" y="-4" s:attribute="ref">output</text>
    <path d="M0,10 L10,0 L30,0 L30,20 L10,20 Z"/>
    <g s:x="0" s:y="10" s:pid="A" s:position="left"/>
  </g>
  <g s:type="constant" s:width="30" s:height="20">
    <s:alias val="$_constant_"/>
    <text x="15" y="14" s:attribute="ref">constant</text>
    <rect s:generic="body" width="30" height="20"/>
    <g s:x="30" s:y="10" s:pid="Y" s:position="right"/>
  </g>
  <g s:type="split" s:width="5" s:height="24">
    <s:alias val="$_split_"/>
    <rect s:generic="body" width="5" height="24"/>
    <g s:x="0" s:y="12" s:pid="in0" s:position="left"/>
    <g s:x="5" s:y="8" s:pid="out0" s:position="right"><text x="7" y="3">o</text></g>
    <g s:x="5" s:y="16" s:pid="out1" s:position="right"><text x="7" y="3">o</text></g>
  </g>
  <g s:type="join" s:width="5" s:height="24">
    <s:alias val="$_join_"/>
    <rect s:generic="body" width="5" height="24"/>
    <g s:x="0" s:y="8" s:pid="in0" s:position="left"><text x="-7" y="3">i</text></g>
    <g s:x="0" s:y="16" s:pid="in1" s:position="left"><text x="-7" y="3">i</text></g>
    <g s:x="5" s:y="12" s:pid="out0" s:position="right"/>
  </g>
  <g s:type="vcc" s:width="20" s:height="15">
    <s:alias val="vcc"/>
    <path d="M0,15 L10,0 L20,15 Z"/>
    <g s:x="10" s:y="15" s:pid="P" s:dir="lateral" s:position="bottom"/>
  </g>
  <g s:type="gnd" s:width="20" s:height="15">
    <s:alias val="gnd"/>
    <path d="M0,0 L20,0 M5,5 L15,5 M8,10 L12,10"/>
    <g s:x="10" s:y="0" s:pid="P" s:dir="lateral" s:position="top"/>
  </g>
  <g s:type="generic" s:width="30" s:height="40">
    <text x="15" y="-4" s:attribute="ref">generic</text>
    <rect s:generic="body" width="30" height="40"/>
    <g s:x="0" s:y="10" s:pid="in0" s:position="left"><text x="3" y="3">i0</text></g>
    <g s:x="0" s:y="25" s:pid="in1" s:position="left"><text x="3" y="3">i1</text></g>
    <g s:x="30" s:y="10" s:pid="out0" s:position="right"><text x="-3" y="3">o0</text></g>
    <g s:x="30" s:y="25" s:pid="out1" s:position="right"><text x="-3" y="3">o1</text></g>
  </g>
</svg>
"#;

/// Deterministic stand-in for the external layout engine: children go on a
/// single row, edges are routed with at most two orthogonal bends.
pub struct GridEngine;

impl LayoutEngine for GridEngine {
    fn layout(
        &self,
        mut graph: LayoutGraph,
        _options: &IndexMap<String, String>,
    ) -> Result<LayoutGraph, EngineError> {
        let mut x = 10.0;
        for child in &mut graph.children {
            child.x = Some(x);
            child.y = Some(10.0);
            x += child.width + 40.0;
        }
        let mut anchors: IndexMap<String, Point> = IndexMap::new();
        for child in &graph.children {
            let cx = child.x.unwrap_or(0.0);
            let cy = child.y.unwrap_or(0.0);
            for port in &child.ports {
                anchors.insert(
                    port.id.clone(),
                    Point { x: cx + port.x.unwrap_or(0.0), y: cy + port.y.unwrap_or(0.0) },
                );
            }
        }
        for edge in &mut graph.edges {
            let start = anchors.get(&edge.source_port).copied().unwrap_or_default();
            let end = anchors.get(&edge.target_port).copied().unwrap_or_default();
            let bend_points = if start.y == end.y {
                Vec::new()
            } else {
                let mid = (start.x + end.x) / 2.0;
                vec![Point { x: mid, y: start.y }, Point { x: mid, y: end.y }]
            };
            edge.sections =
                vec![EdgeSection { start_point: start, end_point: end, bend_points }];
        }
        graph.width = Some(x);
        graph.height = Some(120.0);
        Ok(graph)
    }
}

pub fn parse_netlist(value: serde_json::Value) -> Netlist {
    serde_json::from_value(value).expect("netlist should deserialize")
}

/// Run every pipeline stage up to (but not including) the layout call.
pub fn pre_layout(value: serde_json::Value) -> netdraw::FlatModule {
    let skin = Skin::parse(TEST_SKIN).expect("test skin should parse");
    let props = skin.properties();
    let netlist = parse_netlist(value);
    let (name, module) = netlist.top_module().expect("top module");
    let mut flat = netdraw::flatten::flatten(name, module, &skin).expect("flatten");
    if props.constants {
        netdraw::constants::add_constants(&mut flat);
    }
    if props.splits_and_joins {
        netdraw::splitjoin::add_splits_joins(&mut flat);
    }
    netdraw::nets::build_wires(&mut flat, &skin, &props).expect("wires");
    flat
}

/// Layout request for a fully elaborated module.
pub fn request_for(flat: &netdraw::FlatModule) -> netdraw::layout::LayoutRequest {
    let skin = Skin::parse(TEST_SKIN).expect("test skin should parse");
    netdraw::layout::build_layout_graph(flat, &skin).expect("layout request")
}
