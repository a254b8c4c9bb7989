//! Skin template library: option parsing, template lookup, port
//! classification, and geometry constants.
//!
//! A skin is a drawing tree whose elements carry `s:`-namespaced metadata:
//! `s:type` classifies a template, `s:alias` children bind it to cell type
//! names, and `s:pid`/`s:x`/`s:y`/`s:dir`/`s:position` describe its port
//! slots. The `s:properties` element carries the behavioral options.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::tree::{self, Element};

/// Coerced value of a skin property attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    fn coerce(raw: &str) -> PropertyValue {
        match raw {
            "true" => PropertyValue::Bool(true),
            "false" => PropertyValue::Bool(false),
            _ => raw
                .parse::<f64>()
                .map(PropertyValue::Number)
                .unwrap_or_else(|_| PropertyValue::Text(raw.to_string())),
        }
    }
}

/// Behavioral options read from the skin's `s:properties` element.
#[derive(Debug, Clone)]
pub struct SkinProperties {
    /// Synthesize constant-driver cells (on unless explicitly `false`).
    pub constants: bool,
    /// Synthesize bus splits and joins (on unless explicitly `false`).
    pub splits_and_joins: bool,
    /// Treat every port of a `generic` template as lateral.
    pub generics_laterals: bool,
    /// Option bag forwarded verbatim to the layout engine.
    pub layout_engine: IndexMap<String, String>,
    /// Every property attribute, coerced.
    pub values: IndexMap<String, PropertyValue>,
}

impl Default for SkinProperties {
    fn default() -> Self {
        SkinProperties {
            constants: true,
            splits_and_joins: true,
            generics_laterals: false,
            layout_engine: IndexMap::new(),
            values: IndexMap::new(),
        }
    }
}

/// A parsed skin document.
#[derive(Debug, Clone)]
pub struct Skin {
    pub root: Element,
}

impl Skin {
    pub fn parse(text: &str) -> Result<Skin> {
        let root = tree::parse(text)?;
        Ok(Skin { root })
    }

    pub fn properties(&self) -> SkinProperties {
        let mut props = SkinProperties::default();
        let Some(el) = self.root.find("s:properties") else {
            return props;
        };
        for (key, raw) in &el.attrs {
            let value = PropertyValue::coerce(raw);
            match (key.as_str(), &value) {
                ("constants", PropertyValue::Bool(b)) => props.constants = *b,
                ("splitsAndJoins", PropertyValue::Bool(b)) => props.splits_and_joins = *b,
                ("genericsLaterals", PropertyValue::Bool(b)) => props.generics_laterals = *b,
                _ => {}
            }
            props.values.insert(key.clone(), value);
        }
        if let Some(engine) = el.find("s:layoutEngine") {
            for (key, value) in &engine.attrs {
                props.layout_engine.insert(key.clone(), value.clone());
            }
        }
        debug!(
            constants = props.constants,
            splits_and_joins = props.splits_and_joins,
            generics_laterals = props.generics_laterals,
            "read skin properties"
        );
        props
    }

    /// Find the template for a cell type, falling back to the first
    /// `generic` template for unknown types.
    pub fn find_template(&self, cell_type: &str) -> Result<&Element> {
        if let Some(template) = find_aliased(&self.root, cell_type) {
            return Ok(template);
        }
        first_generic(&self.root).ok_or(RenderError::NoGenericTemplate)
    }

    /// Concatenated content of every `style` element.
    pub fn styles(&self) -> String {
        let mut css = String::new();
        collect_styles(&self.root, &mut css);
        css
    }
}

fn find_aliased<'a>(el: &'a Element, cell_type: &str) -> Option<&'a Element> {
    if el
        .elements()
        .any(|child| child.name == "s:alias" && child.attr("val") == Some(cell_type))
    {
        return Some(el);
    }
    el.elements().find_map(|child| find_aliased(child, cell_type))
}

fn first_generic(el: &Element) -> Option<&Element> {
    for child in el.elements() {
        if child.attr("s:type") == Some("generic") {
            return Some(child);
        }
        if let Some(found) = first_generic(child) {
            return Some(found);
        }
    }
    None
}

fn collect_styles(el: &Element, css: &mut String) {
    if el.name == "style" {
        css.push_str(&el.text());
    }
    for child in el.elements() {
        collect_styles(child, css);
    }
}

/// The template's `s:type` class, or empty for untyped elements.
pub fn template_type(template: &Element) -> &str {
    template.attr("s:type").unwrap_or("")
}

/// Template port slots whose pid starts with `prefix`.
pub fn ports_with_prefix<'a>(template: &'a Element, prefix: &str) -> Vec<&'a Element> {
    template
        .elements()
        .filter(|el| el.attr("s:pid").is_some_and(|pid| pid.starts_with(prefix)))
        .collect()
}

/// Pids the template marks as lateral pins.
pub fn lateral_pids(template: &Element) -> Vec<&str> {
    template
        .elements()
        .filter(|el| el.attr("s:dir") == Some("lateral"))
        .filter_map(|el| el.attr("s:pid"))
        .collect()
}

/// Pids on the input side of the template (position `left` or `top`).
pub fn template_input_pids(template: &Element) -> Vec<&str> {
    pids_at(template, &["left", "top"])
}

/// Pids on the output side of the template (position `right` or `bottom`).
pub fn template_output_pids(template: &Element) -> Vec<&str> {
    pids_at(template, &["right", "bottom"])
}

fn pids_at<'a>(template: &'a Element, positions: &[&str]) -> Vec<&'a str> {
    template
        .elements()
        .filter(|el| el.attr("s:position").is_some_and(|p| positions.contains(&p)))
        .filter_map(|el| el.attr("s:pid"))
        .collect()
}

/// Vertical distance between the first two port slots with this prefix.
pub fn inter_port_gap(template: &Element, prefix: &str) -> Option<f64> {
    let slots = ports_with_prefix(template, prefix);
    let first = slots.first()?.num_attr("s:y")?;
    let second = slots.get(1)?.num_attr("s:y")?;
    Some(second - first)
}

/// Body height for generic/split/join cells: the nominal template height,
/// grown by the inter-port gap once the larger port count exceeds two.
pub fn generic_height(template: &Element, inputs: usize, outputs: usize) -> f64 {
    let nominal = template.num_attr("s:height").unwrap_or(0.0);
    let (count, prefix) = if inputs >= outputs { (inputs, "in") } else { (outputs, "out") };
    if count > 2 {
        if let Some(gap) = inter_port_gap(template, prefix) {
            return nominal + gap * (count as f64 - 2.0);
        }
    }
    nominal
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIN: &str = r#"
        <svg xmlns:s="https://example.invalid/skin" width="80" height="80">
          <s:properties constants="false" genericsLaterals="true" gridSize="5" title="demo">
            <s:layoutEngine spacing="35"/>
          </s:properties>
          <style>.x { fill: none; }</style>
          <g s:type="and" s:width="30" s:height="25">
            <s:alias val="$_and_"/>
            <g s:x="0" s:y="5" s:pid="A" s:position="left"/>
            <g s:x="0" s:y="20" s:pid="B" s:position="left"/>
            <g s:x="30" s:y="12.5" s:pid="Y" s:position="right"/>
          </g>
          <g s:type="generic" s:width="30" s:height="40">
            <g s:x="0" s:y="10" s:pid="in0" s:position="left"/>
            <g s:x="0" s:y="25" s:pid="in1" s:position="left"/>
            <g s:x="30" s:y="10" s:pid="out0" s:position="right"/>
            <g s:x="30" s:y="25" s:pid="out1" s:position="right"/>
          </g>
        </svg>"#;

    fn skin() -> Skin {
        Skin::parse(SKIN).expect("test skin should parse")
    }

    #[test]
    fn test_property_coercion() {
        let props = skin().properties();
        assert!(!props.constants);
        assert!(props.splits_and_joins);
        assert!(props.generics_laterals);
        assert_eq!(props.values.get("gridSize"), Some(&PropertyValue::Number(5.0)));
        assert_eq!(
            props.values.get("title"),
            Some(&PropertyValue::Text("demo".to_string()))
        );
        assert_eq!(props.layout_engine.get("spacing").map(String::as_str), Some("35"));
    }

    #[test]
    fn test_alias_lookup_and_generic_fallback() {
        let skin = skin();
        let and = skin.find_template("$_and_").expect("alias should resolve");
        assert_eq!(template_type(and), "and");
        let unknown = skin.find_template("$no_such_type_").expect("fallback");
        assert_eq!(template_type(unknown), "generic");
    }

    #[test]
    fn test_port_classification() {
        let skin = skin();
        let and = skin.find_template("$_and_").unwrap();
        assert_eq!(template_input_pids(and), vec!["A", "B"]);
        assert_eq!(template_output_pids(and), vec!["Y"]);
        assert_eq!(ports_with_prefix(and, "").len(), 3);
    }

    #[test]
    fn test_generic_height_grows_with_ports() {
        let skin = skin();
        let generic = skin.find_template("generic-fallback").unwrap();
        assert_eq!(generic_height(generic, 2, 2), 40.0);
        assert_eq!(generic_height(generic, 4, 1), 70.0);
        assert_eq!(generic_height(generic, 1, 3), 55.0);
    }

    #[test]
    fn test_missing_generic_template_is_fatal() {
        let skin = Skin::parse("<svg><g s:type=\"and\"/></svg>").unwrap();
        assert!(skin.find_template("$_other_").is_err());
    }
}
