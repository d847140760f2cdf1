//! Virtual node model produced by compiled stencil templates.
//!
//! The renderer that diffs and patches these trees lives elsewhere; this
//! crate only describes the output and the setters generated code uses to
//! fill it in.

use std::collections::BTreeMap;

use serde_json::Value;

pub mod data;
pub mod directive;
pub mod style;

pub use data::Data;
pub use directive::{Binding, Directive, DirectiveKind, Getter};

/// Shared setters of [`Element`] and [`Component`].
pub trait Target {
    fn set_key(&mut self, key: String);
    fn set_ref(&mut self, name: String);
    fn add_directive(&mut self, directive: Directive);
    fn set_binding(&mut self, name: &str, keypath: &str);
}

/// Slot name used for component children that don't name a slot.
pub const DEFAULT_SLOT: &str = "children";

#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Text(String),
    Comment(String),
    Element(Element),
    Component(Component),
    Fragment(Vec<VNode>),
    Portal { to: String, children: Vec<VNode> },
    Slot { name: String, children: Vec<VNode> },
}

/// Native attributes, keyed by `name` or `ns:name`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attrs {
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub is_svg: bool,
    pub is_style: bool,
    pub is_option: bool,
    pub key: Option<String>,
    pub ref_name: Option<String>,
    pub attrs: Attrs,
    /// DOM properties, already coerced to their hinted type.
    pub props: BTreeMap<String, Value>,
    pub style: BTreeMap<String, String>,
    pub directives: Vec<Directive>,
    /// Attribute name -> keypath it was read from.
    pub bindings: BTreeMap<String, String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub children: Vec<VNode>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn set_attribute(&mut self, name: &str, ns: Option<&str>, value: impl Into<String>) {
        let key = match ns {
            Some(ns) => format!("{ns}:{name}"),
            None => name.to_string(),
        };
        self.attrs.attrs.insert(key, value.into());
    }

    pub fn set_property(&mut self, name: &str, value: Value) {
        self.props.insert(name.to_string(), value);
    }

    pub fn set_style(&mut self, style: BTreeMap<String, String>) {
        self.style.extend(style);
    }
}

impl Target for Element {
    fn set_key(&mut self, key: String) {
        self.key = Some(key);
    }
    fn set_ref(&mut self, name: String) {
        self.ref_name = Some(name);
    }
    fn add_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }
    fn set_binding(&mut self, name: &str, keypath: &str) {
        self.bindings.insert(name.to_string(), keypath.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Component {
    pub tag: String,
    pub key: Option<String>,
    pub ref_name: Option<String>,
    pub props: BTreeMap<String, Value>,
    pub directives: Vec<Directive>,
    pub bindings: BTreeMap<String, String>,
    pub slots: BTreeMap<String, Vec<VNode>>,
}

impl Component {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn set_prop(&mut self, name: &str, value: Value) {
        self.props.insert(name.to_string(), value);
    }

    /// Spreads every entry of an object into the props.
    pub fn spread(&mut self, object: &serde_json::Map<String, Value>) {
        for (k, v) in object {
            self.props.insert(k.clone(), v.clone());
        }
    }

    pub fn add_slot(&mut self, name: &str, nodes: Vec<VNode>) {
        self.slots.entry(name.to_string()).or_default().extend(nodes);
    }
}

impl Target for Component {
    fn set_key(&mut self, key: String) {
        self.key = Some(key);
    }
    fn set_ref(&mut self, name: String) {
        self.ref_name = Some(name);
    }
    fn add_directive(&mut self, directive: Directive) {
        self.directives.push(directive);
    }
    fn set_binding(&mut self, name: &str, keypath: &str) {
        self.bindings.insert(name.to_string(), keypath.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_attribute_keys() {
        let mut el = Element::new("use");
        el.set_attribute("href", Some("xlink"), "#icon");
        assert_eq!(el.attrs.attrs.get("xlink:href").map(String::as_str), Some("#icon"));
    }
}
