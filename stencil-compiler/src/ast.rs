//! Template AST.
//!
//! Branch nodes own their `children` as `Option<Vec<Node>>`: `None` once a
//! node has been reduced to nothing (or never had content), so an emptied
//! branch is distinguishable from one that was never closed.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use stencil_expr::Node as Expr;

use crate::platform::Hint;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Node {
    Element(Element),
    Attribute(Attribute),
    Property(Property),
    Style(Style),
    Directive(Directive),
    Text(Text),
    Expression(Expression),
    If(Branch),
    ElseIf(Branch),
    Else(Branch),
    Each(Each),
    Import(Import),
    Partial(Partial),
    Spread(Spread),
}

/// Discriminant of [`Node`], used when searching the open-node stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Element,
    Attribute,
    Property,
    Style,
    Directive,
    Text,
    Expression,
    If,
    ElseIf,
    Else,
    Each,
    Import,
    Partial,
    Spread,
}

/// Element content lifted out of a single child.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Element {
    /// Tag name; `$name` reads the component name from data at render time.
    pub tag: String,
    pub is_component: bool,
    pub is_svg: bool,
    pub is_style: bool,
    pub is_option: bool,
    pub attrs: Option<Vec<Node>>,
    pub children: Option<Vec<Node>>,
    pub key: Option<Attribute>,
    #[serde(rename = "ref")]
    pub ref_name: Option<Attribute>,
    /// Slot this element fills when it is a component child.
    pub slot: Option<Attribute>,
    /// Portal target.
    pub to: Option<Attribute>,
    /// Name of a `<slot>`.
    pub name: Option<Attribute>,
    pub text: Option<Content>,
    pub html: Option<Content>,
    pub is_static: bool,
}

/// Value alternation shared by attributes, properties and styles: a
/// literal, a single expression, or a mixed sequence joined at render time.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Attribute {
    pub name: String,
    pub ns: Option<String>,
    pub value: Option<Value>,
    pub expr: Option<Expr>,
    pub children: Option<Vec<Node>>,
    /// Keypath of a plain identifier value, watched instead of re-evaluated.
    pub binding: Option<String>,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub hint: Hint,
    pub value: Option<Value>,
    pub expr: Option<Expr>,
    pub children: Option<Vec<Node>>,
    pub binding: Option<String>,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Style {
    pub value: Option<String>,
    /// Declarations of a fully static style string.
    pub parsed: Option<BTreeMap<String, String>>,
    pub expr: Option<Expr>,
    pub children: Option<Vec<Node>>,
    pub is_static: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Event,
    Lazy,
    Model,
    Transition,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Directive {
    pub ns: Namespace,
    pub name: String,
    pub modifier: Option<String>,
    pub value: Option<Value>,
    pub expr: Option<Expr>,
    pub children: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub expr: Expr,
    /// Source text between the delimiters.
    pub raw: String,
    /// `false` for `{{{ }}}`.
    pub safe: bool,
}

/// One link of an if/else-if/else chain. `expr` is absent on `Else`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Branch {
    pub expr: Option<Expr>,
    pub children: Option<Vec<Node>>,
    pub next: Option<Box<Node>>,
    /// Render a placeholder comment when no branch produces output.
    pub stump: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Each {
    pub from: Expr,
    /// Set for numeric ranges.
    pub to: Option<Expr>,
    /// Inclusive upper bound (`=>`).
    pub equal: bool,
    pub index: Option<String>,
    pub children: Option<Vec<Node>>,
    /// `Else` rendered when nothing was iterated.
    pub next: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Import {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partial {
    pub name: String,
    pub children: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spread {
    pub expr: Expr,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(Text { text: text.into() })
    }

    pub fn kind(&self) -> Kind {
        match self {
            Node::Element(_) => Kind::Element,
            Node::Attribute(_) => Kind::Attribute,
            Node::Property(_) => Kind::Property,
            Node::Style(_) => Kind::Style,
            Node::Directive(_) => Kind::Directive,
            Node::Text(_) => Kind::Text,
            Node::Expression(_) => Kind::Expression,
            Node::If(_) => Kind::If,
            Node::ElseIf(_) => Kind::ElseIf,
            Node::Else(_) => Kind::Else,
            Node::Each(_) => Kind::Each,
            Node::Import(_) => Kind::Import,
            Node::Partial(_) => Kind::Partial,
            Node::Spread(_) => Kind::Spread,
        }
    }

    /// Leaves never go on the open-node stack.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Node::Text(_) | Node::Expression(_) | Node::Import(_) | Node::Spread(_)
        )
    }

    /// Structural nodes that produce no output slot of their own.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            Node::If(_) | Node::ElseIf(_) | Node::Else(_) | Node::Each(_) | Node::Partial(_)
        )
    }

    /// Whether the subtree renders the same output for any data.
    pub fn is_static(&self) -> bool {
        match self {
            Node::Text(_) => true,
            Node::Element(e) => e.is_static,
            Node::Attribute(a) => a.is_static,
            Node::Property(p) => p.is_static,
            Node::Style(s) => s.is_static,
            Node::If(_)
            | Node::ElseIf(_)
            | Node::Else(_)
            | Node::Directive(_)
            | Node::Expression(_)
            | Node::Each(_)
            | Node::Import(_)
            | Node::Partial(_)
            | Node::Spread(_) => false,
        }
    }

    pub fn children(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Element(e) => e.children.as_ref(),
            Node::Attribute(a) => a.children.as_ref(),
            Node::Property(p) => p.children.as_ref(),
            Node::Style(s) => s.children.as_ref(),
            Node::Directive(d) => d.children.as_ref(),
            Node::If(b) | Node::ElseIf(b) | Node::Else(b) => b.children.as_ref(),
            Node::Each(e) => e.children.as_ref(),
            Node::Partial(p) => p.children.as_ref(),
            Node::Text(_) | Node::Expression(_) | Node::Import(_) | Node::Spread(_) => None,
        }
    }

    pub(crate) fn children_slot(&mut self) -> Option<&mut Option<Vec<Node>>> {
        match self {
            Node::Element(e) => Some(&mut e.children),
            Node::Attribute(a) => Some(&mut a.children),
            Node::Property(p) => Some(&mut p.children),
            Node::Style(s) => Some(&mut s.children),
            Node::Directive(d) => Some(&mut d.children),
            Node::If(b) | Node::ElseIf(b) | Node::Else(b) => Some(&mut b.children),
            Node::Each(e) => Some(&mut e.children),
            Node::Partial(p) => Some(&mut p.children),
            Node::Text(_) | Node::Expression(_) | Node::Import(_) | Node::Spread(_) => None,
        }
    }

    /// Chain successor of an if/else-if/each node.
    pub fn next(&self) -> Option<&Node> {
        match self {
            Node::If(b) | Node::ElseIf(b) | Node::Else(b) => b.next.as_deref(),
            Node::Each(e) => e.next.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn set_next(&mut self, node: Node) {
        match self {
            Node::If(b) | Node::ElseIf(b) | Node::Else(b) => b.next = Some(Box::new(node)),
            Node::Each(e) => e.next = Some(Box::new(node)),
            _ => {}
        }
    }
}

impl Element {
    /// `<template>`, `<slot>` and `<portal>` carry structure rather than a DOM element.
    pub fn is_special(&self) -> bool {
        !self.is_component && matches!(self.tag.as_str(), "template" | "slot" | "portal")
    }

    /// Plain native element, the only legal parent of raw interpolation.
    pub fn is_native(&self) -> bool {
        !self.is_component && !self.is_special()
    }
}
