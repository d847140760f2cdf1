//! Parameter types of a generated render closure.
//!
//! One alias per [`crate::naming::Helper`], same name, same order. The
//! runtime owns the scope stack: helpers taking a keypath (`set_binding`,
//! `model`, `each`) resolve it against the scope that is current when they
//! are called.

use std::rc::Rc;

use serde_json::Value;
use stencil_dom::{Binding, Component, Element, Target, VNode};

use crate::platform::Hint;
use crate::render::RenderError;

pub type Result<T> = std::result::Result<T, RenderError>;

/// Loop body. Pushes into the enclosing node list.
pub type Body<'a> = &'a mut dyn FnMut() -> Result<()>;

/// Deferred expression. Receives fresh resolution helpers each time it
/// runs, since the ones of the render that created it are gone by then.
pub type Thunk =
    Rc<dyn Fn(Lookup<'_>, MemberStatic<'_>, MemberDynamic<'_>, Call<'_>) -> Result<Value>>;

/// `(name, lookup, root, offset)`, see [`stencil_expr::Identifier`].
pub type Lookup<'a> = &'a dyn Fn(&str, bool, bool, usize) -> Value;
pub type MemberStatic<'a> = &'a dyn Fn(Value, &str) -> Value;
pub type MemberDynamic<'a> = &'a dyn Fn(Value, Value) -> Value;
pub type Call<'a> = &'a dyn Fn(&str, Vec<Value>) -> Result<Value>;
pub type ToDisplay<'a> = &'a dyn Fn(&Value) -> String;

pub type CreateText<'a> = &'a dyn Fn(String) -> VNode;
pub type CreateComment<'a> = &'a dyn Fn(String) -> VNode;
/// `(tag, is_svg, is_style, is_option)`
pub type CreateElement<'a> = &'a dyn Fn(&str, bool, bool, bool) -> Element;
/// Checks dynamic names; a static tag arrives as a string literal.
pub type CreateComponent<'a> = &'a dyn Fn(Value) -> Result<Component>;
pub type CreateFragment<'a> = &'a dyn Fn(Vec<VNode>) -> VNode;
pub type CreatePortal<'a> = &'a dyn Fn(String, Vec<VNode>) -> VNode;
/// Host content for a slot, `None` to fall back. Fails on a second render
/// of the same slot.
pub type RenderSlot<'a> = &'a dyn Fn(&str) -> Result<Option<Vec<VNode>>>;

pub type SetAttribute<'a> = &'a dyn Fn(&mut Element, &str, Option<&str>, Value);
pub type SetProperty<'a> = &'a dyn Fn(&mut Element, &str, Hint, Value);
/// Object of declarations or a css string.
pub type SetStyle<'a> = &'a dyn Fn(&mut Element, Value);
pub type SetProp<'a> = &'a dyn Fn(&mut Component, &str, Value);
pub type Spread<'a> = &'a dyn Fn(&mut Component, Value) -> Result<()>;
/// `(target, attribute, relative keypath)`
pub type SetBinding<'a> = &'a dyn Fn(&mut dyn Target, &str, &str);

/// `(target, event, modifier, handler)`
pub type On<'a> = &'a dyn Fn(&mut dyn Target, &str, Option<&str>, Binding);
/// `(target, relative keypath)`
pub type Model<'a> = &'a dyn Fn(&mut dyn Target, &str);
pub type Lazy<'a> = &'a dyn Fn(&mut dyn Target, &str, Value);
pub type Transition<'a> = &'a dyn Fn(&mut dyn Target, Value);
/// Custom directive: `(target, name, modifier, value)`.
pub type Directive<'a> = &'a dyn Fn(&mut dyn Target, &str, Option<&str>, Binding);
/// Captures the current scope around a thunk.
pub type Getter<'a> = &'a dyn Fn(Thunk) -> stencil_dom::Getter;

/// `(list, relative keypath of the list, index name, body)`, returns the
/// number of iterations.
pub type Each<'a> = &'a dyn Fn(Value, Option<&str>, Option<&str>, Body<'_>) -> Result<usize>;
/// `(from, to, inclusive, index name, body)`
pub type Range<'a> = &'a dyn Fn(Value, Value, bool, Option<&str>, Body<'_>) -> Result<usize>;
/// Renders a globally registered partial in the current scope.
pub type Import<'a> = &'a dyn Fn(&str) -> Result<Vec<VNode>>;
/// Builds the list once per id and returns clones afterwards.
pub type StaticList<'a> = &'a dyn Fn(usize, &dyn Fn() -> Vec<VNode>) -> Vec<VNode>;
