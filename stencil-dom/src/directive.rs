use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::data::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Event,
    Lazy,
    Model,
    Transition,
    Custom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub name: String,
    pub modifier: Option<String>,
    pub value: Binding,
}

/// What a directive carries to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Value),
    /// Lazily evaluated expression.
    Getter(Getter),
    /// Call of a named handler; `args` are evaluated with the event payload
    /// bound to `$event`.
    Method { name: String, args: Option<Getter> },
    /// Two-way binding target.
    Keypath(String),
}

type GetterFn = dyn Fn(&mut dyn Data, Option<&Value>) -> Result<Value, String>;

/// Deferred expression evaluation, captured together with its scope.
#[derive(Clone)]
pub struct Getter(Rc<GetterFn>);

impl Getter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn Data, Option<&Value>) -> Result<Value, String> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Evaluates against `data`, with `event` available as `$event`.
    pub fn get(&self, data: &mut dyn Data, event: Option<&Value>) -> Result<Value, String> {
        (self.0)(data, event)
    }
}

impl PartialEq for Getter {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Getter(..)")
    }
}
