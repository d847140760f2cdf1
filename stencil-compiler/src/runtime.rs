//! Helpers for generated render closures.
//!
//! A [`Runtime`] supplies every [`crate::naming::Helper`] of a closure built
//! by `generate_source`, with the same scoping and output as
//! [`crate::Program::render`] over the same tree.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde_json::Value;
use stencil_dom::{
    Binding, Component, Data, Directive, DirectiveKind, Element, Getter, Target, VNode, style,
};
use stencil_expr::{Identifier, value};
use tracing::trace;

use crate::Compiler;
use crate::abi;
use crate::platform::Hint;
use crate::render::{self, Host, RenderError, Result, Scope};

/// A generated render closure.
///
/// Implemented for every closure taking the helpers in [`crate::naming::Helper::ALL`]
/// order, which is what `include!` of generated source evaluates to.
pub trait Template {
    fn call(&self, runtime: &Runtime<'_>) -> Result<Vec<VNode>>;
}

impl<F> Template for F
where
    F: Fn(
        abi::Lookup<'_>,
        abi::MemberStatic<'_>,
        abi::MemberDynamic<'_>,
        abi::Call<'_>,
        abi::ToDisplay<'_>,
        abi::CreateText<'_>,
        abi::CreateComment<'_>,
        abi::CreateElement<'_>,
        abi::CreateComponent<'_>,
        abi::CreateFragment<'_>,
        abi::CreatePortal<'_>,
        abi::RenderSlot<'_>,
        abi::SetAttribute<'_>,
        abi::SetProperty<'_>,
        abi::SetStyle<'_>,
        abi::SetProp<'_>,
        abi::Spread<'_>,
        abi::SetBinding<'_>,
        abi::On<'_>,
        abi::Model<'_>,
        abi::Lazy<'_>,
        abi::Transition<'_>,
        abi::Directive<'_>,
        abi::Getter<'_>,
        abi::Each<'_>,
        abi::Range<'_>,
        abi::Import<'_>,
        abi::StaticList<'_>,
    ) -> abi::Result<Vec<VNode>>,
{
    fn call(&self, rt: &Runtime<'_>) -> Result<Vec<VNode>> {
        (self)(
            &|name: &str, walk: bool, root: bool, offset: usize| rt.lookup(name, walk, root, offset),
            &member_static,
            &member_dynamic,
            &|name: &str, args: Vec<Value>| rt.call(name, args),
            &|v: &Value| value::to_display(v),
            &|text: String| VNode::Text(text),
            &|text: String| VNode::Comment(text),
            &create_element,
            &|tag: Value| rt.create_component(tag),
            &|children: Vec<VNode>| VNode::Fragment(children),
            &|to: String, children: Vec<VNode>| VNode::Portal { to, children },
            &|name: &str| rt.render_slot(name),
            &set_attribute,
            &set_property,
            &set_style,
            &|c: &mut Component, name: &str, v: Value| c.set_prop(name, v),
            &spread,
            &|target: &mut dyn Target, name: &str, keypath: &str| rt.set_binding(target, name, keypath),
            &|target: &mut dyn Target, event: &str, modifier: Option<&str>, binding: Binding| {
                add(target, DirectiveKind::Event, event, modifier, binding)
            },
            &|target: &mut dyn Target, keypath: &str| rt.model(target, keypath),
            &|target: &mut dyn Target, name: &str, v: Value| {
                add(target, DirectiveKind::Lazy, name, None, Binding::Value(v))
            },
            &|target: &mut dyn Target, v: Value| {
                add(target, DirectiveKind::Transition, "transition", None, Binding::Value(v))
            },
            &|target: &mut dyn Target, name: &str, modifier: Option<&str>, binding: Binding| {
                add(target, DirectiveKind::Custom, name, modifier, binding)
            },
            &|thunk: abi::Thunk| rt.getter(thunk),
            &|list: Value, keypath: Option<&str>, index: Option<&str>, body: abi::Body<'_>| {
                rt.each(list, keypath, index, body)
            },
            &|from: Value, to: Value, equal: bool, index: Option<&str>, body: abi::Body<'_>| {
                rt.range(&from, &to, equal, index, body)
            },
            &|name: &str| rt.import(name),
            &|id: usize, build: &dyn Fn() -> Vec<VNode>| rt.static_list(id, build),
        )
    }
}

struct State<'h> {
    host: &'h mut dyn Host,
    scopes: Vec<Scope>,
    slots: HashSet<String>,
}

/// Render-time state shared by the helpers of one generated closure.
///
/// Static lists are built on first use and cloned afterwards, for as long
/// as the runtime lives.
pub struct Runtime<'h> {
    state: RefCell<State<'h>>,
    compiler: Compiler,
    statics: RefCell<HashMap<usize, Vec<VNode>>>,
}

impl<'h> Runtime<'h> {
    pub fn new(host: &'h mut dyn Host, compiler: &Compiler) -> Self {
        Self {
            state: RefCell::new(State {
                host,
                scopes: vec![Scope::root()],
                slots: HashSet::new(),
            }),
            compiler: compiler.clone(),
            statics: RefCell::new(HashMap::new()),
        }
    }

    pub fn render<T: Template + ?Sized>(&self, template: &T) -> Result<Vec<VNode>> {
        {
            let mut state = self.state.borrow_mut();
            state.scopes = vec![Scope::root()];
            state.slots.clear();
        }
        template.call(self)
    }

    fn lookup(&self, name: &str, walk: bool, root: bool, offset: usize) -> Value {
        let id = Identifier {
            name: name.to_string(),
            lookup: walk,
            root,
            offset,
        };
        self.resolve(&id).0
    }

    fn resolve(&self, id: &Identifier) -> (Value, Option<String>) {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        render::resolve(&mut *state.host, &state.scopes, id, None)
    }

    fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.state
            .borrow_mut()
            .host
            .call(name, args)
            .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))
    }

    fn create_component(&self, tag: Value) -> Result<Component> {
        match tag {
            Value::String(name) if self.state.borrow().host.is_component(&name) => {
                Ok(Component::new(name))
            }
            Value::String(name) => Err(RenderError::ComponentNotFound(name)),
            other => Err(RenderError::DynamicTagNotString {
                tag: String::from("$"),
                value: other.to_string(),
            }),
        }
    }

    fn render_slot(&self, name: &str) -> Result<Option<Vec<VNode>>> {
        let mut state = self.state.borrow_mut();
        if !state.slots.insert(name.to_string()) {
            return Err(RenderError::DuplicateSlot(name.to_string()));
        }
        Ok(state.host.slot(name))
    }

    fn set_binding(&self, target: &mut dyn Target, name: &str, keypath: &str) {
        if let (_, Some(keypath)) = self.resolve(&relative_identifier(keypath)) {
            target.set_binding(name, &keypath);
        }
    }

    fn model(&self, target: &mut dyn Target, keypath: &str) {
        let id = relative_identifier(keypath);
        let keypath = self.resolve(&id).1.unwrap_or(id.name);
        add(target, DirectiveKind::Model, "model", None, Binding::Keypath(keypath));
    }

    /// Captures the current scope chain; the thunk gets helpers resolving
    /// against it and whatever data the getter is called with.
    fn getter(&self, thunk: abi::Thunk) -> Getter {
        let scopes = self.state.borrow().scopes.clone();
        Getter::new(move |data: &mut dyn Data, event: Option<&Value>| {
            let data = RefCell::new(data);
            let lookup = |name: &str, walk: bool, root: bool, offset: usize| {
                let id = Identifier {
                    name: name.to_string(),
                    lookup: walk,
                    root,
                    offset,
                };
                render::resolve(&mut **data.borrow_mut(), &scopes, &id, event).0
            };
            let call = |name: &str, args: Vec<Value>| {
                data.borrow_mut()
                    .call(name, args)
                    .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))
            };
            thunk(&lookup, &member_static, &member_dynamic, &call).map_err(|e| e.to_string())
        })
    }

    fn each(
        &self,
        list: Value,
        keypath: Option<&str>,
        index: Option<&str>,
        body: abi::Body<'_>,
    ) -> Result<usize> {
        let base = keypath.and_then(|k| self.resolve(&relative_identifier(k)).1);
        self.iterate(render::list_scopes(list, base.as_deref(), index), body)
    }

    fn range(
        &self,
        from: &Value,
        to: &Value,
        equal: bool,
        index: Option<&str>,
        body: abi::Body<'_>,
    ) -> Result<usize> {
        let (start, end) = (value::to_number(from), value::to_number(to));
        self.iterate(render::range_scopes(start, end, equal, index), body)
    }

    fn iterate(&self, scopes: Vec<Scope>, body: abi::Body<'_>) -> Result<usize> {
        let count = scopes.len();
        for scope in scopes {
            self.state.borrow_mut().scopes.push(scope);
            let done = body();
            self.state.borrow_mut().scopes.pop();
            done?;
        }
        Ok(count)
    }

    fn import(&self, name: &str) -> Result<Vec<VNode>> {
        trace!(name, "importing partial");
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        render::render_partial(
            &mut *state.host,
            &self.compiler,
            &state.scopes,
            &mut state.slots,
            name,
        )
    }

    fn static_list(&self, id: usize, build: &dyn Fn() -> Vec<VNode>) -> Vec<VNode> {
        if let Some(nodes) = self.statics.borrow().get(&id) {
            return nodes.clone();
        }
        let nodes = build();
        self.statics.borrow_mut().insert(id, nodes.clone());
        nodes
    }
}

/// Inverse of the relative keypath encoding: `~/x`, `../x`, `./x` or `x`.
fn relative_identifier(keypath: &str) -> Identifier {
    let mut id = Identifier::new("");
    if let Some(name) = keypath.strip_prefix("~/") {
        id.root = true;
        id.name = name.to_string();
        return id;
    }
    if let Some(name) = keypath.strip_prefix("./") {
        id.lookup = false;
        id.name = name.to_string();
        return id;
    }
    let mut rest = keypath;
    while let Some(next) = rest.strip_prefix("../") {
        id.offset += 1;
        rest = next;
    }
    id.lookup = id.offset == 0;
    id.name = rest.to_string();
    id
}

fn member_static(lead: Value, keypath: &str) -> Value {
    value::get_path(&lead, keypath).unwrap_or(Value::Null)
}

fn member_dynamic(lead: Value, key: Value) -> Value {
    value::member(&lead, &key)
}

fn create_element(tag: &str, is_svg: bool, is_style: bool, is_option: bool) -> Element {
    Element {
        tag: tag.to_string(),
        is_svg,
        is_style,
        is_option,
        ..Default::default()
    }
}

fn set_attribute(element: &mut Element, name: &str, ns: Option<&str>, v: Value) {
    if !v.is_null() {
        element.set_attribute(name, ns, value::to_display(&v));
    }
}

fn set_property(element: &mut Element, name: &str, hint: Hint, v: Value) {
    element.set_property(name, hint.coerce(v));
}

fn set_style(element: &mut Element, v: Value) {
    element.set_style(style::from_value(&v));
}

fn spread(component: &mut Component, v: Value) -> Result<()> {
    match v {
        Value::Object(object) => {
            component.spread(&object);
            Ok(())
        }
        other => Err(RenderError::SpreadNotObject(other.to_string())),
    }
}

fn add(
    target: &mut dyn Target,
    kind: DirectiveKind,
    name: &str,
    modifier: Option<&str>,
    value: Binding,
) {
    target.add_directive(Directive {
        kind,
        name: name.to_string(),
        modifier: modifier.map(str::to_string),
        value,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::relative_keypath;

    #[test]
    fn relative_identifiers_invert_keypaths() {
        for keypath in ["user.name", "~/user.name", "./name", "../../name", "./"] {
            assert_eq!(relative_keypath(&relative_identifier(keypath)), keypath);
        }
        let id = relative_identifier("../x");
        assert_eq!((id.offset, id.name.as_str(), id.root), (1, "x", false));
    }
}
