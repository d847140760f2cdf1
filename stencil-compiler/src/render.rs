//! Executable generator.
//!
//! [`Generator`] lowers a finished tree into nested `Rc` closures once;
//! [`Program::render`] runs them against a [`Host`]. Children lists that are
//! entirely static are rendered at generation time and only cloned per
//! render.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use stencil_dom::{
    self as dom, Binding, Component, DEFAULT_SLOT, Data, Directive, DirectiveKind, Getter, Target,
    VNode,
};
use stencil_expr::{self as expr, Identifier, Node as Expr, Resolver, value};
use thiserror::Error;

use crate::Compiler;
use crate::ast::{self, Attribute, Branch, Content, Each, Namespace, Node};
use crate::error::CompileError;
use crate::parser::CHILDREN;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("partial `{0}` is not registered")]
    PartialNotFound(String),

    #[error("component `{0}` is not registered")]
    ComponentNotFound(String),

    #[error("spread value must be an object, got `{0}`")]
    SpreadNotObject(String),

    #[error("slot `{0}` is rendered more than once")]
    DuplicateSlot(String),

    #[error("function `{0}` is not registered")]
    UnknownFunction(String),

    #[error("dynamic tag `{tag}` must resolve to a string, got `{value}`")]
    DynamicTagNotString { tag: String, value: String },

    #[error("partial `{name}` failed to compile: {source}")]
    Partial {
        name: String,
        #[source]
        source: CompileError,
    },
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Render-time environment of a program.
///
/// `get` reads go through here for every data access, so an observer
/// implementing [`Data`] sees the full dependency set of a render.
pub trait Host: Data {
    /// Source of a globally registered partial.
    fn partial(&self, name: &str) -> Option<String> {
        let _ = name;
        None
    }

    /// Whether `name` is a registered component.
    fn is_component(&self, name: &str) -> bool {
        let _ = name;
        true
    }

    /// Content passed to the component being rendered for slot `name`.
    fn slot(&self, name: &str) -> Option<Vec<VNode>> {
        let _ = name;
        None
    }
}

impl Host for Value {}

/// A generated render procedure.
pub struct Program {
    root: Children,
    compiler: Compiler,
}

impl Program {
    pub fn render(&self, host: &mut dyn Host) -> Result<Vec<VNode>> {
        let mut ctx = Ctx::new(host, &self.compiler);
        let mut out = Vec::new();
        self.root.render(&mut ctx, &mut out)?;
        Ok(out)
    }

    /// Whether every root renders the same output for any data.
    pub fn is_static(&self) -> bool {
        matches!(self.root, Children::Static(_))
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("static", &self.is_static())
            .finish_non_exhaustive()
    }
}

// ---- scopes ----

#[derive(Debug, Clone)]
pub(crate) struct Scope {
    /// Absolute keypath of the scope item, when it lives in the data tree.
    keypath: Option<String>,
    item: Value,
    index_name: Option<String>,
    index: Value,
}

impl Scope {
    pub(crate) fn root() -> Self {
        Self {
            keypath: Some(String::new()),
            item: Value::Null,
            index_name: None,
            index: Value::Null,
        }
    }
}

fn join(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}.{name}"),
    }
}

/// Resolves an identifier to its value and, when it is backed by data, its
/// absolute keypath.
pub(crate) fn resolve<D: Data + ?Sized>(
    data: &mut D,
    scopes: &[Scope],
    id: &Identifier,
    event: Option<&Value>,
) -> (Value, Option<String>) {
    let (head, rest) = id.name.split_once('.').unwrap_or((id.name.as_str(), ""));
    if head == expr::EVENT {
        let value = event.and_then(|e| value::get_path(e, rest));
        return (value.unwrap_or(Value::Null), None);
    }
    if id.root {
        return (data.get(&id.name).unwrap_or(Value::Null), Some(id.name.clone()));
    }

    let start = scopes.len().saturating_sub(1 + id.offset);
    let walk = id.lookup && id.offset == 0;
    for scope in scopes.get(..=start).unwrap_or_default().iter().rev() {
        if !id.name.is_empty() && scope.index_name.as_deref() == Some(head) {
            let value = value::get_path(&scope.index, rest).unwrap_or(Value::Null);
            return (value, None);
        }
        match &scope.keypath {
            Some(base) => {
                let keypath = join(base, &id.name);
                if let Some(value) = data.get(&keypath) {
                    return (value, Some(keypath));
                }
            }
            None => {
                if let Some(value) = value::get_path(&scope.item, &id.name) {
                    return (value, None);
                }
            }
        }
        if !walk || id.name.is_empty() {
            break;
        }
    }

    let keypath = scopes
        .get(start)
        .and_then(|s| s.keypath.as_deref())
        .map(|base| join(base, &id.name));
    (Value::Null, keypath)
}

/// Expression resolver over a scope chain.
struct Lookup<'a, D: Data + ?Sized> {
    data: &'a mut D,
    scopes: &'a [Scope],
    event: Option<&'a Value>,
}

impl<D: Data + ?Sized> Resolver for Lookup<'_, D> {
    type Error = RenderError;

    fn identifier(&mut self, identifier: &Identifier) -> Result<Value> {
        Ok(resolve(self.data, self.scopes, identifier, self.event).0)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.data
            .call(name, args)
            .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))
    }
}

pub(crate) struct Ctx<'h> {
    host: &'h mut dyn Host,
    compiler: &'h Compiler,
    scopes: Vec<Scope>,
    /// Partials defined in the template so far.
    partials: HashMap<String, Rc<Children>>,
    /// Host partials generated during this render.
    imported: HashMap<String, Rc<Children>>,
    slots: HashSet<String>,
}

impl<'h> Ctx<'h> {
    fn new(host: &'h mut dyn Host, compiler: &'h Compiler) -> Self {
        Self {
            host,
            compiler,
            scopes: vec![Scope::root()],
            partials: HashMap::new(),
            imported: HashMap::new(),
            slots: HashSet::new(),
        }
    }

    fn eval(&mut self, node: &Expr) -> Result<Value> {
        let mut lookup = Lookup {
            data: &mut *self.host,
            scopes: &self.scopes,
            event: None,
        };
        expr::evaluate(node, &mut lookup)
    }

    fn resolve(&mut self, id: &Identifier) -> (Value, Option<String>) {
        resolve(&mut *self.host, &self.scopes, id, None)
    }

    /// Defers `node` with the current scope chain captured.
    fn getter(&self, node: Rc<Expr>) -> Getter {
        let scopes = self.scopes.clone();
        Getter::new(move |data: &mut dyn Data, event: Option<&Value>| {
            let mut lookup = Lookup {
                data,
                scopes: &scopes,
                event,
            };
            expr::evaluate(&node, &mut lookup).map_err(|e| e.to_string())
        })
    }

    fn with_scope<T>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn claim_slot(&mut self, name: &str) -> Result<()> {
        if self.slots.insert(name.to_string()) {
            Ok(())
        } else {
            Err(RenderError::DuplicateSlot(name.to_string()))
        }
    }

    fn import(&mut self, name: &str) -> Result<Rc<Children>> {
        if let Some(children) = self.partials.get(name).or_else(|| self.imported.get(name)) {
            return Ok(Rc::clone(children));
        }
        let source = self
            .host
            .partial(name)
            .ok_or_else(|| RenderError::PartialNotFound(name.to_string()))?;
        let nodes = self.compiler.compile(&source).map_err(|source| RenderError::Partial {
            name: name.to_string(),
            source,
        })?;
        let children = Rc::new(Generator::new(self.compiler).children(&nodes));
        self.imported.insert(name.to_string(), Rc::clone(&children));
        Ok(children)
    }
}

// ---- closures ----

type Emit = Rc<dyn Fn(&mut Ctx<'_>, &mut Vec<VNode>) -> Result<()>>;
type Text = Rc<dyn Fn(&mut Ctx<'_>) -> Result<String>>;
type Eval = Rc<dyn Fn(&mut Ctx<'_>) -> Result<Value>>;
type Apply<T> = Rc<dyn Fn(&mut Ctx<'_>, &mut T) -> Result<()>>;

fn emit(f: impl Fn(&mut Ctx<'_>, &mut Vec<VNode>) -> Result<()> + 'static) -> Emit {
    Rc::new(f)
}

fn text(f: impl Fn(&mut Ctx<'_>) -> Result<String> + 'static) -> Text {
    Rc::new(f)
}

fn eval(f: impl Fn(&mut Ctx<'_>) -> Result<Value> + 'static) -> Eval {
    Rc::new(f)
}

fn apply<T: 'static>(f: impl Fn(&mut Ctx<'_>, &mut T) -> Result<()> + 'static) -> Apply<T> {
    Rc::new(f)
}

pub(crate) enum Children {
    Static(Rc<[VNode]>),
    Dynamic(Rc<[Emit]>),
}

impl Children {
    fn render(&self, ctx: &mut Ctx<'_>, out: &mut Vec<VNode>) -> Result<()> {
        match self {
            Children::Static(nodes) => out.extend(nodes.iter().cloned()),
            Children::Dynamic(emits) => {
                for emit in emits.iter() {
                    emit(ctx, out)?;
                }
            }
        }
        Ok(())
    }
}

/// What an attribute-position node can be applied to.
trait Receiver: Target + 'static {
    fn attribute(&mut self, name: &str, ns: Option<&str>, value: Value);
    fn property(&mut self, name: &str, value: Value);
    fn style(&mut self, style: BTreeMap<String, String>);
    fn spread_value(&mut self, value: Value) -> Result<()>;
}

impl Receiver for dom::Element {
    fn attribute(&mut self, name: &str, ns: Option<&str>, value: Value) {
        if !value.is_null() {
            self.set_attribute(name, ns, value::to_display(&value));
        }
    }

    fn property(&mut self, name: &str, value: Value) {
        self.set_property(name, value);
    }

    fn style(&mut self, style: BTreeMap<String, String>) {
        self.set_style(style);
    }

    // Only components accept spreads; the tree builder drops the rest.
    fn spread_value(&mut self, _value: Value) -> Result<()> {
        Ok(())
    }
}

impl Receiver for Component {
    fn attribute(&mut self, name: &str, _ns: Option<&str>, value: Value) {
        self.set_prop(name, value);
    }

    fn property(&mut self, name: &str, value: Value) {
        self.set_prop(name, value);
    }

    fn style(&mut self, style: BTreeMap<String, String>) {
        let style = style.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        self.set_prop("style", Value::Object(style));
    }

    fn spread_value(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Object(object) => {
                self.spread(&object);
                Ok(())
            }
            other => Err(RenderError::SpreadNotObject(other.to_string())),
        }
    }
}

/// One link of a flattened if chain.
struct Arm<T> {
    test: Option<Expr>,
    body: Option<T>,
}

fn select<'a, T>(ctx: &mut Ctx<'_>, arms: &'a [Arm<T>]) -> Result<Option<&'a T>> {
    for arm in arms {
        let taken = match &arm.test {
            Some(test) => value::is_truthy(&ctx.eval(test)?),
            None => true,
        };
        if taken {
            return Ok(arm.body.as_ref());
        }
    }
    Ok(None)
}

// ---- generator ----

pub(crate) struct Generator<'c> {
    compiler: &'c Compiler,
}

impl<'c> Generator<'c> {
    pub(crate) fn new(compiler: &'c Compiler) -> Self {
        Self { compiler }
    }

    pub(crate) fn program(&self, nodes: &[Node]) -> Program {
        Program {
            root: self.children(nodes),
            compiler: self.compiler.clone(),
        }
    }

    fn children(&self, nodes: &[Node]) -> Children {
        let emits: Rc<[Emit]> = nodes.iter().map(|n| self.node(n)).collect();
        if nodes.iter().all(Node::is_static) {
            if let Some(rendered) = self.prerender(&emits) {
                return Children::Static(rendered);
            }
        }
        Children::Dynamic(emits)
    }

    /// Runs static emits once against empty data.
    fn prerender(&self, emits: &[Emit]) -> Option<Rc<[VNode]>> {
        let mut data = Value::Null;
        let mut ctx = Ctx::new(&mut data, self.compiler);
        let mut out = Vec::new();
        for step in emits {
            step(&mut ctx, &mut out).ok()?;
        }
        Some(out.into())
    }

    fn node(&self, node: &Node) -> Emit {
        match node {
            Node::Text(t) => {
                let content = t.text.clone();
                emit(move |_, out| {
                    out.push(VNode::Text(content.clone()));
                    Ok(())
                })
            }
            Node::Expression(x) if x.expr.static_keypath() == Some(CHILDREN) => {
                emit(|ctx, out| {
                    ctx.claim_slot(DEFAULT_SLOT)?;
                    out.extend(ctx.host.slot(DEFAULT_SLOT).unwrap_or_default());
                    Ok(())
                })
            }
            Node::Expression(x) => {
                let node = x.expr.clone();
                emit(move |ctx, out| {
                    let value = ctx.eval(&node)?;
                    out.push(VNode::Text(value::to_display(&value)));
                    Ok(())
                })
            }
            Node::Element(e) if e.is_static => match self.prerender(&[self.element(e)]) {
                Some(rendered) => emit(move |_, out| {
                    out.extend(rendered.iter().cloned());
                    Ok(())
                }),
                None => self.element(e),
            },
            Node::Element(e) => self.element(e),
            Node::If(b) => self.if_chain(node, b.stump),
            Node::Each(each) => self.each(each),
            Node::Import(import) => {
                let name = import.name.clone();
                emit(move |ctx, out| {
                    let children = ctx.import(&name)?;
                    children.render(ctx, out)
                })
            }
            Node::Partial(partial) => {
                let name = partial.name.clone();
                let children = Rc::new(self.children(partial.children.as_deref().unwrap_or_default()));
                emit(move |ctx, _| {
                    ctx.partials.insert(name.clone(), Rc::clone(&children));
                    Ok(())
                })
            }
            Node::ElseIf(_)
            | Node::Else(_)
            | Node::Attribute(_)
            | Node::Property(_)
            | Node::Style(_)
            | Node::Directive(_)
            | Node::Spread(_) => emit(|_, _| Ok(())),
        }
    }

    fn arms<T>(&self, head: &Node, mut body: impl FnMut(&[Node]) -> T) -> Rc<[Arm<T>]> {
        let mut arms = Vec::new();
        let mut current = Some(head);
        while let Some(node) = current {
            if let Node::If(b) | Node::ElseIf(b) | Node::Else(b) = node {
                arms.push(Arm {
                    test: b.expr.clone(),
                    body: b.children.as_deref().map(&mut body),
                });
            }
            current = node.next();
        }
        arms.into()
    }

    fn if_chain(&self, head: &Node, stump: bool) -> Emit {
        let arms = self.arms(head, |nodes| self.children(nodes));
        emit(move |ctx, out| match select(ctx, &arms)? {
            Some(children) => children.render(ctx, out),
            None => {
                if stump {
                    out.push(VNode::Comment(String::new()));
                }
                Ok(())
            }
        })
    }

    fn each(&self, each: &Each) -> Emit {
        let from = each.from.clone();
        let to = each.to.clone();
        let equal = each.equal;
        let index_name = each.index.clone();
        let body = Rc::new(self.children(each.children.as_deref().unwrap_or_default()));
        let otherwise = match each.next.as_deref() {
            Some(Node::Else(Branch {
                children: Some(children),
                ..
            })) => Some(self.children(children)),
            _ => None,
        };

        emit(move |ctx, out| {
            let scopes = match &to {
                Some(to) => {
                    let start = value::to_number(&ctx.eval(&from)?);
                    let end = value::to_number(&ctx.eval(to)?);
                    range_scopes(start, end, equal, index_name.as_deref())
                }
                None => {
                    let (list, keypath) = match &from {
                        Expr::Identifier(id) => ctx.resolve(id),
                        other => (ctx.eval(other)?, None),
                    };
                    list_scopes(list, keypath.as_deref(), index_name.as_deref())
                }
            };

            if scopes.is_empty() {
                if let Some(otherwise) = &otherwise {
                    otherwise.render(ctx, out)?;
                }
                return Ok(());
            }
            for scope in scopes {
                ctx.with_scope(scope, |ctx| body.render(ctx, out))?;
            }
            Ok(())
        })
    }

    fn element(&self, e: &ast::Element) -> Emit {
        if e.is_component {
            return self.component(e);
        }
        match e.tag.as_str() {
            "template" => {
                let children = self.children(e.children.as_deref().unwrap_or_default());
                emit(move |ctx, out| {
                    let mut nodes = Vec::new();
                    children.render(ctx, &mut nodes)?;
                    out.push(VNode::Fragment(nodes));
                    Ok(())
                })
            }
            "slot" => self.slot(e),
            "portal" => {
                let to = self.optional_text(e.to.as_ref());
                let children = self.children(e.children.as_deref().unwrap_or_default());
                emit(move |ctx, out| {
                    let to = match &to {
                        Some(to) => to(ctx)?,
                        None => String::new(),
                    };
                    let mut nodes = Vec::new();
                    children.render(ctx, &mut nodes)?;
                    out.push(VNode::Portal { to, children: nodes });
                    Ok(())
                })
            }
            _ => self.native(e),
        }
    }

    fn native(&self, e: &ast::Element) -> Emit {
        let template = dom::Element {
            tag: e.tag.clone(),
            is_svg: e.is_svg,
            is_style: e.is_style,
            is_option: e.is_option,
            ..Default::default()
        };
        let key = self.optional_text(e.key.as_ref());
        let ref_name = self.optional_text(e.ref_name.as_ref());
        let attrs = self.attrs::<dom::Element>(e.attrs.as_deref());
        let text = e.text.as_ref().map(|c| self.content(c));
        let html = e.html.as_ref().map(|c| self.content(c));
        let children = e.children.as_deref().map(|c| self.children(c));

        emit(move |ctx, out| {
            let mut element = template.clone();
            if let Some(key) = &key {
                element.set_key(key(ctx)?);
            }
            if let Some(ref_name) = &ref_name {
                element.set_ref(ref_name(ctx)?);
            }
            for attr in attrs.iter() {
                attr(ctx, &mut element)?;
            }
            if let Some(text) = &text {
                element.text = Some(text(ctx)?);
            }
            if let Some(html) = &html {
                element.html = Some(html(ctx)?);
            }
            if let Some(children) = &children {
                children.render(ctx, &mut element.children)?;
            }
            out.push(VNode::Element(element));
            Ok(())
        })
    }

    fn component(&self, e: &ast::Element) -> Emit {
        let tag = e.tag.clone();
        let dynamic = tag.strip_prefix('$').map(|name| Expr::Identifier(Identifier::new(name)));
        let key = self.optional_text(e.key.as_ref());
        let ref_name = self.optional_text(e.ref_name.as_ref());
        let attrs = self.attrs::<Component>(e.attrs.as_deref());
        let slots: Vec<(String, Children)> = group_slots(e.children.as_deref().unwrap_or_default())
            .into_iter()
            .map(|(name, nodes)| (name, self.children(&nodes)))
            .collect();

        emit(move |ctx, out| {
            let name = match &dynamic {
                Some(node) => match ctx.eval(node)? {
                    Value::String(name) => name,
                    other => {
                        return Err(RenderError::DynamicTagNotString {
                            tag: tag.clone(),
                            value: other.to_string(),
                        });
                    }
                },
                None => tag.clone(),
            };
            if !ctx.host.is_component(&name) {
                return Err(RenderError::ComponentNotFound(name));
            }
            let mut component = Component::new(name);
            if let Some(key) = &key {
                component.set_key(key(ctx)?);
            }
            if let Some(ref_name) = &ref_name {
                component.set_ref(ref_name(ctx)?);
            }
            for attr in attrs.iter() {
                attr(ctx, &mut component)?;
            }
            for (slot, children) in &slots {
                let mut nodes = Vec::new();
                children.render(ctx, &mut nodes)?;
                if !nodes.is_empty() {
                    component.add_slot(slot, nodes);
                }
            }
            out.push(VNode::Component(component));
            Ok(())
        })
    }

    fn slot(&self, e: &ast::Element) -> Emit {
        let name = self.optional_text(e.name.as_ref());
        let fallback = e.children.as_deref().map(|c| self.children(c));
        emit(move |ctx, out| {
            let name = match &name {
                Some(name) => name(ctx)?,
                None => DEFAULT_SLOT.to_string(),
            };
            ctx.claim_slot(&name)?;
            let children = match ctx.host.slot(&name) {
                Some(nodes) => nodes,
                None => {
                    let mut nodes = Vec::new();
                    if let Some(fallback) = &fallback {
                        fallback.render(ctx, &mut nodes)?;
                    }
                    nodes
                }
            };
            out.push(VNode::Slot { name, children });
            Ok(())
        })
    }

    // ---- attribute position ----

    fn attrs<T: Receiver>(&self, nodes: Option<&[Node]>) -> Rc<[Apply<T>]> {
        nodes
            .unwrap_or_default()
            .iter()
            .filter_map(|n| self.attr::<T>(n))
            .collect()
    }

    fn attr<T: Receiver>(&self, node: &Node) -> Option<Apply<T>> {
        let applied = match node {
            Node::Attribute(a) => {
                let name = a.name.clone();
                let ns = a.ns.clone();
                let bound = bound_identifier(a.binding.as_ref(), a.expr.as_ref());
                let value = self.value(a.value.as_ref(), a.expr.as_ref(), a.children.as_deref());
                apply(move |ctx, target: &mut T| {
                    let value = match &bound {
                        Some(id) => {
                            let (value, keypath) = ctx.resolve(id);
                            if let Some(keypath) = keypath {
                                target.set_binding(&name, &keypath);
                            }
                            value
                        }
                        None => value(ctx)?,
                    };
                    target.attribute(&name, ns.as_deref(), value);
                    Ok(())
                })
            }
            Node::Property(p) => {
                let name = p.name.clone();
                let hint = p.hint;
                let bound = bound_identifier(p.binding.as_ref(), p.expr.as_ref());
                let value = self.value(p.value.as_ref(), p.expr.as_ref(), p.children.as_deref());
                apply(move |ctx, target: &mut T| {
                    let value = match &bound {
                        Some(id) => {
                            let (value, keypath) = ctx.resolve(id);
                            if let Some(keypath) = keypath {
                                target.set_binding(&name, &keypath);
                            }
                            value
                        }
                        None => value(ctx)?,
                    };
                    target.property(&name, hint.coerce(value));
                    Ok(())
                })
            }
            Node::Style(s) => match (&s.parsed, &s.expr, &s.children) {
                (Some(parsed), _, _) => {
                    let parsed = parsed.clone();
                    apply(move |_, target: &mut T| {
                        target.style(parsed.clone());
                        Ok(())
                    })
                }
                (None, Some(node), _) => {
                    let node = node.clone();
                    apply(move |ctx, target: &mut T| {
                        let value = ctx.eval(&node)?;
                        target.style(dom::style::from_value(&value));
                        Ok(())
                    })
                }
                (None, None, Some(children)) => {
                    let css = self.text(children);
                    apply(move |ctx, target: &mut T| {
                        target.style(dom::style::parse(&css(ctx)?));
                        Ok(())
                    })
                }
                (None, None, None) => return None,
            },
            Node::Directive(d) => self.directive::<T>(d),
            Node::Spread(spread) => {
                let node = spread.expr.clone();
                apply(move |ctx, target: &mut T| {
                    let value = ctx.eval(&node)?;
                    target.spread_value(value)
                })
            }
            Node::If(_) => {
                let arms = self.arms(node, |nodes| self.attrs::<T>(Some(nodes)));
                apply(move |ctx, target: &mut T| {
                    if let Some(attrs) = select(ctx, &arms)? {
                        for attr in attrs.iter() {
                            attr(ctx, target)?;
                        }
                    }
                    Ok(())
                })
            }
            _ => return None,
        };
        Some(applied)
    }

    fn directive<T: Receiver>(&self, d: &ast::Directive) -> Apply<T> {
        let kind = match d.ns {
            Namespace::Event => DirectiveKind::Event,
            Namespace::Lazy => DirectiveKind::Lazy,
            Namespace::Model => DirectiveKind::Model,
            Namespace::Transition => DirectiveKind::Transition,
            Namespace::Custom => DirectiveKind::Custom,
        };
        let name = d.name.clone();
        let modifier = d.modifier.clone();
        let make = move |value: Binding| Directive {
            kind,
            name: name.clone(),
            modifier: modifier.clone(),
            value,
        };

        match (&d.expr, d.ns) {
            (Some(Expr::Call { name, args }), Namespace::Event) => {
                let method = name.clone();
                let args = (!args.is_empty()).then(|| Rc::new(Expr::Array { nodes: args.clone() }));
                apply(move |ctx, target: &mut T| {
                    let args = args.as_ref().map(|a| ctx.getter(Rc::clone(a)));
                    target.add_directive(make(Binding::Method {
                        name: method.clone(),
                        args,
                    }));
                    Ok(())
                })
            }
            (Some(Expr::Identifier(id)), Namespace::Model) => {
                let id = id.clone();
                apply(move |ctx, target: &mut T| {
                    let (_, keypath) = ctx.resolve(&id);
                    let keypath = keypath.unwrap_or_else(|| id.name.clone());
                    target.add_directive(make(Binding::Keypath(keypath)));
                    Ok(())
                })
            }
            // Model only binds plain keypaths.
            (_, Namespace::Model) => apply(|_, _: &mut T| Ok(())),
            (Some(node), Namespace::Lazy | Namespace::Transition) => {
                let node = node.clone();
                apply(move |ctx, target: &mut T| {
                    let value = ctx.eval(&node)?;
                    target.add_directive(make(Binding::Value(value)));
                    Ok(())
                })
            }
            (Some(node), _) => {
                let node = Rc::new(node.clone());
                apply(move |ctx, target: &mut T| {
                    let getter = ctx.getter(Rc::clone(&node));
                    target.add_directive(make(Binding::Getter(getter)));
                    Ok(())
                })
            }
            (None, _) => match d.children.as_deref() {
                Some(children) => {
                    let joined = self.text(children);
                    apply(move |ctx, target: &mut T| {
                        let value = Value::String(joined(ctx)?);
                        target.add_directive(make(Binding::Value(value)));
                        Ok(())
                    })
                }
                None => {
                    let value = d.value.clone().unwrap_or(Value::Bool(true));
                    apply(move |_, target: &mut T| {
                        target.add_directive(make(Binding::Value(value.clone())));
                        Ok(())
                    })
                }
            },
        }
    }

    // ---- string position ----

    /// Concatenation of a mixed value sequence.
    fn text(&self, nodes: &[Node]) -> Text {
        let parts: Vec<Text> = nodes.iter().map(|n| self.text_part(n)).collect();
        text(move |ctx| {
            let mut joined = String::new();
            for part in &parts {
                joined.push_str(&part(ctx)?);
            }
            Ok(joined)
        })
    }

    fn text_part(&self, node: &Node) -> Text {
        match node {
            Node::Text(t) => {
                let content = t.text.clone();
                text(move |_| Ok(content.clone()))
            }
            Node::Expression(x) => {
                let node = x.expr.clone();
                text(move |ctx| Ok(value::to_display(&ctx.eval(&node)?)))
            }
            Node::If(_) => {
                let arms = self.arms(node, |nodes| self.text(nodes));
                text(move |ctx| match select(ctx, &arms)? {
                    Some(part) => part(ctx),
                    None => Ok(String::new()),
                })
            }
            _ => text(|_| Ok(String::new())),
        }
    }

    fn content(&self, content: &Content) -> Text {
        match content {
            Content::Text(s) => {
                let s = s.clone();
                text(move |_| Ok(s.clone()))
            }
            Content::Expr(node) => {
                let node = node.clone();
                text(move |ctx| Ok(value::to_display(&ctx.eval(&node)?)))
            }
        }
    }

    /// String form of a special field such as `key` or `to`.
    fn optional_text(&self, attr: Option<&Attribute>) -> Option<Text> {
        let attr = attr?;
        let value = self.value(attr.value.as_ref(), attr.expr.as_ref(), attr.children.as_deref());
        Some(text(move |ctx| Ok(value::to_display(&value(ctx)?))))
    }

    fn value(&self, literal: Option<&Value>, node: Option<&Expr>, children: Option<&[Node]>) -> Eval {
        if let Some(node) = node {
            let node = node.clone();
            return eval(move |ctx| ctx.eval(&node));
        }
        if let Some(children) = children {
            let joined = self.text(children);
            return eval(move |ctx| joined(ctx).map(Value::String));
        }
        let literal = literal.cloned().unwrap_or(Value::Null);
        eval(move |_| Ok(literal.clone()))
    }
}

/// One scope per item of an array or entry of an object, keyed under
/// `keypath` when the list lives in the data tree.
pub(crate) fn list_scopes(list: Value, keypath: Option<&str>, index_name: Option<&str>) -> Vec<Scope> {
    let scope = |key: String, item: Value, index: Value| Scope {
        keypath: keypath.map(|k| join(k, &key)),
        item,
        index_name: index_name.map(str::to_string),
        index,
    };
    match list {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| scope(i.to_string(), item, Value::from(i)))
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| scope(key.clone(), item, Value::String(key)))
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn range_scopes(start: f64, end: f64, equal: bool, index_name: Option<&str>) -> Vec<Scope> {
    range(start, end, equal)
        .enumerate()
        .map(|(i, n)| Scope {
            keypath: None,
            item: value::number(n),
            index_name: index_name.map(str::to_string),
            index: Value::from(i),
        })
        .collect()
}

/// Renders the host partial `name` inside `scopes`. Slots claimed by the
/// partial are added to `slots`.
pub(crate) fn render_partial(
    host: &mut dyn Host,
    compiler: &Compiler,
    scopes: &[Scope],
    slots: &mut HashSet<String>,
    name: &str,
) -> Result<Vec<VNode>> {
    let mut ctx = Ctx::new(host, compiler);
    ctx.scopes = scopes.to_vec();
    ctx.slots = std::mem::take(slots);
    let mut out = Vec::new();
    let rendered = ctx
        .import(name)
        .and_then(|children| children.render(&mut ctx, &mut out));
    *slots = ctx.slots;
    rendered.map(|()| out)
}

/// Half-open (or closed, with `equal`) numeric range, descending when
/// `start > end`.
fn range(start: f64, end: f64, equal: bool) -> impl Iterator<Item = f64> {
    let finite = start.is_finite() && end.is_finite();
    let step = if start <= end { 1.0 } else { -1.0 };
    std::iter::successors(Some(start), move |n| Some(n + step)).take_while(move |n| {
        let inside = match (step > 0.0, equal) {
            (true, true) => *n <= end,
            (true, false) => *n < end,
            (false, true) => *n >= end,
            (false, false) => *n > end,
        };
        finite && inside
    })
}

fn bound_identifier(binding: Option<&String>, node: Option<&Expr>) -> Option<Identifier> {
    binding?;
    match node {
        Some(Expr::Identifier(id)) => Some(id.clone()),
        _ => None,
    }
}

/// Groups component children by target slot, keeping first-seen order.
/// `<template slot="x">` contributes its children rather than itself.
pub(crate) fn group_slots(children: &[Node]) -> Vec<(String, Vec<Node>)> {
    let mut groups: Vec<(String, Vec<Node>)> = Vec::new();
    for child in children {
        let (name, nodes) = match child {
            Node::Element(e) if e.slot.is_some() => {
                let name = e
                    .slot
                    .as_ref()
                    .and_then(|a| a.value.as_ref())
                    .map_or_else(|| DEFAULT_SLOT.to_string(), value::to_display);
                if e.tag == "template" && !e.is_component {
                    (name, e.children.clone().unwrap_or_default())
                } else {
                    (name, vec![child.clone()])
                }
            }
            other => (DEFAULT_SLOT.to_string(), vec![other.clone()]),
        };
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, group)) => group.extend(nodes),
            None => groups.push((name, nodes)),
        }
    }
    groups
}
