//! Source generator.
//!
//! Lowers a compiled tree to the tokens of a Rust closure. The closure takes
//! the runtime helpers as positional parameters (see [`crate::abi`]) and
//! returns the rendered node list, so precompiled templates carry no
//! dependency on this crate's internals beyond the helper signatures.
//!
//! Identifiers come from a [`Naming`] profile. Two profiles produce the same
//! program up to a consistent renaming of helpers and locals.

use std::collections::HashMap;
use std::fmt;

use proc_macro2::{Ident, Span, TokenStream};
use quote::{ToTokens, format_ident, quote};
use serde_json::Value;
use stencil_expr::{Glue, Identifier, Node as Expr};
use thiserror::Error;
use tracing::debug;

use crate::ast::{self, Attribute, Content, Each, Namespace, Node};
use crate::naming::{Helper, Local, Naming};
use crate::parser::CHILDREN;
use crate::render::group_slots;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("partial `{0}` imports itself")]
    RecursivePartial(String),
    #[error("generated code does not parse: {0}")]
    Invalid(#[from] syn::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// A generated render closure, parsed and printed.
pub struct GeneratedSource {
    pub closure: syn::ExprClosure,
    pub text: String,
}

impl fmt::Debug for GeneratedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedSource")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for GeneratedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub(crate) fn generate(nodes: &[Node], naming: &dyn Naming) -> Result<GeneratedSource> {
    let mut generator = SourceGenerator::new(naming);
    let body = generator.children(nodes)?;

    let names: Vec<Ident> = Helper::ALL.iter().map(|h| generator.helper(*h)).collect();
    let params = Helper::ALL.iter().zip(&names).map(|(helper, name)| {
        let ty = format_ident!("{}", helper.ident());
        quote! { #name: ::stencil_compiler::abi::#ty<'_> }
    });
    let n = generator.local(Local::Nodes);

    let tokens = quote! {
        move |#(#params),*| -> ::stencil_compiler::abi::Result<::std::vec::Vec<::stencil_dom::VNode>> {
            let _ = (#(&#names),*);
            let mut #n: ::std::vec::Vec<::stencil_dom::VNode> = ::std::vec::Vec::new();
            #body
            ::std::result::Result::Ok(#n)
        }
    };
    let closure: syn::ExprClosure = syn::parse2(tokens)?;
    let text = closure.to_token_stream().to_string();
    debug!(len = text.len(), statics = generator.statics, "generated template source");
    Ok(GeneratedSource { closure, text })
}

/// Expression glue. Identifiers and calls go through the helpers in scope,
/// which inside a getter thunk are the thunk's own parameters.
struct ExprGlue<'n> {
    naming: &'n dyn Naming,
}

impl ExprGlue<'_> {
    fn helper(&self, helper: Helper) -> Ident {
        Ident::new(self.naming.helper(helper), Span::call_site())
    }
}

impl Glue for ExprGlue<'_> {
    fn identifier(&self, id: &Identifier) -> TokenStream {
        let lookup = self.helper(Helper::Lookup);
        let Identifier {
            name,
            lookup: walk,
            root,
            offset,
        } = id;
        quote! { #lookup(#name, #walk, #root, #offset) }
    }

    fn member_static(&self, lead: TokenStream, keypath: &str) -> TokenStream {
        let member = self.helper(Helper::MemberStatic);
        quote! { #member(#lead, #keypath) }
    }

    fn member_dynamic(&self, lead: TokenStream, key: TokenStream) -> TokenStream {
        let member = self.helper(Helper::MemberDynamic);
        quote! { #member(#lead, #key) }
    }

    fn call(&self, name: &str, args: Vec<TokenStream>) -> TokenStream {
        let call = self.helper(Helper::Call);
        quote! { #call(#name, ::std::vec![#(#args),*])? }
    }
}

struct SourceGenerator<'n> {
    naming: &'n dyn Naming,
    /// Local partials in registration order; later definitions win.
    partials: HashMap<String, Vec<Node>>,
    /// Partials being inlined, innermost last.
    inlining: Vec<String>,
    statics: usize,
    /// Inside a hoisted list, where nothing is hoisted again.
    in_static: bool,
}

impl<'n> SourceGenerator<'n> {
    fn new(naming: &'n dyn Naming) -> Self {
        Self {
            naming,
            partials: HashMap::new(),
            inlining: Vec::new(),
            statics: 0,
            in_static: false,
        }
    }

    fn helper(&self, helper: Helper) -> Ident {
        Ident::new(self.naming.helper(helper), Span::call_site())
    }

    fn local(&self, local: Local) -> Ident {
        Ident::new(self.naming.local(local), Span::call_site())
    }

    fn expr(&self, node: &Expr) -> TokenStream {
        stencil_expr::generate(node, &ExprGlue { naming: self.naming })
    }

    /// Display string of an expression.
    fn display(&self, value: TokenStream) -> TokenStream {
        let to_display = self.helper(Helper::ToDisplay);
        quote! { #to_display(&#value) }
    }

    fn truthy(&self, node: &Expr) -> TokenStream {
        let test = self.expr(node);
        quote! { ::stencil_expr::value::is_truthy(&#test) }
    }

    /// Deferred evaluation of `node` against the scope current at creation.
    fn getter(&self, node: &Expr) -> TokenStream {
        let getter = self.helper(Helper::Getter);
        let params = Helper::THUNK.iter().map(|helper| {
            let name = self.helper(*helper);
            let ty = format_ident!("{}", helper.ident());
            quote! { #name: ::stencil_compiler::abi::#ty<'_> }
        });
        let body = self.expr(node);
        quote! {
            #getter(::std::rc::Rc::new(
                move |#(#params),*| -> ::stencil_compiler::abi::Result<::serde_json::Value> {
                    ::std::result::Result::Ok(#body)
                }
            ))
        }
    }

    /// Wraps statements that only depend on the template in a list built
    /// once per program.
    fn hoist(&mut self, f: impl FnOnce(&mut Self) -> Result<TokenStream>) -> Result<TokenStream> {
        self.in_static = true;
        let statements = f(self);
        self.in_static = false;
        let statements = statements?;

        let id = self.statics;
        self.statics += 1;
        let static_list = self.helper(Helper::StaticList);
        let n = self.local(Local::Nodes);
        Ok(quote! {
            #n.extend(#static_list(#id, &|| {
                let mut #n = ::std::vec::Vec::new();
                #statements
                #n
            }));
        })
    }

    // ---- node position ----

    /// Statements pushing `nodes` into the node list in scope.
    fn children(&mut self, nodes: &[Node]) -> Result<TokenStream> {
        if !self.in_static && !nodes.is_empty() && nodes.iter().all(Node::is_static) {
            return self.hoist(|this| this.statements(nodes));
        }
        self.statements(nodes)
    }

    fn statements(&mut self, nodes: &[Node]) -> Result<TokenStream> {
        let mut out = TokenStream::new();
        for node in nodes {
            out.extend(self.node(node)?);
        }
        Ok(out)
    }

    /// Fresh node list filled by `nodes`, as a block expression.
    fn list(&mut self, nodes: Option<&[Node]>) -> Result<TokenStream> {
        let n = self.local(Local::Nodes);
        let body = match nodes {
            Some(nodes) => self.children(nodes)?,
            None => TokenStream::new(),
        };
        if body.is_empty() {
            return Ok(quote! { ::std::vec::Vec::new() });
        }
        Ok(quote! {
            {
                let mut #n: ::std::vec::Vec<::stencil_dom::VNode> = ::std::vec::Vec::new();
                #body
                #n
            }
        })
    }

    fn node(&mut self, node: &Node) -> Result<TokenStream> {
        let n = self.local(Local::Nodes);
        let tokens = match node {
            Node::Text(t) => {
                let create_text = self.helper(Helper::CreateText);
                let text = &t.text;
                quote! { #n.push(#create_text(::std::string::String::from(#text))); }
            }
            Node::Expression(x) if x.expr.static_keypath() == Some(CHILDREN) => {
                let render_slot = self.helper(Helper::RenderSlot);
                let slot = stencil_dom::DEFAULT_SLOT;
                quote! { #n.extend(#render_slot(#slot)?.unwrap_or_default()); }
            }
            Node::Expression(x) => {
                let create_text = self.helper(Helper::CreateText);
                let text = self.display(self.expr(&x.expr));
                quote! { #n.push(#create_text(#text)); }
            }
            Node::Element(e) if e.is_static && !self.in_static => self.hoist(|this| this.element(e))?,
            Node::Element(e) => self.element(e)?,
            Node::If(b) => {
                let arms = self.arms(node, |this, nodes| this.children(nodes))?;
                let stump = if b.stump {
                    let create_comment = self.helper(Helper::CreateComment);
                    quote! { #n.push(#create_comment(::std::string::String::new())); }
                } else {
                    TokenStream::new()
                };
                self.chain(arms, stump)
            }
            Node::Each(each) => self.each(each)?,
            Node::Import(import) => self.import(&import.name)?,
            Node::Partial(partial) => {
                self.partials.insert(
                    partial.name.clone(),
                    partial.children.clone().unwrap_or_default(),
                );
                TokenStream::new()
            }
            Node::ElseIf(_)
            | Node::Else(_)
            | Node::Attribute(_)
            | Node::Property(_)
            | Node::Style(_)
            | Node::Directive(_)
            | Node::Spread(_) => TokenStream::new(),
        };
        Ok(tokens)
    }

    /// Local partials are inlined; anything else is left to the runtime.
    fn import(&mut self, name: &str) -> Result<TokenStream> {
        let Some(nodes) = self.partials.get(name).cloned() else {
            let n = self.local(Local::Nodes);
            let import = self.helper(Helper::Import);
            return Ok(quote! { #n.extend(#import(#name)?); });
        };
        if self.inlining.iter().any(|p| p == name) {
            return Err(SourceError::RecursivePartial(name.to_string()));
        }
        self.inlining.push(name.to_string());
        let body = self.children(&nodes);
        self.inlining.pop();
        let body = body?;
        Ok(quote! { { #body } })
    }

    /// Test and body of each link of an if chain. `Else` has no test.
    fn arms(
        &mut self,
        head: &Node,
        mut body: impl FnMut(&mut Self, &[Node]) -> Result<TokenStream>,
    ) -> Result<Vec<(Option<TokenStream>, Option<TokenStream>)>> {
        let mut arms = Vec::new();
        let mut current = Some(head);
        while let Some(node) = current {
            if let Node::If(b) | Node::ElseIf(b) | Node::Else(b) = node {
                let test = b.expr.as_ref().map(|e| self.truthy(e));
                let tokens = match b.children.as_deref() {
                    Some(nodes) => Some(body(self, nodes)?),
                    None => None,
                };
                arms.push((test, tokens));
            }
            current = node.next();
        }
        Ok(arms)
    }

    /// `if`/`else if`/`else` over the arms. An arm without a body, or no
    /// arm matching, runs `default`.
    fn chain(
        &self,
        arms: Vec<(Option<TokenStream>, Option<TokenStream>)>,
        default: TokenStream,
    ) -> TokenStream {
        let mut tail = default.clone();
        for (test, body) in arms.into_iter().rev() {
            let body = body.unwrap_or_else(|| default.clone());
            tail = match test {
                Some(test) => quote! { if #test { #body } else { #tail } },
                None => body,
            };
        }
        tail
    }

    fn each(&mut self, each: &Each) -> Result<TokenStream> {
        let body = self.local(Local::Body);
        let index = option_str(each.index.as_deref());
        let children = match each.children.as_deref() {
            Some(nodes) => self.children(nodes)?,
            None => TokenStream::new(),
        };
        let iterate = match &each.to {
            Some(to) => {
                let range = self.helper(Helper::Range);
                let from = self.expr(&each.from);
                let to = self.expr(to);
                let equal = each.equal;
                quote! { #range(#from, #to, #equal, #index, &mut #body)? }
            }
            None => {
                let each_helper = self.helper(Helper::Each);
                let list = self.expr(&each.from);
                let keypath = match &each.from {
                    Expr::Identifier(id) => option_str(Some(&relative_keypath(id))),
                    _ => option_str(None),
                };
                quote! { #each_helper(#list, #keypath, #index, &mut #body)? }
            }
        };
        let closure = quote! {
            let mut #body = || -> ::stencil_compiler::abi::Result<()> {
                #children
                ::std::result::Result::Ok(())
            };
        };
        match each.next.as_deref() {
            Some(Node::Else(ast::Branch {
                children: Some(nodes),
                ..
            })) => {
                let otherwise = self.children(nodes)?;
                let count = self.local(Local::Current);
                Ok(quote! {
                    {
                        let #count = { #closure #iterate };
                        if #count == 0 {
                            #otherwise
                        }
                    }
                })
            }
            _ => Ok(quote! {
                {
                    #closure
                    #iterate;
                }
            }),
        }
    }

    fn element(&mut self, e: &ast::Element) -> Result<TokenStream> {
        if e.is_component {
            return self.component(e);
        }
        let n = self.local(Local::Nodes);
        let current = self.local(Local::Current);
        let tokens = match e.tag.as_str() {
            "template" => {
                let create_fragment = self.helper(Helper::CreateFragment);
                let list = self.list(e.children.as_deref())?;
                quote! {
                    {
                        let #current = #list;
                        #n.push(#create_fragment(#current));
                    }
                }
            }
            "slot" => self.slot(e)?,
            "portal" => {
                let create_portal = self.helper(Helper::CreatePortal);
                let to = self
                    .special(e.to.as_ref())
                    .unwrap_or_else(|| quote! { ::std::string::String::new() });
                let list = self.list(e.children.as_deref())?;
                quote! {
                    {
                        let #current = #list;
                        #n.push(#create_portal(#to, #current));
                    }
                }
            }
            _ => self.native(e)?,
        };
        Ok(tokens)
    }

    fn native(&mut self, e: &ast::Element) -> Result<TokenStream> {
        let n = self.local(Local::Nodes);
        let el = self.local(Local::Element);
        let create_element = self.helper(Helper::CreateElement);
        let ast::Element {
            tag,
            is_svg,
            is_style,
            is_option,
            ..
        } = e;

        let mut body = self.identity(&el, e);
        body.extend(self.attrs(&el, false, e.attrs.as_deref())?);
        if let Some(text) = &e.text {
            let text = self.content(text);
            body.extend(quote! { #el.text = ::std::option::Option::Some(#text); });
        }
        if let Some(html) = &e.html {
            let html = self.content(html);
            body.extend(quote! { #el.html = ::std::option::Option::Some(#html); });
        }
        if let Some(children) = e.children.as_deref() {
            let list = self.list(Some(children))?;
            body.extend(quote! { #el.children = #list; });
        }

        Ok(quote! {
            {
                let mut #el = #create_element(#tag, #is_svg, #is_style, #is_option);
                #body
                #n.push(::stencil_dom::VNode::Element(#el));
            }
        })
    }

    fn component(&mut self, e: &ast::Element) -> Result<TokenStream> {
        let n = self.local(Local::Nodes);
        let c = self.local(Local::Component);
        let create_component = self.helper(Helper::CreateComponent);
        let tag = match e.tag.strip_prefix('$') {
            Some(name) => self.expr(&Expr::Identifier(Identifier::new(name))),
            None => stencil_expr::literal(&Value::from(e.tag.as_str())),
        };

        let mut body = self.identity(&c, e);
        body.extend(self.attrs(&c, true, e.attrs.as_deref())?);
        for (slot, nodes) in group_slots(e.children.as_deref().unwrap_or_default()) {
            let list = self.list(Some(nodes.as_slice()))?;
            body.extend(quote! {
                {
                    let #n = #list;
                    if !#n.is_empty() {
                        #c.add_slot(#slot, #n);
                    }
                }
            });
        }

        Ok(quote! {
            {
                let mut #c = #create_component(#tag)?;
                #body
                #n.push(::stencil_dom::VNode::Component(#c));
            }
        })
    }

    fn slot(&mut self, e: &ast::Element) -> Result<TokenStream> {
        let n = self.local(Local::Nodes);
        let current = self.local(Local::Current);
        let content = self.local(Local::Content);
        let render_slot = self.helper(Helper::RenderSlot);
        let name = self.special(e.name.as_ref()).unwrap_or_else(|| {
            let slot = stencil_dom::DEFAULT_SLOT;
            quote! { ::std::string::String::from(#slot) }
        });
        let fallback = self.list(e.children.as_deref())?;
        Ok(quote! {
            {
                let #current: ::std::string::String = #name;
                let #content = match #render_slot(&#current)? {
                    ::std::option::Option::Some(#content) => #content,
                    ::std::option::Option::None => #fallback,
                };
                #n.push(::stencil_dom::VNode::Slot {
                    name: #current,
                    children: #content,
                });
            }
        })
    }

    /// `key` and `ref` of an element or component.
    fn identity(&self, target: &Ident, e: &ast::Element) -> TokenStream {
        let mut out = TokenStream::new();
        if let Some(key) = self.special(e.key.as_ref()) {
            out.extend(quote! { ::stencil_dom::Target::set_key(&mut #target, #key); });
        }
        if let Some(ref_name) = self.special(e.ref_name.as_ref()) {
            out.extend(quote! { ::stencil_dom::Target::set_ref(&mut #target, #ref_name); });
        }
        out
    }

    // ---- attribute position ----

    fn attrs(&self, target: &Ident, component: bool, nodes: Option<&[Node]>) -> Result<TokenStream> {
        let mut out = TokenStream::new();
        for node in nodes.unwrap_or_default() {
            out.extend(self.attr(target, component, node)?);
        }
        Ok(out)
    }

    fn attr(&self, target: &Ident, component: bool, node: &Node) -> Result<TokenStream> {
        let tokens = match node {
            Node::Attribute(a) => {
                let name = &a.name;
                let value = self.value(a.value.as_ref(), a.expr.as_ref(), a.children.as_deref());
                let binding = self.binding(target, name, a.binding.as_ref(), a.expr.as_ref());
                let set = if component {
                    let set_prop = self.helper(Helper::SetProp);
                    quote! { #set_prop(&mut #target, #name, #value); }
                } else {
                    let set_attribute = self.helper(Helper::SetAttribute);
                    let ns = option_str(a.ns.as_deref());
                    quote! { #set_attribute(&mut #target, #name, #ns, #value); }
                };
                quote! { #binding #set }
            }
            Node::Property(p) => {
                let name = &p.name;
                let value = self.value(p.value.as_ref(), p.expr.as_ref(), p.children.as_deref());
                let binding = self.binding(target, name, p.binding.as_ref(), p.expr.as_ref());
                let set = if component {
                    let set_prop = self.helper(Helper::SetProp);
                    let hint = format_ident!("{}", p.hint.ident());
                    quote! {
                        #set_prop(
                            &mut #target,
                            #name,
                            ::stencil_compiler::platform::Hint::#hint.coerce(#value),
                        );
                    }
                } else {
                    let set_property = self.helper(Helper::SetProperty);
                    let hint = format_ident!("{}", p.hint.ident());
                    quote! {
                        #set_property(&mut #target, #name, ::stencil_compiler::platform::Hint::#hint, #value);
                    }
                };
                quote! { #binding #set }
            }
            Node::Style(s) if !component => {
                let set_style = self.helper(Helper::SetStyle);
                let value = match (&s.parsed, &s.expr, &s.children) {
                    (Some(parsed), _, _) => {
                        let css = parsed
                            .iter()
                            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                            .collect();
                        stencil_expr::literal(&Value::Object(css))
                    }
                    (None, Some(node), _) => self.expr(node),
                    (None, None, Some(children)) => self.joined(children),
                    (None, None, None) => return Ok(TokenStream::new()),
                };
                quote! { #set_style(&mut #target, #value); }
            }
            Node::Directive(d) => self.directive(target, d),
            Node::Spread(spread) if component => {
                let helper = self.helper(Helper::Spread);
                let value = self.expr(&spread.expr);
                quote! { #helper(&mut #target, #value)?; }
            }
            Node::If(_) => {
                let mut arms = Vec::new();
                let mut current = Some(node);
                while let Some(link) = current {
                    if let Node::If(b) | Node::ElseIf(b) | Node::Else(b) = link {
                        let test = b.expr.as_ref().map(|e| self.truthy(e));
                        let body = match b.children.as_deref() {
                            Some(nodes) => Some(self.attrs(target, component, Some(nodes))?),
                            None => None,
                        };
                        arms.push((test, body));
                    }
                    current = link.next();
                }
                self.chain(arms, TokenStream::new())
            }
            _ => TokenStream::new(),
        };
        Ok(tokens)
    }

    /// `set_binding` for a value that is a plain identifier.
    fn binding(
        &self,
        target: &Ident,
        name: &str,
        binding: Option<&String>,
        node: Option<&Expr>,
    ) -> TokenStream {
        match (binding, node) {
            (Some(_), Some(Expr::Identifier(id))) => {
                let set_binding = self.helper(Helper::SetBinding);
                let keypath = relative_keypath(id);
                quote! { #set_binding(&mut #target, #name, #keypath); }
            }
            _ => TokenStream::new(),
        }
    }

    fn directive(&self, target: &Ident, d: &ast::Directive) -> TokenStream {
        let name = &d.name;
        let modifier = option_str(d.modifier.as_deref());
        match d.ns {
            Namespace::Model => {
                let model = self.helper(Helper::Model);
                match &d.expr {
                    Some(Expr::Identifier(id)) => {
                        let keypath = relative_keypath(id);
                        quote! { #model(&mut #target, #keypath); }
                    }
                    _ => TokenStream::new(),
                }
            }
            Namespace::Lazy => {
                let lazy = self.helper(Helper::Lazy);
                let value = self.directive_value(d);
                quote! { #lazy(&mut #target, #name, #value); }
            }
            Namespace::Transition => {
                let transition = self.helper(Helper::Transition);
                let value = self.directive_value(d);
                quote! { #transition(&mut #target, #value); }
            }
            Namespace::Event => {
                let on = self.helper(Helper::On);
                let binding = match &d.expr {
                    Some(Expr::Call { name, args }) => {
                        let args = if args.is_empty() {
                            quote! { ::std::option::Option::None }
                        } else {
                            let getter = self.getter(&Expr::Array { nodes: args.clone() });
                            quote! { ::std::option::Option::Some(#getter) }
                        };
                        quote! {
                            ::stencil_dom::Binding::Method {
                                name: ::std::string::String::from(#name),
                                args: #args,
                            }
                        }
                    }
                    _ => self.directive_binding(d),
                };
                quote! { #on(&mut #target, #name, #modifier, #binding); }
            }
            Namespace::Custom => {
                let directive = self.helper(Helper::Directive);
                let binding = self.directive_binding(d);
                quote! { #directive(&mut #target, #name, #modifier, #binding); }
            }
        }
    }

    /// Evaluated directive value; `true` for a bare directive.
    fn directive_value(&self, d: &ast::Directive) -> TokenStream {
        match (&d.expr, d.children.as_deref()) {
            (Some(node), _) => self.expr(node),
            (None, Some(children)) => self.joined(children),
            (None, None) => stencil_expr::literal(d.value.as_ref().unwrap_or(&Value::Bool(true))),
        }
    }

    fn directive_binding(&self, d: &ast::Directive) -> TokenStream {
        match &d.expr {
            Some(node) => {
                let getter = self.getter(node);
                quote! { ::stencil_dom::Binding::Getter(#getter) }
            }
            None => {
                let value = self.directive_value(d);
                quote! { ::stencil_dom::Binding::Value(#value) }
            }
        }
    }

    // ---- string position ----

    fn value(&self, literal: Option<&Value>, node: Option<&Expr>, children: Option<&[Node]>) -> TokenStream {
        match (node, children) {
            (Some(node), _) => self.expr(node),
            (None, Some(children)) => self.joined(children),
            (None, None) => stencil_expr::literal(literal.unwrap_or(&Value::Null)),
        }
    }

    /// String value concatenating a mixed sequence.
    fn joined(&self, nodes: &[Node]) -> TokenStream {
        let buffer = self.local(Local::Buffer);
        let parts = self.parts(nodes);
        quote! {
            {
                let mut #buffer = ::std::string::String::new();
                #parts
                ::serde_json::Value::String(#buffer)
            }
        }
    }

    fn parts(&self, nodes: &[Node]) -> TokenStream {
        let buffer = self.local(Local::Buffer);
        let mut out = TokenStream::new();
        for node in nodes {
            match node {
                Node::Text(t) => {
                    let text = &t.text;
                    out.extend(quote! { #buffer.push_str(#text); });
                }
                Node::Expression(x) => {
                    let text = self.display(self.expr(&x.expr));
                    out.extend(quote! { #buffer.push_str(&#text); });
                }
                Node::If(_) => {
                    let mut arms = Vec::new();
                    let mut current = Some(node);
                    while let Some(link) = current {
                        if let Node::If(b) | Node::ElseIf(b) | Node::Else(b) = link {
                            let test = b.expr.as_ref().map(|e| self.truthy(e));
                            arms.push((test, b.children.as_deref().map(|c| self.parts(c))));
                        }
                        current = link.next();
                    }
                    out.extend(self.chain(arms, TokenStream::new()));
                }
                _ => {}
            }
        }
        out
    }

    fn content(&self, content: &Content) -> TokenStream {
        match content {
            Content::Text(s) => quote! { ::std::string::String::from(#s) },
            Content::Expr(node) => self.display(self.expr(node)),
        }
    }

    /// String form of a special field such as `key` or `to`.
    fn special(&self, attr: Option<&Attribute>) -> Option<TokenStream> {
        let attr = attr?;
        let value = self.value(attr.value.as_ref(), attr.expr.as_ref(), attr.children.as_deref());
        Some(self.display(value))
    }
}

fn option_str(value: Option<&str>) -> TokenStream {
    match value {
        Some(s) => quote! { ::std::option::Option::Some(#s) },
        None => quote! { ::std::option::Option::None },
    }
}

/// Keypath of an identifier relative to the scope it appears in: `~/` for
/// the root, one `../` per parent hop, `./` when the lookup must not walk
/// outward.
pub(crate) fn relative_keypath(id: &Identifier) -> String {
    if id.root {
        return format!("~/{}", id.name);
    }
    if id.offset > 0 {
        return format!("{}{}", "../".repeat(id.offset), id.name);
    }
    if id.lookup {
        id.name.clone()
    } else {
        format!("./{}", id.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_keypath_prefixes() {
        let mut id = Identifier::new("user.name");
        assert_eq!(relative_keypath(&id), "user.name");
        id.offset = 2;
        assert_eq!(relative_keypath(&id), "../../user.name");
        id.offset = 0;
        id.root = true;
        assert_eq!(relative_keypath(&id), "~/user.name");
        id.root = false;
        id.lookup = false;
        assert_eq!(relative_keypath(&id), "./user.name");
    }
}
