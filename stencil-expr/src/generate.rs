//! Rust token generation for expression interiors.
//!
//! Literals and operators lower to calls into [`crate::value`]; identifiers,
//! member access and calls are handed to the caller's [`Glue`], which knows
//! the names of the runtime helpers in scope.

use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use serde_json::Value;

use crate::ast::{BinaryOp, Identifier, Node};

pub trait Glue {
    fn identifier(&self, identifier: &Identifier) -> TokenStream;
    fn member_static(&self, lead: TokenStream, keypath: &str) -> TokenStream;
    fn member_dynamic(&self, lead: TokenStream, key: TokenStream) -> TokenStream;
    fn call(&self, name: &str, args: Vec<TokenStream>) -> TokenStream;
}

/// Tokens building `value` as a `serde_json::Value`.
pub fn literal(value: &Value) -> TokenStream {
    match value {
        Value::Null => quote! { ::serde_json::Value::Null },
        Value::Bool(b) => quote! { ::serde_json::Value::Bool(#b) },
        Value::String(s) => quote! { ::serde_json::Value::from(#s) },
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                let lit = Literal::i64_suffixed(i);
                quote! { ::serde_json::Value::from(#lit) }
            }
            None => {
                let lit = Literal::f64_suffixed(n.as_f64().unwrap_or(0.0));
                quote! { ::serde_json::Value::from(#lit) }
            }
        },
        composite => {
            let json = composite.to_string();
            quote! { ::stencil_expr::value::parse_literal(#json) }
        }
    }
}

pub fn generate<G: Glue + ?Sized>(node: &Node, glue: &G) -> TokenStream {
    match node {
        Node::Literal { value } => literal(value),
        Node::Identifier(id) => glue.identifier(id),
        Node::Member { lead, path } => {
            let mut current = generate(lead, glue);
            let mut pending = String::new();
            for segment in path {
                match segment {
                    Node::Literal {
                        value: Value::String(key),
                    } => {
                        if !pending.is_empty() {
                            pending.push('.');
                        }
                        pending.push_str(key);
                    }
                    dynamic => {
                        if !pending.is_empty() {
                            current = glue.member_static(current, &pending);
                            pending.clear();
                        }
                        current = glue.member_dynamic(current, generate(dynamic, glue));
                    }
                }
            }
            if !pending.is_empty() {
                current = glue.member_static(current, &pending);
            }
            current
        }
        Node::Call { name, args } => {
            let args = args.iter().map(|a| generate(a, glue)).collect();
            glue.call(name, args)
        }
        Node::Unary { op, node } => {
            let op = format_ident!("{}", op.ident());
            let node = generate(node, glue);
            quote! { ::stencil_expr::value::unary(::stencil_expr::UnaryOp::#op, &#node) }
        }
        Node::Binary { op, left, right } => {
            let l = generate(left, glue);
            let r = generate(right, glue);
            match op {
                BinaryOp::And => quote! {
                    { let left = #l; if ::stencil_expr::value::is_truthy(&left) { #r } else { left } }
                },
                BinaryOp::Or => quote! {
                    { let left = #l; if ::stencil_expr::value::is_truthy(&left) { left } else { #r } }
                },
                op => {
                    let op = format_ident!("{}", op.ident());
                    quote! { ::stencil_expr::value::binary(::stencil_expr::BinaryOp::#op, #l, #r) }
                }
            }
        }
        Node::Ternary { test, yes, no } => {
            let test = generate(test, glue);
            let yes = generate(yes, glue);
            let no = generate(no, glue);
            quote! { if ::stencil_expr::value::is_truthy(&#test) { #yes } else { #no } }
        }
        Node::Array { nodes } => {
            let items: Vec<TokenStream> = nodes.iter().map(|n| generate(n, glue)).collect();
            quote! { ::serde_json::Value::Array(vec![#(#items),*]) }
        }
        Node::Object { keys, values } => {
            let values: Vec<TokenStream> = values.iter().map(|n| generate(n, glue)).collect();
            quote! {
                ::stencil_expr::value::object(
                    &[#(::std::string::String::from(#keys)),*],
                    vec![#(#values),*],
                )
            }
        }
    }
}
