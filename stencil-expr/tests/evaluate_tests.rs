use std::collections::HashMap;

use quote::quote;
use serde_json::{Value, json};
use stencil_expr::{Glue, Identifier, Resolver, compile, evaluate, generate, value};

struct Data {
    root: Value,
    reads: Vec<String>,
    functions: HashMap<&'static str, fn(Vec<Value>) -> Value>,
}

impl Resolver for Data {
    type Error = String;

    fn identifier(&mut self, identifier: &Identifier) -> Result<Value, String> {
        self.reads.push(identifier.name.clone());
        Ok(value::get_path(&self.root, &identifier.name).unwrap_or(Value::Null))
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, String> {
        self.functions
            .get(name)
            .map(|f| f(args))
            .ok_or_else(|| format!("unknown function {name}"))
    }
}

fn data(root: Value) -> Data {
    let mut functions: HashMap<&'static str, fn(Vec<Value>) -> Value> = HashMap::new();
    functions.insert("upper", |args| {
        Value::from(value::to_display(&args[0]).to_uppercase())
    });
    Data {
        root,
        reads: Vec::new(),
        functions,
    }
}

#[test]
fn evaluates_against_resolver() {
    let mut d = data(json!({ "a": 2, "user": { "name": "tom" }, "list": [10, 20] }));

    let node = compile("a * 3 + 1").unwrap();
    assert_eq!(evaluate(&node, &mut d).unwrap(), json!(7));

    let node = compile("upper(user.name)").unwrap();
    assert_eq!(evaluate(&node, &mut d).unwrap(), json!("TOM"));

    let node = compile("list[a - 1]").unwrap();
    assert_eq!(evaluate(&node, &mut d).unwrap(), json!(20));

    assert!(d.reads.contains(&"user.name".to_string()));
}

#[test]
fn short_circuit_skips_right_side() {
    let mut d = data(json!({ "flag": false }));
    let node = compile("flag && missing").unwrap();
    assert_eq!(evaluate(&node, &mut d).unwrap(), json!(false));
    assert_eq!(d.reads, vec!["flag".to_string()]);
}

#[test]
fn unknown_function_surfaces_resolver_error() {
    let mut d = data(json!({}));
    let node = compile("nope(1)").unwrap();
    assert_eq!(evaluate(&node, &mut d), Err("unknown function nope".to_string()));
}

struct Names;

impl Glue for Names {
    fn identifier(&self, identifier: &Identifier) -> proc_macro2::TokenStream {
        let name = &identifier.name;
        quote! { lookup(#name) }
    }
    fn member_static(&self, lead: proc_macro2::TokenStream, keypath: &str) -> proc_macro2::TokenStream {
        quote! { member(#lead, #keypath) }
    }
    fn member_dynamic(
        &self,
        lead: proc_macro2::TokenStream,
        key: proc_macro2::TokenStream,
    ) -> proc_macro2::TokenStream {
        quote! { index(#lead, #key) }
    }
    fn call(&self, name: &str, args: Vec<proc_macro2::TokenStream>) -> proc_macro2::TokenStream {
        quote! { call(#name, vec![#(#args),*]) }
    }
}

#[test]
fn generate_routes_through_glue() {
    let tokens = generate(&compile("upper(list[i].name) + '!'").unwrap(), &Names).to_string();
    assert!(tokens.contains("call (\"upper\""), "{tokens}");
    assert!(tokens.contains("index (lookup (\"list\")"), "{tokens}");
    assert!(tokens.contains("member ("), "{tokens}");
    assert!(tokens.contains("BinaryOp :: Add"), "{tokens}");
}
