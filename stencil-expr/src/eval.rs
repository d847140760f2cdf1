use serde_json::Value;

use crate::ast::{BinaryOp, Identifier, Node};
use crate::value;

/// Scope glue supplied by the caller of [`evaluate`].
///
/// The evaluator handles operators and literals itself; anything that needs
/// the data tree goes through here so the caller can record dependencies.
pub trait Resolver {
    type Error;

    fn identifier(&mut self, identifier: &Identifier) -> Result<Value, Self::Error>;

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Self::Error>;

    /// Static member access on a computed value, `keypath` is dotted.
    fn member_static(&mut self, lead: Value, keypath: &str) -> Result<Value, Self::Error> {
        Ok(value::get_path(&lead, keypath).unwrap_or(Value::Null))
    }

    fn member_dynamic(&mut self, lead: Value, key: &Value) -> Result<Value, Self::Error> {
        Ok(value::member(&lead, key))
    }
}

pub fn evaluate<R: Resolver + ?Sized>(node: &Node, resolver: &mut R) -> Result<Value, R::Error> {
    match node {
        Node::Literal { value } => Ok(value.clone()),
        Node::Identifier(id) => resolver.identifier(id),
        Node::Member { lead, path } => {
            let mut current = evaluate(lead, resolver)?;
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
                            current = resolver.member_static(current, &pending)?;
                            pending.clear();
                        }
                        let key = evaluate(dynamic, resolver)?;
                        current = resolver.member_dynamic(current, &key)?;
                    }
                }
            }
            if !pending.is_empty() {
                current = resolver.member_static(current, &pending)?;
            }
            Ok(current)
        }
        Node::Call { name, args } => {
            let args = args
                .iter()
                .map(|a| evaluate(a, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            resolver.call(name, args)
        }
        Node::Unary { op, node } => Ok(value::unary(*op, &evaluate(node, resolver)?)),
        Node::Binary { op, left, right } => {
            let left = evaluate(left, resolver)?;
            match op {
                BinaryOp::And if !value::is_truthy(&left) => Ok(left),
                BinaryOp::Or if value::is_truthy(&left) => Ok(left),
                BinaryOp::And | BinaryOp::Or => evaluate(right, resolver),
                op => Ok(value::binary(*op, left, evaluate(right, resolver)?)),
            }
        }
        Node::Ternary { test, yes, no } => {
            if value::is_truthy(&evaluate(test, resolver)?) {
                evaluate(yes, resolver)
            } else {
                evaluate(no, resolver)
            }
        }
        Node::Array { nodes } => Ok(Value::Array(
            nodes
                .iter()
                .map(|n| evaluate(n, resolver))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Node::Object { keys, values } => {
            let values = values
                .iter()
                .map(|n| evaluate(n, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(value::object(keys, values))
        }
    }
}
