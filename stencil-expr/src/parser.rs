use pest::Parser;
use pest::iterators::Pair;
use serde_json::Value;

use crate::ast::{BinaryOp, Identifier, Node, UnaryOp};
use crate::error::{ExprError, Result};
use crate::value;

#[derive(pest_derive::Parser)]
#[grammar = "expression.pest"]
struct ExpressionParser;

/// Parses one expression into an AST.
///
/// Sub-expressions made only of literals are folded, so `1 + 1` comes back
/// as the literal `2` and `-1` as a negative number literal.
pub fn compile(text: &str) -> Result<Node> {
    if text.trim().is_empty() {
        return Err(ExprError::Empty);
    }

    let mut pairs = ExpressionParser::parse(Rule::expression, text).map_err(|e| ExprError::Syntax {
        text: text.to_string(),
        message: e.to_string(),
    })?;
    let root = pairs.next().ok_or(ExprError::Empty)?;
    debug_assert!(root.as_rule() == Rule::expression);

    // `expression` holds the top `ternary` followed by EOI.
    let top = root.into_inner().next().ok_or(ExprError::Empty)?;
    build(top, text)
}

fn syntax(text: &str, message: impl Into<String>) -> ExprError {
    ExprError::Syntax {
        text: text.to_string(),
        message: message.into(),
    }
}

fn next<'a>(inner: &mut pest::iterators::Pairs<'a, Rule>, text: &str) -> Result<Pair<'a, Rule>> {
    inner.next().ok_or_else(|| syntax(text, "unexpected end of expression"))
}

fn build(pair: Pair<Rule>, text: &str) -> Result<Node> {
    match pair.as_rule() {
        Rule::ternary => {
            let mut inner = pair.into_inner();
            let test = build(next(&mut inner, text)?, text)?;
            match (inner.next(), inner.next()) {
                (Some(yes), Some(no)) => Ok(fold_ternary(test, build(yes, text)?, build(no, text)?)),
                _ => Ok(test),
            }
        }
        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::relational
        | Rule::additive
        | Rule::multiplicative => {
            let mut inner = pair.into_inner();
            let mut left = build(next(&mut inner, text)?, text)?;
            while let Some(op) = inner.next() {
                let op = BinaryOp::from_symbol(op.as_str())
                    .ok_or_else(|| syntax(text, format!("unknown operator `{}`", op.as_str())))?;
                let right = build(next(&mut inner, text)?, text)?;
                left = fold_binary(op, left, right);
            }
            Ok(left)
        }
        Rule::unary => {
            let mut ops = Vec::new();
            let mut operand = None;
            for p in pair.into_inner() {
                match p.as_rule() {
                    Rule::unary_op => ops.push(match p.as_str() {
                        "!" => UnaryOp::Not,
                        "-" => UnaryOp::Minus,
                        _ => UnaryOp::Plus,
                    }),
                    _ => operand = Some(build(p, text)?),
                }
            }
            let mut node = operand.ok_or_else(|| syntax(text, "missing operand"))?;
            for op in ops.into_iter().rev() {
                node = fold_unary(op, node);
            }
            Ok(node)
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut node = build(next(&mut inner, text)?, text)?;
            for suffix in inner {
                node = match suffix.as_rule() {
                    Rule::member => {
                        let name = next(&mut suffix.into_inner(), text)?;
                        node.with_segment(Node::literal(name.as_str()))
                    }
                    Rule::index => {
                        let key = build(next(&mut suffix.into_inner(), text)?, text)?;
                        node.with_segment(key)
                    }
                    Rule::call => {
                        let args = suffix
                            .into_inner()
                            .map(|p| build(p, text))
                            .collect::<Result<Vec<_>>>()?;
                        match node {
                            Node::Identifier(id) if !id.name.is_empty() && !id.root && id.offset == 0 => {
                                Node::Call { name: id.name, args }
                            }
                            other => {
                                return Err(ExprError::InvalidCallee {
                                    text: text.to_string(),
                                    callee: format!("{other:?}"),
                                });
                            }
                        }
                    }
                    _ => return Err(syntax(text, "unexpected postfix")),
                };
            }
            Ok(node)
        }
        Rule::group => build(next(&mut pair.into_inner(), text)?, text),
        Rule::number => {
            let n: f64 = pair
                .as_str()
                .parse()
                .map_err(|_| syntax(text, format!("invalid number `{}`", pair.as_str())))?;
            Ok(Node::literal(value::number(n)))
        }
        Rule::string => {
            let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Node::literal(unescape(body)))
        }
        Rule::boolean => Ok(Node::literal(pair.as_str() == "true")),
        Rule::null | Rule::undefined => Ok(Node::literal(Value::Null)),
        Rule::array => {
            let nodes = pair
                .into_inner()
                .map(|p| build(p, text))
                .collect::<Result<Vec<_>>>()?;
            if nodes.iter().all(Node::is_literal) {
                let values = nodes.into_iter().filter_map(into_literal).collect();
                return Ok(Node::literal(Value::Array(values)));
            }
            Ok(Node::Array { nodes })
        }
        Rule::object => {
            let mut keys = Vec::new();
            let mut values = Vec::new();
            for entry in pair.into_inner() {
                let mut inner = entry.into_inner();
                let key = next(&mut inner, text)?;
                keys.push(match key.as_rule() {
                    Rule::string => unescape(key.into_inner().next().map(|p| p.as_str()).unwrap_or("")),
                    _ => key.as_str().to_string(),
                });
                values.push(build(next(&mut inner, text)?, text)?);
            }
            if values.iter().all(Node::is_literal) {
                let values = values.into_iter().filter_map(into_literal).collect();
                return Ok(Node::literal(value::object(&keys, values)));
            }
            Ok(Node::Object { keys, values })
        }
        Rule::scoped => {
            let mut inner = pair.into_inner();
            let prefix = next(&mut inner, text)?.as_str();
            let name = next(&mut inner, text)?.as_str();
            let mut id = Identifier::new(name);
            id.lookup = false;
            if prefix == "~/" {
                id.root = true;
            } else {
                id.offset = prefix.matches("../").count();
            }
            Ok(Node::Identifier(id))
        }
        Rule::identifier => match pair.as_str() {
            "this" => Ok(Node::Identifier(Identifier::this())),
            name => Ok(Node::Identifier(Identifier::new(name))),
        },
        rule => Err(syntax(text, format!("unexpected {rule:?}"))),
    }
}

fn into_literal(node: Node) -> Option<Value> {
    match node {
        Node::Literal { value } => Some(value),
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, node: Node) -> Node {
    match node {
        Node::Literal { value } => Node::literal(value::unary(op, &value)),
        node => Node::Unary {
            op,
            node: Box::new(node),
        },
    }
}

fn fold_binary(op: BinaryOp, left: Node, right: Node) -> Node {
    match (left, right) {
        (Node::Literal { value: l }, Node::Literal { value: r }) => Node::literal(value::binary(op, l, r)),
        (left, right) => Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn fold_ternary(test: Node, yes: Node, no: Node) -> Node {
    match &test {
        Node::Literal { value: v } => {
            if value::is_truthy(v) {
                yes
            } else {
                no
            }
        }
        _ => Node::Ternary {
            test: Box::new(test),
            yes: Box::new(yes),
            no: Box::new(no),
        },
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
