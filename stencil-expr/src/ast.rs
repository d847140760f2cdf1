use serde::Serialize;
use serde_json::Value;

/// Reference to a location in the data tree.
///
/// `name` is a dotted keypath; an empty name stands for `this`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identifier {
    pub name: String,
    /// Whether resolution may walk outward through enclosing scopes.
    pub lookup: bool,
    /// `~/name`: resolve against the root scope only.
    pub root: bool,
    /// Number of `../` prefixes.
    pub offset: usize,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lookup: true,
            root: false,
            offset: 0,
        }
    }

    /// `this`, or any keypath rooted at it, never walks outward.
    pub fn this() -> Self {
        Self {
            name: String::new(),
            lookup: false,
            root: false,
            offset: 0,
        }
    }

    /// First segment of the keypath (`a` for `a.b.c`).
    pub fn head(&self) -> &str {
        self.name.split('.').next().unwrap_or("")
    }

    fn extend(&mut self, segment: &str) {
        if self.name.is_empty() {
            self.name.push_str(segment);
        } else {
            self.name.push('.');
            self.name.push_str(segment);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

impl UnaryOp {
    /// Variant name, for generated paths.
    pub fn ident(self) -> &'static str {
        match self {
            Self::Not => "Not",
            Self::Minus => "Minus",
            Self::Plus => "Plus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Variant name, for generated paths.
    pub fn ident(self) -> &'static str {
        match self {
            Self::Or => "Or",
            Self::And => "And",
            Self::Equal => "Equal",
            Self::NotEqual => "NotEqual",
            Self::StrictEqual => "StrictEqual",
            Self::StrictNotEqual => "StrictNotEqual",
            Self::Less => "Less",
            Self::LessEqual => "LessEqual",
            Self::Greater => "Greater",
            Self::GreaterEqual => "GreaterEqual",
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Rem => "Rem",
        }
    }

    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => Self::Or,
            "&&" => Self::And,
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "===" => Self::StrictEqual,
            "!==" => Self::StrictNotEqual,
            "<" => Self::Less,
            "<=" => Self::LessEqual,
            ">" => Self::Greater,
            ">=" => Self::GreaterEqual,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            _ => return None,
        })
    }
}

/// Expression AST.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Node {
    Literal { value: Value },
    Identifier(Identifier),
    /// Member access that could not be folded into a static keypath.
    /// Static segments are stored as string literals.
    Member { lead: Box<Node>, path: Vec<Node> },
    /// Call of a host-registered function.
    Call { name: String, args: Vec<Node> },
    Unary { op: UnaryOp, node: Box<Node> },
    Binary { op: BinaryOp, left: Box<Node>, right: Box<Node> },
    Ternary { test: Box<Node>, yes: Box<Node>, no: Box<Node> },
    Array { nodes: Vec<Node> },
    Object { keys: Vec<String>, values: Vec<Node> },
}

impl Node {
    pub fn literal(value: impl Into<Value>) -> Self {
        Node::Literal {
            value: value.into(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal { .. })
    }

    pub fn literal_value(&self) -> Option<&Value> {
        match self {
            Node::Literal { value } => Some(value),
            _ => None,
        }
    }

    /// Keypath known at compile time, e.g. `user.name` for `user['name']`.
    pub fn static_keypath(&self) -> Option<&str> {
        match self {
            Node::Identifier(id) => Some(&id.name),
            _ => None,
        }
    }

    /// Appends a member segment, folding it into a static keypath when possible.
    pub(crate) fn with_segment(self, segment: Node) -> Node {
        let static_segment = match &segment {
            Node::Literal {
                value: Value::String(s),
            } => Some(s.clone()),
            Node::Literal {
                value: Value::Number(n),
            } => Some(n.to_string()),
            _ => None,
        };
        match (self, static_segment) {
            (Node::Identifier(mut id), Some(seg)) => {
                id.extend(&seg);
                Node::Identifier(id)
            }
            (Node::Member { lead, mut path }, _) => {
                path.push(segment);
                Node::Member { lead, path }
            }
            (lead, _) => Node::Member {
                lead: Box::new(lead),
                path: vec![segment],
            },
        }
    }
}
