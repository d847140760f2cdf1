//! Stack-based tree builder.
//!
//! The scanner feeds the parser one piece at a time: a run of text, a tag
//! boundary, an attribute or a `{{ }}` block. Branch nodes go on `stack`
//! while they are open and are reduced and attached to their parent when
//! popped, so children always land in source order.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use stencil_expr::{self as expr, Node as Expr, value};
use tracing::trace;

use crate::ast::{
    Attribute, Branch, Content, Directive, Each, Element, Expression, Import, Kind, Namespace,
    Node, Partial, Property, Spread, Style,
};
use crate::error::{CompileError, ErrorKind, Result};
use crate::optimize::{self, OffsetMap};
use crate::platform::{Hint, Platform};
use crate::scanner::{Block, Scanner};

static ELEMENT_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|<(?:/|\$?[A-Za-z])").expect("boundary pattern"));
static TAG_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<\$?[A-Za-z][-\w:.]*").expect("tag pattern"));
static TAG_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</\s*(?:\$?[A-Za-z][-\w:.]*)?\s*>").expect("tag pattern"));
static ATTR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[^\s"'<>/={}]+"#).expect("attribute pattern"));
static ATTR_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*=\s*").expect("assign pattern"));
static UNQUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[^\s"'<>=`{}]+"#).expect("value pattern"));
static DOUBLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""|\{\{"#).expect("value pattern"));
static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'|\{\{").expect("value pattern"));
static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\w+)(?:\s+([\s\S]*))?$").expect("keyword pattern"));
static ELSE_IF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^else\s+if(?:\s+([\s\S]*))?$").expect("else pattern"));
static EACH_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\s\S]*\S)\s*:\s*([$A-Za-z_][$\w]*)$").expect("each pattern")
});

/// Identifier that renders the default slot of the host component.
pub const CHILDREN: &str = "$children";

/// What the next piece of input may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Tags, text and blocks.
    Element,
    /// Inside `<tag ...>`: attributes, conditionals and spreads.
    Attribute,
    /// Inside a quoted value, or an unquoted `name={{ }}`.
    AttributeValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainKind {
    If,
    Each,
}

struct Frame {
    node: Node,
    /// Opened at attribute level: attaches to the element's `attrs`.
    in_attrs: bool,
    start: usize,
}

/// An open if/each chain: the branches closed so far, plus the stack index
/// of the branch still open.
struct Chain {
    closed: Vec<Node>,
    depth: usize,
    in_attrs: bool,
}

pub(crate) fn parse(template: &str, platform: &dyn Platform, production: bool) -> Result<Vec<Node>> {
    let (source, offsets) = optimize::strip_comments(template);
    let parser = Parser {
        scanner: Scanner::new(&source),
        template,
        offsets,
        platform,
        production,
        level: Level::Element,
        quote: None,
        stack: Vec::new(),
        if_stack: Vec::new(),
        each_stack: Vec::new(),
        roots: Vec::new(),
    };
    parser.run()
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    template: &'a str,
    offsets: OffsetMap,
    platform: &'a dyn Platform,
    production: bool,
    level: Level,
    quote: Option<char>,
    stack: Vec<Frame>,
    if_stack: Vec<Chain>,
    each_stack: Vec<Chain>,
    roots: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Vec<Node>> {
        while !self.scanner.is_end() {
            match self.level {
                Level::Element => self.element_level()?,
                Level::Attribute => self.attribute_level()?,
                Level::AttributeValue => self.attribute_value_level()?,
            }
        }
        self.finish()
    }

    fn finish(mut self) -> Result<Vec<Node>> {
        let end = self.scanner.pos();
        match self.level {
            Level::Element => {}
            Level::Attribute => return Err(self.syntax(end, "start tag is not closed")),
            Level::AttributeValue => {
                return Err(self.syntax(end, "attribute value is not terminated"));
            }
        }
        self.close_self_closing()?;
        if let Some(frame) = self.stack.last() {
            let message = match &frame.node {
                Node::Element(e) => format!("`<{}>` is not closed", e.tag),
                Node::If(_) | Node::ElseIf(_) | Node::Else(_) if self.owns(ChainKind::If) => {
                    "`{{#if}}` is not closed".to_string()
                }
                Node::Each(_) | Node::Else(_) => "`{{#each}}` is not closed".to_string(),
                Node::Partial(p) => format!("`{{{{#partial {}}}}}` is not closed", p.name),
                other => format!("{:?} is not closed", other.kind()),
            };
            return Err(self.syntax(frame.start, message));
        }
        optimize::remove_comment_nodes(&mut self.roots);
        Ok(self.roots)
    }

    // ---- levels ----

    fn element_level(&mut self) -> Result<()> {
        let start = self.scanner.pos();
        let text = self.scanner.next_before(&ELEMENT_BOUNDARY);
        if !text.is_empty() {
            self.add_child(Node::text(text), start)?;
        }
        if self.scanner.is_end() {
            return Ok(());
        }
        if self.scanner.starts_with("{{") {
            self.block()
        } else if self.scanner.starts_with("</") {
            self.close_tag()
        } else {
            self.open_tag()
        }
    }

    fn open_tag(&mut self) -> Result<()> {
        let start = self.scanner.pos();
        let tag = self
            .scanner
            .next_after(&TAG_OPEN)
            .ok_or_else(|| self.syntax(start, "invalid tag"))?;
        let element = self.create_element(&tag[1..]);
        trace!(tag = %element.tag, "open tag");
        self.add_child(Node::Element(element), start)?;
        self.level = Level::Attribute;
        Ok(())
    }

    fn close_tag(&mut self) -> Result<()> {
        let start = self.scanner.pos();
        let tag = self
            .scanner
            .next_after(&TAG_CLOSE)
            .ok_or_else(|| self.syntax(start, "invalid end tag"))?;
        let tag = tag.trim_start_matches("</").trim_end_matches('>').trim();
        self.pop_stack(Kind::Element, Some(tag), start)
    }

    fn attribute_level(&mut self) -> Result<()> {
        self.scanner.skip_whitespace();
        let start = self.scanner.pos();
        if self.scanner.is_end() {
            return Ok(());
        }
        if self.scanner.starts_with("/>") {
            self.scanner.advance(2);
            self.end_start_tag(start)?;
            let tag = self.current_element().map(|e| e.tag.clone());
            return self.pop_stack(Kind::Element, tag.as_deref(), start);
        }
        if self.scanner.starts_with(">") {
            self.scanner.advance(1);
            return self.end_start_tag(start);
        }
        if self.scanner.starts_with("{{") {
            return self.block();
        }
        self.attribute()
    }

    fn end_start_tag(&mut self, start: usize) -> Result<()> {
        if !matches!(self.stack.last(), Some(Frame { node: Node::Element(_), .. })) {
            return Err(self.syntax(start, "conditional attributes are not closed"));
        }
        self.level = Level::Element;
        Ok(())
    }

    fn attribute(&mut self) -> Result<()> {
        let start = self.scanner.pos();
        let name = self
            .scanner
            .next_after(&ATTR_NAME)
            .ok_or_else(|| self.syntax(start, "invalid attribute"))?;
        let node = self.create_attribute(name, start)?;
        let kind = node.kind();

        if self.scanner.next_after(&ATTR_ASSIGN).is_none() {
            self.add_child(node, start)?;
            return self.pop_stack(kind, None, start);
        }

        let value_start = self.scanner.pos();
        if let Some(quote) = ['"', '\''].into_iter().find(|q| self.scanner.rest().starts_with(*q)) {
            self.scanner.advance(1);
            self.add_child(node, start)?;
            self.quote = Some(quote);
            self.level = Level::AttributeValue;
        } else if self.scanner.starts_with("{{") {
            self.add_child(node, start)?;
            self.quote = None;
            self.level = Level::AttributeValue;
        } else {
            let value = self
                .scanner
                .next_after(&UNQUOTED_VALUE)
                .ok_or_else(|| self.syntax(value_start, format!("`{name}` has no value")))?;
            self.add_child(node, start)?;
            self.level = Level::AttributeValue;
            self.add_child(Node::text(value), value_start)?;
            self.level = Level::Attribute;
            self.pop_stack(kind, None, start)?;
        }
        Ok(())
    }

    fn attribute_value_level(&mut self) -> Result<()> {
        let start = self.scanner.pos();
        let Some(quote) = self.quote else {
            // `name={{ expr }}`: exactly one block, then the attribute closes.
            let block = self.read_block()?;
            if block.comment || !is_plain_expression(block.content) {
                return Err(self.syntax(block.start, "unquoted attribute value must be an expression"));
            }
            self.expression(block)?;
            return self.close_attribute(start);
        };

        let pattern = if quote == '"' { &DOUBLE_QUOTED } else { &SINGLE_QUOTED };
        let text = self.scanner.next_before(pattern);
        if !text.is_empty() {
            self.add_child(Node::text(text), start)?;
        }
        if self.scanner.is_end() {
            return Err(self.syntax(start, "attribute value is not terminated"));
        }
        if self.scanner.starts_with("{{") {
            return self.block();
        }
        self.scanner.advance(1);
        self.quote = None;
        self.close_attribute(start)
    }

    fn close_attribute(&mut self, start: usize) -> Result<()> {
        let kind = match self.stack.last().map(|f| f.node.kind()) {
            Some(k @ (Kind::Attribute | Kind::Property | Kind::Style | Kind::Directive)) => k,
            _ => return Err(self.syntax(start, "block inside attribute value is not closed")),
        };
        self.level = Level::Attribute;
        self.pop_stack(kind, None, start)
    }

    // ---- blocks ----

    fn read_block(&mut self) -> Result<Block<'a>> {
        let template = self.template;
        let offsets = &self.offsets;
        self.scanner.block().map_err(|e| CompileError {
            kind: ErrorKind::Syntax,
            message: e.message,
            template: template.to_string(),
            offset: offsets.original(e.offset),
        })
    }

    fn block(&mut self) -> Result<()> {
        let block = self.read_block()?;
        if block.comment {
            return Ok(());
        }
        let start = block.start;
        let content = block.content.trim();
        if content.is_empty() {
            return Err(self.syntax(start, "empty block"));
        }

        if let Some(caps) = KEYWORD.captures(content) {
            let arg = caps.get(2).map_or("", |m| m.as_str().trim());
            return match &caps[1] {
                "if" => self.open_if(arg, start),
                "each" => self.open_each(arg, start),
                "import" => self.import(arg, start),
                "partial" => self.open_partial(arg, start),
                other => Err(self.syntax(start, format!("unknown block `#{other}`"))),
            };
        }
        if let Some(name) = content.strip_prefix('/') {
            return self.close_block(name.trim(), start);
        }
        if let Some(name) = content.strip_prefix('>') {
            return self.import(name.trim(), start);
        }
        if let Some(body) = content.strip_prefix("...") {
            return self.spread(body.trim(), start);
        }
        if content == "else" {
            return self.link_else(None, start);
        }
        if let Some(caps) = ELSE_IF.captures(content) {
            let test = caps.get(1).map_or("", |m| m.as_str().trim());
            if test.is_empty() {
                return Err(self.syntax(start, "`else if` requires a condition"));
            }
            let test = self.compile_expr(test, start)?;
            return self.link_else(Some(test), start);
        }
        if self.level == Level::Attribute {
            return Err(self.syntax(start, "interpolation is not allowed between attributes"));
        }
        self.expression(block)
    }

    fn expression(&mut self, block: Block<'a>) -> Result<()> {
        let raw = block.content.trim().to_string();
        let expr = self.compile_expr(&raw, block.start)?;
        self.add_child(
            Node::Expression(Expression {
                expr,
                raw,
                safe: block.safe,
            }),
            block.start,
        )
    }

    fn open_if(&mut self, test: &str, start: usize) -> Result<()> {
        if test.is_empty() {
            return Err(self.syntax(start, "`#if` requires a condition"));
        }
        let expr = self.compile_expr(test, start)?;
        let node = Node::If(Branch {
            expr: Some(expr),
            ..Default::default()
        });
        self.add_child(node, start)?;
        self.if_stack.push(Chain {
            closed: Vec::new(),
            depth: self.stack.len() - 1,
            in_attrs: self.level != Level::Element,
        });
        Ok(())
    }

    fn open_each(&mut self, arg: &str, start: usize) -> Result<()> {
        self.forbid_in_attributes("#each", start)?;
        if arg.is_empty() {
            return Err(self.syntax(start, "`#each` requires a list"));
        }
        let split = EACH_INDEX
            .captures(arg)
            .and_then(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
            .filter(|(body, _)| !open_ternary(body));
        let (body, index) = match split {
            Some((body, index)) => (body, Some(index.to_string())),
            None => (arg, None),
        };
        if let Some(index) = &index {
            self.semantic(!expr::is_reserved(index), start, || {
                format!("`{index}` is reserved and can't name an index")
            })?;
        }

        let range = body
            .find("=>")
            .map(|at| (at, true))
            .or_else(|| body.find("->").map(|at| (at, false)));
        let node = match range {
            Some((at, equal)) => Each {
                from: self.compile_expr(body[..at].trim(), start)?,
                to: Some(self.compile_expr(body[at + 2..].trim(), start)?),
                equal,
                index,
                children: None,
                next: None,
            },
            None => Each {
                from: self.compile_expr(body, start)?,
                to: None,
                equal: false,
                index,
                children: None,
                next: None,
            },
        };
        self.add_child(Node::Each(node), start)?;
        self.each_stack.push(Chain {
            closed: Vec::new(),
            depth: self.stack.len() - 1,
            in_attrs: false,
        });
        Ok(())
    }

    fn import(&mut self, name: &str, start: usize) -> Result<()> {
        self.forbid_in_attributes("import", start)?;
        if name.is_empty() {
            return Err(self.syntax(start, "import requires a partial name"));
        }
        self.add_child(
            Node::Import(Import {
                name: name.to_string(),
            }),
            start,
        )
    }

    fn open_partial(&mut self, name: &str, start: usize) -> Result<()> {
        self.forbid_in_attributes("#partial", start)?;
        if name.is_empty() {
            return Err(self.syntax(start, "`#partial` requires a name"));
        }
        self.add_child(
            Node::Partial(Partial {
                name: name.to_string(),
                children: None,
            }),
            start,
        )
    }

    fn spread(&mut self, body: &str, start: usize) -> Result<()> {
        let in_component = self.level == Level::Attribute
            && self.current_element().is_some_and(|e| e.is_component);
        self.semantic(in_component, start, || {
            "spread is only allowed among component attributes".into()
        })?;
        if self.level == Level::AttributeValue {
            return Err(self.syntax(start, "spread is not allowed inside attribute values"));
        }
        let expr = self.compile_expr(body, start)?;
        if !in_component {
            return Ok(());
        }
        self.add_child(Node::Spread(Spread { expr }), start)
    }

    fn close_block(&mut self, name: &str, start: usize) -> Result<()> {
        match name {
            "if" => self.close_chain(ChainKind::If, start),
            "each" => self.close_chain(ChainKind::Each, start),
            "partial" => self.pop_stack(Kind::Partial, None, start),
            other => Err(self.syntax(start, format!("unknown closing block `{{{{/{other}}}}}`"))),
        }
    }

    // ---- chains ----

    /// Whether the open branch on top of the stack belongs to a chain of `kind`.
    fn owns(&self, kind: ChainKind) -> bool {
        let chains = match kind {
            ChainKind::If => &self.if_stack,
            ChainKind::Each => &self.each_stack,
        };
        let top = self.stack.len().checked_sub(1);
        chains.last().map(|c| c.depth) == top && top.is_some()
    }

    fn link_else(&mut self, test: Option<Expr>, start: usize) -> Result<()> {
        self.close_self_closing()?;
        let top = self.stack.last().map(|f| f.node.kind());
        let kind = match (&test, top) {
            (_, Some(Kind::If | Kind::ElseIf)) if self.owns(ChainKind::If) => ChainKind::If,
            (None, Some(Kind::Each)) if self.owns(ChainKind::Each) => ChainKind::Each,
            (Some(_), _) => return Err(self.syntax(start, "`else if` must follow `#if`")),
            (None, _) => return Err(self.syntax(start, "`else` must follow `#if` or `#each`")),
        };

        let Some(frame) = self.stack.pop() else {
            return Err(self.syntax(start, "`else` has no open block"));
        };
        trace!(kind = ?frame.node.kind(), "close branch");
        let in_attrs = frame.in_attrs;
        let branch = self.reduce(frame.node, frame.start)?;
        let chains = match kind {
            ChainKind::If => &mut self.if_stack,
            ChainKind::Each => &mut self.each_stack,
        };
        if let (Some(chain), Some(branch)) = (chains.last_mut(), branch) {
            chain.closed.push(branch);
        }

        let node = match test {
            Some(expr) => Node::ElseIf(Branch {
                expr: Some(expr),
                ..Default::default()
            }),
            None => Node::Else(Branch::default()),
        };
        self.stack.push(Frame {
            node,
            in_attrs,
            start,
        });
        Ok(())
    }

    fn close_chain(&mut self, kind: ChainKind, start: usize) -> Result<()> {
        self.close_self_closing()?;
        if !self.owns(kind) {
            let expected = self
                .stack
                .last()
                .map(|f| describe(&f.node))
                .unwrap_or_else(|| "nothing".into());
            let found = match kind {
                ChainKind::If => "{{/if}}",
                ChainKind::Each => "{{/each}}",
            };
            return Err(self.syntax(start, format!("expected to close {expected}, found `{found}`")));
        }
        let chain = match kind {
            ChainKind::If => self.if_stack.pop(),
            ChainKind::Each => self.each_stack.pop(),
        };
        let (Some(mut chain), Some(frame)) = (chain, self.stack.pop()) else {
            return Err(self.syntax(start, "block stack is inconsistent"));
        };
        if let Some(last) = self.reduce(frame.node, frame.start)? {
            chain.closed.push(last);
        }

        if chain.closed.iter().all(|b| b.children().is_none()) {
            trace!(?kind, "drop empty chain");
            return Ok(());
        }
        let mut head: Option<Node> = None;
        for mut branch in chain.closed.into_iter().rev() {
            if let Some(next) = head.take() {
                branch.set_next(next);
            }
            head = Some(branch);
        }
        match head {
            Some(mut head) => {
                if let Node::If(b) = &mut head {
                    b.stump = !chain.in_attrs && self.level == Level::Element;
                }
                self.attach(head, chain.in_attrs, start)
            }
            None => Ok(()),
        }
    }

    // ---- stack ----

    /// Appends a node at the current position. Leaves attach immediately,
    /// branches are pushed and attach when popped.
    fn add_child(&mut self, node: Node, start: usize) -> Result<()> {
        if self.level == Level::Element {
            self.close_self_closing()?;
        }

        let node = match node {
            Node::Text(t) if self.level == Level::Element => {
                match optimize::trim_breaklines(&t.text) {
                    Some(text) => Node::text(text.into_owned()),
                    None => return Ok(()),
                }
            }
            Node::Expression(Expression {
                expr: Expr::Literal { value: literal },
                safe: true,
                ..
            }) => Node::text(value::to_display(&literal)),
            node => node,
        };

        if !self.production {
            self.check_insertion(&node, start)?;
        }

        trace!(kind = ?node.kind(), level = ?self.level, "add");
        if node.is_leaf() {
            let in_attrs = self.level != Level::Element;
            self.attach(node, in_attrs, start)
        } else {
            self.stack.push(Frame {
                node,
                in_attrs: self.level != Level::Element,
                start,
            });
            Ok(())
        }
    }

    fn check_insertion(&self, node: &Node, start: usize) -> Result<()> {
        let parent = self.stack.last().map(|f| &f.node);
        if let Node::Expression(e) = node {
            if matches!(parent, Some(Node::Directive(_))) {
                return Err(self.semantic_error(start, "directive values can't contain interpolation"));
            }
            if !e.safe {
                let ok = match parent {
                    Some(Node::Element(el)) => {
                        self.level == Level::Element
                            && el.is_native()
                            && el.children.as_ref().is_none_or(Vec::is_empty)
                    }
                    _ => false,
                };
                if !ok {
                    return Err(self.semantic_error(
                        start,
                        "`{{{ }}}` must be the only child of an html element",
                    ));
                }
            }
        }
        if self.level == Level::Element {
            if let Some(Node::Element(el)) = parent {
                let raw_sibling = el
                    .children
                    .iter()
                    .flatten()
                    .any(|c| matches!(c, Node::Expression(e) if !e.safe));
                if raw_sibling {
                    return Err(self.semantic_error(
                        start,
                        "`{{{ }}}` must be the only child of an html element",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Closes an open self-closing element on top of the stack.
    fn close_self_closing(&mut self) -> Result<()> {
        while let Some(Frame {
            node: Node::Element(e),
            start,
            ..
        }) = self.stack.last()
        {
            if !self.platform.is_self_closing(&e.tag) || e.is_component {
                break;
            }
            let start = *start;
            let tag = e.tag.clone();
            trace!(%tag, "auto close");
            self.pop_top(start)?;
        }
        Ok(())
    }

    /// Pops the nearest open node of `kind`. Only self-closing elements may
    /// sit above it.
    fn pop_stack(&mut self, kind: Kind, tag: Option<&str>, start: usize) -> Result<()> {
        if let Some(Frame {
            node: Node::Element(e),
            ..
        }) = self.stack.last()
        {
            if tag.is_some_and(|t| t != e.tag) {
                self.close_self_closing()?;
            }
        }

        let Some(index) = self.stack.iter().rposition(|f| f.node.kind() == kind) else {
            let found = tag.map_or_else(|| format!("{kind:?}"), |t| format!("</{t}>"));
            return Err(self.syntax(start, format!("unexpected `{found}`")));
        };
        if let (Node::Element(e), Some(tag)) = (&self.stack[index].node, tag) {
            if e.tag != tag {
                return Err(self.syntax(start, format!("expected `</{}>`, found `</{tag}>`", e.tag)));
            }
        }
        if index + 1 != self.stack.len() {
            let open = describe(&self.stack[self.stack.len() - 1].node);
            return Err(self.syntax(start, format!("{open} is not closed")));
        }
        self.pop_top(start)
    }

    fn pop_top(&mut self, start: usize) -> Result<()> {
        let Some(frame) = self.stack.pop() else {
            return Err(self.syntax(start, "nothing to close"));
        };
        trace!(kind = ?frame.node.kind(), "pop");
        match self.reduce(frame.node, frame.start)? {
            Some(node) => self.attach(node, frame.in_attrs, start),
            None => Ok(()),
        }
    }

    /// Puts a finished node into its parent, extracting special attributes
    /// onto the owning element.
    fn attach(&mut self, node: Node, in_attrs: bool, start: usize) -> Result<()> {
        let node = match node {
            Node::Attribute(attr) => match self.special_field(&attr) {
                Some(field) => match self.take_special(field, attr, start)? {
                    Some(attr) => Node::Attribute(attr),
                    None => return Ok(()),
                },
                None => Node::Attribute(attr),
            },
            node => node,
        };
        self.append(node, in_attrs)
    }

    /// Moves a special attribute onto its element. Hands it back when no
    /// element owns it directly (only reachable in production mode).
    fn take_special(
        &mut self,
        field: &str,
        attr: Attribute,
        start: usize,
    ) -> Result<Option<Attribute>> {
        if field == "slot" {
            self.semantic(attr.value.is_some(), start, || "slot names must be static".into())?;
        }
        let Some(Frame {
            node: Node::Element(el),
            ..
        }) = self.stack.last_mut()
        else {
            return if self.production {
                Ok(Some(attr))
            } else {
                Err(self.semantic_error(start, format!("`{field}` can't be set conditionally")))
            };
        };
        let slot = match field {
            "key" => &mut el.key,
            "ref" => &mut el.ref_name,
            "slot" => &mut el.slot,
            "to" => &mut el.to,
            _ => &mut el.name,
        };
        *slot = Some(attr);
        Ok(None)
    }

    fn append(&mut self, node: Node, in_attrs: bool) -> Result<()> {
        match self.stack.last_mut() {
            None => optimize::push_child(&mut self.roots, node),
            Some(Frame {
                node: Node::Element(el),
                ..
            }) if in_attrs => el.attrs.get_or_insert_with(Vec::new).push(node),
            Some(frame) => {
                if let Some(children) = frame.node.children_slot() {
                    optimize::push_child(children.get_or_insert_with(Vec::new), node);
                }
            }
        }
        Ok(())
    }

    fn special_field(&self, attr: &Attribute) -> Option<&'static str> {
        if attr.ns.is_some() {
            return None;
        }
        let element = self.current_element()?;
        match attr.name.as_str() {
            "key" => Some("key"),
            "ref" => Some("ref"),
            "slot" => Some("slot"),
            "to" if element.tag == "portal" && !element.is_component => Some("to"),
            "name" if element.tag == "slot" && !element.is_component => Some("name"),
            _ => None,
        }
    }

    // ---- reduction ----

    /// Simplifies a node that was just closed. `None` removes it.
    fn reduce(&self, node: Node, start: usize) -> Result<Option<Node>> {
        match node {
            Node::Element(e) => Ok(Some(Node::Element(self.reduce_element(e, start)?))),
            Node::Attribute(a) => Ok(Some(Node::Attribute(self.reduce_attribute(a)))),
            Node::Property(p) => Ok(Some(Node::Property(reduce_property(p)))),
            Node::Style(s) => Ok(reduce_style(s).map(Node::Style)),
            Node::Directive(d) => Ok(Some(Node::Directive(self.reduce_directive(d, start)?))),
            Node::If(b) => Ok(Some(Node::If(reduce_branch(b)))),
            Node::ElseIf(b) => Ok(Some(Node::ElseIf(reduce_branch(b)))),
            Node::Else(b) => Ok(Some(Node::Else(reduce_branch(b)))),
            Node::Each(mut e) => {
                e.children = reduce_children(e.children);
                Ok(Some(Node::Each(e)))
            }
            Node::Partial(mut p) => {
                p.children = reduce_children(p.children);
                Ok(p.children.is_some().then_some(Node::Partial(p)))
            }
            leaf => Ok(Some(leaf)),
        }
    }

    fn reduce_element(&self, mut e: Element, start: usize) -> Result<Element> {
        e.children = reduce_children(e.children.take());

        if e.is_native() {
            // (escaped, content)
            let lifted = match e.children.as_deref() {
                Some([Node::Text(t)]) => {
                    Some((!optimize::has_entity(&t.text), Content::Text(t.text.clone())))
                }
                Some([Node::Expression(x)]) if x.expr.static_keypath() != Some(CHILDREN) => {
                    Some((x.safe, Content::Expr(x.expr.clone())))
                }
                _ => None,
            };
            if let Some((escaped, content)) = lifted {
                if escaped {
                    e.text = Some(content);
                } else {
                    e.html = Some(content);
                }
                e.children = None;
            }
        }

        if e.tag == "portal" && !e.is_component {
            self.semantic(e.to.is_some(), start, || "`<portal>` requires `to`".into())?;
        }

        let attrs_static = e.attrs.iter().flatten().all(Node::is_static);
        let children_static = e.children.iter().flatten().all(Node::is_static);
        let content_static = !matches!(e.text, Some(Content::Expr(_)))
            && !matches!(e.html, Some(Content::Expr(_)));
        let fields_static = [&e.key, &e.to].into_iter().flatten().all(|a| a.is_static);
        e.is_static = !e.is_component
            && e.tag != "slot"
            && e.ref_name.is_none()
            && e.slot.is_none()
            && attrs_static
            && children_static
            && content_static
            && fields_static;
        Ok(e)
    }

    fn reduce_attribute(&self, mut a: Attribute) -> Attribute {
        let is_component = self.current_element().is_some_and(|e| e.is_component);
        match a.children.take() {
            None => a.value = Some(self.platform.default_value(&a.name, is_component)),
            Some(mut children) if children.len() == 1 => match children.pop() {
                Some(Node::Text(t)) => a.value = Some(Value::String(t.text)),
                Some(Node::Expression(x)) => match x.expr {
                    Expr::Literal { value } if is_component => a.value = Some(value),
                    Expr::Literal { value } => {
                        a.value = Some(Value::String(self.platform.format_literal(&value)));
                    }
                    expr => {
                        a.binding = binding_of(&expr);
                        a.expr = Some(expr);
                    }
                },
                other => a.children = other.map(|n| vec![n]),
            },
            children => a.children = children,
        }
        a.is_static = a.expr.is_none() && a.children.iter().flatten().all(Node::is_static);
        a
    }

    fn reduce_directive(&self, mut d: Directive, start: usize) -> Result<Directive> {
        match d.children.take() {
            None => {
                let needs_value = matches!(d.ns, Namespace::Event | Namespace::Model | Namespace::Transition);
                self.semantic(!needs_value, start, || {
                    format!("{} directive requires a value", describe_directive(&d))
                })?;
                d.value = Some(Value::Bool(true));
            }
            Some(mut children) if children.len() == 1 => match children.pop() {
                Some(Node::Text(t)) => self.precompile_directive(&mut d, t.text, start)?,
                Some(Node::Expression(x)) => d.expr = Some(x.expr),
                other => d.children = other.map(|n| vec![n]),
            },
            children => d.children = children,
        }
        Ok(d)
    }

    fn precompile_directive(&self, d: &mut Directive, text: String, start: usize) -> Result<()> {
        match d.ns {
            Namespace::Event => d.expr = Some(self.compile_expr(&text, start)?),
            Namespace::Model => {
                let expr = self.compile_expr(&text, start)?;
                self.semantic(matches!(expr, Expr::Identifier(_)), start, || {
                    format!("model value `{text}` must be a keypath")
                })?;
                d.expr = Some(expr);
            }
            Namespace::Lazy => {
                let number = text.trim().parse::<f64>().ok().filter(|n| *n > 0.0);
                self.semantic(number.is_some(), start, || {
                    format!("lazy value `{text}` must be a positive number")
                })?;
                d.value = Some(match number {
                    Some(n) => value::number(n),
                    None => Value::Bool(true),
                });
            }
            Namespace::Transition => d.value = Some(Value::String(text)),
            Namespace::Custom => match expr::compile(&text) {
                Ok(Expr::Literal { value }) => d.value = Some(value),
                Ok(expr) => d.expr = Some(expr),
                Err(_) => d.value = Some(Value::String(text)),
            },
        }
        Ok(())
    }

    // ---- factories ----

    fn create_element(&self, tag: &str) -> Element {
        let parent_svg = self.current_element().is_some_and(|e| e.is_svg);
        let is_component = self.platform.is_component(tag);
        Element {
            tag: tag.to_string(),
            is_component,
            is_svg: !is_component && (parent_svg || self.platform.is_svg(tag)),
            is_style: tag == "style",
            is_option: tag == "option",
            ..Default::default()
        }
    }

    fn create_attribute(&self, name: &str, start: usize) -> Result<Node> {
        let Some(element) = self.current_element() else {
            return Err(self.syntax(start, "attribute outside of a tag"));
        };
        let directive = |ns, name: &str, modifier: Option<&str>| {
            Node::Directive(Directive {
                ns,
                name: name.to_string(),
                modifier: modifier.map(str::to_string),
                value: None,
                expr: None,
                children: None,
            })
        };

        if let Some(event) = name.strip_prefix("on-") {
            let (event, modifier) = match event.split_once('.') {
                Some((e, m)) => (e, Some(m)),
                None => (event, None),
            };
            self.semantic(!event.is_empty(), start, || format!("`{name}` has no event name"))?;
            return Ok(directive(Namespace::Event, event, modifier));
        }
        if name == "lazy" {
            return Ok(directive(Namespace::Lazy, "", None));
        }
        if let Some(target) = name.strip_prefix("lazy-") {
            return Ok(directive(Namespace::Lazy, target, None));
        }
        if let Some(custom) = name.strip_prefix("o-") {
            let mut parts = custom.split('.');
            let custom_name = parts.next().unwrap_or_default();
            let modifier = parts.next();
            self.semantic(parts.next().is_none(), start, || {
                format!("`{name}` has more than one modifier")
            })?;
            self.semantic(!custom_name.is_empty(), start, || {
                format!("`{name}` has no directive name")
            })?;
            return Ok(directive(Namespace::Custom, custom_name, modifier));
        }
        if name == "model" {
            return Ok(directive(Namespace::Model, "model", None));
        }
        if name == "transition" {
            return Ok(directive(Namespace::Transition, "transition", None));
        }

        if element.is_component {
            return Ok(Node::Attribute(Attribute {
                name: name.to_string(),
                ..Default::default()
            }));
        }
        if name == "style" {
            return Ok(Node::Style(Style::default()));
        }
        if let Some((ns, local)) = name.split_once(':') {
            return Ok(Node::Attribute(Attribute {
                name: local.to_string(),
                ns: Some(ns.to_string()),
                ..Default::default()
            }));
        }
        if let Some((prop, hint)) = self.platform.property(&element.tag, name) {
            return Ok(Node::Property(Property {
                name: prop.to_string(),
                hint,
                value: None,
                expr: None,
                children: None,
                binding: None,
                is_static: false,
            }));
        }
        Ok(Node::Attribute(Attribute {
            name: name.to_string(),
            ..Default::default()
        }))
    }

    // ---- helpers ----

    fn current_element(&self) -> Option<&Element> {
        self.stack.iter().rev().find_map(|f| match &f.node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    fn forbid_in_attributes(&self, what: &str, start: usize) -> Result<()> {
        if self.level == Level::Element {
            Ok(())
        } else {
            Err(self.syntax(start, format!("`{what}` is not allowed inside a tag")))
        }
    }

    fn compile_expr(&self, text: &str, start: usize) -> Result<Expr> {
        expr::compile(text).map_err(|e| self.error(ErrorKind::Expression, start, e.to_string()))
    }

    /// Fails with `message` unless `ok` holds or semantic checks are off.
    fn semantic(&self, ok: bool, start: usize, message: impl FnOnce() -> String) -> Result<()> {
        if ok || self.production {
            Ok(())
        } else {
            Err(self.semantic_error(start, message()))
        }
    }

    fn semantic_error(&self, start: usize, message: impl Into<String>) -> CompileError {
        self.error(ErrorKind::Semantic, start, message)
    }

    fn syntax(&self, start: usize, message: impl Into<String>) -> CompileError {
        self.error(ErrorKind::Syntax, start, message)
    }

    fn error(&self, kind: ErrorKind, start: usize, message: impl Into<String>) -> CompileError {
        CompileError {
            kind,
            message: message.into(),
            template: self.template.to_string(),
            offset: self.offsets.original(start),
        }
    }
}

fn reduce_children(children: Option<Vec<Node>>) -> Option<Vec<Node>> {
    let mut children = children?;
    optimize::remove_comment_nodes(&mut children);
    (!children.is_empty()).then_some(children)
}

/// Whether `text` has a `?` still waiting for its `:`, so a trailing
/// `:name` belongs to a conditional rather than naming an index.
fn open_ternary(text: &str) -> bool {
    let mut quote = None;
    let mut escaped = false;
    let mut open = 0usize;
    for c in text.chars() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '?' => open += 1,
                ':' => open = open.saturating_sub(1),
                _ => {}
            },
        }
    }
    open > 0
}

fn reduce_branch(mut b: Branch) -> Branch {
    b.children = reduce_children(b.children.take());
    b
}

fn reduce_property(mut p: Property) -> Property {
    match p.children.take() {
        None => {
            p.value = Some(match p.hint {
                Hint::Boolean => Value::Bool(true),
                _ => Value::String(String::new()),
            });
        }
        Some(mut children) if children.len() == 1 => match children.pop() {
            Some(Node::Text(t)) => p.value = Some(p.hint.coerce(Value::String(t.text))),
            Some(Node::Expression(x)) => match x.expr {
                Expr::Literal { value } => p.value = Some(p.hint.coerce(value)),
                expr => {
                    p.binding = binding_of(&expr);
                    p.expr = Some(expr);
                }
            },
            other => p.children = other.map(|n| vec![n]),
        },
        children => p.children = children,
    }
    p.is_static = p.expr.is_none() && p.children.iter().flatten().all(Node::is_static);
    p
}

fn reduce_style(mut s: Style) -> Option<Style> {
    match s.children.take() {
        None => return None,
        Some(mut children) if children.len() == 1 => match children.pop() {
            Some(Node::Text(t)) => {
                s.parsed = Some(stencil_dom::style::parse(&t.text));
                s.value = Some(t.text);
            }
            Some(Node::Expression(x)) => s.expr = Some(x.expr),
            other => s.children = other.map(|n| vec![n]),
        },
        children => s.children = children,
    }
    s.is_static = s.value.is_some();
    Some(s)
}

fn binding_of(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(id) if !id.name.is_empty() => Some(id.name.clone()),
        _ => None,
    }
}

fn is_plain_expression(content: &str) -> bool {
    let content = content.trim();
    !(content.starts_with('#')
        || content.starts_with('/')
        || content.starts_with('>')
        || content.starts_with("...")
        || content == "else"
        || ELSE_IF.is_match(content))
}

fn describe(node: &Node) -> String {
    match node {
        Node::Element(e) => format!("`<{}>`", e.tag),
        Node::If(_) | Node::ElseIf(_) => "`{{#if}}`".into(),
        Node::Else(_) => "`{{else}}`".into(),
        Node::Each(_) => "`{{#each}}`".into(),
        Node::Partial(p) => format!("`{{{{#partial {}}}}}`", p.name),
        Node::Directive(d) => describe_directive(d),
        other => format!("{:?}", other.kind()),
    }
}

fn describe_directive(d: &Directive) -> String {
    match d.ns {
        Namespace::Event => format!("`on-{}`", d.name),
        Namespace::Lazy => "`lazy`".into(),
        Namespace::Model => "`model`".into(),
        Namespace::Transition => "`transition`".into(),
        Namespace::Custom => format!("`o-{}`", d.name),
    }
}
