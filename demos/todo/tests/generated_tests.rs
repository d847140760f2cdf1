use std::collections::HashMap;

use serde_json::{Value, json};
use stencil_compiler::{Compiler, Host, RenderError};
use stencil_dom::{Binding, Data, Directive, VNode};
use stencil_expr::value;

#[derive(Clone, Default)]
struct Page {
    data: Value,
    slots: HashMap<&'static str, Vec<VNode>>,
    unregistered: Vec<&'static str>,
}

impl Page {
    fn new(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

impl Data for Page {
    fn get(&mut self, keypath: &str) -> Option<Value> {
        value::get_path(&self.data, keypath)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Option<Value> {
        match name {
            "upper" => Some(Value::from(value::to_display(args.first()?).to_uppercase())),
            _ => None,
        }
    }
}

impl Host for Page {
    fn partial(&self, name: &str) -> Option<String> {
        (name == "shared").then(|| "<i>{{title}}</i>{{#each items}}<b>{{title}}</b>{{/each}}".to_string())
    }

    fn is_component(&self, name: &str) -> bool {
        !self.unregistered.contains(&name)
    }

    fn slot(&self, name: &str) -> Option<Vec<VNode>> {
        self.slots.get(name).cloned()
    }
}

fn interpreted(page: &mut Page) -> Result<Vec<VNode>, RenderError> {
    let compiler = Compiler::default();
    let nodes = compiler.compile(stencil_todo::TEMPLATE).unwrap();
    compiler.generate(&nodes).render(page)
}

/// Replaces getters with what they evaluate to, so trees from separate
/// renders compare by value.
fn settle(nodes: &mut [VNode], data: &mut Value) {
    for node in nodes {
        match node {
            VNode::Element(e) => {
                settle_directives(&mut e.directives, data);
                settle(&mut e.children, data);
            }
            VNode::Component(c) => {
                settle_directives(&mut c.directives, data);
                for slot in c.slots.values_mut() {
                    settle(slot, data);
                }
            }
            VNode::Fragment(children)
            | VNode::Portal { children, .. }
            | VNode::Slot { children, .. } => settle(children, data),
            VNode::Text(_) | VNode::Comment(_) => {}
        }
    }
}

fn settle_directives(directives: &mut [Directive], data: &mut Value) {
    let event = json!({ "type": "click" });
    for directive in directives {
        let settled = match &directive.value {
            Binding::Getter(getter) => Binding::Value(getter.get(&mut *data, Some(&event)).unwrap()),
            Binding::Method {
                name,
                args: Some(args),
            } => Binding::Value(json!({
                "method": name,
                "args": args.get(&mut *data, Some(&event)).unwrap(),
            })),
            _ => continue,
        };
        directive.value = settled;
    }
}

fn both(page: &Page) -> (Vec<VNode>, Vec<VNode>) {
    let mut generated = stencil_todo::render(&mut page.clone()).unwrap();
    let mut program = interpreted(&mut page.clone()).unwrap();
    settle(&mut generated, &mut page.data.clone());
    settle(&mut program, &mut page.data.clone());
    (generated, program)
}

fn find<'a>(nodes: &'a [VNode], pick: &dyn Fn(&VNode) -> bool) -> Option<&'a VNode> {
    for node in nodes {
        if pick(node) {
            return Some(node);
        }
        let children = match node {
            VNode::Element(e) => &e.children,
            VNode::Fragment(children)
            | VNode::Portal { children, .. }
            | VNode::Slot { children, .. } => children,
            _ => continue,
        };
        if let Some(found) = find(children, pick) {
            return Some(found);
        }
    }
    None
}

fn full_page() -> Page {
    let mut page = Page::new(json!({
        "id": 7,
        "filter": "open",
        "title": "groceries",
        "user": { "name": "tom" },
        "items": [{ "title": "milk" }, { "title": "bread" }],
        "pages": 3,
        "query": "mi",
        "editable": false,
        "props": { "color": "green" },
        "left": 2,
        "footer": "done soon",
        "tip": "hover",
    }));
    page.slots.insert("extra", vec![VNode::Text("from host".into())]);
    page
}

#[test]
fn generated_closure_renders_like_the_program() {
    let (generated, program) = both(&full_page());
    assert_eq!(generated, program);

    let card = find(&generated, &|n| matches!(n, VNode::Component(c) if c.tag == "Card"));
    match card {
        Some(VNode::Component(card)) => {
            assert_eq!(card.props.get("title"), Some(&json!("GROCERIES")));
            assert_eq!(card.props.get("color"), Some(&json!("green")));
            assert!(card.slots.contains_key("children"));
            assert!(card.slots.contains_key("footer"));
        }
        other => panic!("expected the card, got {other:?}"),
    }
    let li = find(&generated, &|n| matches!(n, VNode::Element(e) if e.tag == "li"));
    match li {
        Some(VNode::Element(li)) => {
            assert_eq!(li.attrs.attrs.get("class").map(String::as_str), Some("open"));
            assert_eq!(li.directives.len(), 2);
        }
        other => panic!("expected an item, got {other:?}"),
    }
}

#[test]
fn fallback_branches_render_alike() {
    let page = Page::new(json!({
        "guest": true,
        "items": [],
        "pages": 0,
        "props": {},
    }));
    let (generated, program) = both(&page);
    assert_eq!(generated, program);
    assert!(find(&generated, &|n| matches!(n, VNode::Element(e) if e.text.as_deref() == Some("nothing to do"))).is_some());
    assert!(find(&generated, &|n| matches!(n, VNode::Text(t) if t == "default")).is_some());

    let page = Page::new(json!({
        "items": { "a": { "title": "x" } },
        "pages": -2,
        "props": {},
    }));
    let (generated, program) = both(&page);
    assert_eq!(generated, program);
    assert!(find(&generated, &|n| matches!(n, VNode::Element(e) if e.text.as_deref() == Some("anonymous"))).is_some());
}

#[test]
fn generated_closure_fails_like_the_program() {
    let page = Page::new(json!({ "props": 1 }));
    let generated = stencil_todo::render(&mut page.clone()).unwrap_err();
    let program = interpreted(&mut page.clone()).unwrap_err();
    assert!(matches!(generated, RenderError::SpreadNotObject(_)));
    assert!(matches!(program, RenderError::SpreadNotObject(_)));

    let mut page = Page::new(json!({ "props": {} }));
    page.unregistered.push("Card");
    let generated = stencil_todo::render(&mut page.clone()).unwrap_err();
    let program = interpreted(&mut page.clone()).unwrap_err();
    assert!(matches!(generated, RenderError::ComponentNotFound(name) if name == "Card"));
    assert!(matches!(program, RenderError::ComponentNotFound(name) if name == "Card"));
}
