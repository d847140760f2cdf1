use std::collections::HashMap;

use serde_json::{Value, json};
use stencil_compiler::{Compiler, Host, RenderError};
use stencil_dom::{Binding, Component, Data, DirectiveKind, Element, VNode};
use stencil_expr::value;

/// Host with partials, slots and a couple of functions, recording reads.
#[derive(Default)]
struct App {
    data: Value,
    partials: HashMap<&'static str, &'static str>,
    slots: HashMap<&'static str, Vec<VNode>>,
    reads: Vec<String>,
}

impl App {
    fn new(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

impl Data for App {
    fn get(&mut self, keypath: &str) -> Option<Value> {
        self.reads.push(keypath.to_string());
        value::get_path(&self.data, keypath)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Option<Value> {
        match name {
            "upper" => Some(Value::from(value::to_display(&args[0]).to_uppercase())),
            "say" => Some(Value::Array(args)),
            _ => None,
        }
    }
}

impl Host for App {
    fn partial(&self, name: &str) -> Option<String> {
        self.partials.get(name).map(|s| s.to_string())
    }

    fn is_component(&self, name: &str) -> bool {
        name != "Missing"
    }

    fn slot(&self, name: &str) -> Option<Vec<VNode>> {
        self.slots.get(name).cloned()
    }
}

fn render_with(template: &str, host: &mut dyn Host) -> Result<Vec<VNode>, RenderError> {
    let compiler = Compiler::default();
    let nodes = compiler.compile(template).unwrap();
    compiler.generate(&nodes).render(host)
}

fn render(template: &str, data: Value) -> Vec<VNode> {
    render_with(template, &mut App::new(data)).unwrap()
}

/// Concatenated text of a node list, descending into elements.
fn text(nodes: &[VNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            VNode::Text(t) => out.push_str(t),
            VNode::Element(e) => {
                out.push_str(e.text.as_deref().unwrap_or_default());
                out.push_str(&text(&e.children));
            }
            VNode::Fragment(children)
            | VNode::Portal { children, .. }
            | VNode::Slot { children, .. } => out.push_str(&text(children)),
            VNode::Comment(_) | VNode::Component(_) => {}
        }
    }
    out
}

fn element(node: &VNode) -> &Element {
    match node {
        VNode::Element(e) => e,
        other => panic!("expected element, got {other:?}"),
    }
}

fn component(node: &VNode) -> &Component {
    match node {
        VNode::Component(c) => c,
        other => panic!("expected component, got {other:?}"),
    }
}

#[test]
fn static_templates_render_the_same_tree() {
    let compiler = Compiler::default();
    let nodes = compiler
        .compile(r#"<div class="a"><span>b</span><br></div>"#)
        .unwrap();
    let program = compiler.generate(&nodes);
    assert!(program.is_static());

    let first = program.render(&mut Value::Null).unwrap();
    let second = program.render(&mut json!({ "ignored": true })).unwrap();
    assert_eq!(first, second);

    let div = element(&first[0]);
    assert_eq!(div.attrs.attrs.get("class").map(String::as_str), Some("a"));
    assert_eq!(div.children.len(), 2);
    assert_eq!(element(&div.children[0]).text.as_deref(), Some("b"));
    assert_eq!(element(&div.children[1]).tag, "br");
}

#[test]
fn interpolation_reads_data() {
    let out = render("<p>Hello {{user.name}}!</p>", json!({ "user": { "name": "tom" } }));
    assert_eq!(text(&out), "Hello tom!");

    let out = render("<p>{{user.name}}</p>", json!({ "user": { "name": "tom" } }));
    assert_eq!(element(&out[0]).text.as_deref(), Some("tom"));

    let out = render("<p>{{{raw}}}</p>", json!({ "raw": "<b>x</b>" }));
    assert_eq!(element(&out[0]).html.as_deref(), Some("<b>x</b>"));

    let out = render("{{missing}}|{{n + 1}}", json!({ "n": 1 }));
    assert_eq!(text(&out), "|2");
}

#[test]
fn every_data_access_goes_through_the_host() {
    let mut app = App::new(json!({ "a": 1, "b": { "c": 2 } }));
    render_with("{{a}}{{b.c}}", &mut app).unwrap();
    assert!(app.reads.contains(&"a".to_string()));
    assert!(app.reads.contains(&"b.c".to_string()));
}

#[test]
fn ranges_iterate_with_index() {
    let out = render("{{#each 1 => 3:i}}{{this}}-{{i}},{{/each}}", Value::Null);
    assert_eq!(text(&out), "1-0,2-1,3-2,");

    let out = render("{{#each 1 -> 3}}{{this}}{{/each}}", Value::Null);
    assert_eq!(text(&out), "12");

    let out = render("{{#each 3 -> 0}}{{this}}{{/each}}", Value::Null);
    assert_eq!(text(&out), "321");

    let out = render("{{#each 0 => n}}{{this}}{{/each}}", json!({ "n": 2 }));
    assert_eq!(text(&out), "012");

    let out = render("{{#each 1 -> 1}}x{{else}}none{{/each}}", Value::Null);
    assert_eq!(text(&out), "none");
}

#[test]
fn each_pushes_a_scope_per_item() {
    let data = json!({
        "title": "T",
        "list": [{ "name": "a" }, { "name": "b" }],
        "map": { "x": 1, "y": 2 },
        "empty": [],
    });
    let out = render("{{#each list:i}}{{i}}{{name}}{{title}}{{/each}}", data.clone());
    assert_eq!(text(&out), "0aT1bT");

    let out = render("{{#each list}}{{../title}}{{~/title}}{{/each}}", data.clone());
    assert_eq!(text(&out), "TTTT");

    let out = render("{{#each list}}{{this.title}}.{{/each}}", data.clone());
    assert_eq!(text(&out), "..");

    let out = render("{{#each map:key}}{{key}}={{this}};{{/each}}", data.clone());
    assert_eq!(text(&out), "x=1;y=2;");

    let out = render("{{#each empty}}x{{else}}empty{{/each}}", data);
    assert_eq!(text(&out), "empty");
}

#[test]
fn if_chains_pick_the_first_truthy_branch() {
    let template = "{{#if n > 1}}big{{else if n > 0}}small{{else}}zero{{/if}}";
    assert_eq!(text(&render(template, json!({ "n": 2 }))), "big");
    assert_eq!(text(&render(template, json!({ "n": 1 }))), "small");
    assert_eq!(text(&render(template, json!({ "n": 0 }))), "zero");

    let out = render("<div>{{#if on}}x{{/if}}</div>", json!({ "on": false }));
    assert_eq!(element(&out[0]).children, vec![VNode::Comment(String::new())]);

    let out = render(
        r#"<div {{#if on}}class="on"{{else}}class="off"{{/if}}></div>"#,
        json!({ "on": false }),
    );
    assert_eq!(
        element(&out[0]).attrs.attrs.get("class").map(String::as_str),
        Some("off")
    );
}

#[test]
fn attributes_and_properties() {
    let out = render(
        r#"<div class="a {{b}}" title="{{t}}" data-x="{{missing}}" key="{{id}}"></div>"#,
        json!({ "b": "B", "t": 5, "id": 7 }),
    );
    let div = element(&out[0]);
    assert_eq!(div.attrs.attrs.get("class").map(String::as_str), Some("a B"));
    assert_eq!(div.attrs.attrs.get("title").map(String::as_str), Some("5"));
    assert!(!div.attrs.attrs.contains_key("data-x"));
    assert_eq!(div.key.as_deref(), Some("7"));
    assert_eq!(div.bindings.get("title").map(String::as_str), Some("t"));

    let out = render(
        r#"<input value="{{name}}" disabled="{{off}}" maxlength="{{len}}">"#,
        json!({ "name": "x", "off": "false", "len": "12" }),
    );
    let input = element(&out[0]);
    assert_eq!(input.props.get("value"), Some(&json!("x")));
    assert_eq!(input.props.get("disabled"), Some(&json!(false)));
    assert_eq!(input.props.get("maxLength"), Some(&json!(12)));
    assert_eq!(input.bindings.get("value").map(String::as_str), Some("name"));
}

#[test]
fn styles_become_declarations() {
    let out = render(r#"<div style="color: red; font-size: 12px"></div>"#, Value::Null);
    let div = element(&out[0]);
    assert_eq!(div.style.get("color").map(String::as_str), Some("red"));
    assert_eq!(div.style.get("font-size").map(String::as_str), Some("12px"));

    let out = render(r#"<div style="{{s}}"></div>"#, json!({ "s": { "width": "1px" } }));
    assert_eq!(element(&out[0]).style.get("width").map(String::as_str), Some("1px"));

    let out = render(r#"<div style="width: {{w}}px"></div>"#, json!({ "w": 3 }));
    assert_eq!(element(&out[0]).style.get("width").map(String::as_str), Some("3px"));
}

#[test]
fn event_handlers_bind_methods_with_deferred_args() {
    let out = render(r#"<button on-click="say(name, $event)">go</button>"#, Value::Null);
    let button = element(&out[0]);
    let directive = &button.directives[0];
    assert_eq!(directive.kind, DirectiveKind::Event);
    assert_eq!(directive.name, "click");
    let Binding::Method { name, args } = &directive.value else {
        panic!("expected method, got {:?}", directive.value);
    };
    assert_eq!(name, "say");
    let mut data = json!({ "name": "tom" });
    let args = args.as_ref().unwrap().get(&mut data, Some(&json!("evt"))).unwrap();
    assert_eq!(args, json!(["tom", "evt"]));

    let out = render(r#"<button on-click="submit()">go</button>"#, Value::Null);
    assert!(matches!(
        &element(&out[0]).directives[0].value,
        Binding::Method { args: None, .. }
    ));
}

#[test]
fn directives_capture_the_scope_chain() {
    let data = json!({ "list": [{ "name": "a" }] });
    let out = render(
        r#"{{#each list}}<input model="name"><div o-tip="name" lazy transition="fade"></div>{{/each}}"#,
        data.clone(),
    );
    let input = element(&out[0]);
    assert_eq!(input.directives[0].kind, DirectiveKind::Model);
    assert_eq!(input.directives[0].value, Binding::Keypath("list.0.name".into()));

    let div = element(&out[1]);
    let Binding::Getter(getter) = &div.directives[0].value else {
        panic!("expected getter");
    };
    let mut data = data;
    assert_eq!(getter.get(&mut data, None).unwrap(), json!("a"));
    assert_eq!(div.directives[1].kind, DirectiveKind::Lazy);
    assert_eq!(div.directives[1].value, Binding::Value(json!(true)));
    assert_eq!(div.directives[2].value, Binding::Value(json!("fade")));
}

#[test]
fn components_receive_props_and_slots() {
    let out = render(
        r#"<Dog name="{{n}}" ref="dog"><span>a</span><template slot="tail"><b>t</b></template></Dog>"#,
        json!({ "n": "rex" }),
    );
    let dog = component(&out[0]);
    assert_eq!(dog.tag, "Dog");
    assert_eq!(dog.ref_name.as_deref(), Some("dog"));
    assert_eq!(dog.props.get("name"), Some(&json!("rex")));
    assert_eq!(element(&dog.slots["children"][0]).tag, "span");
    assert_eq!(element(&dog.slots["tail"][0]).tag, "b");

    let out = render("<Dog {{...props}} size=\"1\" />", json!({ "props": { "a": 1 } }));
    let dog = component(&out[0]);
    assert_eq!(dog.props.get("a"), Some(&json!(1)));
    assert_eq!(dog.props.get("size"), Some(&json!("1")));

    let err = render_with("<Dog {{...props}} />", &mut App::new(json!({ "props": 1 }))).unwrap_err();
    assert!(matches!(err, RenderError::SpreadNotObject(_)));
}

#[test]
fn dynamic_component_tags() {
    let out = render("<$kind />", json!({ "kind": "Cat" }));
    assert_eq!(component(&out[0]).tag, "Cat");

    let err = render_with("<$kind />", &mut App::new(json!({ "kind": "Missing" }))).unwrap_err();
    assert!(matches!(err, RenderError::ComponentNotFound(name) if name == "Missing"));

    let err = render_with("<$kind />", &mut App::new(json!({ "kind": 1 }))).unwrap_err();
    assert!(matches!(err, RenderError::DynamicTagNotString { .. }));

    let err = render_with("<Missing />", &mut App::new(Value::Null)).unwrap_err();
    assert!(matches!(err, RenderError::ComponentNotFound(name) if name == "Missing"));
}

#[test]
fn slots_render_host_content_once() {
    let mut app = App::new(Value::Null);
    app.slots.insert("children", vec![VNode::Text("inner".into())]);

    let out = render_with("<div><slot /></div>", &mut app).unwrap();
    let div = element(&out[0]);
    assert_eq!(
        div.children,
        vec![VNode::Slot {
            name: "children".into(),
            children: vec![VNode::Text("inner".into())],
        }]
    );

    let out = render_with("<div>{{$children}}</div>", &mut app).unwrap();
    assert_eq!(text(&out), "inner");

    let out = render_with(r#"<slot name="x">fallback</slot>"#, &mut app).unwrap();
    assert_eq!(text(&out), "fallback");

    let err = render_with("<slot /><slot />", &mut app).unwrap_err();
    assert!(matches!(err, RenderError::DuplicateSlot(name) if name == "children"));
}

#[test]
fn portals_and_templates() {
    let out = render(r#"<portal to="{{target}}"><p>x</p></portal>"#, json!({ "target": "body" }));
    match &out[0] {
        VNode::Portal { to, children } => {
            assert_eq!(to, "body");
            assert_eq!(children.len(), 1);
        }
        other => panic!("expected portal, got {other:?}"),
    }

    let out = render("<template><i>a</i><i>b</i></template>", Value::Null);
    assert!(matches!(&out[0], VNode::Fragment(children) if children.len() == 2));
}

#[test]
fn partials_render_in_the_current_scope() {
    let out = render(
        "{{#partial item}}<li>{{this}}</li>{{/partial}}<ul>{{#each list}}{{> item}}{{/each}}</ul>",
        json!({ "list": [1, 2] }),
    );
    let ul = element(&out[0]);
    let items: Vec<_> = ul.children.iter().map(|c| element(c).text.clone()).collect();
    assert_eq!(items, vec![Some("1".to_string()), Some("2".to_string())]);

    let mut app = App::new(json!({ "name": "tom" }));
    app.partials.insert("greet", "<b>hi {{name}}</b>");
    app.partials.insert("broken", "<b>");
    let out = render_with("{{#import greet}}", &mut app).unwrap();
    assert_eq!(text(&out), "hi tom");

    let err = render_with("{{> nope}}", &mut app).unwrap_err();
    assert!(matches!(err, RenderError::PartialNotFound(name) if name == "nope"));
    let err = render_with("{{> broken}}", &mut app).unwrap_err();
    assert!(matches!(err, RenderError::Partial { name, .. } if name == "broken"));
}

#[test]
fn functions_are_called_on_the_host() {
    let out = render("{{upper(name)}}", json!({ "name": "tom" }));
    assert_eq!(text(&out), "TOM");

    let err = render_with("{{nope()}}", &mut Value::Null).unwrap_err();
    assert!(matches!(err, RenderError::UnknownFunction(name) if name == "nope"));
}
