use serde_json::json;
use stencil_dom::{
    Binding, Component, Data, Directive, DirectiveKind, Element, Getter, Target, VNode, style,
};

#[test]
fn element_setters() {
    let mut el = Element::new("input");
    el.set_attribute("type", None, "text");
    el.set_property("value", json!("hello"));
    el.set_style(style::parse("color: red; width: 10px"));
    el.set_binding("value", "form.name");
    el.set_key("k1".to_string());

    assert_eq!(el.attrs.attrs.get("type").map(String::as_str), Some("text"));
    assert_eq!(el.props.get("value"), Some(&json!("hello")));
    assert_eq!(el.style.get("width").map(String::as_str), Some("10px"));
    assert_eq!(el.bindings.get("value").map(String::as_str), Some("form.name"));
    assert_eq!(el.key.as_deref(), Some("k1"));
}

#[test]
fn component_slots_accumulate() {
    let mut c = Component::new("Dog");
    c.add_slot("children", vec![VNode::Text("a".into())]);
    c.add_slot("children", vec![VNode::Comment(String::new())]);
    c.spread(json!({ "name": "rex", "age": 3 }).as_object().unwrap());
    c.set_prop("age", json!(4));

    assert_eq!(c.slots["children"].len(), 2);
    assert_eq!(c.props["name"], json!("rex"));
    assert_eq!(c.props["age"], json!(4));
}

#[test]
fn getters_compare_by_identity() {
    let g = Getter::new(|data, event| {
        let base = data.get("count").unwrap_or(json!(0));
        Ok(json!([base, event.cloned()]))
    });
    let same = g.clone();
    let other = Getter::new(|_, _| Ok(json!(null)));
    assert_eq!(g, same);
    assert_ne!(g, other);

    let mut data = json!({ "count": 2 });
    assert_eq!(g.get(&mut data, Some(&json!("click"))).unwrap(), json!([2, "click"]));
}

#[test]
fn directives_attach_to_components() {
    let mut c = Component::new("Dog");
    c.add_directive(Directive {
        kind: DirectiveKind::Event,
        name: "bark".into(),
        modifier: None,
        value: Binding::Method {
            name: "onBark".into(),
            args: None,
        },
    });
    assert_eq!(c.directives.len(), 1);
    assert_eq!(c.directives[0].kind, DirectiveKind::Event);
}

#[test]
fn value_is_a_data_source() {
    let mut data = json!({ "list": [{ "name": "a" }] });
    assert_eq!(Data::get(&mut data, "list.0.name"), Some(json!("a")));
    assert_eq!(Data::get(&mut data, "list.length"), Some(json!(1)));
    assert_eq!(Data::get(&mut data, "missing"), None);
    assert_eq!(data.call("anything", vec![]), None);
}

#[test]
fn fragments_nest() {
    let mut b = Element::new("b");
    b.children.push(VNode::Text("x".into()));
    let tree = VNode::Fragment(vec![VNode::Element(b), VNode::Text("y".into())]);
    match tree {
        VNode::Fragment(children) => {
            assert_eq!(children.len(), 2);
            assert!(matches!(&children[0], VNode::Element(e) if e.attrs.attrs.is_empty()));
        }
        other => panic!("unexpected {other:?}"),
    }
}
