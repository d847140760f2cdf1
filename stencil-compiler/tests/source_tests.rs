use std::collections::HashMap;

use proc_macro2::{Delimiter, Group, Ident, TokenStream, TokenTree};
use quote::ToTokens;
use serde_json::{Value, json};
use stencil_compiler::naming::{Compact, Helper, Local, Naming, Verbose};
use stencil_compiler::{CompileOptions, Compiler, GeneratedSource, Profile, SourceError, abi};
use stencil_dom::VNode;
use stencil_expr::value;

fn source(template: &str, profile: Profile) -> Result<GeneratedSource, SourceError> {
    let compiler = Compiler::new(CompileOptions::new().with_profile(profile));
    let nodes = compiler.compile(template).unwrap();
    compiler.generate_source(&nodes)
}

fn tokens(generated: &GeneratedSource) -> TokenStream {
    generated.closure.to_token_stream()
}

/// Number of `name(...)` call sites.
fn calls(tokens: TokenStream, name: &str) -> usize {
    let trees: Vec<TokenTree> = tokens.into_iter().collect();
    let mut count = 0;
    for (i, tree) in trees.iter().enumerate() {
        match tree {
            TokenTree::Ident(id) if id == name => {
                if let Some(TokenTree::Group(g)) = trees.get(i + 1) {
                    if g.delimiter() == Delimiter::Parenthesis {
                        count += 1;
                    }
                }
            }
            TokenTree::Group(g) => count += calls(g.stream(), name),
            _ => {}
        }
    }
    count
}

fn rename(tokens: TokenStream, names: &HashMap<String, String>) -> TokenStream {
    tokens
        .into_iter()
        .map(|tree| match tree {
            TokenTree::Ident(id) => match names.get(&id.to_string()) {
                Some(name) => TokenTree::Ident(Ident::new(name, id.span())),
                None => TokenTree::Ident(id),
            },
            TokenTree::Group(g) => {
                let mut renamed = Group::new(g.delimiter(), rename(g.stream(), names));
                renamed.set_span(g.span());
                TokenTree::Group(renamed)
            }
            other => other,
        })
        .collect()
}

const TEMPLATE: &str = r#"
<div class="box {{kind}}" key="{{id}}">
    <h1>Title</h1>
    {{#if user}}
        <p>{{user.name}}</p>
    {{else}}
        <p>anonymous</p>
    {{/if}}
    <ul>
        {{#each items:i}}
            <li on-click="pick(i, $event)" o-tip="label">{{i}}: {{label}}</li>
        {{else}}
            <li>none</li>
        {{/each}}
    </ul>
    {{#each 1 => 3}}<i>{{this}}</i>{{/each}}
    <input value="{{query}}" model="query" lazy="200">
    <Card title="{{title}}" {{...props}}>
        <span>body</span>
        <template slot="footer"><b>{{footer}}</b></template>
    </Card>
    <slot name="extra">default</slot>
    <portal to="body"><em>{{tip}}</em></portal>
    {{> shared}}
</div>
"#;

#[test]
fn generated_source_is_a_closure_over_every_helper() {
    let generated = source(TEMPLATE, Profile::Verbose).unwrap();
    assert_eq!(generated.closure.inputs.len(), Helper::ALL.len());
    assert!(generated.text.starts_with("move |"));
    assert!(!generated.text.is_empty());

    let tokens = tokens(&generated);
    assert_eq!(calls(tokens.clone(), "create_component"), 1);
    assert_eq!(calls(tokens.clone(), "each"), 1);
    assert_eq!(calls(tokens.clone(), "range"), 1);
    assert_eq!(calls(tokens.clone(), "render_slot"), 1);
    assert_eq!(calls(tokens.clone(), "create_portal"), 1);
    assert_eq!(calls(tokens.clone(), "import"), 1);
    assert_eq!(calls(tokens.clone(), "model"), 1);
    assert_eq!(calls(tokens.clone(), "lazy"), 1);
    assert_eq!(calls(tokens.clone(), "on"), 1);
    assert_eq!(calls(tokens.clone(), "spread"), 1);
    assert!(calls(tokens, "set_binding") >= 2);
}

#[test]
fn profiles_differ_only_in_names() {
    let verbose = source(TEMPLATE, Profile::Verbose).unwrap();
    let compact = source(TEMPLATE, Profile::Compact).unwrap();
    assert!(compact.text.len() < verbose.text.len());
    assert_eq!(calls(tokens(&compact), "create_element"), 0);

    let mut names = HashMap::new();
    for helper in Helper::ALL {
        names.insert(
            Verbose.helper(helper).to_string(),
            Compact.helper(helper).to_string(),
        );
    }
    for local in Local::ALL {
        names.insert(
            Verbose.local(local).to_string(),
            Compact.local(local).to_string(),
        );
    }
    let renamed = rename(tokens(&verbose), &names);
    assert_eq!(renamed.to_string(), tokens(&compact).to_string());
}

#[test]
fn static_subtrees_are_hoisted() {
    let generated = source("<div><p>a</p></div>{{x}}<section><b>b</b></section>", Profile::Verbose).unwrap();
    assert_eq!(calls(tokens(&generated), "static_list"), 2);

    let generated = source("<p>a</p><p>b</p>", Profile::Verbose).unwrap();
    assert_eq!(calls(tokens(&generated), "static_list"), 1);

    let generated = source("{{x}}", Profile::Verbose).unwrap();
    assert_eq!(calls(tokens(&generated), "static_list"), 0);
}

#[test]
fn local_partials_are_inlined() {
    let generated = source(
        "{{#partial item}}<b>{{name}}</b>{{/partial}}{{> item}}{{> item}}{{> other}}",
        Profile::Verbose,
    )
    .unwrap();
    let tokens = tokens(&generated);
    assert_eq!(calls(tokens.clone(), "create_element"), 2);
    assert_eq!(calls(tokens, "import"), 1);

    let err = source(
        "{{#partial loop}}<i>{{> loop}}</i>{{/partial}}{{> loop}}",
        Profile::Verbose,
    )
    .unwrap_err();
    assert!(matches!(err, SourceError::RecursivePartial(name) if name == "loop"));
}

#[test]
fn deferred_expressions_become_thunks() {
    let generated = source(
        r#"<div o-tip="label" on-tap="go(a)" on-leave="done"></div>"#,
        Profile::Verbose,
    )
    .unwrap();
    // o-tip, the args of go(a), on-leave
    assert_eq!(calls(tokens(&generated), "getter"), 3);
}

#[test]
fn helper_signatures_accept_plain_closures() {
    fn greet(
        lookup: abi::Lookup<'_>,
        to_display: abi::ToDisplay<'_>,
        create_text: abi::CreateText<'_>,
    ) -> VNode {
        create_text(to_display(&lookup("name", true, false, 0)))
    }

    let data = json!({ "name": "tom" });
    let lookup = |name: &str, _walk: bool, _root: bool, _offset: usize| {
        value::get_path(&data, name).unwrap_or(Value::Null)
    };
    let to_display = |v: &Value| value::to_display(v);
    let create_text = |s: String| VNode::Text(s);
    assert_eq!(greet(&lookup, &to_display, &create_text), VNode::Text("tom".into()));

    let each = |list: Value,
                _keypath: Option<&str>,
                _index: Option<&str>,
                body: abi::Body<'_>|
     -> abi::Result<usize> {
        let len = list.as_array().map_or(0, Vec::len);
        for _ in 0..len {
            body()?;
        }
        Ok(len)
    };
    let each: abi::Each<'_> = &each;
    let mut visited = 0;
    let mut body = || -> abi::Result<()> {
        visited += 1;
        Ok(())
    };
    assert_eq!(each(json!([1, 2, 3]), None, None, &mut body).unwrap(), 3);
    assert_eq!(visited, 3);
}

#[test]
fn generated_paths_name_enum_variants() {
    let generated = source(
        r#"<input disabled="{{!off}}" maxlength="{{n - 1}}" value="{{q}}">"#,
        Profile::Compact,
    )
    .unwrap();
    let code = tokens(&generated).to_string();
    assert!(code.contains("Hint :: Boolean"), "{code}");
    assert!(code.contains("Hint :: Number"), "{code}");
    assert!(code.contains("Hint :: String"), "{code}");
    assert!(code.contains("UnaryOp :: Not"), "{code}");
    assert!(code.contains("BinaryOp :: Sub"), "{code}");
    for helper in Helper::ALL {
        assert_eq!(helper.ident(), format!("{helper:?}"));
        assert!(code.contains(&format!("abi :: {}", helper.ident())), "{helper:?}");
    }
}
