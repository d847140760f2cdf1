use std::fs;
use std::path::PathBuf;

use stencil_cli::{EmitMode, build_cmd};
use stencil_compiler::{CompileOptions, Mode, Profile};

const APP: &str = r#"<div class="app">
  <button on-click="inc()">Increment</button>
  <p class="count">{{count}}</p>
  {{#each items}}<i>{{this}}</i>{{/each}}
</div>
"#;

fn write_input(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write template");
    path
}

#[test]
fn cli_build_emits_render_closure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "App.html", APP);
    let out_dir = dir.path().join("gen");

    let out_file = build_cmd(&input, Some(&out_dir), EmitMode::Source, CompileOptions::new())
        .expect("build source");
    assert_eq!(out_file, out_dir.join("App.rs"));

    let content = fs::read_to_string(&out_file).expect("read source output");
    assert!(content.starts_with("// Generated by stencil"));
    assert!(content.contains("move |"));
    assert!(content.contains("create_element"));
    assert!(content.contains("::stencil_compiler::abi::"));
}

#[test]
fn cli_build_honors_compact_profile() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "App.html", APP);

    let verbose = build_cmd(&input, Some(&dir.path().join("v")), EmitMode::Source, CompileOptions::new())
        .unwrap();
    let compact = build_cmd(
        &input,
        Some(&dir.path().join("c")),
        EmitMode::Source,
        CompileOptions::new().with_profile(Profile::Compact),
    )
    .unwrap();

    let verbose = fs::read_to_string(verbose).unwrap();
    let compact = fs::read_to_string(compact).unwrap();
    assert!(compact.len() < verbose.len());
    assert!(!compact.contains("create_element"));
}

#[test]
fn cli_build_emits_ast_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "App.html", APP);

    let out_file = build_cmd(&input, Some(dir.path()), EmitMode::Ast, CompileOptions::new())
        .expect("build ast");
    assert_eq!(out_file.extension().and_then(|e| e.to_str()), Some("json"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out_file).unwrap()).unwrap();
    let roots = json.as_array().expect("root list");
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["type"], "Element");
    assert_eq!(roots[0]["tag"], "div");
}

#[test]
fn cli_build_reports_compile_errors() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "Broken.html", "<div>\n{{#if}}\n</div>");

    let err = build_cmd(&input, Some(dir.path()), EmitMode::Source, CompileOptions::new())
        .unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("failed to compile"), "{message}");
    assert!(message.contains("line 2"), "{message}");
    assert!(!dir.path().join("Broken.rs").exists());
}

#[test]
fn cli_build_production_skips_semantic_checks() {
    let dir = tempfile::tempdir().unwrap();
    // Spreads are only valid on components.
    let input = write_input(&dir, "Spread.html", "<div {{...props}}></div>");

    assert!(build_cmd(&input, Some(dir.path()), EmitMode::Ast, CompileOptions::new()).is_err());
    let production = CompileOptions::new().with_mode(Mode::Production);
    assert!(build_cmd(&input, Some(dir.path()), EmitMode::Ast, production).is_ok());
}

#[test]
fn cli_build_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let err = build_cmd(
        &dir.path().join("nope.html"),
        Some(dir.path()),
        EmitMode::Source,
        CompileOptions::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("failed to read"));
}
