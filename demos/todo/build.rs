fn main() {
    println!("cargo:rerun-if-changed=src/todo.html");
    let input = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("src/todo.html");
    let out_dir = std::env::var("OUT_DIR").unwrap();
    stencil_cli::build_cmd(
        &input,
        Some(std::path::Path::new(&out_dir)),
        stencil_cli::EmitMode::Source,
        stencil_compiler::CompileOptions::new(),
    )
    .expect("compile todo.html");
}
