use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs;
use std::path::{Path, PathBuf};
use stencil_compiler::{CompileOptions, Compiler};
use tracing::{debug, info};

pub mod logging;

/// Output directory used when none is given.
pub const DEFAULT_OUT_DIR: &str = "target/stencil-gen";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmitMode {
    /// A render closure, meant for `include!` as an expression.
    Source,
    /// The compiled template tree as JSON.
    Ast,
}

impl EmitMode {
    fn extension(self) -> &'static str {
        match self {
            EmitMode::Source => "rs",
            EmitMode::Ast => "json",
        }
    }
}

/// Compile the template at `input` and write the result to `out_dir`.
/// Returns the path written.
pub fn build_cmd(
    input: &Path,
    out_dir: Option<&Path>,
    emit: EmitMode,
    options: CompileOptions,
) -> Result<PathBuf> {
    let src =
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");

    debug!(input = %input.display(), ?emit, ?options, "building template");
    let compiler = Compiler::new(options);
    let nodes = compiler
        .compile(&src)
        .with_context(|| format!("failed to compile {}", input.display()))?;

    let code = match emit {
        EmitMode::Source => {
            let generated = compiler
                .generate_source(&nodes)
                .with_context(|| format!("failed to generate source for {}", input.display()))?;
            format!("// Generated by stencil from {}.\n{}\n", input.display(), generated)
        }
        EmitMode::Ast => {
            let mut json = serde_json::to_string_pretty(&*nodes).context("failed to serialize AST")?;
            json.push('\n');
            json
        }
    };

    let out_dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let out_path = out_dir.join(format!("{name}.{}", emit.extension()));
    fs::write(&out_path, code)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    info!(output = %out_path.display(), nodes = nodes.len(), "generated");
    Ok(out_path)
}
