use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stencil_cli::{EmitMode, build_cmd, logging};
use stencil_compiler::{CompileOptions, Mode, Profile};

#[derive(Parser)]
#[command(name = "stencil", version, about = "Stencil template compiler")]
struct Cli {
    /// More output per occurrence (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template file into a render closure or its AST.
    Build {
        /// Path to the template
        input: PathBuf,
        /// Output directory (default: target/stencil-gen)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// What to emit
        #[arg(long, value_enum, default_value_t = EmitMode::Source)]
        emit: EmitMode,
        /// Identifier naming in generated source: verbose or compact
        #[arg(long, env = "STENCIL_PROFILE", default_value = "verbose")]
        profile: Profile,
        /// Skip semantic checks
        #[arg(long)]
        production: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Build {
            input,
            out_dir,
            emit,
            profile,
            production,
        } => {
            let mode = if production {
                Mode::Production
            } else {
                Mode::Development
            };
            let options = CompileOptions::new().with_mode(mode).with_profile(profile);
            let out_path = build_cmd(&input, out_dir.as_deref(), emit, options)?;
            println!("Generated: {}", out_path.display());
        }
    }
    Ok(())
}
