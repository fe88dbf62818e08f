//! Blockwright CLI - inspect and build templates from YAML documents
//!
//! `describe` loads template documents and prints each signature;
//! `build` additionally instantiates one template from a build request and
//! prints the outline of the constructed tree.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blockwright::config::{load_templates, BuildDocument, ConfigError};
use blockwright::Registry;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "blockwright")]
#[command(about = "Inspect and build declarative block templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the signature of every template found in the given paths
    Describe {
        /// Template documents or directories of documents
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Instantiate a template and print the constructed tree
    Build {
        /// Template documents or directories of documents
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Build request document (kind: Build)
        #[arg(long)]
        request: PathBuf,

        /// Run the tree on a scalar input and print the output
        #[arg(long)]
        input: Option<f64>,
    },
}

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blockwright=debug"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Describe { paths } => describe(&paths),
        Command::Build {
            paths,
            request,
            input,
        } => build(&paths, &request, input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load(paths: &[PathBuf]) -> Result<Registry, ConfigError> {
    let mut registry = Registry::with_builtin_layers();
    let loaded = load_templates(paths, &mut registry)?;
    info!("Loaded {} template(s)", loaded.len());
    Ok(registry)
}

fn describe(paths: &[PathBuf]) -> Result<(), ConfigError> {
    let registry = load(paths)?;
    for template in registry.templates() {
        println!("{template}");
    }
    Ok(())
}

fn build(paths: &[PathBuf], request: &Path, input: Option<f64>) -> Result<(), ConfigError> {
    let registry = load(paths)?;
    let request = BuildDocument::load(request)?;
    let template = request.template(&registry)?;
    info!("Building {template}");

    let instance = template.build(&request.to_call(&registry)?)?;
    print!("{}", instance.outline());

    if let Some(input) = input {
        let output = instance.forward(input.into())?;
        println!("output: {output}");
    }
    Ok(())
}
