use anyhow::Context;
use clap::{Parser, Subcommand};
use mathjax_loader::bridge::injection_script;
use mathjax_loader::{LoaderConfig, ScriptElement};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mathjax-loader", about = "Inspect how MathJax gets injected and configured")]
struct Cli {
    /// JSON loader configuration (defaults are used for missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the directory the resource path is resolved against
    #[arg(long, global = true)]
    module_dir: Option<PathBuf>,

    /// Emit a file:// URL instead of a plain path
    #[arg(long, global = true)]
    file_url: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the options passed to MathJax.Hub.Config
    Config,
    /// Print the script source attached to the document head
    Src,
    /// Print the JavaScript that injects the script into a page
    Bootstrap {
        /// Signal id reported when the script finishes loading
        #[arg(long, default_value_t = 1)]
        signal: u64,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<LoaderConfig> {
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if let Some(dir) = &cli.module_dir {
        config.module_dir = dir.clone();
    }
    if cli.file_url {
        config.use_file_url = true;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.hub)?);
        }
        Command::Src => {
            println!("{}", config.script_src()?);
        }
        Command::Bootstrap { signal } => {
            let script = ScriptElement::new(config.script_type.clone(), config.script_src()?);
            println!("{}", injection_script(&script, signal));
        }
    }
    Ok(())
}
