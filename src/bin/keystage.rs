// Keystage CLI
// Compiles a mapping configuration and replays scripted key events through it

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use keystage_core::event::{parse_script, Replay};
use keystage_core::{Config, Stage};

/// Key sequence remapper
#[derive(Parser, Debug)]
#[command(name = "keystage")]
#[command(version)]
#[command(about = "Key sequence remapper", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit
    #[arg(long)]
    check_config: bool,

    /// Replay a script of key events ("-" reads stdin) and print the output
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Window class (or context name) selecting the active override set
    #[arg(long, value_name = "CLASS")]
    context: Option<String>,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn load_config(args: &Args) -> Result<(PathBuf, Config)> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path()
            .ok_or_else(|| anyhow!("no config directory, pass --config"))?,
    };
    let config = Config::from_toml_path(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok((path, config))
}

fn select_context(config: &Config, stage: &mut Stage, context: &str) -> Result<()> {
    let index = config
        .find_context(context, "")
        .or_else(|| config.context_index(context))
        .ok_or_else(|| anyhow!("no context matches '{}'", context))?;
    log::info!("using context {}", index);
    stage.activate_override_set(Some(index));
    Ok(())
}

fn read_script(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("failed to read script from stdin")?;
        return Ok(script);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_summary(config: &Config) {
    println!("{} mappings", config.mappings.len());
    for (index, mapping) in config.mappings.iter().enumerate() {
        println!("  {:>3}: {}", index, mapping);
    }
    println!("{} contexts", config.contexts.len());
    for ((name, _), overrides) in config.contexts.iter().zip(&config.override_sets) {
        println!("  {}: {} overrides", name, overrides.len());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let (path, config) = load_config(&args)?;
    log::debug!("loaded {}", path.display());

    if args.check_config {
        println!(
            "Configuration is valid: {} mappings, {} contexts",
            config.mappings.len(),
            config.contexts.len()
        );
        return Ok(());
    }

    let Some(script_path) = &args.replay else {
        print_summary(&config);
        return Ok(());
    };

    let mut stage = config.build_stage();
    if let Some(context) = &args.context {
        select_context(&config, &mut stage, context)?;
    }

    let script = read_script(script_path)?;
    let steps = parse_script(&script)
        .with_context(|| format!("invalid script {}", script_path.display()))?;
    for record in Replay::new(&mut stage).run(&steps) {
        println!("{}", record);
    }

    if !stage.is_clear() {
        log::warn!("script ended with keys still held");
    }
    Ok(())
}
