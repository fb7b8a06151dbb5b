// src/main.rs

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use tracecap::config::{Config, DEFAULT_CONFIG_PATH};
use tracecap::core::{LogContext, Shutdown};
use tracecap::service::{
    DEFAULT_UNIT_DIR, ServiceHost, ServiceManager, Systemd, UnitSpec, install_signal_handler,
};

#[derive(Parser)]
#[command(name = "tracecap", version, about = "Copies a trace pipe into rotating timestamped files")]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground (default)
    Run,
    /// Install the systemd unit
    Install,
    /// Remove the systemd unit
    Remove,
    /// Start the installed service
    Start,
    /// Stop the installed service
    Stop,
    /// Show service status
    Status,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let explicit = cli.config.is_some();
    let cfg_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let cfg = Config::load_or_default(&cfg_path, explicit)?;

    let status = match cli.command.unwrap_or(Command::Run) {
        Command::Run => return run(cfg),
        Command::Install => service_manager(&cfg, cfg_path)?.install()?,
        Command::Remove => service_manager(&cfg, cfg_path)?.remove()?,
        Command::Start => service_manager(&cfg, cfg_path)?.start()?,
        Command::Stop => service_manager(&cfg, cfg_path)?.stop()?,
        Command::Status => service_manager(&cfg, cfg_path)?.status()?,
    };
    println!("{}", status);
    Ok(())
}

fn run(cfg: Config) -> anyhow::Result<()> {
    let ctx = LogContext::new("Service", &cfg.service_name);
    let shutdown = Shutdown::new();

    install_signal_handler(shutdown.clone(), ctx.clone())?;

    info!("[tracecap] starting {}", cfg.service_name);
    let running = ServiceHost::new(cfg, shutdown, ctx).start()?;
    let reason = running.wait()?;
    info!("[tracecap] exited ({:?})", reason);
    Ok(())
}

fn service_manager(cfg: &Config, cfg_path: PathBuf) -> anyhow::Result<ServiceManager<Systemd>> {
    let exec = std::env::current_exe().context("resolving own executable")?;
    let config = std::fs::canonicalize(&cfg_path).unwrap_or(cfg_path);

    Ok(ServiceManager::new(
        Systemd,
        DEFAULT_UNIT_DIR,
        UnitSpec {
            name: cfg.service_name.clone(),
            description: cfg.description.clone(),
            exec,
            config,
        },
    ))
}
