//! `navlink` – command line entry point.
//!
//! | Command | Effect |
//! |---|---|
//! | `navlink run` | Start the router and simulate the configured agents until Ctrl-C. |
//! | `navlink send <agent> <message>` | Send one command envelope to a running router. |
//! | `navlink listen` | Bind the outbound endpoint and print every agent event. |
//! | `navlink init` | Write a default `~/.navlink/config.toml`. |

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use colored::Colorize;
use navlink_hal::{SimWorld, TransientDisplay};
use navlink_middleware::{ControlClient, EventCollector, Router};
use navlink_runtime::{Scheduler, init_tracing};
use navlink_types::{AgentEvent, Envelope, NavError, Vec3};
use tracing::{info, warn};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "navlink")]
#[command(version)]
#[command(about = "Message router and navigation agents over loopback TCP", long_about = None)]
struct Cli {
    /// Config file (default: ~/.navlink/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the router and the simulated agents
    Run,

    /// Send one envelope to the inbound endpoint
    Send {
        /// Target agent name
        agent: String,

        /// Command text: "x,y,z" or "STOP"
        message: String,

        /// Override the inbound address
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Print every event arriving on the outbound endpoint
    Listen {
        /// Override the outbound address
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("navlink");

    let path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init { force } => cmd_init(cli.config.clone(), force),
        Commands::Run => load_config(path).and_then(|cfg| cmd_run(&cfg)),
        Commands::Send {
            agent,
            message,
            addr,
        } => load_config(path)
            .and_then(|cfg| cmd_send(addr.unwrap_or(cfg.inbound_addr), &agent, &message)),
        Commands::Listen { addr } => {
            load_config(path).and_then(|cfg| cmd_listen(addr.unwrap_or(cfg.outbound_addr)))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// The config file if present, otherwise defaults; env overrides apply to
/// both.
fn load_config(path: Option<&std::path::Path>) -> Result<Config, NavError> {
    match config::load(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_run(cfg: &Config) -> Result<(), NavError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "Ctrl-C received, shutting down".yellow().bold());
        flag.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let world = SimWorld::new(cfg.agent_speed);
    for obstacle in &cfg.obstacles {
        world.add_obstacle(obstacle.to_aabb());
    }

    let router = Router::start(&cfg.router_config());
    let mut scheduler =
        Scheduler::new(router, Arc::new(world.clone())).with_engine(world.clone());

    let agent_config = cfg.agent_config();
    for spawn in &cfg.agents {
        let navigator = world.spawn_agent(&spawn.name, Vec3::from(spawn.spawn));
        scheduler.add_agent(
            &spawn.name,
            agent_config.clone(),
            Box::new(navigator),
            Box::new(TransientDisplay::new(&spawn.name)),
        );
    }

    match scheduler.router().listener_addr() {
        Some(addr) => println!("  Listening for commands on {}", addr.to_string().bold()),
        None => println!("  {}", "Inbound listener unavailable; see log".yellow()),
    }
    println!("  Sending events to {}", cfg.outbound_addr.to_string().bold());
    let names: Vec<&str> = scheduler.router().agent_names().collect();
    println!("  Agents: {}", names.join(", ").cyan());

    scheduler.run(cfg.tick_rate_hz, shutdown);
    info!("navlink stopped");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// send / listen
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_send(addr: SocketAddr, agent: &str, message: &str) -> Result<(), NavError> {
    ControlClient::new(addr).send(&Envelope::new(agent, message))?;
    println!("  {} {} → {}", "sent".green(), message.bold(), agent);
    Ok(())
}

fn cmd_listen(addr: SocketAddr) -> Result<(), NavError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| NavError::Runtime(format!("listen runtime: {e}")))?;

    runtime.block_on(async {
        let collector = EventCollector::bind(addr).await?;
        println!("  Waiting for events on {}", collector.local_addr()?.to_string().bold());

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = collector.next_event() => match event {
                    Ok(envelope) => print_event(&envelope),
                    Err(e) => warn!(error = %e, "bad event connection"),
                },
            }
        }
        Ok::<(), NavError>(())
    })
}

fn print_event(envelope: &Envelope) {
    let stamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
    let text = match AgentEvent::parse(&envelope.message) {
        Some(AgentEvent::Arrived(_)) => envelope.message.green(),
        Some(AgentEvent::NewAgent(_)) => envelope.message.cyan(),
        None => envelope.message.normal(),
    };
    println!("{} {:>10}  {}", stamp.dimmed(), envelope.agent_name.bold(), text);
}

// ─────────────────────────────────────────────────────────────────────────────
// init
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_init(path: Option<PathBuf>, force: bool) -> Result<(), NavError> {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() && !force {
        return Err(NavError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config::save_to(&Config::default(), &path)?;
    println!("  Config written to {}", path.display().to_string().bold());
    Ok(())
}
