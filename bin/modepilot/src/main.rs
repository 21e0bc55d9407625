//! modepilot - plan and drive console mode transitions
//!
//! Loads a product definition and either inspects it (check, plan,
//! skeleton) or drives a console client through a goto.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use modepilot::config::ConfigLoader;
use modepilot::{GotoOptions, Mode, ModeContext, ProductConfig, PtyConsole, Strategy};

#[derive(Parser)]
#[command(name = "modepilot")]
#[command(about = "Plan and drive console mode transitions of a device under test")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "MODEPILOT_DEBUG")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a product definition and summarise it
    Check {
        /// Product definition (TOML or JSON)
        definition: PathBuf,
    },

    /// Print the path the executor would take
    Plan {
        definition: PathBuf,

        #[arg(long)]
        from: Mode,

        #[arg(long)]
        to: Mode,

        /// mincost, maxcost or minhop
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Waypoints to visit where feasible (comma-separated)
        #[arg(long, value_delimiter = ',')]
        via: Vec<Mode>,

        /// Show the cost of the edge reaching each mode
        #[arg(long)]
        with_cost: bool,
    },

    /// Generate transition stubs for every declared edge
    Skeleton {
        definition: PathBuf,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Drive a console client to a mode using the scripted transitions
    Goto {
        definition: PathBuf,

        #[arg(long)]
        to: Mode,

        /// Console client command line, e.g. "telnet 10.0.0.5 2003"
        #[arg(long)]
        spawn: String,

        /// Assume the device is in this mode instead of reading the console
        #[arg(long)]
        from: Option<Mode>,

        /// Re-read the current mode from the console before planning
        #[arg(long)]
        refresh: bool,

        #[arg(long)]
        strategy: Option<Strategy>,

        #[arg(long, value_delimiter = ',')]
        via: Vec<Mode>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    debug!("{} v{}", modepilot::NAME, modepilot::VERSION);

    match cli.command {
        Commands::Check { definition } => check(&definition),
        Commands::Plan {
            definition,
            from,
            to,
            strategy,
            via,
            with_cost,
        } => plan(&definition, &from, &to, strategy, &via, with_cost),
        Commands::Skeleton { definition, output } => skeleton(&definition, output.as_deref()),
        Commands::Goto {
            definition,
            to,
            spawn,
            from,
            refresh,
            strategy,
            via,
        } => {
            let mut options = GotoOptions::new().via(via).refresh(refresh);
            if let Some(strategy) = strategy {
                options = options.strategy(strategy);
            }
            goto(&definition, &to, &spawn, from, options).await
        }
    }
}

fn load_definition(path: &Path) -> Result<ProductConfig> {
    ConfigLoader::new()
        .load_from_path(path)
        .with_context(|| format!("loading {}", path.display()))
}

fn check(path: &Path) -> Result<()> {
    let config = load_definition(path)?;
    let context = ModeContext::from_config(&config)?;
    let graph = context.graph();

    println!(
        "{}: {} modes, {} edges, {} prompts, {} scripted transitions",
        path.display(),
        graph.node_count(),
        graph.edge_count(),
        context.prompts().len(),
        context.transitions().len()
    );

    for mode in graph.modes() {
        if context.prompts().expected_prompt(mode).is_none() {
            warn!("Mode {} has no prompt; arrival there cannot be verified", mode);
        }
    }
    for edge in graph.edges() {
        if !context.transitions().contains(&edge.from, &edge.to) {
            println!("  no transition: {} -> {}", edge.from, edge.to);
        }
    }
    Ok(())
}

fn plan(
    path: &Path,
    from: &Mode,
    to: &Mode,
    strategy: Option<Strategy>,
    via: &[Mode],
    with_cost: bool,
) -> Result<()> {
    let config = load_definition(path)?;
    let graph = config.build_graph()?;
    let strategy = strategy.unwrap_or(config.settings.default_strategy);
    let planned = graph.get_path(from, to, strategy, via)?;

    if planned.is_empty() {
        println!("already in {}", to);
        return Ok(());
    }

    let rendered: Vec<String> = if with_cost {
        planned
            .with_cost()
            .into_iter()
            .map(|(mode, cost)| format!("{}({})", mode, cost))
            .collect()
    } else {
        planned.names()
    };
    println!("{}", rendered.join(" -> "));
    println!(
        "{} hops, total cost {} ({})",
        planned.hop_count(),
        planned.total_cost(),
        strategy
    );
    Ok(())
}

fn skeleton(path: &Path, output: Option<&Path>) -> Result<()> {
    let config = load_definition(path)?;
    let graph = config.build_graph()?;
    let source = modepilot::skeleton::generate(&graph);

    match output {
        Some(out) => {
            fs::write(out, source).with_context(|| format!("writing {}", out.display()))?;
            info!("Wrote {} stubs to {}", graph.edge_count(), out.display());
        }
        None => print!("{}", source),
    }
    Ok(())
}

async fn goto(
    path: &Path,
    target: &Mode,
    spawn: &str,
    from: Option<Mode>,
    options: GotoOptions,
) -> Result<()> {
    let config = load_definition(path)?;
    let context = ModeContext::from_config(&config)?;

    let mut parts = spawn.split_whitespace();
    let Some(command) = parts.next() else {
        bail!("--spawn needs a command");
    };
    let args: Vec<String> = parts.map(String::from).collect();
    let console = PtyConsole::spawn(command, &args)?;

    let mut manager = context.manager(console);
    if let Some(mode) = from {
        manager = manager.with_initial_mode(mode);
    }

    let cancel = manager.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling after the current hop");
            cancel.cancel();
        }
    });

    let report = manager.goto_mode(target, options).await?;
    println!(
        "reached {} in {} hops ({:.1}s): {}",
        report.reached,
        report.hops_executed,
        report.elapsed.as_secs_f64(),
        report.path.names().join(" -> ")
    );
    Ok(())
}
