use anyhow::{Context, bail};
use biosim_config::{build_from_config, load_wiring};
use biosim_kernel::{Overrides, RunSummary, WiringBuilder, World};
use biosim_packs::neuro::{Eye, Lgn, SuperiorColliculus};
use biosim_solvers::SolverRegistry;
use biosim_tools::{RunController, WorldInspector};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "biosim-cli", about = "CLI tool for biosim worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, built-in solvers and module types
    Info,
    /// Run the eye -> lgn -> superior colliculus chain built in code
    Demo {
        #[arg(short, long, default_value = "2")]
        steps: u64,
        #[arg(long, default_value = "0.1")]
        dt: f64,
    },
    /// Load a wiring document, simulate, print the summary as JSON
    Run {
        /// YAML or JSON wiring document
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, default_value = "10")]
        steps: u64,
        #[arg(long, default_value = "0.1")]
        dt: f64,
        /// Split the run into chunks of this many steps
        #[arg(long)]
        chunk: Option<u64>,
        /// Solver override, `key=value` with a JSON value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Load a wiring document and print modules and committed edges
    Wiring {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("biosim-cli v{}", env!("CARGO_PKG_VERSION"));
            let solvers = SolverRegistry::with_builtins();
            println!("solvers: {}", solvers.builtin_names().collect::<Vec<_>>().join(", "));
            let modules = biosim_packs::registry();
            println!("modules: {}", modules.type_names().collect::<Vec<_>>().join(", "));
        }
        Commands::Demo { steps, dt } => {
            println!("Demo: eye -> lgn -> sc, steps={steps}, dt={dt}");

            let mut world = World::default();
            let sc = SuperiorColliculus::new();
            let probe = sc.probe();
            let mut wb = WiringBuilder::new(&mut world);
            wb.add("eye", Eye::new())?
                .add("lgn", Lgn::new())?
                .add("sc", sc)?;
            wb.connect("eye.out.visual_stream", ["lgn.in.retina"])
                .connect("lgn.out.thalamus", ["sc.in.vision"]);
            wb.apply()?;

            for route in world.describe_wiring() {
                let (source, topic, destination) = route.as_tuple();
                println!("  {source} --{topic}--> {destination}");
            }
            let summary = world.simulate(steps, dt)?;
            print_summary(&summary)?;
            println!("sc received {} signals, last={}", probe.count(), probe.last().unwrap_or_default());
        }
        Commands::Run {
            config,
            steps,
            dt,
            chunk,
            overrides,
        } => {
            let mut world = load_world(&config)?;
            if !overrides.is_empty() {
                let overrides = parse_overrides(&overrides)?;
                world.apply_solver_overrides(&overrides)?;
            }
            if cli.verbose {
                world.on(|event, payload| {
                    tracing::debug!(%event, %payload, "event");
                    Ok(())
                });
            }

            match chunk {
                None => {
                    let summary = world.simulate(steps, dt)?;
                    print_summary(&summary)?;
                }
                Some(chunk) => {
                    let mut controller = RunController::new(steps, dt, chunk)?;
                    controller.run(&mut world, |ctl, summary| {
                        let progress = ctl.progress();
                        tracing::info!(
                            completed = progress.completed,
                            total = progress.total,
                            time = summary.time,
                            "chunk"
                        );
                    })?;
                    println!("{}", serde_json::to_string_pretty(&controller.progress())?);
                }
            }
            println!("{}", WorldInspector::summary(&world));
        }
        Commands::Wiring { config } => {
            let world = load_world(&config)?;
            println!("{}", serde_json::to_string_pretty(&WorldInspector::to_json(&world))?);
        }
    }

    Ok(())
}

fn load_world(path: &Path) -> anyhow::Result<World> {
    let config = load_wiring(path).with_context(|| format!("loading {}", path.display()))?;
    let mut world = World::default();
    let report = build_from_config(
        &mut world,
        &config,
        &biosim_packs::registry(),
        &SolverRegistry::with_builtins(),
    )
    .with_context(|| format!("building world from {}", path.display()))?;
    tracing::info!(
        modules = report.modules.len(),
        edges = report.edges,
        solver = world.solver().name(),
        "world ready"
    );
    Ok(world)
}

fn parse_overrides(pairs: &[String]) -> anyhow::Result<Overrides> {
    let mut overrides = Overrides::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("override '{pair}' is not KEY=VALUE");
        };
        let value = serde_json::from_str(value)
            .with_context(|| format!("override '{key}': value is not JSON"))?;
        overrides.insert(key.trim().to_string(), value);
    }
    Ok(overrides)
}

fn print_summary(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_parse_json_values() {
        let parsed = parse_overrides(&["water.initial=0.5".into(), " max_dt =1".into()]).unwrap();
        assert_eq!(parsed["water.initial"], json!(0.5));
        assert_eq!(parsed["max_dt"], json!(1));
        assert!(parse_overrides(&["novalue".into()]).is_err());
        assert!(parse_overrides(&["k=fast".into()]).is_err());
    }

    #[test]
    fn bundled_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/brain.yaml");
        let mut world = load_world(&path).unwrap();
        assert_eq!(world.describe_wiring().len(), 2);
        let summary = world.simulate(4, 0.5).unwrap();
        let oxygen = summary.get_f64("oxygen").unwrap();
        assert!((oxygen - 0.6).abs() < 1e-9);
    }
}
