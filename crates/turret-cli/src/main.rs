//! `turret` – operator entry point for the targeting controller.
//!
//! ```text
//! turret run --demo [--cycles N]      drive the loop against the simulated rig
//! turret run --image FILE             serve a still image through the PGM store
//! turret scan FILE [--strategy S]     one scan + verification, JSON outcome
//! turret config show|init             inspect or write ~/.turret/config.toml
//! ```
//!
//! Ctrl-C stops the loop after the current cycle.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use turret_hal::sim::{ContrastEngine, SimCamera, SimRig, SimWorld};
use turret_hal::{
    CameraSource, ImageSource, MemoryFrameStore, PgmStore, StillCamera, TimedEngine,
    pgm::load_image_file,
};
use turret_runtime::{DetectionLoop, init_tracing};
use turret_types::{ActuationCommand, CycleReport, IMAGE_WIDTH, ScanOutcome};
use turret_vision::{RegionProbe, SamplingProbe, StrategyKind, scan::build_strategy};

use config::Config;

#[derive(Parser)]
#[command(name = "turret", version, about = "Hierarchical region search & targeting controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the detection loop.
    Run {
        /// Use the simulated camera and turret.
        #[arg(long, conflicts_with = "image")]
        demo: bool,
        /// Serve this image file as every captured frame.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Stop after this many cycles.
        #[arg(long)]
        cycles: Option<u64>,
        /// Override the configured search strategy.
        #[arg(long)]
        strategy: Option<StrategyKind>,
    },
    /// Scan one image file and print the outcome as JSON.
    Scan {
        file: PathBuf,
        #[arg(long)]
        strategy: Option<StrategyKind>,
    },
    /// Inspect or write the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write the defaults to ~/.turret/config.toml.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let telemetry = init_tracing("turret");

    let result = match cli.command {
        Command::Run {
            demo,
            image,
            cycles,
            strategy,
        } => run(demo, image, cycles, strategy, telemetry.is_exporting()),
        Command::Scan { file, strategy } => scan(&file, strategy),
        Command::Config { action } => config_cmd(action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

fn run(
    demo: bool,
    image: Option<PathBuf>,
    cycles: Option<u64>,
    strategy: Option<StrategyKind>,
    exporting: bool,
) -> Result<(), String> {
    let mut cfg = config::effective()?;
    if let Some(kind) = strategy {
        cfg.strategy = kind;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after this cycle …".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| format!("Failed to install Ctrl-C handler: {}", e))?;

    print_banner(&cfg, exporting);

    let world = SimWorld::shared();
    let rig = SimRig::new(world.clone()).build();
    let engine = TimedEngine::spawn(ContrastEngine::default(), cfg.inference_timeout())
        .map_err(|e| e.to_string())?;

    if demo {
        let store = MemoryFrameStore::new();
        let source = CameraSource::new(SimCamera::new("sim-cam", world.clone()), store.clone(), IMAGE_WIDTH);
        let probe = SamplingProbe::new(store, engine);
        let lp = DetectionLoop::new(cfg.loop_config(), source, probe, rig);
        drive(lp, cycles, &shutdown);

        let w = world.lock().unwrap_or_else(|e| e.into_inner());
        println!(
            "{} {} shots, {} aim corrections",
            "simulation:".cyan().bold(),
            w.shots,
            w.aim_commands
        );
        Ok(())
    } else if let Some(path) = image {
        let frame = load_image_file(&path, IMAGE_WIDTH).map_err(|e| e.to_string())?;
        if let Some(parent) = cfg.frame_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create frame directory: {}", e))?;
        }
        let store = PgmStore::new(&cfg.frame_path);
        let reader = store.reader();
        let source = CameraSource::new(StillCamera::from_gray("still", frame), store, IMAGE_WIDTH);
        let probe = SamplingProbe::new(reader, engine);
        let lp = DetectionLoop::new(cfg.loop_config(), source, probe, rig);
        drive(lp, cycles, &shutdown);
        Ok(())
    } else {
        Err("nothing to run: pass --demo or --image FILE".to_string())
    }
}

/// Tick until Ctrl-C or `cycles` completed cycles, honouring each settle hint.
fn drive<S: ImageSource, P: RegionProbe>(
    mut lp: DetectionLoop<S, P>,
    cycles: Option<u64>,
    shutdown: &AtomicBool,
) {
    let retry = lp.controller().config().inter_cycle;
    let mut attempts = 0u64;

    while !shutdown.load(Ordering::SeqCst) {
        if cycles.is_some_and(|n| attempts >= n) {
            break;
        }
        attempts += 1;

        match lp.tick(Instant::now()) {
            Ok(report) => {
                print_report(attempts, &report);
                thread::sleep(Duration::from_millis(report.settle_ms));
            }
            Err(e) => {
                println!("{} {}", format!("[{attempts:>4}]").dimmed(), e.to_string().red());
                thread::sleep(retry);
            }
        }
    }
    info!(cycles = lp.cycles(), "detection loop stopped");
}

fn print_report(n: u64, report: &CycleReport) {
    let outcome = match report.outcome {
        ScanOutcome::Found(d) => format!("target ({},{}) {:.2}", d.row, d.col, d.confidence).green(),
        ScanOutcome::NotFound => "no target".normal(),
    };
    let command = match report.command {
        ActuationCommand::NoOp => "hold".normal(),
        ActuationCommand::Aim { steps } => format!("aim {steps:+}").yellow(),
        ActuationCommand::Fire => "FIRE".red().bold(),
    };
    println!(
        "{} frame {:<4} {:<24} {:<10} {}",
        format!("[{n:>4}]").dimmed(),
        report.frame_id,
        outcome,
        report.state.to_string().cyan(),
        command
    );
}

fn print_banner(cfg: &Config, exporting: bool) {
    println!("{}", "turret targeting controller".bold());
    println!(
        "  strategy {}  threshold {:.2}  aim step {}  cooldown {} ms",
        cfg.strategy.to_string().cyan(),
        cfg.confidence_threshold,
        cfg.aim_step,
        cfg.cooldown().as_millis()
    );
    if exporting {
        println!("  {}", "spans exported over OTLP".green());
    }
    println!("{}", "  Ctrl-C to stop".dimmed());
}

// ─────────────────────────────────────────────────────────────────────────────
// scan
// ─────────────────────────────────────────────────────────────────────────────

fn scan(file: &Path, strategy: Option<StrategyKind>) -> Result<(), String> {
    let cfg = config::effective()?;
    let kind = strategy.unwrap_or(cfg.strategy);

    let frame = load_image_file(file, IMAGE_WIDTH).map_err(|e| e.to_string())?;
    let store = MemoryFrameStore::new();
    let image = store.publish(frame);

    let engine = TimedEngine::spawn(ContrastEngine::default(), cfg.inference_timeout())
        .map_err(|e| e.to_string())?;
    let mut probe = SamplingProbe::new(store, engine);
    let verifier = cfg.verifier();
    let strategy = build_strategy(kind, cfg.scan_config(), verifier);

    let detection = strategy.scan(&mut probe, &image).and_then(|hit| {
        if hit.verified || verifier.verify(&mut probe, &image, hit.region) {
            Some(hit.detection)
        } else {
            warn!(region = %hit.region, "hit rejected by verification");
            None
        }
    });
    info!(strategy = %kind, probes = probe.calls(), found = detection.is_some(), "scan complete");

    let outcome = ScanOutcome::from(detection);
    let json = serde_json::to_string_pretty(&outcome)
        .map_err(|e| format!("Failed to serialize outcome: {}", e))?;
    println!("{json}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

fn config_cmd(action: ConfigAction) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            let cfg = config::effective()?;
            let raw = toml::to_string_pretty(&cfg)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            println!("{} {}", "#".dimmed(), config::config_path().display().to_string().dimmed());
            print!("{raw}");
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = config::config_path();
            if !force && config::load()?.is_some() {
                return Err(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
            }
            config::save(&Config::default())?;
            println!("{} {}", "✓ wrote".green(), path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from(["turret", "run", "--demo", "--cycles", "12", "--strategy", "center-priority"])
            .expect("parse");
        match cli.command {
            Command::Run {
                demo,
                image,
                cycles,
                strategy,
            } => {
                assert!(demo);
                assert!(image.is_none());
                assert_eq!(cycles, Some(12));
                assert_eq!(strategy, Some(StrategyKind::CenterPriority));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn demo_and_image_conflict() {
        assert!(Cli::try_parse_from(["turret", "run", "--demo", "--image", "x.png"]).is_err());
    }

    #[test]
    fn parses_config_init_force() {
        let cli = Cli::try_parse_from(["turret", "config", "init", "--force"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }

    #[test]
    fn demo_loop_fires_at_simulated_target() {
        let world = SimWorld::shared();
        let store = MemoryFrameStore::new();
        let source = CameraSource::new(SimCamera::new("sim-cam", world.clone()), store.clone(), IMAGE_WIDTH);
        let probe = SamplingProbe::new(store, ContrastEngine::default());
        let mut cfg = Config::default().loop_config();
        cfg.targeting.post_aim_settle = Duration::ZERO;
        cfg.targeting.post_fire_settle = Duration::ZERO;
        cfg.targeting.not_ready_settle = Duration::ZERO;
        cfg.targeting.inter_cycle = Duration::ZERO;
        let lp = DetectionLoop::new(cfg, source, probe, SimRig::new(world.clone()).build());

        let stop = AtomicBool::new(false);
        drive(lp, Some(6), &stop);

        assert!(world.lock().unwrap().shots >= 1);
    }
}
