// climasight command line interface
// Runs the occupancy-aware climate dashboard and one-shot regulation queries

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use climasight_cli::{run_pipeline, LoopSummary};
use climasight_core::{regulate, ClimaConfig, Season, SeasonSelector, StopSignal};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "climasight")]
#[command(
    about = "Occupancy-aware heating and cooling setpoints from a camera feed",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short, global = true)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture, detection and regulation pipeline
    Run {
        #[command(flatten)]
        overrides: Overrides,

        /// Synthetic camera, scripted detector and simulated sensor
        #[arg(long)]
        simulate: bool,

        /// Log the dashboard instead of opening a window
        #[arg(long)]
        headless: bool,

        /// Stop after this many captured frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Evaluate the regulation engine once and print the result
    Regulate {
        #[command(flatten)]
        overrides: Overrides,

        /// Number of occupants
        #[arg(long, short)]
        occupancy: u32,

        /// Room temperature in °C (omit for an unknown reading)
        #[arg(long, short, allow_negative_numbers = true)]
        temperature: Option<f64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    ShowConfig {
        /// Output format (toml, json)
        #[arg(long, short, default_value = "toml")]
        format: String,
    },
}

/// Flags that override the configuration file and the environment.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Season: summer, winter, mid_season, or auto for the calendar
    #[arg(long)]
    season: Option<String>,

    /// Hysteresis margin in °C
    #[arg(long)]
    margin: Option<f64>,

    /// Detector confidence floor
    #[arg(long)]
    confidence: Option<f32>,

    /// Detector class id
    #[arg(long)]
    class_id: Option<u32>,

    /// YOLOv8 ONNX model path
    #[arg(long)]
    model: Option<String>,

    /// Camera device index
    #[arg(long)]
    camera_id: Option<u32>,
}

impl Overrides {
    fn apply(&self, config: &mut ClimaConfig) -> anyhow::Result<()> {
        if let Some(season) = &self.season {
            config.season.fixed = if season.eq_ignore_ascii_case("auto") {
                None
            } else {
                Some(season.parse::<Season>().map_err(anyhow::Error::msg)?)
            };
        }
        if let Some(margin) = self.margin {
            config.regulation.margin = margin;
        }
        if let Some(confidence) = self.confidence {
            config.detector.confidence = confidence;
        }
        if let Some(class_id) = self.class_id {
            config.detector.class_id = class_id;
        }
        if let Some(model) = &self.model {
            config.detector.model_path = model.clone();
        }
        if let Some(camera_id) = self.camera_id {
            config.camera.camera_id = camera_id;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.runtime.log_level = level.clone();
    }
    if cli.verbose {
        config.runtime.log_level = "debug".to_string();
    }

    match cli.command {
        Commands::Run { overrides, simulate, headless, max_frames } => {
            overrides.apply(&mut config)?;
            config.runtime.simulate |= simulate;
            config.runtime.headless |= headless;
            if max_frames.is_some() {
                config.runtime.max_frames = max_frames;
            }
            config.validate().context("invalid configuration")?;
            init_tracing(&config.runtime.log_level);
            run(config).await?;
        }
        Commands::Regulate { overrides, occupancy, temperature, json } => {
            overrides.apply(&mut config)?;
            config.validate().context("invalid configuration")?;
            init_tracing(&config.runtime.log_level);
            regulate_once(&config, occupancy, temperature, json)?;
        }
        Commands::ShowConfig { format } => {
            config.validate().context("invalid configuration")?;
            show_config(&config, &format)?;
        }
    }

    Ok(())
}

/// File (if any), then `CLIMASIGHT_*` environment overrides.
fn load_config(path: Option<&str>) -> anyhow::Result<ClimaConfig> {
    let mut config = match path {
        Some(path) => ClimaConfig::from_file(path).with_context(|| format!("loading {}", path))?,
        None => ClimaConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();
}

/// Run the pipeline on a blocking thread until it ends on its own or a shutdown signal
/// arrives.
async fn run(config: ClimaConfig) -> anyhow::Result<()> {
    info!("Starting climasight{}", if config.runtime.simulate { " (simulation)" } else { "" });

    let stop = StopSignal::new();
    let pipeline_stop = stop.clone();
    let mut pipeline = tokio::task::spawn_blocking(move || run_pipeline(&config, pipeline_stop));

    let summary = tokio::select! {
        joined = &mut pipeline => joined.context("pipeline thread panicked")??,
        _ = wait_for_shutdown() => {
            stop.trigger();
            pipeline.await.context("pipeline thread panicked")??
        }
    };

    log_summary(&summary);
    Ok(())
}

fn log_summary(summary: &LoopSummary) {
    info!(
        "Stopped ({:?}): {} frames, {} capture failures, {} regulations, {} relay switches",
        summary.stop_reason,
        summary.frames_captured,
        summary.capture_failures,
        summary.regulations,
        summary.relay_switches
    );
    if let Some(result) = &summary.last_result {
        info!(
            "Last regulation: {} occupants, {} {} target {:.1}°C -> {}",
            result.occupancy,
            result.season,
            result.band_label,
            result.target,
            result.action_text()
        );
    }
    if summary.workers_detached > 0 {
        warn!("{} workers were detached during shutdown", summary.workers_detached);
    }
}

fn regulate_once(
    config: &ClimaConfig,
    occupancy: u32,
    temperature: Option<f64>,
    json: bool,
) -> anyhow::Result<()> {
    let season = SeasonSelector::new(config.season.policy()).current();
    let result = regulate(occupancy, season, temperature, &config.regulation)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Season:      {} ({})", result.season, result.mode.short_label());
    println!(
        "Occupancy:   {} (band {} {} / {})",
        result.occupancy, result.band_index, result.band_label, result.band_state
    );
    println!("Target:      {:.1} °C", result.target);
    println!("Thresholds:  on {:.1} °C, off {:.1} °C", result.threshold_on, result.threshold_off);
    println!("Fan:         {}%", result.fan_level);
    println!("Thermal load: +{:.0} W", result.thermal_load_w);
    match result.temperature {
        Some(t) => println!("Temperature: {:.1} °C", t),
        None => println!("Temperature: unknown"),
    }
    println!("Action:      {}", result.action_text());
    Ok(())
}

fn show_config(config: &ClimaConfig, format: &str) -> anyhow::Result<()> {
    match format {
        "toml" => print!("{}", config.to_toml()?),
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        other => anyhow::bail!("unknown format '{}', expected toml or json", other),
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
