//! Head pose tracking demo driven by a synthetic landmark detector.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_tracking::{
    config::{Config, EXAMPLE_CONFIG},
    detection::DetectorWorker,
    face_model::ModelVariant,
    synthetic::SyntheticDetector,
};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Number of frames to process
    #[arg(short, long, default_value = "300")]
    frames: u64,

    /// Frame width, overrides the configuration
    #[arg(long)]
    width: Option<u32>,

    /// Frame height, overrides the configuration
    #[arg(long)]
    height: Option<u32>,

    /// Landmark model (full, reduced), overrides the configuration
    #[arg(short, long)]
    variant: Option<ModelVariant>,

    /// Pixel noise added to the synthetic landmarks, overrides the configuration
    #[arg(short, long)]
    noise: Option<f64>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.dump_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Head Pose Tracking");

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {config_path}");
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(width) = args.width {
        config.camera.width = width;
    }
    if let Some(height) = args.height {
        config.camera.height = height;
    }
    if let Some(variant) = args.variant {
        config.solver.variant = variant;
    }
    if let Some(noise) = args.noise {
        config.detector.noise = noise;
    }

    let mut pipeline = config.build_pipeline().context("Invalid configuration")?;
    let detector = SyntheticDetector::new(
        config.camera.height,
        config.camera.width,
        config.solver.variant,
        config.detector.noise,
        config.detector.seed,
    )?;
    let worker = DetectorWorker::spawn(detector, config.detector.queue_capacity)?;

    let mut solved = 0u64;
    for frame in 0..args.frames {
        worker.submit(frame)?;
        let landmarks = worker.recv()?;

        match pipeline.process(landmarks.as_ref()) {
            Some(estimate) => {
                solved += 1;
                let raw = estimate.angles;
                let steady = estimate.steady_angles;
                println!(
                    "{frame:5}  raw pitch {:7.2} yaw {:7.2} roll {:7.2}  steady pitch {:7.2} yaw {:7.2} roll {:7.2}",
                    raw.pitch, raw.yaw, raw.roll, steady.pitch, steady.yaw, steady.roll
                );
            }
            None => println!("{frame:5}  no face"),
        }
    }

    info!("Solved {solved} of {} frames", args.frames);
    Ok(())
}
