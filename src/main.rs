mod audio;
mod charm;
mod config;
mod control;
mod core;
mod error;
mod glyph;
mod physics;
mod render;
mod spatial;
mod tilt;
mod types;
mod ui;

use std::{fs::File, path::PathBuf};

use clap::Parser;

use crate::{
    audio::TerminalChime, config::SimConfig, core::Simulation, render::Filter,
    types::ColorChoice,
};

/// Shake floating charms around a photo card in the terminal.
#[derive(Parser, Debug)]
#[command(name = "charmshake", version, about, long_about = None)]
struct Args {
    /// JSON configuration file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial charm text
    #[arg(long, default_value = "")]
    charms: String,

    /// Charm color: #RRGGBB or "rainbow"
    #[arg(long)]
    color: Option<ColorChoice>,

    /// Photo filter: none, ccd, mono, blur, glow, 8k
    #[arg(long)]
    filter: Option<Filter>,

    /// Seed for spawn positions and shake directions
    #[arg(long)]
    seed: Option<u64>,

    /// Treat the host as a handheld device so tilt drives gravity
    #[arg(long)]
    mobile: bool,

    /// Start with motion and orientation sensors turned off
    #[arg(long)]
    no_sensors: bool,

    /// Ring the terminal bell on shake cues
    #[arg(long)]
    bell: bool,

    /// Write logs here; stderr would garble the card
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        let file = File::create(path)?;
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }

    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if args.color.is_some() {
        config.charm_color = args.color;
    }
    if let Some(filter) = args.filter {
        config.filter = filter;
    }
    config.mobile |= args.mobile;

    let mut sim = Simulation::new(config, args.seed, Box::new(TerminalChime::new(args.bell)));
    sim.set_spec(&args.charms);
    if args.no_sensors {
        sim.sensor_unavailable("disabled on the command line");
    }
    log::info!("starting with charms {:?}", sim.spec().concat());

    ui::run(sim)
}
