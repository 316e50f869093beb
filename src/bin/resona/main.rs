//! resona - play the physical models from the terminal
//!
//! Run with: cargo run -- [string|bowed|wind|gong|bell|plate|membrane|bar] [--sympathetic|--drone] [--demo]

mod app;
mod ui;

use color_eyre::eyre::{eyre, Result as EyreResult};
use log::LevelFilter;
use resona::{
    model::{ModalType, SympatheticTuning},
    synth::InstrumentKind,
    InstrumentConfig,
};

use app::Resona;

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    init_logging()?;

    let mut config = InstrumentConfig::default().with_polyphony(12);
    let mut demo = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--demo" => demo = true,
            "--sympathetic" => config = config.with_sympathetic(SympatheticTuning::Harmonic, 65.41),
            "--drone" => config = config.with_sympathetic(SympatheticTuning::Drone, 73.42),
            name => config = config.with_kind(parse_kind(name)?),
        }
    }

    Resona::new(config).demo(demo).run()
}

/// Warnings only by default; the TUI owns the terminal. `RESONA_LOG` picks
/// another level.
fn init_logging() -> EyreResult<()> {
    let level = std::env::var("RESONA_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|e| eyre!("failed to initialise logging: {e}"))
}

fn parse_kind(name: &str) -> EyreResult<InstrumentKind> {
    Ok(match name {
        "string" => InstrumentKind::String,
        "bowed" => InstrumentKind::Bowed,
        "wind" => InstrumentKind::Wind,
        "gong" => InstrumentKind::Modal(ModalType::Gong),
        "bell" => InstrumentKind::Modal(ModalType::Bell),
        "plate" => InstrumentKind::Modal(ModalType::Plate),
        "membrane" => InstrumentKind::Modal(ModalType::Membrane),
        "bar" => InstrumentKind::Modal(ModalType::Bar),
        other => return Err(eyre!("unknown instrument '{other}'")),
    })
}
