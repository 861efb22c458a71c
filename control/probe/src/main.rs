//! Surface Probe - Diagnostic Driver for Surface Control Handles
//!
//! Creates a layer against in-process loopback collaborators, pushes its
//! handle through every wire form and back, and reports what crossed the
//! boundary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults
//! surface-probe
//!
//! # Fixed layer id and transform hint, with hex dumps
//! surface-probe --layer-id 42 --transform-hint 3 --hex
//!
//! # With config file
//! surface-probe --config ~/.config/surface-control/config.toml
//!
//! # Verbose logging
//! RUST_LOG=debug surface-probe
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};

use surface_control::{
    default_config_path, load_config_from_path, ConfigSource, LayerRequest, LoopbackComposer,
    Parcel, SurfaceComposerClient, SurfaceControl, SurfaceControlConfig,
};

/// Surface Probe - exercise a surface control handle end to end
#[derive(Parser, Debug)]
#[command(name = "surface-probe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "SURFACE_CONTROL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "SURFACE_CONTROL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Layer id to report instead of the one the compositor assigned
    #[arg(long, value_name = "ID", allow_negative_numbers = true)]
    layer_id: Option<i32>,

    /// Transform hint to set before encoding
    #[arg(short = 't', long, default_value_t = 0)]
    transform_hint: u32,

    /// Layer name
    #[arg(long, default_value = "probe")]
    name: String,

    /// Create a container layer (no buffer producer)
    #[arg(long)]
    container: bool,

    /// Print a hex dump of each encoded parcel
    #[arg(long)]
    hex: bool,
}

/// Initialize logging with tracing
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("surface_probe={level},surface_control={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration; a `--log-level` flag wins over everything else
fn resolve_config(args: &Args) -> Result<SurfaceControlConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path.clone())
        .with_context(|| format!("Failed to load configuration from {path:?}"))?;

    if let Some(ref level) = args.log_level {
        config.log_level.clone_from(level);
        config.set_source(ConfigSource::Cli);
    }
    Ok(config)
}

fn print_layout(label: &str, parcel: &Parcel, dump: bool) {
    println!("{label}: {} bytes, {} objects", parcel.data_size(), parcel.object_count());
    for (index, word) in parcel.data().chunks(4).enumerate() {
        let mut bytes = [0u8; 4];
        bytes[..word.len()].copy_from_slice(word);
        println!("  [{:>3}] {:#010x}", index * 4, u32::from_le_bytes(bytes));
    }
    if dump {
        println!("  hex: {}", hex::encode(parcel.data()));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    init_logging(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        source = %config.source(),
        max_parcel_size = config.parcel.max_size_bytes,
        "Surface probe starting"
    );

    // Session and layer
    let (composer, client) = LoopbackComposer::spawn();
    let session = Arc::new(SurfaceComposerClient::new(client));
    let request = if args.container {
        LayerRequest::container(args.name.clone())
    } else {
        LayerRequest::buffered(args.name.clone(), 64, 64)
    };
    let created = session
        .create_surface(&request)
        .context("Loopback compositor refused to create a layer")?;

    let sc = match args.layer_id {
        Some(layer_id) => SurfaceControl::new(
            created.client(),
            created.handle(),
            created.graphic_buffer_producer(),
            layer_id,
            created.transform_hint(),
        ),
        None => Arc::clone(&created),
    };
    drop(created);
    sc.set_transform_hint(args.transform_hint);
    sc.validate().context("Probe handle is not usable")?;

    let surface = sc.get_surface();
    debug!(surface = ?surface, "Surface cached");

    // Full form
    let mut full = Parcel::with_config(&config.parcel);
    sc.write_to_parcel(&mut full)
        .context("Failed to encode full form")?;
    print_layout("full", &full, args.hex);

    let decoded = SurfaceControl::read_from_parcel(&mut full).context("Failed to decode full form")?;
    if !SurfaceControl::is_same_surface(Some(&sc), Some(&decoded)) {
        bail!("Decoded handle does not denote the original layer");
    }
    if decoded.layer_id() != sc.layer_id() || decoded.transform_hint() != sc.transform_hint() {
        bail!(
            "Decoded scalars differ: layer id {} / {}, transform hint {} / {}",
            decoded.layer_id(),
            sc.layer_id(),
            decoded.transform_hint(),
            sc.transform_hint()
        );
    }
    println!(
        "  decoded: layer id {}, transform hint {}, producer {}",
        decoded.layer_id(),
        decoded.transform_hint(),
        if decoded.graphic_buffer_producer().is_some() { "present" } else { "absent" }
    );

    // Nullable form, present then absent
    let mut nullable = Parcel::with_config(&config.parcel);
    SurfaceControl::write_nullable_to_parcel(&mut nullable, Some(&sc))
        .context("Failed to encode nullable form")?;
    print_layout("nullable", &nullable, args.hex);

    let mut empty = Parcel::with_config(&config.parcel);
    SurfaceControl::write_nullable_to_parcel(&mut empty, None)
        .context("Failed to encode absent nullable form")?;
    print_layout("nullable (absent)", &empty, args.hex);

    let present = SurfaceControl::read_nullable_from_parcel(&mut nullable)
        .context("Failed to decode nullable form")?;
    let absent = SurfaceControl::read_nullable_from_parcel(&mut empty)
        .context("Failed to decode absent nullable form")?;
    if !SurfaceControl::is_same_surface(Some(&sc), present.as_deref()) || absent.is_some() {
        bail!("Nullable form did not round trip");
    }

    // Producer-only form
    let mut producer_only = Parcel::with_config(&config.parcel);
    SurfaceControl::write_surface_to_parcel(Some(&sc), &mut producer_only)
        .context("Failed to encode producer-only form")?;
    print_layout("producer", &producer_only, args.hex);

    // Release
    let live_before = composer.live_layers();
    drop((full, nullable, empty, producer_only));
    drop((decoded, present, surface));
    drop(sc);
    let released = live_before - composer.live_layers();

    info!(released, "Handles dropped");
    println!("released layers: {released}");

    if composer.live_layers() != 0 {
        bail!("{} layer(s) still alive after dropping every handle", composer.live_layers());
    }
    Ok(())
}
