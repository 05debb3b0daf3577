// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use qr_reader::Config;
use qr_reader::backends::camera::{LensFacing, Rotation};
use qr_reader::constants::APP_ID;
use qr_reader::permission::PermissionBackend;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qr-reader")]
#[command(about = "Live QR code reader for the terminal")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Camera name to prefer (substring match)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Lens to capture from
    #[arg(long, value_enum, global = true)]
    lens: Option<LensFacing>,

    /// Display rotation in degrees
    #[arg(long, default_value = "0", value_parser = parse_rotation, global = true)]
    rotation: Rotation,

    /// How camera access is requested
    #[arg(long, value_enum, global = true)]
    permission: Option<PermissionBackend>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Decode QR codes in an image file
    Scan {
        /// Image to decode
        image: PathBuf,
    },
}

fn parse_rotation(value: &str) -> Result<Rotation, String> {
    let degrees: u32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    Rotation::from_degrees(degrees)
        .ok_or_else(|| format!("Rotation must be 0, 90, 180, or 270 (got {})", degrees))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qr_reader=debug, RUST_LOG=info
    init_logging(cli.command.is_none());

    let mut config = Config::load()?;
    if let Some(device) = cli.device {
        config.device = Some(device);
    }
    if let Some(lens) = cli.lens {
        config.lens_facing = lens;
    }
    if let Some(permission) = cli.permission {
        config.permission = permission;
    }

    match cli.command {
        Some(Commands::List) => cli::list_cameras(),
        Some(Commands::Scan { image }) => {
            cli::scan_image(&image, cli.rotation, config.max_decode_dimension)
        }
        None => qr_reader::terminal::run(qr_reader::terminal::ScanOptions {
            config,
            rotation: cli.rotation,
        }),
    }
}

/// The terminal front-end owns the screen, so it logs to a file instead
fn init_logging(to_file: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let log_file = if to_file {
        dirs::cache_dir().and_then(|dir| {
            let dir = dir.join(APP_ID);
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::File::create(dir.join("qr-reader.log")).ok()
        })
    } else {
        None
    };

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init(),
        None if to_file => {
            // Nowhere to write without corrupting the terminal
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .init(),
    }
}
