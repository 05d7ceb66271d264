// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use fill_light::backends::camera::{CameraBackendType, get_backend_for_type};
use fill_light::backends::permission::{
    self, DeviceNodePermission, PermissionProvider, PortalPermission, StaticPermission,
};
use fill_light::{
    CaptureSessionController, Config, DirectoryPhotoLibrary, FillLightSettings, SessionOptions,
};
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

#[derive(Parser)]
#[command(name = "fill-light")]
#[command(about = "Selfie camera that turns the screen into a fill light")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Camera backend (defaults to the config file setting)
    #[arg(long, global = true, value_enum)]
    backend: Option<CameraBackendType>,

    /// How camera access is decided
    #[arg(long, global = true, value_enum)]
    permission: Option<PermissionArg>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fill light in the terminal (default)
    Terminal,

    /// List available cameras
    List,

    /// Take a photo
    Photo {
        /// Output directory (default: ~/Pictures/fill-light)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PermissionArg {
    /// XDG desktop portal
    Portal,
    /// Device node access
    Device,
    /// Always granted
    Granted,
    /// Always denied
    Denied,
}

impl PermissionArg {
    fn provider(self) -> Arc<dyn PermissionProvider> {
        match self {
            PermissionArg::Portal => Arc::new(PortalPermission::new()),
            PermissionArg::Device => Arc::new(DeviceNodePermission::new()),
            PermissionArg::Granted => Arc::new(StaticPermission::granted()),
            PermissionArg::Denied => Arc::new(StaticPermission::denied()),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=fill_light=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let permission = cli
        .permission
        .map(PermissionArg::provider)
        .unwrap_or_else(permission::default_provider);

    match cli.command {
        Some(Commands::List) => cli::list_cameras(config.backend),
        Some(Commands::Photo { output }) => {
            let runtime = tokio::runtime::Runtime::new()?;
            let directory = output.unwrap_or_else(|| config.photo_directory());
            let controller = build_controller(&config, permission, directory);
            cli::take_photo(&runtime, controller)
        }
        Some(Commands::Terminal) | None => {
            let runtime = tokio::runtime::Runtime::new()?;
            let controller = build_controller(&config, permission, config.photo_directory());
            let settings = FillLightSettings::default().with_mirror(config.mirror_preview);
            fill_light::terminal::run(&runtime, controller, settings)
        }
    }
}

fn build_controller(
    config: &Config,
    permission: Arc<dyn PermissionProvider>,
    photo_directory: PathBuf,
) -> CaptureSessionController {
    CaptureSessionController::new(
        get_backend_for_type(config.backend),
        permission,
        Arc::new(DirectoryPhotoLibrary::new(photo_directory)),
        SessionOptions::from(config),
    )
}
