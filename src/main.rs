//! sill
//!
//! A reparenting X11 window manager with window groups, most-recently-used
//! cycling and incremental search menus.

mod config;
mod shared;
mod wm;
mod x11_async;

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::wm::display::X11Display;
use crate::wm::{RunState, WindowManager};
use crate::x11_async::X11Readiness;

/// Command line options
#[derive(Debug, Parser)]
#[command(name = "sill", version, about = "Reparenting X11 window manager")]
struct Args {
    /// Configuration file (default: $XDG_CONFIG_HOME/sill/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// X display to manage (default: $DISPLAY)
    #[arg(short, long)]
    display: Option<String>,

    /// New windows join the active group
    #[arg(short, long)]
    sticky: bool,

    /// Overlay font
    #[arg(short, long)]
    font: Option<String>,
}

/// Why the event loop stopped
enum Exit {
    Quit,
    Restart,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sill=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting sill {}", env!("CARGO_PKG_VERSION"));

    match run(&args).await {
        Ok(Exit::Quit) => {
            info!("Exiting");
            Ok(())
        }
        Ok(Exit::Restart) => restart(),
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}

async fn run(args: &Args) -> Result<Exit> {
    let mut config = Config::load(args.config.as_deref())?;
    if args.sticky {
        config.general.sticky_groups = true;
    }
    if let Some(font) = &args.font {
        config.general.font = font.clone();
    }

    let display = X11Display::connect(args.display.as_deref(), &config.general.font, &config.colors)?;
    let readiness = X11Readiness::new(&display.connection())?;

    let mut manager = WindowManager::new(display, config, args.display.clone());
    manager.setup()?;

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    info!("Starting main event loop");
    let exit = loop {
        manager.process_pending()?;
        match manager.run_state() {
            RunState::Running => {}
            RunState::Restart => break Exit::Restart,
            RunState::Quit => break Exit::Quit,
        }

        tokio::select! {
            () = readiness.wait_readable() => {}
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break Exit::Quit;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break Exit::Quit;
            }
        }
    };

    manager.shutdown()?;
    Ok(exit)
}

/// Replace this process with a fresh copy started with the same arguments
fn restart() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the running binary")?;
    info!("Restarting {:?}", exe);
    let err = Command::new(&exe).args(std::env::args_os().skip(1)).exec();
    Err(err).with_context(|| format!("Failed to re-execute {:?}", exe))
}
