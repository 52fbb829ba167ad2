//! CARI Dummy Device
//!
//! Emulates a CARI radio front-end on the local network so client software
//! can be developed without hardware.
//!
//! Usage:
//!   cari-dummy                    run with ~/.config/cari-dummy/settings.json
//!   cari-dummy --config <file>    run with the given settings file
//!   cari-dummy --init             write the stock settings file and exit

mod settings;

use std::path::PathBuf;

use anyhow::Context;
use cari_protocol::ProtocolVersion;
use cari_sim::{ControlLoop, Device, DeviceChannels, DeviceModel, LoopCommand};
use settings::Settings;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum Action {
    Run(Option<PathBuf>),
    Init,
}

fn parse_args() -> anyhow::Result<Action> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(Action::Run(None)),
        Some("--init") => Ok(Action::Init),
        Some("--config") => {
            let path = args.next().context("--config needs a file path")?;
            Ok(Action::Run(Some(PathBuf::from(path))))
        }
        Some(other) => anyhow::bail!("Unknown argument: {}", other),
    }
}

fn init_settings() -> anyhow::Result<()> {
    let path = Settings::settings_path().context("Could not determine settings path")?;
    Settings::default().save_to(&path)?;
    tracing::info!("Wrote stock settings to {}", path.display());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cari_dummy=info,cari_protocol=info,cari_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match parse_args()? {
        Action::Init => return init_settings(),
        Action::Run(Some(path)) => Settings::load_from(&path)?,
        Action::Run(None) => Settings::load()?,
    };

    let device = Device::from_config(&settings.device).context("Invalid device settings")?;
    if device.version() != ProtocolVersion::V1_1 {
        tracing::warn!(
            "Reporting CARI version {}, clients may expect {}",
            device.version(),
            ProtocolVersion::V1_1
        );
    }

    tracing::info!("Starting CARI dummy device");
    for line in device.to_string().lines() {
        tracing::info!("{}", line);
    }

    let mut channels = DeviceChannels::bind(&settings.channels).await;
    for (kind, status) in channels.statuses() {
        tracing::info!("{} channel: {}", kind, status);
    }

    let Some(control) = channels.take_control() else {
        tracing::error!("Control channel unavailable, waiting for Ctrl-C");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    };

    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let control_loop = ControlLoop::new(
        control,
        DeviceModel::new(device),
        settings.channels.poll_interval(),
    );
    let task = tokio::spawn(control_loop.run(cmd_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");

    // The loop may already be gone if its channel closed
    let _ = cmd_tx.send(LoopCommand::Shutdown).await;
    let stats = task.await?;
    tracing::info!(
        "Served {} requests ({} dropped)",
        stats.requests,
        stats.dropped
    );

    Ok(())
}
