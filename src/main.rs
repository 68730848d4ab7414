use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::info;
use mac_address::MacAddress;
use router_presence::config::AppConfig;
use router_presence::{ConnectedDevice, DevicePresence};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(version, about = "Report which devices are connected to the router")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print devices as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the devices connected right now
    List,
    /// Exit successfully iff the device is connected
    Check { mac: MacAddress },
    /// Poll at the configured interval and print every result
    Watch {
        /// Stop after this many results
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let config_contents = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read {}", cli.config.display()))?;
    let config = AppConfig::from_toml(&config_contents)?;

    let presence = DevicePresence::new(config.ssh_settings(), &config.clientlist_path());
    presence
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}@{}", presence.user(), presence.host()))?;

    let result = match cli.command {
        Command::List => {
            let devices = presence.get_connected_devices().await?;
            print_devices(&devices, cli.json)
        }
        Command::Check { mac } => {
            let connected = presence.is_device_connected(mac).await?;
            println!("{} {}", mac, if connected { "connected" } else { "not connected" });
            if !connected {
                presence.disconnect().await;
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Watch { count } => watch(&presence, config.poll_interval(), count, cli.json).await,
    };

    presence.disconnect().await;
    result
}

async fn watch(
    presence: &DevicePresence,
    interval: std::time::Duration,
    count: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    presence.start_polling(interval, move |devices| {
        let _ = tx.send(devices);
    })?;

    let mut received = 0;
    loop {
        tokio::select! {
            Some(devices) = rx.recv() => {
                print_devices(&devices, json)?;
                received += 1;
                if count.is_some_and(|n| received >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    presence.stop_polling();
    Ok(())
}

fn print_devices(devices: &HashSet<ConnectedDevice>, json: bool) -> anyhow::Result<()> {
    let mut devices: Vec<_> = devices.iter().collect();
    devices.sort_by_key(|d| d.mac_address().bytes());

    if json {
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        println!("{} devices", devices.len());
        for device in devices {
            println!("  {}", device);
        }
    }
    Ok(())
}
