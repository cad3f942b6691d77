//! uplinkd - connectivity supervisor daemon
//!
//! Wires the concrete adapters together and hands them to the cooperative
//! runtime. All coupling/factory logic lives here, separated from the
//! business logic in the library.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tokio::sync::mpsc;
use tracing::{error, info};
use uplink::device::{GpioButton, SysfsLed, WlanLink};
use uplink::provisioning::portal::HttpPortal;
use uplink::transport::mqtt::MqttSessionClient;
use uplink::{ConfigStore, Exit, RetryPolicy, Runtime, Settings, Supervisor, UplinkResult};

/// Connectivity supervisor for network-attached embedded devices
#[derive(Parser)]
#[command(name = "uplinkd")]
#[command(about = "Connectivity supervisor for network-attached embedded devices")]
#[command(version)]
struct Cli {
    /// Settings file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the supervisor
    Run,
    /// Validate settings
    Config {
        /// Show the resolved settings
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    uplink::logging::init_default_logging();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            error!("failed to load settings: {err}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_supervisor(settings).await,
        Commands::Config { show } => handle_config_command(settings, show),
    };

    if let Err(err) = result {
        error!("command failed: {err}");
        process::exit(1);
    }
}

async fn run_supervisor(settings: Settings) -> UplinkResult<()> {
    info!(
        device = %settings.device.name,
        "starting uplink supervisor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut runtime = build_runtime(settings);

    tokio::select! {
        exit = runtime.run() => match exit? {
            Exit::FactoryReset => restart_process(),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            Ok(())
        }
    }
}

/// Bootstrap factory: builds the runtime with its concrete adapters
fn build_runtime(settings: Settings) -> Runtime<MqttSessionClient> {
    let store = ConfigStore::new(&settings.storage.config_path);
    let config = store.load();

    let (events_tx, events_rx) = mpsc::channel(16);
    let portal = Box::new(HttpPortal::new(
        settings.portal.listen.clone(),
        settings.device.name.clone(),
        events_tx,
    ));

    let supervisor = Supervisor::new(
        MqttSessionClient::new(),
        RetryPolicy::default(),
        &settings.device.name,
    );

    let link = Box::new(WlanLink::new(
        &settings.link.interface,
        &settings.link.credentials_path,
    ));
    let indicator = Box::new(SysfsLed::new(&settings.indicator.led_path));
    let button = Box::new(GpioButton::new(
        &settings.reset.input_path,
        settings.reset.active_low,
    ));

    Runtime::new(
        settings, store, config, supervisor, portal, events_rx, link, indicator, button,
    )
}

/// Replace the current process with a fresh copy of itself. Only reached
/// after a factory reset has wiped the persisted identity.
fn restart_process() -> UplinkResult<()> {
    use std::os::unix::process::CommandExt;

    info!("restarting after factory reset");
    let exe = std::env::current_exe()?;
    let err = process::Command::new(exe)
        .args(std::env::args_os().skip(1))
        .exec();
    // exec only returns on failure
    Err(err.into())
}

fn handle_config_command(settings: Settings, show: bool) -> UplinkResult<()> {
    if show {
        println!("{}", toml::to_string_pretty(&settings)?);
    }
    info!("settings validated");
    Ok(())
}
