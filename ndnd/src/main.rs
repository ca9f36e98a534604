use std::process;

use clap::{Arg, Command};
use log::{error, info};
use tokio::signal;

use ndnd::config::Config;
use ndnd::daemon::Daemon;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let matches = Command::new("ndnd")
        .version("0.1.0")
        .about("NDN forwarding daemon")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/ndnd/ndnd.conf"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    info!("Starting NDN forwarding daemon");
    info!("Config file: {}", config_path);

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    // the sender is what face implementations clone to deliver packets; it is
    // kept alive here so the loop survives until shutdown
    let (mut daemon, _face_events) = match Daemon::new(&config) {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to initialize forwarder: {}", e);
            process::exit(1);
        }
    };

    tokio::select! {
        _ = daemon.run() => {}
        _ = signal::ctrl_c() => info!("Shutting down NDN forwarding daemon"),
    }
}
