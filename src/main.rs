//! # OpenLRS RX
//!
//! OpenLRSng receiver running against a simulated RFM22B and transmitter.
//!
//! The receiver binds (or loads stored bind data), then hops in step with
//! the transmitter and logs decoded channels and link status.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use openlrs_rx::config::{Config, LoggingConfig};
use openlrs_rx::driver::Driver;
use openlrs_rx::error::LinkError;
use openlrs_rx::openlrs::packet::ChannelFrame;
use openlrs_rx::platform::{ChannelConsumer, SystemClock, WatchdogFlag};
use openlrs_rx::sim::{SimulatedRfm22, SimulatedTransmitter};
use openlrs_rx::storage::{BindStore, FileBindStore};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Period of the watchdog supervisor
const WATCHDOG_CHECK_MS: u64 = 1000;

/// Number of frames between channel log messages
const CHANNEL_LOG_EVERY: u64 = 500;

/// Consumer that logs decoded channels
#[derive(Debug, Default)]
struct LoggingConsumer {
    frames: u64,
}

impl ChannelConsumer for LoggingConsumer {
    fn update_channels(&mut self, frame: &ChannelFrame) {
        if self.frames % CHANNEL_LOG_EVERY == 0 {
            debug!("Frame {}: {:?}", self.frames, frame.channels());
        }
        self.frames += 1;
    }
}

/// Install console logging plus an optional daily log file
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = if config.dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.dir, "openlrs-rx.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Main entry point for the OpenLRS receiver
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument or `config/default.toml`)
///    - Set up logging
///    - Create the simulated chip and transmitter, probe the chip
///
/// 2. **Run**
///    - Radio task: bind/setup, then the polling loop (blocking thread)
///    - Transmitter task: one packet per transmit interval
///    - Supervisor: checks the radio task's watchdog keep-alive
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C sets the stop flag; tasks finish their current iteration
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The transceiver is not an RFM22B
/// - The radio task fails
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);
    info!("OpenLRS RX v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = FileBindStore::new(&config.storage.bind_file);
    let stored = store.load().ok().flatten().filter(|params| params.is_valid());

    let chip = SimulatedRfm22::new();
    chip.set_rssi(config.simulator.rssi);
    let transmitter = match stored {
        Some(params) if !config.bind.force => {
            info!("Simulated transmitter reuses stored bind data");
            SimulatedTransmitter::new(chip.clone(), params).already_bound()
        }
        _ => SimulatedTransmitter::new(chip.clone(), config.simulator.session()),
    };
    let tx_period = Duration::from_micros(u64::from(transmitter.interval_us()));

    let watchdog = WatchdogFlag::new();
    let mut driver = Driver::init(
        chip.clone(),
        config.radio.gpio_direction,
        SystemClock::new(),
        watchdog.clone(),
        store,
    )?
    .with_status_log_interval(config.link.status_log_interval_ms);
    chip.attach_interrupt(driver.interrupt_handle());
    driver.register_consumer(Box::new(LoggingConsumer::default()))?;

    let stop = Arc::new(AtomicBool::new(false));

    let tx_stop = Arc::clone(&stop);
    let tx_task = tokio::spawn(async move {
        let mut transmitter = transmitter;
        let mut ticker = interval(tx_period);
        while !tx_stop.load(Ordering::Acquire) {
            ticker.tick().await;
            transmitter.tick();
        }
        transmitter.counters()
    });

    let wd_stop = Arc::clone(&stop);
    let supervisor = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(WATCHDOG_CHECK_MS));
        ticker.tick().await;
        while !wd_stop.load(Ordering::Acquire) {
            ticker.tick().await;
            if !watchdog.take() {
                warn!("Radio task missed its watchdog keep-alive");
            }
        }
    });

    let radio_stop = Arc::clone(&stop);
    let bind = config.bind.clone();
    let poll_interval_ms = config.link.poll_interval_ms;
    let mut radio_task = tokio::task::spawn_blocking(move || -> openlrs_rx::error::Result<()> {
        loop {
            match driver.setup(bind.force, bind.timeout_ms) {
                Ok(()) => break,
                Err(LinkError::NotBound) => {
                    if radio_stop.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    warn!("No transmitter bound yet, waiting again");
                }
                Err(e) => return Err(e),
            }
        }
        driver.run(&radio_stop, poll_interval_ms)
    });

    info!("Press Ctrl+C to exit");

    let finished = tokio::select! {
        result = &mut radio_task => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            None
        }
    };

    stop.store(true, Ordering::Release);
    let radio_result = match finished {
        Some(result) => result,
        None => radio_task.await,
    };

    let (sent, heard) = tx_task.await?;
    supervisor.await?;
    info!("Transmitter sent {} packets, receiver accepted {}", sent, heard);

    radio_result.context("Radio task panicked")??;
    Ok(())
}
