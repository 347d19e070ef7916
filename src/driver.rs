//! # Receiver Driver
//!
//! Ties the transceiver, binding and link state machine into the single
//! polling task that forwards channel data to a consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};
use crate::link::{bind_receive, BindOutcome, InterruptHandle, LinkStateMachine, LinkStatus, ModeCell, PollReport};
use crate::openlrs::bind_data::SessionParameters;
use crate::openlrs::protocol::{format_version, OPENLRSNG_VERSION};
use crate::platform::{ChannelConsumer, Clock, Watchdog};
use crate::rfm22::transport::RegisterTransport;
use crate::rfm22::{GpioDirection, Rfm22};
use crate::storage::BindStore;

/// Default interval between link status log lines (ms)
pub const DEFAULT_STATUS_LOG_INTERVAL_MS: u32 = 5000;

/// OpenLRS receiver driver
pub struct Driver<T, C, W, S> {
    radio: Rfm22<T>,
    clock: C,
    watchdog: W,
    store: S,
    mode: ModeCell,
    params: Option<SessionParameters>,
    link: Option<LinkStateMachine>,
    consumer: Option<Box<dyn ChannelConsumer + Send>>,
    status_log_interval_ms: u32,
    last_status_ms: u32,
}

impl<T, C, W, S> Driver<T, C, W, S>
where
    T: RegisterTransport,
    C: Clock,
    W: Watchdog,
    S: BindStore,
{
    /// Probe the transceiver and load stored session parameters
    ///
    /// # Arguments
    ///
    /// * `transport` - Register transport to the RFM22B
    /// * `gpio_direction` - Antenna switch wiring
    /// * `clock` - Time source of the polling task
    /// * `watchdog` - Keep-alive serviced by the polling task
    /// * `store` - Persistent bind storage
    ///
    /// # Returns
    ///
    /// * `Result<Driver>` - Driver ready for [`Driver::setup`]
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` if no RFM22B answers. An unreadable store
    /// is logged and treated as empty.
    pub fn init(transport: T, gpio_direction: GpioDirection, clock: C, watchdog: W, store: S) -> Result<Self> {
        let mut radio = Rfm22::new(transport, gpio_direction);
        radio.probe()?;

        let params = match store.load() {
            Ok(params) => params,
            Err(e) => {
                warn!("Could not load bind data: {}", e);
                None
            }
        };

        Ok(Self {
            radio,
            clock,
            watchdog,
            store,
            mode: ModeCell::new(),
            params,
            link: None,
            consumer: None,
            status_log_interval_ms: DEFAULT_STATUS_LOG_INTERVAL_MS,
            last_status_ms: 0,
        })
    }

    /// Set how often the link status is logged
    pub fn with_status_log_interval(mut self, interval_ms: u32) -> Self {
        self.status_log_interval_ms = interval_ms;
        self
    }

    /// Handle for the transceiver's interrupt line
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.mode.interrupt_handle()
    }

    /// Attach the channel data consumer
    ///
    /// # Errors
    ///
    /// Returns `ConsumerAlreadyRegistered` if one is attached already; the
    /// existing registration is kept.
    pub fn register_consumer(&mut self, consumer: Box<dyn ChannelConsumer + Send>) -> Result<()> {
        if self.consumer.is_some() {
            return Err(LinkError::ConsumerAlreadyRegistered);
        }
        self.consumer = Some(consumer);
        Ok(())
    }

    /// Current session parameters, if any
    pub fn session(&self) -> Option<&SessionParameters> {
        self.params.as_ref()
    }

    /// Link health, once the link is running
    pub fn status(&self) -> Option<LinkStatus> {
        self.link.as_ref().map(LinkStateMachine::status)
    }

    /// Bind if needed, then start listening in normal mode
    ///
    /// Binding happens when `force_bind` is set or no valid parameters are
    /// stored. A bind timeout falls back to valid stored parameters.
    ///
    /// # Arguments
    ///
    /// * `force_bind` - Bind even if valid parameters are stored
    /// * `bind_timeout_ms` - Bind wait; 0 waits forever
    ///
    /// # Errors
    ///
    /// Returns `NotBound` if no valid parameters are available afterwards
    pub fn setup(&mut self, force_bind: bool, bind_timeout_ms: u32) -> Result<()> {
        info!(
            "OpenLRSng RX setup starting (protocol {}, bind: {})",
            format_version(OPENLRSNG_VERSION),
            force_bind
        );

        let stored_valid = match self.params.as_ref().map(SessionParameters::validate) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("Stored bind data rejected: {}", e);
                false
            }
            None => false,
        };

        if force_bind || !stored_valid {
            match self.bind(bind_timeout_ms)? {
                BindOutcome::Bound(params) => self.params = Some(params),
                BindOutcome::TimedOut if stored_valid => {
                    info!("Bind timed out, using stored bind data");
                }
                BindOutcome::TimedOut => return Err(LinkError::NotBound),
            }
        }

        self.start_link()
    }

    /// Bind again at runtime and restart the link
    ///
    /// On timeout the previous session, if any, is resumed.
    ///
    /// # Errors
    ///
    /// Returns error if the store or transport seams fail
    pub fn rebind(&mut self, bind_timeout_ms: u32) -> Result<BindOutcome> {
        let outcome = self.bind(bind_timeout_ms)?;

        match outcome {
            BindOutcome::Bound(params) => {
                self.params = Some(params);
                self.start_link()?;
            }
            BindOutcome::TimedOut if self.params.is_some() => self.start_link()?,
            BindOutcome::TimedOut => self.link = None,
        }

        Ok(outcome)
    }

    fn bind(&mut self, timeout_ms: u32) -> Result<BindOutcome> {
        bind_receive(
            &mut self.radio,
            &self.mode,
            &self.clock,
            &self.watchdog,
            &mut self.store,
            timeout_ms,
        )
    }

    fn start_link(&mut self) -> Result<()> {
        let params = self.params.ok_or(LinkError::NotBound)?;
        params.validate()?;

        let mut link = LinkStateMachine::new(params, self.mode.clone());
        link.start(&mut self.radio, &self.clock);
        self.link = Some(link);
        self.last_status_ms = self.clock.millis();

        info!("OpenLRSng RX setup complete");
        Ok(())
    }

    /// One iteration of the polling task
    ///
    /// # Returns
    ///
    /// * `Ok(PollReport)` - Events of this cycle
    ///
    /// # Errors
    ///
    /// Returns `NotBound` if [`Driver::setup`] has not succeeded
    pub fn poll_once(&mut self) -> Result<PollReport> {
        self.watchdog.keep_alive();

        let link = self.link.as_mut().ok_or(LinkError::NotBound)?;
        let report = link.poll(&mut self.radio, &self.clock);

        if let (Some(frame), Some(consumer)) = (&report.frame, self.consumer.as_mut()) {
            consumer.update_channels(frame);
        }
        if report.recovered_hang {
            debug!("Transceiver recovered, IRQs so far: {}", self.mode.irq_count());
        }

        let now_ms = self.clock.millis();
        if now_ms.wrapping_sub(self.last_status_ms) >= self.status_log_interval_ms {
            info!("{}", link.status());
            self.last_status_ms = now_ms;
        }

        Ok(report)
    }

    /// Poll until `stop` is set, sleeping `poll_interval_ms` between cycles
    ///
    /// # Errors
    ///
    /// Returns `NotBound` if [`Driver::setup`] has not succeeded
    pub fn run(&mut self, stop: &AtomicBool, poll_interval_ms: u32) -> Result<()> {
        info!("Receiver loop running ({} ms poll)", poll_interval_ms);

        while !stop.load(Ordering::Acquire) {
            self.poll_once()?;
            self.clock.sleep_ms(poll_interval_ms);
        }

        info!("Receiver loop stopped");
        Ok(())
    }
}
