//! # Binding Protocol
//!
//! Receives session parameters from a transmitter on the fixed bind channel.
//!
//! ## Exchange
//!
//! ```text
//! TX -> RX: 'b' | SessionParameters (41 bytes, little-endian)
//! RX -> TX: 'B'
//! ```
//!
//! Anything else heard on the bind channel is dropped and the receiver goes
//! back to listening.

use tracing::{debug, info, warn};

use super::mode::{ModeCell, RadioMode};
use super::tx::{send_packet, TxOutcome};
use crate::error::Result;
use crate::openlrs::bind_data::{SessionParameters, BIND_DATA_WIRE_SIZE};
use crate::openlrs::protocol::{BIND_ACK, BIND_REQUEST};
use crate::platform::{Clock, Watchdog};
use crate::rfm22::transport::RegisterTransport;
use crate::rfm22::{RadioSetup, Rfm22};
use crate::storage::BindStore;

/// Wait iterations between progress messages
const PROGRESS_LOG_EVERY: u32 = 100;

/// Result of a bind attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Valid parameters were received and acknowledged
    Bound(SessionParameters),
    /// The timeout elapsed without a valid exchange
    TimedOut,
}

/// Wait for a transmitter's bind request
///
/// The transceiver is configured for the bind channel and kept listening.
/// Every iteration sleeps 1 ms and services the watchdog. On a valid
/// request the acknowledgment is sent first and the parameters are then
/// persisted; a failing store is logged and does not undo the binding.
///
/// # Arguments
///
/// * `radio` - Transceiver
/// * `mode` - Shared radio mode, advanced by the interrupt source
/// * `clock` - Time source
/// * `watchdog` - Keep-alive serviced every iteration
/// * `store` - Destination of the received parameters
/// * `timeout_ms` - How long to wait; 0 waits forever
///
/// # Returns
///
/// * `Ok(BindOutcome)` - Bound parameters, or `TimedOut`
///
/// # Errors
///
/// Bind exchange failures are not errors; the `Result` is kept for the
/// store and transport seams.
pub fn bind_receive<T, C, W, S>(
    radio: &mut Rfm22<T>,
    mode: &ModeCell,
    clock: &C,
    watchdog: &W,
    store: &mut S,
    timeout_ms: u32,
) -> Result<BindOutcome>
where
    T: RegisterTransport,
    C: Clock + ?Sized,
    W: Watchdog + ?Sized,
    S: BindStore + ?Sized,
{
    let start = clock.millis();
    radio.configure(&RadioSetup::binding());
    mode.set(RadioMode::Receiving);
    radio.to_rx_mode(clock);
    info!("Waiting for bind request (timeout: {} ms)", timeout_ms);

    let mut iterations: u32 = 0;

    while timeout_ms == 0 || clock.millis().wrapping_sub(start) < timeout_ms {
        clock.sleep_ms(1);
        watchdog.keep_alive();

        if iterations % PROGRESS_LOG_EVERY == 0 {
            debug!("Bind wait: mode {:?}, IRQs {}", mode.get(), mode.irq_count());
        }
        iterations = iterations.wrapping_add(1);

        if mode.get() != RadioMode::Received {
            continue;
        }

        let received = radio.read_fifo_with(|fifo| {
            if fifo.read_byte() != BIND_REQUEST {
                return None;
            }
            let mut wire = [0u8; BIND_DATA_WIRE_SIZE];
            fifo.read_into(&mut wire);
            Some(SessionParameters::from_wire(&wire))
        });

        match received {
            Some(params) => match params.validate() {
                Ok(()) => {
                    info!(
                        "Bind request accepted: {} Hz, magic 0x{:08X}, {} hops, modem {}, flags 0x{:02X}",
                        params.rf_frequency,
                        params.rf_magic,
                        params.hop_count(),
                        params.modem_params,
                        params.flags
                    );
                    debug!("Hop channels: {:?}", &params.hopchannel[..params.hop_count()]);

                    if send_packet(radio, mode, clock, watchdog, &[BIND_ACK]) == TxOutcome::TimedOut {
                        warn!("Bind acknowledgment was not confirmed by the transceiver");
                    }

                    if let Err(e) = store.save(&params) {
                        warn!("Failed to persist bind data: {}", e);
                    }

                    return Ok(BindOutcome::Bound(params));
                }
                Err(e) => debug!("Discarding bind request: {}", e),
            },
            None => debug!("Ignoring non-bind packet on bind channel"),
        }

        mode.set(RadioMode::Receiving);
        radio.rx_reset();
    }

    info!("Bind timeout after {} ms", timeout_ms);
    Ok(BindOutcome::TimedOut)
}
