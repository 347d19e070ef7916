//! Blocking packet transmit

use tracing::{trace, warn};

use super::mode::{ModeCell, RadioMode};
use crate::openlrs::protocol::TX_TIMEOUT_US;
use crate::platform::{Clock, Watchdog};
use crate::rfm22::transport::RegisterTransport;
use crate::rfm22::Rfm22;

/// Result of a blocking transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// The packet-sent interrupt arrived
    Sent,
    /// No completion within the transmit timeout; the mode is left as-is
    TimedOut,
}

/// Send one packet and wait for completion
///
/// The mode becomes `Transmitting` before the transmitter is started so a
/// completion interrupt can never be lost. The wait sleeps 1 ms per
/// iteration and services the watchdog.
///
/// # Arguments
///
/// * `radio` - Transceiver
/// * `mode` - Shared radio mode
/// * `clock` - Time source
/// * `watchdog` - Keep-alive serviced while waiting
/// * `packet` - Bytes to send
///
/// # Returns
///
/// * `TxOutcome` - Whether the transmission completed before the timeout
pub fn send_packet<T, C, W>(
    radio: &mut Rfm22<T>,
    mode: &ModeCell,
    clock: &C,
    watchdog: &W,
    packet: &[u8],
) -> TxOutcome
where
    T: RegisterTransport,
    C: Clock + ?Sized,
    W: Watchdog + ?Sized,
{
    radio.load_tx_packet(packet);
    mode.set(RadioMode::Transmitting);

    let tx_start = clock.micros();
    radio.start_tx();
    trace!("Transmitting {} bytes", packet.len());

    while mode.get() == RadioMode::Transmitting {
        if clock.micros().wrapping_sub(tx_start) >= TX_TIMEOUT_US {
            warn!("Transmit timeout after {} µs, packet abandoned", TX_TIMEOUT_US);
            return TxOutcome::TimedOut;
        }
        clock.sleep_ms(1);
        watchdog.keep_alive();
    }

    TxOutcome::Sent
}
