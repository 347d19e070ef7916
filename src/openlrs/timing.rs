//! # Timing Model
//!
//! Expected packet interval of a session, derived from the modem bitrate and
//! the packet sizes in play.

use super::bind_data::SessionParameters;
use super::packet::packet_size;
use super::protocol::TELEMETRY_PACKETSIZE;
use crate::rfm22::modem::ModemProfile;

/// Margin added after every channel packet (µs)
const PACKET_MARGIN_US: u32 = 2000;

/// Margin added after the telemetry slot (µs)
const TELEMETRY_MARGIN_US: u32 = 1000;

/// Empirical air time of `bytes` payload bytes at `bps` (µs)
///
/// Preamble, sync, header and CRC overhead is 15 bytes, 20 with the longer
/// diversity preamble.
pub fn bytes_at_baud_us(bytes: u8, bps: u32, diversity: bool) -> u32 {
    let overhead = if diversity { 20 } else { 15 };
    let total = u64::from(bytes) + overhead;
    (total * 8_200_000 / u64::from(bps)) as u32
}

/// Transmitter packet cadence for a session, rounded up to whole milliseconds
///
/// # Arguments
///
/// * `params` - Session parameters; `modem_params` must index the modem table
///
/// # Returns
///
/// * `u32` - Interval in microseconds, always a multiple of 1000
pub fn expected_interval_us(params: &SessionParameters) -> u32 {
    let bps = ModemProfile::for_session(params).bps;
    interval_for(packet_size(params.flags), bps, params.diversity_enabled(), params.telemetry_enabled())
}

/// Interval for an explicit packet size and bitrate
pub fn interval_for(payload_size: u8, bps: u32, diversity: bool, telemetry: bool) -> u32 {
    let mut interval = bytes_at_baud_us(payload_size, bps, diversity) + PACKET_MARGIN_US;

    if telemetry {
        interval += bytes_at_baud_us(TELEMETRY_PACKETSIZE, bps, diversity) + TELEMETRY_MARGIN_US;
    }

    interval.div_ceil(1000) * 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openlrs::protocol::*;

    #[test]
    fn test_bytes_at_baud() {
        // (11 + 15) * 8_200_000 / 9600
        assert_eq!(bytes_at_baud_us(11, 9600, false), 22_208);
        assert_eq!(bytes_at_baud_us(11, 9600, true), 26_479);
    }

    #[test]
    fn test_interval_9600_eight_channels() {
        // 22_208 + 2000 = 24_208, rounded up to the next millisecond
        assert_eq!(interval_for(11, 9600, false, false), 25_000);
    }

    #[test]
    fn test_interval_for_session() {
        let params = SessionParameters {
            modem_params: 1,
            flags: CHANNELS_8,
            ..SessionParameters::default()
        };
        assert_eq!(expected_interval_us(&params), 25_000);
    }

    #[test]
    fn test_interval_with_telemetry() {
        // 24_208 + (9 + 15) * 8_200_000 / 9600 + 1000 = 24_208 + 20_500 + 1000
        assert_eq!(interval_for(11, 9600, false, true), 46_000);
    }

    #[test]
    fn test_interval_default_session() {
        // 19200 bps, 11 bytes: 11_104 + 2000 -> 14_000
        assert_eq!(expected_interval_us(&SessionParameters::default()), 14_000);
    }

    #[test]
    fn test_interval_is_whole_milliseconds() {
        for bps in [4800, 9600, 19200, 57600, 125_000] {
            for size in 0..=21u8 {
                for (diversity, telemetry) in [(false, false), (true, false), (false, true), (true, true)] {
                    assert_eq!(interval_for(size, bps, diversity, telemetry) % 1000, 0);
                }
            }
        }
    }

    #[test]
    fn test_interval_monotonic_in_payload_size() {
        for bps in [4800, 9600, 19200, 57600, 125_000] {
            let mut previous = 0;
            for size in 0..=21u8 {
                let interval = interval_for(size, bps, false, false);
                assert!(interval >= previous, "bps {} size {}", bps, size);
                previous = interval;
            }
        }
    }
}
