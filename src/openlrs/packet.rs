//! # OpenLRS Packet Codec
//!
//! Packs and unpacks proportional channels in the compact OpenLRS layout.
//!
//! Every group of five payload bytes carries four 10-bit channels: bytes 0-3
//! hold the low eight bits of each channel and byte 4 holds the high two
//! bits, two bits per channel starting at the least significant pair.
//!
//! ```text
//! Byte 0: Ch1[0:7]
//! Byte 1: Ch2[0:7]
//! Byte 2: Ch3[0:7]
//! Byte 3: Ch4[0:7]
//! Byte 4: Ch4[8:9] | Ch3[8:9] | Ch2[8:9] | Ch1[8:9]
//! ```
//!
//! Odd configurations append one byte carrying four 2-bit switch channels,
//! most significant pair first, each decoded as `level * 333 + 12`.

use super::protocol::*;

/// Packet size (header byte included) for each channel configuration
const PACKET_SIZES: [u8; 8] = [0, 7, 11, 12, 16, 17, 21, 0];

/// Highest value representable by a 10-bit channel
pub const CHANNEL_VALUE_MAX: i16 = 1023;

/// Decoded proportional channel values from one received packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFrame {
    values: [i16; PPM_CHANNELS],
    count: usize,
}

impl Default for ChannelFrame {
    fn default() -> Self {
        Self {
            values: [0; PPM_CHANNELS],
            count: 0,
        }
    }
}

impl ChannelFrame {
    /// Decoded channels, in transmit order
    pub fn channels(&self) -> &[i16] {
        &self.values[..self.count]
    }

    /// Number of decoded channels
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn push(&mut self, value: i16) {
        if self.count < PPM_CHANNELS {
            self.values[self.count] = value;
            self.count += 1;
        }
    }
}

/// Look up the over-the-air packet size for a flags byte
///
/// Only the low three bits select the configuration. Configurations 0 and 7
/// are reserved and report a size of 0.
pub fn packet_size(flags: u8) -> u8 {
    PACKET_SIZES[(flags & FLAGS_CHANNEL_CONFIG_MASK) as usize]
}

/// Returns true when a packet header byte announces channel data
pub fn is_channel_packet(header: u8) -> bool {
    header & PACKET_TYPE_MASK == 0
}

/// Decoded value of a 2-bit switch channel level (0-3)
pub fn aux_level_value(level: u8) -> i16 {
    i16::from(level & 0x03) * 333 + 12
}

/// Decode channel values from a packet payload (header byte excluded)
///
/// # Arguments
///
/// * `config` - Channel configuration (low three bits of the flags byte)
/// * `payload` - Packet bytes following the header byte
///
/// # Returns
///
/// * `ChannelFrame` - Decoded channels
///
/// The payload is sized by [`packet_size`]; a shorter payload simply yields
/// fewer channels.
pub fn unpack_channels(config: u8, payload: &[u8]) -> ChannelFrame {
    let config = config & FLAGS_CHANNEL_CONFIG_MASK;
    let groups = usize::from(config / 2) + 1;
    let mut frame = ChannelFrame::default();

    for group in payload.chunks_exact(5).take(groups) {
        let high = u16::from(group[4]);
        for (k, &low) in group[..4].iter().enumerate() {
            let value = (((high >> (2 * k)) & 0x03) << 8) | u16::from(low);
            frame.push(value as i16);
        }
    }

    if config & 0x01 != 0 && frame.count + 4 <= PPM_CHANNELS {
        if let Some(&packed) = payload.get(groups * 5) {
            for k in 0..4 {
                frame.push(aux_level_value(packed >> (6 - 2 * k)));
            }
        }
    }

    frame
}

/// Encode channel values into a packet payload (header byte excluded)
///
/// Proportional channels are clamped to 0-1023. Switch channels keep only
/// their two most significant bits (`value >> 8`). Missing channels encode
/// as 0.
///
/// # Arguments
///
/// * `config` - Channel configuration (low three bits of the flags byte)
/// * `channels` - Channel values in transmit order
///
/// # Returns
///
/// * `Vec<u8>` - Payload of `packet_size(config) - 1` bytes for valid configurations
pub fn pack_channels(config: u8, channels: &[i16]) -> Vec<u8> {
    let config = config & FLAGS_CHANNEL_CONFIG_MASK;
    let groups = usize::from(config / 2) + 1;
    let clamped = |index: usize| -> u16 {
        channels
            .get(index)
            .map_or(0, |&v| v.clamp(0, CHANNEL_VALUE_MAX) as u16)
    };

    let mut payload = Vec::with_capacity(groups * 5 + 1);
    for group in 0..groups {
        let mut high = 0u8;
        for k in 0..4 {
            let value = clamped(group * 4 + k);
            payload.push((value & 0xFF) as u8);
            high |= (((value >> 8) & 0x03) as u8) << (2 * k);
        }
        payload.push(high);
    }

    if config & 0x01 != 0 {
        let mut packed = 0u8;
        for k in 0..4 {
            let level = ((clamped(groups * 4 + k) >> 8) & 0x03) as u8;
            packed |= level << (6 - 2 * k);
        }
        payload.push(packed);
    }

    payload
}

/// Build a complete channel data packet (header byte + packed channels)
///
/// # Examples
///
/// ```
/// use openlrs_rx::openlrs::packet::{build_channel_packet, packet_size};
/// use openlrs_rx::openlrs::protocol::CHANNELS_8;
///
/// let packet = build_channel_packet(CHANNELS_8, &[512; 8]);
/// assert_eq!(packet.len(), packet_size(CHANNELS_8) as usize);
/// ```
pub fn build_channel_packet(flags: u8, channels: &[i16]) -> Vec<u8> {
    let mut packet = vec![0x00];
    packet.extend_from_slice(&pack_channels(flags, channels));
    packet
}
