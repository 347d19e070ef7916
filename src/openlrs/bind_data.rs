//! # Session Parameters
//!
//! The bind data exchanged during pairing and persisted between sessions.
//!
//! ## Wire Layout
//!
//! Packed, little-endian, 41 bytes:
//!
//! ```text
//! version(1) | serial_baudrate(4) | rf_frequency(4) | rf_magic(4) |
//! rf_power(1) | rf_channel_spacing(1) | hopchannel(24) | modem_params(1) | flags(1)
//! ```

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use super::packet::packet_size;
use super::protocol::*;
use crate::error::{LinkError, Result};
use crate::rfm22::modem::MODEM_PROFILES;

/// Size of the bind data on the wire
pub const BIND_DATA_WIRE_SIZE: usize = 41;

/// Parameters of a bound session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParameters {
    /// Binding format version
    pub version: u8,

    /// Serial baud rate of the transmitter (informational)
    pub serial_baudrate: u32,

    /// Base carrier frequency in Hz
    pub rf_frequency: u32,

    /// Session magic identifying the bound pair
    pub rf_magic: u32,

    /// Transmit power register value
    pub rf_power: u8,

    /// Hop channel step size (10 kHz units)
    pub rf_channel_spacing: u8,

    /// Hop channel list, terminated by 0 or by reaching MAXHOPS
    pub hopchannel: [u8; MAXHOPS],

    /// Index into the modem profile table
    pub modem_params: u8,

    /// Channel configuration, telemetry and diversity flags
    pub flags: u8,
}

impl Default for SessionParameters {
    /// Parameters of a freshly configured transmitter
    fn default() -> Self {
        let mut hopchannel = [0u8; MAXHOPS];
        hopchannel[..DEFAULT_HOPLIST.len()].copy_from_slice(&DEFAULT_HOPLIST);

        Self {
            version: BINDING_VERSION,
            serial_baudrate: DEFAULT_BAUDRATE,
            rf_frequency: DEFAULT_CARRIER_FREQUENCY,
            rf_magic: DEFAULT_RF_MAGIC,
            rf_power: DEFAULT_RF_POWER,
            rf_channel_spacing: DEFAULT_CHANNEL_SPACING,
            hopchannel,
            modem_params: DEFAULT_DATARATE,
            flags: DEFAULT_FLAGS,
        }
    }
}

impl SessionParameters {
    /// Decode bind data received over the air
    ///
    /// No validation happens here; see [`SessionParameters::validate`].
    pub fn from_wire(bytes: &[u8; BIND_DATA_WIRE_SIZE]) -> Self {
        let mut buf = &bytes[..];

        let version = buf.get_u8();
        let serial_baudrate = buf.get_u32_le();
        let rf_frequency = buf.get_u32_le();
        let rf_magic = buf.get_u32_le();
        let rf_power = buf.get_u8();
        let rf_channel_spacing = buf.get_u8();
        let mut hopchannel = [0u8; MAXHOPS];
        buf.copy_to_slice(&mut hopchannel);
        let modem_params = buf.get_u8();
        let flags = buf.get_u8();

        Self {
            version,
            serial_baudrate,
            rf_frequency,
            rf_magic,
            rf_power,
            rf_channel_spacing,
            hopchannel,
            modem_params,
            flags,
        }
    }

    /// Encode bind data for transmission
    pub fn to_wire(&self) -> [u8; BIND_DATA_WIRE_SIZE] {
        let mut bytes = [0u8; BIND_DATA_WIRE_SIZE];
        let mut buf = &mut bytes[..];

        buf.put_u8(self.version);
        buf.put_u32_le(self.serial_baudrate);
        buf.put_u32_le(self.rf_frequency);
        buf.put_u32_le(self.rf_magic);
        buf.put_u8(self.rf_power);
        buf.put_u8(self.rf_channel_spacing);
        buf.put_slice(&self.hopchannel);
        buf.put_u8(self.modem_params);
        buf.put_u8(self.flags);

        bytes
    }

    /// Number of usable hop channels (entries before the first 0)
    pub fn hop_count(&self) -> usize {
        self.hopchannel
            .iter()
            .take_while(|&&channel| channel != 0)
            .count()
    }

    /// Channel configuration (low three bits of the flags)
    pub fn channel_config(&self) -> u8 {
        self.flags & FLAGS_CHANNEL_CONFIG_MASK
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.flags & TELEMETRY_MASK != 0
    }

    pub fn diversity_enabled(&self) -> bool {
        self.flags & DIVERSITY_ENABLED != 0
    }

    /// Check that the parameters can drive a session
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The version does not match [`BINDING_VERSION`]
    /// - `modem_params` does not index the modem profile table
    /// - The flags select a reserved channel configuration
    pub fn validate(&self) -> Result<()> {
        if self.version != BINDING_VERSION {
            return Err(LinkError::InvalidSession(format!(
                "binding version {} does not match {}",
                self.version, BINDING_VERSION
            )));
        }

        if usize::from(self.modem_params) >= MODEM_PROFILES.len() {
            return Err(LinkError::InvalidSession(format!(
                "modem profile {} out of range (0-{})",
                self.modem_params,
                MODEM_PROFILES.len() - 1
            )));
        }

        if packet_size(self.flags) == 0 {
            return Err(LinkError::InvalidSession(format!(
                "reserved channel configuration {}",
                self.channel_config()
            )));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
