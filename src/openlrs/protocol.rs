//! # OpenLRS Protocol Constants
//!
//! Core protocol definitions shared by the packet codec, timing model,
//! hop sequencer and binding handshake.

/// OpenLRSng protocol version implemented by this receiver
pub const OPENLRSNG_VERSION: u16 = 0x0382;

/// Binding data format version; stored or received parameters must match
pub const BINDING_VERSION: u8 = 9;

/// Maximum number of entries in a hop list
pub const MAXHOPS: usize = 24;

/// Maximum number of proportional channels carried by a packet
pub const PPM_CHANNELS: usize = 16;

/// Carrier frequency used while binding (Hz)
pub const BINDING_FREQUENCY: u32 = 435_000_000;

/// Transmit power register value used while binding
pub const BINDING_POWER: u8 = 0x06;

/// Header magic used while binding
pub const BIND_MAGIC: u32 = 0xDEC1_BE15u32.wrapping_add((OPENLRSNG_VERSION & 0xFFF0) as u32);

/// Command byte of a bind request sent by the transmitter
pub const BIND_REQUEST: u8 = b'b';

/// Acknowledgment byte sent back once binding succeeded
pub const BIND_ACK: u8 = b'B';

/// Size of the telemetry packet the transmitter budgets for
pub const TELEMETRY_PACKETSIZE: u8 = 9;

/// Flags: channel packing configuration (low three bits)
pub const FLAGS_CHANNEL_CONFIG_MASK: u8 = 0x07;

/// Flags: telemetry mode bits (any set bit enables telemetry slots)
pub const TELEMETRY_MASK: u8 = 0x18;

/// Flags: diversity enabled (longer preamble)
pub const DIVERSITY_ENABLED: u8 = 0x80;

/// Channel packing configurations selectable through the flags byte
pub const CHANNELS_4_4: u8 = 0x01;
pub const CHANNELS_8: u8 = 0x02;
pub const CHANNELS_8_4: u8 = 0x03;
pub const CHANNELS_12: u8 = 0x04;
pub const CHANNELS_12_4: u8 = 0x05;
pub const CHANNELS_16: u8 = 0x06;

/// Packet header bits that must be clear for a channel data packet
pub const PACKET_TYPE_MASK: u8 = 0x3E;

/// Blocking transmit gives up after this long (µs)
pub const TX_TIMEOUT_US: u32 = 100_000;

/// Defaults used by a freshly configured transmitter
pub const DEFAULT_CARRIER_FREQUENCY: u32 = 435_000_000;
pub const DEFAULT_RF_MAGIC: u32 = 0xDEAD_FEED;
pub const DEFAULT_RF_POWER: u8 = 7;
pub const DEFAULT_CHANNEL_SPACING: u8 = 5;
pub const DEFAULT_DATARATE: u8 = 2;
pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_FLAGS: u8 = CHANNELS_8;
pub const DEFAULT_HOPLIST: [u8; 6] = [22, 10, 19, 34, 49, 41];

/// Format a packed protocol version (0xMmP) as "M.m" or "M.m.P"
pub fn format_version(v: u16) -> String {
    let major = (v >> 8) & 0x0F;
    let minor = (v >> 4) & 0x0F;
    let patch = v & 0x0F;
    if patch != 0 {
        format!("{}.{}.{}", major, minor, patch)
    } else {
        format!("{}.{}", major, minor)
    }
}
