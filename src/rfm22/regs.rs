//! # RFM22B Register Map
//!
//! Register addresses and bit values used by the driver.

/// SPI address bit selecting a register write
pub const WRITE_BIT: u8 = 0x80;

pub const DEVICE_TYPE: u8 = 0x00;
pub const DEVICE_TYPE_MASK: u8 = 0x1F;
/// Device type reported by an RX/TRX RFM22B
pub const DEVICE_TYPE_RFM22B: u8 = 0x08;

pub const INTERRUPT_STATUS1: u8 = 0x03;
pub const INTERRUPT_STATUS2: u8 = 0x04;
pub const INTERRUPT_ENABLE1: u8 = 0x05;
pub const INTERRUPT_ENABLE2: u8 = 0x06;

/// Interrupt enable 1: valid packet received
pub const IE1_ENPKVALID: u8 = 0x02;
/// Interrupt enable 1: packet sent
pub const IE1_ENPKSENT: u8 = 0x04;

pub const OP_AND_FUNC_CTRL1: u8 = 0x07;
pub const OP_AND_FUNC_CTRL2: u8 = 0x08;

pub const OPFC1_XTON: u8 = 0x01;
pub const OPFC1_RXON: u8 = 0x04;
pub const OPFC1_TXON: u8 = 0x08;

pub const PWRSTATE_READY: u8 = OPFC1_XTON;
pub const PWRSTATE_RX: u8 = OPFC1_RXON | OPFC1_XTON;
pub const PWRSTATE_TX: u8 = OPFC1_TXON | OPFC1_XTON;

/// Operating control 2: clear RX and TX FIFOs
pub const OPFC2_FIFO_CLEAR: u8 = 0x03;

pub const XTAL_OSC_LOAD_CAP: u8 = 0x09;
pub const CPU_OUTPUT_CLK: u8 = 0x0A;
pub const GPIO0_CONFIG: u8 = 0x0B;
pub const GPIO1_CONFIG: u8 = 0x0C;
pub const GPIO2_CONFIG: u8 = 0x0D;
pub const IO_PORT_CONFIG: u8 = 0x0E;

pub const GPIO_CONFIG_TXSTATE: u8 = 0x12;
pub const GPIO_CONFIG_RXSTATE: u8 = 0x15;
pub const GPIO2_CONFIG_VDD: u8 = 0xFD;
pub const IO_PORT_DEFAULT: u8 = 0x00;

pub const IF_FILTER_BANDWIDTH: u8 = 0x1C;
pub const AFC_LOOP_GEARSHIFT_OVERRIDE: u8 = 0x1D;
pub const AFC_TIMING_CONTROL: u8 = 0x1E;
pub const CLK_RECOVERY_OVERSAMPLING_RATIO: u8 = 0x20;
pub const CLK_RECOVERY_OFFSET2: u8 = 0x21;
pub const CLK_RECOVERY_OFFSET1: u8 = 0x22;
pub const CLK_RECOVERY_OFFSET0: u8 = 0x23;
pub const CLK_RECOVERY_TIMING_LOOP_GAIN1: u8 = 0x24;
pub const CLK_RECOVERY_TIMING_LOOP_GAIN0: u8 = 0x25;
pub const RSSI: u8 = 0x26;
pub const AFC_LIMITER: u8 = 0x2A;
pub const AFC_CORRECTION_READ: u8 = 0x2B;
pub const OOK_COUNTER_VALUE1: u8 = 0x2C;

pub const DATA_ACCESS_CONTROL: u8 = 0x30;
pub const HEADER_CONTROL1: u8 = 0x32;
pub const HEADER_CONTROL2: u8 = 0x33;
pub const PREAMBLE_LENGTH: u8 = 0x34;
pub const PREAMBLE_DETECTION_CTRL1: u8 = 0x35;
pub const SYNC_WORD3: u8 = 0x36;
pub const SYNC_WORD2: u8 = 0x37;
pub const SYNC_WORD1: u8 = 0x38;
pub const SYNC_WORD0: u8 = 0x39;

/// Transmit header bytes, most significant first (0x3A-0x3D)
pub const TRANSMIT_HEADER3: u8 = 0x3A;
pub const TRANSMIT_HEADER0: u8 = 0x3D;
pub const TRANSMIT_PACKET_LENGTH: u8 = 0x3E;

/// Check header bytes, most significant first (0x3F-0x42)
pub const CHECK_HEADER3: u8 = 0x3F;
pub const CHECK_HEADER0: u8 = 0x42;

/// Header enable masks, most significant first (0x43-0x46)
pub const HEADER_ENABLE3: u8 = 0x43;

pub const RECEIVED_PACKET_LENGTH: u8 = 0x4B;

pub const TX_POWER: u8 = 0x6D;
pub const TX_DATA_RATE1: u8 = 0x6E;
pub const TX_DATA_RATE0: u8 = 0x6F;
pub const MODULATION_MODE_CONTROL1: u8 = 0x70;
pub const MODULATION_MODE_CONTROL2: u8 = 0x71;
pub const FREQUENCY_DEVIATION: u8 = 0x72;
pub const FREQUENCY_OFFSET1: u8 = 0x73;
pub const FREQUENCY_OFFSET2: u8 = 0x74;
pub const FREQUENCY_BAND_SELECT: u8 = 0x75;
pub const NOMINAL_CARRIER_FREQUENCY1: u8 = 0x76;
pub const NOMINAL_CARRIER_FREQUENCY0: u8 = 0x77;
pub const FREQUENCY_HOPPING_CHANNEL_SELECT: u8 = 0x79;
pub const FREQUENCY_HOPPING_STEP_SIZE: u8 = 0x7A;
pub const RX_FIFO_CONTROL: u8 = 0x7E;
pub const FIFO_ACCESS: u8 = 0x7F;

/// Frequency band select: sideband select bit
pub const FBS_SBSE: u8 = 0x40;
/// Frequency band select: high band (>= 480 MHz)
pub const FBS_HBSEL: u8 = 0x20;
pub const FB_MASK: u8 = 0x1F;

/// Register that reads 0 when the module has locked up
pub const HANG_CHECK: u8 = GPIO1_CONFIG;
