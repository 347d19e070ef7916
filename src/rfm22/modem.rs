//! # Modem Profiles
//!
//! Bitrate-dependent register sets for IF bandwidth, AFC, clock recovery,
//! data rate and frequency deviation.

use crate::openlrs::bind_data::SessionParameters;

/// Register values for one bitrate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemProfile {
    /// Bitrate in bits per second
    pub bps: u32,
    /// 0x1C
    pub if_filter_bandwidth: u8,
    /// 0x1D
    pub afc_loop_gearshift_override: u8,
    /// 0x1E
    pub afc_timing_control: u8,
    /// 0x20
    pub clk_recovery_oversampling_ratio: u8,
    /// 0x21
    pub clk_recovery_offset2: u8,
    /// 0x22
    pub clk_recovery_offset1: u8,
    /// 0x23
    pub clk_recovery_offset0: u8,
    /// 0x24
    pub clk_recovery_timing_loop_gain1: u8,
    /// 0x25
    pub clk_recovery_timing_loop_gain0: u8,
    /// 0x2A
    pub afc_limiter: u8,
    /// 0x6E
    pub tx_data_rate1: u8,
    /// 0x6F
    pub tx_data_rate0: u8,
    /// 0x70
    pub modulation_mode_control1: u8,
    /// 0x71
    pub modulation_mode_control2: u8,
    /// 0x72
    pub frequency_deviation: u8,
}

const PROFILE_9600: ModemProfile = ModemProfile {
    bps: 9600,
    if_filter_bandwidth: 0x05,
    afc_loop_gearshift_override: 0x40,
    afc_timing_control: 0x0A,
    clk_recovery_oversampling_ratio: 0xA1,
    clk_recovery_offset2: 0x20,
    clk_recovery_offset1: 0x4E,
    clk_recovery_offset0: 0xA5,
    clk_recovery_timing_loop_gain1: 0x00,
    clk_recovery_timing_loop_gain0: 0x20,
    afc_limiter: 0x24,
    tx_data_rate1: 0x4E,
    tx_data_rate0: 0xA5,
    modulation_mode_control1: 0x2C,
    modulation_mode_control2: 0x23,
    frequency_deviation: 0x30,
};

/// Profiles selectable through `SessionParameters::modem_params`
pub const MODEM_PROFILES: [ModemProfile; 5] = [
    ModemProfile {
        bps: 4800,
        if_filter_bandwidth: 0x1A,
        afc_loop_gearshift_override: 0x40,
        afc_timing_control: 0x0A,
        clk_recovery_oversampling_ratio: 0xA1,
        clk_recovery_offset2: 0x20,
        clk_recovery_offset1: 0x4E,
        clk_recovery_offset0: 0xA5,
        clk_recovery_timing_loop_gain1: 0x00,
        clk_recovery_timing_loop_gain0: 0x1B,
        afc_limiter: 0x1E,
        tx_data_rate1: 0x27,
        tx_data_rate0: 0x52,
        modulation_mode_control1: 0x2C,
        modulation_mode_control2: 0x23,
        frequency_deviation: 0x30,
    },
    PROFILE_9600,
    ModemProfile {
        bps: 19200,
        if_filter_bandwidth: 0x06,
        afc_loop_gearshift_override: 0x40,
        afc_timing_control: 0x0A,
        clk_recovery_oversampling_ratio: 0xD0,
        clk_recovery_offset2: 0x00,
        clk_recovery_offset1: 0x9D,
        clk_recovery_offset0: 0x49,
        clk_recovery_timing_loop_gain1: 0x00,
        clk_recovery_timing_loop_gain0: 0x7B,
        afc_limiter: 0x28,
        tx_data_rate1: 0x9D,
        tx_data_rate0: 0x49,
        modulation_mode_control1: 0x2C,
        modulation_mode_control2: 0x23,
        frequency_deviation: 0x30,
    },
    ModemProfile {
        bps: 57600,
        if_filter_bandwidth: 0x05,
        afc_loop_gearshift_override: 0x40,
        afc_timing_control: 0x0A,
        clk_recovery_oversampling_ratio: 0x45,
        clk_recovery_offset2: 0x01,
        clk_recovery_offset1: 0xD7,
        clk_recovery_offset0: 0xDC,
        clk_recovery_timing_loop_gain1: 0x03,
        clk_recovery_timing_loop_gain0: 0xB8,
        afc_limiter: 0x1E,
        tx_data_rate1: 0x0E,
        tx_data_rate0: 0xBF,
        modulation_mode_control1: 0x00,
        modulation_mode_control2: 0x23,
        frequency_deviation: 0x2E,
    },
    ModemProfile {
        bps: 125_000,
        if_filter_bandwidth: 0x8A,
        afc_loop_gearshift_override: 0x40,
        afc_timing_control: 0x0A,
        clk_recovery_oversampling_ratio: 0x60,
        clk_recovery_offset2: 0x01,
        clk_recovery_offset1: 0x55,
        clk_recovery_offset0: 0x55,
        clk_recovery_timing_loop_gain1: 0x02,
        clk_recovery_timing_loop_gain0: 0xAD,
        afc_limiter: 0x1E,
        tx_data_rate1: 0x20,
        tx_data_rate0: 0x00,
        modulation_mode_control1: 0x00,
        modulation_mode_control2: 0x23,
        frequency_deviation: 0xC8,
    },
];

/// Fixed profile used while binding
pub const BIND_PROFILE: ModemProfile = PROFILE_9600;

impl ModemProfile {
    /// Profile selected by a validated session
    ///
    /// # Panics
    ///
    /// Panics if `modem_params` is out of range; sessions are validated
    /// before they reach the radio.
    pub fn for_session(params: &SessionParameters) -> &'static ModemProfile {
        &MODEM_PROFILES[usize::from(params.modem_params)]
    }

    /// Register/value pairs in the order they are written
    pub fn register_writes(&self) -> [(u8, u8); 15] {
        use super::regs::*;

        [
            (IF_FILTER_BANDWIDTH, self.if_filter_bandwidth),
            (AFC_LOOP_GEARSHIFT_OVERRIDE, self.afc_loop_gearshift_override),
            (AFC_TIMING_CONTROL, self.afc_timing_control),
            (CLK_RECOVERY_OVERSAMPLING_RATIO, self.clk_recovery_oversampling_ratio),
            (CLK_RECOVERY_OFFSET2, self.clk_recovery_offset2),
            (CLK_RECOVERY_OFFSET1, self.clk_recovery_offset1),
            (CLK_RECOVERY_OFFSET0, self.clk_recovery_offset0),
            (CLK_RECOVERY_TIMING_LOOP_GAIN1, self.clk_recovery_timing_loop_gain1),
            (CLK_RECOVERY_TIMING_LOOP_GAIN0, self.clk_recovery_timing_loop_gain0),
            (AFC_LIMITER, self.afc_limiter),
            (TX_DATA_RATE1, self.tx_data_rate1),
            (TX_DATA_RATE0, self.tx_data_rate0),
            (MODULATION_MODE_CONTROL1, self.modulation_mode_control1),
            (MODULATION_MODE_CONTROL2, self.modulation_mode_control2),
            (FREQUENCY_DEVIATION, self.frequency_deviation),
        ]
    }
}
