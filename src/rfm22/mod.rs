//! # RFM22B Transceiver Module
//!
//! Register-level control of the RFM22B radio.
//!
//! This module handles:
//! - Device identification
//! - Modem, packet handler and header configuration
//! - Carrier frequency and hop channel programming
//! - Receive/transmit FIFO access
//! - RSSI and AFC readings
//!
//! Every sequence of register writes that must look atomic to other bus
//! users runs with the bus claimed.

pub mod modem;
pub mod regs;
pub mod transport;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{LinkError, Result};
use crate::openlrs::bind_data::SessionParameters;
use crate::openlrs::protocol::*;
use crate::platform::Clock;
use modem::{ModemProfile, BIND_PROFILE};
use regs::*;
use transport::RegisterTransport;

/// Filler clocked out while reading the FIFO
const OUT_FF: [u8; 64] = [0xFF; 64];

/// Settling time after leaving receive/transmit before re-entering receive
const RX_SETTLE_MS: u32 = 10;

/// RX FIFO almost-full threshold
const RX_FIFO_THRESHOLD: u8 = 36;

/// Wiring of the antenna switch to GPIO0/GPIO1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpioDirection {
    /// GPIO0 drives TX, GPIO1 drives RX
    #[default]
    Gpio0TxGpio1Rx,
    /// GPIO0 drives RX, GPIO1 drives TX
    Gpio0RxGpio1Tx,
}

/// Everything the transceiver needs to join a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSetup {
    pub profile: ModemProfile,
    pub magic: u32,
    pub tx_power: u8,
    pub carrier_frequency: u32,
    pub channel_spacing: u8,
    pub diversity: bool,
}

impl RadioSetup {
    /// Fixed configuration of the binding channel
    pub fn binding() -> Self {
        Self {
            profile: BIND_PROFILE,
            magic: BIND_MAGIC,
            tx_power: BINDING_POWER,
            carrier_frequency: BINDING_FREQUENCY,
            channel_spacing: DEFAULT_CHANNEL_SPACING,
            diversity: false,
        }
    }

    /// Configuration of a bound session
    pub fn for_session(params: &SessionParameters) -> Self {
        Self {
            profile: *ModemProfile::for_session(params),
            magic: params.rf_magic,
            tx_power: params.rf_power,
            carrier_frequency: params.rf_frequency,
            channel_spacing: params.rf_channel_spacing,
            diversity: params.diversity_enabled(),
        }
    }
}

/// Band select and nominal carrier register values for a frequency in Hz
pub fn carrier_frequency_registers(f: u32) -> (u8, u16) {
    let (high_band, fb, fc) = if f < 480_000_000 {
        let fb = f / 10_000_000 - 24;
        (false, fb, (f - (fb + 24) * 10_000_000) * 4 / 625)
    } else {
        let fb = f / 20_000_000 - 24;
        (true, fb, (f - (fb + 24) * 20_000_000) * 2 / 625)
    };

    let hbsel = if high_band { FBS_HBSEL } else { 0 };
    let band = FBS_SBSE | hbsel | (fb as u8 & FB_MASK);
    (band, fc as u16)
}

/// RFM22B driver over a register transport
pub struct Rfm22<T> {
    transport: T,
    gpio_direction: GpioDirection,
    it_status: (u8, u8),
}

impl<T> std::fmt::Debug for Rfm22<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rfm22")
            .field("gpio_direction", &self.gpio_direction)
            .field("it_status", &self.it_status)
            .finish_non_exhaustive()
    }
}

/// Access to the receive FIFO inside a single chip-select frame
pub struct FifoReader<'a, T> {
    transport: &'a mut T,
}

impl<T: RegisterTransport> FifoReader<'_, T> {
    pub fn read_byte(&mut self) -> u8 {
        self.transport.transfer_byte(0x00)
    }

    pub fn read_into(&mut self, buf: &mut [u8]) {
        for chunk in buf.chunks_mut(OUT_FF.len()) {
            let len = chunk.len();
            self.transport.transfer_block(&OUT_FF[..len], Some(chunk));
        }
    }
}

impl<T: RegisterTransport> Rfm22<T> {
    pub fn new(transport: T, gpio_direction: GpioDirection) -> Self {
        Self {
            transport,
            gpio_direction,
            it_status: (0, 0),
        }
    }

    /// Interrupt status registers as last read
    pub fn last_interrupt_status(&self) -> (u8, u8) {
        self.it_status
    }

    fn claimed<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        self.transport.claim_bus();
        let result = f(&mut self.transport);
        self.transport.release_bus();
        result
    }

    /// Read one register with the bus claimed
    pub fn read_claim(&mut self, addr: u8) -> u8 {
        self.claimed(|t| t.read_register(addr))
    }

    /// Write one register with the bus claimed
    pub fn write_claim(&mut self, addr: u8, data: u8) {
        self.claimed(|t| t.write_register(addr, data))
    }

    fn read_interrupt_status(t: &mut T) -> (u8, u8) {
        (t.read_register(INTERRUPT_STATUS1), t.read_register(INTERRUPT_STATUS2))
    }

    /// Device type field of the identification register
    pub fn device_type(&mut self) -> u8 {
        self.read_claim(DEVICE_TYPE) & DEVICE_TYPE_MASK
    }

    /// Make sure an RFM22B answers on the bus
    ///
    /// # Errors
    ///
    /// Returns `DeviceNotFound` with the reported type otherwise
    pub fn probe(&mut self) -> Result<()> {
        let device_type = self.device_type();
        if device_type != DEVICE_TYPE_RFM22B {
            return Err(LinkError::DeviceNotFound(device_type));
        }
        debug!("RFM22B detected");
        Ok(())
    }

    /// Opaque lock-up heuristic: the GPIO1 configuration reads back as 0
    pub fn is_hung(&mut self) -> bool {
        self.read_claim(HANG_CHECK) == 0
    }

    /// Full register configuration for a link
    pub fn configure(&mut self, setup: &RadioSetup) {
        debug!(
            "Configuring RFM22B: {} bps, {} Hz, magic 0x{:08X}, power {}",
            setup.profile.bps, setup.carrier_frequency, setup.magic, setup.tx_power
        );

        let gpio_direction = self.gpio_direction;
        self.it_status = self.claimed(|t| {
            let status = Self::read_interrupt_status(t);
            t.write_register(INTERRUPT_ENABLE2, 0x00);
            t.write_register(OP_AND_FUNC_CTRL1, PWRSTATE_READY);
            t.write_register(XTAL_OSC_LOAD_CAP, 0x7F);
            t.write_register(CPU_OUTPUT_CLK, 0x05);
            match gpio_direction {
                GpioDirection::Gpio0TxGpio1Rx => {
                    t.write_register(GPIO0_CONFIG, GPIO_CONFIG_TXSTATE);
                    t.write_register(GPIO1_CONFIG, GPIO_CONFIG_RXSTATE);
                }
                GpioDirection::Gpio0RxGpio1Tx => {
                    t.write_register(GPIO0_CONFIG, GPIO_CONFIG_RXSTATE);
                    t.write_register(GPIO1_CONFIG, GPIO_CONFIG_TXSTATE);
                }
            }
            t.write_register(GPIO2_CONFIG, GPIO2_CONFIG_VDD);
            t.write_register(IO_PORT_CONFIG, IO_PORT_DEFAULT);
            status
        });

        self.write_modem_profile(&setup.profile);

        self.claimed(|t| {
            // packet handler on, MSB first, CRC on
            t.write_register(DATA_ACCESS_CONTROL, 0x8C);
            // no broadcast, check header bytes 3..0
            t.write_register(HEADER_CONTROL1, 0x0F);
            // 4 byte header, 2 byte sync, variable packet size
            t.write_register(HEADER_CONTROL2, 0x42);
            t.write_register(PREAMBLE_LENGTH, if setup.diversity { 0x14 } else { 0x0A });
            t.write_register(PREAMBLE_DETECTION_CTRL1, 0x2A);
            t.write_register(SYNC_WORD3, 0x2D);
            t.write_register(SYNC_WORD2, 0xD4);
            t.write_register(SYNC_WORD1, 0x00);
            t.write_register(SYNC_WORD0, 0x00);

            for (i, byte) in setup.magic.to_be_bytes().into_iter().enumerate() {
                t.write_register(TRANSMIT_HEADER3 + i as u8, byte);
                t.write_register(CHECK_HEADER3 + i as u8, byte);
            }

            for i in 0..4 {
                t.write_register(HEADER_ENABLE3 + i, 0xFF);
            }

            t.write_register(TX_POWER, setup.tx_power);
            t.write_register(FREQUENCY_HOPPING_CHANNEL_SELECT, 0);
            t.write_register(FREQUENCY_HOPPING_STEP_SIZE, setup.channel_spacing);
            t.write_register(FREQUENCY_OFFSET1, 0x00);
            t.write_register(FREQUENCY_OFFSET2, 0x00);
        });

        self.set_carrier_frequency(setup.carrier_frequency);
    }

    pub fn write_modem_profile(&mut self, profile: &ModemProfile) {
        trace!("Writing modem profile for {} bps", profile.bps);
        self.claimed(|t| {
            for (addr, value) in profile.register_writes() {
                t.write_register(addr, value);
            }
        });
    }

    pub fn set_carrier_frequency(&mut self, f: u32) {
        trace!("Carrier frequency {} Hz", f);
        let (band, fc) = carrier_frequency_registers(f);
        self.claimed(|t| {
            t.write_register(FREQUENCY_BAND_SELECT, band);
            t.write_register(NOMINAL_CARRIER_FREQUENCY1, (fc >> 8) as u8);
            t.write_register(NOMINAL_CARRIER_FREQUENCY0, (fc & 0xFF) as u8);
        });
    }

    /// Select a hop channel and the header byte expected on it
    pub fn set_hop_channel(&mut self, channel: u8, header: u8) {
        self.claimed(|t| {
            t.write_register(FREQUENCY_HOPPING_CHANNEL_SELECT, channel);
            t.write_register(TRANSMIT_HEADER0, header);
            t.write_register(CHECK_HEADER0, header);
        });
    }

    pub fn clear_fifo(&mut self) {
        self.claimed(|t| {
            t.write_register(OP_AND_FUNC_CTRL2, OPFC2_FIFO_CLEAR);
            t.write_register(OP_AND_FUNC_CTRL2, 0x00);
        });
    }

    /// Flush the receiver and listen with the packet-valid interrupt enabled
    pub fn rx_reset(&mut self) {
        trace!("RX reset");
        self.write_claim(OP_AND_FUNC_CTRL1, PWRSTATE_READY);
        self.write_claim(RX_FIFO_CONTROL, RX_FIFO_THRESHOLD);
        self.clear_fifo();
        self.it_status = self.claimed(|t| {
            t.write_register(OP_AND_FUNC_CTRL1, PWRSTATE_RX);
            t.write_register(INTERRUPT_ENABLE1, IE1_ENPKVALID);
            Self::read_interrupt_status(t)
        });
    }

    /// Drop to ready, let the synthesizer settle, then enter receive
    pub fn to_rx_mode<C: Clock + ?Sized>(&mut self, clock: &C) {
        self.it_status = self.claimed(|t| {
            let status = Self::read_interrupt_status(t);
            t.write_register(OP_AND_FUNC_CTRL1, PWRSTATE_READY);
            status
        });
        clock.sleep_ms(RX_SETTLE_MS);
        self.rx_reset();
    }

    /// Received signal strength
    pub fn rssi(&mut self) -> u8 {
        self.read_claim(RSSI)
    }

    /// 10-bit automatic frequency correction reading
    pub fn afc(&mut self) -> u16 {
        let high = u16::from(self.read_claim(AFC_CORRECTION_READ));
        let low = u16::from(self.read_claim(OOK_COUNTER_VALUE1));
        (high << 2) | (low >> 6)
    }

    /// Read from the receive FIFO inside one chip-select frame
    pub fn read_fifo_with<R>(&mut self, f: impl FnOnce(&mut FifoReader<'_, T>) -> R) -> R {
        self.claimed(|t| {
            t.assert_select();
            t.transfer_byte(FIFO_ACCESS);
            let result = f(&mut FifoReader { transport: &mut *t });
            t.deassert_select();
            result
        })
    }

    /// Fill `buf` from the receive FIFO
    pub fn read_fifo(&mut self, buf: &mut [u8]) {
        self.read_fifo_with(|fifo| fifo.read_into(buf));
    }

    /// Load a packet into the transmit FIFO and arm the packet-sent interrupt
    pub fn load_tx_packet(&mut self, packet: &[u8]) {
        self.it_status = self.claimed(|t| {
            t.write_register(TRANSMIT_PACKET_LENGTH, packet.len() as u8);
            for &byte in packet {
                t.write_register(FIFO_ACCESS, byte);
            }
            t.write_register(INTERRUPT_ENABLE1, IE1_ENPKSENT);
            Self::read_interrupt_status(t)
        });
    }

    /// Switch to transmit; the loaded packet goes on air
    pub fn start_tx(&mut self) {
        self.write_claim(OP_AND_FUNC_CTRL1, PWRSTATE_TX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualClock;
    use crate::sim::SimulatedRfm22;

    fn radio() -> (SimulatedRfm22, Rfm22<SimulatedRfm22>) {
        let chip = SimulatedRfm22::new();
        let radio = Rfm22::new(chip.clone(), GpioDirection::default());
        (chip, radio)
    }

    #[test]
    fn test_carrier_frequency_low_band() {
        // 435 MHz: fb = 19, fc = 5 MHz * 4 / 625
        assert_eq!(carrier_frequency_registers(435_000_000), (0x53, 32_000));
    }

    #[test]
    fn test_carrier_frequency_high_band() {
        // 868 MHz: fb = 19, fc = 8 MHz * 2 / 625
        assert_eq!(carrier_frequency_registers(868_000_000), (0x73, 25_600));
    }

    #[test]
    fn test_probe_accepts_rfm22b() {
        let (_, mut radio) = radio();
        assert!(radio.probe().is_ok());
    }

    #[test]
    fn test_probe_rejects_other_device() {
        let (chip, mut radio) = radio();
        chip.set_register(DEVICE_TYPE, 0x07);
        match radio.probe() {
            Err(LinkError::DeviceNotFound(0x07)) => {}
            other => panic!("Expected DeviceNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_configure_session_registers() {
        let (chip, mut radio) = radio();
        let params = SessionParameters {
            rf_magic: 0xA1B2_C3D4,
            flags: CHANNELS_8 | DIVERSITY_ENABLED,
            ..SessionParameters::default()
        };

        radio.configure(&RadioSetup::for_session(&params));

        assert_eq!(chip.register(TRANSMIT_HEADER3), 0xA1);
        assert_eq!(chip.register(TRANSMIT_HEADER0), 0xD4);
        assert_eq!(chip.register(CHECK_HEADER3), 0xA1);
        assert_eq!(chip.register(CHECK_HEADER0), 0xD4);
        assert_eq!(chip.register(PREAMBLE_LENGTH), 0x14);
        assert_eq!(chip.register(TX_POWER), DEFAULT_RF_POWER);
        assert_eq!(chip.register(FREQUENCY_HOPPING_STEP_SIZE), DEFAULT_CHANNEL_SPACING);
        assert_eq!(chip.register(TX_DATA_RATE1), 0x9D);
        assert_eq!(chip.register(GPIO0_CONFIG), GPIO_CONFIG_TXSTATE);
        assert_eq!(chip.register(GPIO1_CONFIG), GPIO_CONFIG_RXSTATE);
        assert_eq!(chip.register(FREQUENCY_BAND_SELECT), 0x53);
        assert!(chip.balanced_bus_claims());
    }

    #[test]
    fn test_configure_binding_registers() {
        let (chip, mut radio) = radio();
        radio.configure(&RadioSetup::binding());

        assert_eq!(chip.register(TX_POWER), BINDING_POWER);
        assert_eq!(chip.register(PREAMBLE_LENGTH), 0x0A);
        assert_eq!(chip.register(TX_DATA_RATE1), BIND_PROFILE.tx_data_rate1);
        let header: Vec<u8> = (0..4).map(|i| chip.register(CHECK_HEADER3 + i)).collect();
        assert_eq!(header, BIND_MAGIC.to_be_bytes().to_vec());
    }

    #[test]
    fn test_gpio_direction_swapped() {
        let chip = SimulatedRfm22::new();
        let mut radio = Rfm22::new(chip.clone(), GpioDirection::Gpio0RxGpio1Tx);
        radio.configure(&RadioSetup::binding());
        assert_eq!(chip.register(GPIO0_CONFIG), GPIO_CONFIG_RXSTATE);
        assert_eq!(chip.register(GPIO1_CONFIG), GPIO_CONFIG_TXSTATE);
        assert!(!radio.is_hung());
    }

    #[test]
    fn test_hang_detection() {
        let (chip, mut radio) = radio();
        radio.configure(&RadioSetup::binding());
        assert!(!radio.is_hung());

        chip.inject_hang();
        assert!(radio.is_hung());
    }

    #[test]
    fn test_to_rx_mode_settles_and_listens() {
        let (chip, mut radio) = radio();
        let clock = ManualClock::new();

        radio.to_rx_mode(&clock);

        assert_eq!(clock.millis(), RX_SETTLE_MS);
        assert_eq!(chip.register(OP_AND_FUNC_CTRL1), PWRSTATE_RX);
        assert_eq!(chip.register(INTERRUPT_ENABLE1), IE1_ENPKVALID);
        assert_eq!(chip.register(RX_FIFO_CONTROL), RX_FIFO_THRESHOLD);
    }

    #[test]
    fn test_afc_reading() {
        let (chip, mut radio) = radio();
        chip.set_register(AFC_CORRECTION_READ, 0x81);
        chip.set_register(OOK_COUNTER_VALUE1, 0xC0);
        assert_eq!(radio.afc(), (0x81 << 2) | 0x03);
    }

    #[test]
    fn test_load_tx_packet_fills_fifo() {
        let (chip, mut radio) = radio();
        radio.load_tx_packet(&[BIND_ACK]);
        assert_eq!(chip.register(TRANSMIT_PACKET_LENGTH), 1);
        assert_eq!(chip.register(INTERRUPT_ENABLE1), IE1_ENPKSENT);

        radio.start_tx();
        assert_eq!(chip.sent_packets(), vec![vec![BIND_ACK]]);
    }
}
