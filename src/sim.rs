//! # RFM22B Simulation
//!
//! A register-level model of the transceiver and a matching OpenLRS
//! transmitter, used by the receiver binary and by tests.
//!
//! The model covers:
//! - The register file and SPI framing (address byte, write bit, auto-increment)
//! - RX/TX FIFOs at 0x7F (no auto-increment)
//! - Channel matching and header filtering on reception
//! - Packet-valid and packet-sent interrupts
//! - RSSI/AFC readings and hang injection

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace};

use crate::link::mode::InterruptHandle;
use crate::openlrs::bind_data::SessionParameters;
use crate::openlrs::hop::HopSequencer;
use crate::openlrs::packet::build_channel_packet;
use crate::openlrs::protocol::*;
use crate::openlrs::timing::expected_interval_us;
use crate::rfm22::regs::*;
use crate::rfm22::transport::RegisterTransport;

/// Status 1 bit: valid packet received
const ISTAT1_PKVALID: u8 = 0x02;
/// Status 1 bit: packet sent
const ISTAT1_PKSENT: u8 = 0x04;

/// A packet on air
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirPacket {
    /// Hop channel it is sent on
    pub channel: u8,
    /// Header bytes, most significant first
    pub header: [u8; 4],
    pub payload: Vec<u8>,
}

impl AirPacket {
    /// Bind request carrying session parameters
    pub fn bind_request(params: &SessionParameters) -> Self {
        let mut payload = Vec::with_capacity(1 + params.to_wire().len());
        payload.push(BIND_REQUEST);
        payload.extend_from_slice(&params.to_wire());

        Self {
            channel: 0,
            header: BIND_MAGIC.to_be_bytes(),
            payload,
        }
    }

    /// Channel data packet for the hop the sequencer points at
    pub fn channel_data(params: &SessionParameters, hop: &HopSequencer, channels: &[i16]) -> Self {
        let mut header = params.rf_magic.to_be_bytes();
        header[3] = hop.header_byte();

        Self {
            channel: hop.channel(),
            header,
            payload: build_channel_packet(params.flags, channels),
        }
    }
}

#[derive(Debug)]
struct ChipState {
    regs: [u8; 128],
    status1: u8,
    rx_fifo: VecDeque<u8>,
    tx_fifo: Vec<u8>,
    selected: bool,
    frame_addr: Option<u8>,
    frame_write: bool,
    claim_depth: i32,
    claim_underflow: bool,
    writes: Vec<(u8, u8)>,
    sent: Vec<Vec<u8>>,
    air: VecDeque<AirPacket>,
    interrupt: Option<InterruptHandle>,
}

impl Default for ChipState {
    fn default() -> Self {
        let mut regs = [0u8; 128];
        regs[DEVICE_TYPE as usize] = DEVICE_TYPE_RFM22B;

        Self {
            regs,
            status1: 0,
            rx_fifo: VecDeque::new(),
            tx_fifo: Vec::new(),
            selected: false,
            frame_addr: None,
            frame_write: false,
            claim_depth: 0,
            claim_underflow: false,
            writes: Vec::new(),
            sent: Vec::new(),
            air: VecDeque::new(),
            interrupt: None,
        }
    }
}

impl ChipState {
    fn reg(&self, addr: u8) -> u8 {
        self.regs[usize::from(addr & 0x7F)]
    }

    fn listening(&self) -> bool {
        self.reg(OP_AND_FUNC_CTRL1) & OPFC1_RXON != 0
    }

    fn fire_interrupt(&self) {
        if let Some(irq) = &self.interrupt {
            irq.on_interrupt();
        }
    }

    fn read_reg(&mut self, addr: u8) -> u8 {
        match addr {
            INTERRUPT_STATUS1 => std::mem::take(&mut self.status1),
            INTERRUPT_STATUS2 => 0,
            FIFO_ACCESS => self.rx_fifo.pop_front().unwrap_or(0),
            _ => self.reg(addr),
        }
    }

    fn write_reg(&mut self, addr: u8, value: u8) {
        self.writes.push((addr, value));

        match addr {
            FIFO_ACCESS => self.tx_fifo.push(value),
            OP_AND_FUNC_CTRL2 => {
                self.regs[usize::from(addr)] = value;
                if value & OPFC2_FIFO_CLEAR != 0 {
                    self.rx_fifo.clear();
                    self.tx_fifo.clear();
                }
            }
            OP_AND_FUNC_CTRL1 => {
                self.regs[usize::from(addr)] = value;
                if value & OPFC1_TXON != 0 {
                    self.transmit();
                } else if value & OPFC1_RXON != 0 {
                    self.pump_air();
                }
            }
            INTERRUPT_ENABLE1 => {
                self.regs[usize::from(addr)] = value;
                self.pump_air();
            }
            _ => self.regs[usize::from(addr & 0x7F)] = value,
        }
    }

    fn transmit(&mut self) {
        let len = usize::from(self.reg(TRANSMIT_PACKET_LENGTH));
        let packet: Vec<u8> = self.tx_fifo.drain(..).take(len).collect();
        trace!("Simulated chip sent {:02X?}", packet);
        self.sent.push(packet);

        self.regs[usize::from(OP_AND_FUNC_CTRL1)] = PWRSTATE_READY;
        self.status1 |= ISTAT1_PKSENT;
        if self.reg(INTERRUPT_ENABLE1) & IE1_ENPKSENT != 0 {
            self.fire_interrupt();
        }
    }

    fn header_matches(&self, header: &[u8; 4]) -> bool {
        header.iter().enumerate().all(|(i, &byte)| {
            let i = i as u8;
            (byte ^ self.reg(CHECK_HEADER3 + i)) & self.reg(HEADER_ENABLE3 + i) == 0
        })
    }

    fn accepts(&self, packet: &AirPacket) -> bool {
        self.listening()
            && packet.channel == self.reg(FREQUENCY_HOPPING_CHANNEL_SELECT)
            && self.header_matches(&packet.header)
    }

    fn deliver(&mut self, packet: AirPacket) -> bool {
        if !self.accepts(&packet) {
            return false;
        }

        self.rx_fifo = packet.payload.iter().copied().collect();
        self.regs[usize::from(RECEIVED_PACKET_LENGTH)] = packet.payload.len() as u8;
        self.regs[usize::from(OP_AND_FUNC_CTRL1)] = PWRSTATE_READY;
        self.status1 |= ISTAT1_PKVALID;
        if self.reg(INTERRUPT_ENABLE1) & IE1_ENPKVALID != 0 {
            self.fire_interrupt();
        }

        true
    }

    /// Deliver the first queued packet the armed receiver accepts
    fn pump_air(&mut self) {
        if self.reg(INTERRUPT_ENABLE1) & IE1_ENPKVALID == 0 {
            return;
        }

        if let Some(pos) = self.air.iter().position(|packet| self.accepts(packet)) {
            if let Some(packet) = self.air.remove(pos) {
                self.deliver(packet);
            }
        }
    }

    fn transfer(&mut self, out: u8) -> u8 {
        match self.frame_addr {
            None => {
                self.frame_write = out & WRITE_BIT != 0;
                self.frame_addr = Some(out & !WRITE_BIT);
                0
            }
            Some(addr) => {
                let value = if self.frame_write {
                    self.write_reg(addr, out);
                    0
                } else {
                    self.read_reg(addr)
                };
                if addr != FIFO_ACCESS {
                    self.frame_addr = Some((addr + 1) & 0x7F);
                }
                value
            }
        }
    }
}

/// Simulated RFM22B
///
/// Clones are handles to the same chip, so a test can keep one while the
/// driver owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRfm22 {
    state: Arc<Mutex<ChipState>>,
}

impl SimulatedRfm22 {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route completion interrupts to a mode cell
    pub fn attach_interrupt(&self, irq: InterruptHandle) {
        self.state().interrupt = Some(irq);
    }

    pub fn register(&self, addr: u8) -> u8 {
        self.state().reg(addr)
    }

    /// Poke a register without logging it as a driver write
    pub fn set_register(&self, addr: u8, value: u8) {
        self.state().regs[usize::from(addr & 0x7F)] = value;
    }

    pub fn set_rssi(&self, rssi: u8) {
        self.set_register(RSSI, rssi);
    }

    /// Set the 10-bit AFC correction reading
    pub fn set_afc(&self, afc: u16) {
        self.set_register(AFC_CORRECTION_READ, (afc >> 2) as u8);
        self.set_register(OOK_COUNTER_VALUE1, ((afc & 0x03) << 6) as u8);
    }

    /// Make the lock-up check register read 0 until it is rewritten
    pub fn inject_hang(&self) {
        debug!("Simulated chip hang injected");
        self.set_register(HANG_CHECK, 0);
    }

    /// Receive a packet right now
    ///
    /// # Returns
    ///
    /// * `true` - The chip was listening on the packet's channel and the header matched
    pub fn deliver(&self, packet: AirPacket) -> bool {
        self.state().deliver(packet)
    }

    /// Queue a packet until the receiver is armed on its channel
    pub fn queue_air(&self, packet: AirPacket) {
        let mut state = self.state();
        state.air.push_back(packet);
        state.pump_air();
    }

    /// Register writes issued by the driver, in order
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Packets transmitted so far
    pub fn sent_packets(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    /// Drain transmitted packets
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.state().sent)
    }

    /// Every claim was released and no release came without a claim
    pub fn balanced_bus_claims(&self) -> bool {
        let state = self.state();
        state.claim_depth == 0 && !state.claim_underflow
    }
}

impl RegisterTransport for SimulatedRfm22 {
    fn claim_bus(&mut self) {
        self.state().claim_depth += 1;
    }

    fn release_bus(&mut self) {
        let mut state = self.state();
        state.claim_depth -= 1;
        if state.claim_depth < 0 {
            state.claim_underflow = true;
        }
    }

    fn assert_select(&mut self) {
        let mut state = self.state();
        state.selected = true;
        state.frame_addr = None;
    }

    fn deassert_select(&mut self) {
        let mut state = self.state();
        state.selected = false;
        state.frame_addr = None;
    }

    fn transfer_block(&mut self, out: &[u8], mut input: Option<&mut [u8]>) {
        let mut state = self.state();
        if !state.selected {
            return;
        }

        for (i, &byte) in out.iter().enumerate() {
            let value = state.transfer(byte);
            if let Some(slot) = input.as_mut().and_then(|buf| buf.get_mut(i)) {
                *slot = value;
            }
        }
    }
}

/// OpenLRS transmitter counterpart of a [`SimulatedRfm22`]
///
/// Repeats bind requests on the bind channel until the receiver
/// acknowledges, then sends one channel packet per tick while hopping
/// through its hop list.
#[derive(Debug)]
pub struct SimulatedTransmitter {
    chip: SimulatedRfm22,
    params: SessionParameters,
    hop: HopSequencer,
    channels: Vec<i16>,
    bound: bool,
    packets_sent: u64,
    packets_heard: u64,
}

impl SimulatedTransmitter {
    pub fn new(chip: SimulatedRfm22, params: SessionParameters) -> Self {
        Self {
            chip,
            params,
            hop: HopSequencer::new(&params),
            channels: vec![512; PPM_CHANNELS],
            bound: false,
            packets_sent: 0,
            packets_heard: 0,
        }
    }

    /// Start as if binding already happened
    pub fn already_bound(mut self) -> Self {
        self.bound = true;
        self
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn params(&self) -> &SessionParameters {
        &self.params
    }

    /// Transmit cadence of the session
    pub fn interval_us(&self) -> u32 {
        expected_interval_us(&self.params)
    }

    pub fn set_channels(&mut self, channels: &[i16]) {
        self.channels = channels.to_vec();
    }

    /// Packets put on air / packets the receiver accepted
    pub fn counters(&self) -> (u64, u64) {
        (self.packets_sent, self.packets_heard)
    }

    /// Send the next packet
    ///
    /// # Returns
    ///
    /// * `true` - The receiver accepted the packet
    pub fn tick(&mut self) -> bool {
        if !self.bound {
            if self
                .chip
                .take_sent()
                .iter()
                .any(|packet| packet.first() == Some(&BIND_ACK))
            {
                info!("Simulated transmitter bound");
                self.bound = true;
            } else {
                self.packets_sent += 1;
                let heard = self.chip.deliver(AirPacket::bind_request(&self.params));
                self.packets_heard += u64::from(heard);
                return heard;
            }
        }

        let packet = AirPacket::channel_data(&self.params, &self.hop, &self.channels);
        self.hop.advance();

        self.packets_sent += 1;
        let heard = self.chip.deliver(packet);
        self.packets_heard += u64::from(heard);
        heard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mode::{ModeCell, RadioMode};

    fn listening_chip() -> SimulatedRfm22 {
        let chip = SimulatedRfm22::new();
        chip.set_register(OP_AND_FUNC_CTRL1, PWRSTATE_RX);
        chip.set_register(INTERRUPT_ENABLE1, IE1_ENPKVALID);
        for i in 0..4 {
            chip.set_register(HEADER_ENABLE3 + i, 0xFF);
        }
        chip
    }

    #[test]
    fn test_register_framing() {
        let mut chip = SimulatedRfm22::new();
        chip.write_register(TX_POWER, 0x07);
        assert_eq!(chip.read_register(TX_POWER), 0x07);
        assert_eq!(chip.read_register(DEVICE_TYPE), DEVICE_TYPE_RFM22B);
        assert_eq!(chip.writes(), vec![(TX_POWER, 0x07)]);
    }

    #[test]
    fn test_burst_write_auto_increments() {
        let mut chip = SimulatedRfm22::new();
        chip.assert_select();
        chip.transfer_block(&[SYNC_WORD3 | WRITE_BIT, 0x2D, 0xD4], None);
        chip.deassert_select();

        assert_eq!(chip.register(SYNC_WORD3), 0x2D);
        assert_eq!(chip.register(SYNC_WORD2), 0xD4);
    }

    #[test]
    fn test_transfer_without_select_is_ignored() {
        let mut chip = SimulatedRfm22::new();
        chip.transfer_block(&[TX_POWER | WRITE_BIT, 0x07], None);
        assert_eq!(chip.register(TX_POWER), 0);
    }

    #[test]
    fn test_deliver_checks_channel_and_header() {
        let chip = listening_chip();
        chip.set_register(FREQUENCY_HOPPING_CHANNEL_SELECT, 7);
        for (i, byte) in [1u8, 2, 3, 4].into_iter().enumerate() {
            chip.set_register(CHECK_HEADER3 + i as u8, byte);
        }

        let packet = AirPacket {
            channel: 7,
            header: [1, 2, 3, 5],
            payload: vec![0xAA],
        };
        assert!(!chip.deliver(packet.clone()));
        assert!(!chip.deliver(AirPacket { channel: 8, header: [1, 2, 3, 4], ..packet.clone() }));
        assert!(chip.deliver(AirPacket { header: [1, 2, 3, 4], ..packet }));
        assert_eq!(chip.register(RECEIVED_PACKET_LENGTH), 1);
        assert_eq!(chip.register(OP_AND_FUNC_CTRL1), PWRSTATE_READY);
    }

    #[test]
    fn test_deliver_raises_interrupt() {
        let chip = listening_chip();
        let mode = ModeCell::new();
        mode.set(RadioMode::Receiving);
        chip.attach_interrupt(mode.interrupt_handle());
        for (i, byte) in BIND_MAGIC.to_be_bytes().into_iter().enumerate() {
            chip.set_register(CHECK_HEADER3 + i as u8, byte);
        }

        assert!(chip.deliver(AirPacket::bind_request(&SessionParameters::default())));
        assert_eq!(mode.get(), RadioMode::Received);
    }

    #[test]
    fn test_queued_packet_waits_for_receiver() {
        let chip = SimulatedRfm22::new();
        chip.queue_air(AirPacket {
            channel: 0,
            header: [0; 4],
            payload: vec![1, 2, 3],
        });
        assert_eq!(chip.register(RECEIVED_PACKET_LENGTH), 0);

        let mut handle = chip.clone();
        handle.write_register(OP_AND_FUNC_CTRL1, PWRSTATE_RX);
        handle.write_register(INTERRUPT_ENABLE1, IE1_ENPKVALID);
        assert_eq!(chip.register(RECEIVED_PACKET_LENGTH), 3);
    }

    #[test]
    fn test_afc_registers() {
        let chip = SimulatedRfm22::new();
        chip.set_afc(0x3FF);
        assert_eq!(chip.register(AFC_CORRECTION_READ), 0xFF);
        assert_eq!(chip.register(OOK_COUNTER_VALUE1), 0xC0);
    }

    #[test]
    fn test_transmitter_repeats_bind_until_ack() {
        let chip = listening_chip();
        for (i, byte) in BIND_MAGIC.to_be_bytes().into_iter().enumerate() {
            chip.set_register(CHECK_HEADER3 + i as u8, byte);
        }
        let mut tx = SimulatedTransmitter::new(chip.clone(), SessionParameters::default());

        assert!(tx.tick());
        assert!(!tx.is_bound());

        chip.state().sent.push(vec![BIND_ACK]);
        tx.tick();
        assert!(tx.is_bound());
        assert_eq!(tx.counters().0, 2);
    }
}
