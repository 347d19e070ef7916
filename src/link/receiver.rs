//! # Link State Machine
//!
//! One poll cycle of the receive link: hang recovery, packet intake, RSSI
//! sampling, loss/resync policy and hopping.
//!
//! Timing is deadline based. `last_packet_us` is the baseline the next
//! arrival is expected from; it moves forward one interval per missed
//! packet so the receiver keeps hopping in step with the transmitter. After
//! `hop_count` consecutive misses the receiver falls back to one hop per
//! full hop cycle until a packet is heard again.

use tracing::{debug, info, trace, warn};

use super::mode::{ModeCell, RadioMode};
use super::state::{LinkRuntimeState, LinkStatus};
use crate::openlrs::bind_data::SessionParameters;
use crate::openlrs::hop::HopSequencer;
use crate::openlrs::packet::{is_channel_packet, packet_size, unpack_channels, ChannelFrame};
use crate::openlrs::timing::expected_interval_us;
use crate::platform::Clock;
use crate::rfm22::transport::RegisterTransport;
use crate::rfm22::{RadioSetup, Rfm22};

/// Largest packet any channel configuration produces
const MAX_PACKET_SIZE: usize = 21;

/// RSSI is sampled this long before the next packet is due (µs)
const RSSI_SAMPLE_LEAD_US: u32 = 1500;

/// Grace period after the deadline before a packet counts as lost (µs)
const LOSS_GRACE_US: u32 = 1000;

/// What happened during one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Channels decoded from a received channel packet
    pub frame: Option<ChannelFrame>,
    /// A packet was read from the transceiver
    pub received: bool,
    /// A packet deadline was missed
    pub lost: bool,
    /// Full resync after a hop cycle without reception
    pub resync: bool,
    /// The receiver moved to the next hop
    pub hopped: bool,
    /// The transceiver was found locked up and reinitialized
    pub recovered_hang: bool,
}

/// Receive side of a bound session
#[derive(Debug)]
pub struct LinkStateMachine {
    session: SessionParameters,
    interval_us: u32,
    packet_size: usize,
    hop: HopSequencer,
    state: LinkRuntimeState,
    mode: ModeCell,
}

impl LinkStateMachine {
    /// Create the state machine for a session
    ///
    /// The expected packet interval is computed once here and cached for
    /// the lifetime of the session.
    pub fn new(session: SessionParameters, mode: ModeCell) -> Self {
        let hop = HopSequencer::new(&session);
        let state = LinkRuntimeState::new(hop.hop_count() as u8);

        Self {
            interval_us: expected_interval_us(&session),
            packet_size: usize::from(packet_size(session.flags)).min(MAX_PACKET_SIZE),
            hop,
            state,
            session,
            mode,
        }
    }

    pub fn session(&self) -> &SessionParameters {
        &self.session
    }

    /// Cached expected packet interval (µs)
    pub fn interval_us(&self) -> u32 {
        self.interval_us
    }

    pub fn hop(&self) -> &HopSequencer {
        &self.hop
    }

    pub fn state(&self) -> &LinkRuntimeState {
        &self.state
    }

    pub fn mode(&self) -> RadioMode {
        self.mode.get()
    }

    pub fn status(&self) -> LinkStatus {
        self.state.snapshot(self.hop.index())
    }

    /// Configure the transceiver for the session and start listening on hop 0
    pub fn start<T, C>(&mut self, radio: &mut Rfm22<T>, clock: &C)
    where
        T: RegisterTransport,
        C: Clock + ?Sized,
    {
        info!(
            "Entering normal mode: {} hops, {} µs interval, magic 0x{:08X}",
            self.hop.hop_count(),
            self.interval_us,
            self.session.rf_magic
        );

        radio.configure(&RadioSetup::for_session(&self.session));
        self.hop.program(radio);

        self.mode.set(RadioMode::Receiving);
        radio.to_rx_mode(clock);

        self.state.link_acquired = false;
        self.state.last_packet_us = clock.micros();
    }

    /// Run one poll cycle
    ///
    /// # Arguments
    ///
    /// * `radio` - Transceiver, used only from the polling task
    /// * `clock` - Time source
    ///
    /// # Returns
    ///
    /// * `PollReport` - Events of this cycle, including decoded channels
    pub fn poll<T, C>(&mut self, radio: &mut Rfm22<T>, clock: &C) -> PollReport
    where
        T: RegisterTransport,
        C: Clock + ?Sized,
    {
        let mut report = PollReport::default();

        if radio.is_hung() {
            warn!("Transceiver hang detected, reinitializing");
            radio.configure(&RadioSetup::for_session(&self.session));
            self.hop.program(radio);
            self.mode.set(RadioMode::Receiving);
            radio.to_rx_mode(clock);
            report.recovered_hang = true;
        }

        if self.mode.get() == RadioMode::Received {
            let packet_time = clock.micros();
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let packet = &mut buf[..self.packet_size];
            radio.read_fifo(packet);

            self.state.last_afc = radio.afc();
            self.state.record_packet(packet_time);

            if let Some((&header, payload)) = packet.split_first() {
                if is_channel_packet(header) {
                    report.frame = Some(unpack_channels(self.session.channel_config(), payload));
                } else {
                    trace!("Ignoring non-channel packet 0x{:02X}", header);
                }
            }

            self.mode.set(RadioMode::Receiving);
            radio.rx_reset();
            self.state.will_hop = true;
            report.received = true;
        }

        let now_us = clock.micros();
        let interval = self.interval_us;
        let hop_count = self.state.hop_count;
        let since_packet = now_us.wrapping_sub(self.state.last_packet_us);

        if self.state.lost_packets < 2
            && self.state.last_rssi_us != self.state.last_packet_us
            && since_packet > interval.saturating_sub(RSSI_SAMPLE_LEAD_US)
        {
            self.state.last_rssi_us = self.state.last_packet_us;
            if let Some(smoothed) = self.state.add_rssi_sample(radio.rssi()) {
                debug!("RSSI: {}", smoothed);
            }
        }

        let full_cycle = interval.saturating_mul(u32::from(hop_count));

        if self.state.link_acquired {
            if self.state.lost_packets < hop_count && since_packet > interval + LOSS_GRACE_US {
                if self.state.lost_packets == 0 {
                    debug!("Link lost at {} ms", clock.millis());
                }
                self.state.record_loss(interval);
                report.lost = true;
            } else if self.state.lost_packets == hop_count && since_packet > full_cycle {
                debug!("No packet for a full hop cycle, resyncing");
                self.state.resync(now_us);
                report.resync = true;
            }
        } else if since_packet > full_cycle {
            self.state.last_packet_us = now_us;
            self.state.will_hop = true;
        }

        if self.state.will_hop {
            self.hop.advance();
            self.hop.program(radio);
            self.state.will_hop = false;
            report.hopped = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openlrs::protocol::*;
    use crate::platform::ManualClock;
    use crate::rfm22::regs::*;
    use crate::rfm22::GpioDirection;
    use crate::sim::{AirPacket, SimulatedRfm22};

    struct Rig {
        chip: SimulatedRfm22,
        radio: Rfm22<SimulatedRfm22>,
        clock: ManualClock,
        link: LinkStateMachine,
    }

    fn session() -> SessionParameters {
        let mut params = SessionParameters {
            modem_params: 1,
            flags: CHANNELS_8,
            rf_magic: 0x1234_5678,
            ..SessionParameters::default()
        };
        params.hopchannel = [0; MAXHOPS];
        params.hopchannel[..3].copy_from_slice(&[3, 17, 42]);
        params
    }

    fn rig() -> Rig {
        let chip = SimulatedRfm22::new();
        let mode = ModeCell::new();
        chip.attach_interrupt(mode.interrupt_handle());
        let mut radio = Rfm22::new(chip.clone(), GpioDirection::default());
        let clock = ManualClock::new();
        let mut link = LinkStateMachine::new(session(), mode);
        link.start(&mut radio, &clock);

        Rig {
            chip,
            radio,
            clock,
            link,
        }
    }

    impl Rig {
        fn send(&self, channels: &[i16]) -> bool {
            self.chip.deliver(AirPacket::channel_data(
                self.link.session(),
                self.link.hop(),
                channels,
            ))
        }

        fn poll(&mut self) -> PollReport {
            self.link.poll(&mut self.radio, &self.clock)
        }
    }

    #[test]
    fn test_interval_cached_for_session() {
        let rig = rig();
        assert_eq!(rig.link.interval_us(), 25_000);
        assert_eq!(rig.link.state().hop_count, 3);
    }

    #[test]
    fn test_start_listens_on_first_hop() {
        let rig = rig();
        assert_eq!(rig.link.mode(), RadioMode::Receiving);
        assert_eq!(rig.chip.register(FREQUENCY_HOPPING_CHANNEL_SELECT), 3);
        assert_eq!(rig.chip.register(CHECK_HEADER0), 0x78);
        assert_eq!(rig.chip.register(OP_AND_FUNC_CTRL1), PWRSTATE_RX);
        assert!(!rig.link.state().link_acquired);
    }

    #[test]
    fn test_received_packet_is_decoded() {
        let mut rig = rig();
        let channels = [100, 200, 300, 400, 500, 600, 700, 1023];
        rig.chip.set_afc(0x155);
        assert!(rig.send(&channels));
        assert_eq!(rig.link.mode(), RadioMode::Received);

        let report = rig.poll();

        assert!(report.received);
        assert!(report.hopped);
        let frame = report.frame.expect("channel frame");
        assert_eq!(frame.channels(), &channels);
        assert_eq!(rig.link.mode(), RadioMode::Receiving);
        assert_eq!(rig.link.hop().index(), 1);
        assert_eq!(rig.chip.register(FREQUENCY_HOPPING_CHANNEL_SELECT), 17);
        let status = rig.link.status();
        assert!(status.link_acquired);
        assert_eq!(status.link_quality, 1);
        assert_eq!(status.last_afc, 0x155);
        assert_eq!(status.packets_received, 1);
    }

    #[test]
    fn test_non_channel_packet_not_forwarded() {
        let mut rig = rig();
        let mut header = rig.link.session().rf_magic.to_be_bytes();
        header[3] = rig.link.hop().header_byte();
        let mut payload = vec![0u8; 11];
        payload[0] = 0x38;
        assert!(rig.chip.deliver(AirPacket {
            channel: 3,
            header,
            payload,
        }));

        let report = rig.poll();

        assert!(report.received);
        assert!(report.frame.is_none());
        assert!(rig.link.state().link_acquired);
    }

    #[test]
    fn test_packet_for_other_hop_is_filtered() {
        let rig = rig();
        let mut other = session();
        other.rf_magic = 0x1234_5679;
        let mut hop = HopSequencer::new(&other);
        assert!(!rig.chip.deliver(AirPacket::channel_data(&other, &hop, &[0; 8])));
        hop.advance();
        assert!(!rig.chip.deliver(AirPacket::channel_data(&session(), &hop, &[0; 8])));
    }

    #[test]
    fn test_two_missed_deadlines_no_resync() {
        let mut rig = rig();
        rig.send(&[512; 8]);
        rig.poll();
        let t0 = rig.link.state().last_packet_us;
        let interval = rig.link.interval_us();

        rig.clock.advance_us(u64::from(interval + 1001));
        let report = rig.poll();
        assert!(report.lost);
        assert!(report.hopped);
        assert_eq!(rig.link.state().lost_packets, 1);
        assert_eq!(rig.link.state().last_packet_us, t0 + interval);

        rig.clock.advance_us(u64::from(interval + 1));
        let report = rig.poll();
        assert!(report.lost);
        assert!(!report.resync);
        assert_eq!(rig.link.state().lost_packets, 2);
        assert_eq!(rig.link.state().link_quality, 0b100);
        assert_eq!(rig.link.hop().index(), 0);
    }

    #[test]
    fn test_no_loss_before_grace_period() {
        let mut rig = rig();
        rig.send(&[512; 8]);
        rig.poll();
        let interval = rig.link.interval_us();

        rig.clock.advance_us(u64::from(interval + 1000));
        let report = rig.poll();
        assert!(!report.lost);
        assert!(!report.hopped);
    }

    #[test]
    fn test_resync_after_full_hop_cycle() {
        let mut rig = rig();
        rig.send(&[512; 8]);
        rig.poll();
        let interval = rig.link.interval_us();

        for _ in 0..3 {
            rig.clock.advance_us(u64::from(interval + 1001));
            assert!(rig.poll().lost);
        }
        assert_eq!(rig.link.state().lost_packets, 3);

        // lost == hop_count: no more loss counting, wait for a full cycle
        let baseline = rig.link.state().last_packet_us;
        let now = rig.clock.micros();
        let wait = baseline.wrapping_add(3 * interval).wrapping_sub(now);
        rig.clock.advance_us(u64::from(wait));
        let report = rig.poll();
        assert!(!report.resync);
        assert!(!report.lost);

        rig.clock.advance_us(1);
        let report = rig.poll();
        assert!(report.resync);
        assert!(report.hopped);
        assert_eq!(rig.link.state().link_quality, 0);
        assert_eq!(rig.link.state().smoothed_rssi, 0);
        assert_eq!(rig.link.state().last_packet_us, rig.clock.micros());
        assert_eq!(rig.link.state().lost_packets, 3);
    }

    #[test]
    fn test_reacquire_after_resync() {
        let mut rig = rig();
        rig.send(&[512; 8]);
        rig.poll();
        let interval = rig.link.interval_us();
        for _ in 0..3 {
            rig.clock.advance_us(u64::from(interval + 1001));
            rig.poll();
        }
        rig.clock.advance_us(u64::from(3 * interval + 1));
        assert!(rig.poll().resync);

        assert!(rig.send(&[512; 8]));
        let report = rig.poll();
        assert!(report.received);
        assert_eq!(rig.link.state().lost_packets, 0);
        assert_eq!(rig.link.state().link_quality, 1);
    }

    #[test]
    fn test_slow_scan_before_acquisition() {
        let mut rig = rig();
        let interval = rig.link.interval_us();

        rig.clock.advance_us(u64::from(3 * interval));
        let report = rig.poll();
        assert!(!report.hopped);

        rig.clock.advance_us(1);
        let report = rig.poll();
        assert!(report.hopped);
        assert!(!report.lost);
        assert_eq!(rig.link.hop().index(), 1);
        assert_eq!(rig.link.state().lost_packets, 0);
        assert!(!rig.link.state().link_acquired);
    }

    #[test]
    fn test_rssi_sampled_once_per_packet() {
        let mut rig = rig();
        rig.chip.set_rssi(100);
        let interval = rig.link.interval_us();

        for _ in 0..9 {
            assert!(rig.send(&[512; 8]));
            rig.poll();
            rig.clock.advance_us(u64::from(interval - 1000));
            rig.poll();
            rig.poll();
        }

        assert_eq!(rig.link.state().smoothed_rssi, 25);
        assert_eq!(rig.link.state().last_rssi, 100);
        assert_eq!(rig.link.state().rssi_count, 0);
    }

    #[test]
    fn test_rssi_not_sampled_early() {
        let mut rig = rig();
        rig.chip.set_rssi(100);
        rig.send(&[512; 8]);
        rig.poll();

        rig.clock.advance_us(u64::from(rig.link.interval_us() - 1500));
        rig.poll();
        assert_eq!(rig.link.state().rssi_count, 0);

        rig.clock.advance_us(1);
        rig.poll();
        assert_eq!(rig.link.state().rssi_count, 1);
    }

    #[test]
    fn test_hang_recovery() {
        let mut rig = rig();
        rig.send(&[512; 8]);
        rig.poll();
        rig.chip.inject_hang();

        let report = rig.poll();

        assert!(report.recovered_hang);
        assert_ne!(rig.chip.register(HANG_CHECK), 0);
        assert_eq!(rig.link.mode(), RadioMode::Receiving);
        assert_eq!(rig.chip.register(FREQUENCY_HOPPING_CHANNEL_SELECT), 17);
        assert!(rig.send(&[512; 8]));
    }

    #[test]
    fn test_empty_hop_list_does_not_panic() {
        let chip = SimulatedRfm22::new();
        let mut radio = Rfm22::new(chip.clone(), GpioDirection::default());
        let clock = ManualClock::new();
        let mut params = session();
        params.hopchannel = [0; MAXHOPS];
        let mut link = LinkStateMachine::new(params, ModeCell::new());
        link.start(&mut radio, &clock);

        for _ in 0..5 {
            clock.advance_ms(1);
            link.poll(&mut radio, &clock);
        }
        assert_eq!(link.hop().index(), 0);
    }
}
