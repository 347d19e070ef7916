//! Per-session link bookkeeping: loss counting, quality history and RSSI

/// RSSI samples averaged before the smoothed value is updated
const RSSI_SAMPLES_PER_UPDATE: u8 = 9;

/// Mutable state of a running session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRuntimeState {
    /// Consecutive missed packets
    pub lost_packets: u8,
    /// Packet outcome history, most recent in bit 0
    pub link_quality: u16,
    pub smoothed_rssi: u8,
    pub last_rssi: u8,
    pub rssi_sum: u16,
    pub rssi_count: u8,
    pub last_afc: u16,
    /// Expected-time baseline (µs); the last arrival, advanced on each miss
    pub last_packet_us: u32,
    /// Baseline at which RSSI was last sampled
    pub last_rssi_us: u32,
    /// Set once the first packet of the session arrives
    pub link_acquired: bool,
    pub hop_count: u8,
    pub will_hop: bool,
    pub packets_received: u32,
}

impl LinkRuntimeState {
    pub fn new(hop_count: u8) -> Self {
        Self {
            hop_count,
            ..Self::default()
        }
    }

    /// Book a successfully received packet
    pub fn record_packet(&mut self, at_us: u32) {
        self.last_packet_us = at_us;
        self.lost_packets = 0;
        self.link_quality = (self.link_quality << 1) | 1;
        self.link_acquired = true;
        self.packets_received = self.packets_received.wrapping_add(1);
    }

    /// Book a missed packet and move the baseline to the next expected arrival
    pub fn record_loss(&mut self, interval_us: u32) {
        self.link_quality <<= 1;
        self.lost_packets = self.lost_packets.saturating_add(1);
        self.last_packet_us = self.last_packet_us.wrapping_add(interval_us);
        self.will_hop = true;
    }

    /// Forget link quality after a full hop cycle without reception
    pub fn resync(&mut self, now_us: u32) {
        self.link_quality = 0;
        self.smoothed_rssi = 0;
        self.last_packet_us = now_us;
        self.will_hop = true;
    }

    /// Accumulate an RSSI sample
    ///
    /// # Returns
    ///
    /// * `Some(smoothed)` - A block of samples completed and the smoothed value changed
    pub fn add_rssi_sample(&mut self, rssi: u8) -> Option<u8> {
        self.last_rssi = rssi;
        self.rssi_sum += u16::from(rssi);
        self.rssi_count += 1;

        if self.rssi_count < RSSI_SAMPLES_PER_UPDATE {
            return None;
        }

        let average = self.rssi_sum / u16::from(self.rssi_count);
        self.smoothed_rssi = ((u16::from(self.smoothed_rssi) * 3 + average) / 4) as u8;
        self.rssi_sum = 0;
        self.rssi_count = 0;

        Some(self.smoothed_rssi)
    }

    /// Received packets among the last 15 outcomes
    pub fn quality_score(&self) -> u8 {
        (self.link_quality & 0x7FFF).count_ones() as u8
    }

    pub fn snapshot(&self, hop_index: usize) -> LinkStatus {
        LinkStatus {
            link_acquired: self.link_acquired,
            lost_packets: self.lost_packets,
            link_quality: self.link_quality,
            quality_score: self.quality_score(),
            smoothed_rssi: self.smoothed_rssi,
            last_rssi: self.last_rssi,
            last_afc: self.last_afc,
            hop_index,
            packets_received: self.packets_received,
        }
    }
}

/// Point-in-time view of link health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub link_acquired: bool,
    pub lost_packets: u8,
    pub link_quality: u16,
    pub quality_score: u8,
    pub smoothed_rssi: u8,
    pub last_rssi: u8,
    pub last_afc: u16,
    pub hop_index: usize,
    pub packets_received: u32,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "link={} quality={}/15 lost={} rssi={} afc={} hop={} rx={}",
            if self.link_acquired { "up" } else { "searching" },
            self.quality_score,
            self.lost_packets,
            self.smoothed_rssi,
            self.last_afc,
            self.hop_index,
            self.packets_received
        )
    }
}
