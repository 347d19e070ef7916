//! # Hop Sequencer
//!
//! Walks the bound hop list and programs the transceiver for each hop.
//!
//! Every hop uses its own header byte, `(magic & 0xFF) ^ index`, so the
//! hardware header filter drops packets sent on another hop index or by a
//! link bound with a different magic.

use tracing::trace;

use super::bind_data::SessionParameters;
use super::protocol::MAXHOPS;
use crate::rfm22::transport::RegisterTransport;
use crate::rfm22::Rfm22;

/// Header validation byte for a hop index
pub fn hop_header_byte(magic: u32, index: usize) -> u8 {
    (magic & 0xFF) as u8 ^ index as u8
}

/// Deterministic position in a session's hop list
#[derive(Debug, Clone)]
pub struct HopSequencer {
    hops: [u8; MAXHOPS],
    hop_count: usize,
    magic: u32,
    index: usize,
}

impl HopSequencer {
    /// Start at index 0 of the session's hop list
    pub fn new(params: &SessionParameters) -> Self {
        Self {
            hops: params.hopchannel,
            hop_count: params.hop_count(),
            magic: params.rf_magic,
            index: 0,
        }
    }

    /// Current hop index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of valid hop entries
    pub fn hop_count(&self) -> usize {
        self.hop_count
    }

    /// Channel number at the current index
    pub fn channel(&self) -> u8 {
        self.hops[self.index]
    }

    /// Header byte expected at the current index
    pub fn header_byte(&self) -> u8 {
        hop_header_byte(self.magic, self.index)
    }

    /// Move to the next hop, wrapping to 0 at the end of the list
    pub fn advance(&mut self) -> usize {
        self.index += 1;

        if self.index >= self.hop_count || self.index >= MAXHOPS || self.hops[self.index] == 0 {
            self.index = 0;
        }

        self.index
    }

    /// Program channel select and header registers for the current hop
    pub fn program<T: RegisterTransport>(&self, radio: &mut Rfm22<T>) {
        trace!("Hop {} -> channel {}", self.index, self.channel());
        radio.set_hop_channel(self.channel(), self.header_byte());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfm22::regs::*;
    use crate::sim::SimulatedRfm22;

    fn params_with_hops(hops: &[u8]) -> SessionParameters {
        let mut params = SessionParameters::default();
        params.hopchannel = [0; MAXHOPS];
        params.hopchannel[..hops.len()].copy_from_slice(hops);
        params
    }

    #[test]
    fn test_hop_count_three() {
        let hop = HopSequencer::new(&params_with_hops(&[3, 17, 42]));
        assert_eq!(hop.hop_count(), 3);
        assert_eq!(hop.index(), 0);
        assert_eq!(hop.channel(), 3);
    }

    #[test]
    fn test_advance_wraps_after_hop_count() {
        let mut hop = HopSequencer::new(&params_with_hops(&[3, 17, 42]));
        assert_eq!(hop.advance(), 1);
        assert_eq!(hop.channel(), 17);
        assert_eq!(hop.advance(), 2);
        assert_eq!(hop.channel(), 42);
        assert_eq!(hop.advance(), 0);
        assert_eq!(hop.channel(), 3);
    }

    #[test]
    fn test_advance_never_lands_on_sentinel() {
        for count in 1..=MAXHOPS {
            let hops: Vec<u8> = (1..=count as u8).collect();
            let mut hop = HopSequencer::new(&params_with_hops(&hops));
            for _ in 0..(3 * MAXHOPS) {
                hop.advance();
                assert_ne!(hop.channel(), 0);
            }
        }
    }

    #[test]
    fn test_full_cycle_returns_to_start() {
        for count in 1..=MAXHOPS {
            let hops: Vec<u8> = (10..10 + count as u8).collect();
            let mut hop = HopSequencer::new(&params_with_hops(&hops));
            for _ in 0..hop.hop_count() {
                hop.advance();
            }
            assert_eq!(hop.index(), 0, "hop count {}", count);
        }
    }

    #[test]
    fn test_header_byte_per_hop() {
        assert_eq!(hop_header_byte(0xDEAD_FEED, 0), 0xED);
        assert_eq!(hop_header_byte(0xDEAD_FEED, 1), 0xEC);
        assert_eq!(hop_header_byte(0xDEAD_FEED, 5), 0xE8);
    }

    #[test]
    fn test_program_writes_channel_and_headers() {
        let chip = SimulatedRfm22::new();
        let mut radio = Rfm22::new(chip.clone(), Default::default());
        let mut params = params_with_hops(&[3, 17, 42]);
        params.rf_magic = 0x0102_0380;
        let mut hop = HopSequencer::new(&params);
        hop.advance();

        chip.clear_writes();
        hop.program(&mut radio);

        assert_eq!(
            chip.writes(),
            vec![
                (FREQUENCY_HOPPING_CHANNEL_SELECT, 17),
                (TRANSMIT_HEADER0, 0x81),
                (CHECK_HEADER0, 0x81),
            ]
        );
    }
}
