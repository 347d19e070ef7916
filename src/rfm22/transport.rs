//! Trait abstraction for the transceiver's register bus

use super::regs::WRITE_BIT;

/// Register-level transport to the transceiver
///
/// Byte transfers only happen between `assert_select` and `deassert_select`.
/// Sequences that must look atomic to other bus users are wrapped in
/// `claim_bus`/`release_bus`.
pub trait RegisterTransport {
    /// Take exclusive ownership of a shared bus
    fn claim_bus(&mut self);

    /// Give the bus back
    fn release_bus(&mut self);

    /// Pull chip select active
    fn assert_select(&mut self);

    /// Release chip select
    fn deassert_select(&mut self);

    /// Full-duplex transfer; `input`, when given, has the same length as `out`
    fn transfer_block(&mut self, out: &[u8], input: Option<&mut [u8]>);

    /// Transfer one byte and return the byte clocked in
    fn transfer_byte(&mut self, out: u8) -> u8 {
        let mut input = [0u8];
        self.transfer_block(&[out], Some(&mut input[..]));
        input[0]
    }

    /// Write one register in its own chip-select frame
    fn write_register(&mut self, addr: u8, data: u8) {
        self.assert_select();
        self.transfer_block(&[addr | WRITE_BIT, data], None);
        self.deassert_select();
    }

    /// Read one register in its own chip-select frame
    fn read_register(&mut self, addr: u8) -> u8 {
        let mut input = [0u8; 2];
        self.assert_select();
        self.transfer_block(&[addr & !WRITE_BIT, 0xFF], Some(&mut input[..]));
        self.deassert_select();
        input[1]
    }
}
