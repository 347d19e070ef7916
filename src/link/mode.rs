//! # Radio Mode Cell
//!
//! The transceiver mode shared between the poll loop and the interrupt
//! source. The interrupt side only ever completes a pending operation:
//! `Receiving -> Received` or `Transmitting -> Transmitted`.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

/// Operating mode of the transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RadioMode {
    Idle = 0,
    Transmitting = 1,
    Transmitted = 2,
    Receiving = 3,
    Received = 4,
    Available = 5,
}

impl RadioMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RadioMode::Transmitting,
            2 => RadioMode::Transmitted,
            3 => RadioMode::Receiving,
            4 => RadioMode::Received,
            5 => RadioMode::Available,
            _ => RadioMode::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct ModeInner {
    mode: AtomicU8,
    irqs: AtomicU32,
}

/// Atomic single-word radio mode
///
/// Clones share the same cell.
#[derive(Debug, Clone, Default)]
pub struct ModeCell {
    inner: Arc<ModeInner>,
}

impl ModeCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> RadioMode {
        RadioMode::from_u8(self.inner.mode.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: RadioMode) {
        self.inner.mode.store(mode as u8, Ordering::Release);
    }

    /// Number of interrupts seen so far
    pub fn irq_count(&self) -> u32 {
        self.inner.irqs.load(Ordering::Relaxed)
    }

    /// Handle to give to the interrupt source
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    fn complete(&self, from: RadioMode, to: RadioMode) -> bool {
        self.inner
            .mode
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Interrupt-side view of a [`ModeCell`]
///
/// Performs no register I/O and touches nothing but the mode word.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    inner: Arc<ModeInner>,
}

impl InterruptHandle {
    /// Signal that the pending hardware operation completed
    ///
    /// # Returns
    ///
    /// * `false` - The poll loop observes the new mode on its own; no wake is needed
    pub fn on_interrupt(&self) -> bool {
        self.inner.irqs.fetch_add(1, Ordering::Relaxed);

        let cell = ModeCell {
            inner: Arc::clone(&self.inner),
        };
        if !cell.complete(RadioMode::Transmitting, RadioMode::Transmitted) {
            cell.complete(RadioMode::Receiving, RadioMode::Received);
        }

        false
    }
}
