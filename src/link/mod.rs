//! # Receive Link Module
//!
//! Runtime side of the OpenLRS link.
//!
//! This module handles:
//! - The radio mode shared with the interrupt source
//! - Blocking transmit with timeout
//! - The binding handshake
//! - The per-poll link state machine (loss, resync, RSSI, hopping)

pub mod mode;
pub mod tx;
pub mod bind;
pub mod state;
pub mod receiver;

pub use bind::{bind_receive, BindOutcome};
pub use mode::{InterruptHandle, ModeCell, RadioMode};
pub use receiver::{LinkStateMachine, PollReport};
pub use state::{LinkRuntimeState, LinkStatus};
pub use tx::{send_packet, TxOutcome};
