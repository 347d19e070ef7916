//! # OpenLRS RX Library
//!
//! OpenLRSng receive link for the RFM22B transceiver.
//!
//! This library provides binding, frequency hopping, channel decoding and
//! link-quality tracking for an OpenLRS receiver. The transceiver is driven
//! through a register transport; a register-level simulation of the chip
//! and of a transmitter is included for running without hardware.

pub mod config;
pub mod error;
pub mod openlrs;
pub mod rfm22;
pub mod platform;
pub mod link;
pub mod storage;
pub mod driver;
pub mod sim;
