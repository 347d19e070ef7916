//! # OpenLRS Protocol Module
//!
//! Implementation of the OpenLRSng receive link protocol.
//!
//! This module handles:
//! - Session (bind) parameters and their wire format
//! - Channel packet packing/unpacking (up to 16 channels, 10-bit resolution)
//! - Expected packet interval computation
//! - Frequency hop sequencing

pub mod protocol;
pub mod bind_data;
pub mod packet;
pub mod timing;
pub mod hop;
