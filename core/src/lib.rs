//! Hardware-independent wake-cycle logic for the fridge sensor node.
//!
//! The firmware crate supplies implementations of the ports in [`traits`]
//! (ADC battery monitor, one-wire temperature probe, Wi-Fi radio, MQTT
//! broker client) and hands them to [`cycle::run_cycle`], which executes
//! one measure-connect-publish pass and reports how the device should
//! power down. Nothing in this crate touches hardware, so the whole cycle
//! runs under the host test harness with mock ports.

#![cfg_attr(not(test), no_std)]

pub mod cycle;
pub mod message;
pub mod model;
pub mod traits;
