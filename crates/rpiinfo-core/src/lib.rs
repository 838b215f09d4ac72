//! rpiinfo-core — Raspberry Pi hardware status for home-automation hosts.
//!
//! Provides:
//! - `collector` — reading uptime, temperature, clock and throttling state
//! - `flags` — decoding of the `get_throttled` bitmask
//! - `poll` — item binding, scheduler interface, poll cycle coordinator
//! - `config` — plugin settings
//! - `fmt` — shared formatting helpers (uptime, temperature)

pub mod collector;
pub mod config;
pub mod flags;
pub mod fmt;
pub mod poll;
