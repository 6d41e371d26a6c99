//! ht-local: Loopback engine for hitch
//!
//! Runs targets as processes on this machine, either on a pseudo-terminal
//! (raw byte stream) or with piped standard streams (multiplexed frames),
//! and exposes them through the same engine interface a remote daemon
//! client would.

pub mod engine;
mod piped;
mod pty;

pub use engine::{LaunchSpec, LocalEngine};
