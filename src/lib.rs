//! Vehicle-bus lifecycle coordinator: mediates power state between an
//! automotive I/O controller and a hypervisor VM manager.

pub mod config;
pub mod coordinator;
pub mod device;
pub mod diag;
pub mod error;
pub mod fsm;
pub mod heartbeat;
pub mod ipc;
pub mod platform;
pub mod rtc;
pub mod signals;
pub mod sync;
pub mod wakeup;

pub use error::{Error, Result};
