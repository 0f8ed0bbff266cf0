//! TMTC client which tests on-board software with PUS telecommands.
//!
//! The client sends the telecommands of a test queue over a UDP, serial or dummy interface and
//! collects the telemetry replies with the listener and sender components of [pus_tmtc].
pub mod cli;
pub mod config;
pub mod handler;
pub mod interface;
pub mod logging;
pub mod report;
pub mod tc;
