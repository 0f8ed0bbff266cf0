//! # pus-tmtc: PUS telecommand and telemetry handling for ground test clients
//!
//! This crate provides the packet handling and the send/receive coordination used by TMTC test
//! clients which talk to on-board software using the PUS A standard.
//!
//! ## Overview
//!
//! The core modules of this crate include
//!
//!  - The [tc] and [tm] modules which provide the binary encoding and decoding of PUS
//!    telecommands and telemetry, including the CRC16 checks of the [ecss] module.
//!  - The [com_if] module which specifies the transport abstraction.
//!  - The [listener] module with a background thread which polls the transport and buffers
//!    received telemetry.
//!  - The [sender] module with the sender/receiver family which drains a [queue::TcQueue],
//!    detects replies and resends telecommands on timeouts.
//!  - The [services] module which decodes the application data of known services into typed
//!    reports.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod clock;
pub mod com_if;
pub mod config;
pub mod ecss;
pub mod frame;
pub mod listener;
pub mod printer;
pub mod queue;
pub mod sender;
pub mod services;
pub mod sp;
pub mod tc;
#[cfg(any(test, feature = "test_util"))]
pub mod test_util;
pub mod time;
pub mod tm;

pub use crc;
