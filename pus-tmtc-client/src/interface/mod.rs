//! Concrete communication interfaces.
use crate::config::{ComIfKind, ConfigError, InterfaceConfig};
use pus_tmtc::com_if::{shared_com_interface, SharedComInterface};
use std::io;

pub mod dummy;
pub mod serial;
pub mod udp;

pub use dummy::DummyComIf;
pub use serial::SerialComIf;
pub use udp::UdpComIf;

#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Create the communication interface selected by the configuration.
pub fn create_com_interface(
    cfg: &InterfaceConfig,
    apid: u16,
) -> Result<SharedComInterface, InterfaceError> {
    let com_if = match cfg.com_if {
        ComIfKind::Dummy => {
            log::info!("using dummy communication interface");
            shared_com_interface(DummyComIf::new(apid))
        }
        ComIfKind::Serial => {
            let port_name = cfg
                .serial_port
                .as_deref()
                .ok_or(ConfigError::MissingSerialPort)?;
            shared_com_interface(SerialComIf::open(port_name, cfg.baud_rate)?)
        }
        ComIfKind::Udp => {
            log::info!(
                "using UDP communication interface, receiving on {}, sending to {}",
                cfg.receive_addr,
                cfg.board_addr
            );
            shared_com_interface(UdpComIf::new(cfg.receive_addr, cfg.board_addr)?)
        }
    };
    Ok(com_if)
}
