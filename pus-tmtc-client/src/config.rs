use num_enum::{IntoPrimitive, TryFromPrimitive};
use pus_tmtc::config::TmtcConfig;
use serde::Deserialize;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use strum::{EnumIter, IntoEnumIterator};

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_LOG_FILE: &str = "tmtc_client.log";
pub const LOG_DIR: &str = "log";

pub const CLIENT_RECEIVE_PORT: u16 = 2008;
pub const BOARD_SEND_PORT: u16 = 7;
pub const DEFAULT_BOARD_IP: Ipv4Addr = Ipv4Addr::LOCALHOST;
pub const DEFAULT_CLIENT_IP: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
pub const UDP_RECV_BUF_LEN: usize = 1024;

pub const SERIAL_BAUD_RATE: u32 = 230400;
pub const SERIAL_TIMEOUT: Duration = Duration::from_millis(500);
pub const SERIAL_FRAME_SIZE: usize = 256;
/// Serial links are slower, so a larger TM timeout is used if none was specified.
pub const SERIAL_TM_TIMEOUT: Duration = Duration::from_secs(6);

/// Period of the idle loop after the requested operation has finished.
pub const IDLE_PRINT_INTERVAL: Duration = Duration::from_secs(5);
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub mod object_ids {
    pub const DUMMY_DEVICE: u32 = 0x4400_AFFE;
    pub const GPS0: u32 = 0x4410_1F00;
    pub const GPS1: u32 = 0x4420_2000;
}

pub mod sids {
    pub const GPS0: u32 = 0x0000_1F00;
    pub const GPS1: u32 = 0x0000_2F00;
    pub const TEST: u32 = 0x0000_4300;
    pub const CUSTOM: u32 = 0x0000_4400;
}

/// Pool variables of the test data set.
pub const TEST_POOL_IDS: [u32; 5] = [
    0x0101_0102,
    0x0202_0204,
    0x0303_0306,
    0x0404_0408,
    0x0505_0510,
];

/// Action IDs of the dummy device.
pub mod dummy_commands {
    /// Triggers a completion reply.
    pub const COMMAND_1: u32 = 666;
    /// Triggers a data reply.
    pub const COMMAND_2: u32 = 0xC0C0_BABE;
    pub const COMMAND_2_PARAM_1: [u8; 2] = [0xBA, 0xB0];
    pub const COMMAND_2_PARAM_2: [u8; 8] = [0x00, 0x00, 0x00, 0x52, 0x4F, 0x42, 0x49, 0x4E];
    /// Triggers an additional step reply and a completion reply.
    pub const COMMAND_3: u32 = 0xBADE_AFFE;
}

/// Mode change events of the dummy device.
pub const DUMMY_MODE_EVENT_IDS: [u16; 2] = [7400, 7401];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid operation mode {0}")]
    InvalidMode(u8),
    #[error("invalid communication interface {0}")]
    InvalidComIf(String),
    #[error("invalid service {0}")]
    InvalidService(String),
    #[error("serial communication requires a serial port")]
    MissingSerialPort,
    #[error("invalid TM timeout {0} s")]
    InvalidTmTimeout(f64),
    #[error("invalid TC timeout factor {0}")]
    InvalidTcTimeoutFactor(f64),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive, EnumIter)]
#[repr(u8)]
pub enum OperationMode {
    /// Only listen for incoming telemetry.
    #[default]
    Listener = 1,
    /// Send one telecommand and wait for its replies.
    SingleCommand = 2,
    /// Send all telecommands of one service and wait for the replies of each one.
    ServiceTest = 3,
    /// Like the service test, but for all services.
    SoftwareTest = 4,
    /// Send service telecommands in bursts and verify the replies.
    UnitTest = 5,
}

impl OperationMode {
    pub fn description(&self) -> &'static str {
        match self {
            OperationMode::Listener => "Listener Mode",
            OperationMode::SingleCommand => "Single Command Mode",
            OperationMode::ServiceTest => "Service Test Mode",
            OperationMode::SoftwareTest => "Software Test Mode",
            OperationMode::UnitTest => "Unit Test Mode",
        }
    }

    /// One line per mode, used for the CLI help.
    pub fn list() -> String {
        OperationMode::iter()
            .map(|mode| format!("{}: {}", u8::from(mode), mode.description()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize, IntoPrimitive, TryFromPrimitive)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ComIfKind {
    Dummy = 0,
    Serial = 1,
    #[default]
    Udp = 2,
}

impl FromStr for ComIfKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<u8>() {
            return ComIfKind::try_from(id).map_err(|_| ConfigError::InvalidComIf(s.to_string()));
        }
        match s.to_lowercase().as_str() {
            "dummy" => Ok(ComIfKind::Dummy),
            "serial" => Ok(ComIfKind::Serial),
            "udp" | "ethernet" => Ok(ComIfKind::Udp),
            _ => Err(ConfigError::InvalidComIf(s.to_string())),
        }
    }
}

/// Telecommand set selected for the service and unit test modes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServiceSelection {
    Service(u8),
    Dummy,
    Gps0,
    Gps1,
    Error,
}

impl Default for ServiceSelection {
    fn default() -> Self {
        ServiceSelection::Service(17)
    }
}

impl FromStr for ServiceSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(service) = s.parse::<u8>() {
            return Ok(ServiceSelection::Service(service));
        }
        match s.to_lowercase().as_str() {
            "dummy" => Ok(ServiceSelection::Dummy),
            "gps0" => Ok(ServiceSelection::Gps0),
            "gps1" => Ok(ServiceSelection::Gps1),
            "error" => Ok(ServiceSelection::Error),
            _ => Err(ConfigError::InvalidService(s.to_string())),
        }
    }
}

impl core::fmt::Display for ServiceSelection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ServiceSelection::Service(service) => write!(f, "{service}"),
            ServiceSelection::Dummy => write!(f, "Dummy"),
            ServiceSelection::Gps0 => write!(f, "GPS0"),
            ServiceSelection::Gps1 => write!(f, "GPS1"),
            ServiceSelection::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct InterfaceSection {
    pub com_if: Option<ComIfKind>,
    pub serial_port: Option<String>,
    pub baud_rate: Option<u32>,
    pub board_ip: Option<IpAddr>,
    pub client_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct TmtcSection {
    pub apid: Option<u16>,
    pub tm_timeout_secs: Option<f64>,
    pub tc_timeout_factor: Option<f64>,
    pub resend_tc: Option<bool>,
    pub log_file: Option<PathBuf>,
}

/// Optional `config.toml` which supplies defaults for the command line arguments.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub interface: InterfaceSection,
    pub tmtc: TmtcSection,
}

impl ConfigFile {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// A missing file is not an error, the defaults are used in that case.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_toml_str(&fs::read_to_string(path)?)
    }
}

/// Transport settings after merging the CLI and the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub com_if: ComIfKind,
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub receive_addr: SocketAddr,
    pub board_addr: SocketAddr,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            com_if: ComIfKind::default(),
            serial_port: None,
            baud_rate: SERIAL_BAUD_RATE,
            receive_addr: SocketAddr::new(IpAddr::V4(DEFAULT_CLIENT_IP), CLIENT_RECEIVE_PORT),
            board_addr: SocketAddr::new(IpAddr::V4(DEFAULT_BOARD_IP), BOARD_SEND_PORT),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub mode: OperationMode,
    pub service: ServiceSelection,
    pub interface: InterfaceConfig,
    pub tmtc: TmtcConfig,
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::default(),
            service: ServiceSelection::default(),
            interface: InterfaceConfig::default(),
            tmtc: TmtcConfig::default(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}
