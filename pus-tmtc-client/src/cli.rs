use crate::config::{
    ClientConfig, ComIfKind, ConfigError, ConfigFile, OperationMode, ServiceSelection,
    DEFAULT_CONFIG_FILE, SERIAL_TM_TIMEOUT,
};
use clap::Parser;
use pus_tmtc::printer::DisplayMode;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(about = "TMTC client to test on-board software with PUS telecommands")]
pub struct Cli {
    /// Operation mode. 1: Listener, 2: Single Command, 3: Service Test, 4: Software Test,
    /// 5: Unit Test.
    #[arg(short, long, default_value_t = 1)]
    pub mode: u8,

    /// Communication interface. 0 or dummy, 1 or serial, 2 or udp.
    #[arg(short, long)]
    pub com_if: Option<String>,

    /// Service to test: a service number or one of dummy, gps0, gps1, error.
    #[arg(short, long, default_value = "17")]
    pub service: String,

    /// TM timeout in seconds when listening to a verification sequence.
    #[arg(short, long)]
    pub tm_timeout: Option<f64>,

    /// Multiplied with the TM timeout. A telecommand is sent again after this period.
    #[arg(short = 'o', long)]
    pub tc_timeout_factor: Option<f64>,

    /// Send telecommands again after a reply timeout.
    #[arg(long = "rs")]
    pub resend_tc: bool,

    /// Short display mode.
    #[arg(short = 'd', long = "short")]
    pub short_display: bool,

    /// Print the raw data of all telemetry packets.
    #[arg(short, long = "raw")]
    pub raw_data_print: bool,

    /// Print housekeeping data.
    #[arg(long = "hk")]
    pub print_hk: bool,

    /// Suppress the console output of telemetry.
    #[arg(long = "np")]
    pub no_print: bool,

    /// Suppress the export of the output to log files.
    #[arg(long = "nl")]
    pub no_log: bool,

    /// Serial port name.
    #[arg(long)]
    pub com_port: Option<String>,

    /// Board IP address.
    #[arg(long)]
    pub board_ip: Option<IpAddr>,

    /// Client IP address to bind the receive socket to.
    #[arg(long)]
    pub client_ip: Option<IpAddr>,

    /// Path of the TOML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
}

impl Cli {
    /// Merge the arguments with the config file. Command line values take precedence.
    pub fn into_client_config(self, file: ConfigFile) -> Result<ClientConfig, ConfigError> {
        let mut cfg = ClientConfig::default();
        cfg.mode =
            OperationMode::try_from(self.mode).map_err(|_| ConfigError::InvalidMode(self.mode))?;
        cfg.service = self.service.parse()?;

        let iface = &mut cfg.interface;
        iface.com_if = match self.com_if.as_deref() {
            Some(com_if) => com_if.parse()?,
            None => file.interface.com_if.unwrap_or_default(),
        };
        iface.serial_port = self.com_port.or(file.interface.serial_port);
        if let Some(baud_rate) = file.interface.baud_rate {
            iface.baud_rate = baud_rate;
        }
        if let Some(client_ip) = self.client_ip.or(file.interface.client_ip) {
            iface.receive_addr = SocketAddr::new(client_ip, iface.receive_addr.port());
        }
        if let Some(board_ip) = self.board_ip.or(file.interface.board_ip) {
            iface.board_addr = SocketAddr::new(board_ip, iface.board_addr.port());
        }
        if iface.com_if == ComIfKind::Serial && iface.serial_port.is_none() {
            return Err(ConfigError::MissingSerialPort);
        }

        let tmtc = &mut cfg.tmtc;
        if let Some(apid) = file.tmtc.apid {
            tmtc.apid = apid;
        }
        match self.tm_timeout.or(file.tmtc.tm_timeout_secs) {
            Some(secs) => {
                tmtc.tm_timeout = Duration::try_from_secs_f64(secs)
                    .map_err(|_| ConfigError::InvalidTmTimeout(secs))?;
            }
            None if cfg.interface.com_if == ComIfKind::Serial => {
                tmtc.tm_timeout = SERIAL_TM_TIMEOUT;
            }
            None => (),
        }
        if let Some(factor) = self.tc_timeout_factor.or(file.tmtc.tc_timeout_factor) {
            tmtc.tc_timeout_factor = factor;
        }
        check_tc_timeout_factor(tmtc.tm_timeout, tmtc.tc_timeout_factor)?;
        tmtc.resend_tc = self.resend_tc || file.tmtc.resend_tc.unwrap_or(false);
        tmtc.display_mode = if self.short_display {
            DisplayMode::Short
        } else {
            DisplayMode::Long
        };
        tmtc.print_raw_tm = self.raw_data_print;
        tmtc.print_hk = self.print_hk;
        tmtc.print_tm = !self.no_print;
        tmtc.print_to_file = !self.no_log;
        if let Some(log_file) = file.tmtc.log_file {
            cfg.log_file = log_file;
        }
        Ok(cfg)
    }
}

/// The factor must be positive and give a representable TC timeout.
fn check_tc_timeout_factor(tm_timeout: Duration, factor: f64) -> Result<(), ConfigError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(ConfigError::InvalidTcTimeoutFactor(factor));
    }
    Duration::try_from_secs_f64(tm_timeout.as_secs_f64() * factor)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidTcTimeoutFactor(factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("pus-tmtc-client").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&[]).into_client_config(ConfigFile::default()).unwrap();
        assert_eq!(cfg.mode, OperationMode::Listener);
        assert_eq!(cfg.service, ServiceSelection::Service(17));
        assert_eq!(cfg.interface.com_if, ComIfKind::Udp);
        assert_eq!(cfg.interface.board_addr.port(), 7);
        assert_eq!(cfg.interface.receive_addr.port(), 2008);
        assert_eq!(cfg.tmtc.tm_timeout, Duration::from_secs(5));
        assert!(!cfg.tmtc.resend_tc);
        assert!(cfg.tmtc.print_to_file);
    }

    #[test]
    fn test_flags() {
        let cfg = parse(&[
            "-m", "3", "-s", "gps1", "-c", "0", "-t", "2.5", "-o", "2", "--rs", "-d", "--hk",
            "--nl", "--np",
        ])
        .into_client_config(ConfigFile::default())
        .unwrap();
        assert_eq!(cfg.mode, OperationMode::ServiceTest);
        assert_eq!(cfg.service, ServiceSelection::Gps1);
        assert_eq!(cfg.interface.com_if, ComIfKind::Dummy);
        assert_eq!(cfg.tmtc.tm_timeout, Duration::from_millis(2500));
        assert_eq!(cfg.tmtc.tc_timeout(), Duration::from_secs(5));
        assert!(cfg.tmtc.resend_tc);
        assert_eq!(cfg.tmtc.display_mode, DisplayMode::Short);
        assert!(cfg.tmtc.print_hk);
        assert!(!cfg.tmtc.print_to_file);
        assert!(!cfg.tmtc.print_tm);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let file = ConfigFile::from_toml_str(
            r#"
            [interface]
            com_if = "serial"
            serial_port = "/dev/ttyACM0"
            board_ip = "192.168.1.10"

            [tmtc]
            tc_timeout_factor = 2.0
            "#,
        )
        .unwrap();
        let cfg = parse(&["--com-port", "/dev/ttyUSB1"])
            .into_client_config(file)
            .unwrap();
        assert_eq!(cfg.interface.com_if, ComIfKind::Serial);
        assert_eq!(cfg.interface.serial_port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(cfg.interface.board_addr.to_string(), "192.168.1.10:7");
        assert_eq!(cfg.tmtc.tc_timeout_factor, 2.0);
        assert_eq!(cfg.tmtc.tm_timeout, SERIAL_TM_TIMEOUT);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            parse(&["-m", "6"]).into_client_config(ConfigFile::default()),
            Err(ConfigError::InvalidMode(6))
        ));
        assert!(matches!(
            parse(&["-c", "serial"]).into_client_config(ConfigFile::default()),
            Err(ConfigError::MissingSerialPort)
        ));
        assert!(matches!(
            parse(&["-s", "foo"]).into_client_config(ConfigFile::default()),
            Err(ConfigError::InvalidService(_))
        ));
    }

    #[test]
    fn test_invalid_tm_timeout() {
        for args in [&["-t", "1e300"][..], &["-t", "inf"], &["-t", "NaN"], &["-t=-1"]] {
            assert!(
                matches!(
                    parse(args).into_client_config(ConfigFile::default()),
                    Err(ConfigError::InvalidTmTimeout(_))
                ),
                "accepted {args:?}"
            );
        }
    }

    #[test]
    fn test_invalid_tc_timeout_factor() {
        for args in [&["-o=-1"][..], &["-o", "0"], &["-o", "inf"], &["-o", "NaN"]] {
            assert!(
                matches!(
                    parse(args).into_client_config(ConfigFile::default()),
                    Err(ConfigError::InvalidTcTimeoutFactor(_))
                ),
                "accepted {args:?}"
            );
        }
        // A valid factor whose product with the TM timeout overflows.
        assert!(matches!(
            parse(&["-t", "1e18", "-o", "1e6"]).into_client_config(ConfigFile::default()),
            Err(ConfigError::InvalidTcTimeoutFactor(_))
        ));
        let file = ConfigFile::from_toml_str(
            r#"
            [tmtc]
            tc_timeout_factor = -3.5
            "#,
        )
        .unwrap();
        assert!(matches!(
            parse(&[]).into_client_config(file),
            Err(ConfigError::InvalidTcTimeoutFactor(_))
        ));
    }

    #[test]
    fn test_zero_tm_timeout_accepted() {
        let cfg = parse(&["-t", "0"])
            .into_client_config(ConfigFile::default())
            .unwrap();
        assert_eq!(cfg.tmtc.tm_timeout, Duration::ZERO);
        assert_eq!(cfg.tmtc.tc_timeout(), Duration::ZERO);
    }
}
