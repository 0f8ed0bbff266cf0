use crate::printer::DisplayMode;
use std::time::Duration;

/// Upper bound for a single listener mode operation.
pub const MODE_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);
/// Number of retransmissions after which the sender stops waiting for a reply.
pub const MAX_RESEND_COUNT: u32 = 5;
/// Bounded wait when acquiring the shared TM queue or the shared communication interface.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);
/// Throttle interval of the sender timeout checks.
pub const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_millis(500);
/// Polling period while a telemetry sequence is collected.
pub const SEQUENCE_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Polling period while waiting for the first packet of a telemetry sequence.
pub const FIRST_DATA_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Maximum time a single poll of the communication interface may block.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(20);
/// Idle period of the listener loop if nothing was received.
pub const LISTENER_IDLE_INTERVAL: Duration = Duration::from_millis(20);
/// Period in which an inactive listener checks for requests.
pub const LISTENER_INACTIVE_INTERVAL: Duration = Duration::from_secs(1);
/// Delay granted to the listener after a mode change request.
pub const LISTENER_MODE_CHANGE_DELAY: Duration = Duration::from_millis(100);
/// Divisor applied to the TM timeout for the final reply window of burst sending.
pub const BURST_TRAILING_WAIT_DIVISOR: f64 = 1.4;

pub const DEFAULT_APID: u16 = 0x73;
pub const DEFAULT_TM_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TC_TIMEOUT_FACTOR: f64 = 3.5;

/// Settings shared by the listener, the sender/receiver family and the printer. It is built
/// once by the application and handed to the component constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct TmtcConfig {
    pub apid: u16,
    /// Collection window for one telemetry sequence.
    pub tm_timeout: Duration,
    /// Multiplied with the TM timeout to get the TC resend timeout.
    pub tc_timeout_factor: f64,
    pub resend_tc: bool,
    pub mode_operation_timeout: Duration,
    pub display_mode: DisplayMode,
    pub print_tc: bool,
    pub print_tm: bool,
    pub print_raw_tm: bool,
    pub print_hk: bool,
    pub print_to_file: bool,
}

impl Default for TmtcConfig {
    fn default() -> Self {
        Self {
            apid: DEFAULT_APID,
            tm_timeout: DEFAULT_TM_TIMEOUT,
            tc_timeout_factor: DEFAULT_TC_TIMEOUT_FACTOR,
            resend_tc: false,
            mode_operation_timeout: MODE_OPERATION_TIMEOUT,
            display_mode: DisplayMode::Long,
            print_tc: true,
            print_tm: true,
            print_raw_tm: false,
            print_hk: false,
            print_to_file: true,
        }
    }
}

impl TmtcConfig {
    /// Time after which a telecommand is sent again or considered unanswered.
    pub fn tc_timeout(&self) -> Duration {
        scaled_tc_timeout(self.tm_timeout, self.tc_timeout_factor)
    }
}

/// TM timeout multiplied with the TC timeout factor. Saturates at [Duration::MAX] and
/// yields zero for negative or NaN products.
pub fn scaled_tc_timeout(tm_timeout: Duration, factor: f64) -> Duration {
    let secs = tm_timeout.as_secs_f64() * factor;
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tc_timeout() {
        let cfg = TmtcConfig::default();
        assert_eq!(cfg.tc_timeout(), Duration::from_millis(17500));
    }

    #[test]
    fn test_tc_timeout_out_of_range_factor() {
        let tm_timeout = Duration::from_secs(5);
        assert_eq!(scaled_tc_timeout(tm_timeout, -1.0), Duration::ZERO);
        assert_eq!(scaled_tc_timeout(tm_timeout, f64::NAN), Duration::ZERO);
        assert_eq!(scaled_tc_timeout(tm_timeout, f64::INFINITY), Duration::MAX);
        assert_eq!(scaled_tc_timeout(Duration::MAX, 3.5), Duration::MAX);
        assert_eq!(scaled_tc_timeout(Duration::ZERO, f64::INFINITY), Duration::ZERO);
        let cfg = TmtcConfig {
            tc_timeout_factor: 1e300,
            ..Default::default()
        };
        assert_eq!(cfg.tc_timeout(), Duration::MAX);
    }
}
