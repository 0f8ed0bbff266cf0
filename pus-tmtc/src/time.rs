//! CCSDS Day Segmented (CDS) short timestamps as used in PUS telemetry.
use chrono::{DateTime, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// CDS time code identifier in the P-field.
pub const CDS_ID: u8 = 4;
/// P-field with 16 bit day segment and no sub-millisecond segment.
pub const P_FIELD_CDS_SHORT: u8 = CDS_ID << 4;
pub const CDS_SHORT_LEN: usize = 7;
/// Days from the CCSDS epoch 1958-01-01 to the Unix epoch 1970-01-01.
pub const DAYS_CCSDS_TO_UNIX: i64 = 4383;
pub const SECONDS_PER_DAY: u64 = 86400;
pub const MS_PER_DAY: u64 = SECONDS_PER_DAY * 1000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("invalid P-field {0:#04x}, expected CDS short")]
    InvalidPField(u8),
    #[error("byte conversion error, expected {expected} bytes, found {found}")]
    ByteConversion { expected: usize, found: usize },
    #[error("time is before the CCSDS epoch or too far in the future")]
    DateOutOfRange,
}

/// CDS short timestamp: P-field, 16 bit days since the CCSDS epoch and 32 bit milliseconds
/// of the day, all big endian.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CdsShortTime {
    days: u16,
    ms_of_day: u32,
}

impl CdsShortTime {
    pub fn new(days: u16, ms_of_day: u32) -> Self {
        Self { days, ms_of_day }
    }

    pub fn from_now() -> Result<Self, TimestampError> {
        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimestampError::DateOutOfRange)?
            .as_millis();
        Self::from_unix_ms(unix_ms as u64)
    }

    pub fn from_unix_ms(unix_ms: u64) -> Result<Self, TimestampError> {
        let unix_days = (unix_ms / MS_PER_DAY) as i64;
        let days = u16::try_from(unix_days + DAYS_CCSDS_TO_UNIX)
            .map_err(|_| TimestampError::DateOutOfRange)?;
        Ok(Self {
            days,
            ms_of_day: (unix_ms % MS_PER_DAY) as u32,
        })
    }

    pub fn days(&self) -> u16 {
        self.days
    }

    pub fn ms_of_day(&self) -> u32 {
        self.ms_of_day
    }

    /// Milliseconds since the Unix epoch. Negative for times before 1970.
    pub fn unix_ms(&self) -> i64 {
        (self.days as i64 - DAYS_CCSDS_TO_UNIX) * MS_PER_DAY as i64 + self.ms_of_day as i64
    }

    pub fn to_date_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.unix_ms()).single()
    }

    pub fn to_bytes(&self) -> [u8; CDS_SHORT_LEN] {
        let mut raw = [0; CDS_SHORT_LEN];
        raw[0] = P_FIELD_CDS_SHORT;
        raw[1..3].copy_from_slice(&self.days.to_be_bytes());
        raw[3..7].copy_from_slice(&self.ms_of_day.to_be_bytes());
        raw
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, TimestampError> {
        if raw.len() < CDS_SHORT_LEN {
            return Err(TimestampError::ByteConversion {
                expected: CDS_SHORT_LEN,
                found: raw.len(),
            });
        }
        if raw[0] >> 4 != CDS_ID {
            return Err(TimestampError::InvalidPField(raw[0]));
        }
        Ok(Self {
            days: u16::from_be_bytes([raw[1], raw[2]]),
            ms_of_day: u32::from_be_bytes([raw[3], raw[4], raw[5], raw[6]]),
        })
    }

    /// Seconds since the Unix epoch with millisecond resolution.
    pub fn unix_seconds_f64(&self) -> f64 {
        self.unix_ms() as f64 / 1000.0
    }
}

impl core::fmt::Display for CdsShortTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.to_date_time() {
            Some(date_time) => write!(f, "{}", date_time.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "CDS(days: {}, ms: {})", self.days, self.ms_of_day),
        }
    }
}
