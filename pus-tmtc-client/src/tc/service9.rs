//! Service 9: time management.
use super::TcPacker;
use chrono::{DateTime, Utc};
use pus_tmtc::ecss::PusError;

const TIME_CODE_A: &str = "2019-08-30T20:50:33.892429Z";
const TIME_CODE_B: &str = "2019-270T05:50:33.002000Z";

/// Null terminated ASCII time code.
pub fn ascii_time_code(time_code: &str) -> Vec<u8> {
    let mut data = time_code.as_bytes().to_vec();
    data.push(0);
    data
}

pub fn iso_time_code(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub fn pack_service9_test_into(packer: &mut TcPacker) -> Result<(), PusError> {
    packer.print("Testing Service 9");
    let current_time = iso_time_code(&Utc::now());
    log::info!("Time Code 1: {TIME_CODE_A}");
    log::info!("Time Code 2: {TIME_CODE_B}");
    log::info!("Time Code 3: {current_time}");
    packer.print("Testing Service 9: Testing timecode A");
    packer.tc(9, 128, 900, &ascii_time_code(TIME_CODE_A))?;
    packer.print("Testing Service 9: Testing timecode B");
    packer.tc(9, 128, 910, &ascii_time_code(TIME_CODE_B))?;
    packer.print("Testing Service 9: Testing timecode Current Time");
    packer.tc(9, 128, 920, &ascii_time_code(&current_time))?;
    packer.export("tmtc_log_service9.txt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_codes() {
        let time = Utc.with_ymd_and_hms(2020, 5, 2, 12, 30, 15).unwrap();
        assert_eq!(iso_time_code(&time), "2020-05-02T12:30:15.000000Z");
        let data = ascii_time_code(TIME_CODE_B);
        assert_eq!(data.len(), TIME_CODE_B.len() + 1);
        assert_eq!(data.last(), Some(&0));
    }
}
