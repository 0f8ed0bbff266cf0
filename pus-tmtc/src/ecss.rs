//! Common definitions for PUS-A packets according to ECSS-E-70-41A.
use crate::sp::CcsdsPrimaryHeader;
use crc::{Crc, CRC_16_IBM_3740};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// CRC algorithm used by the PUS standard: CRC-16/CCITT-FALSE with polynomial 0x1021 and
/// initial value 0xFFFF.
pub const CRC_CCITT_FALSE: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);
pub const CRC_LEN: usize = 2;

/// Secondary header of a telecommand: version/ack byte, service, subservice, source ID.
pub const PUS_TC_SEC_HEADER_LEN: usize = 4;
/// Secondary header of telemetry without the timestamp: version byte, service, subservice,
/// subcounter.
pub const PUS_TM_SEC_HEADER_LEN_NO_TIME: usize = 4;
/// The packet data field is at most 65536 octets long because of the 16 bit length field.
pub const MAX_PACKET_DATA_FIELD_LEN: usize = u16::MAX as usize + 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PusVersion {
    EsaPus = 0,
    PusA = 1,
    PusC = 2,
}

pub const PUS_VERSION: PusVersion = PusVersion::PusA;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PusError {
    #[error("buffer too short, expected {expected} bytes, found {found}")]
    TooShort { expected: usize, found: usize },
    #[error("application data with length {0} does not fit into one packet")]
    AppDataTooLarge(usize),
    #[error("CRC check failed")]
    CrcMismatch,
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] crate::time::TimestampError),
}

/// Generic accessors for decoded or created PUS packets.
pub trait PusPacket: CcsdsPrimaryHeader {
    fn pus_version(&self) -> u8;
    fn service(&self) -> u8;
    fn subservice(&self) -> u8;
    fn user_data(&self) -> &[u8];
    fn crc16(&self) -> u16;
}

#[inline]
pub fn calc_pus_crc16(bytes: &[u8]) -> u16 {
    CRC_CCITT_FALSE.checksum(bytes)
}

/// A PUS packet including its trailing CRC is valid if the CRC over the whole packet yields
/// a zero residue.
#[inline]
pub fn crc_residue_is_zero(packet: &[u8]) -> bool {
    calc_pus_crc16(packet) == 0
}

/// Calculates the CRC over all bytes preceding the CRC field and writes it big endian into
/// the last two bytes of the given packet slice.
pub fn write_crc_to_packet(packet: &mut [u8]) -> Result<u16, PusError> {
    if packet.len() < CRC_LEN {
        return Err(PusError::TooShort {
            expected: CRC_LEN,
            found: packet.len(),
        });
    }
    let crc_idx = packet.len() - CRC_LEN;
    let crc = calc_pus_crc16(&packet[0..crc_idx]);
    packet[crc_idx..].copy_from_slice(&crc.to_be_bytes());
    Ok(crc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_check_value() {
        // Standard check value of CRC-16/CCITT-FALSE.
        assert_eq!(calc_pus_crc16(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_crc_residue() {
        let mut packet = [0x18, 0x73, 0xC0, 0x01, 0x00, 0x03, 0x10, 0x11, 0x00, 0x00];
        write_crc_to_packet(&mut packet).unwrap();
        assert!(crc_residue_is_zero(&packet));
        packet[3] ^= 0x01;
        assert!(!crc_residue_is_zero(&packet));
    }

    #[test]
    fn test_write_crc_short_buf() {
        let mut packet = [0x00];
        assert_eq!(
            write_crc_to_packet(&mut packet).unwrap_err(),
            PusError::TooShort {
                expected: 2,
                found: 1
            }
        );
    }
}
