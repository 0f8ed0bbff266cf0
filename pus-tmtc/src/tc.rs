//! PUS-A telecommand creation.
//!
//! # Examples
//!
//! ```
//! use pus_tmtc::tc::PusTcCreator;
//! use pus_tmtc::ecss::crc_residue_is_zero;
//!
//! let ping = PusTcCreator::new(0x73, 17, 1, 1700, &[]).unwrap();
//! let raw = ping.to_vec().unwrap();
//! assert_eq!(raw.len(), 12);
//! assert_eq!(&raw[0..4], &[0x18, 0x73, 0xC6, 0xA4]);
//! assert!(crc_residue_is_zero(&raw));
//! ```
use crate::ecss::{
    write_crc_to_packet, PusError, PusPacket, CRC_CCITT_FALSE, CRC_LEN, MAX_PACKET_DATA_FIELD_LEN,
    PUS_TC_SEC_HEADER_LEN, PUS_VERSION,
};
use crate::sp::{CcsdsPrimaryHeader, SpHeader, CCSDS_HEADER_LEN};
use delegate::delegate;

/// Information cached for every packed telecommand. It is handed to the communication
/// interface together with the raw packet and consulted by printers and the verification
/// matching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TcInfo {
    pub service: u8,
    pub subservice: u8,
    pub ssc: u16,
    pub packet_id: u16,
    pub data: Vec<u8>,
}

/// A raw telecommand together with its information record. This is what TC queues carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTc {
    pub raw: Vec<u8>,
    pub info: TcInfo,
}

/// Telecommand with a PUS-A secondary header consisting of version/ack byte, service,
/// subservice and source ID. The packet is immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PusTcCreator {
    sp_header: SpHeader,
    ack: u8,
    service: u8,
    subservice: u8,
    source_id: u8,
    app_data: Vec<u8>,
}

impl PusTcCreator {
    /// The sequence count is truncated to 14 bits. Acknowledgement flags default to 0.
    ///
    /// Returns [PusError::AppDataTooLarge] if the packet data field would exceed the 65536
    /// bytes the CCSDS length field can express.
    pub fn new(
        apid: u16,
        service: u8,
        subservice: u8,
        ssc: u16,
        app_data: &[u8],
    ) -> Result<Self, PusError> {
        if PUS_TC_SEC_HEADER_LEN + app_data.len() + CRC_LEN > MAX_PACKET_DATA_FIELD_LEN {
            return Err(PusError::AppDataTooLarge(app_data.len()));
        }
        Ok(Self::new_fitting(apid, service, subservice, ssc, app_data.to_vec()))
    }

    /// Zeroed telecommand which is sent as a best-effort disconnect notice when the client is
    /// interrupted.
    pub fn new_shutdown(apid: u16) -> Self {
        Self::new_fitting(apid, 0, 0, 0, Vec::new())
    }

    // The caller guarantees that the data field fits into the length field.
    fn new_fitting(apid: u16, service: u8, subservice: u8, ssc: u16, app_data: Vec<u8>) -> Self {
        let data_len = PUS_TC_SEC_HEADER_LEN + app_data.len() + CRC_LEN - 1;
        Self {
            sp_header: SpHeader::new_tc(apid, ssc, data_len as u16),
            ack: 0,
            service,
            subservice,
            source_id: 0,
            app_data,
        }
    }

    pub fn with_ack(mut self, ack: u8) -> Self {
        self.ack = ack & 0x0F;
        self
    }

    pub fn with_source_id(mut self, source_id: u8) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn sp_header(&self) -> &SpHeader {
        &self.sp_header
    }

    pub fn ack_flags(&self) -> u8 {
        self.ack
    }

    pub fn source_id(&self) -> u8 {
        self.source_id
    }

    pub fn app_data(&self) -> &[u8] {
        &self.app_data
    }

    pub fn len_packed(&self) -> usize {
        CCSDS_HEADER_LEN + PUS_TC_SEC_HEADER_LEN + self.app_data.len() + CRC_LEN
    }

    fn version_ack_byte(&self) -> u8 {
        ((PUS_VERSION as u8) << 4) | self.ack
    }

    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, PusError> {
        let total_len = self.len_packed();
        if buf.len() < total_len {
            return Err(PusError::TooShort {
                expected: total_len,
                found: buf.len(),
            });
        }
        self.sp_header.write_to_be_bytes(&mut buf[0..CCSDS_HEADER_LEN])?;
        let mut idx = CCSDS_HEADER_LEN;
        buf[idx] = self.version_ack_byte();
        buf[idx + 1] = self.service;
        buf[idx + 2] = self.subservice;
        buf[idx + 3] = self.source_id;
        idx += PUS_TC_SEC_HEADER_LEN;
        buf[idx..idx + self.app_data.len()].copy_from_slice(&self.app_data);
        write_crc_to_packet(&mut buf[0..total_len])?;
        Ok(total_len)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, PusError> {
        let mut vec = vec![0; self.len_packed()];
        self.write_to_bytes(&mut vec)?;
        Ok(vec)
    }

    pub fn info(&self) -> TcInfo {
        TcInfo {
            service: self.service,
            subservice: self.subservice,
            ssc: self.sp_header.ssc(),
            packet_id: self.sp_header.packet_id(),
            data: self.app_data.clone(),
        }
    }

    /// Serialize the telecommand and bundle it with its information record.
    pub fn pack(&self) -> Result<PackedTc, PusError> {
        Ok(PackedTc {
            raw: self.to_vec()?,
            info: self.info(),
        })
    }
}

impl CcsdsPrimaryHeader for PusTcCreator {
    delegate! {
        to self.sp_header {
            fn version(&self) -> u8;
            fn packet_id(&self) -> u16;
            fn psc(&self) -> u16;
            fn data_len(&self) -> u16;
        }
    }
}

impl PusPacket for PusTcCreator {
    fn pus_version(&self) -> u8 {
        PUS_VERSION as u8
    }

    fn service(&self) -> u8 {
        self.service
    }

    fn subservice(&self) -> u8 {
        self.subservice
    }

    fn user_data(&self) -> &[u8] {
        &self.app_data
    }

    fn crc16(&self) -> u16 {
        let mut digest = CRC_CCITT_FALSE.digest();
        digest.update(&self.packet_id().to_be_bytes());
        digest.update(&self.psc().to_be_bytes());
        digest.update(&self.data_len().to_be_bytes());
        digest.update(&[
            self.version_ack_byte(),
            self.service,
            self.subservice,
            self.source_id,
        ]);
        digest.update(&self.app_data);
        digest.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecss::crc_residue_is_zero;

    #[test]
    fn test_ping_tc_layout() {
        let ping = PusTcCreator::new(0, 17, 1, 1700, &[]).unwrap();
        let raw = ping.to_vec().unwrap();
        assert_eq!(raw.len(), 12);
        assert_eq!(
            &raw[0..10],
            &[0x18, 0x00, 0xC6, 0xA4, 0x00, 0x05, 0x10, 0x11, 0x01, 0x00]
        );
        assert!(crc_residue_is_zero(&raw));
        let crc = u16::from_be_bytes([raw[10], raw[11]]);
        assert_eq!(ping.crc16(), crc);
    }

    #[test]
    fn test_app_data_and_info() {
        let app_data = [0x44, 0x00, 0xAF, 0xFE, 0x00, 0x00, 0x00, 0x01, 0x00];
        let tc = PusTcCreator::new(0x73, 200, 1, 2000, &app_data).unwrap();
        let packed = tc.pack().unwrap();
        assert_eq!(packed.raw.len(), 6 + 4 + app_data.len() + 2);
        assert_eq!(&packed.raw[10..19], &app_data);
        assert_eq!(packed.info.service, 200);
        assert_eq!(packed.info.subservice, 1);
        assert_eq!(packed.info.ssc, 2000);
        assert_eq!(packed.info.packet_id, 0x1873);
        assert_eq!(packed.info.data, app_data.to_vec());
        assert_eq!(tc.data_len() as usize, 4 + app_data.len() + 2 - 1);
    }

    #[test]
    fn test_ack_and_source_id() {
        let tc = PusTcCreator::new(0x73, 17, 1, 0, &[])
            .unwrap()
            .with_ack(0b1001)
            .with_source_id(5);
        let raw = tc.to_vec().unwrap();
        assert_eq!(raw[6], 0x19);
        assert_eq!(raw[9], 5);
    }

    #[test]
    fn test_buf_too_small() {
        let tc = PusTcCreator::new(0x73, 17, 1, 0, &[1, 2, 3]).unwrap();
        let mut buf: [u8; 8] = [0; 8];
        assert_eq!(
            tc.write_to_bytes(&mut buf).unwrap_err(),
            PusError::TooShort {
                expected: 15,
                found: 8
            }
        );
    }

    #[test]
    fn test_shutdown_tc() {
        let tc = PusTcCreator::new_shutdown(0x73);
        let info = tc.info();
        assert_eq!(info.service, 0);
        assert_eq!(info.subservice, 0);
        assert_eq!(info.ssc, 0);
        assert!(crc_residue_is_zero(&tc.to_vec().unwrap()));
    }

    #[test]
    fn test_max_app_data() {
        let app_data = vec![0xA5; 65530];
        let tc = PusTcCreator::new(0x73, 8, 128, 5, &app_data).unwrap();
        assert_eq!(tc.data_len(), u16::MAX);
        let raw = tc.to_vec().unwrap();
        assert_eq!(raw.len(), 6 + 65536);
        assert_eq!(raw.len(), tc.packet_len());
        assert!(crc_residue_is_zero(&raw));
        assert_eq!(tc.crc16(), u16::from_be_bytes([raw[65540], raw[65541]]));
    }

    #[test]
    fn test_app_data_too_large() {
        let app_data = vec![0; 65531];
        assert_eq!(
            PusTcCreator::new(0x73, 8, 128, 5, &app_data).unwrap_err(),
            PusError::AppDataTooLarge(65531)
        );
    }

    #[test]
    fn test_crc_with_ack_and_source_id() {
        let tc = PusTcCreator::new(0x7FF, 3, 27, 0x3FFF, &[1, 2, 3, 4])
            .unwrap()
            .with_ack(0b1111)
            .with_source_id(0x42);
        let raw = tc.to_vec().unwrap();
        let crc_idx = raw.len() - 2;
        assert_eq!(tc.crc16(), u16::from_be_bytes([raw[crc_idx], raw[crc_idx + 1]]));
    }
}
