//! PUS-A telemetry decoding and creation.
//!
//! The decoder also accepts telecommands. The packet type bit decides whether a CDS short
//! timestamp follows the 4 byte data field header: telemetry carries one, telecommands do not.
use crate::ecss::{
    crc_residue_is_zero, write_crc_to_packet, PusError, PusPacket, CRC_LEN,
    MAX_PACKET_DATA_FIELD_LEN, PUS_TC_SEC_HEADER_LEN, PUS_TM_SEC_HEADER_LEN_NO_TIME, PUS_VERSION,
};
use crate::sp::{CcsdsPrimaryHeader, PacketType, SpHeader, CCSDS_HEADER_LEN};
use crate::time::{CdsShortTime, CDS_SHORT_LEN};
use delegate::delegate;

/// Decoded view of a received PUS packet. Invalid packets are kept and flagged, so callers
/// must check [PusTmReader::is_valid] explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PusTmReader {
    sp_header: SpHeader,
    pus_version: u8,
    spare: u8,
    service: u8,
    subservice: u8,
    subcounter: u8,
    timestamp: Option<CdsShortTime>,
    app_data: Vec<u8>,
    crc: u16,
    valid: bool,
    raw: Vec<u8>,
}

fn sec_header_len(ptype: PacketType) -> usize {
    match ptype {
        PacketType::Tm => PUS_TM_SEC_HEADER_LEN_NO_TIME + CDS_SHORT_LEN,
        PacketType::Tc => PUS_TC_SEC_HEADER_LEN,
    }
}

impl PusTmReader {
    /// Strict decoder. Fails with [PusError::TooShort] if the buffer is shorter than the
    /// length declared in the primary header or too short to hold the PUS headers and the CRC.
    /// A CRC mismatch does not fail the decoding, the packet is flagged as invalid instead.
    /// Only the declared packet span is consumed, trailing bytes are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self, PusError> {
        let sp_header = SpHeader::from_be_bytes(raw)?;
        let packet_len = sp_header.packet_len();
        if raw.len() < packet_len {
            return Err(PusError::TooShort {
                expected: packet_len,
                found: raw.len(),
            });
        }
        let packet = &raw[0..packet_len];
        let sec_header_len = sec_header_len(sp_header.ptype);
        let min_len = CCSDS_HEADER_LEN + sec_header_len + CRC_LEN;
        if packet_len < min_len {
            return Err(PusError::TooShort {
                expected: min_len,
                found: packet_len,
            });
        }
        let sec_header = &packet[CCSDS_HEADER_LEN..CCSDS_HEADER_LEN + sec_header_len];
        let timestamp = if sp_header.ptype == PacketType::Tm {
            match CdsShortTime::from_bytes(&sec_header[PUS_TM_SEC_HEADER_LEN_NO_TIME..]) {
                Ok(stamp) => Some(stamp),
                Err(e) => {
                    log::warn!("PUS packet timestamp invalid: {e}");
                    None
                }
            }
        } else {
            None
        };
        let crc_idx = packet_len - CRC_LEN;
        let valid = crc_residue_is_zero(packet);
        if !valid {
            log::warn!(
                "invalid CRC detected for PUS packet [{},{}] with SSC {}",
                sec_header[1],
                sec_header[2],
                sp_header.ssc()
            );
        }
        Ok(Self {
            sp_header,
            pus_version: (sec_header[0] >> 4) & 0b111,
            spare: sec_header[0] & 0x0F,
            service: sec_header[1],
            subservice: sec_header[2],
            subcounter: sec_header[3],
            timestamp,
            app_data: packet[CCSDS_HEADER_LEN + sec_header_len..crc_idx].to_vec(),
            crc: u16::from_be_bytes([packet[crc_idx], packet[crc_idx + 1]]),
            valid,
            raw: packet.to_vec(),
        })
    }

    /// Lenient decoder used by the communication interfaces. It never fails: structural
    /// errors are logged and yield a zeroed packet which is flagged as invalid. The raw
    /// buffer is retained for inspection.
    pub fn decode_lenient(raw: &[u8]) -> Self {
        match Self::decode(raw) {
            Ok(reader) => reader,
            Err(e) => {
                log::error!("decoding PUS packet failed: {e}");
                Self {
                    raw: raw.to_vec(),
                    ..Default::default()
                }
            }
        }
    }

    pub fn sp_header(&self) -> &SpHeader {
        &self.sp_header
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn subcounter(&self) -> u8 {
        self.subcounter
    }

    /// Lower nibble of the first secondary header byte. Acknowledgement flags for
    /// telecommands, spare for telemetry.
    pub fn ack_flags(&self) -> u8 {
        self.spare
    }

    pub fn timestamp(&self) -> Option<&CdsShortTime> {
        self.timestamp.as_ref()
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn packet_size(&self) -> usize {
        self.raw.len()
    }

    /// Column headers matching [Self::column_content].
    pub fn column_headers(&self) -> Vec<&'static str> {
        let mut headers = vec!["APID", "SSC", "Service", "Subservice", "Subcounter"];
        if self.timestamp.is_some() {
            headers.push("Time");
        }
        headers.extend(["Packet Size", "CRC", "Valid"]);
        headers
    }

    pub fn column_content(&self) -> Vec<String> {
        let mut content = vec![
            format!("{:#05x}", self.sp_header.apid),
            self.sp_header.ssc.to_string(),
            self.service.to_string(),
            self.subservice.to_string(),
            self.subcounter.to_string(),
        ];
        if let Some(stamp) = &self.timestamp {
            content.push(stamp.to_string());
        }
        content.push(self.packet_size().to_string());
        content.push(format!("{:#06x}", self.crc));
        content.push(if self.valid { "Yes" } else { "No" }.to_string());
        content
    }
}

impl CcsdsPrimaryHeader for PusTmReader {
    delegate! {
        to self.sp_header {
            fn version(&self) -> u8;
            fn packet_id(&self) -> u16;
            fn psc(&self) -> u16;
            fn data_len(&self) -> u16;
        }
    }
}

impl PusPacket for PusTmReader {
    fn pus_version(&self) -> u8 {
        self.pus_version
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
        self.crc
    }
}

/// Telemetry creator. Used by the loopback interfaces and by tests which need to emulate
/// replies of the remote software.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct PusTmCreator {
    apid: u16,
    service: u8,
    subservice: u8,
    ssc: u16,
    #[new(default)]
    subcounter: u8,
    #[new(default)]
    timestamp: CdsShortTime,
    app_data: Vec<u8>,
}

impl PusTmCreator {
    pub fn with_subcounter(mut self, subcounter: u8) -> Self {
        self.subcounter = subcounter;
        self
    }

    pub fn with_timestamp(mut self, timestamp: CdsShortTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn len_packed(&self) -> usize {
        CCSDS_HEADER_LEN + sec_header_len(PacketType::Tm) + self.app_data.len() + CRC_LEN
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, PusError> {
        let sec_header_len = sec_header_len(PacketType::Tm);
        let data_field_len = sec_header_len + self.app_data.len() + CRC_LEN;
        if data_field_len > MAX_PACKET_DATA_FIELD_LEN {
            return Err(PusError::AppDataTooLarge(self.app_data.len()));
        }
        let mut vec = vec![0; self.len_packed()];
        let sp_header = SpHeader::new_tm(self.apid, self.ssc, (data_field_len - 1) as u16);
        sp_header.write_to_be_bytes(&mut vec)?;
        let mut idx = CCSDS_HEADER_LEN;
        vec[idx] = (PUS_VERSION as u8) << 4;
        vec[idx + 1] = self.service;
        vec[idx + 2] = self.subservice;
        vec[idx + 3] = self.subcounter;
        idx += PUS_TM_SEC_HEADER_LEN_NO_TIME;
        vec[idx..idx + CDS_SHORT_LEN].copy_from_slice(&self.timestamp.to_bytes());
        idx += CDS_SHORT_LEN;
        vec[idx..idx + self.app_data.len()].copy_from_slice(&self.app_data);
        write_crc_to_packet(&mut vec)?;
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tc::PusTcCreator;

    fn ping_reply() -> Vec<u8> {
        PusTmCreator::new(0x73, 17, 2, 42, vec![])
            .with_subcounter(3)
            .with_timestamp(CdsShortTime::new(23000, 1000))
            .to_vec()
            .unwrap()
    }

    #[test]
    fn test_decode_tm() {
        let raw = ping_reply();
        assert_eq!(raw.len(), 6 + 11 + 2);
        let reader = PusTmReader::decode(&raw).unwrap();
        assert!(reader.is_valid());
        assert!(reader.is_tm());
        assert_eq!(reader.apid(), 0x73);
        assert_eq!(reader.ssc(), 42);
        assert_eq!(reader.service(), 17);
        assert_eq!(reader.subservice(), 2);
        assert_eq!(reader.subcounter(), 3);
        assert_eq!(reader.pus_version(), 1);
        assert_eq!(reader.timestamp(), Some(&CdsShortTime::new(23000, 1000)));
        assert!(reader.user_data().is_empty());
        assert_eq!(reader.packet_size(), raw.len());
    }

    #[test]
    fn test_decode_tc() {
        let raw = PusTcCreator::new(0x73, 8, 128, 820, &[1, 2, 3, 4])
            .unwrap()
            .to_vec()
            .unwrap();
        let reader = PusTmReader::decode(&raw).unwrap();
        assert!(reader.is_valid());
        assert!(reader.is_tc());
        assert!(reader.timestamp().is_none());
        assert_eq!(reader.user_data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut raw = ping_reply();
        let packet_len = raw.len();
        raw.extend_from_slice(&[0xAA; 8]);
        let reader = PusTmReader::decode(&raw).unwrap();
        assert!(reader.is_valid());
        assert_eq!(reader.packet_size(), packet_len);
    }

    #[test]
    fn test_too_short() {
        let raw = ping_reply();
        let error = PusTmReader::decode(&raw[0..raw.len() - 1]).unwrap_err();
        assert_eq!(
            error,
            PusError::TooShort {
                expected: raw.len(),
                found: raw.len() - 1
            }
        );
        let reader = PusTmReader::decode_lenient(&raw[0..4]);
        assert!(!reader.is_valid());
        assert_eq!(*reader.sp_header(), SpHeader::default());
        assert_eq!(reader.raw(), &raw[0..4]);
    }

    #[test]
    fn test_crc_mismatch_retained() {
        let mut raw = ping_reply();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let reader = PusTmReader::decode(&raw).unwrap();
        assert!(!reader.is_valid());
        assert_eq!(reader.service(), 17);
    }

    #[test]
    fn test_column_output() {
        let reader = PusTmReader::decode(&ping_reply()).unwrap();
        let headers = reader.column_headers();
        let content = reader.column_content();
        assert_eq!(headers.len(), content.len());
        assert_eq!(headers[2], "Service");
        assert_eq!(content[2], "17");
        assert_eq!(content.last().unwrap(), "Yes");
    }
}
