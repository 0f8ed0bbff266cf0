//! CCSDS space packet primary header used by all PUS packets.
//!
//! The 6 byte header layout according to CCSDS 133.0-B-2:
//!
//! | Version (3) | Type (1) | Sec. Header Flag (1) | APID (11) | Seq. Flags (2) | SSC (14) | Length (16) |
use crate::ecss::PusError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const CCSDS_HEADER_LEN: usize = 6;
pub const MAX_APID: u16 = 0x7FF;
pub const MAX_SEQ_COUNT: u16 = 0x3FFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PacketType {
    Tm = 0,
    Tc = 1,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SequenceFlags {
    ContinuationSegment = 0b00,
    FirstSegment = 0b01,
    LastSegment = 0b10,
    Unsegmented = 0b11,
}

/// Generic trait to access fields of a CCSDS space packet header.
pub trait CcsdsPrimaryHeader {
    const SEQ_FLAG_MASK: u16 = 0xC000;

    fn version(&self) -> u8;
    /// Retrieve 13 bit Packet Identification field, consisting of type, secondary header flag
    /// and APID.
    fn packet_id(&self) -> u16;
    /// Retrieve Packet Sequence Control field.
    fn psc(&self) -> u16;
    /// Retrieve data length field. This is the number of octets of the packet data field
    /// minus one.
    fn data_len(&self) -> u16;

    #[inline]
    fn ptype(&self) -> PacketType {
        if (self.packet_id() >> 12) & 0b1 == 1 {
            PacketType::Tc
        } else {
            PacketType::Tm
        }
    }

    #[inline]
    fn is_tm(&self) -> bool {
        self.ptype() == PacketType::Tm
    }

    #[inline]
    fn is_tc(&self) -> bool {
        self.ptype() == PacketType::Tc
    }

    #[inline]
    fn sec_header_flag(&self) -> bool {
        (self.packet_id() >> 11) & 0x01 != 0
    }

    #[inline]
    fn apid(&self) -> u16 {
        self.packet_id() & MAX_APID
    }

    #[inline]
    fn ssc(&self) -> u16 {
        self.psc() & (!Self::SEQ_FLAG_MASK)
    }

    #[inline]
    fn sequence_flags(&self) -> SequenceFlags {
        match (self.psc() & Self::SEQ_FLAG_MASK) >> 14 {
            0b00 => SequenceFlags::ContinuationSegment,
            0b01 => SequenceFlags::FirstSegment,
            0b10 => SequenceFlags::LastSegment,
            _ => SequenceFlags::Unsegmented,
        }
    }

    /// Full packet length including the primary header.
    #[inline]
    fn packet_len(&self) -> usize {
        self.data_len() as usize + CCSDS_HEADER_LEN + 1
    }
}

/// Space packet primary header. The version is always 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpHeader {
    pub ptype: PacketType,
    pub sec_header_flag: bool,
    pub apid: u16,
    pub seq_flags: SequenceFlags,
    pub ssc: u16,
    pub data_len: u16,
}

impl Default for SpHeader {
    /// Zeroed header. This is also what a structurally broken packet decodes to.
    fn default() -> Self {
        SpHeader {
            ptype: PacketType::Tm,
            sec_header_flag: false,
            apid: 0,
            seq_flags: SequenceFlags::ContinuationSegment,
            ssc: 0,
            data_len: 0,
        }
    }
}

impl SpHeader {
    /// Create a stand-alone packet header. APID and sequence count are truncated to their
    /// field widths.
    pub fn new(
        ptype: PacketType,
        sec_header_flag: bool,
        apid: u16,
        ssc: u16,
        data_len: u16,
    ) -> Self {
        SpHeader {
            ptype,
            sec_header_flag,
            apid: apid & MAX_APID,
            seq_flags: SequenceFlags::Unsegmented,
            ssc: ssc & MAX_SEQ_COUNT,
            data_len,
        }
    }

    pub fn new_tc(apid: u16, ssc: u16, data_len: u16) -> Self {
        Self::new(PacketType::Tc, true, apid, ssc, data_len)
    }

    pub fn new_tm(apid: u16, ssc: u16, data_len: u16) -> Self {
        Self::new(PacketType::Tm, true, apid, ssc, data_len)
    }

    pub fn write_to_be_bytes(&self, buf: &mut [u8]) -> Result<(), PusError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(PusError::TooShort {
                expected: CCSDS_HEADER_LEN,
                found: buf.len(),
            });
        }
        buf[0..2].copy_from_slice(&self.packet_id().to_be_bytes());
        buf[2..4].copy_from_slice(&self.psc().to_be_bytes());
        buf[4..6].copy_from_slice(&self.data_len.to_be_bytes());
        Ok(())
    }

    pub fn from_be_bytes(buf: &[u8]) -> Result<Self, PusError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(PusError::TooShort {
                expected: CCSDS_HEADER_LEN,
                found: buf.len(),
            });
        }
        let packet_id = u16::from_be_bytes([buf[0], buf[1]]);
        let psc = u16::from_be_bytes([buf[2], buf[3]]);
        let ptype = if (packet_id >> 12) & 0b1 == 1 {
            PacketType::Tc
        } else {
            PacketType::Tm
        };
        // Two bit value, can not fail.
        let seq_flags = SequenceFlags::try_from((psc >> 14) as u8)
            .unwrap_or(SequenceFlags::Unsegmented);
        Ok(SpHeader {
            ptype,
            sec_header_flag: (packet_id >> 11) & 0b1 == 1,
            apid: packet_id & MAX_APID,
            seq_flags,
            ssc: psc & MAX_SEQ_COUNT,
            data_len: u16::from_be_bytes([buf[4], buf[5]]),
        })
    }
}

impl CcsdsPrimaryHeader for SpHeader {
    #[inline]
    fn version(&self) -> u8 {
        0
    }

    #[inline]
    fn packet_id(&self) -> u16 {
        ((self.ptype as u16) << 12) | ((self.sec_header_flag as u16) << 11) | self.apid
    }

    #[inline]
    fn psc(&self) -> u16 {
        ((self.seq_flags as u16) << 14) | self.ssc
    }

    #[inline]
    fn data_len(&self) -> u16 {
        self.data_len
    }
}

/// Read the full packet length from the length field of a raw packet. Returns [None] if the
/// buffer does not even hold a primary header.
pub fn packet_len_from_raw(raw: &[u8]) -> Option<usize> {
    if raw.len() < CCSDS_HEADER_LEN {
        return None;
    }
    Some(u16::from_be_bytes([raw[4], raw[5]]) as usize + CCSDS_HEADER_LEN + 1)
}

pub fn packet_id_from_raw(raw: &[u8]) -> Option<u16> {
    if raw.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([raw[0], raw[1]]))
}
