//! Packing of telecommand frames and parsing of fixed size telemetry frames.
//!
//! Serial links transfer fixed size frames. Several packets are packed back to back into one
//! frame and the unused tail of the frame is filled with zeros.
use crate::ecss::PusError;
use crate::sp::{packet_id_from_raw, packet_len_from_raw, CCSDS_HEADER_LEN};
use crate::tc::{PusTcCreator, TcInfo};
use crate::tm::PusTmReader;

/// Frame size of the serial link.
pub const SERIAL_FRAME_LEN: usize = 256;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TcFrame {
    pub raw: Vec<u8>,
    /// Number of telecommands packed into the frame.
    pub packed_commands: usize,
}

impl TcFrame {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Pack as many whole telecommands as fit into a frame of `max_frame_size`. Packing stops at the
/// first telecommand which does not fit anymore. With `fill` set, the frame is zero-padded up to
/// `max_frame_size`.
pub fn pack_tc_frame(
    tcs: &[PusTcCreator],
    max_frame_size: usize,
    fill: bool,
) -> Result<TcFrame, PusError> {
    let mut frame = TcFrame::default();
    for tc in tcs {
        if frame.raw.len() + tc.len_packed() > max_frame_size {
            log::warn!("next telecommand would be too large for TC frame, skipping");
            break;
        }
        frame.raw.extend(tc.to_vec()?);
        frame.packed_commands += 1;
    }
    if fill && frame.raw.len() < max_frame_size {
        frame.raw.resize(max_frame_size, 0);
    }
    Ok(frame)
}

pub fn pack_tc_info(tcs: &[PusTcCreator]) -> Vec<TcInfo> {
    tcs.iter().map(PusTcCreator::info).collect()
}

/// Parse the packets of a fixed size frame. Parsing stops at the fill bytes, which are detected
/// by a zero packet ID or a zero length field, or at a packet which exceeds the frame.
pub fn parse_fixed_frame(frame: &[u8]) -> Vec<PusTmReader> {
    let mut packets = Vec::new();
    let mut current_idx = 0;
    while current_idx + CCSDS_HEADER_LEN <= frame.len() {
        let remainder = &frame[current_idx..];
        let packet_id = packet_id_from_raw(remainder).unwrap_or_default();
        let length_field = u16::from_be_bytes([remainder[4], remainder[5]]);
        if packet_id == 0 || length_field == 0 {
            break;
        }
        let Some(packet_len) = packet_len_from_raw(remainder) else {
            break;
        };
        if packet_len > remainder.len() {
            log::error!(
                "PUS polling: packet of size {packet_len} exceeds remaining frame size {}, \
                packet splitting is not supported",
                remainder.len()
            );
            break;
        }
        packets.push(PusTmReader::decode_lenient(&remainder[..packet_len]));
        current_idx += packet_len;
    }
    packets
}
