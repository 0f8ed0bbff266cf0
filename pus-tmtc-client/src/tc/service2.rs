//! Service 2: device access, raw commanding of devices.
use super::service200::{pack_mode_data, MODE_OFF, MODE_RAW};
use super::TcPacker;
use crate::config::{dummy_commands, object_ids};
use pus_tmtc::ecss::PusError;

pub const WIRETAPPING_OFF: u8 = 0;
pub const WIRETAPPING_RAW: u8 = 1;

pub fn pack_wiretapping_mode(object_id: u32, wiretapping_mode: u8) -> Vec<u8> {
    let mut data = object_id.to_be_bytes().to_vec();
    data.push(wiretapping_mode);
    data
}

/// The device has to be in raw mode for raw commands, so the queue starts with a mode command.
/// If `called_externally` is set, the header print and the export are omitted.
pub fn pack_service2_test_into(
    packer: &mut TcPacker,
    called_externally: bool,
) -> Result<(), PusError> {
    if !called_externally {
        packer.print("Testing Service 2");
    }
    let object_id = object_ids::DUMMY_DEVICE;
    packer.print("Testing Service 2: Setting Raw Mode");
    packer.tc(200, 1, 2020, &pack_mode_data(object_id, MODE_RAW, 0))?;
    packer.print("Testing Service 2: Toggling Wiretapping Raw");
    packer.tc(2, 129, 200, &pack_wiretapping_mode(object_id, WIRETAPPING_RAW))?;
    // Wiretapping returns the command with TM[2,130] and the reply with TM[2,131]
    packer.print("Testing Service 2: Sending Raw Command");
    let mut raw_data = object_id.to_be_bytes().to_vec();
    raw_data.extend_from_slice(&dummy_commands::COMMAND_1.to_be_bytes());
    packer.tc(2, 128, 201, &raw_data)?;
    packer.print("Testing Service 2: Toggle Wiretapping Off");
    packer.tc(2, 129, 204, &pack_wiretapping_mode(object_id, WIRETAPPING_OFF))?;
    packer.print("Testing Service 2: Send second raw command");
    packer.tc(2, 128, 205, &raw_data)?;
    packer.print("Testing Service 2: Setting Off Mode");
    packer.tc(200, 1, 2020, &pack_mode_data(object_id, MODE_OFF, 0))?;
    if !called_externally {
        packer.export("tmtc_log_service2.txt");
    }
    Ok(())
}
