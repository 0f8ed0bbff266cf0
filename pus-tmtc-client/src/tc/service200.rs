//! Service 200: mode commanding.
use super::TcPacker;
use crate::config::object_ids;
use pus_tmtc::ecss::PusError;

pub const MODE_OFF: u32 = 0;
pub const MODE_ON: u32 = 1;
pub const MODE_NORMAL: u32 = 2;
pub const MODE_RAW: u32 = 3;

/// Object ID and mode as big endian u32 values, followed by the submode.
pub fn pack_mode_data(object_id: u32, mode: u32, submode: u8) -> Vec<u8> {
    let mut mode_data = Vec::with_capacity(9);
    mode_data.extend_from_slice(&object_id.to_be_bytes());
    mode_data.extend_from_slice(&mode.to_be_bytes());
    mode_data.push(submode);
    mode_data
}

pub fn pack_service200_test_into(packer: &mut TcPacker) -> Result<(), PusError> {
    packer.print("Testing Service 200");
    let object_id = object_ids::DUMMY_DEVICE;
    packer.print("Testing Service 200: Set Mode On");
    packer.tc(200, 1, 2000, &pack_mode_data(object_id, MODE_ON, 0))?;
    packer.print("Testing Service 200: Set Mode Normal");
    packer.tc(200, 1, 2010, &pack_mode_data(object_id, MODE_NORMAL, 0))?;
    packer.print("Testing Service 200: Set Mode Raw");
    packer.tc(200, 1, 2020, &pack_mode_data(object_id, MODE_RAW, 0))?;
    packer.print("Testing Service 200: Set Mode Off");
    packer.tc(200, 1, 2030, &pack_mode_data(object_id, MODE_OFF, 0))?;
    packer.export("tmtc_log_service200.txt");
    Ok(())
}
