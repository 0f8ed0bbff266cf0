//! Service 20: parameter management.
use super::service200::{pack_mode_data, MODE_NORMAL};
use super::TcPacker;
use crate::config::object_ids;
use pus_tmtc::ecss::PusError;

pub const TC_LOAD_PARAMETER: u8 = 128;
pub const TC_DUMP_PARAMETER: u8 = 129;

pub fn pack_parameter_load(object_id: u32, parameter_id: u32, value: &[u8]) -> Vec<u8> {
    let mut data = pack_parameter_dump(object_id, parameter_id);
    data.extend_from_slice(value);
    data
}

pub fn pack_parameter_dump(object_id: u32, parameter_id: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(8);
    data.extend_from_slice(&object_id.to_be_bytes());
    data.extend_from_slice(&parameter_id.to_be_bytes());
    data
}

/// If `called_externally` is set, the header print and the export are omitted.
pub fn pack_service20_test_into(
    packer: &mut TcPacker,
    called_externally: bool,
) -> Result<(), PusError> {
    if !called_externally {
        packer.print("Testing Service 20");
    }
    let object_id = object_ids::DUMMY_DEVICE;
    packer.print("Testing Service 20: Set Normal Mode");
    packer.tc(200, 1, 2000, &pack_mode_data(object_id, MODE_NORMAL, 0))?;
    packer.print("Testing Service 20: Load uint32_t");
    let load = pack_parameter_load(object_id, 0, &42_u32.to_be_bytes());
    packer.tc(20, TC_LOAD_PARAMETER, 2001, &load)?;
    packer.print("Testing Service 20: Dump uint32_t");
    packer.tc(20, TC_DUMP_PARAMETER, 2001, &pack_parameter_dump(object_id, 0))?;
    if !called_externally {
        packer.export("tmtc_log_service20.txt");
    }
    Ok(())
}
