//! Service 8: functional commanding with actions.
use super::service200::{pack_mode_data, MODE_NORMAL, MODE_OFF, MODE_ON};
use super::TcPacker;
use crate::config::{dummy_commands, object_ids};
use pus_tmtc::ecss::PusError;

/// Object ID and action ID followed by the action parameters.
pub fn pack_action(object_id: u32, action_id: u32, params: &[&[u8]]) -> Vec<u8> {
    let mut action = Vec::with_capacity(8);
    action.extend_from_slice(&object_id.to_be_bytes());
    action.extend_from_slice(&action_id.to_be_bytes());
    for param in params {
        action.extend_from_slice(param);
    }
    action
}

/// Actions are only executed in normal mode. If `called_externally` is set, the header print
/// and the export are omitted.
pub fn pack_service8_test_into(
    packer: &mut TcPacker,
    called_externally: bool,
) -> Result<(), PusError> {
    if !called_externally {
        packer.print("Testing Service 8");
    }
    let object_id = object_ids::DUMMY_DEVICE;
    packer.print("Testing Service 8: Set On Mode");
    packer.tc(200, 1, 800, &pack_mode_data(object_id, MODE_ON, 0))?;
    packer.print("Testing Service 8: Set Normal Mode");
    packer.tc(200, 1, 810, &pack_mode_data(object_id, MODE_NORMAL, 0))?;
    packer.print("Testing Service 8: Trigger Completion Reply");
    packer.tc(8, 128, 820, &pack_action(object_id, dummy_commands::COMMAND_1, &[]))?;
    packer.print("Testing Service 8: Trigger Data Reply");
    let action = pack_action(
        object_id,
        dummy_commands::COMMAND_2,
        &[
            &dummy_commands::COMMAND_2_PARAM_1[..],
            &dummy_commands::COMMAND_2_PARAM_2[..],
        ],
    );
    packer.tc(8, 128, 830, &action)?;
    packer.print("Testing Service 8: Trigger Step and Completion Reply");
    packer.tc(8, 128, 840, &pack_action(object_id, dummy_commands::COMMAND_3, &[]))?;
    packer.print("Testing Service 8: Set Off Mode");
    packer.tc(200, 1, 800, &pack_mode_data(object_id, MODE_OFF, 0))?;
    packer.wait_secs(2);
    if !called_externally {
        packer.export("tmtc_log_service8.txt");
    }
    Ok(())
}
