//! Service 5: event reporting.
use super::TcPacker;
use pus_tmtc::ecss::PusError;

pub fn pack_service5_test_into(packer: &mut TcPacker) -> Result<(), PusError> {
    packer.print("Testing Service 5");
    packer.print("Testing Service 5: Invalid subservice");
    packer.tc(5, 1, 500, &[])?;
    packer.print("Testing Service 5: Disable event");
    packer.tc(5, 6, 500, &[])?;
    packer.print("Testing Service 5: Trigger event");
    packer.tc(17, 128, 510, &[])?;
    packer.print("Testing Service 5: Enable event");
    packer.tc(5, 5, 520, &[])?;
    packer.print("Testing Service 5: Trigger another event");
    packer.tc(17, 128, 530, &[])?;
    packer.export("tmtc_log_service5.txt");
    Ok(())
}
