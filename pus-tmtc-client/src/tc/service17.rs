//! Service 17: test service.
use super::TcPacker;
use pus_tmtc::ecss::PusError;

pub fn pack_service17_test_into(packer: &mut TcPacker) -> Result<(), PusError> {
    packer.print("Testing Service 17");
    packer.print("Testing Service 17: Ping Test");
    packer.tc(17, 1, 1700, &[])?;
    packer.print("Testing Service 17: Enable Event");
    packer.tc(5, 5, 52, &[])?;
    packer.print("Testing Service 17: Trigger event");
    packer.tc(17, 128, 1701, &[])?;
    packer.print("Testing Service 17: Invalid subservice");
    packer.tc(17, 243, 1702, &[])?;
    packer.export("tmtc_log_service17.txt");
    Ok(())
}
