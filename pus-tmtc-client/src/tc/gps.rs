//! Mode and housekeeping tests of the GPS devices.
use super::service200::{pack_mode_data, MODE_OFF, MODE_ON};
use super::TcPacker;
use crate::config::{object_ids, sids};
use pus_tmtc::ecss::PusError;

pub fn gps_name(object_id: u32) -> &'static str {
    match object_id {
        object_ids::GPS0 => "GPS0",
        object_ids::GPS1 => "GPS1",
        _ => "unknown",
    }
}

pub fn pack_gps_test_into(packer: &mut TcPacker, object_id: u32) -> Result<(), PusError> {
    let name = gps_name(object_id);
    let sid = match object_id {
        object_ids::GPS0 => Some((sids::GPS0, 13)),
        object_ids::GPS1 => Some((sids::GPS1, 14)),
        _ => None,
    };
    packer.print(format!("Testing {name} Device"));
    packer.print(format!("Testing {name}: Set Off"));
    packer.tc(200, 1, 11, &pack_mode_data(object_id, MODE_OFF, 0))?;
    packer.print(format!("Testing {name}: Set On"));
    packer.tc(200, 1, 12, &pack_mode_data(object_id, MODE_ON, 0))?;
    if let Some((sid, ssc)) = sid {
        packer.print(format!("Testing {name}: Enable HK Reporting"));
        packer.tc(3, 5, ssc, &sid.to_be_bytes())?;
    }
    // Wait until the device is on and a few GPS replies were received.
    packer.wait_secs(5);
    packer.print(format!("Testing Service 3: Disable {name} definition"));
    let sid_raw = sid.map(|(sid, _)| sid).unwrap_or_default().to_be_bytes();
    packer.tc(3, 6, 15, &sid_raw)?;
    packer.print(format!("Testing {name}: Set Off"));
    packer.tc(200, 1, 13, &pack_mode_data(object_id, MODE_OFF, 0))?;
    packer.export(&format!("tmtc_log_service_{name}.txt"));
    Ok(())
}
