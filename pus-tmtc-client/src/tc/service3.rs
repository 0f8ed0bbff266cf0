//! Service 3: housekeeping.
use super::TcPacker;
use crate::config::{sids, TEST_POOL_IDS};
use pus_tmtc::ecss::PusError;

const HK_COLLECTION_INTERVAL: f32 = 3.0;
const DIAG_COLLECTION_INTERVAL: f32 = 0.8;

/// SID, collection interval, number of parameters and the pool IDs of the parameters.
pub fn pack_definition(sid: u32, collection_interval: f32, pool_ids: &[u32]) -> Vec<u8> {
    let mut definition = Vec::with_capacity(9 + pool_ids.len() * 4);
    definition.extend_from_slice(&sid.to_be_bytes());
    definition.extend_from_slice(&collection_interval.to_be_bytes());
    definition.push(pool_ids.len() as u8);
    for pool_id in pool_ids {
        definition.extend_from_slice(&pool_id.to_be_bytes());
    }
    definition
}

pub fn pack_service3_test_into(packer: &mut TcPacker) -> Result<(), PusError> {
    packer.print("Testing Service 3");
    pack_predefined_tests(packer)?;
    pack_custom_tests(packer)?;
    packer.export("tmtc_log_service3.txt");
    Ok(())
}

fn pack_predefined_tests(packer: &mut TcPacker) -> Result<(), PusError> {
    let sid_gps = sids::GPS0.to_be_bytes();
    let sid_test = sids::TEST.to_be_bytes();
    packer.print("Testing Service 3: Enable GPS definition");
    packer.tc(3, 5, 3000, &sid_gps)?;
    packer.print("Testing Service 3: Enable test definition");
    packer.tc(3, 5, 3010, &sid_test)?;
    // Receive at least two packets.
    packer.wait_secs(2);
    packer.print("Testing Service 3: Disable GPS definition");
    packer.tc(3, 6, 3020, &sid_gps)?;
    packer.print("Testing Service 3: Disable test definition");
    packer.tc(3, 6, 3030, &sid_test)?;
    packer.print("Testing Service 3: Reporting GPS definition");
    packer.tc(3, 9, 3040, &sid_gps)?;
    packer.print("Testing Service 3: Reporting test definition");
    packer.tc(3, 9, 3050, &sid_test)?;
    packer.print("Testing Service 3: Generate one gps 0 definition");
    packer.tc(3, 27, 3060, &sid_gps)?;
    packer.print("Testing Service 3: Generate test definition");
    packer.tc(3, 27, 3070, &sid_test)?;
    Ok(())
}

fn pack_custom_tests(packer: &mut TcPacker) -> Result<(), PusError> {
    let sid_test = sids::TEST.to_be_bytes();
    let sid_custom = sids::CUSTOM.to_be_bytes();
    let hk_definition = pack_definition(sids::TEST, HK_COLLECTION_INTERVAL, &TEST_POOL_IDS);
    let diag_definition = pack_definition(sids::CUSTOM, DIAG_COLLECTION_INTERVAL, &TEST_POOL_IDS);
    packer.print("Testing Service 3: Deleting pre-defined HK definition");
    packer.tc(3, 3, 3100, &sid_test)?;
    packer.print("Testing Service 3: Adding pre-defined HK definition");
    packer.tc(3, 1, 3110, &hk_definition)?;
    packer.print("Testing Service 3: Adding custom diagnostics definition");
    packer.tc(3, 2, 3120, &diag_definition)?;
    packer.print("Testing Service 3: Enable custom definition");
    packer.tc(3, 5, 3130, &hk_definition)?;
    packer.print("Testing Service 3: Enable custom diagnostics definition");
    packer.tc(3, 7, 3140, &diag_definition)?;
    packer.print("Testing Service 3: Disable custom diagnostics definition");
    packer.tc(3, 8, 3160, &sid_custom)?;
    packer.print("Testing Service 3: Disable custom definition");
    packer.tc(3, 6, 3150, &sid_test)?;
    packer.print("Testing Service 3: Reporting hk definition");
    packer.tc(3, 9, 3170, &sid_test)?;
    packer.print("Testing Service 3: Reporting diag definition");
    packer.tc(3, 11, 3180, &sid_custom)?;
    packer.print("Testing Service 3: Generate one custom hk definition");
    packer.tc(3, 27, 3190, &sid_test)?;
    packer.print("Testing Service 3: Generate one custom diagnostics definition");
    packer.tc(3, 28, 3200, &sid_custom)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pus_tmtc::services::{HkContent, Service3Tm};

    #[test]
    fn test_hk_definition_layout() {
        let definition = pack_definition(sids::TEST, HK_COLLECTION_INTERVAL, &TEST_POOL_IDS);
        assert_eq!(definition.len(), 4 + 4 + 1 + 20);
        assert_eq!(&definition[0..4], &[0x00, 0x00, 0x43, 0x00]);
        assert_eq!(&definition[4..8], &3.0_f32.to_be_bytes());
        assert_eq!(definition[8], 5);
        assert_eq!(&definition[25..29], &[0x05, 0x05, 0x05, 0x10]);
    }

    #[test]
    fn test_definition_matches_report_decoder() {
        // A definition report carries the reporting flag between SID and interval.
        let definition = pack_definition(sids::CUSTOM, DIAG_COLLECTION_INTERVAL, &TEST_POOL_IDS);
        let mut report = definition[0..4].to_vec();
        report.push(1);
        report.extend_from_slice(&definition[4..]);
        let decoded = Service3Tm::from_app_data(12, &report).unwrap();
        assert_eq!(decoded.sid, sids::CUSTOM);
        assert_eq!(
            decoded.content,
            HkContent::Definition {
                reporting_enabled: true,
                collection_interval: DIAG_COLLECTION_INTERVAL,
                pool_ids: TEST_POOL_IDS.to_vec(),
            }
        );
    }
}
