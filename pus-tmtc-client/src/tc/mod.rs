//! Telecommand queues for the service tests of the on-board software.
//!
//! Every packer appends its entries in sending order. Most packers start with a print entry and
//! end with an export entry which writes the output of the service test to a separate log file.
use crate::config::{object_ids, ServiceSelection, LOG_DIR};
use pus_tmtc::ecss::PusError;
use pus_tmtc::queue::TcQueue;
use pus_tmtc::tc::{PackedTc, PusTcCreator};
use std::path::PathBuf;
use std::time::Duration;

pub mod gps;
pub mod service17;
pub mod service2;
pub mod service20;
pub mod service200;
pub mod service3;
pub mod service5;
pub mod service8;
pub mod service9;

pub use service200::pack_mode_data;

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("no telecommands defined for service {0}")]
    UnknownService(ServiceSelection),
    #[error("PUS error: {0}")]
    Pus(#[from] PusError),
}

/// Appends entries to a [TcQueue] for a fixed APID.
pub struct TcPacker<'queue> {
    queue: &'queue mut TcQueue,
    apid: u16,
}

impl<'queue> TcPacker<'queue> {
    pub fn new(queue: &'queue mut TcQueue, apid: u16) -> Self {
        Self { queue, apid }
    }

    pub fn apid(&self) -> u16 {
        self.apid
    }

    pub fn print(&mut self, text: impl Into<String>) {
        self.queue.push_print(text);
    }

    pub fn tc(
        &mut self,
        service: u8,
        subservice: u8,
        ssc: u16,
        app_data: &[u8],
    ) -> Result<(), PusError> {
        let tc = PusTcCreator::new(self.apid, service, subservice, ssc, app_data)?;
        self.queue.push_tc(&tc)
    }

    pub fn wait_secs(&mut self, secs: u64) {
        self.queue.push_wait(Duration::from_secs(secs));
    }

    /// Export the file buffer to a log file in the log directory.
    pub fn export(&mut self, file_name: &str) {
        self.queue.push_export(log_file_path(file_name));
    }
}

pub fn log_file_path(file_name: &str) -> PathBuf {
    PathBuf::from(LOG_DIR).join(file_name)
}

pub fn pack_service_queue(
    service: ServiceSelection,
    queue: &mut TcQueue,
    apid: u16,
) -> Result<(), PackError> {
    let mut packer = TcPacker::new(queue, apid);
    match service {
        ServiceSelection::Service(2) => service2::pack_service2_test_into(&mut packer, false)?,
        ServiceSelection::Service(3) => service3::pack_service3_test_into(&mut packer)?,
        ServiceSelection::Service(5) => service5::pack_service5_test_into(&mut packer)?,
        ServiceSelection::Service(8) => service8::pack_service8_test_into(&mut packer, false)?,
        ServiceSelection::Service(9) => service9::pack_service9_test_into(&mut packer)?,
        ServiceSelection::Service(17) => service17::pack_service17_test_into(&mut packer)?,
        ServiceSelection::Service(20) => service20::pack_service20_test_into(&mut packer, false)?,
        ServiceSelection::Service(200) => service200::pack_service200_test_into(&mut packer)?,
        ServiceSelection::Dummy => pack_dummy_device_test_into(&mut packer)?,
        ServiceSelection::Gps0 => gps::pack_gps_test_into(&mut packer, object_ids::GPS0)?,
        ServiceSelection::Gps1 => gps::pack_gps_test_into(&mut packer, object_ids::GPS1)?,
        ServiceSelection::Error => pack_error_testing_into(&mut packer)?,
        ServiceSelection::Service(_) => return Err(PackError::UnknownService(service)),
    }
    Ok(())
}

/// Queue of the software test, which runs the service tests one after another.
pub fn create_total_tc_queue(apid: u16) -> Result<TcQueue, PusError> {
    let mut queue = TcQueue::new();
    let mut packer = TcPacker::new(&mut queue, apid);
    service2::pack_service2_test_into(&mut packer, false)?;
    service3::pack_service3_test_into(&mut packer)?;
    service5::pack_service5_test_into(&mut packer)?;
    service8::pack_service8_test_into(&mut packer, false)?;
    service9::pack_service9_test_into(&mut packer)?;
    service17::pack_service17_test_into(&mut packer)?;
    service200::pack_service200_test_into(&mut packer)?;
    pack_dummy_device_test_into(&mut packer)?;
    gps::pack_gps_test_into(&mut packer, object_ids::GPS0)?;
    Ok(queue)
}

pub fn pack_dummy_device_test_into(packer: &mut TcPacker) -> Result<(), PusError> {
    packer.print("Testing Dummy Device");
    packer.print("Testing Service Dummy: Set On");
    let mode_data = pack_mode_data(object_ids::DUMMY_DEVICE, 1, 0);
    packer.tc(200, 1, 1, &mode_data)?;
    packer.print("Testing Service Dummy: Service 2");
    service2::pack_service2_test_into(packer, true)?;
    packer.print("Testing Service Dummy: Service 8");
    service8::pack_service8_test_into(packer, true)?;
    packer.export("tmtc_log_service_dummy.txt");
    Ok(())
}

pub fn pack_error_testing_into(packer: &mut TcPacker) -> Result<(), PusError> {
    // A lot of events
    packer.tc(17, 129, 2010, &[])?;
    // A lot of pings
    packer.tc(17, 130, 2020, &[])?;
    Ok(())
}

/// Telecommand of the single command mode.
pub fn command_preparation(apid: u16) -> Result<PackedTc, PusError> {
    PusTcCreator::new(apid, 17, 1, 1700, &[])?.pack()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pus_tmtc::queue::TcQueueEntry;

    fn tc_keys(queue: &TcQueue) -> Vec<(u8, u8, u16)> {
        queue
            .iter()
            .filter_map(|entry| match entry {
                TcQueueEntry::Telecommand(tc) => {
                    Some((tc.info.service, tc.info.subservice, tc.info.ssc))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_service17_queue_order() {
        let mut queue = TcQueue::new();
        pack_service_queue(ServiceSelection::Service(17), &mut queue, 0x73).unwrap();
        assert_eq!(
            tc_keys(&queue),
            vec![(17, 1, 1700), (5, 5, 52), (17, 128, 1701), (17, 243, 1702)]
        );
        assert_eq!(
            queue.iter().next(),
            Some(&TcQueueEntry::Print("Testing Service 17".to_string()))
        );
        assert_eq!(
            queue.iter().last(),
            Some(&TcQueueEntry::Export(log_file_path("tmtc_log_service17.txt")))
        );
    }

    #[test]
    fn test_all_selections_pack() {
        let selections = [2, 3, 5, 8, 9, 17, 20, 200]
            .into_iter()
            .map(ServiceSelection::Service)
            .chain([
                ServiceSelection::Dummy,
                ServiceSelection::Gps0,
                ServiceSelection::Gps1,
                ServiceSelection::Error,
            ]);
        for selection in selections {
            let mut queue = TcQueue::new();
            pack_service_queue(selection, &mut queue, 0x73).unwrap();
            assert!(queue.num_telecommands() > 0, "empty queue for {selection}");
        }
    }

    #[test]
    fn test_unknown_service() {
        let mut queue = TcQueue::new();
        assert!(matches!(
            pack_service_queue(ServiceSelection::Service(42), &mut queue, 0x73),
            Err(PackError::UnknownService(ServiceSelection::Service(42)))
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_total_queue() {
        let queue = create_total_tc_queue(0x73).unwrap();
        let keys = tc_keys(&queue);
        assert_eq!(keys.first(), Some(&(200, 1, 2020)));
        // The GPS test comes last and ends with a mode off command.
        assert_eq!(keys.last(), Some(&(200, 1, 13)));
        assert!(keys.contains(&(9, 128, 920)));
        assert!(!keys.iter().any(|(service, _, _)| *service == 20));
    }

    #[test]
    fn test_dummy_device_queue() {
        let mut queue = TcQueue::new();
        pack_service_queue(ServiceSelection::Dummy, &mut queue, 0x73).unwrap();
        let keys = tc_keys(&queue);
        assert_eq!(keys[0], (200, 1, 1));
        assert_eq!(keys.len(), 1 + 6 + 6);
        let exports = queue
            .iter()
            .filter(|entry| matches!(entry, TcQueueEntry::Export(_)))
            .count();
        assert_eq!(exports, 1);
    }

    #[test]
    fn test_command_preparation() {
        let tc = command_preparation(0x73).unwrap();
        assert_eq!((tc.info.service, tc.info.subservice, tc.info.ssc), (17, 1, 1700));
        assert_eq!(tc.raw.len(), 12);
    }
}
