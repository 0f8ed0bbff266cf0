//! In-process loopback interface which answers a subset of telecommands without hardware.
use pus_tmtc::com_if::{ComIfError, CommunicationInterface, TmPacketList};
use pus_tmtc::ecss::PusError;
use pus_tmtc::services::{subservices, PusServiceId, Service1Tm};
use pus_tmtc::tc::TcInfo;
use pus_tmtc::tm::{PusTmCreator, PusTmReader};
use std::collections::VecDeque;
use std::time::Duration;

/// Answers test service and event service telecommands with acceptance and completion
/// success reports. Pings additionally get a ping reply.
pub struct DummyComIf {
    apid: u16,
    tm_ssc: u16,
    pending_tm: VecDeque<Vec<u8>>,
}

impl DummyComIf {
    pub fn new(apid: u16) -> Self {
        Self {
            apid,
            tm_ssc: 0,
            pending_tm: VecDeque::new(),
        }
    }

    fn next_ssc(&mut self) -> u16 {
        let ssc = self.tm_ssc;
        self.tm_ssc = (self.tm_ssc + 1) & 0x3FFF;
        ssc
    }

    fn generate_replies(&mut self, tc_info: &TcInfo) -> Result<(), PusError> {
        let service = PusServiceId::try_from(tc_info.service).ok();
        if !matches!(service, Some(PusServiceId::Test | PusServiceId::Event)) {
            log::debug!(
                "dummy interface: no replies for TC[{},{}]",
                tc_info.service,
                tc_info.subservice
            );
            return Ok(());
        }
        let ssc = self.next_ssc();
        let acceptance = Service1Tm::creator(
            self.apid,
            ssc,
            tc_info,
            subservices::TM_ACCEPTANCE_SUCCESS,
            None,
        );
        self.pending_tm.push_back(acceptance.to_vec()?);
        if service == Some(PusServiceId::Test) && tc_info.subservice == subservices::TC_PING {
            let ssc = self.next_ssc();
            let ping_reply = PusTmCreator::new(
                self.apid,
                PusServiceId::Test as u8,
                subservices::TM_PING_REPLY,
                ssc,
                Vec::new(),
            );
            self.pending_tm.push_back(ping_reply.to_vec()?);
        }
        let ssc = self.next_ssc();
        let completion = Service1Tm::creator(
            self.apid,
            ssc,
            tc_info,
            subservices::TM_COMPLETION_SUCCESS,
            None,
        );
        self.pending_tm.push_back(completion.to_vec()?);
        Ok(())
    }
}

impl CommunicationInterface for DummyComIf {
    fn send_telecommand(&mut self, _tc_raw: &[u8], tc_info: &TcInfo) -> Result<(), ComIfError> {
        self.generate_replies(tc_info)?;
        Ok(())
    }

    fn send_data(&mut self, _data: &[u8]) -> Result<(), ComIfError> {
        Ok(())
    }

    fn poll_interface(&mut self, _timeout: Duration) -> Result<(bool, TmPacketList), ComIfError> {
        let packets: TmPacketList = self
            .pending_tm
            .drain(..)
            .map(|raw| PusTmReader::decode_lenient(&raw))
            .collect();
        Ok((!packets.is_empty(), packets))
    }

    fn data_available(&mut self, _timeout: Duration) -> Result<bool, ComIfError> {
        Ok(!self.pending_tm.is_empty())
    }

    fn close(&mut self) -> Result<(), ComIfError> {
        Ok(())
    }
}
