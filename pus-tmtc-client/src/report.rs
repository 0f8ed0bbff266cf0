//! Automated service tests of the unit test mode.
//!
//! Each service test sends its queue in bursts, collects all telemetry and compares the
//! verification reports and service specific replies against fixed expectations.
use crate::config::{object_ids, DUMMY_MODE_EVENT_IDS};
use crate::tc::{service17, service2, service200, service5, service8, TcPacker};
use pus_tmtc::ecss::{PusError, PusPacket};
use pus_tmtc::listener::TmPacketQueue;
use pus_tmtc::queue::TcQueue;
use pus_tmtc::sender::WaitTime;
use pus_tmtc::services::{ServiceTm, VerificationReport};
use pus_tmtc::tc::TcInfo;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Services which have an automated test.
pub const UNIT_TEST_SERVICES: [u8; 5] = [2, 5, 8, 17, 200];

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedCounts {
    pub events: usize,
    pub misc: usize,
    pub failures: usize,
    /// Telecommands which are not expected to complete.
    pub missing_completion: usize,
    pub steps: usize,
    pub data_replies: usize,
}

/// How events and miscellaneous replies are counted for a service test.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TmScan {
    /// Every event counts. Service 17 replies count as miscellaneous replies.
    EventsAndPings,
    /// Only mode events of the dummy device count. Mode reached reports and wiretapping
    /// replies count as miscellaneous replies.
    DummyDeviceModes,
}

#[derive(Debug)]
pub struct ServiceTest {
    pub service: u8,
    pub tc_queue: TcQueue,
    pub wait_intervals: Vec<usize>,
    pub wait_time: WaitTime,
    pub expected: ExpectedCounts,
    pub scan: TmScan,
}

fn secs(wait_times: &[f64]) -> WaitTime {
    WaitTime::PerInterval(
        wait_times
            .iter()
            .map(|secs| Duration::from_secs_f64(*secs))
            .collect(),
    )
}

impl ServiceTest {
    /// Returns [None] for services without an automated test.
    pub fn new(service: u8, apid: u16) -> Result<Option<Self>, PusError> {
        let mut tc_queue = TcQueue::new();
        let mut packer = TcPacker::new(&mut tc_queue, apid);
        let (wait_intervals, wait_time, expected, scan) = match service {
            2 => {
                service2::pack_service2_test_into(&mut packer, false)?;
                (
                    vec![1, 2, 3, 4, 5],
                    WaitTime::Uniform(Duration::from_secs(2)),
                    ExpectedCounts {
                        events: 3,
                        misc: 5,
                        ..Default::default()
                    },
                    TmScan::DummyDeviceModes,
                )
            }
            5 => {
                service5::pack_service5_test_into(&mut packer)?;
                (
                    vec![1, 2, 3, 4],
                    secs(&[2.0, 2.0, 2.0, 1.5]),
                    ExpectedCounts {
                        events: 1,
                        misc: 2,
                        failures: 1,
                        missing_completion: 1,
                        ..Default::default()
                    },
                    TmScan::EventsAndPings,
                )
            }
            8 => {
                service8::pack_service8_test_into(&mut packer, false)?;
                (
                    vec![1, 2, 3, 4, 5],
                    secs(&[1.5, 1.5, 2.2, 2.2, 2.0]),
                    // Three mode changes with two events each. The data reply generates an
                    // additional step.
                    ExpectedCounts {
                        events: 6,
                        misc: 3,
                        steps: 1,
                        data_replies: 1,
                        ..Default::default()
                    },
                    TmScan::DummyDeviceModes,
                )
            }
            17 => {
                service17::pack_service17_test_into(&mut packer)?;
                (
                    vec![1, 2, 3, 4],
                    WaitTime::Uniform(Duration::from_secs(1)),
                    ExpectedCounts {
                        events: 1,
                        misc: 2,
                        failures: 1,
                        missing_completion: 1,
                        ..Default::default()
                    },
                    TmScan::EventsAndPings,
                )
            }
            200 => {
                service200::pack_service200_test_into(&mut packer)?;
                (
                    vec![1, 2, 3],
                    WaitTime::Uniform(Duration::from_secs(2)),
                    ExpectedCounts {
                        events: 8,
                        misc: 4,
                        ..Default::default()
                    },
                    TmScan::DummyDeviceModes,
                )
            }
            _ => return Ok(None),
        };
        Ok(Some(Self {
            service,
            tc_queue,
            wait_intervals,
            wait_time,
            expected,
            scan,
        }))
    }
}

/// Counters gathered from the telemetry of one service test.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VerificationCounts {
    pub tcs: usize,
    pub acceptance: usize,
    pub start: usize,
    pub steps: usize,
    pub completion: usize,
    pub failures: usize,
    pub events: usize,
    pub misc: usize,
    pub data_replies: usize,
    /// Verification reports which do not belong to a sent telecommand.
    pub unmatched: usize,
    pub invalid_packets: usize,
}

impl VerificationCounts {
    pub fn analyse(tc_infos: &[TcInfo], tm_queue: &TmPacketQueue, scan: TmScan) -> Self {
        let mut counts = Self {
            tcs: tc_infos.len(),
            ..Default::default()
        };
        for tm in tm_queue.iter().flatten() {
            if !tm.is_valid() {
                counts.invalid_packets += 1;
                continue;
            }
            let service_tm = ServiceTm::from_packet(tm);
            match &service_tm {
                ServiceTm::Verification(report) => {
                    let matched = tc_infos.iter().any(|info| {
                        info.ssc == report.tc_ssc && info.packet_id == report.tc_packet_id
                    });
                    if !matched {
                        log::warn!(
                            "verification report for unknown TC with SSC {}",
                            report.tc_ssc
                        );
                        counts.unmatched += 1;
                        continue;
                    }
                    match report.report {
                        VerificationReport::AcceptanceSuccess => counts.acceptance += 1,
                        VerificationReport::StartSuccess => counts.start += 1,
                        VerificationReport::StepSuccess { .. } => counts.steps += 1,
                        VerificationReport::CompletionSuccess => counts.completion += 1,
                        _ => counts.failures += 1,
                    }
                }
                ServiceTm::Event(event) => match scan {
                    TmScan::EventsAndPings => counts.events += 1,
                    TmScan::DummyDeviceModes => {
                        if event.reporter_id == object_ids::DUMMY_DEVICE
                            && DUMMY_MODE_EVENT_IDS.contains(&event.event_id)
                        {
                            counts.events += 1;
                        }
                    }
                },
                _ => (),
            }
            match (scan, tm.service(), tm.subservice()) {
                (TmScan::EventsAndPings, 17, _) => counts.misc += 1,
                (TmScan::DummyDeviceModes, 200, 6) | (TmScan::DummyDeviceModes, 2, 130 | 131) => {
                    counts.misc += 1
                }
                (_, 8, 130) => counts.data_replies += 1,
                _ => (),
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTestReport {
    pub service: u8,
    pub counts: VerificationCounts,
    pub expected: ExpectedCounts,
}

impl ServiceTestReport {
    pub fn new(test: &ServiceTest, tc_infos: &[TcInfo], tm_queue: &TmPacketQueue) -> Self {
        Self {
            service: test.service,
            counts: VerificationCounts::analyse(tc_infos, tm_queue, test.scan),
            expected: test.expected,
        }
    }

    /// Descriptions of all deviations from the expected counts.
    pub fn mismatches(&self) -> Vec<String> {
        let counts = &self.counts;
        let expected = &self.expected;
        let tcs = counts.tcs;
        let checks = [
            (
                "completion reports",
                counts.completion,
                tcs.saturating_sub(expected.missing_completion),
            ),
            (
                "acceptance reports",
                counts.acceptance,
                tcs.saturating_sub(expected.failures),
            ),
            ("failure reports", counts.failures, expected.failures),
            ("step reports", counts.steps, expected.steps),
            ("events", counts.events, expected.events),
            ("miscellaneous replies", counts.misc, expected.misc),
            ("data replies", counts.data_replies, expected.data_replies),
            ("unmatched verification reports", counts.unmatched, 0),
            ("invalid packets", counts.invalid_packets, 0),
        ];
        checks
            .iter()
            .filter(|(_, actual, expected)| actual != expected)
            .map(|(name, actual, expected)| format!("{name}: expected {expected}, got {actual}"))
            .collect()
    }

    pub fn is_ok(&self) -> bool {
        self.mismatches().is_empty()
    }
}

impl Display for ServiceTestReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts = &self.counts;
        write!(
            f,
            "Service {} test {}: {} TCs, {} accepted, {} started, {} steps, {} completed, \
            {} failures, {} events, {} misc, {} data replies",
            self.service,
            if self.is_ok() { "OK" } else { "FAILED" },
            counts.tcs,
            counts.acceptance,
            counts.start,
            counts.steps,
            counts.completion,
            counts.failures,
            counts.events,
            counts.misc,
            counts.data_replies
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pus_tmtc::queue::TcQueueEntry;
    use pus_tmtc::services::subservices::*;
    use pus_tmtc::services::{FailureData, Service1Tm, Service5Tm, Severity};
    use pus_tmtc::tm::{PusTmCreator, PusTmReader};

    const APID: u16 = 0x73;

    fn sent_tcs(test: &ServiceTest) -> Vec<TcInfo> {
        test.tc_queue
            .iter()
            .filter_map(|entry| match entry {
                TcQueueEntry::Telecommand(tc) => Some(tc.info.clone()),
                _ => None,
            })
            .collect()
    }

    fn reader(creator: PusTmCreator) -> PusTmReader {
        PusTmReader::decode(&creator.to_vec().unwrap()).unwrap()
    }

    fn verification(info: &TcInfo, subservice: u8) -> PusTmReader {
        let failure = if subservice % 2 == 0 {
            Some(FailureData {
                error_code: 0x1234,
                param1: 0,
                param2: 0,
            })
        } else {
            None
        };
        reader(Service1Tm::creator(APID, 0, info, subservice, failure))
    }

    fn event(reporter_id: u32, event_id: u16) -> PusTmReader {
        let event = Service5Tm {
            severity: Some(Severity::Info),
            event_id,
            reporter_id,
            param1: 0,
            param2: 0,
        };
        reader(Service5Tm::creator(APID, 0, Severity::Info, &event))
    }

    #[test]
    fn test_service_tests_exist() {
        for service in UNIT_TEST_SERVICES {
            let test = ServiceTest::new(service, APID).unwrap().unwrap();
            assert_eq!(test.service, service);
            assert!(test.tc_queue.num_telecommands() > 0);
            if let WaitTime::PerInterval(wait_times) = &test.wait_time {
                assert_eq!(wait_times.len(), test.wait_intervals.len());
            }
        }
        assert!(ServiceTest::new(3, APID).unwrap().is_none());
    }

    #[test]
    fn test_service17_success() {
        let test = ServiceTest::new(17, APID).unwrap().unwrap();
        let tcs = sent_tcs(&test);
        assert_eq!(tcs.len(), 4);
        let mut batch = Vec::new();
        for (idx, info) in tcs.iter().enumerate() {
            // The last TC uses an invalid subservice and is rejected.
            if idx == tcs.len() - 1 {
                batch.push(verification(info, TM_ACCEPTANCE_FAILURE));
                continue;
            }
            batch.push(verification(info, TM_ACCEPTANCE_SUCCESS));
            batch.push(verification(info, TM_START_SUCCESS));
            batch.push(verification(info, TM_COMPLETION_SUCCESS));
        }
        batch.push(reader(PusTmCreator::new(APID, 17, 2, 0, vec![])));
        batch.push(reader(PusTmCreator::new(APID, 17, 130, 0, vec![])));
        batch.push(event(0x1234, 8000));
        let tm_queue = TmPacketQueue::from([batch]);
        let report = ServiceTestReport::new(&test, &tcs, &tm_queue);
        assert_eq!(report.counts.acceptance, 3);
        assert_eq!(report.counts.start, 3);
        assert_eq!(report.counts.completion, 3);
        assert_eq!(report.counts.failures, 1);
        assert_eq!(report.counts.misc, 2);
        assert!(report.is_ok(), "{:?}", report.mismatches());
        assert!(report.to_string().contains("OK"));
    }

    #[test]
    fn test_service200_counts_dummy_mode_events() {
        let test = ServiceTest::new(200, APID).unwrap().unwrap();
        let tcs = sent_tcs(&test);
        let mut batch = Vec::new();
        for info in &tcs {
            batch.push(verification(info, TM_ACCEPTANCE_SUCCESS));
            batch.push(verification(info, TM_COMPLETION_SUCCESS));
            batch.push(event(object_ids::DUMMY_DEVICE, 7400));
            batch.push(event(object_ids::DUMMY_DEVICE, 7401));
            let mut mode_reply = object_ids::DUMMY_DEVICE.to_be_bytes().to_vec();
            mode_reply.extend_from_slice(&[0, 0, 0, 1, 0]);
            batch.push(reader(PusTmCreator::new(APID, 200, 6, 0, mode_reply)));
        }
        // Events of other reporters are ignored.
        batch.push(event(object_ids::GPS0, 7400));
        let tm_queue = TmPacketQueue::from([batch]);
        let report = ServiceTestReport::new(&test, &tcs, &tm_queue);
        assert_eq!(report.counts.events, 8);
        assert_eq!(report.counts.misc, 4);
        assert!(report.is_ok(), "{:?}", report.mismatches());
    }

    #[test]
    fn test_missing_replies_fail() {
        let test = ServiceTest::new(2, APID).unwrap().unwrap();
        let tcs = sent_tcs(&test);
        let mut batch: Vec<PusTmReader> = tcs
            .iter()
            .map(|info| verification(info, TM_ACCEPTANCE_SUCCESS))
            .collect();
        let unknown = TcInfo {
            ssc: 9999,
            ..tcs[0].clone()
        };
        batch.push(verification(&unknown, TM_COMPLETION_SUCCESS));
        batch.push(PusTmReader::decode_lenient(&[0x08, 0x73, 0xC0]));
        let report = ServiceTestReport::new(&test, &tcs, &TmPacketQueue::from([batch]));
        assert!(!report.is_ok());
        let mismatches = report.mismatches();
        assert!(mismatches.iter().any(|m| m.starts_with("completion reports")));
        assert!(mismatches.iter().any(|m| m.starts_with("events")));
        assert_eq!(report.counts.unmatched, 1);
        assert_eq!(report.counts.invalid_packets, 1);
        assert!(report.to_string().contains("FAILED"));
    }
}
