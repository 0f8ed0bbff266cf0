//! Test doubles for the communication interface and the clock.
use crate::clock::Clock;
use crate::com_if::{ComIfError, CommunicationInterface, TmPacketList};
use crate::services::{subservices, Service1Tm};
use crate::tc::TcInfo;
use crate::tm::PusTmReader;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Simulated clock. Time only advances when a thread sleeps on the clock, so timeouts of
/// several minutes elapse instantly.
#[derive(Debug, Default)]
pub struct FastClock {
    nanos: AtomicU64,
}

impl FastClock {
    pub fn advance(&self, duration: Duration) {
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::AcqRel);
    }
}

impl Clock for FastClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        std::thread::yield_now();
    }
}

type ReplyGenerator = Box<dyn FnMut(&TcInfo) -> Vec<Vec<u8>> + Send>;

#[derive(Default)]
struct FakeComState {
    sent_tcs: Vec<TcInfo>,
    sent_raw: Vec<Vec<u8>>,
    sent_data: Vec<Vec<u8>>,
    pending_tm: VecDeque<Vec<u8>>,
    ignored_sends: usize,
    reply_generator: Option<ReplyGenerator>,
    closed: bool,
}

/// Loopback communication interface which records everything sent through it. Clones share
/// their state, so a test can keep a clone to inspect a fake which was moved into a component.
#[derive(Clone, Default)]
pub struct FakeComInterface {
    state: Arc<Mutex<FakeComState>>,
}

impl FakeComInterface {
    /// Fake which answers every telecommand with acceptance and completion success reports.
    pub fn with_verification_replies(apid: u16) -> Self {
        let fake = Self::default();
        let mut ssc = 0;
        fake.set_reply_generator(move |tc_info| {
            [
                subservices::TM_ACCEPTANCE_SUCCESS,
                subservices::TM_COMPLETION_SUCCESS,
            ]
            .iter()
            .filter_map(|subservice| {
                ssc += 1;
                Service1Tm::creator(apid, ssc, tc_info, *subservice, None)
                    .to_vec()
                    .ok()
            })
            .collect()
        });
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeComState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_reply_generator(
        &self,
        generator: impl FnMut(&TcInfo) -> Vec<Vec<u8>> + Send + 'static,
    ) {
        self.state().reply_generator = Some(Box::new(generator));
    }

    /// The next `num_sends` telecommands are not answered.
    pub fn ignore_next_sends(&self, num_sends: usize) {
        self.state().ignored_sends = num_sends;
    }

    pub fn push_tm(&self, raw_tm: Vec<u8>) {
        self.state().pending_tm.push_back(raw_tm);
    }

    pub fn sent_tcs(&self) -> Vec<TcInfo> {
        self.state().sent_tcs.clone()
    }

    pub fn num_sent_tcs(&self) -> usize {
        self.state().sent_tcs.len()
    }

    pub fn sent_raw_tcs(&self) -> Vec<Vec<u8>> {
        self.state().sent_raw.clone()
    }

    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.state().sent_data.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl CommunicationInterface for FakeComInterface {
    fn send_telecommand(&mut self, tc_raw: &[u8], tc_info: &TcInfo) -> Result<(), ComIfError> {
        let mut state = self.state();
        if state.closed {
            return Err(ComIfError::Closed);
        }
        state.sent_tcs.push(tc_info.clone());
        state.sent_raw.push(tc_raw.to_vec());
        if state.ignored_sends > 0 {
            state.ignored_sends -= 1;
            return Ok(());
        }
        let replies = match state.reply_generator.as_mut() {
            Some(generator) => generator(tc_info),
            None => Vec::new(),
        };
        state.pending_tm.extend(replies);
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), ComIfError> {
        let mut state = self.state();
        if state.closed {
            return Err(ComIfError::Closed);
        }
        state.sent_data.push(data.to_vec());
        Ok(())
    }

    fn poll_interface(&mut self, _timeout: Duration) -> Result<(bool, TmPacketList), ComIfError> {
        let packets: TmPacketList = self
            .state()
            .pending_tm
            .drain(..)
            .map(|raw| PusTmReader::decode_lenient(&raw))
            .collect();
        Ok((!packets.is_empty(), packets))
    }

    fn data_available(&mut self, _timeout: Duration) -> Result<bool, ComIfError> {
        Ok(!self.state().pending_tm.is_empty())
    }

    fn close(&mut self) -> Result<(), ComIfError> {
        self.state().closed = true;
        Ok(())
    }
}
