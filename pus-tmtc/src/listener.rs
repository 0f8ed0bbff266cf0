//! Background telemetry listener.
//!
//! The [TmListener] runs on its own thread and owns the polling of the communication interface.
//! Received packet batches are appended to a shared [TmPacketQueue]. Other components talk to
//! the listener through a [TmListenerHandle]: mode changes and control requests are sent over a
//! request channel, and the listener publishes [ListenerEvent]s on an event channel.
//!
//! Requests are processed one at a time. A mode change request stops the current reading
//! activity, so a mode operation always starts after all previously sent requests were handled.
use crate::clock::Clock;
use crate::com_if::{lock_bounded, SharedComInterface, TmPacketList};
use crate::config::{
    scaled_tc_timeout, TmtcConfig, FIRST_DATA_POLL_INTERVAL, LISTENER_IDLE_INTERVAL,
    LISTENER_INACTIVE_INTERVAL, POLL_TIMEOUT, SEQUENCE_POLL_INTERVAL,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Telemetry batches in arrival order. Each entry is the result of one poll.
pub type TmPacketQueue = VecDeque<TmPacketList>;
pub type SharedTmPacketQueue = Arc<Mutex<TmPacketQueue>>;

/// Reply collection policy of the listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ListenerMode {
    /// Only poll and buffer telemetry.
    #[default]
    Listener = 1,
    SingleCommand = 2,
    ServiceTest = 3,
    SoftwareTest = 4,
    UnitTest = 5,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ListenerRequest {
    /// Run the mode operation of the given mode until it is finished.
    ChangeMode(ListenerMode),
    /// Finish the running mode operation.
    ModeOpFinished,
    SetActive(bool),
    Shutdown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A telemetry sequence was received during a mode operation.
    ReplyReceived,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    #[error("TM listener is disconnected")]
    Disconnected,
}

/// Cloneable handle used to control the listener and to access the received telemetry.
#[derive(Debug, Clone)]
pub struct TmListenerHandle {
    request_tx: Sender<ListenerRequest>,
    event_rx: Receiver<ListenerEvent>,
    mode: Arc<AtomicU8>,
    tm_queue: SharedTmPacketQueue,
}

impl TmListenerHandle {
    pub fn send_request(&self, request: ListenerRequest) -> Result<(), ListenerError> {
        self.request_tx
            .send(request)
            .map_err(|_| ListenerError::Disconnected)
    }

    pub fn set_listener_mode(&self, mode: ListenerMode) -> Result<(), ListenerError> {
        self.send_request(ListenerRequest::ChangeMode(mode))
    }

    pub fn set_mode_op_finished(&self) -> Result<(), ListenerError> {
        self.send_request(ListenerRequest::ModeOpFinished)
    }

    pub fn set_active(&self, active: bool) -> Result<(), ListenerError> {
        self.send_request(ListenerRequest::SetActive(active))
    }

    pub fn shutdown(&self) -> Result<(), ListenerError> {
        self.send_request(ListenerRequest::Shutdown)
    }

    /// Mode the listener is currently operating in.
    pub fn mode(&self) -> ListenerMode {
        ListenerMode::try_from(self.mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Check for a reply event. A detected event is consumed.
    pub fn reply_received(&self) -> bool {
        matches!(self.event_rx.try_recv(), Ok(ListenerEvent::ReplyReceived))
    }

    pub fn wait_for_reply(&self, timeout: Duration) -> bool {
        matches!(
            self.event_rx.recv_timeout(timeout),
            Ok(ListenerEvent::ReplyReceived)
        )
    }

    /// Discard all pending events.
    pub fn clear_reply_events(&self) {
        while self.event_rx.try_recv().is_ok() {}
    }

    /// Snapshot of the telemetry queue. The listener keeps appending to the shared queue.
    pub fn retrieve_tm_packet_queue(&self) -> TmPacketQueue {
        lock_bounded(&self.tm_queue, "TM packet queue").clone()
    }

    pub fn clear_tm_packet_queue(&self) {
        lock_bounded(&self.tm_queue, "TM packet queue").clear();
    }

    /// Retrieve and clear the telemetry queue in one critical section.
    pub fn take_tm_packet_queue(&self) -> TmPacketQueue {
        std::mem::take(&mut *lock_bounded(&self.tm_queue, "TM packet queue"))
    }

    pub fn num_tm_batches(&self) -> usize {
        lock_bounded(&self.tm_queue, "TM packet queue").len()
    }
}

pub struct TmListener {
    com_if: SharedComInterface,
    clock: Arc<dyn Clock>,
    request_rx: Receiver<ListenerRequest>,
    event_tx: Sender<ListenerEvent>,
    mode: Arc<AtomicU8>,
    tm_queue: SharedTmPacketQueue,
    tm_timeout: Duration,
    tc_timeout_factor: f64,
    mode_operation_timeout: Duration,
    active: bool,
    shutdown: bool,
    pending_mode: Option<ListenerMode>,
    in_mode_op: bool,
    mode_op_finished: bool,
    mode_op_count: u64,
}

impl TmListener {
    pub fn new(
        com_if: SharedComInterface,
        cfg: &TmtcConfig,
        clock: Arc<dyn Clock>,
    ) -> (Self, TmListenerHandle) {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mode = Arc::new(AtomicU8::new(ListenerMode::Listener.into()));
        let tm_queue = SharedTmPacketQueue::default();
        let handle = TmListenerHandle {
            request_tx,
            event_rx,
            mode: mode.clone(),
            tm_queue: tm_queue.clone(),
        };
        let listener = Self {
            com_if,
            clock,
            request_rx,
            event_tx,
            mode,
            tm_queue,
            tm_timeout: cfg.tm_timeout,
            tc_timeout_factor: cfg.tc_timeout_factor,
            mode_operation_timeout: cfg.mode_operation_timeout,
            active: true,
            shutdown: false,
            pending_mode: None,
            in_mode_op: false,
            mode_op_finished: false,
            mode_op_count: 0,
        };
        (listener, handle)
    }

    /// Run the listener on a dedicated thread. The thread ends after a shutdown request or
    /// when all handles were dropped.
    pub fn spawn(mut self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("tm-listener".to_string())
            .spawn(move || self.perform_operation())
    }

    pub fn mode(&self) -> ListenerMode {
        ListenerMode::try_from(self.mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn mode_op_count(&self) -> u64 {
        self.mode_op_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown
    }

    pub fn perform_operation(&mut self) {
        log::info!("TM listener started");
        while !self.shutdown {
            if self.active {
                self.default_operation();
                self.clock.sleep(LISTENER_IDLE_INTERVAL);
            } else {
                match self.request_rx.recv_timeout(LISTENER_INACTIVE_INTERVAL) {
                    Ok(request) => {
                        self.handle_request(request);
                    }
                    Err(RecvTimeoutError::Timeout) => (),
                    Err(RecvTimeoutError::Disconnected) => self.shutdown = true,
                }
            }
        }
        log::info!("TM listener stopped");
    }

    /// Poll the communication interface once and run all pending mode operations.
    pub fn default_operation(&mut self) {
        self.handle_requests();
        self.perform_core_operation();
        while let Some(mode) = self.pending_mode.take() {
            if self.shutdown || !self.active {
                break;
            }
            self.run_mode_operation(mode);
        }
    }

    fn run_mode_operation(&mut self, mode: ListenerMode) {
        log::debug!("TM listener entering mode {mode:?}");
        self.set_mode(mode);
        self.in_mode_op = true;
        self.mode_op_finished = false;
        let start = self.clock.now();
        while !self.mode_op_finished && !self.shutdown {
            if self.clock.elapsed_since(start) >= self.mode_operation_timeout {
                log::warn!(
                    "TM listener: mode operation {mode:?} timed out after {:?}",
                    self.mode_operation_timeout
                );
                break;
            }
            if self.handle_requests() {
                continue;
            }
            self.perform_mode_operation();
        }
        self.in_mode_op = false;
        self.mode_op_finished = false;
        self.set_mode(ListenerMode::Listener);
    }

    /// One step of the reply collection policy of the current mode.
    pub fn perform_mode_operation(&mut self) {
        match self.mode() {
            ListenerMode::Listener => {
                self.mode_op_finished = true;
            }
            ListenerMode::SingleCommand
            | ListenerMode::ServiceTest
            | ListenerMode::SoftwareTest => {
                if self.check_for_one_telemetry_sequence()
                    && self.event_tx.send(ListenerEvent::ReplyReceived).is_err()
                {
                    log::debug!("TM listener: no receiver for reply event");
                }
            }
            ListenerMode::UnitTest => {
                if !self.perform_core_operation() {
                    self.clock.sleep(LISTENER_IDLE_INTERVAL);
                }
            }
        }
        self.mode_op_count += 1;
    }

    /// Wait for the first packet of a telemetry sequence and collect the sequence. Returns
    /// whether any telemetry was received.
    pub fn check_for_one_telemetry_sequence(&mut self) -> bool {
        let first_data_timeout = scaled_tc_timeout(self.tm_timeout, self.tc_timeout_factor);
        let start = self.clock.now();
        let mut data_available = false;
        while self.clock.elapsed_since(start) < first_data_timeout {
            if self.handle_requests() {
                return false;
            }
            if self.data_available(POLL_TIMEOUT) {
                data_available = true;
                break;
            }
            self.clock.sleep(FIRST_DATA_POLL_INTERVAL);
        }
        if !data_available {
            return false;
        }
        self.read_telemetry_sequence()
    }

    fn read_telemetry_sequence(&mut self) -> bool {
        let start = self.clock.now();
        let mut tm_received = false;
        loop {
            if self.perform_core_operation() {
                tm_received = true;
            }
            if self.clock.elapsed_since(start) >= self.tm_timeout || self.handle_requests() {
                break;
            }
            self.clock.sleep(SEQUENCE_POLL_INTERVAL);
        }
        tm_received
    }

    /// Drain the communication interface into the telemetry queue. Returns whether packets
    /// were received.
    pub fn perform_core_operation(&mut self) -> bool {
        let poll_result = lock_bounded(&self.com_if, "communication interface")
            .poll_interface(POLL_TIMEOUT);
        let packets = match poll_result {
            Ok((true, packets)) if !packets.is_empty() => packets,
            Ok(_) => return false,
            Err(e) => {
                log::error!("TM listener: polling communication interface failed: {e}");
                return false;
            }
        };
        lock_bounded(&self.tm_queue, "TM packet queue").push_back(packets);
        true
    }

    fn data_available(&mut self, timeout: Duration) -> bool {
        match lock_bounded(&self.com_if, "communication interface").data_available(timeout) {
            Ok(available) => available,
            Err(e) => {
                log::error!("TM listener: checking for data failed: {e}");
                false
            }
        }
    }

    fn set_mode(&self, mode: ListenerMode) {
        self.mode.store(mode.into(), Ordering::Release);
    }

    /// Handle pending requests until one of them stops the current reading activity.
    /// Returns true if reading should stop.
    fn handle_requests(&mut self) -> bool {
        loop {
            match self.request_rx.try_recv() {
                Ok(request) => {
                    if self.handle_request(request) {
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => {
                    self.shutdown = true;
                    return true;
                }
            }
        }
    }

    fn handle_request(&mut self, request: ListenerRequest) -> bool {
        match request {
            ListenerRequest::ChangeMode(mode) => {
                if self.in_mode_op {
                    self.mode_op_finished = true;
                }
                self.pending_mode = Some(mode);
                true
            }
            ListenerRequest::ModeOpFinished => {
                if self.in_mode_op {
                    self.mode_op_finished = true;
                    return true;
                }
                if let Some(mode) = self.pending_mode.take() {
                    log::debug!("TM listener: pending mode {mode:?} cancelled");
                }
                false
            }
            ListenerRequest::SetActive(active) => {
                self.active = active;
                if !active && self.in_mode_op {
                    self.mode_op_finished = true;
                }
                !active
            }
            ListenerRequest::Shutdown => {
                self.shutdown = true;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com_if::shared_com_interface;
    use crate::sp::CcsdsPrimaryHeader;
    use crate::test_util::{FakeComInterface, FastClock};
    use crate::tm::PusTmCreator;

    fn ping_reply(ssc: u16) -> Vec<u8> {
        PusTmCreator::new(0x73, 17, 2, ssc, vec![]).to_vec().unwrap()
    }

    fn listener_with_fake(cfg: &TmtcConfig) -> (TmListener, TmListenerHandle, FakeComInterface) {
        let fake = FakeComInterface::default();
        let (listener, handle) = TmListener::new(
            shared_com_interface(fake.clone()),
            cfg,
            Arc::new(FastClock::default()),
        );
        (listener, handle, fake)
    }

    #[test]
    fn test_core_operation_buffers_batches() {
        let (mut listener, handle, fake) = listener_with_fake(&TmtcConfig::default());
        assert!(!listener.perform_core_operation());
        fake.push_tm(ping_reply(0));
        fake.push_tm(ping_reply(1));
        assert!(listener.perform_core_operation());
        fake.push_tm(ping_reply(2));
        listener.default_operation();
        let queue = handle.retrieve_tm_packet_queue();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].len(), 2);
        assert_eq!(queue[0][1].ssc(), 1);
        assert_eq!(queue[1][0].ssc(), 2);
        // Retrieval does not clear the queue, taking does.
        assert_eq!(handle.num_tm_batches(), 2);
        assert_eq!(handle.take_tm_packet_queue().len(), 2);
        assert_eq!(handle.num_tm_batches(), 0);
    }

    #[test]
    fn test_mode_round_trip_without_data() {
        let cfg = TmtcConfig::default();
        let (mut listener, handle, _fake) = listener_with_fake(&cfg);
        handle.set_listener_mode(ListenerMode::ServiceTest).unwrap();
        listener.default_operation();
        assert_eq!(listener.mode(), ListenerMode::Listener);
        assert_eq!(handle.mode(), ListenerMode::Listener);
        assert!(listener.mode_op_count() > 1);
        assert!(!handle.reply_received());
    }

    #[test]
    fn test_listener_mode_finishes_immediately() {
        let (mut listener, handle, _fake) = listener_with_fake(&TmtcConfig::default());
        handle.set_listener_mode(ListenerMode::Listener).unwrap();
        listener.default_operation();
        assert_eq!(listener.mode_op_count(), 1);
    }

    #[test]
    fn test_sequence_sets_reply_event() {
        let (mut listener, handle, fake) = listener_with_fake(&TmtcConfig::default());
        fake.push_tm(ping_reply(5));
        listener.set_mode(ListenerMode::SingleCommand);
        listener.perform_mode_operation();
        assert!(handle.reply_received());
        assert!(!handle.reply_received());
        assert_eq!(handle.take_tm_packet_queue()[0][0].ssc(), 5);
    }

    #[test]
    fn test_mode_op_finished_request() {
        let (mut listener, handle, _fake) = listener_with_fake(&TmtcConfig::default());
        handle.set_listener_mode(ListenerMode::UnitTest).unwrap();
        handle.set_mode_op_finished().unwrap();
        listener.default_operation();
        assert_eq!(listener.mode(), ListenerMode::Listener);
        assert_eq!(listener.mode_op_count(), 0);
    }

    #[test]
    fn test_threaded_shutdown() {
        let (listener, handle, fake) = listener_with_fake(&TmtcConfig::default());
        let jh = listener.spawn().unwrap();
        fake.push_tm(ping_reply(3));
        let mut received = false;
        for _ in 0..500 {
            if handle.num_tm_batches() > 0 {
                received = true;
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(received);
        handle.shutdown().unwrap();
        jh.join().unwrap();
    }

    #[test]
    fn test_dropped_handle_stops_listener() {
        let (listener, handle, _fake) = listener_with_fake(&TmtcConfig::default());
        handle.set_active(false).unwrap();
        let jh = listener.spawn().unwrap();
        drop(handle);
        jh.join().unwrap();
    }
}
