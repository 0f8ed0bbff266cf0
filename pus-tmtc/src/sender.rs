//! Telecommand sender/receiver family.
//!
//! All senders drain telecommands from a [TcQueue] or take a single telecommand, send them
//! over the shared communication interface and coordinate with the background listener through
//! a [TmListenerHandle] to detect replies.
//!
//!  - [SingleCommandSenderReceiver]: send one telecommand and wait for the first reply.
//!  - [SequentialCommandSenderReceiver]: send the next telecommand only after the replies of the
//!    previous one were received or the reply timeout elapsed.
//!  - [MultipleCommandSenderReceiver]: send a whole queue in bursts and collect the telemetry
//!    at the end.
//!
//! Reply timeouts are handled locally. Depending on the configuration, the last telecommand is
//! sent again or the sender continues as if a reply was received.
use crate::clock::Clock;
use crate::com_if::{lock_bounded, ComIfError, SharedComInterface};
use crate::config::{
    scaled_tc_timeout, TmtcConfig, BURST_TRAILING_WAIT_DIVISOR, LISTENER_MODE_CHANGE_DELAY,
    MAX_RESEND_COUNT, TIMEOUT_CHECK_INTERVAL,
};
use crate::listener::{ListenerError, ListenerMode, TmListenerHandle, TmPacketQueue};
use crate::printer::TmTcPrinter;
use crate::queue::{TcQueue, TcQueueEntry};
use crate::tc::{PackedTc, TcInfo};
use delegate::delegate;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
    #[error("communication interface error: {0}")]
    ComIf(#[from] ComIfError),
}

fn send_packed_tc(
    com_if: &SharedComInterface,
    printer: &mut TmTcPrinter,
    tc: &PackedTc,
) -> Result<(), ComIfError> {
    printer.print_telecommand(&tc.raw, &tc.info);
    lock_bounded(com_if, "communication interface").send_telecommand(&tc.raw, &tc.info)
}

/// State and behaviour shared by all sender/receiver variants.
pub struct CommandSenderReceiver {
    com_if: SharedComInterface,
    printer: TmTcPrinter,
    listener: TmListenerHandle,
    clock: Arc<dyn Clock>,
    tm_timeout: Duration,
    tc_timeout_factor: f64,
    resend_tc: bool,
    start_time: Option<Duration>,
    timeout_counter: u32,
    last_tc: Option<PackedTc>,
    operation_pending: bool,
    reply_received: bool,
}

impl CommandSenderReceiver {
    pub fn new(
        com_if: SharedComInterface,
        printer: TmTcPrinter,
        listener: TmListenerHandle,
        cfg: &TmtcConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            com_if,
            printer,
            listener,
            clock,
            tm_timeout: cfg.tm_timeout,
            tc_timeout_factor: cfg.tc_timeout_factor,
            resend_tc: cfg.resend_tc,
            start_time: None,
            timeout_counter: 0,
            last_tc: None,
            operation_pending: false,
            reply_received: false,
        }
    }

    pub fn tm_timeout(&self) -> Duration {
        self.tm_timeout
    }

    pub fn set_tm_timeout(&mut self, tm_timeout: Duration) {
        self.tm_timeout = tm_timeout;
    }

    /// After the TM timeout multiplied with this factor, a telecommand is sent again.
    pub fn set_tc_timeout_factor(&mut self, factor: f64) {
        self.tc_timeout_factor = factor;
    }

    pub fn set_resend_tc(&mut self, resend_tc: bool) {
        self.resend_tc = resend_tc;
    }

    pub fn tc_timeout(&self) -> Duration {
        scaled_tc_timeout(self.tm_timeout, self.tc_timeout_factor)
    }

    pub fn reply_received(&self) -> bool {
        self.reply_received
    }

    pub fn operation_pending(&self) -> bool {
        self.operation_pending
    }

    /// Number of retransmissions of the last telecommand.
    pub fn timeout_counter(&self) -> u32 {
        self.timeout_counter
    }

    pub fn last_tc(&self) -> Option<&PackedTc> {
        self.last_tc.as_ref()
    }

    pub fn printer(&self) -> &TmTcPrinter {
        &self.printer
    }

    pub fn printer_mut(&mut self) -> &mut TmTcPrinter {
        &mut self.printer
    }

    pub fn listener(&self) -> &TmListenerHandle {
        &self.listener
    }

    /// Execute a directive entry. Returns true if the entry is a telecommand, which is then
    /// cached as the last telecommand.
    pub fn check_queue_entry(&mut self, entry: TcQueueEntry) -> bool {
        match entry {
            TcQueueEntry::Telecommand(tc) => {
                self.last_tc = Some(tc);
                return true;
            }
            TcQueueEntry::Wait(wait_time) => {
                self.tm_timeout = self.tm_timeout.saturating_add(wait_time);
                self.clock.sleep(wait_time);
            }
            TcQueueEntry::Print(text) => self.printer.print_string(&text, true),
            TcQueueEntry::RawPrint(text) => self.printer.print_string(&text, false),
            TcQueueEntry::Export(path) => {
                self.printer.add_file_buffer_to_buffer_list();
                if let Err(e) = self.printer.print_to_file(&path, true) {
                    log::error!("exporting output to {} failed: {e}", path.display());
                }
            }
            TcQueueEntry::SetTimeout(timeout) => self.tm_timeout = timeout,
        }
        false
    }

    /// Send the cached last telecommand as a new command. Timeout tracking starts anew.
    pub fn send_last_tc(&mut self) -> Result<(), SenderError> {
        let Some(tc) = &self.last_tc else {
            log::warn!("CommandSenderReceiver: no telecommand to send");
            return Ok(());
        };
        self.timeout_counter = 0;
        self.reply_received = false;
        self.operation_pending = true;
        self.start_time = Some(self.clock.now());
        send_packed_tc(&self.com_if, &mut self.printer, tc)?;
        Ok(())
    }

    fn resend_last_tc(&mut self) {
        if let Some(tc) = &self.last_tc {
            if let Err(e) = send_packed_tc(&self.com_if, &mut self.printer, tc) {
                log::error!("CommandSenderReceiver: resending telecommand failed: {e}");
            }
        }
    }

    /// Consume a reply event of the listener or check for a timeout.
    pub fn check_for_first_reply(&mut self) {
        if self.listener.reply_received() {
            self.reply_received = true;
            self.operation_pending = false;
        } else {
            self.check_for_timeout();
        }
    }

    /// Handle an elapsed reply timeout. The last telecommand is sent again if resending is
    /// enabled, up to [MAX_RESEND_COUNT] times. Otherwise, or when the maximum count was
    /// reached, the sender stops waiting and continues as if a reply was received.
    /// Each call is throttled by [TIMEOUT_CHECK_INTERVAL].
    pub fn check_for_timeout(&mut self) {
        let start = *self.start_time.get_or_insert_with(|| self.clock.now());
        if self.timeout_counter >= MAX_RESEND_COUNT {
            log::info!("CommandSenderReceiver: no response from command");
            self.reply_received = true;
            self.operation_pending = false;
        } else if self.clock.elapsed_since(start) >= self.tc_timeout() {
            if self.resend_tc {
                log::info!("CommandSenderReceiver: timeout, sending TC again");
                self.resend_last_tc();
                self.timeout_counter += 1;
                self.start_time = Some(self.clock.now());
            } else {
                log::info!(
                    "CommandSenderReceiver: no reply within {:?}, continuing",
                    self.tc_timeout()
                );
                self.reply_received = true;
                self.operation_pending = false;
            }
        }
        self.clock.sleep(TIMEOUT_CHECK_INTERVAL);
    }

    /// Take the telemetry buffered by the listener and print it.
    pub fn print_tm_queue(&mut self) -> TmPacketQueue {
        let tm_queue = self.listener.take_tm_packet_queue();
        self.printer.print_telemetry_queue(&tm_queue);
        tm_queue
    }

    fn enter_listener_mode(&mut self, mode: ListenerMode) -> Result<(), SenderError> {
        self.listener.clear_reply_events();
        self.listener.set_listener_mode(mode)?;
        self.clock.sleep(LISTENER_MODE_CHANGE_DELAY);
        Ok(())
    }
}

/// Send a single telecommand and wait for its replies.
pub struct SingleCommandSenderReceiver {
    base: CommandSenderReceiver,
}

impl SingleCommandSenderReceiver {
    pub fn new(base: CommandSenderReceiver) -> Self {
        Self { base }
    }

    delegate! {
        to self.base {
            pub fn reply_received(&self) -> bool;
            pub fn timeout_counter(&self) -> u32;
            pub fn set_tm_timeout(&mut self, tm_timeout: Duration);
            pub fn set_tc_timeout_factor(&mut self, factor: f64);
            pub fn set_resend_tc(&mut self, resend_tc: bool);
            pub fn printer(&self) -> &TmTcPrinter;
            pub fn printer_mut(&mut self) -> &mut TmTcPrinter;
        }
    }

    pub fn into_inner(self) -> CommandSenderReceiver {
        self.base
    }

    /// Returns the telemetry received in reply. The listener always leaves the single command
    /// mode when this call returns.
    pub fn send_single_tc_and_receive_tm(
        &mut self,
        tc: PackedTc,
    ) -> Result<TmPacketQueue, SenderError> {
        self.base
            .enter_listener_mode(ListenerMode::SingleCommand)?;
        self.base.last_tc = Some(tc);
        let send_result = self.base.send_last_tc();
        if send_result.is_ok() {
            while self.base.operation_pending {
                self.base.check_for_first_reply();
            }
        }
        self.base.listener.set_mode_op_finished()?;
        send_result?;
        let tm_queue = self.base.print_tm_queue();
        if self.base.reply_received {
            log::info!("SingleCommandSenderReceiver: reply received");
        }
        Ok(tm_queue)
    }
}

/// Send the telecommands of a queue one after another. The next telecommand is sent after the
/// listener reported a reply sequence or after the reply timeout handling gave up.
pub struct SequentialCommandSenderReceiver {
    base: CommandSenderReceiver,
    tc_queue: TcQueue,
    listener_mode: ListenerMode,
}

impl SequentialCommandSenderReceiver {
    pub fn new(base: CommandSenderReceiver, tc_queue: TcQueue) -> Self {
        Self {
            base,
            tc_queue,
            listener_mode: ListenerMode::ServiceTest,
        }
    }

    /// Listener mode used during the run, [ListenerMode::ServiceTest] by default.
    pub fn with_listener_mode(mut self, listener_mode: ListenerMode) -> Self {
        self.listener_mode = listener_mode;
        self
    }

    delegate! {
        to self.base {
            pub fn timeout_counter(&self) -> u32;
            pub fn set_tm_timeout(&mut self, tm_timeout: Duration);
            pub fn set_tc_timeout_factor(&mut self, factor: f64);
            pub fn set_resend_tc(&mut self, resend_tc: bool);
            pub fn printer(&self) -> &TmTcPrinter;
            pub fn printer_mut(&mut self) -> &mut TmTcPrinter;
        }
    }

    pub fn into_inner(self) -> CommandSenderReceiver {
        self.base
    }

    pub fn send_queue_tc_and_receive_tm_sequentially(&mut self) -> Result<(), SenderError> {
        self.base.enter_listener_mode(self.listener_mode)?;
        let result = self.handle_tc_sending();
        self.base.listener.set_mode_op_finished()?;
        result
    }

    fn handle_tc_sending(&mut self) -> Result<(), SenderError> {
        if !self.send_next_telecommand()? {
            log::info!("SequentialSenderReceiver: no telecommands in queue");
            return Ok(());
        }
        loop {
            if self.base.listener.reply_received() {
                self.base.reply_received = true;
            }
            if !self.base.reply_received {
                self.base.check_for_timeout();
                continue;
            }
            self.base.print_tm_queue();
            if !self.send_next_telecommand()? {
                break;
            }
        }
        log::info!("SequentialSenderReceiver: all replies received");
        Ok(())
    }

    /// Process queue entries until a telecommand was sent. Returns false if the queue was
    /// exhausted without sending.
    fn send_next_telecommand(&mut self) -> Result<bool, SenderError> {
        while let Some(entry) = self.tc_queue.pop() {
            if self.base.check_queue_entry(entry) {
                self.base.send_last_tc()?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Wait time applied after the send counts listed as wait intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTime {
    Uniform(Duration),
    /// One wait time per wait interval, in the same order.
    PerInterval(Vec<Duration>),
}

/// Send a whole queue in bursts and collect all telemetry at the end. The listener runs in
/// [ListenerMode::UnitTest] while the queue is sent.
pub struct MultipleCommandSenderReceiver {
    base: CommandSenderReceiver,
    tc_queue: TcQueue,
    wait_intervals: Vec<usize>,
    wait_time: WaitTime,
    print_tm: bool,
    tc_info_queue: Vec<TcInfo>,
    send_counter: usize,
}

impl MultipleCommandSenderReceiver {
    /// `wait_intervals` contains 1-based send counts. For example `[1, 3]` means that the
    /// wait time is applied after sending the first and the third telecommand.
    pub fn new(
        base: CommandSenderReceiver,
        tc_queue: TcQueue,
        wait_intervals: Vec<usize>,
        wait_time: WaitTime,
        print_tm: bool,
    ) -> Self {
        Self {
            base,
            tc_queue,
            wait_intervals,
            wait_time,
            print_tm,
            tc_info_queue: Vec::new(),
            send_counter: 0,
        }
    }

    delegate! {
        to self.base {
            pub fn set_tm_timeout(&mut self, tm_timeout: Duration);
            pub fn printer(&self) -> &TmTcPrinter;
            pub fn printer_mut(&mut self) -> &mut TmTcPrinter;
        }
    }

    pub fn into_inner(self) -> CommandSenderReceiver {
        self.base
    }

    /// Returns the information of all sent telecommands and all telemetry received during
    /// the run.
    pub fn send_tc_queue_and_return_info(
        &mut self,
    ) -> Result<(Vec<TcInfo>, TmPacketQueue), SenderError> {
        self.base.enter_listener_mode(ListenerMode::UnitTest)?;
        let send_result = self.send_all_queue();
        if send_result.is_ok() {
            self.wait_for_last_replies_listening(
                self.base.tm_timeout.div_f64(BURST_TRAILING_WAIT_DIVISOR),
            );
        }
        let tm_queue = self.base.listener.take_tm_packet_queue();
        if self.print_tm {
            self.base.printer.print_telemetry_queue(&tm_queue);
        }
        self.base.listener.set_mode_op_finished()?;
        send_result?;
        Ok((std::mem::take(&mut self.tc_info_queue), tm_queue))
    }

    fn send_all_queue(&mut self) -> Result<(), SenderError> {
        while let Some(entry) = self.tc_queue.pop() {
            if !self.base.check_queue_entry(entry) {
                continue;
            }
            self.base.send_last_tc()?;
            if let Some(tc) = &self.base.last_tc {
                self.tc_info_queue.push(tc.info.clone());
            }
            self.handle_waiting();
        }
        Ok(())
    }

    fn handle_waiting(&mut self) {
        self.send_counter += 1;
        let Some(idx) = self
            .wait_intervals
            .iter()
            .position(|interval| *interval == self.send_counter)
        else {
            return;
        };
        let wait_time = match &self.wait_time {
            WaitTime::Uniform(wait_time) => *wait_time,
            WaitTime::PerInterval(wait_times) => match wait_times.get(idx) {
                Some(wait_time) => *wait_time,
                None => {
                    log::warn!("MultipleCommandSenderReceiver: no wait time for interval {idx}");
                    return;
                }
            },
        };
        self.base.clock.sleep(wait_time);
    }

    fn wait_for_last_replies_listening(&self, wait_time: Duration) {
        self.base.clock.sleep(wait_time);
    }
}
