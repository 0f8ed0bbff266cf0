//! Mode driver of the TMTC client.
//!
//! The [TmTcHandler] owns the background TM listener and runs the sender/receiver variant which
//! belongs to the configured operation mode.
use crate::config::{
    ClientConfig, OperationMode, ServiceSelection, IDLE_POLL_INTERVAL, IDLE_PRINT_INTERVAL,
};
use crate::report::{ServiceTest, ServiceTestReport, UNIT_TEST_SERVICES};
use crate::tc::{self, log_file_path, PackError};
use pus_tmtc::clock::Clock;
use pus_tmtc::com_if::{lock_bounded, SharedComInterface};
use pus_tmtc::ecss::PusError;
use pus_tmtc::listener::{ListenerMode, TmListener, TmListenerHandle};
use pus_tmtc::printer::TmTcPrinter;
use pus_tmtc::queue::TcQueue;
use pus_tmtc::sender::{
    CommandSenderReceiver, MultipleCommandSenderReceiver, SenderError,
    SequentialCommandSenderReceiver, SingleCommandSenderReceiver,
};
use pus_tmtc::tc::PusTcCreator;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub const SOFTWARE_TEST_LOG_FILE: &str = "tmtc_log.txt";
pub const UNIT_TEST_LOG_FILE: &str = "tmtc_unit_test.txt";

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("sender error: {0}")]
    Sender(#[from] SenderError),
    #[error("packing telecommands failed: {0}")]
    Pack(#[from] PackError),
    #[error("PUS error: {0}")]
    Pus(#[from] PusError),
    #[error("unit test failed for services {0:?}")]
    UnitTestFailed(Vec<u8>),
}

/// Cloneable handle to stop the client, usable from a signal handler.
#[derive(Clone)]
pub struct ExitHandle {
    apid: u16,
    com_if: SharedComInterface,
    listener: TmListenerHandle,
    running: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
}

impl ExitHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Leave the idle loop of the listener mode.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Send the shutdown telecommand, close the communication interface and stop the
    /// listener. Only the first call has an effect.
    pub fn exit(&self) {
        self.stop();
        if self.exited.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Closing TMTC client");
        {
            let mut com_if = lock_bounded(&self.com_if, "communication interface");
            match PusTcCreator::new_shutdown(self.apid).pack() {
                Ok(tc) => {
                    if let Err(e) = com_if.send_telecommand(&tc.raw, &tc.info) {
                        log::warn!("sending the shutdown telecommand failed: {e}");
                    }
                }
                Err(e) => log::error!("packing the shutdown telecommand failed: {e}"),
            }
            if let Err(e) = com_if.close() {
                log::warn!("closing the communication interface failed: {e}");
            }
        }
        if self.listener.shutdown().is_err() {
            log::debug!("TM listener already stopped");
        }
    }
}

pub struct TmTcHandler {
    cfg: ClientConfig,
    com_if: SharedComInterface,
    clock: Arc<dyn Clock>,
    listener: TmListenerHandle,
    listener_thread: Option<JoinHandle<()>>,
    exit_handle: ExitHandle,
}

impl TmTcHandler {
    /// Spawns the TM listener thread.
    pub fn new(
        cfg: ClientConfig,
        com_if: SharedComInterface,
        clock: Arc<dyn Clock>,
    ) -> io::Result<Self> {
        let (listener, listener_handle) = TmListener::new(com_if.clone(), &cfg.tmtc, clock.clone());
        let listener_thread = listener.spawn()?;
        let exit_handle = ExitHandle {
            apid: cfg.tmtc.apid,
            com_if: com_if.clone(),
            listener: listener_handle.clone(),
            running: Arc::new(AtomicBool::new(true)),
            exited: Arc::new(AtomicBool::new(false)),
        };
        Ok(Self {
            cfg,
            com_if,
            clock,
            listener: listener_handle,
            listener_thread: Some(listener_thread),
            exit_handle,
        })
    }

    pub fn exit_handle(&self) -> ExitHandle {
        self.exit_handle.clone()
    }

    pub fn mode(&self) -> OperationMode {
        self.cfg.mode
    }

    pub fn perform_operation(&mut self) -> Result<(), HandlerError> {
        log::info!("TMTC client running in {}", self.cfg.mode.description());
        match self.cfg.mode {
            OperationMode::Listener => {
                self.perform_idle_operation();
                Ok(())
            }
            OperationMode::SingleCommand => self.perform_single_command(),
            OperationMode::ServiceTest => self.perform_service_test(),
            OperationMode::SoftwareTest => self.perform_software_test(),
            OperationMode::UnitTest => {
                let failed: Vec<u8> = self
                    .perform_unit_test()?
                    .iter()
                    .filter(|report| !report.is_ok())
                    .map(|report| report.service)
                    .collect();
                if !failed.is_empty() {
                    return Err(HandlerError::UnitTestFailed(failed));
                }
                Ok(())
            }
        }
    }

    fn sender_base(&self) -> CommandSenderReceiver {
        CommandSenderReceiver::new(
            self.com_if.clone(),
            TmTcPrinter::from_config(&self.cfg.tmtc),
            self.listener.clone(),
            &self.cfg.tmtc,
            self.clock.clone(),
        )
    }

    /// Print incoming telemetry until the client is stopped.
    fn perform_idle_operation(&self) {
        let mut printer = TmTcPrinter::from_config(&self.cfg.tmtc);
        log::info!("TMTC Client in idle mode");
        let mut last_print = self.clock.now();
        while self.exit_handle.is_running() {
            let tm_queue = self.listener.take_tm_packet_queue();
            if !tm_queue.is_empty() {
                printer.print_telemetry_queue(&tm_queue);
            }
            if self.clock.elapsed_since(last_print) >= IDLE_PRINT_INTERVAL {
                log::info!("TMTC Client in idle mode");
                last_print = self.clock.now();
            }
            self.clock.sleep(IDLE_POLL_INTERVAL);
        }
    }

    fn perform_single_command(&self) -> Result<(), HandlerError> {
        let tc = tc::command_preparation(self.cfg.tmtc.apid)?;
        let mut sender = SingleCommandSenderReceiver::new(self.sender_base());
        let tm_queue = sender.send_single_tc_and_receive_tm(tc)?;
        log::info!(
            "single command finished with {} telemetry batches",
            tm_queue.len()
        );
        Ok(())
    }

    fn perform_service_test(&self) -> Result<(), HandlerError> {
        let mut tc_queue = TcQueue::new();
        tc::pack_service_queue(self.cfg.service, &mut tc_queue, self.cfg.tmtc.apid)?;
        let mut sender = SequentialCommandSenderReceiver::new(self.sender_base(), tc_queue);
        sender.send_queue_tc_and_receive_tm_sequentially()?;
        Ok(())
    }

    fn perform_software_test(&self) -> Result<(), HandlerError> {
        let tc_queue = tc::create_total_tc_queue(self.cfg.tmtc.apid)?;
        let mut sender = SequentialCommandSenderReceiver::new(self.sender_base(), tc_queue)
            .with_listener_mode(ListenerMode::SoftwareTest);
        sender.send_queue_tc_and_receive_tm_sequentially()?;
        if self.cfg.tmtc.print_to_file {
            sender
                .printer_mut()
                .print_file_buffer_list_to_file(log_file_path(SOFTWARE_TEST_LOG_FILE), true)?;
        }
        Ok(())
    }

    /// Run the service tests selected by the configuration and return one report per test.
    pub fn perform_unit_test(&self) -> Result<Vec<ServiceTestReport>, HandlerError> {
        let mut summary = TmTcPrinter::from_config(&self.cfg.tmtc);
        let mut reports = Vec::new();
        for service in unit_test_services(self.cfg.service) {
            let Some(test) = ServiceTest::new(service, self.cfg.tmtc.apid)? else {
                continue;
            };
            log::info!("Testing Service {service}");
            let mut sender = MultipleCommandSenderReceiver::new(
                self.sender_base(),
                test.tc_queue.clone(),
                test.wait_intervals.clone(),
                test.wait_time.clone(),
                self.cfg.tmtc.print_tm,
            );
            let (tc_infos, tm_queue) = sender.send_tc_queue_and_return_info()?;
            let report = ServiceTestReport::new(&test, &tc_infos, &tm_queue);
            summary.print_string(&report.to_string(), true);
            for mismatch in report.mismatches() {
                log::error!("Service {service}: {mismatch}");
            }
            reports.push(report);
        }
        if self.cfg.tmtc.print_to_file {
            summary.print_to_file(log_file_path(UNIT_TEST_LOG_FILE), true)?;
        }
        Ok(reports)
    }

    /// Stop the client and wait for the listener thread.
    pub fn shutdown(mut self) {
        self.exit_handle.exit();
        if let Some(listener_thread) = self.listener_thread.take() {
            if listener_thread.join().is_err() {
                log::error!("TM listener thread panicked");
            }
        }
    }
}

/// A service with an automated test runs alone, every other selection runs all service tests.
pub fn unit_test_services(selection: ServiceSelection) -> Vec<u8> {
    match selection {
        ServiceSelection::Service(service) if UNIT_TEST_SERVICES.contains(&service) => {
            vec![service]
        }
        _ => UNIT_TEST_SERVICES.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pus_tmtc::clock::SystemClock;
    use pus_tmtc::com_if::shared_com_interface;
    use pus_tmtc::services::{subservices, FailureData, Service1Tm, Service5Tm, Severity};
    use pus_tmtc::tc::TcInfo;
    use pus_tmtc::test_util::{FakeComInterface, FastClock};
    use pus_tmtc::tm::PusTmCreator;
    use std::time::Duration;

    const APID: u16 = 0x73;

    fn client_config(mode: OperationMode, service: ServiceSelection) -> ClientConfig {
        let mut cfg = ClientConfig {
            mode,
            service,
            ..Default::default()
        };
        cfg.tmtc.apid = APID;
        cfg.tmtc.print_to_file = false;
        cfg
    }

    fn sent_keys(fake: &FakeComInterface) -> Vec<(u8, u8, u16)> {
        fake.sent_tcs()
            .iter()
            .map(|info| (info.service, info.subservice, info.ssc))
            .collect()
    }

    #[test]
    fn test_unit_test_service_selection() {
        assert_eq!(unit_test_services(ServiceSelection::Service(17)), vec![17]);
        assert_eq!(
            unit_test_services(ServiceSelection::Service(3)),
            UNIT_TEST_SERVICES.to_vec()
        );
        assert_eq!(
            unit_test_services(ServiceSelection::Gps0),
            UNIT_TEST_SERVICES.to_vec()
        );
    }

    #[test]
    fn test_single_command() {
        let fake = FakeComInterface::with_verification_replies(APID);
        let cfg = client_config(OperationMode::SingleCommand, ServiceSelection::default());
        let mut handler = TmTcHandler::new(
            cfg,
            shared_com_interface(fake.clone()),
            Arc::new(FastClock::default()),
        )
        .unwrap();
        handler.perform_operation().unwrap();
        handler.shutdown();
        let sent = sent_keys(&fake);
        assert_eq!(sent[0], (17, 1, 1700));
        // The shutdown telecommand is sent last.
        assert_eq!(sent.last(), Some(&(0, 0, 0)));
        assert!(fake.is_closed());
    }

    #[test]
    fn test_service_test_sends_queue_in_order() {
        let fake = FakeComInterface::with_verification_replies(APID);
        let cfg = client_config(OperationMode::ServiceTest, ServiceSelection::Error);
        let mut handler = TmTcHandler::new(
            cfg,
            shared_com_interface(fake.clone()),
            Arc::new(FastClock::default()),
        )
        .unwrap();
        handler.perform_operation().unwrap();
        assert_eq!(sent_keys(&fake), vec![(17, 129, 2010), (17, 130, 2020)]);
        handler.shutdown();
    }

    #[test]
    fn test_stopped_listener_mode_returns() {
        let fake = FakeComInterface::default();
        let cfg = client_config(OperationMode::Listener, ServiceSelection::default());
        let mut handler = TmTcHandler::new(
            cfg,
            shared_com_interface(fake.clone()),
            Arc::new(FastClock::default()),
        )
        .unwrap();
        let exit_handle = handler.exit_handle();
        exit_handle.stop();
        handler.perform_operation().unwrap();
        assert_eq!(fake.num_sent_tcs(), 0);
        exit_handle.exit();
        exit_handle.exit();
        // Only one shutdown telecommand, even with repeated exit calls.
        assert_eq!(fake.num_sent_tcs(), 1);
        assert!(fake.is_closed());
        handler.shutdown();
    }

    fn verification(info: &TcInfo, subservice: u8) -> Vec<u8> {
        let failure = (subservice % 2 == 0).then_some(FailureData {
            error_code: 0x1234,
            param1: 0,
            param2: 0,
        });
        Service1Tm::creator(APID, 0, info, subservice, failure)
            .to_vec()
            .unwrap()
    }

    /// Replies of the target software to the service 17 test.
    fn service17_replies(info: &TcInfo) -> Vec<Vec<u8>> {
        use subservices::*;
        if info.service == 17 && info.subservice == 243 {
            return vec![verification(info, TM_ACCEPTANCE_FAILURE)];
        }
        let mut replies = vec![
            verification(info, TM_ACCEPTANCE_SUCCESS),
            verification(info, TM_START_SUCCESS),
        ];
        match (info.service, info.subservice) {
            (17, 1) => {
                replies.push(PusTmCreator::new(APID, 17, 2, 0, vec![]).to_vec().unwrap());
            }
            (17, 128) => {
                replies.push(PusTmCreator::new(APID, 17, 130, 0, vec![]).to_vec().unwrap());
                let event = Service5Tm {
                    severity: Some(Severity::Info),
                    event_id: 8000,
                    reporter_id: 0x5100_0300,
                    param1: 0,
                    param2: 0,
                };
                replies.push(
                    Service5Tm::creator(APID, 0, Severity::Info, &event)
                        .to_vec()
                        .unwrap(),
                );
            }
            _ => (),
        }
        replies.push(verification(info, TM_COMPLETION_SUCCESS));
        replies
    }

    #[test]
    fn test_service17_unit_test() {
        let _ = env_logger::builder().is_test(true).try_init();
        let fake = FakeComInterface::default();
        fake.set_reply_generator(service17_replies);
        let mut cfg = client_config(OperationMode::UnitTest, ServiceSelection::Service(17));
        cfg.tmtc.tm_timeout = Duration::from_millis(500);
        cfg.tmtc.print_tm = false;
        let handler = TmTcHandler::new(
            cfg,
            shared_com_interface(fake.clone()),
            Arc::new(SystemClock::default()),
        )
        .unwrap();
        let reports = handler.perform_unit_test().unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.counts.tcs, 4);
        assert!(report.is_ok(), "{:?}", report.mismatches());
        handler.shutdown();
    }

    #[test]
    fn test_unit_test_fails_without_events() {
        let fake = FakeComInterface::with_verification_replies(APID);
        let mut cfg = client_config(OperationMode::UnitTest, ServiceSelection::Service(17));
        cfg.tmtc.tm_timeout = Duration::from_millis(500);
        cfg.tmtc.print_tm = false;
        let mut handler = TmTcHandler::new(
            cfg,
            shared_com_interface(fake.clone()),
            Arc::new(SystemClock::default()),
        )
        .unwrap();
        assert!(matches!(
            handler.perform_operation(),
            Err(HandlerError::UnitTestFailed(services)) if services == vec![17]
        ));
        handler.shutdown();
    }
}
