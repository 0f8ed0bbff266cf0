//! Transport abstraction consumed by the listener and the sender/receiver family.
use crate::config::LOCK_TIMEOUT;
use crate::ecss::PusError;
use crate::tc::TcInfo;
use crate::tm::PusTmReader;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

/// Packets received in one poll of the communication interface.
pub type TmPacketList = Vec<PusTmReader>;

#[derive(Debug, thiserror::Error)]
pub enum ComIfError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("PUS error: {0}")]
    Pus(#[from] PusError),
    #[error("communication interface is closed")]
    Closed,
}

/// Capability contract for the transports (serial, UDP, loopback).
///
/// All calls are synchronous. [CommunicationInterface::poll_interface] and
/// [CommunicationInterface::data_available] must not block for longer than the passed
/// timeout. A zero timeout means a non-blocking check.
pub trait CommunicationInterface: Send {
    fn send_telecommand(&mut self, tc_raw: &[u8], tc_info: &TcInfo) -> Result<(), ComIfError>;

    fn send_data(&mut self, data: &[u8]) -> Result<(), ComIfError>;

    /// Returns whether anything was received and all packets which are currently available.
    fn poll_interface(&mut self, timeout: Duration) -> Result<(bool, TmPacketList), ComIfError>;

    fn receive_telemetry(&mut self) -> Result<TmPacketList, ComIfError> {
        let (_, packets) = self.poll_interface(Duration::ZERO)?;
        Ok(packets)
    }

    fn data_available(&mut self, timeout: Duration) -> Result<bool, ComIfError>;

    fn close(&mut self) -> Result<(), ComIfError>;
}

/// The communication interface is shared between the listener thread and the sender.
pub type SharedComInterface = Arc<Mutex<Box<dyn CommunicationInterface>>>;

pub fn shared_com_interface(com_if: impl CommunicationInterface + 'static) -> SharedComInterface {
    let boxed: Box<dyn CommunicationInterface> = Box::new(com_if);
    Arc::new(Mutex::new(boxed))
}

/// Acquire a lock with a bounded wait. If the lock can not be acquired within
/// [LOCK_TIMEOUT], an error is logged and the call blocks until the lock is free.
/// A poisoned lock is recovered because the guarded data stays consistent between calls.
pub fn lock_bounded<'a, T: ?Sized>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    let start = Instant::now();
    loop {
        match mutex.try_lock() {
            Ok(guard) => return guard,
            Err(TryLockError::Poisoned(poisoned)) => {
                log::warn!("{name} lock was poisoned, recovering");
                return poisoned.into_inner();
            }
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= LOCK_TIMEOUT {
                    log::error!(
                        "blocked on {name} lock acquisition for longer than {LOCK_TIMEOUT:?}"
                    );
                    return mutex.lock().unwrap_or_else(PoisonError::into_inner);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lock_bounded_waits_for_holder() {
        let shared = Arc::new(Mutex::new(0_u32));
        let shared_clone = shared.clone();
        let guard = lock_bounded(&shared, "test");
        let jh = thread::spawn(move || {
            *lock_bounded(&shared_clone, "test") += 1;
        });
        thread::sleep(Duration::from_millis(20));
        drop(guard);
        jh.join().unwrap();
        assert_eq!(*lock_bounded(&shared, "test"), 1);
    }

    #[test]
    fn test_lock_bounded_poisoned() {
        let shared = Arc::new(Mutex::new(5_u32));
        let shared_clone = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = shared_clone.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(shared.is_poisoned());
        assert_eq!(*lock_bounded(&shared, "test"), 5);
    }
}
