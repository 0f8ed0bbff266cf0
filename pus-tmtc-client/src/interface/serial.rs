//! Serial communication interface using fixed size telemetry frames.
use crate::config::{SERIAL_FRAME_SIZE, SERIAL_TIMEOUT};
use pus_tmtc::com_if::{ComIfError, CommunicationInterface, TmPacketList};
use pus_tmtc::frame::parse_fixed_frame;
use pus_tmtc::tc::TcInfo;
use serialport::SerialPort;
use std::io::{self, ErrorKind, Read, Write};
use std::time::{Duration, Instant};

const AVAILABILITY_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Byte stream of a serial link.
pub trait SerialLink: Read + Write + Send {
    fn bytes_to_read(&self) -> io::Result<u32>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(SerialPort::bytes_to_read(&**self)?)
    }
}

pub fn open_serial_port(port_name: &str, baud_rate: u32) -> io::Result<Box<dyn SerialPort>> {
    Ok(serialport::new(port_name, baud_rate)
        .timeout(SERIAL_TIMEOUT)
        .open()?)
}

/// The on-board software sends telemetry in frames of [SERIAL_FRAME_SIZE] bytes which contain
/// back to back packets followed by zero fill bytes. Telecommands are written as they are.
pub struct SerialComIf<L: SerialLink> {
    link: L,
    frame_size: usize,
    frame_buf: Vec<u8>,
    closed: bool,
}

impl SerialComIf<Box<dyn SerialPort>> {
    pub fn open(port_name: &str, baud_rate: u32) -> io::Result<Self> {
        log::info!("opening serial port {port_name} with baud rate {baud_rate}");
        Ok(Self::new(open_serial_port(port_name, baud_rate)?))
    }
}

impl<L: SerialLink> SerialComIf<L> {
    pub fn new(link: L) -> Self {
        Self::with_frame_size(link, SERIAL_FRAME_SIZE)
    }

    pub fn with_frame_size(link: L, frame_size: usize) -> Self {
        Self {
            link,
            frame_size,
            frame_buf: vec![0; frame_size],
            closed: false,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Read one frame. A frame which is cut short by the read timeout is still parsed.
    fn read_frame(&mut self) -> Result<usize, ComIfError> {
        let mut read_len = 0;
        while read_len < self.frame_size {
            match self.link.read(&mut self.frame_buf[read_len..]) {
                Ok(0) => break,
                Ok(num_bytes) => read_len += num_bytes,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    log::warn!(
                        "serial frame incomplete, read {read_len} of {} bytes",
                        self.frame_size
                    );
                    break;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(read_len)
    }

    fn check_open(&self) -> Result<(), ComIfError> {
        if self.closed {
            return Err(ComIfError::Closed);
        }
        Ok(())
    }
}

impl<L: SerialLink> CommunicationInterface for SerialComIf<L> {
    fn send_telecommand(&mut self, tc_raw: &[u8], _tc_info: &TcInfo) -> Result<(), ComIfError> {
        self.send_data(tc_raw)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), ComIfError> {
        self.check_open()?;
        self.link.write_all(data)?;
        self.link.flush()?;
        Ok(())
    }

    fn poll_interface(&mut self, timeout: Duration) -> Result<(bool, TmPacketList), ComIfError> {
        if !self.data_available(timeout)? {
            return Ok((false, TmPacketList::new()));
        }
        let read_len = self.read_frame()?;
        Ok((true, parse_fixed_frame(&self.frame_buf[..read_len])))
    }

    fn data_available(&mut self, timeout: Duration) -> Result<bool, ComIfError> {
        self.check_open()?;
        let start = Instant::now();
        loop {
            if self.link.bytes_to_read()? > 0 {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            std::thread::sleep(AVAILABILITY_POLL_PERIOD);
        }
    }

    fn close(&mut self) -> Result<(), ComIfError> {
        // The port itself is closed when the interface is dropped.
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pus_tmtc::ecss::PusPacket;
    use pus_tmtc::tc::PusTcCreator;
    use pus_tmtc::tm::PusTmCreator;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct LoopbackLink {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl Read for LoopbackLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.rx.is_empty() {
                return Err(io::Error::new(ErrorKind::TimedOut, "serial read timeout"));
            }
            let num_bytes = buf.len().min(self.rx.len());
            for (idx, byte) in self.rx.drain(..num_bytes).enumerate() {
                buf[idx] = byte;
            }
            Ok(num_bytes)
        }
    }

    impl Write for LoopbackLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SerialLink for LoopbackLink {
        fn bytes_to_read(&self) -> io::Result<u32> {
            Ok(self.rx.len() as u32)
        }
    }

    fn tm_frame(num_packets: u16) -> Vec<u8> {
        let mut frame = Vec::new();
        for ssc in 0..num_packets {
            frame.extend(
                PusTmCreator::new(0x73, 1, 7, ssc, vec![0x18, 0x73, 0xc0, 0x00])
                    .to_vec()
                    .unwrap(),
            );
        }
        frame.resize(SERIAL_FRAME_SIZE, 0);
        frame
    }

    #[test]
    fn test_send_raw_telecommand() {
        let mut com_if = SerialComIf::new(LoopbackLink::default());
        let tc = PusTcCreator::new(0x73, 17, 1, 0, &[])
            .unwrap()
            .pack()
            .unwrap();
        com_if.send_telecommand(&tc.raw, &tc.info).unwrap();
        assert_eq!(com_if.link().tx, tc.raw);
    }

    #[test]
    fn test_poll_fixed_frames() {
        let mut link = LoopbackLink::default();
        link.rx.extend(tm_frame(3));
        link.rx.extend(tm_frame(1));
        let mut com_if = SerialComIf::new(link);
        let (received, packets) = com_if.poll_interface(Duration::ZERO).unwrap();
        assert!(received);
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|tm| tm.is_valid() && tm.subservice() == 7));
        let (received, packets) = com_if.poll_interface(Duration::ZERO).unwrap();
        assert!(received);
        assert_eq!(packets.len(), 1);
        let (received, packets) = com_if.poll_interface(Duration::from_millis(5)).unwrap();
        assert!(!received);
        assert!(packets.is_empty());
    }

    #[test]
    fn test_incomplete_frame() {
        let mut link = LoopbackLink::default();
        link.rx.extend(&tm_frame(1)[..40]);
        let mut com_if = SerialComIf::new(link);
        let (received, packets) = com_if.poll_interface(Duration::ZERO).unwrap();
        assert!(received);
        assert_eq!(packets.len(), 1);
    }
}
