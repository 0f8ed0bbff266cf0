//! UDP communication interface.
use crate::config::UDP_RECV_BUF_LEN;
use pus_tmtc::com_if::{ComIfError, CommunicationInterface, TmPacketList};
use pus_tmtc::tc::TcInfo;
use pus_tmtc::tm::PusTmReader;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

/// Sends telecommands as single datagrams to the board and receives one telemetry packet per
/// datagram on the bound client address.
pub struct UdpComIf {
    socket: UdpSocket,
    board_addr: SocketAddr,
    recv_buf: Vec<u8>,
    closed: bool,
}

impl UdpComIf {
    pub fn new<A: ToSocketAddrs>(receive_addr: A, board_addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(receive_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            board_addr,
            recv_buf: vec![0; UDP_RECV_BUF_LEN],
            closed: false,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// A zero timeout results in a non-blocking check.
    fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        if timeout.is_zero() {
            self.socket.set_nonblocking(true)
        } else {
            self.socket.set_nonblocking(false)?;
            self.socket.set_read_timeout(Some(timeout))
        }
    }

    fn try_recv(&mut self) -> Result<Option<usize>, ComIfError> {
        match self.socket.recv_from(&mut self.recv_buf) {
            Ok((num_bytes, _)) => Ok(Some(num_bytes)),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check_open(&self) -> Result<(), ComIfError> {
        if self.closed {
            return Err(ComIfError::Closed);
        }
        Ok(())
    }
}

impl CommunicationInterface for UdpComIf {
    fn send_telecommand(&mut self, tc_raw: &[u8], _tc_info: &TcInfo) -> Result<(), ComIfError> {
        self.send_data(tc_raw)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), ComIfError> {
        self.check_open()?;
        self.socket.send_to(data, self.board_addr)?;
        Ok(())
    }

    fn poll_interface(&mut self, timeout: Duration) -> Result<(bool, TmPacketList), ComIfError> {
        self.check_open()?;
        self.set_timeout(timeout)?;
        let mut packets = TmPacketList::new();
        let Some(num_bytes) = self.try_recv()? else {
            return Ok((false, packets));
        };
        packets.push(PusTmReader::decode_lenient(&self.recv_buf[..num_bytes]));
        // Drain everything else which already arrived.
        self.socket.set_nonblocking(true)?;
        while let Some(num_bytes) = self.try_recv()? {
            packets.push(PusTmReader::decode_lenient(&self.recv_buf[..num_bytes]));
        }
        Ok((true, packets))
    }

    fn data_available(&mut self, timeout: Duration) -> Result<bool, ComIfError> {
        self.check_open()?;
        self.set_timeout(timeout)?;
        match self.socket.peek_from(&mut self.recv_buf) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) -> Result<(), ComIfError> {
        self.closed = true;
        Ok(())
    }
}
