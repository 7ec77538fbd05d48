//! Byte transport under the VESC driver.
//!
//! [`SerialTransport`] opens a tty in raw mode through `nix::sys::termios`
//! and waits for input with `poll(2)`, so every receive is bounded by the
//! link timeout.

use halo_common::hal::driver::HalError;
use nix::fcntl::OFlag;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, BaudRate, FlushArg, SetArg};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Bidirectional byte link to the motor controller.
pub trait Transport: Send {
    /// Write all bytes.
    fn send(&mut self, bytes: &[u8]) -> Result<(), HalError>;

    /// Read whatever is available, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, HalError>;

    /// Drop received bytes that have not been read yet.
    fn flush_input(&mut self) -> Result<(), HalError>;
}

/// Raw-mode serial port.
pub struct SerialTransport {
    file: File,
}

impl SerialTransport {
    /// Open `path` at `baud`, 8N1, raw.
    pub fn open(path: &Path, baud: u32) -> Result<Self, HalError> {
        let rate = baud_rate(baud)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(path)
            .map_err(|e| HalError::InitFailed(format!("{}: {e}", path.display())))?;

        let mut tio = termios::tcgetattr(&file)
            .map_err(|e| HalError::InitFailed(format!("tcgetattr: {e}")))?;
        termios::cfmakeraw(&mut tio);
        termios::cfsetspeed(&mut tio, rate)
            .map_err(|e| HalError::InitFailed(format!("cfsetspeed: {e}")))?;
        termios::tcsetattr(&file, SetArg::TCSANOW, &tio)
            .map_err(|e| HalError::InitFailed(format!("tcsetattr: {e}")))?;

        debug!(port = %path.display(), baud, "Serial port configured");
        Ok(Self { file })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), HalError> {
        self.file
            .write_all(bytes)
            .map_err(|e| HalError::CommunicationError(format!("write: {e}")))
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, HalError> {
        let ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let ready = {
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(ms))
                .map_err(|e| HalError::CommunicationError(format!("poll: {e}")))?
        };
        if ready == 0 {
            return Ok(0);
        }
        self.file
            .read(buf)
            .map_err(|e| HalError::CommunicationError(format!("read: {e}")))
    }

    fn flush_input(&mut self) -> Result<(), HalError> {
        termios::tcflush(&self.file, FlushArg::TCIFLUSH)
            .map_err(|e| HalError::CommunicationError(format!("tcflush: {e}")))
    }
}

fn baud_rate(baud: u32) -> Result<BaudRate, HalError> {
    Ok(match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        460_800 => BaudRate::B460800,
        921_600 => BaudRate::B921600,
        other => {
            return Err(HalError::ConfigError(format!(
                "unsupported baud rate {other}"
            )));
        }
    })
}
