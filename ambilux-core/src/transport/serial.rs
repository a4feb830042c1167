//! Serial transport over a termios character device.
//!
//! The line is put into raw mode: no echo, no canonical editing, no
//! software or hardware flow control, 8 data bits, no parity, 1 stop bit.
//! Reads use `VMIN = 0` and `VTIME = ⌈timeout_ms / 100⌉`, so a read waits
//! at most the timeout and returns zero bytes if nothing arrived.
//!
//! The termios state that was active before `initialize` is kept and put
//! back on `deinitialize` (or when the handle is dropped).
//!
//! # Platform
//!
//! Linux only. On other platforms `initialize` fails.

use std::sync::Mutex;

use tracing::{debug, info};

use crate::error::{AmbiluxError, Result};
use crate::transport::{DeviceTransport, SerialEndpoint, lock};

/// Convert a millisecond timeout to termios `VTIME` tenths, rounding up.
pub fn timeout_to_vtime(timeout_ms: u128) -> u8 {
    timeout_ms.div_ceil(100).min(u8::MAX as u128) as u8
}

// ── SerialTransport ──────────────────────────────────────────────

/// Exclusive, mutex-guarded serial link to the lighting controller.
pub struct SerialTransport {
    endpoint: SerialEndpoint,
    handle: Mutex<Option<platform::SerialHandle>>,
}

impl SerialTransport {
    pub fn new(endpoint: SerialEndpoint) -> Self {
        Self {
            endpoint,
            handle: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &SerialEndpoint {
        &self.endpoint
    }

    /// Bytes waiting in the input queue.
    pub fn bytes_available(&self) -> Result<usize> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        handle.bytes_available()
    }

    /// Discard received but unread bytes.
    pub fn flush_input(&self) -> Result<()> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        handle.flush_input()
    }

    /// Discard written but untransmitted bytes.
    pub fn flush_output(&self) -> Result<()> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        handle.flush_output()
    }
}

impl DeviceTransport for SerialTransport {
    fn initialize(&self) -> Result<()> {
        let mut guard = lock(&self.handle);
        if self.endpoint.path.as_os_str().is_empty() {
            return Err(AmbiluxError::EmptyEndpoint("serial device path"));
        }
        if guard.is_some() {
            return Err(AmbiluxError::AlreadyInitialized);
        }

        let handle = platform::SerialHandle::open(&self.endpoint)?;
        info!(
            "serial link open on {} at {} baud",
            self.endpoint.path.display(),
            self.endpoint.baud_rate
        );
        *guard = Some(handle);
        Ok(())
    }

    fn send(&self, data: &[u8]) -> Result<usize> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        handle.write_all_drained(data)
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let guard = lock(&self.handle);
        let handle = guard.as_ref().ok_or(AmbiluxError::NotInitialized)?;
        handle.read(buf)
    }

    fn deinitialize(&self) -> Result<()> {
        let mut guard = lock(&self.handle);
        let mut handle = guard.take().ok_or(AmbiluxError::NotInitialized)?;
        let restored = handle.restore();
        debug!("serial link on {} closed", self.endpoint.path.display());
        restored
    }

    fn is_initialized(&self) -> bool {
        lock(&self.handle).is_some()
    }

    fn describe(&self) -> String {
        format!(
            "serial {} @ {} baud",
            self.endpoint.path.display(),
            self.endpoint.baud_rate
        )
    }
}

// ── Linux implementation ─────────────────────────────────────────

#[cfg(target_os = "linux")]
mod platform {
    use std::fs::{File, OpenOptions};
    use std::io::{ErrorKind, Read, Write};
    use std::os::fd::{AsFd, AsRawFd};
    use std::os::unix::fs::OpenOptionsExt;

    use nix::errno::Errno;
    use nix::sys::termios::{
        self, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices, Termios,
    };
    use tracing::warn;

    use super::timeout_to_vtime;
    use crate::error::{AmbiluxError, Result};
    use crate::transport::{BaudRate, SerialEndpoint};

    nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);

    fn termios_speed(baud: BaudRate) -> termios::BaudRate {
        match baud {
            BaudRate::B9600 => termios::BaudRate::B9600,
            BaudRate::B19200 => termios::BaudRate::B19200,
            BaudRate::B38400 => termios::BaudRate::B38400,
            BaudRate::B57600 => termios::BaudRate::B57600,
            BaudRate::B115200 => termios::BaudRate::B115200,
            BaudRate::B230400 => termios::BaudRate::B230400,
            BaudRate::B460800 => termios::BaudRate::B460800,
            BaudRate::B921600 => termios::BaudRate::B921600,
        }
    }

    /// Open device plus the line discipline to restore on close.
    pub(super) struct SerialHandle {
        file: File,
        saved: Termios,
        restored: bool,
    }

    impl SerialHandle {
        pub(super) fn open(endpoint: &SerialEndpoint) -> Result<Self> {
            let baud = BaudRate::try_from(endpoint.baud_rate)?;

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .custom_flags(libc::O_NOCTTY)
                .open(&endpoint.path)?;

            let saved = termios::tcgetattr(file.as_fd())?;

            let mut raw = saved.clone();
            termios::cfmakeraw(&mut raw);
            termios::cfsetispeed(&mut raw, termios_speed(baud))?;
            termios::cfsetospeed(&mut raw, termios_speed(baud))?;

            raw.control_flags &= !(ControlFlags::CSIZE
                | ControlFlags::PARENB
                | ControlFlags::CSTOPB
                | ControlFlags::CRTSCTS);
            raw.control_flags |= ControlFlags::CS8 | ControlFlags::CLOCAL | ControlFlags::CREAD;
            raw.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);

            raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
            raw.control_chars[SpecialCharacterIndices::VTIME as usize] =
                timeout_to_vtime(endpoint.timeout.as_millis());

            termios::tcsetattr(file.as_fd(), SetArg::TCSANOW, &raw)?;

            let handle = Self {
                file,
                saved,
                restored: false,
            };
            // On failure `handle` drops here and puts the old termios back.
            handle.flush(FlushArg::TCIOFLUSH)?;
            Ok(handle)
        }

        /// Write every byte, resuming after `EINTR`, then wait for the
        /// output queue to drain.
        pub(super) fn write_all_drained(&self, data: &[u8]) -> Result<usize> {
            let mut writer = &self.file;
            let mut written = 0;
            while written < data.len() {
                match writer.write(&data[written..]) {
                    Ok(0) => {
                        return Err(AmbiluxError::Io(std::io::Error::new(
                            ErrorKind::WriteZero,
                            "serial device accepted no bytes",
                        )));
                    }
                    Ok(n) => written += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            loop {
                match termios::tcdrain(self.file.as_fd()) {
                    Ok(()) => break,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(written)
        }

        /// One read, resuming after `EINTR`. `Ok(0)` means the timeout
        /// elapsed with no data.
        pub(super) fn read(&self, buf: &mut [u8]) -> Result<usize> {
            let mut reader = &self.file;
            loop {
                match reader.read(buf) {
                    Ok(n) => return Ok(n),
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        pub(super) fn bytes_available(&self) -> Result<usize> {
            let mut count: libc::c_int = 0;
            // SAFETY: FIONREAD writes a single c_int through the pointer,
            // which is valid for the duration of the call.
            unsafe { fionread(self.file.as_raw_fd(), &mut count) }?;
            Ok(count.max(0) as usize)
        }

        pub(super) fn flush_input(&self) -> Result<()> {
            self.flush(FlushArg::TCIFLUSH)
        }

        pub(super) fn flush_output(&self) -> Result<()> {
            self.flush(FlushArg::TCOFLUSH)
        }

        fn flush(&self, queue: FlushArg) -> Result<()> {
            termios::tcflush(self.file.as_fd(), queue)?;
            Ok(())
        }

        /// Put back the termios captured at open time.
        pub(super) fn restore(&mut self) -> Result<()> {
            termios::tcsetattr(self.file.as_fd(), SetArg::TCSANOW, &self.saved)?;
            self.restored = true;
            Ok(())
        }
    }

    impl Drop for SerialHandle {
        fn drop(&mut self) {
            if !self.restored
                && let Err(e) = self.restore()
            {
                warn!("failed to restore serial line settings: {e}");
            }
        }
    }
}

// ── Non-Linux stub ───────────────────────────────────────────────

#[cfg(not(target_os = "linux"))]
mod platform {
    use crate::error::{AmbiluxError, Result};
    use crate::transport::{BaudRate, SerialEndpoint};

    pub(super) struct SerialHandle;

    fn unsupported() -> AmbiluxError {
        AmbiluxError::InvalidConfig("serial transport is only available on Linux".into())
    }

    impl SerialHandle {
        pub(super) fn open(endpoint: &SerialEndpoint) -> Result<Self> {
            BaudRate::try_from(endpoint.baud_rate)?;
            Err(unsupported())
        }

        pub(super) fn write_all_drained(&self, _data: &[u8]) -> Result<usize> {
            Err(unsupported())
        }

        pub(super) fn read(&self, _buf: &mut [u8]) -> Result<usize> {
            Err(unsupported())
        }

        pub(super) fn bytes_available(&self) -> Result<usize> {
            Err(unsupported())
        }

        pub(super) fn flush_input(&self) -> Result<()> {
            Err(unsupported())
        }

        pub(super) fn flush_output(&self) -> Result<()> {
            Err(unsupported())
        }

        pub(super) fn restore(&mut self) -> Result<()> {
            Ok(())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn endpoint(path: &str, baud_rate: u32) -> SerialEndpoint {
        SerialEndpoint {
            path: path.into(),
            baud_rate,
            timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn vtime_rounds_up_to_tenths() {
        assert_eq!(timeout_to_vtime(0), 0);
        assert_eq!(timeout_to_vtime(1), 1);
        assert_eq!(timeout_to_vtime(50), 1);
        assert_eq!(timeout_to_vtime(100), 1);
        assert_eq!(timeout_to_vtime(101), 2);
        assert_eq!(timeout_to_vtime(1000), 10);
        assert_eq!(timeout_to_vtime(60_000), 255);
    }

    #[test]
    fn send_before_initialize_fails() {
        let t = SerialTransport::new(endpoint("/dev/null", 9600));
        assert!(matches!(t.send(&[1, 2, 3]), Err(AmbiluxError::NotInitialized)));
        let mut buf = [0u8; 4];
        assert!(matches!(t.receive(&mut buf), Err(AmbiluxError::NotInitialized)));
        assert!(matches!(t.deinitialize(), Err(AmbiluxError::NotInitialized)));
        assert!(matches!(t.bytes_available(), Err(AmbiluxError::NotInitialized)));
    }

    #[test]
    fn empty_path_is_rejected() {
        let t = SerialTransport::new(endpoint("", 9600));
        let err = t.initialize().unwrap_err();
        assert!(matches!(err, AmbiluxError::EmptyEndpoint(_)));
        assert!(!t.is_initialized());
    }

    #[test]
    fn unsupported_baud_rate_fails_initialization() {
        let t = SerialTransport::new(endpoint("/dev/null", 123_456));
        let err = t.initialize().unwrap_err();
        assert!(matches!(err, AmbiluxError::UnsupportedBaudRate(123_456)));
        assert!(!t.is_initialized());
    }

    #[test]
    fn missing_device_is_io_error() {
        let t = SerialTransport::new(endpoint("/dev/ambilux-does-not-exist", 115_200));
        let err = t.initialize().unwrap_err();
        assert!(!err.is_configuration());
        assert!(!t.is_initialized());
    }

    #[cfg(target_os = "linux")]
    mod pty {
        use std::fs::File;
        use std::io::Read;
        use std::os::fd::{AsRawFd, OwnedFd};
        use std::path::PathBuf;

        use nix::pty::openpty;

        use super::*;

        /// Open a pseudo-terminal; returns the controller side and the
        /// path of the device side.
        fn pty_pair() -> (File, OwnedFd, PathBuf) {
            let pty = openpty(None, None).unwrap();
            let path =
                std::fs::read_link(format!("/proc/self/fd/{}", pty.slave.as_raw_fd())).unwrap();
            (File::from(pty.master), pty.slave, path)
        }

        #[test]
        fn double_initialize_fails() {
            let (_master, _slave, path) = pty_pair();
            let t = SerialTransport::new(SerialEndpoint {
                path,
                baud_rate: 115_200,
                timeout: Duration::from_millis(100),
            });
            t.initialize().unwrap();
            assert!(matches!(t.initialize(), Err(AmbiluxError::AlreadyInitialized)));
            assert!(t.is_initialized());
            t.deinitialize().unwrap();
            assert!(!t.is_initialized());
        }

        #[test]
        fn send_reaches_the_other_side() {
            let (mut master, _slave, path) = pty_pair();
            let t = SerialTransport::new(SerialEndpoint {
                path,
                baud_rate: 921_600,
                timeout: Duration::from_millis(100),
            });
            t.initialize().unwrap();

            let packet = [0xFF, 0xAA, 150, 0, 0x0A, 0x0D];
            assert_eq!(t.send(&packet).unwrap(), packet.len());

            let mut got = [0u8; 6];
            master.read_exact(&mut got).unwrap();
            assert_eq!(got, packet);

            t.deinitialize().unwrap();
        }

        #[test]
        fn receive_times_out_with_zero_bytes() {
            let (_master, _slave, path) = pty_pair();
            let t = SerialTransport::new(SerialEndpoint {
                path,
                baud_rate: 9_600,
                timeout: Duration::from_millis(100),
            });
            t.initialize().unwrap();
            let mut buf = [0u8; 8];
            assert_eq!(t.receive(&mut buf).unwrap(), 0);
            assert_eq!(t.bytes_available().unwrap(), 0);
            t.flush_input().unwrap();
            t.flush_output().unwrap();
            t.deinitialize().unwrap();
        }

        #[test]
        fn concurrent_sends_never_interleave() {
            use std::sync::Arc;
            use std::thread;

            const SENDERS: u8 = 4;
            const PER_SENDER: usize = 20;
            const LEN: usize = 16;

            let (mut master, _slave, path) = pty_pair();
            let t = Arc::new(SerialTransport::new(SerialEndpoint {
                path,
                baud_rate: 921_600,
                timeout: Duration::from_millis(100),
            }));
            t.initialize().unwrap();

            let senders: Vec<_> = (0..SENDERS)
                .map(|tag| {
                    let t = Arc::clone(&t);
                    thread::spawn(move || {
                        for _ in 0..PER_SENDER {
                            assert_eq!(t.send(&[tag; LEN]).unwrap(), LEN);
                        }
                    })
                })
                .collect();
            for h in senders {
                h.join().unwrap();
            }

            let mut got = vec![0u8; SENDERS as usize * PER_SENDER * LEN];
            master.read_exact(&mut got).unwrap();
            for chunk in got.chunks_exact(LEN) {
                assert!(chunk.iter().all(|&b| b == chunk[0]), "{chunk:?}");
            }
            for tag in 0..SENDERS {
                let count = got.chunks_exact(LEN).filter(|c| c[0] == tag).count();
                assert_eq!(count, PER_SENDER);
            }

            t.deinitialize().unwrap();
            assert!(matches!(t.send(&[0u8; LEN]), Err(AmbiluxError::NotInitialized)));
        }

        #[test]
        fn deinitialize_restores_line_discipline() {
            let (_master, slave, path) = pty_pair();
            let before = nix::sys::termios::tcgetattr(&slave).unwrap();

            let t = SerialTransport::new(SerialEndpoint {
                path,
                baud_rate: 57_600,
                timeout: Duration::from_millis(200),
            });
            t.initialize().unwrap();
            let during = nix::sys::termios::tcgetattr(&slave).unwrap();
            assert_ne!(before.local_flags, during.local_flags);

            t.deinitialize().unwrap();
            let after = nix::sys::termios::tcgetattr(&slave).unwrap();
            assert_eq!(before.local_flags, after.local_flags);
            assert_eq!(before.input_flags, after.input_flags);
            assert_eq!(before.control_flags, after.control_flags);
        }
    }
}
