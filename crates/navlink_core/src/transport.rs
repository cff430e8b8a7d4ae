//! Exclusive-access serial transport.
//!
//! At most one device is open at a time and every read or write goes
//! through one transport-wide lock: an in-progress read blocks a
//! concurrent write and vice versa, so bytes of two operations never
//! interleave on the wire. Closing is idempotent, and writing with no
//! device open is a logged no-op: commands issued with no hardware
//! attached are dropped, not queued.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SerialConfig;

/// Byte-stream interface of an open device. Real devices are
/// `serialport` handles; tests substitute in-memory doubles.
pub trait DeviceIo: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> DeviceIo for T {}

/// Transport errors. `NotOpen` on a read means "nothing to read", not
/// a fault: the hardware simply is not attached.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no device is open")]
    NotOpen,

    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        source: serialport::Error,
    },

    #[error("device i/o error: {0}")]
    Io(#[from] std::io::Error),
}

struct OpenDevice {
    name: String,
    io: BufReader<Box<dyn DeviceIo>>,
    /// Bytes of an in-progress record that have arrived before its
    /// newline. Survives read timeouts, so a record split across
    /// timeout windows is not lost.
    pending: Vec<u8>,
}

/// Owner of the one currently open serial device.
///
/// `Closed → Open(device) → Closed`; opening over an already open
/// device closes the old one first, so two devices are never open
/// simultaneously.
pub struct Transport {
    current: Mutex<Option<OpenDevice>>,
    baud_rate: u32,
    read_timeout: Duration,
}

impl Transport {
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            current: Mutex::new(None),
            baud_rate: config.baud_rate,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }

    /// Serial devices currently visible to the OS, in driver order,
    /// plus the trailing `None` sentinel meaning "no device".
    pub fn list_available() -> Vec<Option<String>> {
        let mut devices: Vec<Option<String>> = match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| Some(p.port_name)).collect(),
            Err(e) => {
                warn!("could not enumerate serial ports: {e}");
                Vec::new()
            }
        };
        devices.push(None);
        devices
    }

    /// Opens `device`, closing any currently open one first. `None`
    /// selects the "no device" sentinel and leaves the transport
    /// closed.
    pub fn open(&self, device: Option<&str>) -> Result<(), TransportError> {
        let mut current = self.lock();
        close_current(&mut current);

        if let Some(name) = device {
            let port = serialport::new(name, self.baud_rate)
                .timeout(self.read_timeout)
                .open()
                .map_err(|source| TransportError::Open {
                    device: name.to_string(),
                    source,
                })?;
            debug!("opened serial device {name}");
            let io: Box<dyn DeviceIo> = Box::new(port);
            *current = Some(OpenDevice {
                name: name.to_string(),
                io: BufReader::new(io),
                pending: Vec::new(),
            });
        }
        Ok(())
    }

    /// Installs an already-open byte stream as the current device.
    /// Injection seam for tests and simulated hardware; same
    /// close-before-open behavior as [`Transport::open`].
    pub fn open_with(&self, io: Box<dyn DeviceIo>, name: &str) {
        let mut current = self.lock();
        close_current(&mut current);
        debug!("installed device {name}");
        *current = Some(OpenDevice {
            name: name.to_string(),
            io: BufReader::new(io),
            pending: Vec::new(),
        });
    }

    /// Idempotent close; a no-op when nothing is open.
    pub fn close(&self) {
        close_current(&mut self.lock());
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Name of the currently open device, if any.
    pub fn current_device(&self) -> Option<String> {
        self.lock().as_ref().map(|open| open.name.clone())
    }

    /// Blocking read of one newline-terminated record. Holds the
    /// transport lock for the whole read; the device's read timeout
    /// bounds the block. Bytes of a record that arrive before a
    /// timeout are kept and joined with the remainder on the next
    /// call, so slow devices do not lose data. Returns an empty
    /// buffer at end of stream.
    pub fn read_line(&self) -> Result<Vec<u8>, TransportError> {
        let mut current = self.lock();
        let open = current.as_mut().ok_or(TransportError::NotOpen)?;

        // read_until appends everything it consumed even when it
        // fails, so a timeout mid-record leaves the prefix parked in
        // `pending` for the next attempt.
        open.io.read_until(b'\n', &mut open.pending)?;
        if open.pending.last() == Some(&b'\n') {
            Ok(std::mem::take(&mut open.pending))
        } else {
            // End of stream before the newline; keep what arrived.
            Ok(Vec::new())
        }
    }

    /// Blocking write of `bytes` as one uninterrupted unit. With no
    /// device open the write is dropped and logged, by policy.
    pub fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut current = self.lock();
        match current.as_mut() {
            Some(open) => {
                open.io.get_mut().write_all(bytes)?;
                open.io.get_mut().flush()?;
                Ok(())
            }
            None => {
                debug!("no device open, dropping {}-byte write", bytes.len());
                Ok(())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<OpenDevice>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn close_current(current: &mut Option<OpenDevice>) {
    if let Some(open) = current.take() {
        debug!("closing serial device {}", open.name);
        // Dropping the handle releases the OS device.
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
