//! Serial device listen loop.
//!
//! Reads newline-terminated records from the shared [`Transport`],
//! decodes each into its device word, and forwards the word to a
//! dispatch sink. "No device open" is an expected operating state,
//! not a fault: the loop keeps polling at a configured interval and
//! stays responsive to its lifecycle flag throughout.

use std::io::ErrorKind;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::command;
use crate::config::SerialConfig;
use crate::dispatch::EventSink;
use crate::lifecycle::LifecycleFlag;
use crate::transport::{Transport, TransportError};

/// Worker that drains device output lines.
pub struct DeviceListener {
    transport: Arc<Transport>,
    sink: EventSink<i32>,
    poll_interval: Duration,
}

impl DeviceListener {
    pub fn new(transport: Arc<Transport>, sink: EventSink<i32>, config: &SerialConfig) -> Self {
        Self {
            transport,
            sink,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Listen loop. The transport's read timeout and the idle poll
    /// interval are the polling points for the flag. Marks the flag
    /// `Stopped` on exit.
    pub fn run(self, flag: LifecycleFlag) {
        info!("listening to serial device output");

        while flag.is_running() {
            match self.transport.read_line() {
                Ok(line) if line.is_empty() => {
                    // End of stream; wait for more output.
                    thread::sleep(self.poll_interval);
                }
                Ok(line) => match command::unpack_device_word(&line) {
                    Ok(word) => {
                        debug!("device word {word}");
                        self.sink.emit(word);
                    }
                    Err(e) => debug!("discarding device line: {e}"),
                },
                Err(TransportError::NotOpen) => {
                    // Hardware not attached; keep polling.
                    thread::sleep(self.poll_interval);
                }
                Err(TransportError::Io(ref e)) if e.kind() == ErrorKind::TimedOut => {
                    // Quiet device; fall through to the flag check.
                }
                Err(e) => {
                    warn!("serial read error: {e}");
                    thread::sleep(self.poll_interval);
                }
            }
        }

        flag.mark_stopped();
        info!("device listener stopped");
    }

    /// Runs the listen loop on its own named thread.
    pub fn spawn(self, flag: LifecycleFlag) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("serial-listener".into())
            .spawn(move || self.run(flag))
            .expect("failed to spawn device listener thread")
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchQueue;
    use std::io::{self, Cursor, Read, Write};
    use std::sync::Mutex;

    fn listener_config() -> SerialConfig {
        SerialConfig {
            poll_interval_ms: 5,
            ..SerialConfig::default()
        }
    }

    /// Device double that replays scripted output, then reports end
    /// of stream forever.
    struct ScriptedDevice(Cursor<Vec<u8>>);

    impl Read for ScriptedDevice {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }
    impl Write for ScriptedDevice {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn start(
        transport: Arc<Transport>,
    ) -> (LifecycleFlag, Arc<Mutex<Vec<i32>>>, thread::JoinHandle<()>) {
        let queue = DispatchQueue::bounded("device", 64);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let sink = queue.sink(move |w: i32| record.lock().unwrap().push(w));

        let dispatch_flag = LifecycleFlag::new();
        let _dispatch_handle = queue
            .into_loop(dispatch_flag, Duration::from_millis(10))
            .spawn("device-dispatch");

        let flag = LifecycleFlag::new();
        let handle =
            DeviceListener::new(transport, sink, &listener_config()).spawn(flag.clone());
        (flag, seen, handle)
    }

    #[test]
    fn decodes_and_forwards_device_words() {
        let transport = Arc::new(Transport::new(&SerialConfig::default()));
        let script = b"\x02\x00\x00\x00\n\xff\xff\xff\xff\nxx\n\x03\x00\x00\x00\n".to_vec();
        transport.open_with(Box::new(ScriptedDevice(Cursor::new(script))), "mock0");

        let (flag, seen, handle) = start(transport);
        thread::sleep(Duration::from_millis(150));
        flag.request_stop();
        assert!(flag.wait_stopped(Duration::from_secs(1)));
        handle.join().unwrap();

        // The malformed "xx" line is dropped, everything else arrives
        // in order.
        assert_eq!(*seen.lock().unwrap(), vec![2, -1, 3]);
    }

    #[test]
    fn survives_closed_transport_and_stops_cleanly() {
        let transport = Arc::new(Transport::new(&SerialConfig::default()));
        let (flag, seen, handle) = start(transport);

        thread::sleep(Duration::from_millis(50));
        flag.request_stop();
        assert!(flag.wait_stopped(Duration::from_secs(1)));
        handle.join().unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn picks_up_device_opened_mid_run() {
        let transport = Arc::new(Transport::new(&SerialConfig::default()));
        let (flag, seen, handle) = start(transport.clone());

        // Starts closed; listener polls NotOpen for a while.
        thread::sleep(Duration::from_millis(30));
        let script = b"\x01\x00\x00\x00\n".to_vec();
        transport.open_with(Box::new(ScriptedDevice(Cursor::new(script))), "mock0");

        thread::sleep(Duration::from_millis(100));
        flag.request_stop();
        assert!(flag.wait_stopped(Duration::from_secs(1)));
        handle.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}
