//! UDP telemetry receive loop.
//!
//! Binds one socket with a bounded read timeout, decodes each
//! datagram through the packet codec, and forwards accepted packets
//! to two independent sinks: the control sink gets every valid packet
//! unconditionally, the UI sink is throttled to one packet per
//! configured refresh period. Invalid datagrams are logged and
//! dropped at this boundary; nothing downstream ever sees one.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::TelemetryConfig;
use crate::dispatch::EventSink;
use crate::lifecycle::LifecycleFlag;
use crate::packet::{self, NavPacket};

/// Worker that owns the telemetry socket.
pub struct TelemetryReceiver {
    socket: UdpSocket,
    ui_sink: EventSink<NavPacket>,
    control_sink: EventSink<NavPacket>,
    ui_refresh: Duration,
}

impl TelemetryReceiver {
    /// Binds the telemetry socket per `config`. Port 0 asks the OS
    /// for an ephemeral port; [`TelemetryReceiver::local_addr`] tells
    /// which one (used by tests).
    pub fn bind(
        config: &TelemetryConfig,
        ui_sink: EventSink<NavPacket>,
        control_sink: EventSink<NavPacket>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((config.host.as_str(), config.port))?;
        socket.set_read_timeout(Some(Duration::from_secs_f64(config.socket_timeout_secs)))?;

        Ok(Self {
            socket,
            ui_sink,
            control_sink,
            ui_refresh: Duration::from_secs_f64(config.ui_refresh_secs),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive loop. Runs until `flag` leaves `Running`; the socket
    /// timeout is the polling point, so shutdown latency is bounded
    /// by one timeout even with no traffic. Marks the flag `Stopped`
    /// on exit.
    pub fn run(self, flag: LifecycleFlag) {
        info!(
            "listening for telemetry on {}",
            self.socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".into())
        );

        // Oversized datagrams land truncated and fail the layout check.
        let mut buf = [0u8; 256];
        let mut last_ui_emit: Option<Instant> = None;

        while flag.is_running() {
            match self.socket.recv_from(&mut buf) {
                Ok((len, source)) => match packet::decode(&buf[..len]) {
                    Ok(packet) => {
                        // Control gets every packet; the UI only one
                        // per refresh period. The two cadences are
                        // independent timers.
                        self.control_sink.emit(packet.clone());
                        if last_ui_emit.is_none_or(|t| t.elapsed() >= self.ui_refresh) {
                            self.ui_sink.emit(packet);
                            last_ui_emit = Some(Instant::now());
                        }
                    }
                    Err(e) => {
                        debug!("discarding {len}-byte datagram from {source}: {e}");
                    }
                },
                Err(ref e)
                    if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock =>
                {
                    // Normal timeout: fall through to the flag check.
                }
                Err(e) => {
                    warn!("udp receive error: {e}");
                }
            }
        }

        flag.mark_stopped();
        info!("telemetry receiver stopped");
    }

    /// Runs the receive loop on its own named thread.
    pub fn spawn(self, flag: LifecycleFlag) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("udp-receiver".into())
            .spawn(move || self.run(flag))
            .expect("failed to spawn telemetry receiver thread")
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchQueue;
    use crate::packet::encode;
    use std::sync::{Arc, Mutex};

    fn test_config(ui_refresh_secs: f64) -> TelemetryConfig {
        TelemetryConfig {
            host: "127.0.0.1".into(),
            port: 0,
            socket_timeout_secs: 0.1,
            ui_refresh_secs,
        }
    }

    fn valid_packet(gps_time: f64) -> NavPacket {
        NavPacket {
            gps_time,
            ins_mode: 9,
            gps_mode: 3,
            true_heading: 180.0,
            altitude: 100.0,
            acceleration_z: -9.81,
            ..NavPacket::default()
        }
    }

    struct Harness {
        receiver_flag: LifecycleFlag,
        sender: UdpSocket,
        dest: SocketAddr,
        ui_seen: Arc<Mutex<Vec<f64>>>,
        control_seen: Arc<Mutex<Vec<f64>>>,
        ui_loop: crate::dispatch::DispatchLoop<NavPacket>,
        control_loop: crate::dispatch::DispatchLoop<NavPacket>,
        handle: thread::JoinHandle<()>,
    }

    fn start_receiver(ui_refresh_secs: f64) -> Harness {
        let ui_queue = DispatchQueue::bounded("ui", 64);
        let control_queue = DispatchQueue::bounded("control", 64);

        let ui_seen = Arc::new(Mutex::new(Vec::new()));
        let control_seen = Arc::new(Mutex::new(Vec::new()));

        let ui_record = ui_seen.clone();
        let ui_sink = ui_queue.sink(move |p: NavPacket| ui_record.lock().unwrap().push(p.gps_time));
        let control_record = control_seen.clone();
        let control_sink = control_queue
            .sink(move |p: NavPacket| control_record.lock().unwrap().push(p.gps_time));

        let receiver =
            TelemetryReceiver::bind(&test_config(ui_refresh_secs), ui_sink, control_sink).unwrap();
        let dest = receiver.local_addr().unwrap();

        let receiver_flag = LifecycleFlag::new();
        let handle = receiver.spawn(receiver_flag.clone());

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

        Harness {
            receiver_flag,
            sender,
            dest,
            ui_seen,
            control_seen,
            ui_loop: ui_queue.into_loop(LifecycleFlag::new(), Duration::from_millis(10)),
            control_loop: control_queue.into_loop(LifecycleFlag::new(), Duration::from_millis(10)),
            handle,
        }
    }

    impl Harness {
        fn send(&self, bytes: &[u8]) {
            self.sender.send_to(bytes, self.dest).unwrap();
        }

        fn settle_and_stop(self) -> (Vec<f64>, Vec<f64>) {
            // Let the receiver drain the socket before stopping it.
            thread::sleep(Duration::from_millis(200));
            self.receiver_flag.request_stop();
            assert!(self.receiver_flag.wait_stopped(Duration::from_secs(1)));
            self.handle.join().unwrap();

            self.ui_loop.drain_pending();
            self.control_loop.drain_pending();
            let ui = self.ui_seen.lock().unwrap().clone();
            let control = self.control_seen.lock().unwrap().clone();
            (ui, control)
        }
    }

    #[test]
    fn forwards_valid_packets_to_both_sinks() {
        let harness = start_receiver(0.0);
        harness.send(&encode(&valid_packet(100.0)).unwrap());

        let (ui, control) = harness.settle_and_stop();
        assert_eq!(control, vec![100.0]);
        assert_eq!(ui, vec![100.0]);
    }

    #[test]
    fn invalid_packets_never_reach_a_sink() {
        let harness = start_receiver(0.0);

        // Out-of-range latitude
        let bad = NavPacket {
            latitude: 91.0,
            ..valid_packet(1.0)
        };
        harness.send(&encode(&bad).unwrap());
        // Wrong layout
        harness.send(&[0u8; 13]);
        // Valid control sample to prove the loop survived
        harness.send(&encode(&valid_packet(2.0)).unwrap());

        let (ui, control) = harness.settle_and_stop();
        assert_eq!(control, vec![2.0]);
        assert_eq!(ui, vec![2.0]);
    }

    #[test]
    fn ui_sink_is_throttled_control_sink_is_not() {
        // Refresh period far longer than the test: only the first
        // packet may reach the UI sink.
        let harness = start_receiver(30.0);
        for n in 0..5 {
            harness.send(&encode(&valid_packet(f64::from(n))).unwrap());
            thread::sleep(Duration::from_millis(10));
        }

        let (ui, control) = harness.settle_and_stop();
        assert_eq!(control, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ui, vec![0.0]);
    }

    #[test]
    fn stops_within_one_socket_timeout_without_traffic() {
        let harness = start_receiver(0.0);
        let started = Instant::now();
        harness.receiver_flag.request_stop();
        assert!(harness.receiver_flag.wait_stopped(Duration::from_secs(1)));
        // Socket timeout is 100 ms; allow generous scheduling margin.
        assert!(started.elapsed() < Duration::from_millis(800));
        harness.handle.join().unwrap();
    }
}
