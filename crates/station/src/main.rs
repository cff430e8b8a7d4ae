//! # navlink station
//!
//! Console ground station: receives flight telemetry over UDP,
//! listens to the microcontroller on the serial link, and issues
//! commands to it. All the real machinery lives in `navlink_core`;
//! this binary only wires workers to handlers and drives a small
//! stdin console.
//!
//! ## Usage
//! ```bash
//! station                        # start with no device open
//! station --port /dev/ttyUSB0   # open a serial device at startup
//! station --auto                 # enable automatic mode at startup
//! ```

mod console;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use navlink_core::config::AppConfig;
use navlink_core::packet::InsMode;
use navlink_core::{
    Command, DeviceListener, DispatchQueue, LifecycleFlag, NavPacket, TelemetryReceiver, Transport,
};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("could not save default config: {e}");
        }
    }

    // ── Arguments ──
    let args: Vec<String> = std::env::args().collect();
    let startup_device = args
        .iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let automatic = Arc::new(AtomicBool::new(args.iter().any(|a| a == "--auto")));

    // ── Transport ──
    let transport = Arc::new(Transport::new(&config.serial));
    if let Some(device) = &startup_device {
        match transport.open(Some(device)) {
            Ok(()) => info!("opened serial device {device}"),
            Err(e) => warn!("{e}; starting with no device open"),
        }
    }

    // ── Dispatch queues ──
    let depth = config.dispatch.queue_depth;
    let drain_poll = Duration::from_millis(config.dispatch.poll_timeout_ms);

    let ui_queue = DispatchQueue::bounded("ui", depth);
    let control_queue = DispatchQueue::bounded("control", depth);
    let device_queue = DispatchQueue::bounded("device", depth);

    // UI handler: live readout, already rate-limited by the receiver.
    let ui_sink = ui_queue.sink(|p: NavPacket| {
        let mode = InsMode::from_raw(p.ins_mode).map_or("?", InsMode::name);
        println!(
            "t: {:8.2}s  az: {:7.2} m/s²  alt: {:8.1} m  ins: {}",
            p.gps_time, p.acceleration_z, p.altitude, mode
        );
    });

    // Control handler: the automatic-mode decision. Issues one
    // emergency stop when the INS solution degrades, re-arms once it
    // recovers.
    let control_sink = {
        let transport = transport.clone();
        let automatic = automatic.clone();
        let stop_engaged = AtomicBool::new(false);
        control_queue.sink(move |p: NavPacket| {
            if !automatic.load(Ordering::Relaxed) {
                stop_engaged.store(false, Ordering::Relaxed);
                return;
            }
            let failing = matches!(
                InsMode::from_raw(p.ins_mode),
                Some(InsMode::ImuFail | InsMode::Diverged)
            );
            if failing {
                if !stop_engaged.swap(true, Ordering::Relaxed) {
                    warn!("automatic mode: INS mode {} degraded, sending emergency stop", p.ins_mode);
                    if let Err(e) = transport.send(&Command::EmergencyStop.encode()) {
                        warn!("emergency stop not sent: {e}");
                    }
                }
            } else {
                stop_engaged.store(false, Ordering::Relaxed);
            }
        })
    };

    // Device handler: show what the microcontroller reports back.
    let device_sink = device_queue.sink(|word: i32| match Command::from_value(word) {
        Ok(command) => info!("device acknowledged: {command}"),
        Err(_) => info!("device reported word {word}"),
    });

    // ── Workers ──
    let receiver = TelemetryReceiver::bind(&config.telemetry, ui_sink, control_sink)
        .expect("failed to bind telemetry socket");

    let receiver_flag = LifecycleFlag::new();
    let listener_flag = LifecycleFlag::new();
    let ui_flag = LifecycleFlag::new();
    let control_flag = LifecycleFlag::new();
    let device_flag = LifecycleFlag::new();

    let receiver_handle = receiver.spawn(receiver_flag.clone());
    let listener_handle = DeviceListener::new(transport.clone(), device_sink, &config.serial)
        .spawn(listener_flag.clone());
    let ui_handle = ui_queue
        .into_loop(ui_flag.clone(), drain_poll)
        .spawn("ui-dispatch");
    let control_handle = control_queue
        .into_loop(control_flag.clone(), drain_poll)
        .spawn("control-dispatch");
    let device_handle = device_queue
        .into_loop(device_flag.clone(), drain_poll)
        .spawn("device-dispatch");

    // ── Console (blocks until quit) ──
    println!(
        "navlink station – telemetry on {}:{}",
        config.telemetry.host, config.telemetry.port
    );
    console::Console {
        transport: transport.clone(),
        automatic,
    }
    .run();

    // ── Cooperative shutdown ──
    info!("shutting down");
    for flag in [
        &receiver_flag,
        &listener_flag,
        &ui_flag,
        &control_flag,
        &device_flag,
    ] {
        flag.request_stop();
    }
    transport.close();

    // Advisory waits: bounded by the longest poll timeout in the
    // system (the UDP socket timeout dominates).
    let grace = Duration::from_secs_f64(config.telemetry.socket_timeout_secs + 1.0);
    for (flag, worker) in [
        (&receiver_flag, "telemetry receiver"),
        (&listener_flag, "device listener"),
        (&ui_flag, "ui dispatch"),
        (&control_flag, "control dispatch"),
        (&device_flag, "device dispatch"),
    ] {
        if !flag.wait_stopped(grace) {
            warn!("{worker} did not stop within {grace:?}");
        }
    }
    for handle in [
        receiver_handle,
        listener_handle,
        ui_handle,
        control_handle,
        device_handle,
    ] {
        let _ = handle.join();
    }
    info!("shutdown complete");
}
