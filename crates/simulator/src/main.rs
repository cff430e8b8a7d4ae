//! # navlink simulator
//!
//! Traffic generator for bench testing without hardware: builds valid
//! flight packets with a synthetic Z-acceleration waveform and sends
//! one datagram per sample period to the configured telemetry port.
//!
//! ## Usage
//! ```bash
//! simulator            # 100 Hz to localhost:5124 (per config.toml)
//! ```

use std::f64::consts::TAU;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{error, info};

use navlink_core::config::AppConfig;
use navlink_core::packet::{self, NavPacket};

/// One simulated sample: the flight profile of the original bench
/// recording, with `az` riding a slow 0.25 Hz oscillation.
fn simulated_packet(elapsed_secs: f64) -> NavPacket {
    let az = 9.81 * (TAU * 0.25 * elapsed_secs).sin();
    NavPacket {
        gps_time: elapsed_secs,
        ins_mode: 9,
        gps_mode: 3,
        roll: 22.0,
        pitch: -14.2,
        true_heading: 180.0,
        angular_rate_x: 250.2,
        angular_rate_y: -240.2,
        angular_rate_z: 232.0,
        latitude: -32.0,
        longitude: 10.0,
        altitude: 112.1,
        velocity_north: 32.1,
        velocity_east: 12.1,
        velocity_down: 123.2,
        acceleration_x: 0.0,
        acceleration_y: 10.0,
        acceleration_z: az as f32,
    }
}

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
    let sim_cfg = &config.simulator;
    let period = Duration::from_secs_f64(sim_cfg.sample_period_secs);
    let dest_addr = format!("{}:{}", sim_cfg.dest_host, sim_cfg.port);

    // ── Socket ──
    let sock = UdpSocket::bind("0.0.0.0:0").expect("failed to create UDP socket");

    println!();
    println!("══════════════════════════════════════════════");
    println!("   navlink simulator – active");
    println!("══════════════════════════════════════════════");
    println!("  Destination: {dest_addr}");
    println!("  Rate:        {:.0} Hz", 1.0 / sim_cfg.sample_period_secs);
    println!("══════════════════════════════════════════════");
    println!();

    // ── Send loop ──
    let start = Instant::now();
    let summary_every = (1.0 / sim_cfg.sample_period_secs).max(1.0) as u64;
    let mut sent: u64 = 0;
    loop {
        let cycle_start = Instant::now();
        let packet = simulated_packet(start.elapsed().as_secs_f64());

        match packet::encode(&packet) {
            Ok(datagram) => {
                if let Err(e) = sock.send_to(&datagram, &dest_addr) {
                    error!("failed to send datagram: {e}");
                } else {
                    sent += 1;
                    // One summary line per second, not one per sample.
                    if sent % summary_every == 0 {
                        info!(
                            "→ {} datagrams to {} | t={:.1}s az={:.2}",
                            sent, dest_addr, packet.gps_time, packet.acceleration_z
                        );
                    }
                }
            }
            Err(e) => error!("failed to encode packet: {e}"),
        }

        // Sleep out the remainder of the sample period.
        let elapsed = cycle_start.elapsed();
        if elapsed < period {
            std::thread::sleep(period - elapsed);
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_packets_always_decode() {
        for tenth in 0..100 {
            let packet = simulated_packet(f64::from(tenth) / 10.0);
            let datagram = packet::encode(&packet).unwrap();
            let decoded = packet::decode(&datagram).unwrap();
            assert_eq!(packet, decoded);
        }
    }
}
