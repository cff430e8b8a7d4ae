//! # navlink core
//!
//! Concurrency and protocol layer bridging a UDP flight-telemetry
//! feed and a serial microcontroller link: fixed-layout packet
//! decoding with per-field validity bounds, a closed command
//! protocol, an exclusive-access serial transport, and FIFO dispatch
//! queues with cooperative shutdown. Frontends (console, GUI) consume
//! this crate through plain sink/handler interfaces.
//!
//! ## Modules
//! - [`packet`] – NavPacket wire codec and bounds validation
//! - [`command`] – closed command set and its wire encoding
//! - [`transport`] – the one open serial device, behind one lock
//! - [`receiver`] – UDP receive worker (throttled UI + control sinks)
//! - [`listener`] – serial output worker
//! - [`dispatch`] – (payload, handler) FIFO queues and drain loops
//! - [`lifecycle`] – cooperative cancellation flags
//! - [`config`] – unified TOML configuration

pub mod command;
pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod listener;
pub mod packet;
pub mod receiver;
pub mod transport;

// Convenient re-exports
pub use command::{Command, CommandError, unpack_device_word};
pub use config::AppConfig;
pub use dispatch::{DispatchLoop, DispatchQueue, EventSink, Handler};
pub use lifecycle::{LifecycleFlag, LifecycleState};
pub use listener::DeviceListener;
pub use packet::{InsMode, NavPacket, PacketError};
pub use receiver::TelemetryReceiver;
pub use transport::{DeviceIo, Transport, TransportError};
