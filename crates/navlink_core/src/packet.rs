//! Navigation packet codec.
//!
//! One UDP datagram carries one [`NavPacket`]: 18 fields packed
//! big-endian with no framing or length prefix (the datagram boundary
//! is the record boundary). Wire layout, in field order:
//!
//! ```text
//! f64   GPS_Time
//! i32   INS_Mode
//! i32   GPS_Mode
//! f32×6 Roll, Pitch, True_Heading, Angular_Rate_{X,Y,Z}
//! f64×3 Latitude, Longitude, Altitude
//! f32×6 Velocity_{N,E,D}, Acceleration_{X,Y,Z}
//! ```
//!
//! 88 bytes total. Every field also has a physical validity range;
//! a datagram that fails the layout or any bound is rejected whole.
//! No partially-valid packet ever escapes [`decode`].

use bincode::Options;
use serde::{Deserialize, Serialize};

/// Serialization options matching the wire layout: big-endian,
/// fixed-width integers, so the struct field order *is* the layout.
fn wire_options() -> impl Options {
    bincode::options().with_big_endian().with_fixint_encoding()
}

// ──────────────────────────────────────────────
// NavPacket
// ──────────────────────────────────────────────

/// One decoded, range-validated navigation record.
///
/// Angles are degrees, rates deg/s, velocities m/s, accelerations
/// m/s², altitude metres, GPS time seconds into the GPS week.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NavPacket {
    pub gps_time: f64,
    pub ins_mode: i32,
    pub gps_mode: i32,
    pub roll: f32,
    pub pitch: f32,
    pub true_heading: f32,
    pub angular_rate_x: f32,
    pub angular_rate_y: f32,
    pub angular_rate_z: f32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub velocity_north: f32,
    pub velocity_east: f32,
    pub velocity_down: f32,
    pub acceleration_x: f32,
    pub acceleration_y: f32,
    pub acceleration_z: f32,
}

impl NavPacket {
    /// Exact size of one encoded packet: 4×f64 + 2×i32 + 12×f32.
    pub const WIRE_SIZE: usize = 4 * 8 + 2 * 4 + 12 * 4;
}

// ──────────────────────────────────────────────
// INS mode
// ──────────────────────────────────────────────

/// Named INS solution modes carried in `ins_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum InsMode {
    ImuFail = 0,
    Sim = 1,
    ImuOnly = 2,
    Orienting = 3,
    Initializing = 4,
    Diverged = 5,
    SolnFree = 6,
    Aligning = 7,
    HighVariance = 8,
    Good = 9,
}

impl InsMode {
    /// Maps a raw `ins_mode` field to its named mode, if in range.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::ImuFail,
            1 => Self::Sim,
            2 => Self::ImuOnly,
            3 => Self::Orienting,
            4 => Self::Initializing,
            5 => Self::Diverged,
            6 => Self::SolnFree,
            7 => Self::Aligning,
            8 => Self::HighVariance,
            9 => Self::Good,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ImuFail => "IMU FAIL",
            Self::Sim => "INS SIM",
            Self::ImuOnly => "IMU ONLY",
            Self::Orienting => "ORIENTING",
            Self::Initializing => "INITIALIZING",
            Self::Diverged => "DIVERGED",
            Self::SolnFree => "SOLN FREE",
            Self::Aligning => "ALIGNING",
            Self::HighVariance => "HIGH VARIANCE",
            Self::Good => "GOOD",
        }
    }
}

// ──────────────────────────────────────────────
// Field bounds
// ──────────────────────────────────────────────

/// Inclusive physical validity range for one field.
struct FieldBound {
    name: &'static str,
    min: f64,
    max: f64,
}

/// Declarative bounds table, in wire order. Adjusting a bound is a
/// data change here, not a code change in the decoder.
const FIELD_BOUNDS: [FieldBound; 18] = [
    FieldBound { name: "GPS_Time", min: 0.0, max: 604_800.0 },
    FieldBound { name: "INS_Mode", min: 0.0, max: 9.0 },
    FieldBound { name: "GPS_Mode", min: -1.0, max: 99.0 },
    FieldBound { name: "Roll", min: -180.0, max: 180.0 },
    FieldBound { name: "Pitch", min: -90.0, max: 90.0 },
    FieldBound { name: "True_Heading", min: 0.0, max: 360.0 },
    FieldBound { name: "Angular_Rate_X", min: -500.0, max: 500.0 },
    FieldBound { name: "Angular_Rate_Y", min: -500.0, max: 500.0 },
    FieldBound { name: "Angular_Rate_Z", min: -500.0, max: 500.0 },
    FieldBound { name: "Latitude", min: -90.0, max: 90.0 },
    FieldBound { name: "Longitude", min: -180.0, max: 180.0 },
    FieldBound { name: "Altitude", min: 0.0, max: 18_000.0 },
    FieldBound { name: "Velocity_North", min: -515.0, max: 515.0 },
    FieldBound { name: "Velocity_East", min: -515.0, max: 515.0 },
    FieldBound { name: "Velocity_Down", min: -515.0, max: 515.0 },
    FieldBound { name: "Acceleration_X", min: -98.0, max: 98.0 },
    FieldBound { name: "Acceleration_Y", min: -98.0, max: 98.0 },
    FieldBound { name: "Acceleration_Z", min: -98.0, max: 98.0 },
];

impl NavPacket {
    /// Field values as f64, in the same order as [`FIELD_BOUNDS`].
    fn field_values(&self) -> [f64; 18] {
        [
            self.gps_time,
            f64::from(self.ins_mode),
            f64::from(self.gps_mode),
            f64::from(self.roll),
            f64::from(self.pitch),
            f64::from(self.true_heading),
            f64::from(self.angular_rate_x),
            f64::from(self.angular_rate_y),
            f64::from(self.angular_rate_z),
            self.latitude,
            self.longitude,
            self.altitude,
            f64::from(self.velocity_north),
            f64::from(self.velocity_east),
            f64::from(self.velocity_down),
            f64::from(self.acceleration_x),
            f64::from(self.acceleration_y),
            f64::from(self.acceleration_z),
        ]
    }
}

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// A field whose decoded value fell outside its bound.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    pub name: &'static str,
    pub value: f64,
}

/// Packet codec errors. Each is fatal to the datagram, never to the
/// receiver loop.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("datagram length {len} does not match the {}-byte layout", NavPacket::WIRE_SIZE)]
    Layout { len: usize },

    #[error("field(s) out of range: {}", describe_violations(.fields))]
    Range { fields: Vec<FieldViolation> },

    #[error("codec failure: {0}")]
    Codec(String),
}

fn describe_violations(fields: &[FieldViolation]) -> String {
    fields
        .iter()
        .map(|v| format!("{}={}", v.name, v.value))
        .collect::<Vec<_>>()
        .join(", ")
}

// ──────────────────────────────────────────────
// Decode / encode
// ──────────────────────────────────────────────

/// Decodes one datagram into a validated [`NavPacket`].
///
/// Rejects with [`PacketError::Layout`] when the byte length is wrong
/// and with [`PacketError::Range`] (naming every offending field) when
/// any bound is violated. NaN fails every bound check, so it is
/// rejected too.
pub fn decode(data: &[u8]) -> Result<NavPacket, PacketError> {
    if data.len() != NavPacket::WIRE_SIZE {
        return Err(PacketError::Layout { len: data.len() });
    }

    let packet: NavPacket = wire_options()
        .deserialize(data)
        .map_err(|e| PacketError::Codec(e.to_string()))?;

    let violations: Vec<FieldViolation> = packet
        .field_values()
        .iter()
        .zip(FIELD_BOUNDS.iter())
        .filter(|(value, bound)| !(bound.min..=bound.max).contains(value))
        .map(|(value, bound)| FieldViolation {
            name: bound.name,
            value: *value,
        })
        .collect();

    if violations.is_empty() {
        Ok(packet)
    } else {
        Err(PacketError::Range { fields: violations })
    }
}

/// Packs a [`NavPacket`] into its wire form.
///
/// Inverse of [`decode`] for in-range packets; used by the traffic
/// generator, not by the receive path. No range check is applied here.
pub fn encode(packet: &NavPacket) -> Result<Vec<u8>, PacketError> {
    wire_options()
        .serialize(packet)
        .map_err(|e| PacketError::Codec(e.to_string()))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
