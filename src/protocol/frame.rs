//! IMU wire frame.
//!
//! The wearable sends one fixed 28-byte little-endian frame per reading:
//!
//! ```text
//! ┌──────────┬──────┬──────┬──────┬──────┬──────┬──────┐
//! │ time u32 │ aX   │ aY   │ aZ   │ gX   │ gY   │ gZ   │
//! │ 4 bytes  │ f32  │ f32  │ f32  │ f32  │ f32  │ f32  │
//! └──────────┴──────┴──────┴──────┴──────┴──────┴──────┘
//! ```
//!
//! Acceleration is in g, angular velocity in deg/s.

use crate::types::RawReading;

pub const FRAME_SIZE: usize = 28;

const FIELD_COUNT: usize = 6;

/// Parse one frame. Returns `None` for undersized frames and for frames
/// carrying a NaN or infinite field; trailing bytes beyond [`FRAME_SIZE`]
/// are ignored.
pub fn parse_frame(bytes: &[u8]) -> Option<RawReading> {
    if bytes.len() < FRAME_SIZE {
        return None;
    }

    let time = u32::from_le_bytes(bytes[0..4].try_into().ok()?);

    let mut fields = [0f64; FIELD_COUNT];
    for (i, chunk) in bytes[4..FRAME_SIZE].chunks_exact(4).enumerate() {
        let value = f32::from_le_bytes(chunk.try_into().ok()?);
        if !value.is_finite() {
            return None;
        }
        fields[i] = value as f64;
    }

    Some(RawReading::from_fields(
        time, fields[0], fields[1], fields[2], fields[3], fields[4], fields[5],
    ))
}

/// Encode a reading into the wire layout. Values are narrowed to f32.
pub fn encode_frame(reading: &RawReading) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0..4].copy_from_slice(&reading.time.to_le_bytes());

    let a = reading.acceleration;
    let g = reading.angular_velocity;
    let fields = [a.x, a.y, a.z, g.x, g.y, g.z];
    for (i, value) in fields.iter().enumerate() {
        let offset = 4 + i * 4;
        frame[offset..offset + 4].copy_from_slice(&(*value as f32).to_le_bytes());
    }
    frame
}
