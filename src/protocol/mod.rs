pub mod frame;

pub use frame::{encode_frame, parse_frame, FRAME_SIZE};
