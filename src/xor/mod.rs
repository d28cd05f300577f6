//! Aligned buffers and the SIMD XOR engine.

pub mod buffer;
pub mod engine;

pub use buffer::{AlignedBuf, ALIGNMENT};
pub use engine::{xor_buffers, xor_bytes, xor_into, LANE};
