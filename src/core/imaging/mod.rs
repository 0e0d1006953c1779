//! # Imaging Module
//!
//! Shared decode and resize helpers for thumbnails and fingerprints.
//!
//! ## Performance
//! - Uses `zune-jpeg` for 1.5-2x faster JPEG decoding
//! - Uses `fast_image_resize` for 5-14x faster SIMD-accelerated resizing

mod decode;
mod resize;

pub use decode::{decode_bytes, decode_file};
pub use resize::FastResizer;
