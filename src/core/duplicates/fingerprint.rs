//! Difference-hash fingerprints.
//!
//! The image is reduced to a (size+1) x size grayscale grid and each pixel
//! is compared to its right neighbour. A brighter left pixel sets the bit.
//! With the default size of 8 this yields 64 bits.

use super::PixelSource;
use crate::core::imaging::{decode_bytes, FastResizer};
use crate::error::ThumbnailError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Packed dHash bits, most significant bit first
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    bytes: Vec<u8>,
    bit_count: u32,
}

impl Fingerprint {
    /// Fingerprint a decoded image on a `hash_size` grid
    pub fn of_image(
        resizer: &mut FastResizer,
        image: &DynamicImage,
        hash_size: u32,
    ) -> Result<Self, ThumbnailError> {
        let gray = resizer.resize_to_grayscale(image, hash_size + 1, hash_size)?;

        let bit_count = hash_size * hash_size;
        let mut bytes = Vec::with_capacity(bit_count.div_ceil(8) as usize);
        let mut current_byte: u8 = 0;
        let mut bit_position = 0;

        for y in 0..hash_size {
            for x in 0..hash_size {
                let left = gray.get_pixel(x, y)[0];
                let right = gray.get_pixel(x + 1, y)[0];

                if left > right {
                    current_byte |= 1 << (7 - bit_position);
                }

                bit_position += 1;
                if bit_position == 8 {
                    bytes.push(current_byte);
                    current_byte = 0;
                    bit_position = 0;
                }
            }
        }

        if bit_position > 0 {
            bytes.push(current_byte);
        }

        Ok(Self { bytes, bit_count })
    }

    /// Decode if needed, then fingerprint
    pub fn of_source(
        resizer: &mut FastResizer,
        source: &PixelSource,
        hash_size: u32,
    ) -> Result<Self, ThumbnailError> {
        match source {
            PixelSource::Encoded(data) => Self::of_image(resizer, &decode_bytes(data)?, hash_size),
            PixelSource::Bitmap(image) => Self::of_image(resizer, image, hash_size),
        }
    }

    /// Number of meaningful bits
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Number of differing bits
    pub fn distance(&self, other: &Self) -> u32 {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Matching bits as a rounded percentage (0-100)
    pub fn similarity(&self, other: &Self) -> u8 {
        let length = self.bit_count.max(other.bit_count);
        if length == 0 {
            return 100;
        }
        let matching = length.saturating_sub(self.distance(other));
        ((matching * 100 + length / 2) / length) as u8
    }

    /// Hex rendering for logs and reports
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn gradient(left_to_right: bool) -> DynamicImage {
        let img = ImageBuffer::from_fn(100, 100, |x, _| {
            let step = if left_to_right { x } else { 99 - x };
            let brightness = (step * 255 / 99) as u8;
            Rgb([brightness, brightness, brightness])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn fingerprint(image: &DynamicImage) -> Fingerprint {
        Fingerprint::of_image(&mut FastResizer::new(), image, 8).unwrap()
    }

    #[test]
    fn default_grid_is_64_bits() {
        let print = fingerprint(&gradient(true));
        assert_eq!(print.bit_count(), 64);
        assert_eq!(print.to_hex().len(), 16);
    }

    #[test]
    fn identical_images_are_fully_similar() {
        let a = fingerprint(&gradient(false));
        let b = fingerprint(&gradient(false));
        assert_eq!(a.distance(&b), 0);
        assert_eq!(a.similarity(&b), 100);
    }

    #[test]
    fn opposite_gradients_share_no_bits() {
        // Brightening rows never set a bit; darkening rows set every bit
        let a = fingerprint(&gradient(true));
        let b = fingerprint(&gradient(false));
        assert_eq!(a.distance(&b), 64);
        assert_eq!(a.similarity(&b), 0);
    }

    #[test]
    fn similarity_rounds_to_nearest_percent() {
        let a = Fingerprint {
            bytes: vec![0u8; 8],
            bit_count: 64,
        };
        let mut b = a.clone();
        b.bytes[0] = 0b1000_0000;
        // 63 of 64 bits match: 98.4 rounds to 98
        assert_eq!(a.similarity(&b), 98);
    }

    #[test]
    fn encoded_source_is_decoded() {
        let mut png = Vec::new();
        gradient(true)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let from_bytes =
            Fingerprint::of_source(&mut FastResizer::new(), &PixelSource::Encoded(png), 8)
                .unwrap();
        assert_eq!(from_bytes, fingerprint(&gradient(true)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = Fingerprint::of_source(
            &mut FastResizer::new(),
            &PixelSource::Encoded(b"not an image".to_vec()),
            8,
        );
        assert!(result.is_err());
    }
}
