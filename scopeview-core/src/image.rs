//! Immutable image buffers with dimension and pixel-format metadata.
//!
//! Pixels are stored interleaved: each pixel occupies `bytes_per_pixel`
//! bytes, and component `c` starts at byte `c * bytes_per_sample` within
//! the pixel. Samples are either 8-bit or 16-bit little-endian. A 32-bit
//! RGB pixel carries three 8-bit components followed by one padding byte.
//!
//! The buffer is reference counted, so cloning an [`Image`] or moving it
//! to new coordinates never copies pixel data.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coords::Coords;
use crate::error::{Error, Result};

/// Acquisition metadata carried alongside the pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageMetadata {
    /// Significant bits per sample; defaults to the full sample width.
    pub bit_depth: Option<u8>,
    /// Producer sequence number.
    pub sequence: u64,
    /// Milliseconds since acquisition start.
    pub elapsed_ms: Option<f64>,
}

impl ImageMetadata {
    /// Metadata with an explicit bit depth.
    #[must_use]
    pub fn with_bit_depth(mut self, bit_depth: u8) -> Self {
        self.bit_depth = Some(bit_depth);
        self
    }

    /// Metadata with a sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// One 2-D image at a position in the dataset.
#[derive(Debug, Clone)]
pub struct Image {
    coords: Coords,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    num_components: usize,
    pixels: Arc<[u8]>,
    metadata: ImageMetadata,
}

impl Image {
    /// Creates an image after validating geometry and pixel layout.
    ///
    /// # Errors
    /// Returns an error if the dimensions are zero, the layout does not
    /// resolve to 8- or 16-bit samples, the buffer length does not match,
    /// or the declared bit depth exceeds the sample width.
    pub fn new(
        coords: Coords,
        width: usize,
        height: usize,
        bytes_per_pixel: usize,
        num_components: usize,
        pixels: impl Into<Arc<[u8]>>,
        metadata: ImageMetadata,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGeometry { width, height });
        }
        let layout_error = Error::UnsupportedSampleLayout {
            bytes_per_pixel,
            num_components,
        };
        if num_components == 0 || bytes_per_pixel == 0 {
            return Err(layout_error);
        }
        // Multi-component pixels pad their samples to a power-of-two count,
        // as in 4-byte RGB.
        let slots = if num_components == 1 {
            1
        } else {
            num_components
                .checked_next_power_of_two()
                .ok_or_else(|| layout_error.clone())?
        };
        let bytes_per_sample = bytes_per_pixel / slots;
        if !(1..=2).contains(&bytes_per_sample) || bytes_per_sample * slots != bytes_per_pixel {
            return Err(layout_error);
        }

        let pixels = pixels.into();
        let expected = width
            .checked_mul(height)
            .and_then(|count| count.checked_mul(bytes_per_pixel))
            .ok_or(Error::InvalidGeometry { width, height })?;
        if pixels.len() != expected {
            return Err(Error::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }

        let sample_bits = sample_bits(bytes_per_sample);
        if let Some(bit_depth) = metadata.bit_depth {
            if bit_depth == 0 || bit_depth > sample_bits {
                return Err(Error::InvalidBitDepth {
                    bit_depth,
                    sample_bits,
                });
            }
        }

        Ok(Self {
            coords,
            width,
            height,
            bytes_per_pixel,
            num_components,
            pixels,
            metadata,
        })
    }

    /// Creates an 8-bit grayscale image.
    ///
    /// # Errors
    /// Returns an error if the buffer does not hold `width * height` bytes.
    pub fn gray8(coords: Coords, width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        Self::new(coords, width, height, 1, 1, pixels, ImageMetadata::default())
    }

    /// Creates a 16-bit grayscale image with the given significant bit depth.
    ///
    /// # Errors
    /// Returns an error if the sample count or bit depth is invalid.
    pub fn gray16(
        coords: Coords,
        width: usize,
        height: usize,
        samples: &[u16],
        bit_depth: u8,
    ) -> Result<Self> {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(
            coords,
            width,
            height,
            2,
            1,
            bytes,
            ImageMetadata::default().with_bit_depth(bit_depth),
        )
    }

    /// Creates a 32-bit RGB image from `[r, g, b, pad]` pixels.
    ///
    /// # Errors
    /// Returns an error if the buffer does not hold `width * height * 4` bytes.
    pub fn rgb32(coords: Coords, width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        Self::new(coords, width, height, 4, 3, pixels, ImageMetadata::default())
    }

    /// All-zero image with this image's format, placed at `coords`.
    #[must_use]
    pub fn zeroed_like(&self, coords: Coords) -> Self {
        Self {
            coords,
            pixels: vec![0u8; self.pixels.len()].into(),
            metadata: ImageMetadata {
                sequence: 0,
                elapsed_ms: None,
                ..self.metadata
            },
            ..self.clone()
        }
    }

    /// Same pixels placed at different coordinates.
    #[must_use]
    pub fn with_coords(&self, coords: Coords) -> Self {
        Self {
            coords,
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels.
    #[inline]
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    #[must_use]
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    #[inline]
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.num_components
    }

    /// Bytes per component sample (1 or 2).
    #[inline]
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        if self.num_components == 1 {
            self.bytes_per_pixel
        } else {
            self.bytes_per_pixel / self.num_components.next_power_of_two()
        }
    }

    /// Bits per component sample (8 or 16).
    #[must_use]
    pub fn sample_bits(&self) -> u8 {
        sample_bits(self.bytes_per_sample())
    }

    /// Significant bits per sample.
    #[must_use]
    pub fn bit_depth(&self) -> u8 {
        self.metadata.bit_depth.unwrap_or_else(|| self.sample_bits())
    }

    /// Largest intensity representable at the image's bit depth.
    #[must_use]
    pub fn max_intensity(&self) -> u32 {
        (1u32 << self.bit_depth()) - 1
    }

    /// Raw interleaved pixel bytes.
    #[inline]
    #[must_use]
    pub fn raw_pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Shared handle to the pixel buffer.
    #[must_use]
    pub fn shared_pixels(&self) -> Arc<[u8]> {
        Arc::clone(&self.pixels)
    }

    #[must_use]
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    /// Reads one component sample.
    ///
    /// # Panics
    /// Panics if `pixel` or `component` is out of range.
    #[inline]
    #[must_use]
    pub fn sample(&self, pixel: usize, component: usize) -> u32 {
        let bps = self.bytes_per_sample();
        let offset = pixel * self.bytes_per_pixel + component * bps;
        if bps == 1 {
            u32::from(self.pixels[offset])
        } else {
            u32::from(u16::from_le_bytes([
                self.pixels[offset],
                self.pixels[offset + 1],
            ]))
        }
    }

    /// Checks that `component` exists.
    ///
    /// # Errors
    /// Returns [`Error::ComponentOutOfRange`] otherwise.
    pub fn check_component(&self, component: usize) -> Result<()> {
        if component < self.num_components {
            Ok(())
        } else {
            Err(Error::ComponentOutOfRange {
                component,
                num_components: self.num_components,
            })
        }
    }
}

fn sample_bits(bytes_per_sample: usize) -> u8 {
    if bytes_per_sample == 1 {
        8
    } else {
        16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray16_round_trips_samples() {
        let image = Image::gray16(Coords::new(), 2, 1, &[3, 4095], 12).unwrap();
        assert_eq!(image.bytes_per_sample(), 2);
        assert_eq!(image.bit_depth(), 12);
        assert_eq!(image.max_intensity(), 4095);
        assert_eq!(image.sample(0, 0), 3);
        assert_eq!(image.sample(1, 0), 4095);
    }

    #[test]
    fn test_rgb32_layout() {
        let image = Image::rgb32(Coords::new(), 1, 1, vec![10, 20, 30, 0]).unwrap();
        assert_eq!(image.num_components(), 3);
        assert_eq!(image.bytes_per_sample(), 1);
        assert_eq!(image.bit_depth(), 8);
        assert_eq!(image.sample(0, 2), 30);
    }

    #[test]
    fn test_rejects_bad_buffers() {
        assert_eq!(
            Image::gray8(Coords::new(), 2, 2, vec![0; 3]).unwrap_err(),
            Error::BufferLength {
                expected: 4,
                actual: 3
            }
        );
        assert!(matches!(
            Image::gray8(Coords::new(), 0, 2, vec![]),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(matches!(
            Image::new(Coords::new(), 1, 1, 3, 1, vec![0; 3], ImageMetadata::default()),
            Err(Error::UnsupportedSampleLayout { .. })
        ));
        assert!(matches!(
            Image::gray16(Coords::new(), 1, 1, &[0], 17),
            Err(Error::InvalidBitDepth { .. })
        ));
    }

    #[test]
    fn test_multi_component_layouts() {
        // 48-bit RGB has no padding slot and is not a supported layout.
        assert!(matches!(
            Image::new(Coords::new(), 1, 1, 6, 3, vec![0; 6], ImageMetadata::default()),
            Err(Error::UnsupportedSampleLayout { .. })
        ));
        let rgb64 = Image::new(Coords::new(), 1, 1, 8, 3, vec![0; 8], ImageMetadata::default())
            .unwrap();
        assert_eq!(rgb64.bytes_per_sample(), 2);
        assert!(matches!(
            Image::new(Coords::new(), 1, 1, 1, usize::MAX, vec![0], ImageMetadata::default()),
            Err(Error::UnsupportedSampleLayout { .. })
        ));
    }

    #[test]
    fn test_oversized_geometry_is_rejected() {
        assert_eq!(
            Image::gray8(Coords::new(), usize::MAX, 2, vec![0; 4]).unwrap_err(),
            Error::InvalidGeometry {
                width: usize::MAX,
                height: 2
            }
        );
    }

    #[test]
    fn test_zeroed_like_keeps_format() {
        let image = Image::gray16(Coords::new(), 2, 2, &[9; 4], 14).unwrap();
        let blank = image.zeroed_like(Coords::new().with_channel(1));
        assert_eq!(blank.bit_depth(), 14);
        assert_eq!(blank.coords().channel(), 1);
        assert!(blank.raw_pixels().iter().all(|&b| b == 0));
    }
}
