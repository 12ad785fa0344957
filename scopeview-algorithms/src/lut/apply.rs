//! Mapping raw intensities to display colors.
//!
//! Single-component images go through an [`IntensityMapper`]: the scaling
//! range picks a display index, the [`Lut`] picks the color. Multi-component
//! 8-bit images (RGB) instead remap each component through its own linear
//! table, working on a private copy of the pixels.

use std::sync::Arc;

use scopeview_core::{ComponentRange, Error, Image, Result};

use super::{Lut, LUT_SIZE};
use crate::util::{f64_to_u8, u32_to_usize};

/// Scaling range plus lookup table for one component.
#[derive(Debug, Clone)]
pub struct IntensityMapper {
    range: ComponentRange,
    lut: Lut,
}

impl IntensityMapper {
    /// Creates a mapper.
    #[must_use]
    pub fn new(range: ComponentRange, lut: Lut) -> Self {
        Self { range, lut }
    }

    /// Display index for `value`.
    ///
    /// A degenerate range (`min >= max`) maps everything at or below the
    /// minimum to 0 and everything above it to 255.
    #[inline]
    #[must_use]
    pub fn index(&self, value: u32) -> u8 {
        scale_to_index(value, self.range)
    }

    /// Display color for `value`.
    #[inline]
    #[must_use]
    pub fn map(&self, value: u32) -> [u8; 3] {
        self.lut.entry(self.index(value))
    }

    /// Table of colors for every value representable in `sample_bits` bits.
    fn table(&self, sample_bits: u8) -> Vec<[u8; 3]> {
        (0..1u32 << sample_bits).map(|v| self.map(v)).collect()
    }
}

#[inline]
fn scale_to_index(value: u32, range: ComponentRange) -> u8 {
    let ComponentRange { min, max } = range;
    if value <= min {
        return 0;
    }
    if value >= max || max <= min {
        return u8::MAX;
    }
    f64_to_u8(f64::from(value - min) * 255.0 / f64::from(max - min))
}

/// RGB output buffer the size of the displayed image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RgbFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbFrame {
    /// Black frame.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Resizes if needed and clears to black.
    pub fn reset(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width * height * 3, 0);
    }

    /// Frame width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Packed RGB bytes, row-major.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Color at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = (y * self.width + x) * 3;
        Some([self.data[o], self.data[o + 1], self.data[o + 2]])
    }

    /// Whether every pixel is black.
    #[must_use]
    pub fn is_black(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    #[inline]
    fn add(&mut self, pixel: usize, rgb: [u8; 3]) {
        let o = pixel * 3;
        for (dst, src) in self.data[o..o + 3].iter_mut().zip(rgb) {
            *dst = dst.saturating_add(src);
        }
    }
}

/// Maps one component of `image` and adds it into `frame`, saturating.
///
/// Drawing into a freshly reset frame is a plain copy; drawing several
/// channels gives an additive composite. Only the overlap of image and
/// frame is drawn.
///
/// # Errors
/// Returns an error if the component does not exist.
pub fn composite_into(
    frame: &mut RgbFrame,
    image: &Image,
    component: usize,
    mapper: &IntensityMapper,
) -> Result<()> {
    image.check_component(component)?;
    let table = mapper.table(image.sample_bits());
    let width = frame.width().min(image.width());
    let height = frame.height().min(image.height());
    for y in 0..height {
        for x in 0..width {
            let value = image.sample(y * image.width() + x, component);
            let rgb = table[u32_to_usize(value)];
            frame.add(y * frame.width() + x, rgb);
        }
    }
    Ok(())
}

/// Linear remap of one 8-bit component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRemap {
    table: [u8; LUT_SIZE],
}

impl ComponentRemap {
    /// Remap stretching `range` to `0..=255`.
    #[must_use]
    pub fn new(range: ComponentRange) -> Self {
        let mut table = [0u8; LUT_SIZE];
        for (v, slot) in (0u32..).zip(table.iter_mut()) {
            *slot = scale_to_index(v, range);
        }
        Self { table }
    }

    /// Remap that leaves values unchanged.
    #[must_use]
    pub fn identity() -> Self {
        let mut table = [0u8; LUT_SIZE];
        for (v, slot) in (0..=u8::MAX).zip(table.iter_mut()) {
            *slot = v;
        }
        Self { table }
    }

    /// Remapped value.
    #[inline]
    #[must_use]
    pub fn apply(&self, value: u8) -> u8 {
        self.table[usize::from(value)]
    }
}

/// Working copy of an 8-bit multi-component image.
///
/// Each [`RgbPlanes::remap`] starts again from the untouched source pixels,
/// so applying the same remaps twice never compounds them.
#[derive(Debug, Clone)]
pub struct RgbPlanes {
    source: Arc<[u8]>,
    working: Vec<u8>,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    num_components: usize,
}

impl RgbPlanes {
    /// Snapshots the pixels of `image`.
    ///
    /// # Errors
    /// Returns an error unless the image has several 8-bit components.
    pub fn from_image(image: &Image) -> Result<Self> {
        if image.num_components() < 2 || image.bytes_per_sample() != 1 {
            return Err(Error::UnsupportedSampleLayout {
                bytes_per_pixel: image.bytes_per_pixel(),
                num_components: image.num_components(),
            });
        }
        let source = image.shared_pixels();
        Ok(Self {
            working: source.to_vec(),
            source,
            width: image.width(),
            height: image.height(),
            bytes_per_pixel: image.bytes_per_pixel(),
            num_components: image.num_components(),
        })
    }

    /// Whether these planes were taken from `image`'s pixel buffer.
    #[must_use]
    pub fn is_snapshot_of(&self, image: &Image) -> bool {
        Arc::ptr_eq(&self.source, &image.shared_pixels())
    }

    /// Restores the source pixels, then remaps component `c` with
    /// `remaps[c]`. Components without a remap keep their values.
    pub fn remap(&mut self, remaps: &[ComponentRemap]) {
        self.working.copy_from_slice(&self.source);
        let active = self.num_components.min(remaps.len());
        for pixel in self.working.chunks_exact_mut(self.bytes_per_pixel) {
            for (value, remap) in pixel[..active].iter_mut().zip(remaps) {
                *value = remap.apply(*value);
            }
        }
    }

    /// Remapped pixel bytes in the source layout.
    #[must_use]
    pub fn working(&self) -> &[u8] {
        &self.working
    }

    /// Adds the remapped pixels into `frame` as RGB, saturating.
    pub fn composite_into(&self, frame: &mut RgbFrame) {
        let width = frame.width().min(self.width);
        let height = frame.height().min(self.height);
        for y in 0..height {
            for x in 0..width {
                let o = (y * self.width + x) * self.bytes_per_pixel;
                let mut rgb = [0u8; 3];
                for (c, slot) in rgb.iter_mut().enumerate().take(self.num_components) {
                    *slot = self.working[o + c];
                }
                frame.add(y * frame.width() + x, rgb);
            }
        }
    }
}
