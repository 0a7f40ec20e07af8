use image::{imageops, RgbImage};

use crate::errors::{FeatureError, Result};

/// Axis-aligned rectangle over an image's pixel grid, 0-based.
///
/// Width and height are always positive; a region only comes out of
/// [`Region::new`] and is never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FeatureError::invalid_argument(
                "region",
                format!("must have positive size, got {width}x{height}"),
            ));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Region covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Result<Self> {
        Self::new(0, 0, width, height)
    }

    pub const fn x(&self) -> u32 {
        self.x
    }

    pub const fn y(&self) -> u32 {
        self.y
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub const fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub const fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    /// Copy the pixels under this region out of `image`.
    pub fn crop(&self, image: &RgbImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        if !self.fits_within(width, height) {
            return Err(FeatureError::invalid_argument(
                "region",
                format!("{self:?} exceeds image bounds {width}x{height}"),
            ));
        }
        Ok(imageops::crop_imm(image, self.x, self.y, self.width, self.height).to_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_zero_sized_region_rejected() {
        assert!(Region::new(0, 0, 0, 10).is_err());
        assert!(Region::new(0, 0, 10, 0).is_err());
        assert!(Region::new(5, 5, 1, 1).is_ok());
    }

    #[test]
    fn test_accessors() -> Result<()> {
        let region = Region::new(3, 4, 5, 6)?;
        assert_eq!((region.x(), region.y()), (3, 4));
        assert_eq!((region.width(), region.height()), (5, 6));
        assert_eq!((region.right(), region.bottom()), (8, 10));
        assert_eq!(region.area(), 30);
        Ok(())
    }

    #[test]
    fn test_crop_copies_pixels() -> Result<()> {
        let mut image = RgbImage::new(8, 6);
        image.put_pixel(3, 2, Rgb([10, 20, 30]));

        let crop = Region::new(3, 2, 4, 3)?.crop(&image)?;
        assert_eq!(crop.dimensions(), (4, 3));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([10, 20, 30]));
        Ok(())
    }

    #[test]
    fn test_crop_out_of_bounds() -> Result<()> {
        let image = RgbImage::new(8, 6);
        assert!(Region::new(5, 0, 4, 2)?.crop(&image).is_err());
        assert!(Region::full(8, 6)?.crop(&image).is_ok());
        Ok(())
    }
}
