use exif::{In, Tag};
use image::DynamicImage;
use std::io::Cursor;

/// EXIF orientation, as the transformation needed to display the image
/// upright.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Normal,
    MirroredHorizontal,
    Rotated180,
    MirroredVertical,
    MirroredHorizontalAnd270CW,
    Rotated90CW,
    MirroredHorizontalAnd90CW,
    Rotated270CW,
}
impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Self::MirroredHorizontal,
            3 => Self::Rotated180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalAnd270CW,
            6 => Self::Rotated90CW,
            7 => Self::MirroredHorizontalAnd90CW,
            8 => Self::Rotated270CW,
            _ => Self::Normal,
        }
    }
}
impl Orientation {
    /// Read the orientation tag from an encoded image. Missing or unreadable
    /// metadata means [`Normal`](Self::Normal).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let Ok(exif) = exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
            return Self::Normal;
        };
        exif.get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Self::from)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => image,
            Self::MirroredHorizontal => image.fliph(),
            Self::Rotated180 => image.rotate180(),
            Self::MirroredVertical => image.flipv(),
            Self::MirroredHorizontalAnd270CW => image.fliph().rotate270(),
            Self::Rotated90CW => image.rotate90(),
            Self::MirroredHorizontalAnd90CW => image.fliph().rotate90(),
            Self::Rotated270CW => image.rotate270(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use rstest::rstest;

    #[rstest]
    #[case(0, Orientation::Normal)]
    #[case(1, Orientation::Normal)]
    #[case(3, Orientation::Rotated180)]
    #[case(6, Orientation::Rotated90CW)]
    #[case(8, Orientation::Rotated270CW)]
    #[case(42, Orientation::Normal)]
    fn test_from_tag(#[case] tag: u32, #[case] expected: Orientation) {
        assert_eq!(Orientation::from(tag), expected);
    }

    #[test]
    fn test_rotation_swaps_sides() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(40, 10));
        assert_eq!(Orientation::Rotated90CW.apply(image.clone()).dimensions(), (10, 40));
        assert_eq!(Orientation::Rotated180.apply(image.clone()).dimensions(), (40, 10));
        assert_eq!(Orientation::MirroredHorizontalAnd270CW.apply(image).dimensions(), (10, 40));
    }

    #[test]
    fn test_mirror() {
        let mut pixels = RgbImage::new(2, 1);
        pixels.put_pixel(0, 0, Rgb([255, 0, 0]));
        let image = Orientation::MirroredHorizontal.apply(DynamicImage::ImageRgb8(pixels));
        assert_eq!(image.to_rgb8().get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_no_metadata() {
        assert_eq!(Orientation::from_bytes(b"definitely not an image"), Orientation::Normal);
    }
}
