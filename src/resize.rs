//! Decode, resize and re-encode uploaded images.
//!
//! The output is always PNG whatever the input format was.

use std::{io::Cursor, num::ParseIntError};

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, imageops::FilterType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),
    #[error("invalid width: {0}")]
    InvalidWidth(#[source] ParseIntError),
    #[error("invalid height: {0}")]
    InvalidHeight(#[source] ParseIntError),
    #[error("missing {0} for resize")]
    MissingDimension(&'static str),
    #[error("resize to {width}x{height} produces an empty image")]
    EmptyOutput { width: i64, height: i64 },
    #[error("resize to {width}x{height} is out of range")]
    OutOfRange { width: i64, height: i64 },
    #[error("failed to encode image: {0}")]
    Encode(#[source] ImageError),
}

/// Resizes `bytes` to exactly `width` x `height` with a Lanczos filter and
/// returns the result encoded as PNG.
///
/// If one dimension is `0` it is derived from the source aspect ratio.
/// Negative dimensions, or both set to `0`, fail with
/// [`ResizeError::EmptyOutput`]. Dimensions must be strict base-10 integers,
/// any surrounding whitespace is rejected.
pub fn resize_to_png(bytes: &[u8], width: &str, height: &str) -> Result<Vec<u8>, ResizeError> {
    let src = image::load_from_memory(bytes).map_err(ResizeError::Decode)?;

    let width: i64 = width.parse().map_err(ResizeError::InvalidWidth)?;
    let height: i64 = height.parse().map_err(ResizeError::InvalidHeight)?;

    let (dst_width, dst_height) = target_dimensions(src.dimensions(), width, height)?;

    // Dimensions are not bounded beyond u32: a huge target makes the resize
    // allocate the whole output buffer up front.
    let dst = src.resize_exact(dst_width, dst_height, FilterType::Lanczos3);
    encode_png(&dst)
}

/// Same as [`resize_to_png`] but takes the raw `params` tail of an upload,
/// i.e. `[width, height, ..]`.
pub fn resize_with_params(bytes: &[u8], args: &[String]) -> Result<Vec<u8>, ResizeError> {
    let width = args.first().ok_or(ResizeError::MissingDimension("width"))?;
    let height = args.get(1).ok_or(ResizeError::MissingDimension("height"))?;
    resize_to_png(bytes, width, height)
}

fn target_dimensions(
    (src_w, src_h): (u32, u32),
    width: i64,
    height: i64,
) -> Result<(u32, u32), ResizeError> {
    let requested = (width, height);
    if width < 0 || height < 0 || (width == 0 && height == 0) || src_w == 0 || src_h == 0 {
        return Err(ResizeError::EmptyOutput { width, height });
    }

    let width = if width == 0 {
        scaled(height, src_w, src_h)
    } else {
        width
    };
    let height = if height == 0 {
        scaled(width, src_h, src_w)
    } else {
        height
    };

    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(ResizeError::OutOfRange {
            width: requested.0,
            height: requested.1,
        }),
    }
}

// Other side of a resize that keeps the aspect ratio, never below one pixel.
fn scaled(known: i64, numerator: u32, denominator: u32) -> i64 {
    let value = known as f64 * f64::from(numerator) / f64::from(denominator);
    (value + 0.5).floor().max(1.0) as i64
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ResizeError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ResizeError::Encode)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    pub(crate) fn sample_image(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        let image = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8()),
            _ => DynamicImage::ImageRgba8(image),
        };
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn decoded(bytes: &[u8]) -> DynamicImage {
        assert_eq!(image::guess_format(bytes).unwrap(), ImageFormat::Png);
        image::load_from_memory(bytes).unwrap()
    }

    #[test]
    fn resizes_to_exact_dimensions() {
        let png = sample_image(ImageFormat::Png, 100, 100);

        for (w, h) in [(50, 25), (1, 1), (100, 100), (240, 17)] {
            let out = resize_to_png(&png, &w.to_string(), &h.to_string()).unwrap();
            assert_eq!(decoded(&out).dimensions(), (w, h));
        }
    }

    #[test]
    fn jpeg_input_is_reencoded_as_png() {
        let jpeg = sample_image(ImageFormat::Jpeg, 64, 48);
        let out = resize_to_png(&jpeg, "32", "24").unwrap();
        assert_eq!(decoded(&out).dimensions(), (32, 24));
    }

    #[test]
    fn zero_dimension_keeps_aspect_ratio() {
        let png = sample_image(ImageFormat::Png, 200, 100);

        let out = resize_to_png(&png, "50", "0").unwrap();
        assert_eq!(decoded(&out).dimensions(), (50, 25));

        let out = resize_to_png(&png, "0", "10").unwrap();
        assert_eq!(decoded(&out).dimensions(), (20, 10));
    }

    #[test]
    fn empty_targets_are_rejected() {
        let png = sample_image(ImageFormat::Png, 10, 10);

        for (w, h) in [("0", "0"), ("-5", "10"), ("10", "-1")] {
            let err = resize_to_png(&png, w, h).unwrap_err();
            assert!(matches!(err, ResizeError::EmptyOutput { .. }), "{w}x{h}: {err}");
        }
    }

    #[test]
    fn non_numeric_dimensions_fail_to_parse() {
        let png = sample_image(ImageFormat::Png, 10, 10);

        let err = resize_to_png(&png, "wide", "10").unwrap_err();
        assert!(matches!(err, ResizeError::InvalidWidth(_)));
        assert!(err.to_string().starts_with("invalid width"));

        let err = resize_to_png(&png, "10", "4.5").unwrap_err();
        assert!(matches!(err, ResizeError::InvalidHeight(_)));
    }

    #[test]
    fn dimensions_must_be_strictly_numeric() {
        let png = sample_image(ImageFormat::Png, 10, 10);

        for (w, h) in [(" 50", "10"), ("50 ", "10"), ("0x10", "10"), ("", "10")] {
            let err = resize_to_png(&png, w, h).unwrap_err();
            assert!(matches!(err, ResizeError::InvalidWidth(_)), "{w:?}: {err}");
        }

        let err = resize_to_png(&png, "10", "10\n").unwrap_err();
        assert!(matches!(err, ResizeError::InvalidHeight(_)));

        let out = resize_to_png(&png, "+6", "3").unwrap();
        assert_eq!(decoded(&out).dimensions(), (6, 3));
    }

    #[test]
    fn dimensions_beyond_u32_are_rejected_without_allocating() {
        let png = sample_image(ImageFormat::Png, 10, 10);

        let err = resize_to_png(&png, "5000000000", "10").unwrap_err();
        assert!(matches!(
            err,
            ResizeError::OutOfRange {
                width: 5_000_000_000,
                height: 10
            }
        ));

        let err = resize_to_png(&png, "0", "5000000000").unwrap_err();
        assert!(matches!(err, ResizeError::OutOfRange { .. }));
    }

    #[test]
    fn garbage_bytes_fail_before_parsing() {
        let err = resize_to_png(b"definitely not an image", "x", "y").unwrap_err();
        assert!(matches!(err, ResizeError::Decode(_)));
        assert!(err.to_string().starts_with("failed to decode image"));
    }

    #[test]
    fn params_tail_needs_both_dimensions() {
        let png = sample_image(ImageFormat::Png, 10, 10);

        let err = resize_with_params(&png, &[]).unwrap_err();
        assert!(matches!(err, ResizeError::MissingDimension("width")));

        let err = resize_with_params(&png, &["5".to_string()]).unwrap_err();
        assert!(matches!(err, ResizeError::MissingDimension("height")));

        let out = resize_with_params(&png, &["5".to_string(), "6".to_string()]).unwrap();
        assert_eq!(decoded(&out).dimensions(), (5, 6));
    }
}
