//! Pixel conversions behind the image cache.
//!
//! Raw decode happens once per source buffer and channel; everything else is derived
//! from already decoded images.

use image::{imageops, GrayImage, Luma, Pixel, Rgb, RgbImage};

use super::size::ResizeMethod;
use crate::frame::{ImageBuffer, ImageEncoding};

/// Decode the raw source into a full-size RGB image.
///
/// Bayer input uses a 2x2 super-pixel demosaic, halving the sensor resolution.
pub(crate) fn decode_rgb(buffer: &ImageBuffer) -> RgbImage {
    let data = buffer.data();
    let sensor_cols = buffer.cols() as usize;
    let (rows, cols) = buffer.decoded_dims();
    match buffer.encoding() {
        ImageEncoding::BayerRggb8 => RgbImage::from_fn(cols, rows, |x, y| {
            let in_x = x as usize * 2;
            let in_y = y as usize * 2;
            let p00 = data[in_y * sensor_cols + in_x] as u16;
            let p01 = data[in_y * sensor_cols + in_x + 1] as u16;
            let p10 = data[(in_y + 1) * sensor_cols + in_x] as u16;
            let p11 = data[(in_y + 1) * sensor_cols + in_x + 1] as u16;
            Rgb([p00 as u8, ((p01 + p10) / 2) as u8, p11 as u8])
        }),
        ImageEncoding::Rgb8 => RgbImage::from_fn(cols, rows, |x, y| {
            let idx = (y as usize * sensor_cols + x as usize) * 3;
            Rgb([data[idx], data[idx + 1], data[idx + 2]])
        }),
        ImageEncoding::Gray8 => RgbImage::from_fn(cols, rows, |x, y| {
            let v = data[y as usize * sensor_cols + x as usize];
            Rgb([v, v, v])
        }),
    }
}

/// Decode the raw source into a full-size gray image.
pub(crate) fn decode_gray(buffer: &ImageBuffer) -> GrayImage {
    match buffer.encoding() {
        ImageEncoding::Gray8 => {
            let data = buffer.data();
            let sensor_cols = buffer.cols() as usize;
            GrayImage::from_fn(buffer.cols(), buffer.rows(), |x, y| {
                Luma([data[y as usize * sensor_cols + x as usize]])
            })
        }
        ImageEncoding::BayerRggb8 | ImageEncoding::Rgb8 => rgb_to_gray(&decode_rgb(buffer)),
    }
}

pub(crate) fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    imageops::grayscale(rgb)
}

pub(crate) fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

/// Resize to `rows x cols`, returning a copy when the size already matches.
pub(crate) fn resize<P>(
    src: &image::ImageBuffer<P, Vec<u8>>,
    rows: u32,
    cols: u32,
    method: ResizeMethod,
) -> image::ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if src.width() == cols && src.height() == rows {
        return src.clone();
    }
    imageops::resize(src, cols, rows, method.filter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ImageId;

    #[test]
    fn bayer_superpixel_demosaic() {
        // One RGGB cell: R=200, G=100/50, B=10
        let buf = ImageBuffer::new(
            ImageId(1),
            0,
            ImageEncoding::BayerRggb8,
            2,
            2,
            vec![200, 100, 50, 10],
        )
        .unwrap();
        let rgb = decode_rgb(&buf);
        assert_eq!(rgb.dimensions(), (1, 1));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([200, 75, 10]));
    }

    #[test]
    fn gray_passthrough_keeps_values() {
        let buf =
            ImageBuffer::new(ImageId(2), 0, ImageEncoding::Gray8, 2, 3, vec![1, 2, 3, 4, 5, 6])
                .unwrap();
        let gray = decode_gray(&buf);
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(2, 1), &Luma([6]));
        assert_eq!(gray_to_rgb(&gray).get_pixel(1, 0), &Rgb([2, 2, 2]));
    }

    #[test]
    fn gray_decode_indexes_wide_rows() {
        let (rows, cols) = (3u32, 700u32);
        let data: Vec<u8> = (0..rows * cols).map(|i| (i / cols * 40 + i % 7) as u8).collect();
        let buf = ImageBuffer::new(ImageId(3), 0, ImageEncoding::Gray8, rows, cols, data.clone())
            .unwrap();
        let gray = decode_gray(&buf);
        assert_eq!(gray.as_raw(), &data);
        assert_eq!(gray.get_pixel(699, 2), &Luma([data[2 * 700 + 699]]));
    }

    #[test]
    fn resize_halves_dimensions() {
        let gray = GrayImage::from_pixel(8, 4, Luma([9]));
        let half = resize(&gray, 2, 4, ResizeMethod::NearestNeighbor);
        assert_eq!(half.dimensions(), (4, 2));
        assert!(half.pixels().all(|p| p[0] == 9));
    }
}
