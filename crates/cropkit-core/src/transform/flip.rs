//! In-place mirroring.

use crate::buffer::Bitmap;

/// Mirror left to right.
pub fn flip_horizontal(image: &mut Bitmap) {
    let channels = Bitmap::CHANNELS;
    let stride = image.width() as usize * channels;
    if stride == 0 {
        return;
    }

    for row in image.pixels_mut().chunks_exact_mut(stride) {
        let width = row.len() / channels;
        for x in 0..width / 2 {
            let (a, b) = (x * channels, (width - 1 - x) * channels);
            for c in 0..channels {
                row.swap(a + c, b + c);
            }
        }
    }
}

/// Mirror top to bottom.
pub fn flip_vertical(image: &mut Bitmap) {
    let stride = image.width() as usize * Bitmap::CHANNELS;
    let height = image.height() as usize;
    if stride == 0 {
        return;
    }

    let pixels = image.pixels_mut();
    for y in 0..height / 2 {
        let (upper, lower) = pixels.split_at_mut((height - 1 - y) * stride);
        upper[y * stride..(y + 1) * stride].swap_with_slice(&mut lower[..stride]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 image with red values 0..6 in row-major order.
    fn indexed_image() -> Bitmap {
        let mut pixels = Vec::new();
        for v in 0..6u8 {
            pixels.extend_from_slice(&[v, v + 10, v + 20]);
        }
        Bitmap::new(3, 2, pixels).unwrap()
    }

    fn reds(image: &Bitmap) -> Vec<u8> {
        image.pixels().chunks(3).map(|p| p[0]).collect()
    }

    #[test]
    fn test_flip_horizontal() {
        let mut img = indexed_image();
        flip_horizontal(&mut img);
        assert_eq!(reds(&img), vec![2, 1, 0, 5, 4, 3]);
        // Channels move together
        assert_eq!(img.pixel(0, 0), [2, 12, 22]);
    }

    #[test]
    fn test_flip_vertical() {
        let mut img = indexed_image();
        flip_vertical(&mut img);
        assert_eq!(reds(&img), vec![3, 4, 5, 0, 1, 2]);
    }

    #[test]
    fn test_double_flip_is_identity() {
        let original = indexed_image();
        let mut img = indexed_image();
        flip_horizontal(&mut img);
        flip_vertical(&mut img);
        flip_vertical(&mut img);
        flip_horizontal(&mut img);
        assert_eq!(img.pixels(), original.pixels());
    }

    #[test]
    fn test_flip_odd_height_keeps_middle_row() {
        let mut img = Bitmap::new(1, 3, vec![1, 1, 1, 2, 2, 2, 3, 3, 3]).unwrap();
        flip_vertical(&mut img);
        assert_eq!(reds(&img), vec![3, 2, 1]);
    }

    #[test]
    fn test_flip_empty_image() {
        let mut img = Bitmap::new(0, 0, vec![]).unwrap();
        flip_horizontal(&mut img);
        flip_vertical(&mut img);
        assert!(img.is_empty());
    }
}
