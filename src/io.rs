use crate::error::Result;
use image::DynamicImage;
use ndarray::prelude::*;
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::path::Path;



// Load a raw hologram as a float array. `.npy` files are read as-is; images
// are decoded to grayscale without rescaling 8 or 16 bit samples.
pub fn load_hologram(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let is_npy = path.extension().map_or(false, |e| e.eq_ignore_ascii_case("npy"));

    if is_npy {
        return Ok(Array2::<f64>::read_npy(File::open(path)?)?);
    }

    Ok(image_to_array(image::open(path)?))
}

fn image_to_array(img: DynamicImage) -> Array2<f64> {
    match img {
        DynamicImage::ImageLuma8(gray) => {
            let (w, h) = gray.dimensions();
            Array2::from_shape_fn((h as usize, w as usize), |(i, j)| gray.get_pixel(j as u32, i as u32)[0] as f64)
        },
        DynamicImage::ImageLuma16(gray) => {
            let (w, h) = gray.dimensions();
            Array2::from_shape_fn((h as usize, w as usize), |(i, j)| gray.get_pixel(j as u32, i as u32)[0] as f64)
        },
        other => {
            let gray = other.into_luma16();
            let (w, h) = gray.dimensions();
            Array2::from_shape_fn((h as usize, w as usize), |(i, j)| gray.get_pixel(j as u32, i as u32)[0] as f64)
        }
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma};

    #[test]
    fn gray8_keeps_raw_values() {
        let img: GrayImage = ImageBuffer::from_fn(3, 2, |x, y| Luma([(10*x+y) as u8]));
        let arr = image_to_array(DynamicImage::ImageLuma8(img));

        assert_eq!(arr.dim(), (2, 3));
        assert_eq!(arr[[1, 2]], 21.);
    }

    #[test]
    fn gray16_keeps_raw_values() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_fn(2, 2, |x, y| Luma([1000*x as u16+y as u16]));
        let arr = image_to_array(DynamicImage::ImageLuma16(img));

        assert_eq!(arr[[1, 1]], 1001.);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_hologram("/definitely/not/here.npy").unwrap_err();
        assert!(matches!(err, crate::HoloError::Io(_)));
    }
}
