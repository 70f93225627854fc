use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use ndarray::Array4;

use super::VisionError;
use super::face::{FaceDetector, FaceSelection};

/// Strips an optional `data:image/...;base64,` prefix and decodes the base64 body.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, VisionError> {
    let encoded = if payload.contains("data:image") {
        payload
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| VisionError::InvalidImage("data URL has no payload".to_string()))?
    } else {
        payload
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(VisionError::InvalidImage("empty image payload".to_string()));
    }

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| VisionError::InvalidImage(format!("base64 decoding failed: {}", e)))
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, VisionError> {
    image::load_from_memory(bytes).map_err(|e| VisionError::InvalidImage(e.to_string()))
}

/// Single-channel conversion with the BT.601 weights the classifier was trained on.
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            image.to_luma8()
        }
        _ => {
            let rgb = image.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
                Luma([luma.round().clamp(0.0, 255.0) as u8])
            })
        }
    }
}

/// Resizes a face crop to `size`×`size` and lays it out as `[1, size, size, 1]` in [0, 1].
pub fn to_input_tensor(face: &GrayImage, size: u32) -> Array4<f32> {
    let resized = imageops::resize(face, size, size, FilterType::Triangle);
    let side = size as usize;
    Array4::from_shape_fn((1, side, side, 1), |(_, row, col, _)| {
        resized.get_pixel(col as u32, row as u32).0[0] as f32 / 255.0
    })
}

/// Detects a face in `gray`, crops the one chosen by `selection` and builds the model input.
pub fn preprocess_face(
    gray: &GrayImage,
    detector: &dyn FaceDetector,
    selection: FaceSelection,
    input_size: u32,
) -> Result<Array4<f32>, VisionError> {
    let faces = detector.detect(gray)?;
    let face = selection
        .select(&faces)
        .and_then(|face| face.clamp_to(gray.width(), gray.height()))
        .ok_or(VisionError::NoFaceDetected)?;

    log::debug!(
        "Using face at ({}, {}) {}x{} out of {} candidate(s)",
        face.x,
        face.y,
        face.width,
        face.height,
        faces.len()
    );

    let crop = imageops::crop_imm(gray, face.x, face.y, face.width, face.height).to_image();
    Ok(to_input_tensor(&crop, input_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::face::FaceBox;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct FixedDetector(Vec<FaceBox>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _gray: &GrayImage) -> Result<Vec<FaceBox>, VisionError> {
            Ok(self.0.clone())
        }
    }

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn raw_and_data_url_payloads_decode_identically() {
        let bytes = png_bytes(&DynamicImage::ImageRgb8(RgbImage::new(4, 4)));
        let encoded = STANDARD.encode(&bytes);

        assert_eq!(decode_payload(&encoded).unwrap(), bytes);
        assert_eq!(
            decode_payload(&format!("data:image/png;base64,{}", encoded)).unwrap(),
            bytes
        );
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_payload(&wrapped).unwrap(), bytes);
    }

    #[test]
    fn malformed_payloads_are_invalid_image_errors() {
        assert!(matches!(decode_payload("%%%not base64%%%"), Err(VisionError::InvalidImage(_))));
        assert!(matches!(decode_payload("data:image/png;base64"), Err(VisionError::InvalidImage(_))));
        assert!(matches!(decode_payload(""), Err(VisionError::InvalidImage(_))));
        assert!(matches!(decode_image(b"definitely not an image"), Err(VisionError::InvalidImage(_))));
    }

    #[test]
    fn color_images_use_bt601_weights() {
        let mut rgb = RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, Rgb([0, 0, 255]));

        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
    }

    #[test]
    fn grayscale_images_pass_through() {
        let gray = GrayImage::from_pixel(2, 2, Luma([42]));
        assert_eq!(to_grayscale(&DynamicImage::ImageLuma8(gray.clone())), gray);
    }

    #[test]
    fn tensor_is_normalized_single_sample_single_channel() {
        let face = GrayImage::from_pixel(100, 80, Luma([255]));
        let tensor = to_input_tensor(&face, 48);

        assert_eq!(tensor.shape(), &[1, 48, 48, 1]);
        assert!(tensor.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn crop_uses_the_selected_face() {
        // left half black, right half white
        let gray = GrayImage::from_fn(200, 100, |x, _| Luma([if x < 100 { 0 } else { 255 }]));
        let detector = FixedDetector(vec![
            FaceBox { x: 0, y: 0, width: 60, height: 60, score: 1.0 },
            FaceBox { x: 110, y: 0, width: 80, height: 80, score: 5.0 },
        ]);

        let first = preprocess_face(&gray, &detector, FaceSelection::First, 48).unwrap();
        assert!(first.iter().all(|v| *v == 0.0));

        let largest = preprocess_face(&gray, &detector, FaceSelection::Largest, 48).unwrap();
        assert!(largest.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn no_face_is_reported() {
        let gray = GrayImage::new(64, 64);
        let result = preprocess_face(&gray, &FixedDetector(Vec::new()), FaceSelection::First, 48);
        assert!(matches!(result, Err(VisionError::NoFaceDetected)));
    }
}
