use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::VisionError;
use super::config::DetectorConfig;

/// rustface rejects smaller windows.
const MIN_SUPPORTED_FACE_SIZE: u32 = 20;

/// Bounding box of a detected face, in grayscale image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersects the box with the image bounds, `None` when nothing is left.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<FaceBox> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(FaceBox {
            width,
            height,
            ..*self
        })
    }
}

/// Which box to keep when the detector reports several faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceSelection {
    /// Detector order.
    #[default]
    First,
    Largest,
    MostConfident,
}

impl FaceSelection {
    pub fn select(&self, faces: &[FaceBox]) -> Option<FaceBox> {
        match self {
            FaceSelection::First => faces.first().copied(),
            // max_by_key keeps the last of equal elements; reverse so ties resolve to detector order
            FaceSelection::Largest => faces.iter().rev().max_by_key(|face| face.area()).copied(),
            FaceSelection::MostConfident => faces
                .iter()
                .rev()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .copied(),
        }
    }
}

/// Pluggable face detection backend.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>, VisionError>;
}

/// Funnel-structured cascade detector (SeetaFace) backed by `rustface`.
///
/// rustface detectors need `&mut self` and are not `Send`, so the parsed
/// cascade is kept and a detector is built from a clone of it per call.
pub struct SeetaFaceDetector {
    model: rustface::Model,
    settings: DetectorConfig,
}

impl SeetaFaceDetector {
    pub fn load(path: &Path, settings: DetectorConfig) -> Result<Self, VisionError> {
        let file = File::open(path).map_err(|e| VisionError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| VisionError::ModelLoad {
            path: path.to_path_buf(),
            reason: format!("invalid cascade model: {}", e),
        })?;
        Ok(Self { model, settings })
    }

    fn build_detector(&self) -> Box<dyn rustface::Detector> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.settings.min_face_size.max(MIN_SUPPORTED_FACE_SIZE));
        detector.set_score_thresh(self.settings.score_threshold);
        // rustface shrinks by this factor between levels
        detector.set_pyramid_scale_factor((1.0 / self.settings.scale_factor).clamp(0.01, 0.99));
        detector.set_slide_window_step(
            self.settings.slide_window_step,
            self.settings.slide_window_step,
        );
        detector
    }
}

/// Boxes may start off-image; the origin is shifted back inside and the
/// extent shrunk by the same amount before clamping to the image.
fn face_box_from(
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    score: f64,
    image_width: u32,
    image_height: u32,
) -> Option<FaceBox> {
    let width = (width as i64 + x.min(0) as i64).max(0) as u32;
    let height = (height as i64 + y.min(0) as i64).max(0) as u32;
    FaceBox {
        x: x.max(0) as u32,
        y: y.max(0) as u32,
        width,
        height,
        score,
    }
    .clamp_to(image_width, image_height)
}

impl FaceDetector for SeetaFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>, VisionError> {
        let (width, height) = gray.dimensions();
        let min_size = self.settings.min_face_size.max(MIN_SUPPORTED_FACE_SIZE);
        if width < min_size || height < min_size {
            return Ok(Vec::new());
        }

        let mut detector = self.build_detector();
        let image = rustface::ImageData::new(gray.as_raw(), width, height);
        let faces = detector
            .detect(&image)
            .into_iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                face_box_from(
                    bbox.x(),
                    bbox.y(),
                    bbox.width(),
                    bbox.height(),
                    face.score(),
                    width,
                    height,
                )
            })
            .collect::<Vec<_>>();

        log::debug!("Cascade detector found {} face(s)", faces.len());
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: u32, y: u32, size: u32, score: f64) -> FaceBox {
        FaceBox {
            x,
            y,
            width: size,
            height: size,
            score,
        }
    }

    #[test]
    fn first_policy_keeps_detector_order() {
        let faces = [face(0, 0, 30, 1.0), face(50, 50, 80, 9.0)];
        assert_eq!(FaceSelection::First.select(&faces), Some(faces[0]));
    }

    #[test]
    fn largest_and_most_confident_pick_by_metric() {
        let faces = [face(0, 0, 30, 9.0), face(50, 50, 80, 3.0), face(10, 10, 80, 1.0)];
        assert_eq!(FaceSelection::Largest.select(&faces), Some(faces[1]));
        assert_eq!(FaceSelection::MostConfident.select(&faces), Some(faces[0]));
    }

    #[test]
    fn empty_detection_selects_nothing() {
        assert_eq!(FaceSelection::Largest.select(&[]), None);
    }

    #[test]
    fn boxes_are_clamped_to_the_image() {
        let clamped = face(90, 10, 30, 1.0).clamp_to(100, 100).unwrap();
        assert_eq!((clamped.x, clamped.y, clamped.width, clamped.height), (90, 10, 10, 30));
        assert_eq!(face(100, 0, 10, 1.0).clamp_to(100, 100), None);
    }

    #[test]
    fn selection_policy_parses_from_snake_case() {
        let policy: FaceSelection = serde_yaml::from_str("most_confident").unwrap();
        assert_eq!(policy, FaceSelection::MostConfident);
    }

    fn bundled_detector() -> SeetaFaceDetector {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../model/seeta_fd_frontal_v1.0.bin");
        SeetaFaceDetector::load(&path, DetectorConfig::default()).unwrap()
    }

    #[test]
    fn detector_is_shareable_across_workers() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SeetaFaceDetector>();
    }

    #[test]
    fn off_image_boxes_are_shifted_inside() {
        let shifted = face_box_from(-10, -5, 40, 40, 3.0, 100, 100).unwrap();
        assert_eq!(
            (shifted.x, shifted.y, shifted.width, shifted.height),
            (0, 0, 30, 35)
        );
        assert_eq!(shifted.score, 3.0);

        assert_eq!(face_box_from(-50, 0, 40, 40, 3.0, 100, 100), None);
        let edge = face_box_from(80, 90, 40, 40, 3.0, 100, 100).unwrap();
        assert_eq!((edge.width, edge.height), (20, 10));
    }

    #[test]
    fn images_below_the_minimum_window_have_no_faces() {
        let detector = bundled_detector();
        let tiny = GrayImage::from_pixel(19, 64, image::Luma([128]));
        assert!(detector.detect(&tiny).unwrap().is_empty());
    }

    #[test]
    fn synthetic_image_without_faces_yields_nothing() {
        let detector = bundled_detector();
        let gradient = GrayImage::from_fn(160, 120, |x, _| image::Luma([(x * 255 / 159) as u8]));
        assert!(detector.detect(&gradient).unwrap().is_empty());
    }

    #[test]
    fn faces_in_a_photo_are_found_inside_the_frame() {
        let detector = bundled_detector();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/faces.png");
        let photo = image::open(path).unwrap().to_luma8();

        let faces = detector.detect(&photo).unwrap();
        assert!(!faces.is_empty());
        for face in &faces {
            assert!(face.width > 0 && face.height > 0);
            assert!(face.x + face.width <= photo.width());
            assert!(face.y + face.height <= photo.height());
        }
    }

    #[test]
    fn truncated_cascade_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.bin");
        // one hierarchy declared, then truncated
        std::fs::write(&path, [1u8, 0, 0, 0]).unwrap();
        assert!(matches!(
            SeetaFaceDetector::load(&path, DetectorConfig::default()),
            Err(VisionError::ModelLoad { .. })
        ));
    }

    #[test]
    fn loading_a_missing_cascade_fails() {
        let result = SeetaFaceDetector::load(
            Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"),
            DetectorConfig::default(),
        );
        assert!(matches!(result, Err(VisionError::ModelLoad { .. })));
    }
}
