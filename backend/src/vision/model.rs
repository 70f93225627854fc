use ndarray::Array4;
use std::path::Path;
use std::sync::Arc;

use super::VisionError;
use super::classify::softmax;
use super::config::ModelConfig;

/// Anything that maps a `[1, H, W, 1]` face tensor onto per-class probabilities.
pub trait EmotionClassifier: Send + Sync {
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, VisionError>;
}

trait InferenceBackend: Send + Sync {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, VisionError>;
}

/// Pre-trained emotion classifier loaded from disk.
pub struct Model {
    backend: Box<dyn InferenceBackend>,
    apply_softmax: bool,
}

impl Model {
    pub fn load(path: &Path, config: &ModelConfig) -> Result<Self, VisionError> {
        if !path.exists() {
            return Err(VisionError::ModelLoad {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }
        Ok(Self {
            backend: open_backend(path)?,
            apply_softmax: config.apply_softmax,
        })
    }
}

impl EmotionClassifier for Model {
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, VisionError> {
        let output = self.backend.forward(input)?;
        if self.apply_softmax {
            Ok(softmax(&output))
        } else {
            Ok(output)
        }
    }
}

fn open_backend(path: &Path) -> Result<Box<dyn InferenceBackend>, VisionError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        #[cfg(feature = "onnx")]
        "onnx" => Ok(Box::new(onnx::OnnxBackend::load(path)?)),
        #[cfg(feature = "torch")]
        "pt" | "pth" => Ok(Box::new(torch::TorchBackend::load(path)?)),
        other => Err(VisionError::ModelLoad {
            path: path.to_path_buf(),
            reason: format!("unsupported model format '{}' for this build", other),
        }),
    }
}

/// Startup hook: a missing or broken artifact leaves the classifier unloaded.
pub fn load_emotion_model(path: &Path, config: &ModelConfig) -> Option<Arc<dyn EmotionClassifier>> {
    if !path.exists() {
        log::warn!("Model file not found at: {}", path.display());
        return None;
    }
    match Model::load(path, config) {
        Ok(model) => {
            log::info!("Emotion detection model loaded from {}", path.display());
            Some(Arc::new(model))
        }
        Err(e) => {
            log::error!("Error loading model: {}", e);
            None
        }
    }
}

#[cfg(feature = "onnx")]
mod onnx {
    use ndarray::Array4;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::path::Path;
    use std::sync::Mutex;

    use super::InferenceBackend;
    use crate::vision::VisionError;

    pub struct OnnxBackend {
        session: Mutex<Session>,
        input_name: String,
    }

    impl OnnxBackend {
        pub fn load(path: &Path) -> Result<Self, VisionError> {
            let load_error = |reason: String| VisionError::ModelLoad {
                path: path.to_path_buf(),
                reason,
            };

            let session = Session::builder()
                .and_then(|builder| builder.commit_from_file(path))
                .map_err(|e| load_error(e.to_string()))?;
            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| load_error("model has no input tensors defined".to_string()))?;

            Ok(Self {
                session: Mutex::new(session),
                input_name,
            })
        }
    }

    impl InferenceBackend for OnnxBackend {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, VisionError> {
            let input_tensor = Tensor::from_array(input.clone())
                .map_err(|e| VisionError::Inference(format!("Failed to create input tensor: {}", e)))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| VisionError::Inference("Failed to acquire session lock".to_string()))?;

            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input_tensor])
                .map_err(|e| VisionError::Inference(format!("Inference failed: {}", e)))?;

            let output = outputs
                .iter()
                .next()
                .map(|(_, value)| value)
                .ok_or_else(|| VisionError::Inference("No output tensor from model".to_string()))?;

            let (_shape, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Inference(format!("Failed to extract output tensor: {}", e)))?;

            Ok(data.to_vec())
        }
    }
}

#[cfg(feature = "torch")]
mod torch {
    use ndarray::Array4;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    use super::InferenceBackend;
    use crate::vision::VisionError;

    pub struct TorchBackend {
        module: Mutex<CModule>,
        device: Device,
    }

    impl TorchBackend {
        pub fn load(path: &Path) -> Result<Self, VisionError> {
            let device = Device::cuda_if_available();
            let module = CModule::load_on_device(path, device).map_err(|e| VisionError::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            Ok(Self {
                module: Mutex::new(module),
                device,
            })
        }
    }

    impl InferenceBackend for TorchBackend {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, VisionError> {
            let dims: Vec<i64> = input.shape().iter().map(|d| *d as i64).collect();
            let data: Vec<f32> = input.iter().copied().collect();
            let tensor = Tensor::from_slice(&data)
                .view(dims.as_slice())
                .to_device(self.device);

            let module = self
                .module
                .lock()
                .map_err(|_| VisionError::Inference("Failed to acquire module lock".to_string()))?;
            let output = module
                .forward_ts(&[tensor])
                .map_err(|e| VisionError::Inference(e.to_string()))?;
            let output = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);

            Vec::<f32>::try_from(&output).map_err(|e| VisionError::Inference(e.to_string()))
        }
    }
}
