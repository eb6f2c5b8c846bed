use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use super::classifier::{Classifier, ClassifierError};
use super::preprocess::ImageTensor;

/// TorchScript export of the handwriting classifier. The module expects an
/// NCHW float batch and emits the positive-class probability per item.
pub struct TorchClassifier {
    model: Mutex<CModule>,
    device: Device,
}

impl TorchClassifier {
    pub fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        let device = Device::cuda_if_available();
        let model = CModule::load_on_device(model_path, device)
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;
        log::info!("Loaded classifier from {} on {:?}", model_path.display(), device);
        Ok(Self {
            model: Mutex::new(model),
            device,
        })
    }

    fn to_tensor(&self, input: &ImageTensor) -> Result<Tensor, ClassifierError> {
        let data = input
            .as_slice()
            .ok_or_else(|| ClassifierError::Prediction("input is not contiguous".into()))?;
        let dims: Vec<i64> = input.shape().iter().map(|d| *d as i64).collect();
        let tensor = Tensor::from_slice(data)
            .view(dims.as_slice())
            .permute([0, 3, 1, 2])
            .to_device(self.device);
        Ok(tensor)
    }
}

impl Classifier for TorchClassifier {
    fn predict(&self, input: &ImageTensor) -> Result<f32, ClassifierError> {
        let tensor = self.to_tensor(input)?;
        let model = self
            .model
            .lock()
            .map_err(|_| ClassifierError::Unavailable("model lock poisoned".into()))?;
        let output = model
            .forward_ts(&[tensor])
            .map_err(|e| ClassifierError::Prediction(e.to_string()))?;
        let output_flat = output.to_kind(Kind::Float).view([-1]);
        let prob = output_flat
            .f_double_value(&[0])
            .map_err(|e| ClassifierError::Prediction(e.to_string()))?;
        Ok(prob as f32)
    }

    fn name(&self) -> &str {
        "torchscript"
    }
}
