//! Concrete `Backend` over the real ONNX Runtime: optimization level 3,
//! a platform-ordered execution-provider list with CPU always as
//! fallback.

use std::path::Path;

use ndarray::{Array, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{Backend, NamedTensors};
use crate::config::{ExecutionProviderConfig, SessionConfig};
use crate::error::{OnnxKitError, Result};
use crate::tensor::{ElementType, Tensor};

pub struct OrtBackend {
    session: Session,
}

impl OrtBackend {
    pub fn load<P: AsRef<Path>>(model_path: P, config: &SessionConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("loading ONNX model from {}", model_path.display());

        let mut builder = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(config.intra_op_threads))
            .map_err(|e| OnnxKitError::backend_with_source("building session", e))?;

        for provider in &config.execution_providers {
            builder = apply_provider(builder, *provider)?;
        }

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| OnnxKitError::backend_with_source("loading model file", e))?;

        debug!("ONNX session ready, {} inputs, {} outputs",
            session.inputs.len(), session.outputs.len());

        Ok(Self { session })
    }

    fn input_info(&self, name: &str) -> Option<&ort::session::Input> {
        self.session.inputs.iter().find(|i| i.name == name)
    }
}

fn apply_provider(
    builder: ort::session::builder::SessionBuilder,
    provider: ExecutionProviderConfig,
) -> Result<ort::session::builder::SessionBuilder> {
    use ort::ep;

    let dispatch = match provider {
        ExecutionProviderConfig::Cpu => ep::CPU::default().build(),
        #[cfg(target_os = "macos")]
        ExecutionProviderConfig::CoreMl => ep::CoreML::default().build(),
        #[cfg(not(target_os = "macos"))]
        ExecutionProviderConfig::CoreMl => return Ok(builder),
        #[cfg(feature = "cuda")]
        ExecutionProviderConfig::Cuda => ep::CUDA::default().build(),
        #[cfg(not(feature = "cuda"))]
        ExecutionProviderConfig::Cuda => return Ok(builder),
        #[cfg(feature = "cuda")]
        ExecutionProviderConfig::TensorRt => ep::TensorRT::default().build(),
        #[cfg(not(feature = "cuda"))]
        ExecutionProviderConfig::TensorRt => return Ok(builder),
        #[cfg(target_os = "windows")]
        ExecutionProviderConfig::DirectMl => ep::DirectML::default().build(),
        #[cfg(not(target_os = "windows"))]
        ExecutionProviderConfig::DirectMl => return Ok(builder),
    };

    builder
        .with_execution_providers([dispatch])
        .map_err(|e| OnnxKitError::backend_with_source("attaching execution provider", e))
}

fn tensor_to_value(tensor: &Tensor) -> Result<ort::value::DynValue> {
    let shape: Vec<usize> = tensor.shape();
    match tensor.element_type() {
        ElementType::F32 => {
            let data = tensor.to_f32()?;
            let arr = Array::from_shape_vec(IxDyn(&shape), data)
                .map_err(|e| OnnxKitError::backend_with_source("shaping f32 input", e))?;
            Ok(Value::from_array(arr)
                .map_err(|e| OnnxKitError::backend_with_source("building f32 value", e))?
                .into_dyn())
        }
        ElementType::I64 => {
            let data = tensor.to_i64()?;
            let arr = Array::from_shape_vec(IxDyn(&shape), data)
                .map_err(|e| OnnxKitError::backend_with_source("shaping i64 input", e))?;
            Ok(Value::from_array(arr)
                .map_err(|e| OnnxKitError::backend_with_source("building i64 value", e))?
                .into_dyn())
        }
        ElementType::F16 => {
            let bits = tensor.to_f16_bits()?;
            let data: Vec<half::f16> = bits.into_iter().map(half::f16::from_bits).collect();
            let arr = Array::from_shape_vec(IxDyn(&shape), data)
                .map_err(|e| OnnxKitError::backend_with_source("shaping f16 input", e))?;
            Ok(Value::from_array(arr)
                .map_err(|e| OnnxKitError::backend_with_source("building f16 value", e))?
                .into_dyn())
        }
        ElementType::Utf8 => Err(OnnxKitError::backend("string tensor inputs are not supported by this backend")),
    }
}

impl Backend for OrtBackend {
    fn input_names(&self) -> Vec<String> {
        self.session.inputs.iter().map(|i| i.name.clone()).collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.session.outputs.iter().map(|o| o.name.clone()).collect()
    }

    fn input_shape(&self, name: &str) -> Option<Vec<usize>> {
        let info = self.input_info(name)?;
        let dims = info.input_type.tensor_dimensions()?;
        Some(dims.iter().map(|&d| if d < 0 { 0 } else { d as usize }).collect())
    }

    fn input_element_type(&self, name: &str) -> Option<ElementType> {
        let info = self.input_info(name)?;
        match info.input_type.tensor_type()? {
            ort::tensor::TensorElementType::Float32 => Some(ElementType::F32),
            ort::tensor::TensorElementType::Float16 => Some(ElementType::F16),
            ort::tensor::TensorElementType::Int64 => Some(ElementType::I64),
            ort::tensor::TensorElementType::String => Some(ElementType::Utf8),
            _ => None,
        }
    }

    fn run(&self, inputs: NamedTensors) -> Result<NamedTensors> {
        let mut values = Vec::with_capacity(inputs.len());
        for (name, tensor) in &inputs {
            values.push((name.as_str(), tensor_to_value(tensor)?));
        }

        let outputs = self
            .session
            .run(values)
            .map_err(|e| OnnxKitError::backend_with_source("running backend inference", e))?;

        let mut result = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let tensor = value_to_tensor(value)?;
            result.push((name.to_string(), tensor));
        }
        Ok(result)
    }
}

fn value_to_tensor(value: &ort::value::DynValue) -> Result<Tensor> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        return Tensor::from_f32(data.to_vec(), shape.iter().map(|&d| d as usize).collect());
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
        return Tensor::from_i64(data.to_vec(), shape.iter().map(|&d| d as usize).collect());
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<half::f16>() {
        let bits: Vec<u16> = data.iter().map(|v| v.to_bits()).collect();
        return Tensor::from_f16(bits, shape.iter().map(|&d| d as usize).collect());
    }
    Err(OnnxKitError::backend("unsupported output tensor element type"))
}
