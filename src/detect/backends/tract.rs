#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::vision::ModelInput;

/// Tract-based backend for ONNX inference.
///
/// Loads a local YOLO-style model and flattens its output into raw detection
/// rows. The model output is expected as `[1, rows, 4 + 1 + classes]`
/// (cx, cy, w, h, objectness, per-class scores), with the transposed layout
/// `[1, 4 + 1 + classes, rows]` also accepted.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, input: &ModelInput) -> Result<Tensor> {
        let size = self.input_size as usize;
        if input.shape() != [1, 3, size, size] {
            return Err(anyhow!(
                "input tensor shape {:?} does not match model input 1x3x{}x{}",
                input.shape(),
                size,
                size
            ));
        }
        let standard = input.as_standard_layout();
        let slice = standard
            .as_slice()
            .ok_or_else(|| anyhow!("input tensor is not contiguous"))?;
        Tensor::from_shape(&[1, 3, size, size], slice).context("build input tensor")
    }

    fn parse_rows(&self, outputs: TVec<TValue>) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }

        // Rows along the longer axis, features along the shorter.
        let rows_first = shape[1] >= shape[2];
        let (rows, features) = if rows_first {
            (shape[1], shape[2])
        } else {
            (shape[2], shape[1])
        };
        if features < 6 {
            return Err(anyhow!(
                "model output has {} features per row; expected at least 6",
                features
            ));
        }

        let at = |row: usize, feature: usize| -> f32 {
            if rows_first {
                view[[0, row, feature]]
            } else {
                view[[0, feature, row]]
            }
        };

        let mut detections = Vec::new();
        for row in 0..rows {
            let objectness = at(row, 4);
            let (class_id, class_score) = (5..features)
                .map(|f| (f - 5, at(row, f)))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            let confidence = objectness * class_score;
            if !confidence.is_finite() || confidence <= 0.0 {
                continue;
            }

            let (cx, cy, w, h) = (at(row, 0), at(row, 1), at(row, 2), at(row, 3));
            detections.push(RawDetection::new(
                [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                confidence,
                class_id as u32,
            ));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, input: &ModelInput) -> Result<Vec<RawDetection>> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        self.parse_rows(outputs)
    }
}
