#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionRegion;
use crate::detect::yolo::{decode_output, letterbox, YoloParams};
use crate::frame::Frame;

/// Tract-based backend for YOLOv8 ONNX models.
///
/// Loads a local model file once and runs it on letterboxed RGB frames.
/// No network I/O, no writes to disk.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    params: YoloParams,
    class_names: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        params: YoloParams,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = params.input_size as usize;
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

        log::info!(
            "TractBackend: loaded {} ({} classes, input {}x{})",
            model_path.display(),
            class_names.len(),
            size,
            size
        );

        Ok(Self {
            model,
            params,
            class_names,
        })
    }

    fn build_input(&self, frame: &Frame) -> (Tensor, crate::detect::yolo::Letterbox) {
        let (canvas, lb) = letterbox(frame.image(), self.params.input_size);
        let size = self.params.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        (input.into_tensor(), lb)
    }

    fn label_for(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionRegion>> {
        let (input, lb) = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unexpected YOLOv8 output shape {:?}", shape));
        }
        let num_anchors = shape[2];
        let data: Vec<f32> = view.iter().copied().collect();

        let raw = decode_output(
            &data,
            num_anchors,
            &lb,
            frame.width(),
            frame.height(),
            &self.params,
        )?;
        Ok(raw
            .into_iter()
            .map(|d| DetectionRegion::new(self.label_for(d.class_id), d.confidence, d.bbox))
            .collect())
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::filled(self.params.input_size, self.params.input_size, [0, 0, 0], 0);
        self.detect(&blank).map(|_| ())
    }
}
