//! Face detection and 68-point landmark extraction.
//!
//! Production path: YuNet (OpenCV FaceDetectorYN) proposes face boxes, then
//! a 68-point landmark ONNX model is run on an expanded square crop of each
//! box. Landmark coordinates are mapped back to frame space from the crop.
//!
//! `LandmarkDetector` is the seam the pipeline consumes; tests substitute a
//! scripted fake.

use std::path::{Path, PathBuf};

use lipblend_models::{LandmarkPoint, LandmarkSet, LANDMARK_COUNT};
use opencv::core::{Mat, Rect, Size};
use opencv::dnn::{DNN_BACKEND_DEFAULT, DNN_TARGET_CPU};
use opencv::imgproc;
use opencv::objdetect::FaceDetectorYN;
use opencv::prelude::{FaceDetectorYNTrait, MatTraitConst, MatTraitConstManual};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Score threshold for YuNet face proposals.
const SCORE_THRESHOLD: f32 = 0.6;

/// NMS threshold for YuNet.
const NMS_THRESHOLD: f32 = 0.3;

/// Maximum faces kept per frame.
const TOP_K: i32 = 10;

/// Landmark model input side length.
const LANDMARK_INPUT_SIZE: i32 = 112;

/// Crop padding ratio around a YuNet box before landmark inference.
const CROP_PAD_RATIO: f32 = 0.25;

/// YuNet model search paths, in preference order.
const YUNET_MODEL_PATHS: &[&str] = &[
    "./models/face_detection/face_detection_yunet_2023mar.onnx",
    "/app/models/face_detection/face_detection_yunet_2023mar.onnx",
    "./models/face_detection_yunet_2023mar.onnx",
];

/// 68-point landmark model search paths, in preference order.
const LANDMARK_MODEL_PATHS: &[&str] = &[
    "./models/face_landmarks/face_landmarks_68.onnx",
    "/app/models/face_landmarks/face_landmarks_68.onnx",
    "./models/face_landmarks_68.onnx",
];

/// Detects faces in a frame and returns one landmark set per face.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame_bgr: &Mat) -> MediaResult<Vec<LandmarkSet>>;
}

/// YuNet + ONNX landmark detector.
pub struct OnnxLandmarkDetector {
    yunet: opencv::core::Ptr<FaceDetectorYN>,
    session: Session,
    input_size: Size,
}

impl OnnxLandmarkDetector {
    /// Load both models from their default search paths (env-overridable
    /// via `LIPBLEND_YUNET_MODEL` / `LIPBLEND_LANDMARK_MODEL`).
    ///
    /// Fails before any frame is processed if either model file is missing.
    pub fn new_default() -> MediaResult<Self> {
        let yunet_path = resolve_model_path("LIPBLEND_YUNET_MODEL", YUNET_MODEL_PATHS)
            .ok_or_else(|| {
                MediaError::model_not_found(
                    "YuNet face detection model; place it under models/face_detection/",
                )
            })?;
        let landmark_path = resolve_model_path("LIPBLEND_LANDMARK_MODEL", LANDMARK_MODEL_PATHS)
            .ok_or_else(|| {
                MediaError::model_not_found(
                    "68-point landmark model; place it under models/face_landmarks/",
                )
            })?;
        Self::new_with_models(&yunet_path, &landmark_path)
    }

    /// Load both models from explicit paths.
    pub fn new_with_models(yunet_path: &Path, landmark_path: &Path) -> MediaResult<Self> {
        for path in [yunet_path, landmark_path] {
            if !path.exists() {
                return Err(MediaError::model_not_found(path.display().to_string()));
            }
        }

        // Input size is updated per frame before each detect call.
        let yunet = FaceDetectorYN::create(
            &yunet_path.to_string_lossy(),
            "",
            Size::new(320, 320),
            SCORE_THRESHOLD,
            NMS_THRESHOLD,
            TOP_K,
            DNN_BACKEND_DEFAULT,
            DNN_TARGET_CPU,
        )
        .map_err(|e| MediaError::detection_failed(format!("YuNet create: {e}")))?;

        let model_bytes = std::fs::read(landmark_path)
            .map_err(|e| MediaError::detection_failed(format!("ORT read model file: {e}")))?;
        let session = Session::builder()
            .map_err(|e| MediaError::detection_failed(format!("ORT session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| MediaError::detection_failed(format!("ORT opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| MediaError::detection_failed(format!("ORT load model: {e}")))?;

        info!(
            yunet = %yunet_path.display(),
            landmarks = %landmark_path.display(),
            "Landmark detector initialized"
        );

        Ok(Self {
            yunet,
            session,
            input_size: Size::new(320, 320),
        })
    }

    /// Run YuNet on the full frame and return clamped face boxes.
    fn face_boxes(&mut self, frame: &Mat) -> MediaResult<Vec<Rect>> {
        let size = frame.size()?;
        if size != self.input_size {
            self.yunet
                .set_input_size(size)
                .map_err(|e| MediaError::detection_failed(format!("YuNet input size: {e}")))?;
            self.input_size = size;
        }

        let mut faces = Mat::default();
        self.yunet
            .detect(frame, &mut faces)
            .map_err(|e| MediaError::detection_failed(format!("YuNet detect: {e}")))?;

        let mut boxes = Vec::new();
        for i in 0..faces.rows() {
            let value = |col: i32| -> MediaResult<f32> {
                faces
                    .at_2d::<f32>(i, col)
                    .map(|v| *v)
                    .map_err(|e| MediaError::detection_failed(format!("YuNet output: {e}")))
            };

            let score = value(14)?;
            if score < SCORE_THRESHOLD {
                continue;
            }

            let x = value(0)?.max(0.0) as i32;
            let y = value(1)?.max(0.0) as i32;
            let w = (value(2)? as i32).min(size.width - x);
            let h = (value(3)? as i32).min(size.height - y);
            if w <= 0 || h <= 0 {
                continue;
            }
            boxes.push(Rect::new(x, y, w, h));
        }

        debug!("YuNet proposed {} face(s)", boxes.len());
        Ok(boxes)
    }

    /// Infer 68 landmarks inside one face crop, in frame coordinates.
    fn landmarks_for_box(&mut self, frame: &Mat, roi: &Rect) -> MediaResult<LandmarkSet> {
        let crop_rect = make_square_crop(frame, roi, CROP_PAD_RATIO)?;
        let crop_rgb = extract_rgb_crop(frame, &crop_rect)?;

        let mut resized = Mat::default();
        imgproc::resize(
            &crop_rgb,
            &mut resized,
            Size::new(LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| MediaError::detection_failed(format!("Resize failed: {e}")))?;

        let tensor = mat_to_chw_tensor(&resized)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| MediaError::detection_failed(format!("ORT run failed: {e}")))?;

        let output = outputs
            .get("output")
            .ok_or_else(|| MediaError::detection_failed("landmark model has no 'output' tensor"))?;

        extract_landmark_set(output, &crop_rect)
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame_bgr: &Mat) -> MediaResult<Vec<LandmarkSet>> {
        if frame_bgr.empty() {
            return Ok(Vec::new());
        }

        let boxes = self.face_boxes(frame_bgr)?;
        let mut sets = Vec::with_capacity(boxes.len());
        for roi in &boxes {
            sets.push(self.landmarks_for_box(frame_bgr, roi)?);
        }
        Ok(sets)
    }
}

/// First existing model path: env override, then the candidate list.
fn resolve_model_path(env_var: &str, candidates: &[&str]) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(env_var) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Expand ROI by `pad_ratio`, square it, and clamp to the frame.
fn make_square_crop(frame: &Mat, roi: &Rect, pad_ratio: f32) -> MediaResult<Rect> {
    let w = roi.width as f32;
    let h = roi.height as f32;
    let size = w.max(h) * (1.0 + pad_ratio);

    let center_x = roi.x as f32 + w / 2.0;
    let center_y = roi.y as f32 + h / 2.0;

    let mut x = center_x - size / 2.0;
    let mut y = center_y - size / 2.0;
    let mut s = size;

    let frame_w = frame.cols() as f32;
    let frame_h = frame.rows() as f32;

    if x < 0.0 {
        s += x;
        x = 0.0;
    }
    if y < 0.0 {
        s += y;
        y = 0.0;
    }
    if x + s > frame_w {
        s = frame_w - x;
    }
    if y + s > frame_h {
        s = frame_h - y;
    }

    if s < 8.0 {
        return Err(MediaError::detection_failed("ROI too small for landmarks"));
    }

    Ok(Rect::new(
        x.round() as i32,
        y.round() as i32,
        s.round() as i32,
        s.round() as i32,
    ))
}

/// Extract RGB crop from a BGR frame.
fn extract_rgb_crop(frame_bgr: &Mat, crop: &Rect) -> MediaResult<Mat> {
    let roi = Mat::roi(frame_bgr, *crop)
        .map_err(|e| MediaError::detection_failed(format!("ROI failed: {e}")))?;
    let mut rgb = Mat::default();
    imgproc::cvt_color(
        &roi,
        &mut rgb,
        imgproc::COLOR_BGR2RGB,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MediaError::detection_failed(format!("BGR2RGB failed: {e}")))?;
    Ok(rgb)
}

/// Convert Mat (RGB, HxWx3) to an ORT tensor (1,3,H,W) normalized to [0,1].
fn mat_to_chw_tensor(mat_rgb: &Mat) -> MediaResult<Value> {
    let size = mat_rgb
        .size()
        .map_err(|e| MediaError::detection_failed(format!("Mat size: {e}")))?;
    let (h, w) = (size.height, size.width);
    if mat_rgb.channels() != 3 {
        return Err(MediaError::detection_failed("Expected 3-channel RGB Mat"));
    }

    let data = mat_rgb
        .data_typed::<u8>()
        .map_err(|e| MediaError::detection_failed(format!("Mat data: {e}")))?;

    let mut chw = Vec::with_capacity((h * w * 3) as usize);
    // HWC -> CHW
    for c in 0..3 {
        for y in 0..h {
            for x in 0..w {
                let idx = (y * w * 3 + x * 3 + c) as usize;
                chw.push(data[idx] as f32 / 255.0);
            }
        }
    }

    let shape = vec![1usize, 3, h as usize, w as usize];
    let boxed = chw.into_boxed_slice();
    Tensor::from_array((shape, boxed))
        .map(Value::from)
        .map_err(|e| MediaError::detection_failed(format!("ORT tensor: {e}")))
}

/// Map the model's normalized (x, y) pairs back to frame coordinates.
fn extract_landmark_set(output: &Value, crop: &Rect) -> MediaResult<LandmarkSet> {
    let (_, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;

    if data.len() < LANDMARK_COUNT * 2 {
        return Err(MediaError::detection_failed(format!(
            "landmark output too small: {} values",
            data.len()
        )));
    }

    let mut points = Vec::with_capacity(LANDMARK_COUNT);
    for i in 0..LANDMARK_COUNT {
        let nx = data[i * 2];
        let ny = data[i * 2 + 1];
        points.push(LandmarkPoint::new(
            crop.x + (nx * crop.width as f32).round() as i32,
            crop.y + (ny * crop.height as f32).round() as i32,
        ));
    }

    LandmarkSet::new(points)
        .map_err(|e| MediaError::detection_failed(format!("landmark shape: {e}")))
}
