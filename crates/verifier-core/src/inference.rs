//! Classification oracle: the `Classifier` seam and its ONNX implementation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VerifierConfig;
use crate::preprocess::ImageTensor;

/// One (label, probability) pair from the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPrediction {
    pub label: String,
    pub probability: f32,
}

impl LabelPrediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Predictions ordered by probability, highest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking(Vec<LabelPrediction>);

impl Ranking {
    /// Pair each score with its label and sort descending. Ties keep class-index order.
    pub fn from_scores(labels: &[String], scores: &[f32]) -> Result<Self> {
        if labels.len() != scores.len() {
            bail!(
                "model produced {} scores but {} labels are loaded",
                scores.len(),
                labels.len()
            );
        }
        let predictions = labels
            .iter()
            .zip(scores)
            .map(|(label, &p)| LabelPrediction::new(label.clone(), p))
            .collect();
        Ok(Self::from_predictions(predictions))
    }

    pub fn from_predictions(mut predictions: Vec<LabelPrediction>) -> Self {
        predictions.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        Self(predictions)
    }

    /// The `k` best predictions (fewer if the ranking is shorter).
    pub fn top(&self, k: usize) -> &[LabelPrediction] {
        &self.0[..k.min(self.0.len())]
    }

    pub fn first(&self) -> Option<&LabelPrediction> {
        self.0.first()
    }
}

/// Identity of the loaded model, reported by the health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleInfo {
    pub model: String,
    pub version: String,
}

/// Anything that can turn a normalized image into ranked labels.
///
/// Implementations must be safe to call from several threads at once.
pub trait Classifier: Send + Sync {
    fn predict(&self, tensor: &ImageTensor) -> Result<Ranking>;

    fn info(&self) -> OracleInfo;
}

/// MobileNetV2 (or any NHWC ImageNet classifier) exported to ONNX.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_name: String,
    output_name: String,
    info: OracleInfo,
}

impl OnnxClassifier {
    /// Load the ONNX model and its class labels.
    pub fn load(model_path: &Path, labels_path: &Path, config: &VerifierConfig) -> Result<Self> {
        let labels = load_labels(labels_path)?;
        info!(
            model = %model_path.display(),
            labels = labels.len(),
            "loading classification model"
        );

        let session = Session::builder()?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(model_path)
            .with_context(|| format!("cannot load model {}", model_path.display()))?;

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
            info: OracleInfo {
                model: config.model_name.clone(),
                version: config.model_version.clone(),
            },
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, tensor: &ImageTensor) -> Result<Ranking> {
        let input_tensor = TensorRef::from_array_view(tensor.as_array())?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("lock error: {e}"))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output_array = outputs[self.output_name.as_str()].try_extract_array::<f32>()?;
        let scores: Vec<f32> = output_array.iter().copied().collect();
        debug!(scores = scores.len(), "inference complete");

        Ranking::from_scores(&self.labels, &scores)
    }

    fn info(&self) -> OracleInfo {
        self.info.clone()
    }
}

/// Read class labels in index order.
///
/// Accepts Keras' `imagenet_class_index.json` (`{"0": ["n01440764", "tench"], ...}`)
/// or a plain text file with one label per line.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let data =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let labels = if is_json {
        parse_class_index(&data)?
    } else {
        data.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    };

    if labels.is_empty() {
        bail!("no labels in {}", path.display());
    }
    Ok(labels)
}

fn parse_class_index(data: &str) -> Result<Vec<String>> {
    let raw: BTreeMap<String, (String, String)> =
        serde_json::from_str(data).context("malformed class index")?;

    let mut indexed = raw
        .into_iter()
        .map(|(idx, (_wnid, name))| {
            idx.parse::<usize>()
                .map(|i| (i, name))
                .map_err(|_| anyhow!("class index key is not a number: {idx}"))
        })
        .collect::<Result<Vec<_>>>()?;
    indexed.sort_by_key(|(i, _)| *i);

    for (expected, (i, _)) in indexed.iter().enumerate() {
        if *i != expected {
            bail!("class index has a gap at {expected}");
        }
    }
    Ok(indexed.into_iter().map(|(_, name)| name).collect())
}
