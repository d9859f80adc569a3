//! verifier-core — decides whether a civic-issue photo supports its claimed category.
//!
//! Provides image normalization, the classification oracle seam with an ONNX
//! implementation, keyword-based category matching, verdict composition and
//! result reporting used by the CLI frontend.

pub mod categories;
pub mod config;
pub mod error;
pub mod inference;
pub mod matcher;
pub mod preprocess;
pub mod report;
pub mod verify;

pub use categories::{Category, CategoryVocabulary};
pub use config::VerifierConfig;
pub use error::{ErrorKind, VerifyError, VerifyResult};
pub use inference::{Classifier, LabelPrediction, OnnxClassifier, OracleInfo, Ranking};
pub use preprocess::{ImageTensor, RawImage};
pub use report::VerificationResult;
pub use verify::Verifier;
