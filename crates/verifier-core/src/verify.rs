//! Verification orchestrator: one request through normalize → classify → match → verdict,
//! plus a parallel batch runner over files on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::categories::CategoryVocabulary;
use crate::config::VerifierConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::inference::{Classifier, OracleInfo};
use crate::matcher::match_category;
use crate::preprocess::{check_content_type, normalize, RawImage};
use crate::report::{compose_verdict, BatchEntry, VerificationResult};

pub const DEFAULT_CATEGORY: &str = "OTHER";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Liveness report for the loaded oracle.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub model: String,
    pub version: String,
}

/// Shared, read-only verification pipeline. Cheap to share across threads via `Arc`.
pub struct Verifier {
    classifier: Arc<dyn Classifier>,
    vocabulary: Arc<CategoryVocabulary>,
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        vocabulary: Arc<CategoryVocabulary>,
        config: VerifierConfig,
    ) -> VerifyResult<Self> {
        config.validate()?;
        Ok(Self {
            classifier,
            vocabulary,
            config,
        })
    }

    /// Verify one uploaded image against the category the reporter claimed.
    pub fn verify(&self, image: RawImage, category: &str) -> VerifyResult<VerificationResult> {
        let tensor = normalize(&image.bytes, &image.content_type)?;
        drop(image);

        let ranking = self
            .classifier
            .predict(&tensor)
            .map_err(|e| VerifyError::Oracle(format!("inference: {e:#}")))?;

        let overall = ranking.top(self.config.overall_top_k);
        let candidates = ranking.top(self.config.match_top_k);
        let category_match = match_category(candidates, category, &self.vocabulary);
        debug!(
            top1 = overall.first().map(|p| p.label.as_str()).unwrap_or(""),
            matched = category_match.matched,
            match_confidence = category_match.confidence,
            "classified image"
        );

        compose_verdict(overall, &category_match, category)
    }

    pub fn oracle_info(&self) -> OracleInfo {
        self.classifier.info()
    }

    pub fn health(&self) -> HealthStatus {
        let info = self.oracle_info();
        HealthStatus {
            status: "healthy",
            model: info.model,
            version: info.version,
        }
    }
}

/// Configuration for a batch run over files on disk.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub target_paths: Vec<PathBuf>,
    pub category: String,
    /// Declared type for every file; when `None` it is derived from each file's extension.
    pub content_type: Option<String>,
    pub images_only: bool,
}

/// Check if a file starts with the signature of a format the decoder knows.
pub fn is_image(path: &Path) -> bool {
    let Ok(data) = fs::read(path) else {
        return false;
    };
    image::guess_format(&data).is_ok()
}

/// Collect all file paths from the given paths (expanding directories).
pub fn collect_files(paths: &[PathBuf], images_only: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if !images_only || is_image(path) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
                let p = entry.into_path();
                if p.is_file() && (!images_only || is_image(&p)) {
                    files.push(p);
                }
            }
        }
    }

    files.sort();
    files
}

/// MIME type implied by a file's extension.
pub fn content_type_for(path: &Path) -> String {
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_CONTENT_TYPE.to_string())
}

pub fn sha256_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Verify every collected file in parallel. Per-file failures become error entries.
pub fn run_batch(verifier: &Verifier, config: &BatchConfig) -> Vec<BatchEntry> {
    let files = collect_files(&config.target_paths, config.images_only);

    files
        .par_iter()
        .map(|path| {
            let content_type = config
                .content_type
                .clone()
                .unwrap_or_else(|| content_type_for(path));
            verify_file(verifier, path, content_type, &config.category)
        })
        .collect()
}

fn verify_file(
    verifier: &Verifier,
    path: &Path,
    content_type: String,
    category: &str,
) -> BatchEntry {
    let outcome = check_content_type(&content_type).and_then(|()| {
        let bytes = fs::read(path)?;
        let digest = sha256_bytes(&bytes);
        verifier
            .verify(RawImage::new(bytes, content_type), category)
            .map(|r| (digest, r))
    });

    match outcome {
        Ok((digest, result)) => BatchEntry {
            path: path.to_path_buf(),
            sha256: Some(digest),
            result: Some(result),
            error: None,
            error_kind: None,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "verification failed");
            BatchEntry {
                path: path.to_path_buf(),
                sha256: None,
                result: None,
                error: Some(e.to_string()),
                error_kind: Some(e.kind()),
            }
        }
    }
}
