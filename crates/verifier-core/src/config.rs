//! Verifier settings, loadable from a JSON file. Every field has a default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Predictions reported in the verdict; the first one is the overall top-1.
    pub overall_top_k: usize,
    /// Predictions scanned for category keywords.
    pub match_top_k: usize,
    pub input_name: String,
    pub output_name: String,
    pub intra_threads: usize,
    pub model_name: String,
    pub model_version: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            overall_top_k: 3,
            match_top_k: 5,
            input_name: "input_1".to_string(),
            output_name: "predictions".to_string(),
            intra_threads: 4,
            model_name: "MobileNetV2".to_string(),
            model_version: "1.0.0".to_string(),
        }
    }
}

impl VerifierConfig {
    pub fn validate(&self) -> VerifyResult<()> {
        if self.overall_top_k == 0 {
            return Err(VerifyError::Config("overall_top_k must be at least 1".into()));
        }
        if self.match_top_k == 0 {
            return Err(VerifyError::Config("match_top_k must be at least 1".into()));
        }
        if self.intra_threads == 0 {
            return Err(VerifyError::Config("intra_threads must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> VerifyResult<VerifierConfig> {
    let data = fs::read_to_string(path)?;
    let config: VerifierConfig = serde_json::from_str(&data)
        .map_err(|e| VerifyError::Config(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
