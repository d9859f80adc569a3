//! Verdict composition and output formatting for verification results.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ErrorKind, VerifyError, VerifyResult};
use crate::inference::LabelPrediction;
use crate::matcher::CategoryMatch;

/// A category match above this score replaces the top-1 probability as the overall confidence.
pub const MATCH_OVERRIDE_THRESHOLD: f64 = 0.3;
/// Overall confidence must be strictly above this for the photo to count as verified.
pub const VERIFY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub ai_verified: bool,
    pub confidence: f64,
    pub prediction: String,
    pub category_match: bool,
    pub details: VerificationDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationDetails {
    pub reported_category: String,
    pub top_predictions: Vec<TopPrediction>,
    pub match_confidence: f64,
    pub threshold_met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPrediction {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
}

/// Round to 3 decimals. Only applied to values leaving the verifier.
pub fn round3(value: f32) -> f64 {
    (value as f64 * 1000.0).round() / 1000.0
}

/// Combine the overall top-K view and the category match into a verdict.
///
/// `overall` must be ranked; its first entry is the top-1 prediction.
pub fn compose_verdict(
    overall: &[LabelPrediction],
    category_match: &CategoryMatch,
    reported_category: &str,
) -> VerifyResult<VerificationResult> {
    let top1 = overall
        .first()
        .ok_or_else(|| VerifyError::Oracle("classifier returned no predictions".into()))?;

    let mut overall_confidence = top1.probability;
    if category_match.matched && f64::from(category_match.confidence) > MATCH_OVERRIDE_THRESHOLD {
        overall_confidence = category_match.confidence;
    }
    let threshold_met = f64::from(overall_confidence) > VERIFY_THRESHOLD;

    let prediction = if category_match.matched {
        category_match.label.clone()
    } else {
        top1.label.clone()
    };
    let match_confidence = if category_match.matched {
        round3(category_match.confidence)
    } else {
        0.0
    };

    Ok(VerificationResult {
        ai_verified: category_match.matched && threshold_met,
        confidence: round3(overall_confidence),
        prediction,
        category_match: category_match.matched,
        details: VerificationDetails {
            reported_category: reported_category.to_string(),
            top_predictions: overall
                .iter()
                .map(|p| TopPrediction {
                    class_name: p.label.clone(),
                    confidence: round3(p.probability),
                })
                .collect(),
            match_confidence,
            threshold_met,
        },
    })
}

/// One file's outcome in a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl BatchEntry {
    pub fn is_verified(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.ai_verified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

pub fn print_results(entries: &[BatchEntry], format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", render_text(entries)),
        OutputFormat::Json => println!("{}", render_json(entries)),
    }
}

fn render_text(entries: &[BatchEntry]) -> String {
    use std::fmt::Write;

    let verified: Vec<_> = entries.iter().filter(|e| e.is_verified()).collect();
    let rejected: Vec<_> = entries
        .iter()
        .filter(|e| e.result.as_ref().is_some_and(|r| !r.ai_verified))
        .collect();
    let errors: Vec<_> = entries.iter().filter(|e| e.error.is_some()).collect();

    let mut out = String::new();
    let rule = "=".repeat(70);
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "VERIFICATION RESULTS");
    let _ = writeln!(out, "{rule}");

    if !verified.is_empty() {
        let _ = writeln!(out, "\nVERIFIED ({}):", verified.len());
        for e in &verified {
            write_result_line(&mut out, e);
        }
    }

    if !rejected.is_empty() {
        let _ = writeln!(out, "\nNOT VERIFIED ({}):", rejected.len());
        for e in &rejected {
            write_result_line(&mut out, e);
        }
    }

    if !errors.is_empty() {
        let _ = writeln!(out, "\nERRORS ({}):", errors.len());
        for e in &errors {
            let err = e.error.as_deref().unwrap_or("unknown");
            let kind = match e.error_kind {
                Some(ErrorKind::Client) => "CLNT",
                _ => "ERR ",
            };
            let _ = writeln!(out, "  [{kind}] {} -- {err}", e.path.display());
        }
    }

    let _ = writeln!(out, "\nSUMMARY:");
    let _ = writeln!(out, "  Total images:  {}", entries.len());
    let _ = writeln!(out, "  Verified:      {}", verified.len());
    let _ = writeln!(out, "  Not verified:  {}", rejected.len());
    let _ = writeln!(out, "  Errors:        {}", errors.len());
    let _ = writeln!(out, "{rule}");
    out
}

fn write_result_line(out: &mut String, entry: &BatchEntry) {
    use std::fmt::Write;

    if let Some(r) = &entry.result {
        let matched = if r.category_match { "match" } else { "no match" };
        let _ = writeln!(
            out,
            "  [{:.3}] {}  {} ({}, {})",
            r.confidence,
            entry.path.display(),
            r.prediction,
            r.details.reported_category,
            matched
        );
    }
}

fn render_json(entries: &[BatchEntry]) -> String {
    let output = serde_json::json!({
        "results": entries,
        "summary": {
            "total": entries.len(),
            "verified": entries.iter().filter(|e| e.is_verified()).count(),
            "not_verified": entries.iter().filter(|e| e.result.as_ref().is_some_and(|r| !r.ai_verified)).count(),
            "errors": entries.iter().filter(|e| e.error.is_some()).count(),
        }
    });
    serde_json::to_string_pretty(&output).unwrap_or_default()
}
