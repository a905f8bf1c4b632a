use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Candidate;

const WEIGHT_EXTS: &[&str] = &[".safetensors", ".bin", ".pt", ".pth", ".msgpack", ".h5"];

static NAME_PARAMS_B: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)[Bb](?:$|[^a-zA-Z0-9])").unwrap());
static NAME_PARAMS_M: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)[Mm](?:$|[^a-zA-Z0-9])").unwrap());

/// Which evidence produced the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    SafetensorsMetadata,
    NameHeuristic,
    FilesizeHeuristic,
    Unknown,
}

impl ParamSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamSource::SafetensorsMetadata => "safetensors_metadata",
            ParamSource::NameHeuristic => "name_heuristic",
            ParamSource::FilesizeHeuristic => "filesize_heuristic",
            ParamSource::Unknown => "unknown",
        }
    }
}

/// Estimated total parameter count in billions, or nothing when no method
/// yielded a confident value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamEstimate {
    pub total_b: Option<f64>,
    pub source: ParamSource,
}

impl ParamEstimate {
    pub fn unknown() -> Self {
        Self {
            total_b: None,
            source: ParamSource::Unknown,
        }
    }
}

/// Resolve the parameter count in priority order: structured weight-file
/// metadata, then the model name, then total weight-file bytes. Absence of
/// evidence yields `None`, never a rejection.
pub fn estimate_parameters(candidate: &Candidate, bytes_per_param: f64) -> ParamEstimate {
    if let Some(total) = candidate.safetensors_total_params {
        if total > 0 {
            return ParamEstimate {
                total_b: Some(total as f64 / 1e9),
                source: ParamSource::SafetensorsMetadata,
            };
        }
    }

    if let Some(b) = params_from_name(&candidate.name) {
        return ParamEstimate {
            total_b: Some(b),
            source: ParamSource::NameHeuristic,
        };
    }

    let weight_bytes: u64 = candidate
        .files
        .iter()
        .filter(|f| {
            let p = f.path.to_lowercase();
            WEIGHT_EXTS.iter().any(|ext| p.ends_with(ext))
        })
        .map(|f| f.size)
        .sum();
    if weight_bytes > 0 {
        let params = weight_bytes as f64 / bytes_per_param.max(0.1);
        return ParamEstimate {
            total_b: Some(params / 1e9),
            source: ParamSource::FilesizeHeuristic,
        };
    }

    ParamEstimate::unknown()
}

/// Parse `7B`, `1.5b` or `270m` style counts from the model name.
fn params_from_name(name: &str) -> Option<f64> {
    // Regexes need a trailing boundary; probing with a separator appended
    // also matches a suffix at the very end of the name.
    let probe = format!("{name}-");
    if let Some(caps) = NAME_PARAMS_B.captures(&probe) {
        return caps[1].parse::<f64>().ok();
    }
    if let Some(caps) = NAME_PARAMS_M.captures(&probe) {
        return caps[1].parse::<f64>().ok().map(|m| m / 1000.0);
    }
    None
}
