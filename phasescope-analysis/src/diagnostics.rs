//! The `/analyze` transform: anomaly classification over a window slice.
//!
//! Unlike the plotting transforms its reply is not reshaped; callers get the
//! verdict fields as sent.

use phasescope_io::Sample;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const ANALYZE_ENDPOINT: &str = "/analyze";

/// One row of the analysis table. Field order matters: the service treats
/// the first column as time and the rest as sensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiagnosticRecord {
    pub time: f64,
    #[serde(rename = "Ia")]
    pub ia: f64,
    #[serde(rename = "Ib")]
    pub ib: f64,
    #[serde(rename = "Ic")]
    pub ic: f64,
    #[serde(rename = "Ua")]
    pub ua: f64,
    #[serde(rename = "Ub")]
    pub ub: f64,
    #[serde(rename = "Uc")]
    pub uc: f64,
}

impl From<&Sample> for DiagnosticRecord {
    fn from(s: &Sample) -> Self {
        Self {
            time: s.time_coordinate(),
            ia: s.ia,
            ib: s.ib,
            ic: s.ic,
            ua: s.ua,
            ub: s.ub,
            uc: s.uc,
        }
    }
}

pub fn analyze_request(samples: &[Sample]) -> Value {
    let records: Vec<DiagnosticRecord> = samples.iter().map(DiagnosticRecord::from).collect();
    json!({ "data": records })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReply {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "anomalyCount")]
    pub anomaly_count: Option<u64>,
    #[serde(default)]
    pub diagnosis: Option<Diagnosis>,
}

impl DiagnosticsReply {
    /// The service has not collected enough rows yet; not an error.
    pub fn is_pending(&self) -> bool {
        self.status.eq_ignore_ascii_case("pending")
    }
}
