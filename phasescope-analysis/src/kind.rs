//! Graph kinds offered to the user.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::transform::RemoteTransform;

/// Plot shape a kind produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesShape {
    /// A line chart: array of labelled points.
    Points,
    /// A scatter of two point sets (`currents`, `voltages`).
    PointSets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GraphKind {
    RawPhases,
    Power,
    Rfft,
    Fft,
    Wavelet,
    Acf,
    Hilbert,
    RealImagHilbert,
    RealImagFft,
    AnalyticSignal,
    Hodograph,
    VectorGraph,
}

impl GraphKind {
    pub const ALL: [GraphKind; 12] = [
        GraphKind::RawPhases,
        GraphKind::Power,
        GraphKind::Rfft,
        GraphKind::Fft,
        GraphKind::Wavelet,
        GraphKind::Acf,
        GraphKind::Hilbert,
        GraphKind::RealImagHilbert,
        GraphKind::RealImagFft,
        GraphKind::AnalyticSignal,
        GraphKind::Hodograph,
        GraphKind::VectorGraph,
    ];

    /// Display name, also accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            GraphKind::RawPhases => "Phase Currents and Voltages",
            GraphKind::Power => "Power",
            GraphKind::Rfft => "RFFT",
            GraphKind::Fft => "FFT",
            GraphKind::Wavelet => "Wavelet",
            GraphKind::Acf => "ACF",
            GraphKind::Hilbert => "Hilbert",
            GraphKind::RealImagHilbert => "Real Imaginary Hilbert",
            GraphKind::RealImagFft => "Real Imaginary FFT",
            GraphKind::AnalyticSignal => "Analytic Signal",
            GraphKind::Hodograph => "Hodograph",
            GraphKind::VectorGraph => "Vector Graph",
        }
    }

    /// Local kinds are derived from the window without a network call.
    pub fn is_local(self) -> bool {
        self.remote().is_none()
    }

    pub fn remote(self) -> Option<RemoteTransform> {
        match self {
            GraphKind::RawPhases | GraphKind::Power => None,
            GraphKind::Rfft => Some(RemoteTransform::Rfft),
            GraphKind::Fft => Some(RemoteTransform::Fft),
            GraphKind::Wavelet => Some(RemoteTransform::Wavelet),
            GraphKind::Acf => Some(RemoteTransform::Acf),
            GraphKind::Hilbert => Some(RemoteTransform::Hilbert),
            GraphKind::RealImagHilbert => Some(RemoteTransform::RealImagHilbert),
            GraphKind::RealImagFft => Some(RemoteTransform::RealImagFft),
            GraphKind::AnalyticSignal => Some(RemoteTransform::AnalyticSignal),
            GraphKind::Hodograph => Some(RemoteTransform::Hodograph),
            GraphKind::VectorGraph => Some(RemoteTransform::VectorGraph),
        }
    }

    pub fn shape(self) -> SeriesShape {
        match self {
            GraphKind::Hodograph | GraphKind::VectorGraph => SeriesShape::PointSets,
            _ => SeriesShape::Points,
        }
    }

    /// Fields plotted as lines (or the point-set names for scatter kinds).
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            GraphKind::RawPhases => &["Ia", "Ib", "Ic", "Ua", "Ub", "Uc"],
            GraphKind::Power => &["Pa", "Pb", "Pc"],
            GraphKind::Rfft => &["amplitude"],
            GraphKind::Fft => &["amplitude", "phase"],
            GraphKind::Wavelet => &["coefficient_real"],
            GraphKind::Acf => &["acf"],
            GraphKind::Hilbert => &["imaginary_part"],
            GraphKind::RealImagHilbert => &["real_part", "imaginary_part"],
            GraphKind::RealImagFft => &["real", "imaginary"],
            GraphKind::AnalyticSignal => &["amplitude"],
            GraphKind::Hodograph | GraphKind::VectorGraph => &["currents", "voltages"],
        }
    }

    /// The point field used as the horizontal coordinate, if the kind has one.
    pub fn x_field(self) -> Option<&'static str> {
        match self {
            GraphKind::RawPhases
            | GraphKind::Power
            | GraphKind::Hilbert
            | GraphKind::AnalyticSignal => Some("time"),
            GraphKind::Rfft | GraphKind::Fft => Some("frequency"),
            GraphKind::Wavelet => Some("scale"),
            GraphKind::Acf => Some("lag"),
            GraphKind::RealImagHilbert
            | GraphKind::RealImagFft
            | GraphKind::Hodograph
            | GraphKind::VectorGraph => None,
        }
    }
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GraphKind {
    type Err = DispatchError;

    /// Case, spaces, dashes and underscores are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let kind = match key.as_str() {
            "phasecurrentsandvoltages" | "rawphases" | "phases" | "raw" => GraphKind::RawPhases,
            "power" | "powerandtime" => GraphKind::Power,
            "rfft" => GraphKind::Rfft,
            "fft" => GraphKind::Fft,
            "wavelet" => GraphKind::Wavelet,
            "acf" => GraphKind::Acf,
            "hilbert" => GraphKind::Hilbert,
            "realimaginaryhilbert" | "realimaghilbert" => GraphKind::RealImagHilbert,
            "realimaginaryfft" | "realimagfft" => GraphKind::RealImagFft,
            "analyticsignal" => GraphKind::AnalyticSignal,
            "hodograph" => GraphKind::Hodograph,
            "vectorgraph" => GraphKind::VectorGraph,
            _ => return Err(DispatchError::UnknownGraphKind(s.to_string())),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for GraphKind {
    type Error = DispatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GraphKind> for String {
    fn from(kind: GraphKind) -> Self {
        kind.name().to_string()
    }
}
