//! Padded axis ranges for a derived series.

use phasescope_analysis::{DerivedSeries, GraphKind, SeriesShape, XY};
use serde::Serialize;

const PAD_RATIO: f64 = 0.1;

/// Fallback point fields for the horizontal coordinate, after the kind's own.
const X_FALLBACKS: [&str; 3] = ["frequency", "time", "scale"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisDomain {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl AxisDomain {
    pub const FALLBACK: AxisDomain = AxisDomain {
        x: (-1.0, 1.0),
        y: (-1.0, 1.0),
    };
}

impl Default for AxisDomain {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Compute the padded range of `series` as plotted for `kind`.
///
/// Non-finite values are ignored. An empty series, or one whose shape does
/// not match the kind, gets [`AxisDomain::FALLBACK`].
pub fn domain(series: &DerivedSeries, kind: GraphKind) -> AxisDomain {
    let (xs, ys): (Vec<f64>, Vec<f64>) = match (kind.shape(), series) {
        (SeriesShape::Points, DerivedSeries::Points(points)) if !points.is_empty() => {
            let xs = points.iter().map(|p| {
                kind.x_field()
                    .into_iter()
                    .chain(X_FALLBACKS)
                    .find_map(|field| p.get(field))
                    .unwrap_or(0.0)
            });
            let ys = points
                .iter()
                .flat_map(|p| kind.labels().iter().filter_map(|label| p.get(label)));
            (xs.collect(), ys.collect())
        }
        (SeriesShape::PointSets, DerivedSeries::PointSets { currents, voltages })
            if !(currents.is_empty() && voltages.is_empty()) =>
        {
            let all = || currents.iter().chain(voltages.iter());
            (
                all().filter_map(|p: &XY| p.x).collect(),
                all().filter_map(|p: &XY| p.y).collect(),
            )
        }
        _ => return AxisDomain::FALLBACK,
    };

    AxisDomain {
        x: padded(&xs),
        y: padded(&ys),
    }
}

/// `[min - pad, max + pad]` with `pad` a tenth of the span, or 1 when the
/// span is zero. An axis with no finite values falls back to `[-1, 1]`.
pub fn padded(values: &[f64]) -> (f64, f64) {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let Some(first) = finite.next() else {
        return AxisDomain::FALLBACK.x;
    };
    let (min, max) = finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let span = (max - min) * PAD_RATIO;
    let pad = if span == 0.0 || !span.is_finite() { 1.0 } else { span };
    (min - pad, max + pad)
}
