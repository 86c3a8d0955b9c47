//! Views derived from the window without a network call.

use phasescope_analysis::{DerivedSeries, GraphKind, Point};
use phasescope_io::{Channel, Sample};

/// Compute a local kind. Returns `None` for kinds that need the analysis
/// service.
pub fn derive(kind: GraphKind, window: &[Sample]) -> Option<DerivedSeries> {
    match kind {
        GraphKind::RawPhases => Some(raw_phases(window)),
        GraphKind::Power => Some(power(window)),
        _ => None,
    }
}

/// `{time, Ia, Ib, Ic, Ua, Ub, Uc}` per sample.
pub fn raw_phases(window: &[Sample]) -> DerivedSeries {
    let points = window
        .iter()
        .map(|s| {
            Channel::ALL
                .into_iter()
                .fold(Point::new().with("time", s.time_value()), |point, ch| {
                    point.with(ch.name(), Some(s.channel(ch)))
                })
        })
        .collect();
    DerivedSeries::Points(points)
}

/// Per-phase instantaneous power, `P = I * U`, alongside the source channels.
pub fn power(window: &[Sample]) -> DerivedSeries {
    let points = window
        .iter()
        .map(|s| {
            Point::new()
                .with("time", s.time_value())
                .with_value("Ia", s.ia)
                .with_value("Ib", s.ib)
                .with_value("Ic", s.ic)
                .with_value("Ua", s.ua)
                .with_value("Ub", s.ub)
                .with_value("Uc", s.uc)
                .with_value("Pa", s.ia * s.ua)
                .with_value("Pb", s.ib * s.ub)
                .with_value("Pc", s.ic * s.uc)
        })
        .collect();
    DerivedSeries::Points(points)
}
