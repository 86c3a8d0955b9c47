//! Plot-ready derived series.
//!
//! Every coordinate is an `Option<f64>`: `None` is the explicit "no value"
//! marker and the constructors below never store a non-finite number.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::kind::{GraphKind, SeriesShape};

/// One labelled point of a line chart, e.g. `{frequency, amplitude}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Point(BTreeMap<&'static str, Option<f64>>);

impl Point {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &'static str, value: Option<f64>) -> Self {
        self.0.insert(field, value.filter(|v| v.is_finite()));
        self
    }

    pub fn with_value(self, field: &'static str, value: f64) -> Self {
        self.with(field, Some(value))
    }

    /// Finite value of `field`, if the field exists and has one.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.0.get(field).copied().flatten()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// A scatter coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct XY {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl XY {
    pub fn new(x: Option<f64>, y: Option<f64>) -> Self {
        Self {
            x: x.filter(|v| v.is_finite()),
            y: y.filter(|v| v.is_finite()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DerivedSeries {
    Points(Vec<Point>),
    PointSets { currents: Vec<XY>, voltages: Vec<XY> },
}

impl DerivedSeries {
    /// Placeholder shown until the first dispatch for a graph resolves.
    pub fn empty_for(kind: GraphKind) -> Self {
        match kind.shape() {
            SeriesShape::Points => DerivedSeries::Points(Vec::new()),
            SeriesShape::PointSets => DerivedSeries::PointSets {
                currents: Vec::new(),
                voltages: Vec::new(),
            },
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DerivedSeries::Points(points) => points.len(),
            DerivedSeries::PointSets { currents, voltages } => currents.len() + voltages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn points(&self) -> Option<&[Point]> {
        match self {
            DerivedSeries::Points(points) => Some(points),
            DerivedSeries::PointSets { .. } => None,
        }
    }
}
