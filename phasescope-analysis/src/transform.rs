//! Remote transforms: one variant per endpoint, each with its request
//! builder and response reshaper.

use phasescope_io::{Channel, Sample};
use serde_json::{json, Map, Value};

use crate::error::DispatchError;
use crate::kind::GraphKind;
use crate::normalize::{finite, numeric_column};
use crate::series::{DerivedSeries, Point, XY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteTransform {
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

impl RemoteTransform {
    pub fn endpoint(self) -> &'static str {
        match self {
            RemoteTransform::Rfft => "/rfft",
            RemoteTransform::Fft => "/fft",
            RemoteTransform::Wavelet => "/wavelet",
            RemoteTransform::Acf => "/acf",
            RemoteTransform::Hilbert => "/hilbert",
            RemoteTransform::RealImagHilbert => "/real_imag_hilbert",
            RemoteTransform::RealImagFft => "/real_imag_fft",
            RemoteTransform::AnalyticSignal => "/analytic_signal",
            RemoteTransform::Hodograph => "/hodograph",
            RemoteTransform::VectorGraph => "/vector-graph",
        }
    }

    pub fn graph_kind(self) -> GraphKind {
        match self {
            RemoteTransform::Rfft => GraphKind::Rfft,
            RemoteTransform::Fft => GraphKind::Fft,
            RemoteTransform::Wavelet => GraphKind::Wavelet,
            RemoteTransform::Acf => GraphKind::Acf,
            RemoteTransform::Hilbert => GraphKind::Hilbert,
            RemoteTransform::RealImagHilbert => GraphKind::RealImagHilbert,
            RemoteTransform::RealImagFft => GraphKind::RealImagFft,
            RemoteTransform::AnalyticSignal => GraphKind::AnalyticSignal,
            RemoteTransform::Hodograph => GraphKind::Hodograph,
            RemoteTransform::VectorGraph => GraphKind::VectorGraph,
        }
    }

    /// Request body for `window`, in window order.
    pub fn request(self, window: &[Sample]) -> Value {
        match self {
            RemoteTransform::Rfft
            | RemoteTransform::Fft
            | RemoteTransform::Wavelet
            | RemoteTransform::Acf
            | RemoteTransform::Hilbert
            | RemoteTransform::RealImagHilbert
            | RemoteTransform::RealImagFft
            | RemoteTransform::AnalyticSignal => json!({
                "x": channel_series(window, Channel::Ia),
                "y": channel_series(window, Channel::Ua),
            }),
            RemoteTransform::Hodograph | RemoteTransform::VectorGraph => {
                let mut body = Map::new();
                for channel in Channel::ALL {
                    body.insert(channel.name().to_string(), json!(channel_series(window, channel)));
                }
                Value::Object(body)
            }
        }
    }

    /// Reshape a normalized response into index-aligned plot points.
    pub fn reshape(self, response: &Value, window: &[Sample]) -> Result<DerivedSeries, DispatchError> {
        let col = |key: &str| self.column(response, key);
        let window_time = |i: usize| window.get(i).and_then(Sample::time_value);

        let points = match self {
            RemoteTransform::Rfft => {
                let (freq, amp) = (col("frequencies")?, col("amplitudes")?);
                zip_points(&freq, |i, f| {
                    Point::new().with("frequency", f).with("amplitude", at(&amp, i))
                })
            }
            RemoteTransform::Fft => {
                let (freq, amp, phase) = (col("frequencies")?, col("amplitudes")?, col("phases")?);
                zip_points(&freq, |i, f| {
                    Point::new()
                        .with("frequency", f)
                        .with("amplitude", at(&amp, i))
                        .with("phase", at(&phase, i))
                })
            }
            RemoteTransform::Wavelet => {
                let scales = col("scales")?;
                let rows = response
                    .get("coefficients_real")
                    .and_then(Value::as_array)
                    .ok_or_else(|| self.missing("coefficients_real"))?;
                rows.iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let first = row.as_array().and_then(|r| r.first()).and_then(finite);
                        Point::new()
                            .with("scale", at(&scales, i))
                            .with("coefficient_real", first)
                    })
                    .collect()
            }
            RemoteTransform::Acf => {
                let (lags, acf) = (col("lags")?, col("acf")?);
                zip_points(&lags, |i, lag| Point::new().with("lag", lag).with("acf", at(&acf, i)))
            }
            RemoteTransform::Hilbert => {
                let imag = col("imaginary_part")?;
                zip_points(&imag, |i, im| {
                    Point::new().with("time", window_time(i)).with("imaginary_part", im)
                })
            }
            RemoteTransform::RealImagHilbert => {
                let (re, im) = (col("real_part")?, col("imaginary_part")?);
                zip_points(&re, |i, r| {
                    Point::new().with("real_part", r).with("imaginary_part", at(&im, i))
                })
            }
            RemoteTransform::RealImagFft => {
                let (re, im) = (col("real")?, col("imaginary")?);
                zip_points(&re, |i, r| Point::new().with("real", r).with("imaginary", at(&im, i)))
            }
            RemoteTransform::AnalyticSignal => {
                let amp = col("amplitude")?;
                zip_points(&amp, |i, a| Point::new().with("time", window_time(i)).with("amplitude", a))
            }
            RemoteTransform::Hodograph | RemoteTransform::VectorGraph => {
                return self.point_sets(response);
            }
        };

        Ok(DerivedSeries::Points(points))
    }

    fn column(self, response: &Value, key: &str) -> Result<Vec<Option<f64>>, DispatchError> {
        numeric_column(response, key).ok_or_else(|| self.missing(key))
    }

    fn missing(self, key: &str) -> DispatchError {
        DispatchError::unavailable(self.endpoint(), format!("response has no `{}` array", key))
    }

    /// `currents` / `voltages` either at the top level or nested one level
    /// down (e.g. under `hodographs` or `vectors`).
    fn point_sets(self, response: &Value) -> Result<DerivedSeries, DispatchError> {
        let holder = std::iter::once(response)
            .chain(response.as_object().into_iter().flat_map(|m| m.values()))
            .find(|v| v.get("currents").is_some_and(Value::is_array) && v.get("voltages").is_some_and(Value::is_array));

        let Some(holder) = holder else {
            let reason = if response.get("plot").is_some() {
                "service returned a rendered image instead of point sets".to_string()
            } else {
                "response has no `currents`/`voltages` point sets".to_string()
            };
            return Err(DispatchError::unavailable(self.endpoint(), reason));
        };

        Ok(DerivedSeries::PointSets {
            currents: xy_list(&holder["currents"]),
            voltages: xy_list(&holder["voltages"]),
        })
    }
}

fn channel_series(window: &[Sample], channel: Channel) -> Vec<Option<f64>> {
    window
        .iter()
        .map(|s| Some(s.channel(channel)).filter(|v| v.is_finite()))
        .collect()
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}

/// The first column drives the length; the others are read by index.
fn zip_points(driver: &[Option<f64>], point: impl Fn(usize, Option<f64>) -> Point) -> Vec<Point> {
    driver.iter().enumerate().map(|(i, v)| point(i, *v)).collect()
}

/// Malformed entries keep their slot as an empty coordinate.
fn xy_list(value: &Value) -> Vec<XY> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|p| XY::new(p.get("x").and_then(finite), p.get("y").and_then(finite)))
                .collect()
        })
        .unwrap_or_default()
}
