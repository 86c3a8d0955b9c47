//! Telemetry sample model.
//!
//! The measuring device reports one reading per message: three phase
//! currents, three phase voltages and (usually) a time coordinate. Devices
//! disagree on field casing and on whether numbers arrive as JSON numbers or
//! as text, so parsing is tolerant about both. A channel that is missing or
//! unparsable becomes NaN; consumers filter it before plotting.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why an inbound payload was rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload carries none of the six phase channels")]
    NoChannels,
}

/// One of the six measured phase channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Ia,
    Ib,
    Ic,
    Ua,
    Ub,
    Uc,
}

impl Channel {
    /// Wire order: currents first, then voltages.
    pub const ALL: [Channel; 6] = [
        Channel::Ia,
        Channel::Ib,
        Channel::Ic,
        Channel::Ua,
        Channel::Ub,
        Channel::Uc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Ia => "Ia",
            Channel::Ib => "Ib",
            Channel::Ic => "Ic",
            Channel::Ua => "Ua",
            Channel::Ub => "Ub",
            Channel::Uc => "Uc",
        }
    }

    fn from_field(key: &str) -> Option<Self> {
        Channel::ALL
            .into_iter()
            .find(|ch| ch.name().eq_ignore_ascii_case(key))
    }
}

/// High-frequency three-phase reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
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
    /// Primary time coordinate (`Time` / `time` / `t`).
    #[serde(rename = "Time", skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Secondary time coordinate (`timestamp` / `ts`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Sample {
    pub fn new(ia: f64, ib: f64, ic: f64, ua: f64, ub: f64, uc: f64) -> Self {
        Self {
            ia,
            ib,
            ic,
            ua,
            ub,
            uc,
            time: None,
            timestamp: None,
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Ia => self.ia,
            Channel::Ib => self.ib,
            Channel::Ic => self.ic,
            Channel::Ua => self.ua,
            Channel::Ub => self.ub,
            Channel::Uc => self.uc,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut f64 {
        match channel {
            Channel::Ia => &mut self.ia,
            Channel::Ib => &mut self.ib,
            Channel::Ic => &mut self.ic,
            Channel::Ua => &mut self.ua,
            Channel::Ub => &mut self.ub,
            Channel::Uc => &mut self.uc,
        }
    }

    /// Time for plotting: primary field, else the secondary one.
    pub fn time_value(&self) -> Option<f64> {
        self.time.or(self.timestamp)
    }

    /// Time for analysis records, where a coordinate is mandatory.
    pub fn time_coordinate(&self) -> f64 {
        self.time_value().unwrap_or(0.0)
    }

    /// Structural equality that also treats matching NaN channels as equal.
    ///
    /// The device repeats its last reading when nothing changed; derived
    /// `PartialEq` would never match a reading with a NaN channel.
    pub fn is_repeat_of(&self, other: &Sample) -> bool {
        let same = |a: f64, b: f64| a.to_bits() == b.to_bits();
        let same_opt = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => same(a, b),
            (None, None) => true,
            _ => false,
        };

        Channel::ALL
            .into_iter()
            .all(|ch| same(self.channel(ch), other.channel(ch)))
            && same_opt(self.time, other.time)
            && same_opt(self.timestamp, other.timestamp)
    }

    /// Parse a raw JSON payload as sent by the device.
    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let fields = value.as_object().ok_or(ParseError::NotAnObject)?;

        let mut sample = Sample::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN, f64::NAN);
        let mut channels_seen = 0;

        for (key, raw) in fields {
            if let Some(channel) = Channel::from_field(key) {
                *sample.channel_mut(channel) = numeric(raw).unwrap_or(f64::NAN);
                channels_seen += 1;
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "time" | "t" => sample.time = numeric(raw).filter(|v| v.is_finite()),
                "timestamp" | "ts" => sample.timestamp = numeric(raw).filter(|v| v.is_finite()),
                _ => {}
            }
        }

        if channels_seen == 0 {
            return Err(ParseError::NoChannels);
        }

        Ok(sample)
    }
}

impl<'de> Deserialize<'de> for Sample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Sample::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Numbers may arrive as JSON numbers or as numeric text.
fn numeric(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
