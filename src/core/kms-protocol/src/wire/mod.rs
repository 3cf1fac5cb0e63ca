//! Wire mapping layer.
//!
//! Every protocol message has one statically declared wire struct in
//! [`messages`]. Each field carries both its protobuf tag
//! (`#[prost(..., tag = "N")]`) and its JSON label
//! (`#[serde(rename = "...")]`), so the same struct drives both encodings
//! and the field table is fixed at compile time.
//!
//! Domain types convert to and from their wire struct through
//! [`WireMapping`]. Conversions are total except for the enumerated
//! [`WireError`] cases: out-of-range numbers are rejected, never wrapped.

pub mod messages;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WireError;

/// Bidirectional conversion between a domain type and its wire message.
pub trait WireMapping: Sized {
    /// The canonical wire message.
    type Wire: prost::Message + Default + Serialize + DeserializeOwned;

    /// Converts the value into its wire message.
    fn to_wire(&self) -> Result<Self::Wire, WireError>;

    /// Initializes a value from its wire message.
    fn from_wire(wire: Self::Wire) -> Result<Self, WireError>;
}

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// Largest duration magnitude representable on the wire (10,000 years).
const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

/// Signed duration with nanosecond precision.
///
/// `seconds` and `nanos` carry the same sign. JSON form: `"1.500s"`,
/// `"-0.000000001s"`.
#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct Duration {
    /// Whole seconds.
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    /// Sub-second nanoseconds, same sign as `seconds`.
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

impl Duration {
    /// Converts a host duration. Negative values stay negative.
    pub fn from_time_delta(delta: TimeDelta) -> Result<Self, WireError> {
        let d = Self {
            seconds: delta.num_seconds(),
            nanos: delta.subsec_nanos(),
        };
        d.validate()?;
        Ok(d)
    }

    /// Converts into a host duration.
    pub fn to_time_delta(self) -> Result<TimeDelta, WireError> {
        self.validate()?;
        TimeDelta::try_seconds(self.seconds)
            .and_then(|secs| secs.checked_add(&TimeDelta::nanoseconds(i64::from(self.nanos))))
            .ok_or_else(|| WireError::InvalidDuration(format!("{self:?} out of range")))
    }

    fn validate(&self) -> Result<(), WireError> {
        if self.seconds.unsigned_abs() > MAX_DURATION_SECONDS as u64 {
            return Err(WireError::InvalidDuration(format!(
                "{} seconds out of range",
                self.seconds
            )));
        }
        if self.nanos <= -NANOS_PER_SECOND || self.nanos >= NANOS_PER_SECOND {
            return Err(WireError::InvalidDuration(format!(
                "{} nanoseconds out of range",
                self.nanos
            )));
        }
        if (self.seconds < 0 && self.nanos > 0) || (self.seconds > 0 && self.nanos < 0) {
            return Err(WireError::InvalidDuration(
                "seconds and nanos have different signs".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.seconds < 0 || self.nanos < 0 { "-" } else { "" };
        let secs = self.seconds.unsigned_abs();
        let nanos = self.nanos.unsigned_abs();

        if nanos == 0 {
            write!(f, "{sign}{secs}s")
        } else if nanos % 1_000_000 == 0 {
            write!(f, "{sign}{secs}.{:03}s", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            write!(f, "{sign}{secs}.{:06}s", nanos / 1_000)
        } else {
            write!(f, "{sign}{secs}.{:09}s", nanos)
        }
    }
}

impl FromStr for Duration {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WireError::InvalidDuration(format!("{s:?}"));

        let body = s.strip_suffix('s').ok_or_else(invalid)?;
        let (negative, body) = match body.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let (secs, frac) = match body.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (body, ""),
        };

        if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let secs: i64 = secs.parse().map_err(|_| invalid())?;
        let nanos: i32 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<9}").parse().map_err(|_| invalid())?
        };

        let d = if negative {
            Self {
                seconds: -secs,
                nanos: -nanos,
            }
        } else {
            Self {
                seconds: secs,
                nanos,
            }
        };
        d.validate()?;
        Ok(d)
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.validate().map_err(serde::ser::Error::custom)?;
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Point in time, UTC, nanosecond precision. JSON form: RFC 3339.
#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    /// Non-negative sub-second nanoseconds.
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

impl Timestamp {
    /// Converts a host timestamp.
    pub fn from_date_time(time: DateTime<Utc>) -> Self {
        // Leap seconds are folded into the preceding nanosecond.
        let nanos = time.timestamp_subsec_nanos().min(999_999_999);
        Self {
            seconds: time.timestamp(),
            nanos: nanos as i32,
        }
    }

    /// Converts into a host timestamp.
    pub fn to_date_time(self) -> Result<DateTime<Utc>, WireError> {
        let nanos = u32::try_from(self.nanos)
            .ok()
            .filter(|n| *n < NANOS_PER_SECOND as u32)
            .ok_or_else(|| WireError::InvalidTimestamp(format!("{} nanoseconds", self.nanos)))?;
        DateTime::from_timestamp(self.seconds, nanos)
            .ok_or_else(|| WireError::InvalidTimestamp(format!("{} seconds", self.seconds)))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let time = self.to_date_time().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let time = DateTime::parse_from_rfc3339(&s)
            .map_err(|e| de::Error::custom(WireError::InvalidTimestamp(e.to_string())))?;
        Ok(Self::from_date_time(time.with_timezone(&Utc)))
    }
}

/// JSON form of `bytes` fields: standard base64.
///
/// Decoding also accepts the URL-safe alphabet and missing padding.
pub(crate) mod base64_bytes {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// `null` decodes as empty.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };
        [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(&s).ok())
            .ok_or_else(|| de::Error::custom("invalid base64"))
    }
}

/// JSON form of 64-bit integers: decimal strings.
///
/// Decoding also accepts plain JSON numbers, and `null` as zero.
pub(crate) mod quoted {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr + Deserialize<'de> + Default,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Null,
            Text(String),
            Number(T),
        }

        match Repr::<T>::deserialize(deserializer)? {
            Repr::Null => Ok(T::default()),
            Repr::Text(s) => s.parse().map_err(de::Error::custom),
            Repr::Number(n) => Ok(n),
        }
    }
}
