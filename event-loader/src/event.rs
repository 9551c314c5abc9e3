use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Number;

use crate::error::DecodeError;

/// One tracking record as it appears in a blob. Every field is optional at this stage so that
/// a missing required field is reported by name rather than as a generic serde error.
/// Keys we don't know about are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    pub request_id: Option<String>,
    pub cookie_id: Option<String>,
    pub topic: Option<String>,
    pub request_timestamp: Option<Number>,
    pub message: Option<String>,
    pub environment: Option<String>,
    pub website_id: Option<String>,
    pub user_account_id: Option<String>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// A normalized event, ready to be written. No field is ever null: optional fields that were
/// missing or null hold an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub request_id: String,
    pub cookie_id: String,
    pub topic: String,
    /// UTC, whole seconds.
    pub request_timestamp: DateTime<Utc>,
    pub message: String,
    pub environment: String,
    pub website_id: String,
    pub user_account_id: String,
    pub location: String,
    pub user_agent: String,
    pub referrer: String,
}

impl Event {
    pub fn decode(token: &str) -> Result<Event, DecodeError> {
        let raw: RawRecord = serde_json::from_str(token)?;
        Event::try_from(raw)
    }
}

impl TryFrom<RawRecord> for Event {
    type Error = DecodeError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let request_id = raw
            .request_id
            .ok_or(DecodeError::MissingField("request_id"))?;
        let cookie_id = raw.cookie_id.ok_or(DecodeError::MissingField("cookie_id"))?;
        let topic = raw.topic.ok_or(DecodeError::MissingField("topic"))?;
        let request_timestamp = raw
            .request_timestamp
            .ok_or(DecodeError::MissingField("request_timestamp"))
            .and_then(|ms| timestamp_from_epoch_millis(&ms))?;

        Ok(Event {
            request_id,
            cookie_id,
            topic,
            request_timestamp,
            message: raw.message.unwrap_or_default(),
            environment: raw.environment.unwrap_or_default(),
            website_id: raw.website_id.unwrap_or_default(),
            user_account_id: raw.user_account_id.unwrap_or_default(),
            location: raw.location.unwrap_or_default(),
            user_agent: raw.user_agent.unwrap_or_default(),
            referrer: raw.referrer.unwrap_or_default(),
        })
    }
}

/// Decode one token. Pure, safe to call from any thread.
pub fn decode(token: &str) -> Result<Event, DecodeError> {
    Event::decode(token)
}

/// Epoch milliseconds to a UTC timestamp truncated to the second (floor, so pre-epoch values
/// round down too). Fractional milliseconds are accepted and dropped.
pub fn timestamp_from_epoch_millis(ms: &Number) -> Result<DateTime<Utc>, DecodeError> {
    let millis = if let Some(millis) = ms.as_i64() {
        millis
    } else {
        match ms.as_f64() {
            Some(f) if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                f.floor() as i64
            }
            _ => return Err(DecodeError::InvalidTimestamp(ms.to_string())),
        }
    };

    DateTime::from_timestamp(millis.div_euclid(1000), 0)
        .ok_or_else(|| DecodeError::InvalidTimestamp(ms.to_string()))
}
