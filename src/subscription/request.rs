//! Parsing of inbound subscribe/unsubscribe intents and hub verification GETs.

use super::Mode;
use crate::error::WebSubError;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// A subscription intent, dispatched to one handler per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionRequest {
    /// Subscribe, finding the hub through the topic's advertised links.
    SubscribeWithDiscovery {
        topic: String,
        lease_seconds: Option<i64>,
    },
    /// Subscribe through a caller-chosen hub. The topic is never fetched.
    SubscribeWithHub {
        topic: String,
        hub: String,
        lease_seconds: Option<i64>,
    },
    /// Unsubscribe an existing callback (or discover and record a new one).
    Unsubscribe { topic: String, callback: String },
}

impl SubscriptionRequest {
    /// Parses `topic`, `mode`, `hub`, `callback` and `lease_seconds` from a
    /// URL query string.
    ///
    /// `mode` defaults to `subscribe`. Empty values count as absent.
    ///
    /// # Errors
    ///
    /// [`WebSubError::InvalidRequest`] when `topic` is missing, `mode` is
    /// unknown, `lease_seconds` is not a non-negative integer, or an
    /// unsubscribe request has no `callback`.
    pub fn from_query(query: &str) -> Result<Self, WebSubError> {
        let params = QueryParams::parse(query)?;

        let topic = params.require("topic")?;
        let mode = params.mode("mode")?.unwrap_or(Mode::Subscribe);
        let lease_seconds = params.lease("lease_seconds")?;

        match mode {
            Mode::Subscribe => Ok(match params.get("hub") {
                Some(hub) => Self::SubscribeWithHub {
                    topic,
                    hub: hub.to_owned(),
                    lease_seconds,
                },
                None => Self::SubscribeWithDiscovery {
                    topic,
                    lease_seconds,
                },
            }),
            Mode::Unsubscribe => {
                let callback = params.get("callback").ok_or_else(|| {
                    WebSubError::InvalidRequest(
                        "callback should be present on unsubscribe mode".to_owned(),
                    )
                })?;
                Ok(Self::Unsubscribe {
                    topic,
                    callback: callback.to_owned(),
                })
            }
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::SubscribeWithDiscovery { .. } | Self::SubscribeWithHub { .. } => Mode::Subscribe,
            Self::Unsubscribe { .. } => Mode::Unsubscribe,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::SubscribeWithDiscovery { topic, .. }
            | Self::SubscribeWithHub { topic, .. }
            | Self::Unsubscribe { topic, .. } => topic,
        }
    }
}

/// The hub's verification-of-intent GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub mode: Mode,
    pub topic: String,
    /// Echoed back byte-for-byte on success.
    pub challenge: String,
    pub lease_seconds: Option<i64>,
}

impl VerificationRequest {
    /// Parses `hub.mode`, `hub.topic`, `hub.challenge` and `hub.lease_seconds`.
    ///
    /// # Errors
    ///
    /// [`WebSubError::InvalidRequest`] when mode, topic or challenge is
    /// missing, the mode is unknown, the lease is not a non-negative integer,
    /// or a value does not decode to UTF-8 (the challenge could not be echoed
    /// as sent).
    pub fn from_query(query: &str) -> Result<Self, WebSubError> {
        let params = QueryParams::parse(query)?;

        let mode = params
            .mode("hub.mode")?
            .ok_or_else(|| WebSubError::InvalidRequest("missing hub.mode".to_owned()))?;

        Ok(Self {
            mode,
            topic: params.require("hub.topic")?,
            challenge: params.require("hub.challenge")?,
            lease_seconds: params.lease("hub.lease_seconds")?,
        })
    }
}

/// First occurrence of each non-empty query parameter.
struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// Form-decodes `query`, refusing percent-escapes that are not UTF-8
    /// instead of substituting replacement characters.
    fn parse(query: &str) -> Result<Self, WebSubError> {
        let mut params = HashMap::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            if value.is_empty() {
                continue;
            }
            params.entry(decode_component(key)?).or_insert(value);
        }
        Ok(Self(params))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<String, WebSubError> {
        self.get(key)
            .map(str::to_owned)
            .ok_or_else(|| WebSubError::InvalidRequest(format!("missing {key}")))
    }

    fn mode(&self, key: &str) -> Result<Option<Mode>, WebSubError> {
        self.get(key)
            .map(|raw| {
                raw.parse::<Mode>()
                    .map_err(|e| WebSubError::InvalidRequest(e.to_string()))
            })
            .transpose()
    }

    fn lease(&self, key: &str) -> Result<Option<i64>, WebSubError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(secs) if secs >= 0 => Ok(Some(secs)),
            _ => Err(WebSubError::InvalidRequest(format!(
                "{key} must be a non-negative integer, got {raw:?}"
            ))),
        }
    }
}

fn decode_component(raw: &str) -> Result<String, WebSubError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| WebSubError::InvalidRequest(format!("{raw:?} is not UTF-8 once decoded")))
}
