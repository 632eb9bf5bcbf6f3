//! Signed payment-status webhooks.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex>` where the
//! hex value is `HMAC-SHA256(secret, "<t>.<raw body>")`. Several `v1`
//! entries may be present during secret rotation; any one matching is
//! enough.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::entitlement::SubscriptionEvent;
use crate::error::AccessError;
use crate::types::normalize_email;

/// Largest accepted clock skew between signing and receipt.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

type HmacSha256 = Hmac<Sha256>;

/// Webhook rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    /// No secret configured; webhooks cannot be trusted.
    #[error("Webhook secret not configured")]
    NotConfigured,
    /// Signature header absent.
    #[error("Missing signature header")]
    MissingSignature,
    /// Signature header unparseable.
    #[error("Malformed signature header")]
    MalformedHeader,
    /// No signature matched.
    #[error("Signature mismatch")]
    SignatureMismatch,
    /// Timestamp outside the tolerance.
    #[error("Signature timestamp outside tolerance ({age_secs}s)")]
    Stale {
        /// Distance from now, in seconds.
        age_secs: i64,
    },
    /// Body is not a recognisable event.
    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl From<WebhookError> for AccessError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::NotConfigured => AccessError::Authorization(e.to_string()),
            other => AccessError::Validation(other.to_string()),
        }
    }
}

fn mac(secret: &[u8]) -> Result<HmacSha256, WebhookError> {
    HmacSha256::new_from_slice(secret).map_err(|_| WebhookError::NotConfigured)
}

/// Produce a signature header for `payload` at `timestamp`.
pub fn sign(secret: &[u8], timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let mut mac = mac(secret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// Verify a signature header against the raw body.
pub fn verify_signature(
    secret: &[u8],
    header: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::NotConfigured);
    }

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            return Err(WebhookError::MalformedHeader);
        };
        match key {
            "t" => timestamp = Some(value.parse().map_err(|_| WebhookError::MalformedHeader)?),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    // The header is unauthenticated here; extreme timestamps must not overflow.
    let age_secs = now.timestamp().saturating_sub(timestamp);
    if age_secs.unsigned_abs() > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(WebhookError::Stale { age_secs });
    }

    let matched = candidates.iter().any(|sig| {
        mac(secret)
            .map(|mut m| {
                m.update(timestamp.to_string().as_bytes());
                m.update(b".");
                m.update(payload);
                m.verify_slice(sig).is_ok()
            })
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// A subscription change addressed to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Provider event id.
    pub id: String,
    /// Subscriber email.
    pub email: String,
    /// What happened.
    pub event: SubscriptionEvent,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: SubscriptionObject,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    items: Option<ItemList>,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    data: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    price: ItemPrice,
}

#[derive(Debug, Deserialize)]
struct ItemPrice {
    id: String,
}

/// Parse a verified body.
///
/// Returns `Ok(None)` for event types and statuses that do not change
/// entitlements (e.g. `past_due`, invoice events).
pub fn parse_event(payload: &[u8]) -> Result<Option<WebhookEvent>, WebhookError> {
    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;

    let relevant = matches!(
        envelope.kind.as_str(),
        "customer.subscription.created" | "customer.subscription.updated" | "customer.subscription.deleted"
    );
    if !relevant {
        return Ok(None);
    }

    let object = envelope.data.object;
    let email = object
        .metadata
        .get("email")
        .map(|e| normalize_email(e))
        .filter(|e| !e.is_empty())
        .ok_or_else(|| WebhookError::Payload("subscription has no email metadata".to_string()))?;

    let event = if envelope.kind == "customer.subscription.deleted" {
        SubscriptionEvent::Canceled
    } else {
        match object.status.as_deref() {
            Some("active") | Some("trialing") => {
                let price_id = object
                    .items
                    .and_then(|items| items.data.into_iter().next())
                    .map(|item| item.price.id)
                    .ok_or_else(|| WebhookError::Payload("subscription has no price".to_string()))?;
                SubscriptionEvent::Activated { price_id }
            }
            Some("canceled") | Some("unpaid") | Some("incomplete_expired") => SubscriptionEvent::Canceled,
            _ => return Ok(None),
        }
    };

    Ok(Some(WebhookEvent {
        id: envelope.id,
        email,
        event,
    }))
}
