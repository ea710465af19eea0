//! Payment provider webhook receiver
//!
//! POST /api/webhooks/payment - signed event delivery from the payment
//! provider.
//!
//! The signature gate returns 400 (the provider alerts on persistent
//! failures there); events that verify but cannot be processed are
//! acknowledged and dropped, because redelivery cannot fix a malformed
//! event. Store failures propagate as 5xx so the provider redelivers.

use actix_web::{post, web, HttpRequest, HttpResponse};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::ApiError;
use crate::services::fulfillment::{self, CheckoutSession, SESSION_TYPE_LEAD_PACK};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: WebhookEventData,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookEventData {
    object: Option<serde_json::Value>,
}

/// Verify the hex HMAC-SHA256 signature over the raw request body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[post("/api/webhooks/payment")]
pub async fn payment_webhook(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidArgument("Missing webhook signature".to_string()))?;

    if !verify_signature(config.webhook_secret.expose_secret(), &body, signature) {
        return Err(ApiError::InvalidArgument(
            "Invalid webhook signature".to_string(),
        ));
    }

    let received = HttpResponse::Ok().json(json!({ "received": true }));

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook event acknowledged and dropped");
            return Ok(received);
        }
    };

    if event.event_type != EVENT_CHECKOUT_COMPLETED {
        tracing::debug!(event_type = %event.event_type, "webhook event type ignored");
        return Ok(received);
    }

    let session: CheckoutSession = match event
        .data
        .object
        .ok_or_else(|| "missing data.object".to_string())
        .and_then(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
    {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "malformed checkout session acknowledged and dropped");
            return Ok(received);
        }
    };

    if session.metadata.session_type.as_deref() != Some(SESSION_TYPE_LEAD_PACK) {
        tracing::debug!("checkout session without lead pack metadata ignored");
        return Ok(received);
    }

    fulfillment::fulfill_lead_pack(&pool, session).await?;

    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let secret = "whsec_test";
        let body = br#"{"type":"checkout.session.completed"}"#;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_signature(secret, body, &signature));
        assert!(verify_signature(secret, body, &format!(" {signature} ")));
        assert!(!verify_signature("other", body, &signature));
        assert!(!verify_signature(secret, b"tampered", &signature));
        assert!(!verify_signature(secret, body, "zz-not-hex"));
    }
}
