//! Credit fulfillment protocol
//!
//! Converts a completed checkout session into credited leads, exactly once.
//! Webhook delivery is at-least-once: the payment marker keyed by session id
//! short-circuits duplicates inside the same transaction that credits the
//! account.
//!
//! Error asymmetry is deliberate: store errors propagate (the provider's
//! retry will re-deliver and may succeed), while malformed events are logged
//! and dropped (a permanently-bad event would otherwise redeliver forever).

use serde::Deserialize;

use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::payment::{
    lead_pack, NewPaymentMarker, PaymentMarker, PAYMENT_STATUS_SUCCESS, PAYMENT_TYPE_LEAD_PACK,
};
use crate::models::user::CreditPool;
use crate::services::ledger;

pub const SESSION_TYPE_LEAD_PACK: &str = "lead_pack";

/// The slice of a provider checkout session this core consumes. Anything
/// else on the provider object is ignored on parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionMetadata {
    #[serde(rename = "type", default)]
    pub session_type: Option<String>,
    #[serde(rename = "packId", default)]
    pub pack_id: Option<String>,
    #[serde(rename = "creditType", default)]
    pub credit_type: Option<String>,
    #[serde(rename = "contractorId", default)]
    pub contractor_id: Option<String>,
}

impl CheckoutSession {
    fn is_paid(&self) -> bool {
        // Only gate on fields the provider actually sent.
        if let Some(ps) = self.payment_status.as_deref() {
            let ps = ps.trim().to_lowercase();
            if !ps.is_empty() && ps != "paid" && ps != "no_payment_required" {
                return false;
            }
        }
        if let Some(st) = self.status.as_deref() {
            let st = st.trim().to_lowercase();
            if !st.is_empty() && st != "complete" {
                return false;
            }
        }
        true
    }

    fn contractor_id(&self) -> Option<String> {
        let from_metadata = self
            .metadata
            .contractor_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let from_reference = self
            .client_reference_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        from_metadata.or(from_reference).map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Credits were granted in this call.
    Credited { leads: i32, pool: CreditPool },
    /// A successful marker already existed; nothing was mutated.
    AlreadyFulfilled,
    /// The event can never be fulfilled; dropped without error.
    Ignored(&'static str),
}

pub async fn fulfill_lead_pack(
    pool: &DbPool,
    session: CheckoutSession,
) -> Result<FulfillmentOutcome, ApiError> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || fulfill_lead_pack_blocking(&pool, &session))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

pub fn fulfill_lead_pack_blocking(
    pool: &DbPool,
    session: &CheckoutSession,
) -> Result<FulfillmentOutcome, ApiError> {
    if session.id.trim().is_empty() {
        tracing::warn!("fulfillment event without session id dropped");
        return Ok(FulfillmentOutcome::Ignored("missing session id"));
    }

    if !session.is_paid() {
        tracing::info!(
            session = %log_session!(&session.id),
            payment_status = ?session.payment_status,
            status = ?session.status,
            "session not paid/complete, skipping fulfillment"
        );
        return Ok(FulfillmentOutcome::Ignored("not paid"));
    }

    let contractor_id = match session.contractor_id() {
        Some(id) => id,
        None => {
            tracing::warn!(
                session = %log_session!(&session.id),
                "paid session without contractor reference dropped"
            );
            return Ok(FulfillmentOutcome::Ignored("missing contractor id"));
        }
    };

    let pack = match session
        .metadata
        .pack_id
        .as_deref()
        .and_then(lead_pack)
    {
        Some(pack) => pack,
        None => {
            tracing::warn!(
                session = %log_session!(&session.id),
                pack_id = ?session.metadata.pack_id,
                "paid session with unknown pack dropped"
            );
            return Ok(FulfillmentOutcome::Ignored("unknown pack"));
        }
    };

    // The catalog is authoritative for the credited pool; session metadata
    // only carries the client's idea of the credit type, normalized here and
    // flagged when it disagrees.
    if let Some(raw) = session.metadata.credit_type.as_deref() {
        if CreditPool::from_credit_type(raw) != pack.credit_type {
            tracing::warn!(
                session = %log_session!(&session.id),
                metadata_credit_type = raw,
                pack_credit_type = pack.credit_type.credit_type(),
                "session credit-type metadata disagrees with the pack catalog"
            );
        }
    }

    let session_id = session.id.trim().to_string();
    let amount_cents = session.amount_total.unwrap_or(0);
    let currency = session
        .currency
        .clone()
        .unwrap_or_else(|| "usd".to_string());

    let outcome = db::run_in_transaction(pool, |conn| {
        if let Some(existing) = PaymentMarker::find_by_session(conn, &session_id)? {
            if existing.is_fulfilled_lead_pack() {
                return Ok(FulfillmentOutcome::AlreadyFulfilled);
            }
        }

        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        PaymentMarker::upsert(
            conn,
            NewPaymentMarker {
                session_id: session_id.clone(),
                contractor_id: contractor_id.clone(),
                payment_type: PAYMENT_TYPE_LEAD_PACK.to_string(),
                status: PAYMENT_STATUS_SUCCESS.to_string(),
                pack_id: Some(pack.id.to_string()),
                credit_type: Some(pack.credit_type.credit_type().to_string()),
                leads_granted: Some(pack.leads),
                amount_cents,
                currency: currency.clone(),
                created_at: now,
            },
        )?;

        ledger::apply_delta(conn, &contractor_id, pack.credit_type, pack.leads)?;

        Ok(FulfillmentOutcome::Credited {
            leads: pack.leads,
            pool: pack.credit_type,
        })
    })?;

    match &outcome {
        FulfillmentOutcome::Credited { leads, pool } => tracing::info!(
            session = %log_session!(&session_id),
            contractor = %log_uid!(&contractor_id),
            leads,
            credit_type = pool.credit_type(),
            "lead pack fulfilled"
        ),
        FulfillmentOutcome::AlreadyFulfilled => tracing::info!(
            session = %log_session!(&session_id),
            "duplicate fulfillment delivery ignored"
        ),
        FulfillmentOutcome::Ignored(_) => {}
    }

    Ok(outcome)
}
