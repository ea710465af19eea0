//! Payment fulfillment markers and the lead pack catalog.
//!
//! A marker row keyed by checkout session id guarantees a payment session
//! fulfills credits at most once: webhook delivery is at-least-once, so the
//! fulfillment protocol short-circuits when a successful marker already
//! exists.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::user::CreditPool;
use crate::schema::payments;

pub const PAYMENT_TYPE_LEAD_PACK: &str = "lead_pack";
pub const PAYMENT_STATUS_SUCCESS: &str = "success";

/// A purchasable credit pack. The catalog is fixed in code; pack prices are
/// not read back from the payment provider.
#[derive(Debug, Clone)]
pub struct LeadPack {
    pub id: &'static str,
    pub leads: i32,
    pub amount_cents: i64,
    pub name: &'static str,
    pub credit_type: CreditPool,
}

/// Look up a pack by id. Unknown ids return `None`; the fulfillment protocol
/// treats that as a permanently-malformed event, not an error.
pub fn lead_pack(pack_id: &str) -> Option<LeadPack> {
    let pack = match pack_id.trim() {
        "ne_1" => LeadPack {
            id: "ne_1",
            leads: 1,
            amount_cents: 5_000,
            name: "1 Lead (Non-exclusive)",
            credit_type: CreditPool::NonExclusive,
        },
        "ne_10" => LeadPack {
            id: "ne_10",
            leads: 10,
            amount_cents: 45_000,
            name: "10 Leads (Non-exclusive)",
            credit_type: CreditPool::NonExclusive,
        },
        "ne_20" => LeadPack {
            id: "ne_20",
            leads: 20,
            amount_cents: 85_000,
            name: "20 Leads (Non-exclusive)",
            credit_type: CreditPool::NonExclusive,
        },
        "ex_1" => LeadPack {
            id: "ex_1",
            leads: 1,
            amount_cents: 8_000,
            name: "1 Lead (Exclusive)",
            credit_type: CreditPool::Exclusive,
        },
        "ex_10" => LeadPack {
            id: "ex_10",
            leads: 10,
            amount_cents: 72_000,
            name: "10 Leads (Exclusive)",
            credit_type: CreditPool::Exclusive,
        },
        "ex_20" => LeadPack {
            id: "ex_20",
            leads: 20,
            amount_cents: 136_000,
            name: "20 Leads (Exclusive)",
            credit_type: CreditPool::Exclusive,
        },
        _ => return None,
    };
    Some(pack)
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = payments, primary_key(session_id))]
pub struct PaymentMarker {
    pub session_id: String,
    pub contractor_id: String,
    pub payment_type: String,
    pub status: String,
    pub pack_id: Option<String>,
    pub credit_type: Option<String>,
    pub leads_granted: Option<i32>,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPaymentMarker {
    pub session_id: String,
    pub contractor_id: String,
    pub payment_type: String,
    pub status: String,
    pub pack_id: Option<String>,
    pub credit_type: Option<String>,
    pub leads_granted: Option<i32>,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: String,
}

impl PaymentMarker {
    pub fn find_by_session(
        conn: &mut SqliteConnection,
        session_id: &str,
    ) -> QueryResult<Option<Self>> {
        payments::table.find(session_id).first(conn).optional()
    }

    /// True when this marker already records a successful lead-pack
    /// fulfillment: the idempotent short-circuit condition.
    pub fn is_fulfilled_lead_pack(&self) -> bool {
        self.payment_type == PAYMENT_TYPE_LEAD_PACK && self.status == PAYMENT_STATUS_SUCCESS
    }

    /// Insert-or-update the marker. A failed or partial marker from an
    /// earlier delivery is overwritten; last write wins on the non-key
    /// fields.
    pub fn upsert(conn: &mut SqliteConnection, marker: NewPaymentMarker) -> QueryResult<()> {
        diesel::insert_into(payments::table)
            .values(&marker)
            .on_conflict(payments::session_id)
            .do_update()
            .set((
                payments::contractor_id.eq(&marker.contractor_id),
                payments::payment_type.eq(&marker.payment_type),
                payments::status.eq(&marker.status),
                payments::pack_id.eq(&marker.pack_id),
                payments::credit_type.eq(&marker.credit_type),
                payments::leads_granted.eq(&marker.leads_granted),
                payments::amount_cents.eq(marker.amount_cents),
                payments::currency.eq(&marker.currency),
            ))
            .execute(conn)?;
        Ok(())
    }
}
