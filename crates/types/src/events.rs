//! Normalized webhook callback events
//!
//! A [`CallbackEvent`] is a tagged sum over the payload families a webhook can
//! carry. The discriminant ([`CallbackEventType`]) selects exactly one family and
//! the constructor refuses any payload of another family. [`FlatCallbackEvent`]
//! is the one-struct-many-fields shape kept for serialization boundaries.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CardDetails, Invoice, InvoiceLine, Metadata, Refund, Subscription};

/// Kind of vendor event received on a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackEventType {
    #[serde(rename = "setup_intent.succeeded")]
    SetupIntentSucceeded,

    #[serde(rename = "payment_intent.canceled")]
    PaymentIntentCanceled,
    #[serde(rename = "payment_intent.payment_failed")]
    PaymentIntentPaymentFailed,
    #[serde(rename = "payment_intent.succeeded")]
    PaymentIntentSucceeded,
    #[serde(rename = "payment_intent.amount_capturable_updated")]
    PaymentIntentAmountCapturableUpdated,

    #[serde(rename = "customer.subscription.created")]
    CustomerSubscriptionCreated,
    #[serde(rename = "customer.subscription.updated")]
    CustomerSubscriptionUpdated,
    #[serde(rename = "customer.subscription.deleted")]
    CustomerSubscriptionDeleted,
    #[serde(rename = "customer.subscription.trial_will_end")]
    CustomerSubscriptionTrialWillEnd,
    #[serde(rename = "customer.subscription.paused")]
    CustomerSubscriptionPaused,
    #[serde(rename = "customer.subscription.resumed")]
    CustomerSubscriptionResumed,

    #[serde(rename = "invoice.payment_succeeded")]
    InvoicePaymentSucceeded,
    #[serde(rename = "invoice.payment_failed")]
    InvoicePaymentFailed,
    #[serde(rename = "invoice.created")]
    InvoiceCreated,
    #[serde(rename = "invoice.upcoming")]
    InvoiceUpcoming,

    #[serde(rename = "refund.created")]
    RefundCreated,
    #[serde(rename = "refund.updated")]
    RefundUpdated,
    #[serde(rename = "refund.failed")]
    RefundFailed,
    #[serde(rename = "charge.refunded")]
    ChargeRefunded,
}

impl CallbackEventType {
    /// Every event kind this layer knows how to normalize
    pub const ALL: [CallbackEventType; 19] = [
        CallbackEventType::SetupIntentSucceeded,
        CallbackEventType::PaymentIntentCanceled,
        CallbackEventType::PaymentIntentPaymentFailed,
        CallbackEventType::PaymentIntentSucceeded,
        CallbackEventType::PaymentIntentAmountCapturableUpdated,
        CallbackEventType::CustomerSubscriptionCreated,
        CallbackEventType::CustomerSubscriptionUpdated,
        CallbackEventType::CustomerSubscriptionDeleted,
        CallbackEventType::CustomerSubscriptionTrialWillEnd,
        CallbackEventType::CustomerSubscriptionPaused,
        CallbackEventType::CustomerSubscriptionResumed,
        CallbackEventType::InvoicePaymentSucceeded,
        CallbackEventType::InvoicePaymentFailed,
        CallbackEventType::InvoiceCreated,
        CallbackEventType::InvoiceUpcoming,
        CallbackEventType::RefundCreated,
        CallbackEventType::RefundUpdated,
        CallbackEventType::RefundFailed,
        CallbackEventType::ChargeRefunded,
    ];

    /// Get the vendor's wire name for this event kind
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackEventType::SetupIntentSucceeded => "setup_intent.succeeded",
            CallbackEventType::PaymentIntentCanceled => "payment_intent.canceled",
            CallbackEventType::PaymentIntentPaymentFailed => "payment_intent.payment_failed",
            CallbackEventType::PaymentIntentSucceeded => "payment_intent.succeeded",
            CallbackEventType::PaymentIntentAmountCapturableUpdated => {
                "payment_intent.amount_capturable_updated"
            }
            CallbackEventType::CustomerSubscriptionCreated => "customer.subscription.created",
            CallbackEventType::CustomerSubscriptionUpdated => "customer.subscription.updated",
            CallbackEventType::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            CallbackEventType::CustomerSubscriptionTrialWillEnd => {
                "customer.subscription.trial_will_end"
            }
            CallbackEventType::CustomerSubscriptionPaused => "customer.subscription.paused",
            CallbackEventType::CustomerSubscriptionResumed => "customer.subscription.resumed",
            CallbackEventType::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            CallbackEventType::InvoicePaymentFailed => "invoice.payment_failed",
            CallbackEventType::InvoiceCreated => "invoice.created",
            CallbackEventType::InvoiceUpcoming => "invoice.upcoming",
            CallbackEventType::RefundCreated => "refund.created",
            CallbackEventType::RefundUpdated => "refund.updated",
            CallbackEventType::RefundFailed => "refund.failed",
            CallbackEventType::ChargeRefunded => "charge.refunded",
        }
    }

    /// Get the payload family carried by events of this kind
    pub fn family(&self) -> EventFamily {
        use CallbackEventType::*;
        match self {
            SetupIntentSucceeded => EventFamily::SetupIntent,
            PaymentIntentCanceled
            | PaymentIntentPaymentFailed
            | PaymentIntentSucceeded
            | PaymentIntentAmountCapturableUpdated => EventFamily::PaymentIntent,
            CustomerSubscriptionCreated
            | CustomerSubscriptionUpdated
            | CustomerSubscriptionDeleted
            | CustomerSubscriptionTrialWillEnd
            | CustomerSubscriptionPaused
            | CustomerSubscriptionResumed => EventFamily::Subscription,
            InvoicePaymentSucceeded | InvoicePaymentFailed | InvoiceCreated | InvoiceUpcoming => {
                EventFamily::Invoice
            }
            RefundCreated | RefundUpdated | RefundFailed | ChargeRefunded => EventFamily::Refund,
        }
    }
}

impl fmt::Display for CallbackEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire event name matches none of the known kinds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for CallbackEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CallbackEventType::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Payload family selected by an event's discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFamily {
    SetupIntent,
    PaymentIntent,
    Subscription,
    Invoice,
    Refund,
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFamily::SetupIntent => write!(f, "setup_intent"),
            EventFamily::PaymentIntent => write!(f, "payment_intent"),
            EventFamily::Subscription => write!(f, "subscription"),
            EventFamily::Invoice => write!(f, "invoice"),
            EventFamily::Refund => write!(f, "refund"),
        }
    }
}

/// Payload of a `setup_intent.*` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupIntentEvent {
    pub setup_intent_id: String,
    pub payment_method_id: Option<String>,
    /// Present only when the attached payment method is a card
    pub card: Option<CardDetails>,
}

/// Last error reported by the vendor on a failed payment attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
    pub decline_code: Option<String>,
    pub payment_method_id: Option<String>,
    pub charge_id: Option<String>,
}

/// Payload of a `payment_intent.*` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentEvent {
    pub payment_intent_id: String,
    pub amount: i64,
    /// Populated only for `payment_intent.amount_capturable_updated`
    pub amount_capturable: i64,
    pub status: String,
    pub payment_method_id: Option<String>,
    /// Value of the `PreAllocated` metadata key
    pub pre_allocated: Option<String>,
    /// Value of the `ValidateOnly` metadata key
    pub validate_only: Option<String>,
    /// Populated only for `payment_intent.payment_failed` when the vendor sent an error
    pub last_payment_error: Option<LastPaymentError>,
}

/// Family-specific payload of a callback event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "data", rename_all = "snake_case")]
pub enum CallbackPayload {
    SetupIntent(SetupIntentEvent),
    PaymentIntent(PaymentIntentEvent),
    Subscription(Subscription),
    Invoice(Invoice),
    Refund(Refund),
}

impl CallbackPayload {
    pub fn family(&self) -> EventFamily {
        match self {
            CallbackPayload::SetupIntent(_) => EventFamily::SetupIntent,
            CallbackPayload::PaymentIntent(_) => EventFamily::PaymentIntent,
            CallbackPayload::Subscription(_) => EventFamily::Subscription,
            CallbackPayload::Invoice(_) => EventFamily::Invoice,
            CallbackPayload::Refund(_) => EventFamily::Refund,
        }
    }
}

/// Returned when a payload does not belong to the family its discriminant selects
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{event_type} carries a {expected} payload, got {found}")]
pub struct FamilyMismatch {
    pub event_type: CallbackEventType,
    pub expected: EventFamily,
    pub found: EventFamily,
}

/// Normalized, version-agnostic representation of one webhook notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackEvent {
    #[serde(rename = "type")]
    event_type: CallbackEventType,
    metadata: Metadata,
    payload: CallbackPayload,
}

impl CallbackEvent {
    /// Build an event, checking that the payload matches the discriminant's family
    pub fn new(
        event_type: CallbackEventType,
        metadata: Metadata,
        payload: CallbackPayload,
    ) -> Result<Self, FamilyMismatch> {
        let expected = event_type.family();
        let found = payload.family();
        if expected != found {
            return Err(FamilyMismatch {
                event_type,
                expected,
                found,
            });
        }
        Ok(Self {
            event_type,
            metadata,
            payload,
        })
    }

    pub fn event_type(&self) -> CallbackEventType {
        self.event_type
    }

    pub fn family(&self) -> EventFamily {
        self.payload.family()
    }

    /// Metadata copied verbatim from the vendor object (possibly empty)
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn payload(&self) -> &CallbackPayload {
        &self.payload
    }

    pub fn into_parts(self) -> (CallbackEventType, Metadata, CallbackPayload) {
        (self.event_type, self.metadata, self.payload)
    }

    pub fn setup_intent(&self) -> Option<&SetupIntentEvent> {
        match &self.payload {
            CallbackPayload::SetupIntent(p) => Some(p),
            _ => None,
        }
    }

    pub fn payment_intent(&self) -> Option<&PaymentIntentEvent> {
        match &self.payload {
            CallbackPayload::PaymentIntent(p) => Some(p),
            _ => None,
        }
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        match &self.payload {
            CallbackPayload::Subscription(p) => Some(p),
            _ => None,
        }
    }

    pub fn invoice(&self) -> Option<&Invoice> {
        match &self.payload {
            CallbackPayload::Invoice(p) => Some(p),
            _ => None,
        }
    }

    pub fn refund(&self) -> Option<&Refund> {
        match &self.payload {
            CallbackPayload::Refund(p) => Some(p),
            _ => None,
        }
    }
}

/// Flat serialization shape of a [`CallbackEvent`]
///
/// Fields outside the populated family hold their zero value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatCallbackEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub metadata: Metadata,
    pub pre_allocated: String,
    pub validate_only: String,

    pub setup_intent_id: String,
    pub payment_method_id: String,
    pub card_brand: String,
    pub card_exp_month: u32,
    pub card_exp_year: u32,
    pub card_last4: String,

    pub payment_intent_id: String,
    pub amount: i64,
    pub amount_capturable: i64,
    pub status: String,

    pub last_payment_error_code: String,
    pub last_payment_error_msg: String,
    pub last_payment_error_decline_code: String,
    pub last_payment_error_payment_method_id: String,
    pub last_payment_error_charge_id: String,

    pub subscription_id: String,
    pub customer_id: String,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub canceled_at: i64,
    pub created_at: Option<DateTime<Utc>>,

    pub invoice_id: String,
    pub invoice_lines: Vec<InvoiceLine>,

    pub refund_id: String,
    pub refund_amount: i64,
    pub refund_reason: String,
    pub refund_status: String,
    pub charge_id: String,
    pub currency: String,
}

impl From<&CallbackEvent> for FlatCallbackEvent {
    fn from(event: &CallbackEvent) -> Self {
        let mut flat = FlatCallbackEvent {
            event_type: event.event_type.as_str().to_string(),
            metadata: event.metadata.clone(),
            ..Default::default()
        };

        match &event.payload {
            CallbackPayload::SetupIntent(p) => {
                flat.setup_intent_id = p.setup_intent_id.clone();
                flat.payment_method_id = p.payment_method_id.clone().unwrap_or_default();
                if let Some(card) = &p.card {
                    flat.card_brand = card.brand.clone();
                    flat.card_last4 = card.last4.clone();
                    flat.card_exp_month = card.exp_month;
                    flat.card_exp_year = card.exp_year;
                }
            }
            CallbackPayload::PaymentIntent(p) => {
                flat.payment_intent_id = p.payment_intent_id.clone();
                flat.amount = p.amount;
                flat.amount_capturable = p.amount_capturable;
                flat.status = p.status.clone();
                flat.payment_method_id = p.payment_method_id.clone().unwrap_or_default();
                flat.pre_allocated = p.pre_allocated.clone().unwrap_or_default();
                flat.validate_only = p.validate_only.clone().unwrap_or_default();
                if let Some(err) = &p.last_payment_error {
                    flat.last_payment_error_code = err.code.clone().unwrap_or_default();
                    flat.last_payment_error_msg = err.message.clone().unwrap_or_default();
                    flat.last_payment_error_decline_code =
                        err.decline_code.clone().unwrap_or_default();
                    flat.last_payment_error_payment_method_id =
                        err.payment_method_id.clone().unwrap_or_default();
                    flat.last_payment_error_charge_id = err.charge_id.clone().unwrap_or_default();
                }
            }
            CallbackPayload::Subscription(s) => {
                flat.subscription_id = s.id.clone();
                flat.customer_id = s.customer_id.clone();
                flat.status = s.status.clone();
                flat.current_period_end =
                    s.current_period_end.map(|dt| dt.timestamp()).unwrap_or(0);
                flat.cancel_at_period_end = s.cancel_at_period_end;
                flat.canceled_at = s.canceled_at.map(|dt| dt.timestamp()).unwrap_or(0);
                flat.created_at = Some(s.created_at);
            }
            CallbackPayload::Invoice(inv) => {
                flat.invoice_id = inv.id.clone();
                flat.customer_id = inv.customer_id.clone().unwrap_or_default();
                flat.amount = inv.amount_due;
                flat.status = inv.status.clone().unwrap_or_default();
                flat.created_at = Some(inv.created_at);
                flat.invoice_lines = inv.lines.clone();
            }
            CallbackPayload::Refund(r) => {
                flat.refund_id = r.id.clone();
                flat.refund_amount = r.amount;
                flat.refund_reason = r.reason.clone().unwrap_or_default();
                flat.refund_status = r.status.clone().unwrap_or_default();
                flat.charge_id = r.charge_id.clone().unwrap_or_default();
                flat.currency = r.currency.clone();
                flat.created_at = Some(r.created_at);
            }
        }

        flat
    }
}
