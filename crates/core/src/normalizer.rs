use std::fmt;

use multistripe_types::{
    CallbackEvent, CallbackEventType, CallbackPayload, EventFamily, Metadata, PRE_ALLOCATED_KEY,
    PaymentIntentEvent, VALIDATE_ONLY_KEY,
};
use serde::de::Error as _;
use tracing::{debug, trace, warn};

use crate::{
    binding::{VendorBinding, VerifiedEvent, WireObject, WireSchema},
    error::{Result, StripeError},
};

/// States a webhook delivery passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookStage {
    Unverified,
    Verified,
    Classified,
    Decoded,
    Projected,
    Delivered,
    Rejected,
}

impl WebhookStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStage::Unverified => "unverified",
            WebhookStage::Verified => "verified",
            WebhookStage::Classified => "classified",
            WebhookStage::Decoded => "decoded",
            WebhookStage::Projected => "projected",
            WebhookStage::Delivered => "delivered",
            WebhookStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WebhookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verify a signed payload with `binding` and normalize it
///
/// Stops at the first failing stage; nothing is produced for a rejected
/// delivery.
pub fn verify_and_normalize<B: VendorBinding>(
    binding: &B,
    payload: &[u8],
    signature: &str,
    secret: &str,
) -> Result<CallbackEvent> {
    let event = binding
        .verify_webhook(payload, signature, secret)
        .inspect_err(|e| {
            warn!(
                version = binding.version(),
                stage = %WebhookStage::Rejected,
                error = %e,
                "Webhook signature rejected"
            );
        })?;
    trace!(
        version = binding.version(),
        event_id = %event.id,
        stage = %WebhookStage::Verified,
        "Webhook signature verified"
    );
    normalize::<B::Schema>(event)
}

/// Map the raw vendor kind onto a known event type
pub fn classify(event: &VerifiedEvent) -> Result<CallbackEventType> {
    Ok(event.event_type.parse::<CallbackEventType>()?)
}

/// Classify, decode and project a verified event in the wire shapes of `S`
pub fn normalize<S: WireSchema>(event: VerifiedEvent) -> Result<CallbackEvent> {
    let kind = classify(&event).inspect_err(|_| {
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            stage = %WebhookStage::Rejected,
            "Ignoring unrecognized event kind"
        );
    })?;
    trace!(event_id = %event.id, event_type = %kind, stage = %WebhookStage::Classified);

    let VerifiedEvent { id, object, .. } = event;
    let (metadata, payload) = match kind.family() {
        EventFamily::SetupIntent => {
            let (metadata, setup_intent) = decode::<S::SetupIntent>(kind, object)?;
            (metadata, CallbackPayload::SetupIntent(setup_intent))
        }
        EventFamily::PaymentIntent => {
            let (metadata, payment_intent) = decode::<S::PaymentIntent>(kind, object)?;
            let payment_intent = project_payment_intent(kind, &metadata, payment_intent);
            (metadata, CallbackPayload::PaymentIntent(payment_intent))
        }
        EventFamily::Subscription => {
            let (metadata, subscription) = decode::<S::Subscription>(kind, object)?;
            (metadata, CallbackPayload::Subscription(subscription))
        }
        EventFamily::Invoice => {
            let (metadata, invoice) = decode::<S::Invoice>(kind, object)?;
            (metadata, CallbackPayload::Invoice(invoice))
        }
        EventFamily::Refund if kind == CallbackEventType::ChargeRefunded => {
            let (metadata, refund) = decode::<S::Charge>(kind, object)?;
            (metadata, CallbackPayload::Refund(refund))
        }
        EventFamily::Refund => {
            let (metadata, refund) = decode::<S::Refund>(kind, object)?;
            (metadata, CallbackPayload::Refund(refund))
        }
    };
    trace!(event_id = %id, event_type = %kind, stage = %WebhookStage::Decoded);

    let event = CallbackEvent::new(kind, metadata, payload)
        .map_err(|e| StripeError::decode(kind.as_str(), serde_json::Error::custom(e)))?;
    debug!(
        event_id = %id,
        event_type = %kind,
        family = %event.family(),
        stage = %WebhookStage::Projected,
        "Webhook normalized"
    );
    Ok(event)
}

fn decode<W: WireObject>(
    kind: CallbackEventType,
    object: serde_json::Value,
) -> Result<(Metadata, W::Payload)> {
    let wire: W = serde_json::from_value(object).map_err(|source| {
        warn!(
            event_type = %kind,
            stage = %WebhookStage::Rejected,
            error = %source,
            "Malformed event object"
        );
        StripeError::decode(kind.as_str(), source)
    })?;
    Ok(wire.into_parts())
}

/// Kind-specific fields of a payment intent payload
fn project_payment_intent(
    kind: CallbackEventType,
    metadata: &Metadata,
    mut payment_intent: PaymentIntentEvent,
) -> PaymentIntentEvent {
    if kind != CallbackEventType::PaymentIntentAmountCapturableUpdated {
        payment_intent.amount_capturable = 0;
    }
    if kind != CallbackEventType::PaymentIntentPaymentFailed {
        payment_intent.last_payment_error = None;
    }
    payment_intent.pre_allocated = metadata.get(PRE_ALLOCATED_KEY).cloned();
    payment_intent.validate_only = metadata.get(VALIDATE_ONLY_KEY).cloned();
    payment_intent
}
