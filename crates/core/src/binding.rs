//! Seam between the version-agnostic adapter and one vendor API release
//!
//! A binding owns everything that differs between releases: the wire shape of
//! each object family, the request encoding of each API call and the webhook
//! signature rules. The adapter built on top of it only deals in the types of
//! `multistripe-types`.

use std::fmt;

use async_trait::async_trait;
use multistripe_types::{
    Customer, CustomerParams, Invoice, Metadata, PaymentIntent, PaymentIntentEvent,
    PaymentIntentParams, PaymentMethod, Refund, SetupIntentEvent, Subscription,
    SubscriptionUpdate,
};
use serde::de::DeserializeOwned;

use crate::error::{RemoteError, Result};

/// Result of a vendor API call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Secrets an adapter hands to its binding on every call
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub secret_key: String,
    pub webhook_secret: String,
}

impl Credentials {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_key", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .finish()
    }
}

/// Webhook envelope whose signature checked out
///
/// `event_type` is still the raw vendor string: classification happens in the
/// normalizer, and `object` is decoded only once the family is known.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedEvent {
    pub id: String,
    pub event_type: String,
    /// API version the vendor rendered the event with
    pub api_version: Option<String>,
    pub created: i64,
    pub livemode: bool,
    /// Nested `data.object` in the release's own wire shape
    pub object: serde_json::Value,
}

/// Release-specific wire object that projects into one payload family
pub trait WireObject: DeserializeOwned + Send {
    type Payload;

    /// Split into the object's verbatim metadata and its family payload
    fn into_parts(self) -> (Metadata, Self::Payload);
}

/// Wire shapes of every object family a release can deliver on a webhook
pub trait WireSchema: Send + Sync + 'static {
    type SetupIntent: WireObject<Payload = SetupIntentEvent>;
    type PaymentIntent: WireObject<Payload = PaymentIntentEvent>;
    type Subscription: WireObject<Payload = Subscription>;
    type Invoice: WireObject<Payload = Invoice>;
    type Refund: WireObject<Payload = Refund>;
    /// Charge object carried by `charge.refunded`
    type Charge: WireObject<Payload = Refund>;
}

/// One vendor API release
#[async_trait]
pub trait VendorBinding: Send + Sync + 'static {
    type Schema: WireSchema;

    /// Short version name used as the registry key (e.g., "v82")
    fn version(&self) -> &str;

    /// Check the signature header against the raw body and parse the envelope
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<VerifiedEvent>;

    async fn create_customer(
        &self,
        credentials: &Credentials,
        params: &CustomerParams,
    ) -> RemoteResult<Customer>;

    async fn update_customer(
        &self,
        credentials: &Credentials,
        customer_id: &str,
        params: &CustomerParams,
    ) -> RemoteResult<Customer>;

    async fn list_payment_methods(
        &self,
        credentials: &Credentials,
        customer_id: &str,
    ) -> RemoteResult<Vec<PaymentMethod>>;

    async fn attach_payment_method(
        &self,
        credentials: &Credentials,
        customer_id: &str,
        payment_method_id: &str,
    ) -> RemoteResult<PaymentMethod>;

    async fn detach_payment_method(
        &self,
        credentials: &Credentials,
        payment_method_id: &str,
    ) -> RemoteResult<()>;

    async fn create_payment_intent(
        &self,
        credentials: &Credentials,
        params: &PaymentIntentParams,
    ) -> RemoteResult<PaymentIntent>;

    async fn retrieve_payment_intent(
        &self,
        credentials: &Credentials,
        payment_intent_id: &str,
    ) -> RemoteResult<PaymentIntent>;

    async fn create_subscription(
        &self,
        credentials: &Credentials,
        customer_id: &str,
        price_id: &str,
    ) -> RemoteResult<Subscription>;

    async fn list_subscriptions(
        &self,
        credentials: &Credentials,
        customer_id: &str,
    ) -> RemoteResult<Vec<Subscription>>;

    async fn update_subscription(
        &self,
        credentials: &Credentials,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> RemoteResult<Subscription>;

    /// Cancel now, or flag the subscription to end with its current period
    async fn cancel_subscription(
        &self,
        credentials: &Credentials,
        subscription_id: &str,
        at_period_end: bool,
    ) -> RemoteResult<Subscription>;
}
