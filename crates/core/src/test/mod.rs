//! In-memory vendor binding used by the unit tests of this crate

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::DateTime;
use multistripe_types::{
    CallbackEvent, CallbackEventType, CallbackPayload, Customer, CustomerParams, Invoice,
    InvoiceLine, LastPaymentError, Metadata, PaymentIntent, PaymentIntentEvent,
    PaymentIntentParams, PaymentMethod, Refund, SetupIntentEvent, Subscription,
    SubscriptionUpdate, created_timestamp, sorted_metadata,
};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;

use crate::{
    binding::{Credentials, RemoteResult, VendorBinding, VerifiedEvent, WireObject, WireSchema},
    error::{RemoteError, Result, StripeError},
};

/// Signature header the mock binding accepts for `secret`
pub fn signed(secret: &str) -> String {
    format!("mock={secret}")
}

/// Webhook body in the mock envelope shape
pub fn mock_event(event_type: &str, object: serde_json::Value) -> Vec<u8> {
    json!({
        "id": "evt_mock",
        "type": event_type,
        "created": 1_700_000_000,
        "data": { "object": object }
    })
    .to_string()
    .into_bytes()
}

pub fn refund_event(id: &str) -> CallbackEvent {
    let refund = Refund {
        id: id.to_string(),
        amount: 100,
        reason: None,
        status: Some("succeeded".to_string()),
        charge_id: None,
        currency: "usd".to_string(),
        created_at: created_timestamp(Some(1_700_000_000)),
        metadata: Metadata::new(),
    };
    CallbackEvent::new(
        CallbackEventType::RefundCreated,
        Metadata::new(),
        CallbackPayload::Refund(refund),
    )
    .unwrap()
}

pub struct MockBinding {
    version: String,
    delay: Option<Duration>,
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MockBinding {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            delay: None,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every vendor call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every vendor call with the given error code
    pub fn failing(mut self, code: &str) -> Self {
        self.failure = Some(code.to_string());
        self
    }

    /// Operations invoked so far, as `operation:secret_key`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn record(&self, operation: &str, credentials: &Credentials) -> RemoteResult<()> {
        self.calls
            .lock()
            .push(format!("{operation}:{}", credentials.secret_key));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(code) => Err(RemoteError {
                status: Some(400),
                error_type: Some("invalid_request_error".to_string()),
                code: Some(code.clone()),
                message: format!("mock failure for {operation}"),
                ..Default::default()
            }),
            None => Ok(()),
        }
    }
}

fn subscription(id: &str, customer_id: &str, cancel_at_period_end: bool) -> Subscription {
    Subscription {
        id: id.to_string(),
        customer_id: customer_id.to_string(),
        status: "active".to_string(),
        price_id: Some("price_1".to_string()),
        current_period_end: DateTime::from_timestamp(1_702_592_000, 0),
        cancel_at_period_end,
        canceled_at: None,
        metadata: Metadata::new(),
        created_at: created_timestamp(Some(1_700_000_000)),
    }
}

fn payment_method(id: &str, customer_id: Option<&str>) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        customer_id: customer_id.map(str::to_string),
        payment_type: "card".to_string(),
        card: None,
        is_default: false,
        metadata: Metadata::new(),
        created_at: created_timestamp(Some(1_700_000_000)),
    }
}

#[async_trait]
impl VendorBinding for MockBinding {
    type Schema = MockSchema;

    fn version(&self) -> &str {
        &self.version
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<VerifiedEvent> {
        if secret.is_empty() || signature != signed(secret) {
            return Err(StripeError::AuthenticationFailure(
                "signature mismatch".to_string(),
            ));
        }
        let envelope: MockEnvelope = serde_json::from_slice(payload)
            .map_err(|e| StripeError::AuthenticationFailure(e.to_string()))?;
        Ok(VerifiedEvent {
            id: envelope.id,
            event_type: envelope.event_type,
            api_version: None,
            created: envelope.created,
            livemode: false,
            object: envelope.data.object,
        })
    }

    async fn create_customer(
        &self,
        credentials: &Credentials,
        params: &CustomerParams,
    ) -> RemoteResult<Customer> {
        self.record("create_customer", credentials).await?;
        Ok(Customer {
            id: "cus_mock".to_string(),
            name: params.name.clone(),
            email: params.email.clone(),
            phone: params.phone.clone(),
            postcode: params.postcode.clone(),
            metadata: params.metadata.clone(),
            created_at: created_timestamp(Some(1_700_000_000)),
        })
    }

    async fn update_customer(
        &self,
        credentials: &Credentials,
        customer_id: &str,
        params: &CustomerParams,
    ) -> RemoteResult<Customer> {
        self.record("update_customer", credentials).await?;
        Ok(Customer {
            id: customer_id.to_string(),
            name: params.name.clone(),
            email: params.email.clone(),
            phone: params.phone.clone(),
            postcode: params.postcode.clone(),
            metadata: params.metadata.clone(),
            created_at: created_timestamp(Some(1_700_000_000)),
        })
    }

    async fn list_payment_methods(
        &self,
        credentials: &Credentials,
        customer_id: &str,
    ) -> RemoteResult<Vec<PaymentMethod>> {
        self.record("list_payment_methods", credentials).await?;
        Ok(vec![payment_method("pm_1", Some(customer_id))])
    }

    async fn attach_payment_method(
        &self,
        credentials: &Credentials,
        customer_id: &str,
        payment_method_id: &str,
    ) -> RemoteResult<PaymentMethod> {
        self.record("attach_payment_method", credentials).await?;
        Ok(payment_method(payment_method_id, Some(customer_id)))
    }

    async fn detach_payment_method(
        &self,
        credentials: &Credentials,
        _payment_method_id: &str,
    ) -> RemoteResult<()> {
        self.record("detach_payment_method", credentials).await
    }

    async fn create_payment_intent(
        &self,
        credentials: &Credentials,
        params: &PaymentIntentParams,
    ) -> RemoteResult<PaymentIntent> {
        self.record("create_payment_intent", credentials).await?;
        Ok(PaymentIntent {
            id: "pi_mock".to_string(),
            amount: params.amount,
            currency: params.currency.clone(),
            status: "succeeded".to_string(),
            client_secret: Some("pi_mock_secret".to_string()),
            customer_id: params.customer_id.clone(),
            payment_method_id: params.payment_method_id.clone(),
            metadata: params.metadata.clone(),
            created_at: created_timestamp(Some(1_700_000_000)),
        })
    }

    async fn retrieve_payment_intent(
        &self,
        credentials: &Credentials,
        payment_intent_id: &str,
    ) -> RemoteResult<PaymentIntent> {
        self.record("retrieve_payment_intent", credentials).await?;
        Ok(PaymentIntent {
            id: payment_intent_id.to_string(),
            amount: 100,
            currency: "usd".to_string(),
            status: "succeeded".to_string(),
            client_secret: None,
            customer_id: None,
            payment_method_id: None,
            metadata: Metadata::new(),
            created_at: created_timestamp(Some(1_700_000_000)),
        })
    }

    async fn create_subscription(
        &self,
        credentials: &Credentials,
        customer_id: &str,
        _price_id: &str,
    ) -> RemoteResult<Subscription> {
        self.record("create_subscription", credentials).await?;
        Ok(subscription("sub_mock", customer_id, false))
    }

    async fn list_subscriptions(
        &self,
        credentials: &Credentials,
        customer_id: &str,
    ) -> RemoteResult<Vec<Subscription>> {
        self.record("list_subscriptions", credentials).await?;
        Ok(vec![subscription("sub_mock", customer_id, false)])
    }

    async fn update_subscription(
        &self,
        credentials: &Credentials,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> RemoteResult<Subscription> {
        self.record("update_subscription", credentials).await?;
        Ok(subscription(
            subscription_id,
            "cus_mock",
            update.cancel_at_period_end,
        ))
    }

    async fn cancel_subscription(
        &self,
        credentials: &Credentials,
        subscription_id: &str,
        at_period_end: bool,
    ) -> RemoteResult<Subscription> {
        self.record("cancel_subscription", credentials).await?;
        Ok(subscription(subscription_id, "cus_mock", at_period_end))
    }
}

#[derive(Deserialize)]
struct MockEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: MockData,
}

#[derive(Deserialize)]
struct MockData {
    object: serde_json::Value,
}

pub struct MockSchema;

impl WireSchema for MockSchema {
    type SetupIntent = MockSetupIntent;
    type PaymentIntent = MockPaymentIntent;
    type Subscription = MockSubscription;
    type Invoice = MockInvoice;
    type Refund = MockRefund;
    type Charge = MockRefund;
}

#[derive(Deserialize)]
pub struct MockSetupIntent {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl WireObject for MockSetupIntent {
    type Payload = SetupIntentEvent;

    fn into_parts(self) -> (Metadata, SetupIntentEvent) {
        (
            sorted_metadata(self.metadata),
            SetupIntentEvent {
                setup_intent_id: self.id,
                payment_method_id: None,
                card: None,
            },
        )
    }
}

#[derive(Deserialize)]
pub struct MockPaymentIntent {
    id: String,
    amount: i64,
    #[serde(default)]
    amount_capturable: i64,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    last_payment_error: Option<MockPaymentError>,
}

#[derive(Deserialize)]
struct MockPaymentError {
    code: Option<String>,
    message: Option<String>,
}

impl WireObject for MockPaymentIntent {
    type Payload = PaymentIntentEvent;

    fn into_parts(self) -> (Metadata, PaymentIntentEvent) {
        (
            sorted_metadata(self.metadata),
            PaymentIntentEvent {
                payment_intent_id: self.id,
                amount: self.amount,
                amount_capturable: self.amount_capturable,
                status: self.status,
                payment_method_id: None,
                pre_allocated: None,
                validate_only: None,
                last_payment_error: self.last_payment_error.map(|e| LastPaymentError {
                    code: e.code,
                    message: e.message,
                    ..Default::default()
                }),
            },
        )
    }
}

#[derive(Deserialize)]
pub struct MockSubscription {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl WireObject for MockSubscription {
    type Payload = Subscription;

    fn into_parts(self) -> (Metadata, Subscription) {
        let metadata = sorted_metadata(self.metadata);
        let mut subscription = subscription(&self.id, &self.customer, false);
        subscription.status = self.status;
        subscription.metadata = metadata.clone();
        (metadata, subscription)
    }
}

#[derive(Deserialize)]
pub struct MockInvoice {
    id: String,
    lines: Vec<MockInvoiceLine>,
}

#[derive(Deserialize)]
struct MockInvoiceLine {
    id: String,
    amount: i64,
}

impl WireObject for MockInvoice {
    type Payload = Invoice;

    fn into_parts(self) -> (Metadata, Invoice) {
        (
            Metadata::new(),
            Invoice {
                id: self.id,
                customer_id: None,
                amount_due: self.lines.iter().map(|line| line.amount).sum(),
                status: None,
                created_at: created_timestamp(None),
                lines: self
                    .lines
                    .into_iter()
                    .map(|line| InvoiceLine {
                        id: line.id,
                        amount: line.amount,
                        currency: "usd".to_string(),
                        description: None,
                        subscription_id: None,
                    })
                    .collect(),
            },
        )
    }
}

#[derive(Deserialize)]
pub struct MockRefund {
    id: String,
    amount: i64,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl WireObject for MockRefund {
    type Payload = Refund;

    fn into_parts(self) -> (Metadata, Refund) {
        let metadata = sorted_metadata(self.metadata);
        (
            metadata.clone(),
            Refund {
                id: self.id,
                amount: self.amount,
                reason: None,
                status: None,
                charge_id: None,
                currency: "usd".to_string(),
                created_at: created_timestamp(None),
                metadata,
            },
        )
    }
}
