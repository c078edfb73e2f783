use std::future::Future;

use async_trait::async_trait;
use multistripe_types::{
    CallbackEvent, Customer, CustomerParams, PaymentIntent, PaymentIntentParams, PaymentMethod,
    Subscription, SubscriptionUpdate,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    binding::{Credentials, RemoteResult, VendorBinding},
    context::CallContext,
    error::{Result, StripeError},
    normalizer::{WebhookStage, verify_and_normalize},
    queue::{CallbackQueue, CallbackStream, DEFAULT_QUEUE_CAPACITY},
};

/// Capability set every versioned adapter provides
///
/// Vendor side effects are not idempotent: a retried create may produce a
/// duplicate remote resource.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry key of this adapter (e.g., "v74")
    fn version(&self) -> &str;

    /// Set both secrets at once
    fn configure(&self, credentials: Credentials);

    fn set_secret_key(&self, secret_key: &str);

    fn set_webhook_secret(&self, webhook_secret: &str);

    async fn create_customer(&self, ctx: &CallContext, params: &CustomerParams)
    -> Result<Customer>;

    async fn update_customer(
        &self,
        ctx: &CallContext,
        customer_id: &str,
        params: &CustomerParams,
    ) -> Result<Customer>;

    async fn list_payment_methods(
        &self,
        ctx: &CallContext,
        customer_id: &str,
    ) -> Result<Vec<PaymentMethod>>;

    async fn attach_payment_method(
        &self,
        ctx: &CallContext,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<PaymentMethod>;

    async fn detach_payment_method(&self, ctx: &CallContext, payment_method_id: &str)
    -> Result<()>;

    async fn create_payment_intent(
        &self,
        ctx: &CallContext,
        params: &PaymentIntentParams,
    ) -> Result<PaymentIntent>;

    async fn retrieve_payment_intent(
        &self,
        ctx: &CallContext,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent>;

    async fn create_subscription(
        &self,
        ctx: &CallContext,
        customer_id: &str,
        price_id: &str,
    ) -> Result<Subscription>;

    async fn list_subscriptions(
        &self,
        ctx: &CallContext,
        customer_id: &str,
    ) -> Result<Vec<Subscription>>;

    async fn update_subscription(
        &self,
        ctx: &CallContext,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription>;

    async fn cancel_subscription(
        &self,
        ctx: &CallContext,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription>;

    /// Verify and normalize one webhook delivery, returning the event
    async fn handle_webhook(
        &self,
        ctx: &CallContext,
        payload: &[u8],
        signature: &str,
    ) -> Result<CallbackEvent>;

    /// Verify and normalize one webhook delivery onto the callback queue
    ///
    /// Waits while the queue is full. Nothing is enqueued when the delivery
    /// is rejected.
    async fn publish_webhook(&self, ctx: &CallContext, payload: &[u8], signature: &str)
    -> Result<()>;

    /// Consumer handle of this adapter's callback queue
    fn callbacks(&self) -> CallbackStream;

    /// Number of events waiting on the callback queue
    fn queued_callbacks(&self) -> usize;
}

/// [`Adapter`] implemented once on top of any vendor binding
pub struct StripeAdapter<B: VendorBinding> {
    binding: B,
    secret_key: RwLock<Option<String>>,
    webhook_secret: RwLock<Option<String>>,
    queue: CallbackQueue,
}

impl<B: VendorBinding> StripeAdapter<B> {
    pub fn new(binding: B) -> Self {
        Self::with_queue_capacity(binding, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(binding: B, capacity: usize) -> Self {
        Self {
            binding,
            secret_key: RwLock::new(None),
            webhook_secret: RwLock::new(None),
            queue: CallbackQueue::new(capacity),
        }
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        self.configure(credentials);
        self
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    fn api_credentials(&self) -> Result<Credentials> {
        let secret_key = self
            .secret_key
            .read()
            .clone()
            .ok_or_else(|| StripeError::NotConfigured(self.binding.version().to_string()))?;
        let webhook_secret = self.webhook_secret.read().clone().unwrap_or_default();
        Ok(Credentials {
            secret_key,
            webhook_secret,
        })
    }

    fn webhook_secret(&self) -> Result<String> {
        self.webhook_secret
            .read()
            .clone()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| {
                StripeError::AuthenticationFailure("no webhook secret configured".to_string())
            })
    }

    async fn remote<T, F>(&self, ctx: &CallContext, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        let version = self.binding.version();
        debug!(version, operation, "Calling vendor API");
        ctx.run(async { call.await.map_err(StripeError::from) })
            .await
            .inspect_err(|e| warn!(version, operation, error = %e, "Vendor API call failed"))
    }

    fn normalize(&self, payload: &[u8], signature: &str) -> Result<CallbackEvent> {
        let secret = self.webhook_secret()?;
        verify_and_normalize(&self.binding, payload, signature, &secret)
    }
}

#[async_trait]
impl<B: VendorBinding> Adapter for StripeAdapter<B> {
    fn version(&self) -> &str {
        self.binding.version()
    }

    fn configure(&self, credentials: Credentials) {
        self.set_secret_key(&credentials.secret_key);
        self.set_webhook_secret(&credentials.webhook_secret);
    }

    fn set_secret_key(&self, secret_key: &str) {
        *self.secret_key.write() = Some(secret_key.to_string());
        info!(version = self.binding.version(), "Secret key configured");
    }

    fn set_webhook_secret(&self, webhook_secret: &str) {
        *self.webhook_secret.write() = Some(webhook_secret.to_string());
        info!(version = self.binding.version(), "Webhook secret configured");
    }

    async fn create_customer(
        &self,
        ctx: &CallContext,
        params: &CustomerParams,
    ) -> Result<Customer> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "create_customer",
            self.binding.create_customer(&credentials, params),
        )
        .await
    }

    async fn update_customer(
        &self,
        ctx: &CallContext,
        customer_id: &str,
        params: &CustomerParams,
    ) -> Result<Customer> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "update_customer",
            self.binding
                .update_customer(&credentials, customer_id, params),
        )
        .await
    }

    async fn list_payment_methods(
        &self,
        ctx: &CallContext,
        customer_id: &str,
    ) -> Result<Vec<PaymentMethod>> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "list_payment_methods",
            self.binding.list_payment_methods(&credentials, customer_id),
        )
        .await
    }

    async fn attach_payment_method(
        &self,
        ctx: &CallContext,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<PaymentMethod> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "attach_payment_method",
            self.binding
                .attach_payment_method(&credentials, customer_id, payment_method_id),
        )
        .await
    }

    async fn detach_payment_method(
        &self,
        ctx: &CallContext,
        payment_method_id: &str,
    ) -> Result<()> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "detach_payment_method",
            self.binding
                .detach_payment_method(&credentials, payment_method_id),
        )
        .await
    }

    async fn create_payment_intent(
        &self,
        ctx: &CallContext,
        params: &PaymentIntentParams,
    ) -> Result<PaymentIntent> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "create_payment_intent",
            self.binding.create_payment_intent(&credentials, params),
        )
        .await
    }

    async fn retrieve_payment_intent(
        &self,
        ctx: &CallContext,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "retrieve_payment_intent",
            self.binding
                .retrieve_payment_intent(&credentials, payment_intent_id),
        )
        .await
    }

    async fn create_subscription(
        &self,
        ctx: &CallContext,
        customer_id: &str,
        price_id: &str,
    ) -> Result<Subscription> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "create_subscription",
            self.binding
                .create_subscription(&credentials, customer_id, price_id),
        )
        .await
    }

    async fn list_subscriptions(
        &self,
        ctx: &CallContext,
        customer_id: &str,
    ) -> Result<Vec<Subscription>> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "list_subscriptions",
            self.binding.list_subscriptions(&credentials, customer_id),
        )
        .await
    }

    async fn update_subscription(
        &self,
        ctx: &CallContext,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "update_subscription",
            self.binding
                .update_subscription(&credentials, subscription_id, update),
        )
        .await
    }

    async fn cancel_subscription(
        &self,
        ctx: &CallContext,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<Subscription> {
        let credentials = self.api_credentials()?;
        self.remote(
            ctx,
            "cancel_subscription",
            self.binding
                .cancel_subscription(&credentials, subscription_id, at_period_end),
        )
        .await
    }

    async fn handle_webhook(
        &self,
        ctx: &CallContext,
        payload: &[u8],
        signature: &str,
    ) -> Result<CallbackEvent> {
        ctx.run(async { self.normalize(payload, signature) }).await
    }

    async fn publish_webhook(
        &self,
        ctx: &CallContext,
        payload: &[u8],
        signature: &str,
    ) -> Result<()> {
        let event = self.normalize(payload, signature)?;
        let event_type = event.event_type();
        ctx.run(self.queue.publish(event)).await?;
        debug!(
            version = self.binding.version(),
            event_type = %event_type,
            stage = %WebhookStage::Delivered,
            queued = self.queue.len(),
            "Callback event queued"
        );
        Ok(())
    }

    fn callbacks(&self) -> CallbackStream {
        self.queue.stream()
    }

    fn queued_callbacks(&self) -> usize {
        self.queue.len()
    }
}
