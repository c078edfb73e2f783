//! Bindings over the `async-stripe` SDK
//!
//! Each supported release links its own SDK version, so the binding is written
//! once as [`sdk_binding!`] and expanded over either crate. Everything that does
//! not name an SDK type lives here as plain functions.

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, Utc};
use multistripe_core::{RemoteError, RemoteResult, Result, StripeError, VerifiedEvent};
use multistripe_types::{Metadata, created_timestamp, optional_timestamp, sorted_metadata};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

/// SDK object decoded from a webhook's `data.object`
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Wire<T>(pub T);

/// SDK client reused for as long as the secret key stays the same
pub struct ClientCache<C> {
    slot: Mutex<Option<(String, C)>>,
}

impl<C> Default for ClientCache<C> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<C: Clone> ClientCache<C> {
    pub fn get_or_connect(&self, secret_key: &str, connect: impl FnOnce() -> C) -> C {
        let mut slot = self.slot.lock();
        if let Some((key, client)) = slot.as_ref() {
            if key == secret_key {
                return client.clone();
            }
        }
        let client = connect();
        *slot = Some((secret_key.to_string(), client.clone()));
        client
    }
}

/// A value as it is spelled on the wire, for SDK enums and ids alike
pub fn wire_name<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        Value::String(name) => Some(name),
        _ => None,
    }
}

/// Id of a field holding either an id or its expanded object
pub fn expanded_id<T: Serialize>(field: &T) -> Option<String> {
    match serde_json::to_value(field).ok()? {
        Value::String(id) => Some(id),
        Value::Object(object) => object.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

pub fn metadata(metadata: impl Into<Option<HashMap<String, String>>>) -> Metadata {
    sorted_metadata(metadata.into().unwrap_or_default())
}

/// Metadata form fields, left out entirely when there are none
pub fn request_metadata(metadata: &Metadata) -> Option<HashMap<String, String>> {
    if metadata.is_empty() {
        return None;
    }
    Some(
        metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

pub fn timestamp(secs: impl Into<Option<i64>>) -> DateTime<Utc> {
    created_timestamp(secs.into())
}

pub fn optional(secs: impl Into<Option<i64>>) -> Option<DateTime<Utc>> {
    optional_timestamp(secs.into())
}

pub fn invalid_request(param: &str, message: String) -> RemoteError {
    RemoteError {
        error_type: Some("invalid_request_error".to_string()),
        param: Some(param.to_string()),
        message,
        ..Default::default()
    }
}

/// Parse a caller-supplied object id before it is placed in a request path
///
/// Stripe ids are a type prefix and an alphanumeric tail; anything else would
/// be spliced into the URL as extra path segments or a query string.
pub fn checked_id<T: FromStr>(param: &str, raw: &str) -> RemoteResult<T> {
    let well_formed = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(invalid_request(param, format!("Invalid {param} id: {raw:?}")));
    }
    raw.parse()
        .map_err(|_| invalid_request(param, format!("Invalid {param} id: {raw:?}")))
}

/// Decode an SDK enum from its wire spelling
pub fn wire_value<T: DeserializeOwned>(param: &str, raw: &str) -> RemoteResult<T> {
    serde_json::from_value(Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| invalid_request(param, format!("Invalid {param}: {raw:?}")))
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    api_version: Option<String>,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    livemode: bool,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: Value,
}

/// Release a binding accepts webhook events for
#[derive(Debug, Clone, Copy)]
pub struct Pin {
    pub key: &'static str,
    pub api_version: &'static str,
    pub ignore_mismatch: bool,
}

/// Read the envelope of an authenticated webhook body
///
/// The raw kind and object are kept as sent, so event kinds and API versions
/// newer than the linked SDK still reach the normalizer.
pub fn read_event(body: &str, pin: Pin) -> Result<VerifiedEvent> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|source| StripeError::DecodeFailure {
            event_type: "event".to_string(),
            source,
        })?;
    check_api_version(&envelope, pin)?;

    Ok(VerifiedEvent {
        id: envelope.id,
        event_type: envelope.event_type,
        api_version: envelope.api_version,
        created: envelope.created,
        livemode: envelope.livemode,
        object: envelope.data.object,
    })
}

fn check_api_version(envelope: &Envelope, pin: Pin) -> Result<()> {
    let Some(api_version) = envelope.api_version.as_deref() else {
        return Ok(());
    };
    if api_version == pin.api_version {
        return Ok(());
    }
    if pin.ignore_mismatch {
        debug!(
            version = pin.key,
            event_id = %envelope.id,
            api_version,
            "Accepting event rendered with another API version"
        );
        return Ok(());
    }
    warn!(
        version = pin.key,
        event_id = %envelope.id,
        api_version,
        expected = pin.api_version,
        "Rejecting event rendered with another API version"
    );
    Err(StripeError::AuthenticationFailure(format!(
        "event api_version {} does not match {}",
        api_version, pin.api_version
    )))
}

/// Expand a [`VendorBinding`](multistripe_core::VendorBinding) over one linked
/// SDK crate
///
/// Webhook signatures are checked by the SDK's `Webhook::construct_event`,
/// which accepts timestamps up to 300 seconds either side of the local clock.
/// The window is fixed by the SDK and deliberately symmetric: a sender whose
/// clock runs ahead is tolerated the same way as a delayed delivery.
macro_rules! sdk_binding {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
        sdk = $sdk:ident;
        key = $key:literal;
        api_version = $api_version:literal;
        payment_method_type = $payment_method_type:expr;
    ) => {
        use async_trait::async_trait;
        use multistripe_core::{
            Credentials, RemoteError, RemoteResult, Result, StripeError, VendorBinding,
            VerifiedEvent, WireObject, WireSchema,
        };
        use multistripe_types::{
            Customer, CustomerParams, Invoice, InvoiceLine, LastPaymentError, Metadata,
            PaymentIntent, PaymentIntentEvent, PaymentIntentParams, PaymentMethod, Refund,
            SetupIntentEvent, Subscription, SubscriptionUpdate,
        };
        use tracing::debug;

        use $crate::{
            BindingOptions,
            binding::{
                ClientCache, Pin, Wire, checked_id, expanded_id, metadata, optional, read_event,
                request_metadata, timestamp, wire_name, wire_value,
            },
            release::ApiRelease,
        };

        $(#[$meta])*
        pub struct $name {
            api_base: String,
            ignore_api_version_mismatch: bool,
            clients: ClientCache<$sdk::Client>,
        }

        impl $name {
            /// Payment method type the list endpoint is filtered by
            const PAYMENT_METHOD_TYPE: Option<$sdk::PaymentMethodTypeFilter> =
                $payment_method_type;

            /// Binding against the API served at `api_base`
            pub fn new(api_base: impl Into<String>) -> Self {
                Self {
                    api_base: api_base.into(),
                    ignore_api_version_mismatch: false,
                    clients: ClientCache::default(),
                }
            }

            /// Accept webhooks rendered with another API version
            pub fn ignore_api_version_mismatch(mut self, ignore: bool) -> Self {
                self.ignore_api_version_mismatch = ignore;
                self
            }

            pub fn api_base(&self) -> &str {
                &self.api_base
            }

            fn client(&self, credentials: &Credentials) -> $sdk::Client {
                self.clients.get_or_connect(&credentials.secret_key, || {
                    $sdk::Client::from_url(self.api_base.as_str(), credentials.secret_key.as_str())
                })
            }

            fn pin(&self) -> Pin {
                Pin {
                    key: $key,
                    api_version: $api_version,
                    ignore_mismatch: self.ignore_api_version_mismatch,
                }
            }
        }

        impl ApiRelease for $name {
            const KEY: &'static str = $key;
            const API_VERSION: &'static str = $api_version;

            fn from_options(options: &BindingOptions) -> Self {
                Self::new(options.api_base.clone())
                    .ignore_api_version_mismatch(options.ignore_api_version_mismatch)
            }
        }

        fn remote_error(error: $sdk::StripeError) -> RemoteError {
            match error {
                $sdk::StripeError::Stripe(request) => RemoteError {
                    status: Some(request.http_status),
                    error_type: Some(request.error_type.to_string()),
                    code: request.code.map(|code| code.to_string()),
                    decline_code: request.decline_code,
                    param: None,
                    message: request.message.unwrap_or_default(),
                },
                other => RemoteError::transport(other.to_string()),
            }
        }

        fn postal_address(params: &CustomerParams) -> Option<$sdk::Address> {
            params.postcode.as_ref().map(|postcode| $sdk::Address {
                postal_code: Some(postcode.clone()),
                ..Default::default()
            })
        }

        fn create_customer_params(params: &CustomerParams) -> $sdk::CreateCustomer<'_> {
            let mut create = $sdk::CreateCustomer::new();
            create.name = params.name.as_deref();
            create.email = params.email.as_deref();
            create.phone = params.phone.as_deref();
            create.address = postal_address(params);
            create.metadata = request_metadata(&params.metadata);
            create
        }

        fn update_customer_params(params: &CustomerParams) -> $sdk::UpdateCustomer<'_> {
            let mut update = $sdk::UpdateCustomer::new();
            update.name = params.name.as_deref();
            update.email = params.email.as_deref();
            update.phone = params.phone.as_deref();
            update.address = postal_address(params);
            update.metadata = request_metadata(&params.metadata);
            update
        }

        fn customer_from(customer: $sdk::Customer) -> Customer {
            Customer {
                id: customer.id.to_string(),
                postcode: customer.address.and_then(|address| address.postal_code),
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
                metadata: metadata(customer.metadata),
                created_at: timestamp(customer.created),
            }
        }

        fn payment_method_from(method: $sdk::PaymentMethod, default_id: Option<&str>) -> PaymentMethod {
            let id = method.id.to_string();
            PaymentMethod {
                is_default: default_id == Some(id.as_str()),
                customer_id: expanded_id(&method.customer),
                payment_type: wire_name(&method.type_).unwrap_or_default(),
                card: method.card.map(|card| multistripe_types::CardDetails {
                    brand: wire_name(&card.brand).unwrap_or_default(),
                    last4: card.last4,
                    exp_month: card.exp_month as u32,
                    exp_year: card.exp_year as u32,
                }),
                metadata: metadata(method.metadata),
                created_at: timestamp(method.created),
                id,
            }
        }

        fn payment_intent_from(intent: $sdk::PaymentIntent) -> PaymentIntent {
            PaymentIntent {
                id: intent.id.to_string(),
                amount: intent.amount,
                currency: wire_name(&intent.currency).unwrap_or_default(),
                status: wire_name(&intent.status).unwrap_or_default(),
                customer_id: expanded_id(&intent.customer),
                payment_method_id: expanded_id(&intent.payment_method),
                client_secret: intent.client_secret,
                metadata: metadata(intent.metadata),
                created_at: timestamp(intent.created),
            }
        }

        fn subscription_from(subscription: $sdk::Subscription) -> Subscription {
            let first_item = subscription.items.data.first();
            Subscription {
                id: subscription.id.to_string(),
                customer_id: expanded_id(&subscription.customer).unwrap_or_default(),
                status: wire_name(&subscription.status).unwrap_or_default(),
                price_id: first_item.and_then(|item| expanded_id(&item.price)),
                current_period_end: optional(subscription.current_period_end),
                cancel_at_period_end: subscription.cancel_at_period_end,
                canceled_at: optional(subscription.canceled_at),
                metadata: metadata(subscription.metadata),
                created_at: timestamp(subscription.created),
            }
        }

        /// Webhook objects decoded with this release's SDK types
        pub struct Schema;

        impl WireSchema for Schema {
            type SetupIntent = Wire<$sdk::SetupIntent>;
            type PaymentIntent = Wire<$sdk::PaymentIntent>;
            type Subscription = Wire<$sdk::Subscription>;
            type Invoice = Wire<$sdk::Invoice>;
            type Refund = Wire<$sdk::Refund>;
            type Charge = Wire<$sdk::Charge>;
        }

        impl WireObject for Wire<$sdk::SetupIntent> {
            type Payload = SetupIntentEvent;

            fn into_parts(self) -> (Metadata, SetupIntentEvent) {
                let intent = self.0;
                let payment_method_id = expanded_id(&intent.payment_method);
                // Card details only come with an expanded payment method
                let card = match Option::<$sdk::Expandable<$sdk::PaymentMethod>>::from(
                    intent.payment_method,
                ) {
                    Some($sdk::Expandable::Object(method)) => payment_method_from(*method, None).card,
                    _ => None,
                };
                (
                    metadata(intent.metadata),
                    SetupIntentEvent {
                        setup_intent_id: intent.id.to_string(),
                        payment_method_id,
                        card,
                    },
                )
            }
        }

        impl WireObject for Wire<$sdk::PaymentIntent> {
            type Payload = PaymentIntentEvent;

            fn into_parts(self) -> (Metadata, PaymentIntentEvent) {
                let intent = self.0;
                let last_payment_error =
                    intent.last_payment_error.as_ref().map(|error| LastPaymentError {
                        code: wire_name(&error.code),
                        message: wire_name(&error.message),
                        decline_code: wire_name(&error.decline_code),
                        payment_method_id: expanded_id(&error.payment_method),
                        charge_id: wire_name(&error.charge),
                    });
                (
                    metadata(intent.metadata),
                    PaymentIntentEvent {
                        payment_intent_id: intent.id.to_string(),
                        amount: intent.amount,
                        amount_capturable: Option::<i64>::from(intent.amount_capturable)
                            .unwrap_or_default(),
                        status: wire_name(&intent.status).unwrap_or_default(),
                        payment_method_id: expanded_id(&intent.payment_method),
                        pre_allocated: None,
                        validate_only: None,
                        last_payment_error,
                    },
                )
            }
        }

        impl WireObject for Wire<$sdk::Subscription> {
            type Payload = Subscription;

            fn into_parts(self) -> (Metadata, Subscription) {
                let subscription = subscription_from(self.0);
                (subscription.metadata.clone(), subscription)
            }
        }

        impl WireObject for Wire<$sdk::Invoice> {
            type Payload = Invoice;

            fn into_parts(self) -> (Metadata, Invoice) {
                let invoice = self.0;
                let lines = Option::<$sdk::List<$sdk::InvoiceLineItem>>::from(invoice.lines)
                    .map(|lines| lines.data)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|line| InvoiceLine {
                        id: line.id.to_string(),
                        amount: Option::<i64>::from(line.amount).unwrap_or_default(),
                        currency: wire_name(&line.currency).unwrap_or_default(),
                        description: wire_name(&line.description),
                        subscription_id: expanded_id(&line.subscription),
                    })
                    .collect();
                (
                    metadata(invoice.metadata),
                    Invoice {
                        id: invoice.id.to_string(),
                        customer_id: expanded_id(&invoice.customer),
                        amount_due: Option::<i64>::from(invoice.amount_due).unwrap_or_default(),
                        status: wire_name(&invoice.status),
                        created_at: timestamp(invoice.created),
                        lines,
                    },
                )
            }
        }

        impl WireObject for Wire<$sdk::Refund> {
            type Payload = Refund;

            fn into_parts(self) -> (Metadata, Refund) {
                let refund = self.0;
                let metadata = metadata(refund.metadata);
                (
                    metadata.clone(),
                    Refund {
                        id: refund.id.to_string(),
                        amount: refund.amount,
                        reason: wire_name(&refund.reason),
                        status: wire_name(&refund.status),
                        charge_id: expanded_id(&refund.charge),
                        currency: wire_name(&refund.currency).unwrap_or_default(),
                        created_at: timestamp(refund.created),
                        metadata,
                    },
                )
            }
        }

        impl WireObject for Wire<$sdk::Charge> {
            type Payload = Refund;

            /// Projects the latest refund of the charge, keeping the charge's total refunded amount
            fn into_parts(self) -> (Metadata, Refund) {
                let charge = self.0;
                let metadata = metadata(charge.metadata);
                // Refunds are only included when the event was rendered with them expanded
                let latest = Option::<$sdk::List<$sdk::Refund>>::from(charge.refunds)
                    .and_then(|refunds| refunds.data.into_iter().next());
                let (id, reason, status) = match latest {
                    Some(refund) => (
                        refund.id.to_string(),
                        wire_name(&refund.reason),
                        wire_name(&refund.status),
                    ),
                    None => (String::new(), None, None),
                };
                (
                    metadata.clone(),
                    Refund {
                        id,
                        amount: Option::<i64>::from(charge.amount_refunded).unwrap_or_default(),
                        reason,
                        status,
                        charge_id: Some(charge.id.to_string()),
                        currency: wire_name(&charge.currency).unwrap_or_default(),
                        created_at: timestamp(charge.created),
                        metadata,
                    },
                )
            }
        }

        #[async_trait]
        impl VendorBinding for $name {
            type Schema = Schema;

            fn version(&self) -> &str {
                $key
            }

            fn verify_webhook(
                &self,
                payload: &[u8],
                signature_header: &str,
                secret: &str,
            ) -> Result<VerifiedEvent> {
                let body = std::str::from_utf8(payload).map_err(|e| {
                    StripeError::AuthenticationFailure(format!("webhook body is not UTF-8: {e}"))
                })?;
                match $sdk::Webhook::construct_event(body, signature_header, secret) {
                    Ok(_) => {}
                    // Parsing runs only after the signature and timestamp checked out
                    Err($sdk::WebhookError::BadParse(error)) => {
                        debug!(version = $key, error = %error, "Event shape unknown to the SDK");
                    }
                    Err(error) => return Err(StripeError::AuthenticationFailure(error.to_string())),
                }
                read_event(body, self.pin())
            }

            async fn create_customer(
                &self,
                credentials: &Credentials,
                params: &CustomerParams,
            ) -> RemoteResult<Customer> {
                let client = self.client(credentials);
                let customer = $sdk::Customer::create(&client, create_customer_params(params))
                    .await
                    .map_err(remote_error)?;
                Ok(customer_from(customer))
            }

            async fn update_customer(
                &self,
                credentials: &Credentials,
                customer_id: &str,
                params: &CustomerParams,
            ) -> RemoteResult<Customer> {
                let customer_id: $sdk::CustomerId = checked_id("customer", customer_id)?;
                let client = self.client(credentials);
                let customer =
                    $sdk::Customer::update(&client, &customer_id, update_customer_params(params))
                        .await
                        .map_err(remote_error)?;
                Ok(customer_from(customer))
            }

            async fn list_payment_methods(
                &self,
                credentials: &Credentials,
                customer_id: &str,
            ) -> RemoteResult<Vec<PaymentMethod>> {
                let customer_id: $sdk::CustomerId = checked_id("customer", customer_id)?;
                let client = self.client(credentials);
                let customer = $sdk::Customer::retrieve(&client, &customer_id, &[])
                    .await
                    .map_err(remote_error)?;
                let default_id = customer
                    .invoice_settings
                    .and_then(|settings| expanded_id(&settings.default_payment_method));

                let mut methods = Vec::new();
                let mut starting_after: Option<$sdk::PaymentMethodId> = None;
                loop {
                    let mut params = $sdk::ListPaymentMethods::new();
                    params.customer = Some(customer_id.clone());
                    params.type_ = Self::PAYMENT_METHOD_TYPE;
                    params.limit = Some(100);

                    if let Some(ref last_id) = starting_after {
                        params.starting_after = Some(last_id.clone());
                    }

                    let page = $sdk::PaymentMethod::list(&client, &params)
                        .await
                        .map_err(remote_error)?;
                    let has_more = page.has_more;

                    if let Some(last_method) = page.data.last() {
                        starting_after = Some(last_method.id.clone());
                    }

                    methods.extend(
                        page.data
                            .into_iter()
                            .map(|method| payment_method_from(method, default_id.as_deref())),
                    );

                    if !has_more {
                        break;
                    }
                }
                debug!(version = $key, count = methods.len(), "Listed payment methods");
                Ok(methods)
            }

            async fn attach_payment_method(
                &self,
                credentials: &Credentials,
                customer_id: &str,
                payment_method_id: &str,
            ) -> RemoteResult<PaymentMethod> {
                let customer: $sdk::CustomerId = checked_id("customer", customer_id)?;
                let payment_method_id: $sdk::PaymentMethodId =
                    checked_id("payment_method", payment_method_id)?;
                let client = self.client(credentials);
                let method = $sdk::PaymentMethod::attach(
                    &client,
                    &payment_method_id,
                    $sdk::AttachPaymentMethod { customer },
                )
                .await
                .map_err(remote_error)?;
                Ok(payment_method_from(method, None))
            }

            async fn detach_payment_method(
                &self,
                credentials: &Credentials,
                payment_method_id: &str,
            ) -> RemoteResult<()> {
                let payment_method_id: $sdk::PaymentMethodId =
                    checked_id("payment_method", payment_method_id)?;
                let client = self.client(credentials);
                $sdk::PaymentMethod::detach(&client, &payment_method_id)
                    .await
                    .map_err(remote_error)?;
                Ok(())
            }

            async fn create_payment_intent(
                &self,
                credentials: &Credentials,
                params: &PaymentIntentParams,
            ) -> RemoteResult<PaymentIntent> {
                let currency: $sdk::Currency = wire_value("currency", &params.currency)?;
                let mut create = $sdk::CreatePaymentIntent::new(params.amount, currency);
                create.customer = params
                    .customer_id
                    .as_deref()
                    .map(|id| checked_id::<$sdk::CustomerId>("customer", id))
                    .transpose()?;
                create.payment_method = params
                    .payment_method_id
                    .as_deref()
                    .map(|id| checked_id::<$sdk::PaymentMethodId>("payment_method", id))
                    .transpose()?;
                create.confirm = Some(params.confirm);
                create.metadata = request_metadata(&params.metadata);

                let client = self.client(credentials);
                let intent = $sdk::PaymentIntent::create(&client, create)
                    .await
                    .map_err(remote_error)?;
                Ok(payment_intent_from(intent))
            }

            async fn retrieve_payment_intent(
                &self,
                credentials: &Credentials,
                payment_intent_id: &str,
            ) -> RemoteResult<PaymentIntent> {
                let payment_intent_id: $sdk::PaymentIntentId =
                    checked_id("payment_intent", payment_intent_id)?;
                let client = self.client(credentials);
                let intent = $sdk::PaymentIntent::retrieve(&client, &payment_intent_id, &[])
                    .await
                    .map_err(remote_error)?;
                Ok(payment_intent_from(intent))
            }

            async fn create_subscription(
                &self,
                credentials: &Credentials,
                customer_id: &str,
                price_id: &str,
            ) -> RemoteResult<Subscription> {
                let mut create = $sdk::CreateSubscription::new(checked_id("customer", customer_id)?);
                create.items = Some(vec![$sdk::CreateSubscriptionItems {
                    price: Some(price_id.to_string()),
                    ..Default::default()
                }]);

                let client = self.client(credentials);
                let subscription = $sdk::Subscription::create(&client, create)
                    .await
                    .map_err(remote_error)?;
                Ok(subscription_from(subscription))
            }

            async fn list_subscriptions(
                &self,
                credentials: &Credentials,
                customer_id: &str,
            ) -> RemoteResult<Vec<Subscription>> {
                let customer_id: $sdk::CustomerId = checked_id("customer", customer_id)?;
                let client = self.client(credentials);

                let mut subscriptions = Vec::new();
                let mut starting_after: Option<$sdk::SubscriptionId> = None;
                loop {
                    let mut params = $sdk::ListSubscriptions::new();
                    params.customer = Some(customer_id.clone());
                    params.limit = Some(100);

                    if let Some(ref last_id) = starting_after {
                        params.starting_after = Some(last_id.clone());
                    }

                    let page = $sdk::Subscription::list(&client, &params)
                        .await
                        .map_err(remote_error)?;
                    let has_more = page.has_more;

                    if let Some(last_subscription) = page.data.last() {
                        starting_after = Some(last_subscription.id.clone());
                    }

                    subscriptions.extend(page.data.into_iter().map(subscription_from));

                    if !has_more {
                        break;
                    }
                }
                Ok(subscriptions)
            }

            async fn update_subscription(
                &self,
                credentials: &Credentials,
                subscription_id: &str,
                update: &SubscriptionUpdate,
            ) -> RemoteResult<Subscription> {
                let subscription_id: $sdk::SubscriptionId =
                    checked_id("subscription", subscription_id)?;
                let client = self.client(credentials);

                let mut params = $sdk::UpdateSubscription::new();
                params.cancel_at_period_end = Some(update.cancel_at_period_end);

                if let Some(price_id) = update.new_price_id.as_deref() {
                    // Replace the priced item instead of adding a second one
                    let current = $sdk::Subscription::retrieve(&client, &subscription_id, &[])
                        .await
                        .map_err(remote_error)?;
                    params.items = Some(vec![$sdk::UpdateSubscriptionItems {
                        id: current.items.data.first().map(|item| item.id.to_string()),
                        price: Some(price_id.to_string()),
                        ..Default::default()
                    }]);
                }

                let subscription = $sdk::Subscription::update(&client, &subscription_id, params)
                    .await
                    .map_err(remote_error)?;
                Ok(subscription_from(subscription))
            }

            async fn cancel_subscription(
                &self,
                credentials: &Credentials,
                subscription_id: &str,
                at_period_end: bool,
            ) -> RemoteResult<Subscription> {
                let subscription_id: $sdk::SubscriptionId =
                    checked_id("subscription", subscription_id)?;
                let client = self.client(credentials);

                let subscription = if at_period_end {
                    let mut params = $sdk::UpdateSubscription::new();
                    params.cancel_at_period_end = Some(true);
                    $sdk::Subscription::update(&client, &subscription_id, params).await
                } else {
                    let mut params = $sdk::CancelSubscription::default();
                    params.invoice_now = Some(true);
                    params.prorate = Some(true);
                    $sdk::Subscription::cancel(&client, &subscription_id, params).await
                }
                .map_err(remote_error)?;
                Ok(subscription_from(subscription))
            }
        }
    };
}

pub(crate) use sdk_binding;
