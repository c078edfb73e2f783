//! Local stand-in for the Stripe REST API, plus signed webhook fixtures
//!
//! Every object is rendered in full, with the fields the SDK requires.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use multistripe_core::Credentials;
use serde_json::{Value, json};
use sha2::Sha256;

pub const SECRET_KEY: &str = "sk_test_mock";
pub const WEBHOOK_SECRET: &str = "whsec_mock";

/// Payment methods served by the list endpoint, two per page
pub const PAYMENT_METHOD_COUNT: usize = 5;
const PAGE_SIZE: usize = 2;

pub const PERIOD_END: i64 = 1_702_592_000;
const CREATED: i64 = 1_700_000_000;

pub fn credentials() -> Credentials {
    Credentials::new(SECRET_KEY, WEBHOOK_SECRET)
}

/// One request received by the mock
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Recorded {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<Recorded>>,
}

pub struct MockStripe {
    pub api_base: String,
    state: Arc<MockState>,
}

impl MockStripe {
    /// Serve the mock on an ephemeral port
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            api_base: format!("http://{addr}"),
            state,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests sent to `path`, in arrival order
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

fn error(status: StatusCode, error: Value) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": error })))
}

fn parse_params(raw: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(raw).unwrap_or_default()
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>) {
    let expected_auth = format!("Bearer {SECRET_KEY}");
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if auth != Some(expected_auth.as_str()) {
        return error(
            StatusCode::UNAUTHORIZED,
            json!({ "type": "invalid_request_error", "message": "Invalid API Key provided" }),
        );
    }

    let mut params = parse_params(uri.query().unwrap_or_default());
    params.extend(parse_params(&body));
    let recorded = Recorded {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        params,
    };
    state.requests.lock().unwrap().push(recorded.clone());

    let segments: Vec<&str> = recorded.path.trim_start_matches("/v1/").split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("POST", ["customers"]) => ok(customer("cus_new", &recorded)),
        ("POST", ["customers", id]) => ok(customer(id, &recorded)),
        ("GET", ["customers", "cus_missing"]) => missing("cus_missing"),
        ("GET", ["customers", id]) => ok(customer_object(id)),
        ("GET", ["payment_methods"]) => ok(payment_method_page(&recorded)),
        ("POST", ["payment_methods", id, "attach"]) => {
            ok(payment_method_object(id, recorded.param("customer")))
        }
        ("POST", ["payment_methods", id, "detach"]) => ok(payment_method_object(id, None)),
        ("POST", ["payment_intents"]) => match recorded.param("payment_method") {
            Some("pm_declined") => error(
                StatusCode::PAYMENT_REQUIRED,
                json!({
                    "type": "card_error",
                    "code": "card_declined",
                    "decline_code": "insufficient_funds",
                    "message": "Your card has insufficient funds.",
                    "param": "payment_method"
                }),
            ),
            _ => ok(payment_intent("pi_new", &recorded)),
        },
        ("GET", ["payment_intents", id]) => ok(payment_intent(id, &recorded)),
        ("POST", ["subscriptions"]) => ok(subscription_object(
            "sub_new",
            recorded.param("customer").unwrap_or("cus_1"),
            recorded.param("items[0][price]").unwrap_or("price_1"),
            false,
        )),
        ("GET", ["subscriptions"]) => ok(list(
            "/v1/subscriptions",
            vec![
                subscription_object("sub_1", "cus_1", "price_old", false),
                subscription_object("sub_2", "cus_1", "price_addon", false),
            ],
            false,
        )),
        ("GET", ["subscriptions", id]) => {
            ok(subscription_object(id, "cus_1", "price_old", false))
        }
        ("POST", ["subscriptions", id]) => ok(subscription_object(
            id,
            "cus_1",
            recorded.param("items[0][price]").unwrap_or("price_old"),
            recorded.param("cancel_at_period_end") == Some("true"),
        )),
        ("DELETE", ["subscriptions", id]) => {
            let mut canceled = subscription_object(id, "cus_1", "price_old", false);
            canceled["status"] = json!("canceled");
            canceled["canceled_at"] = json!(CREATED + 60);
            canceled["ended_at"] = json!(CREATED + 60);
            ok(canceled)
        }
        _ => error(
            StatusCode::NOT_FOUND,
            json!({ "type": "invalid_request_error", "message": "Unrecognized request URL" }),
        ),
    }
}

fn ok(body: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(body))
}

fn missing(id: &str) -> (StatusCode, Json<Value>) {
    error(
        StatusCode::NOT_FOUND,
        json!({
            "type": "invalid_request_error",
            "code": "resource_missing",
            "message": format!("No such customer: '{id}'"),
            "param": "id"
        }),
    )
}

fn list(url: &str, data: Vec<Value>, has_more: bool) -> Value {
    json!({ "object": "list", "url": url, "has_more": has_more, "data": data })
}

/// `metadata[...]` form fields folded back into an object
fn metadata(recorded: &Recorded) -> Value {
    let entries: BTreeMap<&str, &str> = recorded
        .params
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix("metadata[")
                .and_then(|k| k.strip_suffix(']'))
                .map(|k| (k, v.as_str()))
        })
        .collect();
    json!(entries)
}

fn address(postal_code: Option<&str>) -> Value {
    json!({
        "city": null,
        "country": null,
        "line1": null,
        "line2": null,
        "postal_code": postal_code,
        "state": null
    })
}

fn billing_details() -> Value {
    json!({ "address": address(None), "email": null, "name": null, "phone": null })
}

/// Stored customer, defaulting to `pm_2`
pub fn customer_object(id: &str) -> Value {
    json!({
        "id": id,
        "object": "customer",
        "address": null,
        "balance": 0,
        "created": CREATED,
        "currency": "usd",
        "delinquent": false,
        "description": null,
        "email": null,
        "invoice_prefix": "A1B2C3",
        "invoice_settings": {
            "custom_fields": null,
            "default_payment_method": "pm_2",
            "footer": null,
            "rendering_options": null
        },
        "livemode": false,
        "metadata": {},
        "name": null,
        "phone": null,
        "preferred_locales": [],
        "shipping": null,
        "tax_exempt": "none"
    })
}

fn customer(id: &str, recorded: &Recorded) -> Value {
    let mut customer = customer_object(id);
    customer["name"] = json!(recorded.param("name"));
    customer["email"] = json!(recorded.param("email"));
    customer["phone"] = json!(recorded.param("phone"));
    customer["address"] = address(recorded.param("address[postal_code]"));
    customer["metadata"] = metadata(recorded);
    customer
}

pub fn payment_method_object(id: &str, customer: Option<&str>) -> Value {
    json!({
        "id": id,
        "object": "payment_method",
        "billing_details": billing_details(),
        "card": {
            "brand": "visa",
            "checks": null,
            "country": "US",
            "exp_month": 12,
            "exp_year": 2030,
            "fingerprint": "fp_1",
            "funding": "credit",
            "last4": "4242",
            "networks": null,
            "three_d_secure_usage": null,
            "wallet": null
        },
        "created": CREATED,
        "customer": customer,
        "livemode": false,
        "metadata": {},
        "type": "card"
    })
}

fn payment_method_page(recorded: &Recorded) -> Value {
    let start = recorded
        .param("starting_after")
        .and_then(|id| id.strip_prefix("pm_"))
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(0);
    let end = (start + PAGE_SIZE).min(PAYMENT_METHOD_COUNT);
    let data: Vec<Value> = (start + 1..=end)
        .map(|n| payment_method_object(&format!("pm_{n}"), recorded.param("customer")))
        .collect();
    list("/v1/payment_methods", data, end < PAYMENT_METHOD_COUNT)
}

pub fn payment_intent_object(id: &str, amount: i64, status: &str) -> Value {
    json!({
        "id": id,
        "object": "payment_intent",
        "amount": amount,
        "amount_capturable": 0,
        "amount_received": 0,
        "application": null,
        "application_fee_amount": null,
        "automatic_payment_methods": null,
        "canceled_at": null,
        "cancellation_reason": null,
        "capture_method": "automatic",
        "client_secret": format!("{id}_secret_abc"),
        "confirmation_method": "automatic",
        "created": CREATED,
        "currency": "usd",
        "customer": null,
        "description": null,
        "invoice": null,
        "last_payment_error": null,
        "latest_charge": null,
        "livemode": false,
        "metadata": {},
        "next_action": null,
        "on_behalf_of": null,
        "payment_method": null,
        "payment_method_options": null,
        "payment_method_types": ["card"],
        "processing": null,
        "receipt_email": null,
        "review": null,
        "setup_future_usage": null,
        "shipping": null,
        "statement_descriptor": null,
        "statement_descriptor_suffix": null,
        "status": status,
        "transfer_data": null,
        "transfer_group": null
    })
}

fn payment_intent(id: &str, recorded: &Recorded) -> Value {
    let amount: i64 = recorded
        .param("amount")
        .and_then(|a| a.parse().ok())
        .unwrap_or(2000);
    let status = match recorded.param("confirm") {
        Some("false") => "requires_confirmation",
        _ => "succeeded",
    };
    let mut intent = payment_intent_object(id, amount, status);
    intent["currency"] = json!(recorded.param("currency").unwrap_or("usd"));
    intent["customer"] = json!(recorded.param("customer"));
    intent["payment_method"] = json!(recorded.param("payment_method"));
    intent["metadata"] = metadata(recorded);
    intent
}

fn price_object(id: &str) -> Value {
    json!({
        "id": id,
        "object": "price",
        "active": true,
        "billing_scheme": "per_unit",
        "created": CREATED,
        "currency": "usd",
        "custom_unit_amount": null,
        "livemode": false,
        "lookup_key": null,
        "metadata": {},
        "nickname": null,
        "product": "prod_1",
        "recurring": {
            "aggregate_usage": null,
            "interval": "month",
            "interval_count": 1,
            "trial_period_days": null,
            "usage_type": "licensed"
        },
        "tax_behavior": "unspecified",
        "tiers_mode": null,
        "transform_quantity": null,
        "type": "recurring",
        "unit_amount": 1000,
        "unit_amount_decimal": "1000"
    })
}

fn plan_object(id: &str) -> Value {
    json!({
        "id": id,
        "object": "plan",
        "active": true,
        "aggregate_usage": null,
        "amount": 1000,
        "amount_decimal": "1000",
        "billing_scheme": "per_unit",
        "created": CREATED,
        "currency": "usd",
        "interval": "month",
        "interval_count": 1,
        "livemode": false,
        "metadata": {},
        "nickname": null,
        "product": "prod_1",
        "tiers_mode": null,
        "transform_usage": null,
        "trial_period_days": null,
        "usage_type": "licensed"
    })
}

/// Subscription with a single item priced at `price`
pub fn subscription_object(
    id: &str,
    customer: &str,
    price: &str,
    cancel_at_period_end: bool,
) -> Value {
    let item = json!({
        "id": "si_1",
        "object": "subscription_item",
        "billing_thresholds": null,
        "created": CREATED,
        "discounts": [],
        "metadata": {},
        "plan": plan_object(price),
        "price": price_object(price),
        "quantity": 1,
        "subscription": id,
        "tax_rates": []
    });
    let cancel_at = if cancel_at_period_end {
        json!(PERIOD_END)
    } else {
        Value::Null
    };
    json!({
        "id": id,
        "object": "subscription",
        "application": null,
        "application_fee_percent": null,
        "automatic_tax": { "enabled": false, "liability": null },
        "billing_cycle_anchor": CREATED,
        "billing_thresholds": null,
        "cancel_at": cancel_at,
        "cancel_at_period_end": cancel_at_period_end,
        "canceled_at": null,
        "cancellation_details": { "comment": null, "feedback": null, "reason": null },
        "collection_method": "charge_automatically",
        "created": CREATED,
        "currency": "usd",
        "current_period_end": PERIOD_END,
        "current_period_start": CREATED,
        "customer": customer,
        "days_until_due": null,
        "default_payment_method": null,
        "default_source": null,
        "default_tax_rates": [],
        "description": null,
        "discount": null,
        "discounts": [],
        "ended_at": null,
        "invoice_settings": { "account_tax_ids": null, "issuer": { "type": "self" } },
        "items": list(&format!("/v1/subscription_items?subscription={id}"), vec![item], false),
        "latest_invoice": null,
        "livemode": false,
        "metadata": {},
        "next_pending_invoice_item_invoice": null,
        "on_behalf_of": null,
        "pause_collection": null,
        "payment_settings": null,
        "pending_invoice_item_interval": null,
        "pending_setup_intent": null,
        "pending_update": null,
        "schedule": null,
        "start_date": CREATED,
        "status": "active",
        "test_clock": null,
        "transfer_data": null,
        "trial_end": null,
        "trial_settings": null,
        "trial_start": null
    })
}

/// Paid invoice for `cus_1` with `lines` subscription lines and `order` metadata
pub fn invoice_object(lines: usize) -> Value {
    let lines: Vec<Value> = (0..lines)
        .map(|n| {
            json!({
                "id": format!("il_{n}"),
                "object": "line_item",
                "amount": 100 * (n as i64 + 1),
                "amount_excluding_tax": 100 * (n as i64 + 1),
                "currency": "usd",
                "description": format!("Line {n}"),
                "discount_amounts": [],
                "discountable": true,
                "discounts": [],
                "invoice_item": null,
                "livemode": false,
                "metadata": {},
                "period": { "start": CREATED, "end": PERIOD_END },
                "plan": null,
                "price": null,
                "proration": false,
                "proration_details": null,
                "quantity": 1,
                "subscription": "sub_1",
                "subscription_item": "si_1",
                "tax_amounts": [],
                "tax_rates": [],
                "type": "subscription",
                "unit_amount_excluding_tax": "100"
            })
        })
        .collect();
    json!({
        "id": "in_1",
        "object": "invoice",
        "amount_due": 600,
        "amount_paid": 600,
        "amount_remaining": 0,
        "created": CREATED,
        "currency": "usd",
        "customer": "cus_1",
        "livemode": false,
        "lines": list("/v1/invoices/in_1/lines", lines, false),
        "metadata": { "order": "42" },
        "paid": true,
        "status": "paid",
        "subscription": "sub_1"
    })
}

fn refund_object(id: &str, charge: &str, amount: i64) -> Value {
    json!({
        "id": id,
        "object": "refund",
        "amount": amount,
        "balance_transaction": null,
        "charge": charge,
        "created": CREATED,
        "currency": "usd",
        "metadata": {},
        "payment_intent": null,
        "reason": "requested_by_customer",
        "receipt_number": null,
        "source_transfer_reversal": null,
        "status": "succeeded",
        "transfer_reversal": null
    })
}

/// Charge refunded by `amount_refunded`, with its refund `re_1` expanded
pub fn charge_object(id: &str, amount_refunded: i64) -> Value {
    json!({
        "id": id,
        "object": "charge",
        "amount": 1000,
        "amount_captured": 1000,
        "amount_refunded": amount_refunded,
        "application": null,
        "application_fee": null,
        "application_fee_amount": null,
        "balance_transaction": null,
        "billing_details": billing_details(),
        "calculated_statement_descriptor": null,
        "captured": true,
        "created": CREATED,
        "currency": "usd",
        "customer": null,
        "description": null,
        "disputed": false,
        "failure_code": null,
        "failure_message": null,
        "fraud_details": null,
        "invoice": null,
        "livemode": false,
        "metadata": {},
        "on_behalf_of": null,
        "outcome": null,
        "paid": true,
        "payment_intent": null,
        "payment_method": null,
        "payment_method_details": null,
        "receipt_email": null,
        "receipt_number": null,
        "receipt_url": null,
        "refunded": true,
        "refunds": list(
            &format!("/v1/charges/{id}/refunds"),
            vec![refund_object("re_1", id, amount_refunded)],
            false,
        ),
        "review": null,
        "shipping": null,
        "source_transfer": null,
        "statement_descriptor": null,
        "statement_descriptor_suffix": null,
        "status": "succeeded",
        "transfer_data": null,
        "transfer_group": null
    })
}

/// Succeeded setup intent on `pm_1`, optionally with the payment method expanded
pub fn setup_intent_object(expanded: bool) -> Value {
    let payment_method = if expanded {
        payment_method_object("pm_1", Some("cus_1"))
    } else {
        json!("pm_1")
    };
    json!({
        "id": "seti_1",
        "object": "setup_intent",
        "application": null,
        "cancellation_reason": null,
        "client_secret": null,
        "created": CREATED,
        "customer": "cus_1",
        "description": null,
        "last_setup_error": null,
        "latest_attempt": null,
        "livemode": false,
        "mandate": null,
        "metadata": {},
        "next_action": null,
        "on_behalf_of": null,
        "payment_method": payment_method,
        "payment_method_options": null,
        "payment_method_types": ["card"],
        "single_use_mandate": null,
        "status": "succeeded",
        "usage": "off_session"
    })
}

/// Event envelope carrying `object`, as rendered by `api_version`
pub fn event(event_type: &str, api_version: &str, object: Value) -> Vec<u8> {
    json!({
        "id": "evt_1",
        "object": "event",
        "account": null,
        "api_version": api_version,
        "created": CREATED,
        "data": { "object": object },
        "livemode": false,
        "pending_webhooks": 1,
        "request": { "id": null, "idempotency_key": null },
        "type": event_type
    })
    .to_string()
    .into_bytes()
}

/// `Stripe-Signature` header for `payload` signed with `secret` at `timestamp`
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// `Stripe-Signature` header for `payload`, signed now
pub fn sign_now(payload: &[u8]) -> String {
    sign(payload, WEBHOOK_SECRET, Utc::now().timestamp())
}
