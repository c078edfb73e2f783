use serde::{Deserialize, Serialize};

use crate::Metadata;

/// Fields sent when creating or updating a customer
///
/// Unset fields are left out of the vendor request entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub postcode: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CustomerParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_postcode(mut self, postcode: impl Into<String>) -> Self {
        self.postcode = Some(postcode.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Fields sent when creating a payment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentParams {
    /// Amount in the currency's minor unit
    pub amount: i64,
    /// Lowercase ISO currency code (e.g., "usd")
    pub currency: String,
    pub customer_id: Option<String>,
    pub payment_method_id: Option<String>,
    /// Confirm the intent immediately on creation
    pub confirm: bool,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PaymentIntentParams {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            customer_id: None,
            payment_method_id: None,
            confirm: true,
            metadata: Metadata::new(),
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_payment_method(mut self, payment_method_id: impl Into<String>) -> Self {
        self.payment_method_id = Some(payment_method_id.into());
        self
    }

    /// Create the intent without confirming it
    pub fn without_confirm(mut self) -> Self {
        self.confirm = false;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Changes applied to an existing subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    pub cancel_at_period_end: bool,
    /// Replace the subscription's price when set
    pub new_price_id: Option<String>,
}

impl SubscriptionUpdate {
    pub fn cancel_at_period_end(cancel: bool) -> Self {
        Self {
            cancel_at_period_end: cancel,
            new_price_id: None,
        }
    }

    pub fn with_price(mut self, price_id: impl Into<String>) -> Self {
        self.new_price_id = Some(price_id.into());
        self
    }
}
