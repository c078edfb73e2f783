//! Version-agnostic payment processor types
//!
//! Every vendor API release linked underneath `multistripe-core` is translated
//! into the structs of this crate. Values are immutable snapshots returned by an
//! adapter call: they hold no reference back to the adapter that produced them
//! and carry no lifecycle beyond that call.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

pub mod events;
pub mod models;
pub mod params;

pub use events::{
    CallbackEvent, CallbackEventType, CallbackPayload, EventFamily, FamilyMismatch,
    FlatCallbackEvent, LastPaymentError, PaymentIntentEvent, SetupIntentEvent, UnknownEventType,
};
pub use models::{
    CardDetails, Customer, Invoice, InvoiceLine, PaymentIntent, PaymentMethod, Refund,
    Subscription,
};
pub use params::{CustomerParams, PaymentIntentParams, SubscriptionUpdate};

/// Free-form key/value metadata attached to vendor objects
pub type Metadata = IndexMap<String, String>;

/// Metadata key flagging a pre-allocated payment intent
pub const PRE_ALLOCATED_KEY: &str = "PreAllocated";

/// Metadata key flagging a validation-only payment intent
pub const VALIDATE_ONLY_KEY: &str = "ValidateOnly";

/// Collect metadata entries into an IndexMap with sorted keys for consistent ordering
pub fn sorted_metadata<I>(entries: I) -> Metadata
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut metadata: Metadata = entries.into_iter().collect();
    metadata.sort_keys();
    metadata
}

/// Convert an optional vendor timestamp, treating `0` as unset
pub fn optional_timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.filter(|s| *s != 0)
        .and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Convert a vendor creation timestamp; an absent value maps to the Unix epoch
pub fn created_timestamp(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_default()
}
