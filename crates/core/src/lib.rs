//! Version-agnostic facade over several incompatible vendor API releases
//!
//! Callers hold a [`Registry`] populated at startup, look an [`Adapter`] up by
//! version string and talk to it purely in `multistripe-types`. Each adapter is
//! a [`StripeAdapter`] over a [`VendorBinding`] that knows one release's wire
//! format.

pub mod adapter;
pub mod binding;
pub mod context;
pub mod error;
pub mod normalizer;
pub mod queue;
pub mod registry;

#[cfg(test)]
mod test;

pub use adapter::{Adapter, StripeAdapter};
pub use binding::{Credentials, RemoteResult, VendorBinding, VerifiedEvent, WireObject, WireSchema};
pub use context::{CallContext, CancelHandle};
pub use error::{RemoteError, Result, StripeError};
pub use normalizer::{WebhookStage, classify, normalize, verify_and_normalize};
pub use queue::{CallbackQueue, CallbackStream, DEFAULT_QUEUE_CAPACITY};
pub use registry::Registry;

pub use multistripe_types as types;
