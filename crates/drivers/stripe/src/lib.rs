//! Stripe bindings for `multistripe-core`
//!
//! Every supported API release links its own `async-stripe` version: `v74`
//! speaks API `2022-11-15` through `async-stripe` 0.40, `v82` speaks
//! `2023-10-16` through 0.41. Each binding implements [`ApiRelease`], is
//! wrapped in a [`StripeAdapter`] and registered under its release key.
//!
//! ```no_run
//! use multistripe_core::{Adapter, CallContext, Credentials, Registry};
//! use multistripe_driver_stripe::{BindingOptions, register_defaults};
//!
//! # async fn run() -> multistripe_core::Result<()> {
//! let mut registry = Registry::new();
//! register_defaults(&mut registry, &BindingOptions::default(), None);
//!
//! let adapter = registry.lookup("v82")?;
//! adapter.configure(Credentials::new("sk_test_...", "whsec_..."));
//! let methods = adapter
//!     .list_payment_methods(&CallContext::background(), "cus_123")
//!     .await?;
//! # Ok(())
//! # }
//! ```
#![recursion_limit = "256"]

use std::sync::Arc;

use multistripe_core::{Adapter, Registry, StripeAdapter};

pub mod binding;
pub mod release;
pub mod v74;
pub mod v82;

#[cfg(test)]
mod test;

pub use release::ApiRelease;
pub use v74::V74;
pub use v82::V82;

pub type HandlerV74 = StripeAdapter<V74>;
pub type HandlerV82 = StripeAdapter<V82>;

/// Production API root
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/";

/// Settings shared by every binding built by [`register_defaults`]
#[derive(Debug, Clone)]
pub struct BindingOptions {
    /// Root of the REST API, without the `/v1` prefix
    pub api_base: String,
    pub ignore_api_version_mismatch: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ignore_api_version_mismatch: false,
        }
    }
}

/// Build the binding for release `R`
pub fn binding<R: ApiRelease>(options: &BindingOptions) -> R {
    R::from_options(options)
}

/// Build the adapter for release `R`, with its own callback queue
pub fn adapter<R: ApiRelease>(
    options: &BindingOptions,
    queue_capacity: Option<usize>,
) -> StripeAdapter<R> {
    let binding = binding::<R>(options);
    match queue_capacity {
        Some(capacity) => StripeAdapter::with_queue_capacity(binding, capacity),
        None => StripeAdapter::new(binding),
    }
}

/// Registry key and pinned API version of every supported release
pub const RELEASES: [(&str, &str); 2] = [
    (V74::KEY, V74::API_VERSION),
    (V82::KEY, V82::API_VERSION),
];

/// Build the adapter registered under `version`, if that release is supported
pub fn adapter_for(
    version: &str,
    options: &BindingOptions,
    queue_capacity: Option<usize>,
) -> Option<Arc<dyn Adapter>> {
    let adapter: Arc<dyn Adapter> = if version == V74::KEY {
        Arc::new(adapter::<V74>(options, queue_capacity))
    } else if version == V82::KEY {
        Arc::new(adapter::<V82>(options, queue_capacity))
    } else {
        return None;
    };
    Some(adapter)
}

/// Register an adapter for every supported release
///
/// Returns the registered version keys. Adapters are left unconfigured; call
/// [`Adapter::configure`] on each before use.
pub fn register_defaults(
    registry: &mut Registry,
    options: &BindingOptions,
    queue_capacity: Option<usize>,
) -> Vec<&'static str> {
    let mut registered = Vec::with_capacity(RELEASES.len());
    for (version, _) in RELEASES {
        if let Some(adapter) = adapter_for(version, options, queue_capacity) {
            registry.register(adapter);
            registered.push(version);
        }
    }
    registered
}
