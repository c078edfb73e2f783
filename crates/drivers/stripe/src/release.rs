use multistripe_core::VendorBinding;

use crate::BindingOptions;

/// One supported Stripe API release, bound to the SDK version that renders it
pub trait ApiRelease: VendorBinding + Sized {
    /// Registry key of the adapter built on this release
    const KEY: &'static str;
    /// API version the linked SDK speaks, also expected on every webhook event
    const API_VERSION: &'static str;

    fn from_options(options: &BindingOptions) -> Self;
}
