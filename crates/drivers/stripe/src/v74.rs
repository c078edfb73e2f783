//! API `2022-11-15` through `async-stripe` 0.40

crate::binding::sdk_binding! {
    /// Binding for the `v74` release
    ///
    /// Payment method listing must name a payment method type on this release.
    pub struct V74;
    sdk = stripe_v74;
    key = "v74";
    api_version = "2022-11-15";
    payment_method_type = Some(stripe_v74::PaymentMethodTypeFilter::Card);
}
