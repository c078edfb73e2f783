//! API `2023-10-16` through `async-stripe` 0.41

crate::binding::sdk_binding! {
    /// Binding for the `v82` release
    pub struct V82;
    sdk = stripe_v82;
    key = "v82";
    api_version = "2023-10-16";
    payment_method_type = None;
}
