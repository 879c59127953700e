//# The client side domain model of the storefront
pub mod admin;
pub mod browse;
pub mod debounce;
pub mod session;
pub mod suggestions;
