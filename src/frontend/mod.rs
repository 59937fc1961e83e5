pub mod startup;

pub(crate) mod proxy_responses;

pub use startup::StartupNegotiator;
