//! Integration test modules.

mod notifier_mock;
mod provider_mock;
mod service_test;
mod transport_mock;
