//! Common test utilities for entity configuration testing.
//!
//! Provides the fixture registry, configurator constructors and assertion
//! macros shared by the integration tests.

#![allow(dead_code)]

pub mod fixtures;

use entity_configurator::storage::InMemoryStore;
use entity_configurator::{EntityConfigurator, EntityContext};

/// Install the test logger once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configurator over a fresh store with the default context.
pub fn configurator() -> EntityConfigurator<InMemoryStore> {
    configurator_with(InMemoryStore::new(), EntityContext::default())
}

/// Configurator over `store` with `context`.
pub fn configurator_with(
    store: InMemoryStore,
    context: EntityContext,
) -> EntityConfigurator<InMemoryStore> {
    init_logging();
    EntityConfigurator::new(store, fixtures::registry()).with_context(context)
}

/// Assert that an error tree holds `message` at a dotted path.
#[macro_export]
macro_rules! assert_error_at {
    ($tree:expr, $path:expr, $message:expr) => {
        assert_eq!(
            $tree.message_at($path),
            Some($message),
            "expected '{}' at '{}' in {}",
            $message,
            $path,
            $tree
        )
    };
}

/// Assert that an error tree is empty, printing it otherwise.
#[macro_export]
macro_rules! assert_valid {
    ($tree:expr) => {
        assert!($tree.is_empty(), "expected no errors, got {}", $tree)
    };
}
