//! Entity model and the request-scoped unit of work.
//!
//! # Key Components
//!
//! * [`Entity`] - mutable record: scalar field map plus association links
//! * [`EntityHandle`] - address of an entity inside a [`UnitOfWork`]
//! * [`Identifier`] - identifier field values in declaration order
//! * [`EntityVersion`] - content-hash version used for optimistic locking

#[allow(clippy::module_inception)]
pub mod entity;
pub mod identifier;
pub mod unit_of_work;
pub mod version;

pub use entity::{Entity, EntityHandle, EntityRef, EntityState, Link};
pub use identifier::Identifier;
pub use unit_of_work::UnitOfWork;
pub use version::EntityVersion;
