//! Concrete backends for runonce: the HTTP object store and the factory that
//! turns configuration into a log destination.

pub mod factory;
pub mod object_store;
