//! Shared types and error definitions used across `azhound` collectors.
//!
//! ## Submodules
//!
//! - [`error`] - Error taxonomy for clients, paginators, collectors and sinks.
//! - [`types`] - Resource kinds, tenant context and envelopes.
//! - [`query`] - Server-side shaping of list requests.
//! - [`resource`] - The [`Resource`] trait and the collected models.

pub mod error;
pub mod query;
pub mod resource;
pub mod types;

pub use error::{Error, ItemError, Result};
pub use query::ListQuery;
pub use resource::{Group, Resource, User};
pub use types::{Envelope, Kind, TenantContext, TenantScoped};
