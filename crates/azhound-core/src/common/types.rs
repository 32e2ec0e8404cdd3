//! # Kinds, tenant context and envelopes
//!
//! This module defines the records every collector produces. A collector
//! never emits a bare resource: each item is wrapped in an [`Envelope`] that
//! names its [`Kind`] and carries the [`TenantContext`] the run started with.
//!
//! ## Output shape
//!
//! ```json
//! {
//!   "kind": "#AZGroup",
//!   "data": {
//!     "id": "3d5f...",
//!     "displayName": "Domain Admins",
//!     "tenantId": "6c12...",
//!     "tenantName": "Contoso"
//!   }
//! }
//! ```
//!
//! The payload type of an envelope is fixed by its kind through
//! [`Resource::KIND`](crate::Resource::KIND), so a consumer matching on `kind`
//! knows the structure of `data` without inspecting it.

use core::fmt;
use serde::{Deserialize, Serialize};

/// The closed set of resource kinds produced by collectors.
///
/// Serialized with the `#AZ` prefix consumers expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "#AZApp")]
    App,
    #[serde(rename = "#AZAppOwner")]
    AppOwner,
    #[serde(rename = "#AZDevice")]
    Device,
    #[serde(rename = "#AZDeviceOwner")]
    DeviceOwner,
    #[serde(rename = "#AZGroup")]
    Group,
    #[serde(rename = "#AZGroupMember")]
    GroupMember,
    #[serde(rename = "#AZGroupOwner")]
    GroupOwner,
    #[serde(rename = "#AZRole")]
    Role,
    #[serde(rename = "#AZRoleAssignment")]
    RoleAssignment,
    #[serde(rename = "#AZServicePrincipal")]
    ServicePrincipal,
    #[serde(rename = "#AZTenant")]
    Tenant,
    #[serde(rename = "#AZUser")]
    User,
}

impl Kind {
    /// Returns the serialized discriminant, e.g. `#AZGroup`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::App => "#AZApp",
            Self::AppOwner => "#AZAppOwner",
            Self::Device => "#AZDevice",
            Self::DeviceOwner => "#AZDeviceOwner",
            Self::Group => "#AZGroup",
            Self::GroupMember => "#AZGroupMember",
            Self::GroupOwner => "#AZGroupOwner",
            Self::Role => "#AZRole",
            Self::RoleAssignment => "#AZRoleAssignment",
            Self::ServicePrincipal => "#AZServicePrincipal",
            Self::Tenant => "#AZTenant",
            Self::User => "#AZUser",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifying metadata for the directory being enumerated.
///
/// Resolved once before enumeration starts and never re-read during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    #[serde(rename = "tenantName")]
    pub display_name: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A resource annotated with the tenant it was collected from.
///
/// The resource's own fields and the tenant fields share one JSON object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TenantScoped<R> {
    #[serde(flatten)]
    pub item: R,
    #[serde(flatten)]
    pub tenant: TenantContext,
}

/// A tagged, tenant-annotated wrapper around one collected item.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope<R> {
    pub kind: Kind,
    pub data: TenantScoped<R>,
}

impl<R> Envelope<R> {
    pub fn item(&self) -> &R {
        &self.data.item
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.data.tenant
    }

    pub fn into_item(self) -> R {
        self.data.item
    }
}
