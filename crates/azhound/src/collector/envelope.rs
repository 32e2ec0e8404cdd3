use azhound_core::{Envelope, Resource, TenantContext, TenantScoped};

/// Wraps a decoded item with its kind and the run's tenant context.
pub fn tag<R: Resource>(item: R, tenant: &TenantContext) -> Envelope<R> {
    Envelope {
        kind: R::KIND,
        data: TenantScoped {
            item,
            tenant: tenant.clone(),
        },
    }
}
