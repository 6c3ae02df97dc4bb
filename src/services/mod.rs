//! Built-in functional services.
//!
//! These exist to exercise the handler contract end to end; real
//! deployments register their own handlers next to them.

pub mod echo;
pub mod time;

use crate::registry::ServiceRegistry;

/// Registers every built-in service. Called once at startup; a
/// duplicate name aborts the boot.
pub async fn register_builtin(registry: &ServiceRegistry) -> anyhow::Result<()> {
    echo::register(registry).await?;
    time::register(registry).await?;
    Ok(())
}
