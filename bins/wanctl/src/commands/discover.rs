//! Discovery commands.

use clap::Args;
use wanlink::{RemoteExecutor, TargetRegistry};

use crate::Context;
use crate::output::{self, Port, Target};

#[derive(Args)]
pub struct TargetsCmd {}

impl TargetsCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let targets: Vec<_> = ctx
            .registry
            .list_targets()
            .await?
            .into_iter()
            .map(Target)
            .collect();
        output::print_all(&targets, &ctx.opts)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct IfacesCmd {
    /// Target to inspect.
    target: String,
}

impl IfacesCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let ifaces = ctx.registry.list_interfaces(&self.target).await?;
        output::print_all(&ifaces, &ctx.opts)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct PortsCmd {}

impl PortsCmd {
    /// Targets whose interfaces cannot be listed are skipped.
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let mut ports = Vec::new();
        for target in ctx.registry.list_targets().await? {
            match ctx.registry.list_interfaces(&target).await {
                Ok(ifaces) => ports.extend(ifaces.into_iter().map(|info| Port {
                    name: target.clone(),
                    info,
                })),
                Err(e) => tracing::warn!("skipping {}: {}", target, e),
            }
        }
        output::print_all(&ports, &ctx.opts)?;
        Ok(())
    }
}
