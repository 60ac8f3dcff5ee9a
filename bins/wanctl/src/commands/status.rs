//! Read commands.

use clap::Args;
use wanlink::{RemoteExecutor, TargetRegistry};

use super::parse_links;
use crate::Context;
use crate::output::{self, StatusMap};

#[derive(Args)]
pub struct StatusCmd {
    /// Interfaces to read, TARGET[:IFACE].
    #[arg(value_name = "TARGET[:IFACE]", required = true)]
    links: Vec<String>,
}

impl StatusCmd {
    /// One link prints its report; several print a map keyed by
    /// `target:iface` where failures are reported per entry.
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let links = parse_links(&self.links, &ctx.default_iface)?;
        if let [link] = links.as_slice() {
            let report = ctx.controller.status(link).await?;
            output::print(&report, &ctx.opts)?;
        } else {
            let entries = ctx.controller.status_batch(&links).await;
            output::print(&StatusMap(entries), &ctx.opts)?;
        }
        Ok(())
    }
}
