//! Connectivity probe.

use clap::Args;
use wanlink::{RemoteExecutor, TargetRegistry};

use crate::Context;
use crate::output;

#[derive(Args)]
pub struct ProbeCmd {
    /// Target to ping from.
    source: String,

    /// Address or hostname to ping.
    destination: String,

    /// Echo requests to send (1-10).
    #[arg(short, long, default_value_t = 4)]
    count: u32,

    /// Payload size in bytes (0 for the ping default).
    #[arg(short, long, default_value_t = 0)]
    size: u32,
}

impl ProbeCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let report = ctx
            .controller
            .probe(&self.source, &self.destination, self.count, self.size)
            .await?;
        output::print(&report, &ctx.opts)?;
        Ok(())
    }
}
