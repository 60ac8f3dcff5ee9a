//! Live telemetry.

use std::io::Write;
use std::time::Duration;

use clap::Args;
use tokio_stream::StreamExt;
use wanlink::{RemoteExecutor, TargetRegistry, TelemetryStreamer};

use crate::Context;
use crate::output::{self, OutputOptions, Printable};

#[derive(Args)]
pub struct StreamCmd {
    /// Seconds between snapshots.
    #[arg(short, long, default_value = "1", value_parser = parse_interval)]
    interval: Duration,

    /// Stop after this many snapshots.
    #[arg(short = 'n', long)]
    count: Option<u64>,
}

impl StreamCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: Context<E, R>,
    ) -> anyhow::Result<()> {
        let opts = ctx.opts;
        let stream = TelemetryStreamer::new(ctx.controller, ctx.registry)
            .interval(self.interval)
            .into_stream();
        tokio::pin!(stream);

        let mut printed = 0u64;
        loop {
            if self.count.is_some_and(|limit| printed >= limit) {
                break;
            }

            tokio::select! {
                snapshot = stream.next() => {
                    let Some(snapshot) = snapshot else { break };
                    emit(&snapshot, &opts)?;
                    printed += 1;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("interrupted after {} snapshots", printed);
                    break;
                }
            }
        }

        Ok(())
    }
}

/// One snapshot per line in JSON mode.
fn emit<T: Printable>(item: &T, opts: &OutputOptions) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    if opts.is_json() {
        output::write_json(&mut stdout, &item.to_json(), false)?;
    } else {
        item.print_text(&mut stdout)?;
    }
    stdout.flush()
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("invalid interval: {}", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be positive, got {}", s));
    }
    Ok(Duration::from_secs_f64(secs))
}
