//! wanctl subcommands.

pub mod apply;
pub mod discover;
pub mod probe;
pub mod status;
pub mod stream;

use clap::Args;
use wanlink::{ImpairmentSpec, InterfaceRef};

/// Impairment flags shared by the apply commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SpecArgs {
    /// Added delay in milliseconds.
    #[arg(long, default_value_t = 0, value_name = "MS")]
    pub delay: u32,

    /// Delay jitter in milliseconds (needs --delay).
    #[arg(long, default_value_t = 0, value_name = "MS")]
    pub jitter: u32,

    /// Random loss in percent.
    #[arg(long, default_value_t = 0.0, value_name = "PCT")]
    pub loss: f64,

    /// Corruption probability in percent.
    #[arg(long, visible_alias = "ber", default_value_t = 0.0, value_name = "PCT")]
    pub corrupt: f64,

    /// Rate limit, e.g. 10mbit (enables tbf shaping).
    #[arg(long)]
    pub rate: Option<String>,

    /// netem queue limit in packets.
    #[arg(long, value_name = "PACKETS")]
    pub limit: Option<u32>,

    /// Per-packet framing overhead in bytes (with --rate).
    #[arg(long, value_name = "BYTES")]
    pub overhead: Option<u32>,

    /// Minimum packet unit in bytes (with --rate).
    #[arg(long, value_name = "BYTES")]
    pub mpu: Option<u32>,
}

impl SpecArgs {
    pub fn to_spec(&self) -> ImpairmentSpec {
        ImpairmentSpec {
            delay_ms: self.delay,
            jitter_ms: self.jitter,
            loss_pct: self.loss,
            ber_pct: self.corrupt,
            rate: self.rate.clone(),
            queue_limit: self.limit,
            overhead: self.overhead,
            mpu: self.mpu,
        }
    }
}

/// Parse `TARGET[:IFACE]` arguments.
pub fn parse_links(args: &[String], default_iface: &str) -> wanlink::Result<Vec<InterfaceRef>> {
    args.iter()
        .map(|a| InterfaceRef::parse_with_default(a, default_iface))
        .collect()
}
