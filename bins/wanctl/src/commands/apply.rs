//! Write commands: apply, apply-batch, apply-many, apply-matrix, clear.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use serde::Deserialize;
use wanlink::impair::controller::ApplySelection;
use wanlink::{ImpairmentSpec, InterfaceRef, RemoteExecutor, TargetRegistry};

use super::{SpecArgs, parse_links};
use crate::Context;
use crate::output::{self, Applied};

#[derive(Args)]
pub struct ApplyCmd {
    /// Interface to impair, TARGET[:IFACE].
    #[arg(value_name = "TARGET[:IFACE]")]
    link: String,

    #[command(flatten)]
    spec: SpecArgs,
}

impl ApplyCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let link = InterfaceRef::parse_with_default(&self.link, &ctx.default_iface)?;
        ctx.controller.apply(&link, &self.spec.to_spec()).await?;
        output::print(&Applied::touched(vec![link.key()]), &ctx.opts)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct ApplyBatchCmd {
    /// Interfaces to impair, TARGET[:IFACE].
    #[arg(value_name = "TARGET[:IFACE]", required = true)]
    links: Vec<String>,

    #[command(flatten)]
    spec: SpecArgs,
}

impl ApplyBatchCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let links = parse_links(&self.links, &ctx.default_iface)?;
        let touched = ctx
            .controller
            .apply_batch(&links, &self.spec.to_spec())
            .await?;
        output::print(&Applied::touched(touched), &ctx.opts)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct ApplyManyCmd {
    /// Source targets (repeat or comma-separate).
    #[arg(long = "source", value_delimiter = ',')]
    sources: Vec<String>,

    /// Destination targets, applied only with --both.
    #[arg(long = "target", value_delimiter = ',')]
    targets: Vec<String>,

    /// Also impair the destination targets.
    #[arg(long)]
    both: bool,

    #[command(flatten)]
    spec: SpecArgs,
}

impl ApplyManyCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let selection = ApplySelection::new()
            .sources(self.sources.iter().cloned())
            .targets(self.targets.iter().cloned())
            .both(self.both);
        let touched = ctx
            .controller
            .apply_selection(&selection, &self.spec.to_spec())
            .await?;
        output::print(&Applied::touched(touched), &ctx.opts)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct ApplyMatrixCmd {
    /// Matrix file (.yaml, .yml or .json).
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ApplyMatrixCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        let items = load_matrix(&self.file)?;
        let count = ctx.controller.apply_matrix(&items).await?;
        output::print(&Applied::count(count), &ctx.opts)?;
        Ok(())
    }
}

#[derive(Args)]
pub struct ClearCmd {
    /// Interfaces to clear, TARGET[:IFACE].
    #[arg(value_name = "TARGET[:IFACE]", required = true)]
    links: Vec<String>,
}

impl ClearCmd {
    pub async fn run<E: RemoteExecutor, R: TargetRegistry>(
        &self,
        ctx: &Context<E, R>,
    ) -> anyhow::Result<()> {
        for link in parse_links(&self.links, &ctx.default_iface)? {
            ctx.controller.clear(&link).await?;
        }
        output::print(&Applied::ok(), &ctx.opts)?;
        Ok(())
    }
}

// ============================================================================
// Matrix files
// ============================================================================

/// One matrix entry: `{name, iface, delay_ms, loss_pct, ...}`.
#[derive(Debug, Deserialize)]
struct MatrixItem {
    #[serde(flatten)]
    link: InterfaceRef,
    #[serde(flatten)]
    spec: ImpairmentSpec,
}

/// Either `items: [...]` or a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MatrixDoc {
    Wrapped { items: Vec<MatrixItem> },
    Bare(Vec<MatrixItem>),
}

fn load_matrix(path: &Path) -> anyhow::Result<Vec<(InterfaceRef, ImpairmentSpec)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    parse_matrix(&text, is_json).with_context(|| format!("invalid matrix file {}", path.display()))
}

fn parse_matrix(text: &str, is_json: bool) -> anyhow::Result<Vec<(InterfaceRef, ImpairmentSpec)>> {
    let doc: MatrixDoc = if is_json {
        serde_json::from_str(text)?
    } else {
        serde_yaml::from_str(text)?
    };
    let items = match doc {
        MatrixDoc::Wrapped { items } | MatrixDoc::Bare(items) => items,
    };
    Ok(items.into_iter().map(|i| (i.link, i.spec)).collect())
}
