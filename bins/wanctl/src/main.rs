//! wanctl - apply and observe link impairments.
//!
//! Drives netem/tbf on the interfaces of containers or network namespaces
//! and reads their statistics back.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use wanlink::impair::executor::{DockerExecutor, LocalExecutor, NetnsExecutor};
use wanlink::impair::registry::{DockerRegistry, NetnsRegistry, StaticRegistry};
use wanlink::{ControllerConfig, ImpairmentController, RemoteExecutor, TargetRegistry};

use output::{OutputFormat, OutputOptions};

/// Where targets live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Containers, reached with `docker exec`.
    Docker,
    /// Named network namespaces, reached with `ip netns exec`.
    Netns,
    /// The host itself; the only target is `localhost`.
    Local,
}

#[derive(Parser)]
#[command(name = "wanctl", version, about = "Link impairment control tool")]
struct Cli {
    /// Target backend.
    #[arg(short = 'b', long, value_enum, default_value = "docker", global = true)]
    backend: Backend,

    /// Output JSON.
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long, global = true)]
    pretty: bool,

    /// Interface used when a target is given without one.
    #[arg(long, default_value = "eth0", global = true)]
    default_iface: String,

    /// Run namespace commands through `sudo -n`.
    #[arg(long, global = true)]
    sudo: bool,

    /// Container engine CLI.
    #[arg(long, default_value = "docker", global = true)]
    docker_bin: String,

    /// Only consider containers carrying this label.
    #[arg(long, global = true)]
    label: Option<String>,

    /// Verbose logging (repeat for more).
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply an impairment to one interface.
    #[command(visible_alias = "a")]
    Apply(commands::apply::ApplyCmd),

    /// Apply the same impairment to several interfaces.
    ApplyBatch(commands::apply::ApplyBatchCmd),

    /// Apply an impairment to whole targets (sources, optionally targets).
    ApplyMany(commands::apply::ApplyManyCmd),

    /// Apply per-interface impairments from a YAML or JSON file.
    ApplyMatrix(commands::apply::ApplyMatrixCmd),

    /// Remove impairments.
    #[command(visible_alias = "c")]
    Clear(commands::apply::ClearCmd),

    /// Show impairment state and counters.
    #[command(visible_alias = "s")]
    Status(commands::status::StatusCmd),

    /// Poll every interface and print a snapshot per interval.
    #[command(visible_alias = "watch")]
    Stream(commands::stream::StreamCmd),

    /// List targets.
    Targets(commands::discover::TargetsCmd),

    /// List the interfaces of a target.
    Ifaces(commands::discover::IfacesCmd),

    /// List every interface of every target.
    Ports(commands::discover::PortsCmd),

    /// Ping from inside a target.
    Probe(commands::probe::ProbeCmd),
}

/// Everything a subcommand needs.
pub struct Context<E, R> {
    pub controller: ImpairmentController<E>,
    pub registry: R,
    pub default_iface: String,
    pub opts: OutputOptions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let opts = OutputOptions {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        pretty: cli.pretty,
    };
    let config = ControllerConfig::new().default_interface(&cli.default_iface);

    let result = match cli.backend {
        Backend::Docker => {
            let exec = DockerExecutor::new().binary(&cli.docker_bin);
            let mut registry = DockerRegistry::new(exec.clone());
            if let Some(label) = &cli.label {
                registry = registry.label(label);
            }
            run(cli.command, context(exec, registry, config, opts)).await
        }
        Backend::Netns => {
            let exec = NetnsExecutor::new().sudo(cli.sudo);
            let registry = NetnsRegistry::new(exec.clone());
            run(cli.command, context(exec, registry, config, opts)).await
        }
        Backend::Local => {
            let registry = StaticRegistry::new(LocalExecutor, ["localhost"]);
            run(cli.command, context(LocalExecutor, registry, config, opts)).await
        }
    };

    if let Err(e) = result {
        report_error(&e, &opts);
        std::process::exit(1);
    }

    Ok(())
}

fn context<E, R>(exec: E, registry: R, config: ControllerConfig, opts: OutputOptions) -> Context<E, R>
where
    E: RemoteExecutor,
    R: TargetRegistry,
{
    let default_iface = config.default_interface.clone();
    Context {
        controller: ImpairmentController::new(exec).with_config(config),
        registry,
        default_iface,
        opts,
    }
}

async fn run<E, R>(command: Command, ctx: Context<E, R>) -> anyhow::Result<()>
where
    E: RemoteExecutor,
    R: TargetRegistry,
{
    match command {
        Command::Apply(cmd) => cmd.run(&ctx).await,
        Command::ApplyBatch(cmd) => cmd.run(&ctx).await,
        Command::ApplyMany(cmd) => cmd.run(&ctx).await,
        Command::ApplyMatrix(cmd) => cmd.run(&ctx).await,
        Command::Clear(cmd) => cmd.run(&ctx).await,
        Command::Status(cmd) => cmd.run(&ctx).await,
        Command::Stream(cmd) => cmd.run(ctx).await,
        Command::Targets(cmd) => cmd.run(&ctx).await,
        Command::Ifaces(cmd) => cmd.run(&ctx).await,
        Command::Ports(cmd) => cmd.run(&ctx).await,
        Command::Probe(cmd) => cmd.run(&ctx).await,
    }
}

/// Engine errors become `{"error", "status"}` in JSON mode.
fn report_error(e: &anyhow::Error, opts: &OutputOptions) {
    if opts.is_json() {
        let status = e
            .downcast_ref::<wanlink::Error>()
            .map_or(500, wanlink::Error::status_code);
        let body = serde_json::json!({ "error": e.to_string(), "status": status });
        let _ = output::write_json(&mut std::io::stdout().lock(), &body, opts.pretty);
    } else {
        eprintln!("Error: {:#}", e);
    }
}
