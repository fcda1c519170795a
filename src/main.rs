use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use strata_metadata::{JsonFileArtifactReader, RuntimeArtifact, TaskGraph};
use strata_objectstore::{FsStore, ObjectLocator, ObjectStore, S3Store, TagSet};
use strata_resolver::{DEFAULT_MAX_DEPTH, Resolver, ResolverConfig};

/// Strata - resolve pipeline task outputs to concrete artifacts
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.strata)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(clap::Args)]
struct Target {
  /// Task graph snapshot: JSON object of task name to execution record
  #[arg(long)]
  graph: PathBuf,

  /// Output artifacts per execution id (JSON)
  #[arg(long)]
  artifacts: PathBuf,

  /// Task whose output is resolved
  #[arg(long)]
  task: String,

  /// Output key on that task
  #[arg(long)]
  output: String,

  /// Maximum number of composite hops to follow
  #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
  max_depth: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
  S3,
  Fs,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve a task output and print the runtime artifact as JSON
  Resolve {
    #[command(flatten)]
    target: Target,
  },

  /// Resolve a task output and tag its stored object with lineage tags
  Tag {
    #[command(flatten)]
    target: Target,

    /// Object store holding the artifact
    #[arg(long, value_enum, default_value = "s3")]
    backend: Backend,

    /// Extra tag to apply, as KEY=VALUE (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    tags: Vec<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".strata"),
  };

  match cli.command {
    Some(Commands::Resolve { target }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_resolve(target).await })?;
    }
    Some(Commands::Tag {
      target,
      backend,
      tags,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_tag(target, backend, tags, data_dir).await })?;
    }
    None => {
      println!("strata - use --help to see available commands");
    }
  }

  Ok(())
}

/// A token cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
  let cancel = CancellationToken::new();
  let trigger = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("Interrupted, cancelling...");
      trigger.cancel();
    }
  });
  cancel
}

async fn resolve_target(target: &Target, cancel: &CancellationToken) -> Result<RuntimeArtifact> {
  let graph_content = tokio::fs::read_to_string(&target.graph)
    .await
    .with_context(|| format!("failed to read graph file: {}", target.graph.display()))?;

  let graph: TaskGraph = serde_json::from_str(&graph_content)
    .with_context(|| format!("failed to parse graph file: {}", target.graph.display()))?;

  for problem in graph.validate() {
    warn!(error = %problem, "graph_validation_failed");
  }

  let reader = JsonFileArtifactReader::new(&target.artifacts);
  let config = ResolverConfig {
    max_depth: target.max_depth,
  };
  let resolver = Resolver::with_config(reader, config);

  resolver
    .resolve(&graph, &target.task, &target.output, cancel)
    .await
    .with_context(|| format!("failed to resolve {}.{}", target.task, target.output))
}

async fn run_resolve(target: Target) -> Result<()> {
  let cancel = interrupt_token();
  let artifact = resolve_target(&target, &cancel).await?;
  println!("{}", serde_json::to_string_pretty(&artifact)?);
  Ok(())
}

async fn run_tag(
  target: Target,
  backend: Backend,
  extra_tags: Vec<String>,
  data_dir: PathBuf,
) -> Result<()> {
  let cancel = interrupt_token();

  let store: Arc<dyn ObjectStore> = match backend {
    Backend::S3 => Arc::new(S3Store::from_env().context("failed to configure s3 store")?),
    Backend::Fs => Arc::new(FsStore::new(data_dir.join("objects"))),
  };

  let artifact = resolve_target(&target, &cancel).await?;
  eprintln!("Resolved {}.{} to {}", target.task, target.output, artifact.uri);

  let mut tags = TagSet::lineage(&target.task, &target.output, &artifact);
  for raw in &extra_tags {
    let Some((key, value)) = raw.split_once('=') else {
      bail!("invalid tag '{}', expected KEY=VALUE", raw);
    };
    tags = tags.with(key, value);
  }

  let locator = ObjectLocator::from_uri(&artifact.uri)
    .with_context(|| format!("artifact uri '{}' does not name an object", artifact.uri))?;

  store
    .tag(&locator, &tags, &cancel)
    .await
    .with_context(|| format!("failed to tag {}", locator))?;

  eprintln!("Tagged {} with {} tags ({} backend)", locator, tags.len(), store.backend());
  println!("{}", serde_json::to_string_pretty(&tags)?);

  Ok(())
}
