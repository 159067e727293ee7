use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stagefs::config::Config;
use stagefs::Tree;

/// Stage a directory in memory and show what a tree over it contains.
#[derive(Debug, Parser)]
#[command(name = "stagefs", version)]
struct Args {
    /// Directory to snapshot.
    root: PathBuf,

    /// Print the action log as JSON instead of the file list.
    #[arg(long, env = "STAGEFS_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(root = %args.root.display(), "Starting stagefs");

    let backend = stagefs::backend::capture(&args.root, &config.snapshot.ignore)
        .await
        .with_context(|| format!("failed to snapshot {}", args.root.display()))?;
    let tree = Tree::with_options(Arc::new(backend), config.tree_options());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree.actions())?);
        return Ok(());
    }

    tree.visit(|file| {
        println!("{:>10}  {}", file.content().len(), file.path());
        Ok(())
    })?;

    Ok(())
}
