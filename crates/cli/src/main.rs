use std::{
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod manifest;
mod serve;
mod versions;

use manifest::{LoadManifestError, Manifest};

#[derive(Clone, Debug)]
pub struct Context {
    pub manifest: Manifest,
}

impl Context {
    pub fn new(manifest: Manifest) -> Self {
        Context { manifest }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "MultiStripe - versioned Stripe webhook receiver", long_about = None)]
struct Opts {
    /// Path to the multistripe.yaml manifest file
    #[arg(
        long = "manifest-path",
        short = 'm',
        global = true,
        default_value = "./multistripe.yaml"
    )]
    manifest_path: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Receive webhooks for every enabled version
    Serve(serve::ServeCommand),
    /// List supported API versions
    Versions(versions::VersionsCommand),
}

#[tokio::main]
async fn main() {
    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            let _ = e.print();
            process::exit(e.exit_code());
        }
    };

    init_tracing();

    let manifest_dir = opts
        .manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    load_env_file(&manifest_dir);

    let manifest = match Manifest::load(&opts.manifest_path) {
        Ok(manifest) => {
            eprintln!("✓ Loaded manifest from {}", opts.manifest_path.display());
            manifest
        }
        Err(LoadManifestError::FileNotFound(_)) => Manifest::default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let ctx = Context::new(manifest);

    if let Err(e) = handle_command(opts.command, &ctx).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load environment variables from .env file in the manifest directory
fn load_env_file(manifest_dir: &Path) {
    let env_file_path = manifest_dir.join(".env");

    match dotenvy::from_path(&env_file_path) {
        Ok(_) => {
            eprintln!("✓ Loaded environment from {}", env_file_path.display());
        }
        Err(e) if e.not_found() => {}
        Err(e) => {
            eprintln!(
                "Warning: Failed to load .env file at {}: {}",
                env_file_path.display(),
                e
            );
        }
    }
}

async fn handle_command(command: Command, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Command::Serve(cmd) => cmd.execute(ctx).await,
        Command::Versions(cmd) => {
            cmd.execute(ctx);
            Ok(())
        }
    }
}
