//! # crd-storage CLI
//!
//! Command-line access to a key-value store held in a Kubernetes custom
//! resource object.
//!
//! ## Usage
//!
//! ```bash
//! # Provision the resource type, namespace and object
//! crd-storage --object my-service provision
//!
//! # Write, read and list keys
//! crd-storage --object my-service put /users/alice admin
//! crd-storage --object my-service get /users/alice
//! crd-storage --object my-service list /users
//!
//! # Remove a key
//! crd-storage --object my-service delete /users/alice
//! ```
//!
//! Every flag can also be supplied through the `CRD_STORAGE_*` environment
//! variables read by `StorageConfig::from_env`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crd_storage::observability::metrics;
use crd_storage::{Storage, StorageConfig};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::time::Duration;
use tracing::info;

/// Key-value storage in a Kubernetes custom resource
#[derive(Parser)]
#[command(name = "crd-storage", about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Name of the backing object
    #[arg(short, long, global = true)]
    object: Option<String>,

    /// Namespace of the backing object
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Resource type name, `<kind>.<group>`
    #[arg(long, global = true)]
    resource_name: Option<String>,

    /// Resource type version
    #[arg(long, global = true)]
    resource_version: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Kubernetes context to use
    #[arg(short, long, global = true)]
    context: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the resource type, namespace and backing object
    Provision,
    /// Store a value, replacing any previous one
    Put { key: String, value: String },
    /// Same as put
    Create { key: String, value: String },
    /// Print the value of a key
    Get { key: String },
    /// Print whether a key exists
    Exists { key: String },
    /// List keys at or below a prefix, relative to it
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Remove a key
    Delete { key: String },
    /// Run a command and print the collected metrics afterwards
    Metrics {
        /// Key prefix to list while collecting
        #[arg(default_value = "")]
        prefix: String,
    },
}

impl Cli {
    fn storage_config(&self) -> StorageConfig {
        let mut config = StorageConfig::from_env();
        if let Some(object) = &self.object {
            config.object.name.clone_from(object);
        }
        if let Some(namespace) = &self.namespace {
            config.object.namespace.clone_from(namespace);
        }
        if let Some(name) = &self.resource_name {
            config.resource_type.name.clone_from(name);
        }
        if let Some(version) = &self.resource_version {
            config.resource_type.version.clone_from(version);
        }
        if let Some(secs) = self.timeout {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        config
    }
}

async fn kube_client(context: Option<&str>) -> Result<Client> {
    let Some(context) = context else {
        return Client::try_default()
            .await
            .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.");
    };
    let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..KubeConfigOptions::default()
    };
    let config = Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context {context}"))?;
    Client::try_from(config).context("Failed to create Kubernetes client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crd_storage=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(
        "crd-storage {} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    metrics::register_metrics().context("Failed to register metrics")?;

    let client = kube_client(cli.context.as_deref()).await?;
    let storage = Storage::connect(client, cli.storage_config())
        .await
        .context("Failed to initialize storage")?;

    match cli.command {
        Commands::Provision => {
            println!("{}", storage.object_endpoint());
        }
        Commands::Put { key, value } => {
            storage.put(&key, &value).await?;
        }
        Commands::Create { key, value } => {
            storage.create(&key, &value).await?;
        }
        Commands::Get { key } => {
            println!("{}", storage.search(&key).await?);
        }
        Commands::Exists { key } => {
            println!("{}", storage.exists(&key).await?);
        }
        Commands::List { prefix } => {
            for key in storage.list(&prefix).await? {
                println!("{key}");
            }
        }
        Commands::Delete { key } => {
            storage.delete(&key).await?;
        }
        Commands::Metrics { prefix } => {
            storage.list(&prefix).await?;
            print!("{}", metrics::gather_text()?);
        }
    }

    Ok(())
}
