//! Cluster CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::Cluster;
use crate::domain::ports::ClusterStore;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{DatabaseConnection, SqliteClusterStore};

#[derive(Args, Debug)]
pub struct ClusterArgs {
    #[command(subcommand)]
    pub command: ClusterCommands,
}

#[derive(Subcommand, Debug)]
pub enum ClusterCommands {
    /// Register a new cluster
    Add(AddArgs),
    /// List registered clusters and their upgrade status
    List,
    /// Show cluster details
    Show {
        /// Cluster id or name
        cluster: String,
    },
    /// Remove a cluster
    Remove {
        /// Cluster id or name
        cluster: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Cluster name
    #[arg(long, required_unless_present = "from_file")]
    pub name: Option<String>,

    /// Main sensor image reference (e.g. "registry.example/main:4.4.0")
    #[arg(long, required_unless_present = "from_file")]
    pub main_image: Option<String>,

    /// Central endpoint advertised to the cluster
    #[arg(long, required_unless_present = "from_file")]
    pub central_endpoint: Option<String>,

    /// Disable automatic upgrades for this cluster
    #[arg(long)]
    pub no_auto_upgrade: bool,

    /// Read cluster definition from a YAML file
    #[arg(long, value_name = "FILE", conflicts_with_all = ["name", "main_image", "central_endpoint"])]
    pub from_file: Option<PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
struct ClusterFile {
    name: String,
    main_image: String,
    central_endpoint: String,
    #[serde(default = "default_true")]
    auto_upgrade_enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, serde::Serialize)]
pub struct AddOutput {
    pub success: bool,
    pub message: String,
    pub cluster_id: String,
}

impl CommandOutput for AddOutput {
    fn to_human(&self) -> String {
        format!(
            "{} {}\nID: {}",
            console::style("✓").green().bold(),
            self.message,
            self.cluster_id
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ListOutput {
    pub clusters: Vec<Cluster>,
    pub total: usize,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        if self.clusters.is_empty() {
            return "No clusters registered.".to_string();
        }
        TableFormatter::new().format_clusters(&self.clusters)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ShowOutput {
    pub cluster: Cluster,
}

impl CommandOutput for ShowOutput {
    fn to_human(&self) -> String {
        let c = &self.cluster;
        let mut lines = vec![
            format!("Cluster: {}", c.name),
            format!("ID: {}", c.id),
            format!("Main Image: {}", c.main_image),
            format!("Central Endpoint: {}", c.central_endpoint),
            format!(
                "Auto-Upgrade: {}",
                if c.auto_upgrade_enabled { "enabled" } else { "disabled" }
            ),
            format!("Created: {}", c.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ];

        if let Some(status) = &c.upgrade_status {
            lines.push(format!("\nUpgradability: {}", status.upgradability));
            if let Some(reason) = &status.upgradability_reason {
                lines.push(format!("Reason: {}", reason));
            }
            if let Some(process) = &status.most_recent_process {
                lines.push(format!("\nLast Process: {}", process.id));
                lines.push(format!("  Type: {}", process.process_type));
                lines.push(format!("  Target: {}", process.target_version));
                lines.push(format!("  State: {}", process.state));
                lines.push(format!(
                    "  Active: {}",
                    if process.active { "yes" } else { "no" }
                ));
                lines.push(format!(
                    "  Initiated: {}",
                    process.initiated_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
                if let Some(detail) = &process.status_detail {
                    lines.push(format!("  Detail: {}", detail));
                }
            }
        } else {
            lines.push("\nNo upgrade status recorded yet.".to_string());
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RemoveOutput {
    pub success: bool,
    pub message: String,
}

impl CommandOutput for RemoveOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ClusterArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;

    let db_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&db_url, config.database.max_connections)
        .await
        .context("Failed to open database. Run 'argus init' first.")?;
    let store = SqliteClusterStore::new(db.pool().clone());
    store
        .init_schema()
        .await
        .context("Failed to prepare database schema")?;

    let result = match args.command {
        ClusterCommands::Add(add_args) => add_cluster(&store, add_args, json_mode).await,
        ClusterCommands::List => list_clusters(&store, json_mode).await,
        ClusterCommands::Show { cluster } => show_cluster(&store, &cluster, json_mode).await,
        ClusterCommands::Remove { cluster } => remove_cluster(&store, &cluster, json_mode).await,
    };

    db.close().await;
    result
}

async fn add_cluster(store: &SqliteClusterStore, args: AddArgs, json_mode: bool) -> Result<()> {
    let (name, main_image, central_endpoint, auto_upgrade) =
        if let Some(path) = &args.from_file {
            let contents = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file: ClusterFile = serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            (
                file.name,
                file.main_image,
                file.central_endpoint,
                file.auto_upgrade_enabled,
            )
        } else {
            (
                args.name.context("--name is required")?,
                args.main_image.context("--main-image is required")?,
                args.central_endpoint.context("--central-endpoint is required")?,
                !args.no_auto_upgrade,
            )
        };

    if store.find_cluster_by_name(&name).await?.is_some() {
        bail!("A cluster named '{}' already exists", name);
    }

    let cluster =
        Cluster::new(&name, &main_image, &central_endpoint).with_auto_upgrade(auto_upgrade);
    store.insert_cluster(&cluster).await?;

    let out = AddOutput {
        success: true,
        message: format!("Cluster '{}' registered", cluster.name),
        cluster_id: cluster.id,
    };
    output(&out, json_mode);
    Ok(())
}

async fn list_clusters(store: &SqliteClusterStore, json_mode: bool) -> Result<()> {
    let clusters = store.list_clusters().await?;
    let out = ListOutput {
        total: clusters.len(),
        clusters,
    };
    output(&out, json_mode);
    Ok(())
}

async fn show_cluster(store: &SqliteClusterStore, key: &str, json_mode: bool) -> Result<()> {
    let cluster = resolve(store, key).await?;
    output(&ShowOutput { cluster }, json_mode);
    Ok(())
}

async fn remove_cluster(store: &SqliteClusterStore, key: &str, json_mode: bool) -> Result<()> {
    let cluster = resolve(store, key).await?;
    store.remove_cluster(&cluster.id).await?;
    let out = RemoveOutput {
        success: true,
        message: format!("Cluster '{}' removed", cluster.name),
    };
    output(&out, json_mode);
    Ok(())
}

async fn resolve(store: &SqliteClusterStore, key: &str) -> Result<Cluster> {
    if let Some(cluster) = store.get_cluster(key).await? {
        return Ok(cluster);
    }
    if let Some(cluster) = store.find_cluster_by_name(key).await? {
        return Ok(cluster);
    }
    bail!("No cluster with id or name '{}'", key)
}
