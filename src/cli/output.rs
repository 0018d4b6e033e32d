//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{Cluster, Upgradability, UpgradeState};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum length, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: console::colors_enabled(),
        }
    }

    /// Create a new table formatter with explicit color settings
    pub fn with_config(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format a list of clusters as a table
    pub fn format_clusters(&self, clusters: &[Cluster]) -> String {
        let mut table = create_base_table();

        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Main Image").add_attribute(Attribute::Bold),
            Cell::new("Auto-Upgrade").add_attribute(Attribute::Bold),
            Cell::new("Upgradability").add_attribute(Attribute::Bold),
            Cell::new("Last Process").add_attribute(Attribute::Bold),
        ]);

        for cluster in clusters {
            let id_short = truncate(&cluster.id, 12);
            let auto_upgrade = if cluster.auto_upgrade_enabled {
                "enabled"
            } else {
                "disabled"
            };

            let upgradability = cluster
                .upgrade_status
                .as_ref()
                .map_or(Upgradability::Unknown, |s| s.upgradability);
            let upgradability_cell = if self.use_colors {
                Cell::new(upgradability.as_str()).fg(upgradability_color(upgradability))
            } else {
                Cell::new(upgradability.as_str())
            };

            let process = cluster
                .upgrade_status
                .as_ref()
                .and_then(|s| s.most_recent_process.as_ref());
            let process_cell = match process {
                Some(p) => {
                    let text = format!("{} -> {} ({})", p.process_type, p.target_version, p.state);
                    if self.use_colors {
                        Cell::new(text).fg(state_color(p.state))
                    } else {
                        Cell::new(text)
                    }
                }
                None => Cell::new("-"),
            };

            table.add_row(vec![
                Cell::new(id_short),
                Cell::new(&cluster.name),
                Cell::new(truncate(&cluster.main_image, 40)),
                Cell::new(auto_upgrade),
                upgradability_cell,
                process_cell,
            ]);
        }

        table.to_string()
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn create_base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn upgradability_color(upgradability: Upgradability) -> Color {
    match upgradability {
        Upgradability::UpToDate => Color::Green,
        Upgradability::AutoUpgradePossible => Color::Cyan,
        Upgradability::SensorVersionHigher => Color::Yellow,
        Upgradability::ManualUpgradeRequired => Color::Red,
        Upgradability::Unknown => Color::Grey,
    }
}

fn state_color(state: UpgradeState) -> Color {
    if state == UpgradeState::UpgradeComplete {
        Color::Green
    } else if state.is_failure() {
        Color::Red
    } else {
        Color::Yellow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ClusterUpgradeStatus, UpgradeProcess, UpgradeProcessType};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long image reference", 10), "a long ...");
    }

    #[test]
    fn test_format_clusters_includes_process_summary() {
        let mut cluster = Cluster::new(
            "production",
            "registry.example/main:4.4.0",
            "central.example:443",
        );
        cluster.upgrade_status = Some(ClusterUpgradeStatus {
            upgradability: Upgradability::AutoUpgradePossible,
            upgradability_reason: None,
            most_recent_process: Some(UpgradeProcess::new(
                UpgradeProcessType::Upgrade,
                "4.5.1",
                "registry.example/main:4.5.1",
            )),
        });

        let rendered = TableFormatter::with_config(false).format_clusters(&[cluster]);
        assert!(rendered.contains("production"));
        assert!(rendered.contains("auto_upgrade_possible"));
        assert!(rendered.contains("4.5.1"));
        assert!(rendered.contains("upgrade_trigger_sent"));
    }

    #[test]
    fn test_format_clusters_without_status() {
        let cluster = Cluster::new("bare", "registry.example/main:4.4.0", "central.example:443");
        let rendered = TableFormatter::with_config(false).format_clusters(&[cluster]);
        assert!(rendered.contains("bare"));
        assert!(rendered.contains("unknown"));
    }
}
