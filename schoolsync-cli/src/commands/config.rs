//! `schoolsync config` — show and update `~/.schoolsync/config.yaml`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use schoolsync_core::{config, paths, SyncConfig};

/// Arguments for `schoolsync config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Minutes after which cached data is refetched.
    #[arg(long)]
    pub interval_minutes: Option<u64>,

    /// Whether background sync raises notifications.
    #[arg(long)]
    pub notifications: Option<bool>,

    /// Probability (0..=1) that a sync run cross-checks every account of a group.
    #[arg(long)]
    pub verification_rate: Option<f64>,

    /// Upper bound of works a sync run executes at once.
    #[arg(long)]
    pub max_concurrent_works: Option<usize>,
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "setting")]
    setting: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let mut current = config::load_at(&home).context("failed to load config")?;

        if self.apply(&mut current) {
            config::save_at(&home, &current).context("failed to save config")?;
            if !self.json {
                println!(
                    "{} {}",
                    "Saved".green().bold(),
                    paths::config_path(&home).display()
                );
            }
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&current)
                    .context("failed to serialize config JSON")?
            );
            return Ok(());
        }

        print_table(&current);
        Ok(())
    }

    /// Copy every given setter into `config`; `true` when anything was set.
    fn apply(&self, config: &mut SyncConfig) -> bool {
        let mut changed = false;
        if let Some(minutes) = self.interval_minutes {
            config.services_interval_minutes = minutes;
            changed = true;
        }
        if let Some(enabled) = self.notifications {
            config.notifications_enabled = enabled;
            changed = true;
        }
        if let Some(rate) = self.verification_rate {
            config.verification_rate = rate;
            changed = true;
        }
        if let Some(max) = self.max_concurrent_works {
            config.max_concurrent_works = max;
            changed = true;
        }
        changed
    }
}

fn print_table(config: &SyncConfig) {
    let rows = vec![
        ConfigRow {
            setting: "services_interval_minutes",
            value: config.services_interval_minutes.to_string(),
        },
        ConfigRow {
            setting: "notifications_enabled",
            value: config.notifications_enabled.to_string(),
        },
        ConfigRow {
            setting: "verification_rate",
            value: config.verification_rate.to_string(),
        },
        ConfigRow {
            setting: "max_concurrent_works",
            value: config.max_concurrent_works.to_string(),
        },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
