//! `schoolsync invalidate` — drop refresh timestamps.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use schoolsync_sync::{JsonTimestampStore, TimestampStore};

/// Arguments for `schoolsync invalidate`.
#[derive(Args, Debug)]
pub struct InvalidateArgs {
    /// Drop keys starting with this prefix, e.g. `grade_` or `exam_100_`.
    #[arg(long, required_unless_present = "all", conflicts_with = "all")]
    pub prefix: Option<String>,

    /// Drop every recorded key.
    #[arg(long)]
    pub all: bool,
}

impl InvalidateArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let store = JsonTimestampStore::open_at(&home).context("failed to open refresh store")?;

        let prefix = if self.all {
            ""
        } else {
            self.prefix.as_deref().unwrap_or_default()
        };
        let removed = store
            .remove_matching(prefix)
            .with_context(|| format!("failed to update {}", store.path().display()))?;

        print_summary(removed, prefix);
        Ok(())
    }
}

fn print_summary(removed: usize, prefix: &str) {
    let scope = if prefix.is_empty() {
        "all keys".to_string()
    } else {
        format!("prefix '{prefix}'")
    };
    println!(
        "{} {removed} refresh timestamp(s) ({scope})",
        "Invalidated".green().bold()
    );
}
