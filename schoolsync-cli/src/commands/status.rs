//! `schoolsync status` — refresh-key staleness visibility.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use schoolsync_core::{config, SyncConfig};
use schoolsync_sync::{
    repositories::{
        attendance, attendance_summary, conference, exam, grade, homework, lucky_number, message,
        note, school_announcement, subject, teacher, timetable,
    },
    staleness::{format_datetime_age, format_millis, is_stale},
    JsonTimestampStore, TimestampStore,
};

const KNOWN_FEATURES: [&str; 13] = [
    grade::CACHE_KEY,
    exam::CACHE_KEY,
    attendance::CACHE_KEY,
    attendance_summary::CACHE_KEY,
    message::CACHE_KEY,
    school_announcement::CACHE_KEY,
    lucky_number::CACHE_KEY,
    teacher::CACHE_KEY,
    timetable::CACHE_KEY,
    homework::CACHE_KEY,
    note::CACHE_KEY,
    conference::CACHE_KEY,
    subject::CACHE_KEY,
];

/// Arguments for `schoolsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show keys starting with this prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home_dir()?;
        let config = config::load_at(&home).context("failed to load config")?;

        let report = build_report(&home, &config, self.prefix.as_deref())?;
        if self.json {
            print_json(report)?;
            return Ok(());
        }

        print_table(report);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct KeyStatus {
    key: String,
    feature: String,
    last_refresh: String,
    age: String,
    stale: bool,
}

#[derive(Debug, Clone)]
struct StatusReport {
    interval_minutes: u64,
    stale_count: usize,
    keys: Vec<KeyStatus>,
}

#[derive(Serialize)]
struct StatusReportJson {
    summary: StatusSummaryJson,
    keys: Vec<KeyStatusJson>,
}

#[derive(Serialize)]
struct StatusSummaryJson {
    keys: usize,
    stale: usize,
    interval_minutes: u64,
}

#[derive(Serialize)]
struct KeyStatusJson {
    key: String,
    feature: String,
    status: String,
    last_refresh: String,
    age: String,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "feature")]
    feature: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "last refresh")]
    last_refresh: String,
    #[tabled(rename = "age")]
    age: String,
}

fn build_report(home: &Path, config: &SyncConfig, prefix: Option<&str>) -> Result<StatusReport> {
    let store = JsonTimestampStore::open_at(home).context("failed to open refresh store")?;
    let now = Utc::now().timestamp_millis();
    let interval = config.services_interval();

    let keys: Vec<KeyStatus> = store
        .entries()
        .into_iter()
        .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
        .map(|(key, millis)| KeyStatus {
            feature: feature_of(&key).to_string(),
            last_refresh: format_millis(millis),
            age: age_of(millis),
            stale: is_stale(millis, now, interval),
            key,
        })
        .collect();

    Ok(StatusReport {
        interval_minutes: config.services_interval_minutes,
        stale_count: keys.iter().filter(|k| k.stale).count(),
        keys,
    })
}

/// Longest known feature name the key is derived from, `-` for foreign keys.
fn feature_of(key: &str) -> &'static str {
    KNOWN_FEATURES
        .iter()
        .filter(|feature| {
            key.strip_prefix(**feature)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
        })
        .max_by_key(|feature| feature.len())
        .copied()
        .unwrap_or("-")
}

fn age_of(millis: i64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| "?".to_string(), format_datetime_age)
}

fn status_key(stale: bool) -> &'static str {
    if stale {
        "stale"
    } else {
        "fresh"
    }
}

fn print_json(report: StatusReport) -> Result<()> {
    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            keys: report.keys.len(),
            stale: report.stale_count,
            interval_minutes: report.interval_minutes,
        },
        keys: report
            .keys
            .into_iter()
            .map(|row| KeyStatusJson {
                status: status_key(row.stale).to_string(),
                key: row.key,
                feature: row.feature,
                last_refresh: row.last_refresh,
                age: row.age,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: StatusReport) {
    println!(
        "schoolsync v{} | {} keys | {} stale | interval {}m",
        env!("CARGO_PKG_VERSION"),
        report.keys.len(),
        report.stale_count,
        report.interval_minutes,
    );

    if report.keys.is_empty() {
        println!("No refresh timestamps recorded.");
        return;
    }

    let rows: Vec<StatusTableRow> = report
        .keys
        .into_iter()
        .map(|row| StatusTableRow {
            status: status_label(row.stale),
            key: row.key,
            feature: row.feature,
            last_refresh: row.last_refresh,
            age: row.age,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if report.stale_count > 0 {
        println!("Stale keys refetch on next access; run 'schoolsync invalidate' to force it.");
    }
}

fn status_label(stale: bool) -> String {
    if stale {
        "STALE".yellow().bold().to_string()
    } else {
        "FRESH".green().bold().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_is_the_longest_matching_cache_key() {
        assert_eq!(feature_of("grade_100_7"), "grade");
        assert_eq!(
            feature_of("school_announcement_3"),
            "school_announcement"
        );
        assert_eq!(feature_of("lucky_number_3"), "lucky_number");
        assert_eq!(feature_of("teachers_100_7"), "teachers");
        assert_eq!(feature_of("attendance_100_7_2024-03-11_2024-03-17"), "attendance");
        assert_eq!(
            feature_of("attendance_summary_100_7_-1"),
            "attendance_summary"
        );
        assert_eq!(feature_of("timetable_100_7_2024-03-11_2024-03-17"), "timetable");
        assert_eq!(feature_of("gradebook_1"), "-");
        assert_eq!(feature_of("unknown"), "-");
    }

    #[test]
    fn unseen_timestamp_has_no_age() {
        assert_eq!(age_of(0), "never");
    }
}
