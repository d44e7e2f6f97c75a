use std::path::PathBuf;

use anyhow::{Context, Result};

pub mod config;
pub mod invalidate;
pub mod status;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}
