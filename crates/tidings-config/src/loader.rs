// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tidings.toml` > `~/.config/tidings/tidings.toml`
//! > `/etc/tidings/tidings.toml` with environment variable overrides via the
//! `TIDINGS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TidingsConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tidings/tidings.toml` (system-wide)
/// 3. `~/.config/tidings/tidings.toml` (user XDG config)
/// 4. `./tidings.toml` (local directory)
/// 5. `TIDINGS_*` environment variables
pub fn load_config() -> Result<TidingsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidingsConfig::default()))
        .merge(Toml::file("/etc/tidings/tidings.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tidings/tidings.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tidings.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<TidingsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidingsConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TidingsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TidingsConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `TIDINGS_BUDGET_DAILY_CAP_USD` must map
/// to `budget.daily_cap_usd`, not `budget.daily.cap.usd`.
fn env_provider() -> Env {
    Env::prefixed("TIDINGS_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("scoring_", "scoring.", 1)
            .replacen("pipeline_", "pipeline.", 1)
            .replacen("coalesce_", "coalesce.", 1)
            .replacen("budget_", "budget.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("runner_", "runner.", 1);
        mapped.into()
    })
}
