//! Configuration loading utilities for CLI commands

use crate::cli::OverrideArgs;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use streetmetrics_core::config::{
    parse_class_list, parse_distance_unit, parse_node_class_scope, parse_segment_set,
    parse_validity_mode, CliConfigOverrides, LayeredConfig,
};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "streetmetrics.toml";

/// Load layered configuration: defaults, then file, then environment
pub fn load_config(explicit: Option<&Path>) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    if let Some(path) = path {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }

    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_config_with_overrides(
    explicit: Option<&Path>,
    args: &OverrideArgs,
) -> Result<LayeredConfig> {
    let mut config = load_config(explicit)?;
    config.update_from_cli(to_overrides(args)?);
    Ok(config)
}

/// Parse CLI override flags into typed overrides
pub fn to_overrides(args: &OverrideArgs) -> Result<CliConfigOverrides> {
    Ok(CliConfigOverrides {
        crs: args.crs,
        major_classes: args.major_classes.as_deref().map(parse_class_list),
        buffer_tolerance_m: args.buffer_tolerance,
        node_class_scope: args.node_scope.as_deref().map(parse_node_class_scope).transpose()?,
        node_segment_set: args.node_segment_set.as_deref().map(parse_segment_set).transpose()?,
        geometry_validity: args.validity.as_deref().map(parse_validity_mode).transpose()?,
        workers: args.workers,
        district_timeout_secs: args.timeout,
        display_unit: args.unit.as_deref().map(parse_distance_unit).transpose()?,
    })
}
