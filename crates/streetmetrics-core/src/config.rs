use crate::error::{Result, StreetmetricsError};
use crate::models::{Crs, DistanceUnit, RoadClass, SegmentSet, ValidityMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Which road classes the node estimator runs over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeClassScope {
    /// Every class, regardless of the clustering filter
    #[default]
    All,
    /// The same subset the clustering engine deduplicates
    Clustering,
    /// An explicit list of classes
    Classes(Vec<RoadClass>),
}

/// Resolved settings for the parallel-segment clustering engine
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSettings {
    /// Classes eligible for deduplication; everything else passes through
    pub classes: Vec<RoadClass>,
    /// Buffer radius in meters
    pub buffer_tolerance_m: f64,
    /// Maximum relative length difference between candidates (exclusive)
    pub length_tolerance: f64,
    pub crs: Crs,
    pub validity: ValidityMode,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            classes: RoadClass::major_roads(),
            buffer_tolerance_m: 15.0,
            length_tolerance: 0.4,
            crs: Crs::wgs84(),
            validity: ValidityMode::Lenient,
        }
    }
}

impl ClusterSettings {
    pub fn includes(&self, class: &RoadClass) -> bool {
        self.classes.contains(class)
    }
}

/// Resolved settings for the node/intersection estimator
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    /// Grid size endpoints are snapped to, in source coordinate units
    pub snap_precision: f64,
    pub scope: NodeClassScope,
    pub segment_set: SegmentSet,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self { snap_precision: 1e-6, scope: NodeClassScope::All, segment_set: SegmentSet::Raw }
    }
}

/// Everything the refresh pipeline needs, with precedence already applied
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub cluster: ClusterSettings,
    pub nodes: NodeSettings,
    /// Number of concurrent district workers in batch mode
    pub workers: usize,
    /// Per-district deadline; `None` disables cancellation
    pub district_timeout: Option<Duration>,
    pub display_unit: DistanceUnit,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            cluster: ClusterSettings::default(),
            nodes: NodeSettings::default(),
            workers: 4,
            district_timeout: None,
            display_unit: DistanceUnit::Kilometers,
        }
    }
}

/// Layered configuration for StreetMetrics
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub crs: ConfigValue<u32>,
    pub major_classes: ConfigValue<Vec<RoadClass>>,
    pub buffer_tolerance_m: ConfigValue<f64>,
    pub length_tolerance: ConfigValue<f64>,
    pub snap_precision: ConfigValue<f64>,
    pub node_class_scope: ConfigValue<NodeClassScope>,
    pub node_segment_set: ConfigValue<SegmentSet>,
    pub geometry_validity: ConfigValue<ValidityMode>,
    pub workers: ConfigValue<usize>,
    pub district_timeout_secs: ConfigValue<Option<u64>>,
    pub display_unit: ConfigValue<DistanceUnit>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        let defaults = RefreshSettings::default();
        Self {
            crs: ConfigValue::new(defaults.cluster.crs.epsg, ConfigSource::Default),
            major_classes: ConfigValue::new(defaults.cluster.classes, ConfigSource::Default),
            buffer_tolerance_m: ConfigValue::new(
                defaults.cluster.buffer_tolerance_m,
                ConfigSource::Default,
            ),
            length_tolerance: ConfigValue::new(
                defaults.cluster.length_tolerance,
                ConfigSource::Default,
            ),
            snap_precision: ConfigValue::new(defaults.nodes.snap_precision, ConfigSource::Default),
            node_class_scope: ConfigValue::new(defaults.nodes.scope, ConfigSource::Default),
            node_segment_set: ConfigValue::new(defaults.nodes.segment_set, ConfigSource::Default),
            geometry_validity: ConfigValue::new(defaults.cluster.validity, ConfigSource::Default),
            workers: ConfigValue::new(defaults.workers, ConfigSource::Default),
            district_timeout_secs: ConfigValue::new(None, ConfigSource::Default),
            display_unit: ConfigValue::new(defaults.display_unit, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| StreetmetricsError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| StreetmetricsError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(crs) = file_config.crs {
            self.crs.update(crs, ConfigSource::File);
        }

        if let Some(classes) = file_config.major_classes {
            let classes = classes.iter().map(RoadClass::new).collect();
            self.major_classes.update(classes, ConfigSource::File);
        }

        if let Some(tolerance) = file_config.buffer_tolerance_m {
            self.buffer_tolerance_m.update(tolerance, ConfigSource::File);
        }

        if let Some(tolerance) = file_config.length_tolerance {
            self.length_tolerance.update(tolerance, ConfigSource::File);
        }

        if let Some(precision) = file_config.snap_precision {
            self.snap_precision.update(precision, ConfigSource::File);
        }

        if let Some(scope) = file_config.node_class_scope {
            self.node_class_scope.update(parse_node_class_scope(&scope)?, ConfigSource::File);
        }

        if let Some(set) = file_config.node_segment_set {
            self.node_segment_set.update(parse_segment_set(&set)?, ConfigSource::File);
        }

        if let Some(validity) = file_config.geometry_validity {
            self.geometry_validity.update(validity, ConfigSource::File);
        }

        if let Some(workers) = file_config.workers {
            self.workers.update(workers, ConfigSource::File);
        }

        if let Some(timeout) = file_config.district_timeout_secs {
            self.district_timeout_secs.update(Some(timeout), ConfigSource::File);
        }

        if let Some(unit) = file_config.display_unit {
            self.display_unit.update(unit, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // STREETMETRICS_CRS
        if let Ok(crs_str) = env::var("STREETMETRICS_CRS") {
            match crs_str.parse::<u32>() {
                Ok(crs) => self.crs.update(crs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_CRS value '{}': expected integer EPSG code",
                    crs_str
                ),
            }
        }

        // STREETMETRICS_MAJOR_CLASSES
        if let Ok(classes) = env::var("STREETMETRICS_MAJOR_CLASSES") {
            self.major_classes.update(parse_class_list(&classes), ConfigSource::Environment);
        }

        // STREETMETRICS_BUFFER_TOLERANCE_M
        if let Ok(value) = env::var("STREETMETRICS_BUFFER_TOLERANCE_M") {
            match value.parse::<f64>() {
                Ok(tolerance) => self.buffer_tolerance_m.update(tolerance, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_BUFFER_TOLERANCE_M value '{}': expected meters",
                    value
                ),
            }
        }

        // STREETMETRICS_LENGTH_TOLERANCE
        if let Ok(value) = env::var("STREETMETRICS_LENGTH_TOLERANCE") {
            match value.parse::<f64>() {
                Ok(tolerance) => self.length_tolerance.update(tolerance, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_LENGTH_TOLERANCE value '{}': expected a ratio",
                    value
                ),
            }
        }

        // STREETMETRICS_NODE_CLASS_SCOPE
        if let Ok(value) = env::var("STREETMETRICS_NODE_CLASS_SCOPE") {
            match parse_node_class_scope(&value) {
                Ok(scope) => self.node_class_scope.update(scope, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_NODE_CLASS_SCOPE value '{}'",
                    value
                ),
            }
        }

        // STREETMETRICS_NODE_SEGMENT_SET
        if let Ok(value) = env::var("STREETMETRICS_NODE_SEGMENT_SET") {
            match parse_segment_set(&value) {
                Ok(set) => self.node_segment_set.update(set, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_NODE_SEGMENT_SET value '{}': expected raw or deduplicated",
                    value
                ),
            }
        }

        // STREETMETRICS_GEOMETRY_VALIDITY
        if let Ok(validity_str) = env::var("STREETMETRICS_GEOMETRY_VALIDITY") {
            match parse_validity_mode(&validity_str) {
                Ok(validity) => self.geometry_validity.update(validity, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_GEOMETRY_VALIDITY value '{}': expected strict or lenient",
                    validity_str
                ),
            }
        }

        // STREETMETRICS_WORKERS
        if let Ok(value) = env::var("STREETMETRICS_WORKERS") {
            match value.parse::<usize>() {
                Ok(workers) => self.workers.update(workers, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_WORKERS value '{}': expected a positive integer",
                    value
                ),
            }
        }

        // STREETMETRICS_DISTRICT_TIMEOUT_SECS
        if let Ok(value) = env::var("STREETMETRICS_DISTRICT_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) => self.district_timeout_secs.update(Some(secs), ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid STREETMETRICS_DISTRICT_TIMEOUT_SECS value '{}': expected seconds",
                    value
                ),
            }
        }

        // STREETMETRICS_DISPLAY_UNIT
        if let Ok(value) = env::var("STREETMETRICS_DISPLAY_UNIT") {
            match parse_distance_unit(&value) {
                Ok(unit) => self.display_unit.update(unit, ConfigSource::Environment),
                Err(_) => tracing::warn!("Invalid STREETMETRICS_DISPLAY_UNIT value '{}'", value),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(crs) = overrides.crs {
            self.crs.update(crs, ConfigSource::Cli);
        }

        if let Some(classes) = overrides.major_classes {
            self.major_classes.update(classes, ConfigSource::Cli);
        }

        if let Some(tolerance) = overrides.buffer_tolerance_m {
            self.buffer_tolerance_m.update(tolerance, ConfigSource::Cli);
        }

        if let Some(scope) = overrides.node_class_scope {
            self.node_class_scope.update(scope, ConfigSource::Cli);
        }

        if let Some(set) = overrides.node_segment_set {
            self.node_segment_set.update(set, ConfigSource::Cli);
        }

        if let Some(validity) = overrides.geometry_validity {
            self.geometry_validity.update(validity, ConfigSource::Cli);
        }

        if let Some(workers) = overrides.workers {
            self.workers.update(workers, ConfigSource::Cli);
        }

        if let Some(secs) = overrides.district_timeout_secs {
            self.district_timeout_secs.update(Some(secs), ConfigSource::Cli);
        }

        if let Some(unit) = overrides.display_unit {
            self.display_unit.update(unit, ConfigSource::Cli);
        }
    }

    /// Validate and flatten into the settings used by the pipeline
    pub fn resolve(&self) -> Result<RefreshSettings> {
        let tolerance = self.buffer_tolerance_m.value;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(StreetmetricsError::ConfigInvalid {
                key: "buffer_tolerance_m".to_string(),
                reason: format!("must be a positive distance, got {}", tolerance),
            });
        }

        let ratio = self.length_tolerance.value;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(StreetmetricsError::ConfigInvalid {
                key: "length_tolerance".to_string(),
                reason: format!("must be between 0 and 1 (exclusive), got {}", ratio),
            });
        }

        let precision = self.snap_precision.value;
        if !precision.is_finite() || precision <= 0.0 {
            return Err(StreetmetricsError::ConfigInvalid {
                key: "snap_precision".to_string(),
                reason: format!("must be positive, got {}", precision),
            });
        }

        let crs = Crs::from_epsg(self.crs.value);
        if !crs.is_supported() {
            return Err(StreetmetricsError::ConfigInvalid {
                key: "crs".to_string(),
                reason: format!(
                    "EPSG:{} is not supported, use a geographic CRS such as 4326 or Web Mercator (3857)",
                    self.crs.value
                ),
            });
        }

        if self.workers.value == 0 {
            return Err(StreetmetricsError::ConfigInvalid {
                key: "workers".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        Ok(RefreshSettings {
            cluster: ClusterSettings {
                classes: self.major_classes.value.clone(),
                buffer_tolerance_m: tolerance,
                length_tolerance: ratio,
                crs,
                validity: self.geometry_validity.value,
            },
            nodes: NodeSettings {
                snap_precision: precision,
                scope: self.node_class_scope.value.clone(),
                segment_set: self.node_segment_set.value,
            },
            workers: self.workers.value,
            district_timeout: self.district_timeout_secs.value.map(Duration::from_secs),
            display_unit: self.display_unit.value,
        })
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert("crs".to_string(), (format!("EPSG:{}", self.crs.value), self.crs.source));

        let classes: Vec<&str> = self.major_classes.value.iter().map(RoadClass::as_str).collect();
        map.insert("major_classes".to_string(), (classes.join(","), self.major_classes.source));

        map.insert(
            "buffer_tolerance_m".to_string(),
            (self.buffer_tolerance_m.value.to_string(), self.buffer_tolerance_m.source),
        );

        map.insert(
            "length_tolerance".to_string(),
            (self.length_tolerance.value.to_string(), self.length_tolerance.source),
        );

        map.insert(
            "snap_precision".to_string(),
            (self.snap_precision.value.to_string(), self.snap_precision.source),
        );

        map.insert(
            "node_class_scope".to_string(),
            (format!("{:?}", self.node_class_scope.value), self.node_class_scope.source),
        );

        map.insert(
            "node_segment_set".to_string(),
            (self.node_segment_set.value.to_string(), self.node_segment_set.source),
        );

        map.insert(
            "geometry_validity".to_string(),
            (format!("{:?}", self.geometry_validity.value), self.geometry_validity.source),
        );

        map.insert("workers".to_string(), (self.workers.value.to_string(), self.workers.source));

        map.insert(
            "district_timeout_secs".to_string(),
            (
                self.district_timeout_secs
                    .value
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                self.district_timeout_secs.source,
            ),
        );

        map.insert(
            "display_unit".to_string(),
            (self.display_unit.value.abbreviation().to_string(), self.display_unit.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    crs: Option<u32>,
    major_classes: Option<Vec<String>>,
    buffer_tolerance_m: Option<f64>,
    length_tolerance: Option<f64>,
    snap_precision: Option<f64>,
    node_class_scope: Option<String>,
    node_segment_set: Option<String>,
    geometry_validity: Option<ValidityMode>,
    workers: Option<usize>,
    district_timeout_secs: Option<u64>,
    display_unit: Option<DistanceUnit>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub crs: Option<u32>,
    pub major_classes: Option<Vec<RoadClass>>,
    pub buffer_tolerance_m: Option<f64>,
    pub node_class_scope: Option<NodeClassScope>,
    pub node_segment_set: Option<SegmentSet>,
    pub geometry_validity: Option<ValidityMode>,
    pub workers: Option<usize>,
    pub district_timeout_secs: Option<u64>,
    pub display_unit: Option<DistanceUnit>,
}

/// Parse a comma separated list of road classes
pub fn parse_class_list(s: &str) -> Vec<RoadClass> {
    s.split(',').map(str::trim).filter(|c| !c.is_empty()).map(RoadClass::new).collect()
}

/// Parse node class scope: `all`, `clustering`, or a comma separated class list
pub fn parse_node_class_scope(s: &str) -> Result<NodeClassScope> {
    match s.trim().to_lowercase().as_str() {
        "all" => Ok(NodeClassScope::All),
        "clustering" | "major" => Ok(NodeClassScope::Clustering),
        _ => {
            let classes = parse_class_list(s);
            if classes.is_empty() {
                return Err(StreetmetricsError::ConfigInvalid {
                    key: "node_class_scope".to_string(),
                    reason: format!(
                        "Invalid node class scope: {}. Use all, clustering, or a class list",
                        s
                    ),
                });
            }
            Ok(NodeClassScope::Classes(classes))
        }
    }
}

/// Parse segment set from string
pub fn parse_segment_set(s: &str) -> Result<SegmentSet> {
    match s.to_lowercase().as_str() {
        "raw" => Ok(SegmentSet::Raw),
        "deduplicated" | "dedup" => Ok(SegmentSet::Deduplicated),
        _ => Err(StreetmetricsError::ConfigInvalid {
            key: "node_segment_set".to_string(),
            reason: format!("Invalid segment set: {}. Use raw or deduplicated", s),
        }),
    }
}

/// Parse distance unit from string
pub fn parse_distance_unit(s: &str) -> Result<DistanceUnit> {
    match s.to_lowercase().as_str() {
        "m" | "meters" | "metres" => Ok(DistanceUnit::Meters),
        "km" | "kilometers" | "kilometres" => Ok(DistanceUnit::Kilometers),
        "mi" | "miles" => Ok(DistanceUnit::Miles),
        "ft" | "feet" => Ok(DistanceUnit::Feet),
        _ => Err(StreetmetricsError::ConfigInvalid {
            key: "display_unit".to_string(),
            reason: format!("Invalid distance unit: {}. Use m, km, mi or ft", s),
        }),
    }
}

/// Parse validity mode from string
pub fn parse_validity_mode(s: &str) -> Result<ValidityMode> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(ValidityMode::Strict),
        "lenient" => Ok(ValidityMode::Lenient),
        _ => Err(StreetmetricsError::ConfigInvalid {
            key: "geometry_validity".to_string(),
            reason: format!("Invalid validity mode: {}. Use strict or lenient", s),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LayeredConfig::with_defaults();
        assert_eq!(config.crs.value, 4326);
        assert_eq!(config.crs.source, ConfigSource::Default);
        assert_eq!(config.buffer_tolerance_m.value, 15.0);
        assert_eq!(config.node_class_scope.value, NodeClassScope::All);

        let settings = config.resolve().unwrap();
        assert_eq!(settings, RefreshSettings::default());
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
crs = 3857
major_classes = ["primary", "Secondary"]
buffer_tolerance_m = 20.0
node_class_scope = "clustering"
node_segment_set = "deduplicated"
geometry_validity = "Strict"
workers = 8
district_timeout_secs = 120
"#
        )
        .unwrap();

        let config = LayeredConfig::with_defaults().load_from_file(file.path()).unwrap();

        assert_eq!(config.crs.value, 3857);
        assert_eq!(config.crs.source, ConfigSource::File);
        assert_eq!(
            config.major_classes.value,
            vec![RoadClass::new("primary"), RoadClass::new("secondary")]
        );
        assert_eq!(config.node_class_scope.value, NodeClassScope::Clustering);
        assert_eq!(config.node_segment_set.value, SegmentSet::Deduplicated);
        assert_eq!(config.geometry_validity.value, ValidityMode::Strict);

        let settings = config.resolve().unwrap();
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.district_timeout, Some(Duration::from_secs(120)));
        assert!(!settings.cluster.crs.is_geographic());
        assert!(settings.cluster.crs.is_web_mercator());
    }

    #[test]
    fn test_unsupported_crs_rejected() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides { crs: Some(32748), ..Default::default() });

        match config.resolve() {
            Err(StreetmetricsError::ConfigInvalid { key, .. }) => assert_eq!(key, "crs"),
            other => panic!("expected invalid crs, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = LayeredConfig::with_defaults();

        config.update_from_cli(CliConfigOverrides {
            workers: Some(2),
            geometry_validity: Some(ValidityMode::Strict),
            ..Default::default()
        });

        assert_eq!(config.workers.value, 2);
        assert_eq!(config.workers.source, ConfigSource::Cli);
        assert_eq!(config.geometry_validity.value, ValidityMode::Strict);
        assert_eq!(config.buffer_tolerance_m.source, ConfigSource::Default);
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        let mut config = LayeredConfig::with_defaults();
        config.length_tolerance.update(1.5, ConfigSource::Cli);
        assert!(config.resolve().is_err());

        let mut config = LayeredConfig::with_defaults();
        config.workers.update(0, ConfigSource::Cli);
        assert!(config.resolve().is_err());

        let mut config = LayeredConfig::with_defaults();
        config.buffer_tolerance_m.update(-1.0, ConfigSource::Cli);
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_parse_node_class_scope() {
        assert_eq!(parse_node_class_scope("all").unwrap(), NodeClassScope::All);
        assert_eq!(parse_node_class_scope("Clustering").unwrap(), NodeClassScope::Clustering);
        assert_eq!(
            parse_node_class_scope("primary, residential").unwrap(),
            NodeClassScope::Classes(vec![RoadClass::new("primary"), RoadClass::new("residential")])
        );
        assert!(parse_node_class_scope(" , ").is_err());
    }

    #[test]
    fn test_parse_segment_set_and_validity() {
        assert_eq!(parse_segment_set("RAW").unwrap(), SegmentSet::Raw);
        assert_eq!(parse_segment_set("dedup").unwrap(), SegmentSet::Deduplicated);
        assert!(parse_segment_set("both").is_err());
        assert_eq!(parse_validity_mode("strict").unwrap(), ValidityMode::Strict);
        assert!(parse_validity_mode("invalid").is_err());
    }

    #[test]
    fn test_parse_distance_unit() {
        assert_eq!(parse_distance_unit("KM").unwrap(), DistanceUnit::Kilometers);
        assert_eq!(parse_distance_unit("miles").unwrap(), DistanceUnit::Miles);
        assert!(parse_distance_unit("furlongs").is_err());
    }
}
