//! Inspect command implementation

use crate::cli::{InspectArgs, InspectTarget};
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::{
    ConfigValue, GroupInfo, InspectConfigOutput, InspectDistrictOutput, InspectLogOutput,
};
use crate::storage::Storage;
use anyhow::Result;
use streetmetrics_core::config::{LayeredConfig, RefreshSettings};
use streetmetrics_core::models::DistrictId;
use streetmetrics_refresh::budget_inputs;
use tabled::Tabled;

pub async fn execute(
    args: InspectArgs,
    config: &LayeredConfig,
    storage: &Storage,
    settings: &RefreshSettings,
    output: &OutputWriter,
) -> Result<()> {
    match args.target {
        InspectTarget::Config => inspect_config(config, output),
        InspectTarget::District { id } => inspect_district(id, storage, settings, output).await,
        InspectTarget::Log { district, limit } => {
            inspect_log(district, limit, storage, output).await
        }
    }
}

/// Inspect configuration
pub fn inspect_config(config: &LayeredConfig, output: &OutputWriter) -> Result<()> {
    let inspection_map = config.to_inspection_map();

    if output.is_json() {
        let values = inspection_map
            .into_iter()
            .map(|(key, (value, source))| {
                (key, ConfigValue { value, source: format!("{:?}", source) })
            })
            .collect();
        return output.result(InspectConfigOutput { values });
    }

    output.section("Configuration Values");

    #[derive(Tabled)]
    struct ConfigRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let mut rows: Vec<ConfigRow> = inspection_map
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    output.table(rows);

    output.section("Configuration Precedence");
    output.info("CLI arguments > Environment variables > Config file > Defaults");
    Ok(())
}

async fn inspect_district(
    id: u64,
    storage: &Storage,
    settings: &RefreshSettings,
    output: &OutputWriter,
) -> Result<()> {
    let store = storage.store.as_ref();
    let district_id = DistrictId(id);
    let district = store
        .get_district(district_id)
        .await?
        .ok_or_else(|| errors::district_not_found(id))?;

    let report = InspectDistrictOutput {
        district_id,
        name: district.name.clone(),
        generation: store.published_generation(district_id).await?,
        rollups: store.rollups(district_id).await?,
        nodes: store.node_summary(district_id).await?,
        budget: budget_inputs(store, district_id).await?,
        groups: store.dedup_groups(district_id).await?.iter().map(GroupInfo::from).collect(),
    };

    if output.is_json() {
        return output.result(report);
    }

    let unit = settings.display_unit;
    output.section(format!("District {}", district_id));
    output.kv("Name", &report.name);
    output.kv("Active", district.active);
    output.kv(
        "Area",
        district.area_sq_km.map_or("unknown".to_string(), |a| format!("{:.3} km²", a)),
    );
    output.kv("Source version", &district.source_version);
    output.kv(
        "Published generation",
        report.generation.map_or("none".to_string(), |g| g.to_string()),
    );

    if report.rollups.is_empty() {
        output.info("No published results. Run 'streetmetrics refresh' first.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct RollupRow {
        #[tabled(rename = "Set")]
        set: String,
        #[tabled(rename = "Count")]
        count: u64,
        #[tabled(rename = "Length")]
        length: String,
        #[tabled(rename = "Count / km²")]
        count_density: String,
        #[tabled(rename = "km / km²")]
        length_density: String,
    }

    let density = |d: Option<f64>| d.map_or("-".to_string(), |v| format!("{:.3}", v));
    let rows: Vec<RollupRow> = report
        .rollups
        .iter()
        .map(|r| RollupRow {
            set: r.calculation_type.to_string(),
            count: r.total_count,
            length: format!("{:.2} {}", unit.from_meters(r.total_length_m), unit.abbreviation()),
            count_density: density(r.count_density),
            length_density: density(r.length_density),
        })
        .collect();

    output.section("Rollups");
    output.table(rows);

    if let Some(nodes) = &report.nodes {
        output.section(format!("Nodes ({} segments)", nodes.segment_set));
        output.kv("Nodes", nodes.node_count);
        output.kv("Intersections", nodes.intersection_count);
        output.kv("Through nodes", nodes.through_count);
        output.kv("Dead ends", nodes.dead_end_count);
    }

    #[derive(Tabled)]
    struct GroupRow {
        #[tabled(rename = "Group")]
        id: u64,
        #[tabled(rename = "Class")]
        class: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Members")]
        members: usize,
        #[tabled(rename = "Length")]
        length: String,
    }

    let rows: Vec<GroupRow> = report
        .groups
        .iter()
        .filter(|g| g.member_count > 1)
        .map(|g| GroupRow {
            id: g.id,
            class: g.class.clone(),
            name: g.name.clone().unwrap_or_default(),
            members: g.member_count,
            length: format!("{:.2} {}", unit.from_meters(g.length_m), unit.abbreviation()),
        })
        .collect();

    output.section("Merged Groups");
    output.table(rows);
    Ok(())
}

async fn inspect_log(
    district: Option<u64>,
    limit: usize,
    storage: &Storage,
    output: &OutputWriter,
) -> Result<()> {
    let mut entries = storage.store.refresh_log(district.map(DistrictId)).await?;
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);

    if output.is_json() {
        return output.result(InspectLogOutput { entries });
    }

    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "ID")]
        id: u64,
        #[tabled(rename = "Run")]
        run: String,
        #[tabled(rename = "District")]
        district: String,
        #[tabled(rename = "Operation")]
        operation: String,
        #[tabled(rename = "Records")]
        records: i64,
        #[tabled(rename = "Duration")]
        duration: String,
        #[tabled(rename = "Result")]
        result: String,
    }

    let rows: Vec<LogRow> = entries
        .into_iter()
        .map(|e| LogRow {
            id: e.id,
            run: e.run_id.to_string().chars().take(8).collect(),
            district: e.district_id.map_or("-".to_string(), |d| d.to_string()),
            operation: e.operation.to_string(),
            records: e.records_processed,
            duration: format!("{} ms", e.duration_ms),
            result: if e.success { "ok".to_string() } else { e.error.unwrap_or_default() },
        })
        .collect();

    output.section("Refresh Log");
    output.table(rows);
    Ok(())
}
