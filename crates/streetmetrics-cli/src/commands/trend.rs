//! Trend command implementation

use crate::cli::TrendArgs;
use crate::output::OutputWriter;
use crate::output_types::TrendOutput;
use crate::storage::Storage;
use anyhow::Result;
use streetmetrics_core::config::{parse_segment_set, RefreshSettings};
use streetmetrics_core::models::{DistrictId, METERS_PER_KILOMETER};
use streetmetrics_refresh::trend;
use tabled::Tabled;

pub async fn execute(
    args: TrendArgs,
    storage: &Storage,
    settings: &RefreshSettings,
    output: &OutputWriter,
) -> Result<()> {
    let segment_set = parse_segment_set(&args.set)?;
    let district_id = DistrictId(args.district);
    let points = trend(storage.store.as_ref(), district_id, segment_set).await?;

    if output.is_json() {
        return output.result(TrendOutput { district_id, segment_set, points });
    }

    if points.is_empty() {
        output.info(format!("District {} has no published {} rollups", district_id, segment_set));
        return Ok(());
    }

    #[derive(Tabled)]
    struct TrendRow {
        #[tabled(rename = "Generation")]
        generation: u64,
        #[tabled(rename = "Computed at")]
        computed_at: String,
        #[tabled(rename = "Count")]
        count: u64,
        #[tabled(rename = "Length")]
        length: String,
        #[tabled(rename = "Change")]
        change: String,
        #[tabled(rename = "Version")]
        version: String,
    }

    let unit = settings.display_unit;
    let mut previous: Option<u64> = None;
    let mut rows = Vec::with_capacity(points.len());
    for point in points {
        let meters = point.total_length_km * METERS_PER_KILOMETER;
        rows.push(TrendRow {
            generation: point.generation,
            computed_at: point.computed_at.format("%Y-%m-%d %H:%M").to_string(),
            count: point.total_count,
            length: format!("{:.2} {}", unit.from_meters(meters), unit.abbreviation()),
            change: previous
                .map(|p| format!("{:+}", point.total_count as i64 - p as i64))
                .unwrap_or_default(),
            version: point.source_version,
        });
        previous = Some(point.total_count);
    }

    output.section(format!("District {} ({} segments)", district_id, segment_set));
    output.table(rows);
    Ok(())
}
