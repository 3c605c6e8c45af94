//! Refresh command implementation

use crate::cli::RefreshArgs;
use crate::output::OutputWriter;
use crate::output_types::{FailedDistrict, RefreshOutput};
use crate::source::GeoJsonSource;
use crate::storage::Storage;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use streetmetrics_core::config::RefreshSettings;
use streetmetrics_core::models::{DistanceUnit, DistrictId, RollupRecord, SegmentSet};
use streetmetrics_refresh::{BatchSummary, DistrictReport, RefreshOrchestrator};
use tabled::Tabled;
use uuid::Uuid;

pub async fn execute(
    args: RefreshArgs,
    storage: &Storage,
    settings: RefreshSettings,
    output: &OutputWriter,
) -> Result<()> {
    let source = GeoJsonSource::load(&args.districts, &args.roads).with_context(|| {
        format!(
            "Failed to read sources {} and {}",
            args.districts.display(),
            args.roads.display()
        )
    })?;

    let unit = settings.display_unit;
    let orchestrator =
        Arc::new(RefreshOrchestrator::new(Arc::clone(&storage.store), Arc::new(source), settings));

    let synced = orchestrator.sync_districts().await?;
    output.info(format!("Synchronized {} districts", synced));

    let summary = if args.district_ids.is_empty() {
        orchestrator.refresh_all().await
    } else {
        let ids = args.district_ids.iter().copied().map(DistrictId).collect();
        orchestrator.refresh_batch(Uuid::new_v4(), ids).await
    }
    .context("Batch refresh aborted")?;

    render(&summary, unit, output)?;

    if !summary.all_succeeded() {
        bail!("{} of {} districts failed to refresh", summary.failure_count(), summary.total);
    }
    Ok(())
}

fn render(summary: &BatchSummary, unit: DistanceUnit, output: &OutputWriter) -> Result<()> {
    if output.is_json() {
        return output.result(RefreshOutput {
            run_id: summary.run_id,
            total: summary.total,
            succeeded: summary.succeeded.clone(),
            failed: summary
                .failed
                .iter()
                .map(|(id, err)| FailedDistrict {
                    district_id: *id,
                    kind: format!("{:?}", err.kind()),
                    error: err.to_string(),
                })
                .collect(),
            elapsed_ms: summary.elapsed.as_millis() as u64,
        });
    }

    #[derive(Tabled)]
    struct ReportRow {
        #[tabled(rename = "District")]
        district: u64,
        #[tabled(rename = "Generation")]
        generation: u64,
        #[tabled(rename = "Segments")]
        segments: usize,
        #[tabled(rename = "Groups")]
        groups: String,
        #[tabled(rename = "Intersections")]
        intersections: u64,
        #[tabled(rename = "Raw length")]
        raw_length: String,
        #[tabled(rename = "Dedup length")]
        dedup_length: String,
        #[tabled(rename = "Time")]
        elapsed: String,
    }

    let rows: Vec<ReportRow> = summary
        .succeeded
        .iter()
        .map(|report| ReportRow {
            district: report.district_id.0,
            generation: report.generation,
            segments: report.raw_segments,
            groups: format!("{} ({} merged)", report.groups, report.merged_groups),
            intersections: report.nodes.intersection_count,
            raw_length: length_of(report, SegmentSet::Raw, unit),
            dedup_length: length_of(report, SegmentSet::Deduplicated, unit),
            elapsed: format!("{} ms", report.elapsed_ms),
        })
        .collect();

    output.section(format!("Refresh run {}", summary.run_id));
    output.table(rows);

    for (id, err) in &summary.failed {
        output.error(format!("District {}: {}", id, err));
    }

    output.success(format!(
        "Refreshed {} of {} districts in {:.1}s",
        summary.success_count(),
        summary.total,
        summary.elapsed.as_secs_f64()
    ));
    Ok(())
}

fn length_of(report: &DistrictReport, set: SegmentSet, unit: DistanceUnit) -> String {
    report
        .rollups
        .iter()
        .find(|r: &&RollupRecord| r.calculation_type == set)
        .map(|r| format!("{:.2} {}", unit.from_meters(r.total_length_m), unit.abbreviation()))
        .unwrap_or_else(|| "-".to_string())
}
