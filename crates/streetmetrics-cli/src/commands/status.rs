//! Status command implementation

use crate::cli::StatusArgs;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::{DistrictStatus, StatusOutput};
use crate::storage::Storage;
use anyhow::Result;
use chrono::Utc;
use streetmetrics_core::models::DistrictId;
use streetmetrics_refresh::freshness;
use tabled::Tabled;

pub async fn execute(args: StatusArgs, storage: &Storage, output: &OutputWriter) -> Result<()> {
    let store = storage.store.as_ref();

    let districts = match args.district {
        Some(id) => vec![store
            .get_district(DistrictId(id))
            .await?
            .ok_or_else(|| errors::district_not_found(id))?],
        None => store.list_districts().await?,
    };

    let now = Utc::now();
    let mut statuses = Vec::with_capacity(districts.len());
    for district in districts {
        let fresh = freshness(store, district.id, now).await?;
        statuses.push(DistrictStatus {
            district_id: district.id,
            name: district.name,
            active: district.active,
            published_generation: store.published_generation(district.id).await?,
            stale: fresh.is_stale(args.stale_after),
            freshness: fresh,
        });
    }

    if output.is_json() {
        return output.result(StatusOutput { districts: statuses });
    }

    if statuses.is_empty() {
        output.info("No districts in the store. Run 'streetmetrics refresh' first.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "ID")]
        id: u64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Active")]
        active: String,
        #[tabled(rename = "Generation")]
        generation: String,
        #[tabled(rename = "Last success")]
        last_success: String,
        #[tabled(rename = "Version")]
        version: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let stale_count = statuses.iter().filter(|s| s.active && s.stale).count();
    let rows: Vec<StatusRow> = statuses
        .into_iter()
        .map(|s| StatusRow {
            id: s.district_id.0,
            name: s.name,
            active: if s.active { "✓" } else { "✗" }.to_string(),
            generation: s.published_generation.map_or("-".to_string(), |g| g.to_string()),
            last_success: s
                .freshness
                .last_success
                .map_or("never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            version: s.freshness.source_version.unwrap_or_else(|| "-".to_string()),
            status: match (s.freshness.last_error, s.stale) {
                (Some(entry), _) => format!("failed: {}", entry.error.unwrap_or_default()),
                (None, true) => "stale".to_string(),
                (None, false) => "fresh".to_string(),
            },
        })
        .collect();

    output.section("District Status");
    output.table(rows);

    if stale_count > 0 {
        output.warning(format!(
            "{} active districts have no refresh in the last {}s",
            stale_count, args.stale_after
        ));
    }
    Ok(())
}
