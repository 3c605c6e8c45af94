//! Tiles command implementation

use crate::cli::TilesArgs;
use crate::output::OutputWriter;
use crate::output_types::{GroupInfo, TilesOutput};
use crate::storage::Storage;
use anyhow::Result;
use streetmetrics_core::config::RefreshSettings;
use streetmetrics_geo::TileCoord;
use streetmetrics_refresh::groups_in_tile;
use tabled::Tabled;

pub async fn execute(
    args: TilesArgs,
    storage: &Storage,
    settings: &RefreshSettings,
    output: &OutputWriter,
) -> Result<()> {
    let tile: TileCoord = args.tile.parse()?;
    let bounds = tile.bounds();
    let groups: Vec<GroupInfo> = groups_in_tile(storage.store.as_ref(), tile, &settings.cluster.crs)
        .await?
        .iter()
        .map(GroupInfo::from)
        .collect();

    if output.is_json() {
        return output.result(TilesOutput {
            tile,
            bounds: [bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y],
            groups,
        });
    }

    output.section(format!("Tile {}", tile));
    output.kv(
        "Bounds",
        format!(
            "{:.6}, {:.6} .. {:.6}, {:.6}",
            bounds.min().x,
            bounds.min().y,
            bounds.max().x,
            bounds.max().y
        ),
    );

    #[derive(Tabled)]
    struct GroupRow {
        #[tabled(rename = "District")]
        district: u64,
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

    let unit = settings.display_unit;
    let rows: Vec<GroupRow> = groups
        .into_iter()
        .map(|g| GroupRow {
            district: g.district_id.0,
            id: g.id,
            class: g.class,
            name: g.name.unwrap_or_default(),
            members: g.member_count,
            length: format!("{:.2} {}", unit.from_meters(g.length_m), unit.abbreviation()),
        })
        .collect();

    output.table(rows);
    Ok(())
}
