use async_trait::async_trait;
use geo::{BoundingRect, LineString, MultiLineString, Rect};
use sqlx::postgres::PgRow;
use streetmetrics_core::config::parse_segment_set;
use streetmetrics_core::error::{Result, StreetmetricsError};
use streetmetrics_core::models::{
    DedupGroup, DistrictId, GroupId, NodeSummary, RawSegment, RoadClass, RollupRecord, SegmentId,
};

use super::codec::{
    district_key, from_json, geometry_from_json, geometry_to_json, get, to_i64, to_json, to_u64,
};
use super::transaction::Transaction;
use super::{db_error, PostgresStore};
use crate::ports::{GenerationStore, GenerationTicket};

const PUBLISHED: &str =
    "(SELECT published_generation FROM district_generations WHERE district_id = $1)";

const ROLLUP_COLUMNS: &str = "district_id, generation, calculation_type, total_count, \
     total_length_m, total_length_km, total_length_mi, count_density, length_density, by_class, \
     source_version, computed_at";

/// Tables holding per-generation rows
const GENERATION_TABLES: [&str; 4] = ["raw_segments", "dedup_groups", "rollups", "node_summaries"];

fn unknown_generation(ticket: &GenerationTicket) -> StreetmetricsError {
    StreetmetricsError::compute(
        "staging",
        format!(
            "generation {} of district {} is not staged",
            ticket.generation, ticket.district_id
        ),
    )
}

fn segment_from_row(row: &PgRow) -> Result<RawSegment> {
    Ok(RawSegment {
        id: SegmentId(to_u64(get(row, "segment_id")?)?),
        district_id: DistrictId(to_u64(get(row, "district_id")?)?),
        feature_id: get(row, "feature_id")?,
        class: RoadClass::new(get::<String>(row, "class")?),
        subclass: get(row, "subclass")?,
        name: get(row, "name")?,
        geometry: geometry_from_json::<LineString<f64>>(get(row, "geometry")?)?,
        length_m: get(row, "length_m")?,
        crosses_boundary: get(row, "crosses_boundary")?,
        source_version: get(row, "source_version")?,
    })
}

fn group_from_row(row: &PgRow) -> Result<DedupGroup> {
    let member_ids: Vec<i64> = get(row, "member_ids")?;
    let member_count: i32 = get(row, "member_count")?;

    Ok(DedupGroup {
        id: GroupId(to_u64(get(row, "group_id")?)?),
        district_id: DistrictId(to_u64(get(row, "district_id")?)?),
        member_ids: member_ids
            .into_iter()
            .map(|id| to_u64(id).map(SegmentId))
            .collect::<Result<_>>()?,
        geometry: geometry_from_json::<MultiLineString<f64>>(get(row, "geometry")?)?,
        class: RoadClass::new(get::<String>(row, "class")?),
        name: get(row, "name")?,
        length_m: get(row, "length_m")?,
        member_count: member_count.max(0) as usize,
        deduplicated: get(row, "deduplicated")?,
    })
}

fn rollup_from_row(row: &PgRow) -> Result<RollupRecord> {
    Ok(RollupRecord {
        district_id: DistrictId(to_u64(get(row, "district_id")?)?),
        calculation_type: parse_segment_set(&get::<String>(row, "calculation_type")?)?,
        total_count: to_u64(get(row, "total_count")?)?,
        total_length_m: get(row, "total_length_m")?,
        total_length_km: get(row, "total_length_km")?,
        total_length_mi: get(row, "total_length_mi")?,
        count_density: get(row, "count_density")?,
        length_density: get(row, "length_density")?,
        by_class: from_json(get(row, "by_class")?)?,
        source_version: get(row, "source_version")?,
        generation: to_u64(get(row, "generation")?)?,
        computed_at: get(row, "computed_at")?,
    })
}

fn nodes_from_row(row: &PgRow) -> Result<NodeSummary> {
    Ok(NodeSummary {
        district_id: DistrictId(to_u64(get(row, "district_id")?)?),
        node_count: to_u64(get(row, "node_count")?)?,
        intersection_count: to_u64(get(row, "intersection_count")?)?,
        through_count: to_u64(get(row, "through_count")?)?,
        dead_end_count: to_u64(get(row, "dead_end_count")?)?,
        segment_set: parse_segment_set(&get::<String>(row, "segment_set")?)?,
        snap_precision: get(row, "snap_precision")?,
        generation: to_u64(get(row, "generation")?)?,
    })
}

impl PostgresStore {
    /// Open a transaction and make sure `ticket` is still staged
    async fn staged_transaction(&self, ticket: &GenerationTicket) -> Result<Transaction<'static>> {
        let mut tx = self.transactions.begin().await?;

        let staged: Option<(i64,)> = sqlx::query_as(
            "SELECT generation FROM staged_generations \
             WHERE district_id = $1 AND generation = $2 FOR UPDATE",
        )
        .bind(district_key(ticket.district_id)?)
        .bind(to_i64(ticket.generation)?)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(|e| db_error("lock staged generation", e))?;

        if staged.is_none() {
            tx.rollback().await?;
            return Err(unknown_generation(ticket));
        }
        Ok(tx)
    }

    async fn clear_staged(
        tx: &mut Transaction<'static>,
        table: &str,
        ticket: &GenerationTicket,
    ) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE district_id = $1 AND generation = $2", table))
            .bind(district_key(ticket.district_id)?)
            .bind(to_i64(ticket.generation)?)
            .execute(tx.conn()?)
            .await
            .map_err(|e| db_error("clear staged rows", e))?;
        Ok(())
    }

    async fn delete_generation(
        tx: &mut Transaction<'static>,
        district: i64,
        generation: i64,
    ) -> Result<()> {
        for table in GENERATION_TABLES {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE district_id = $1 AND generation = $2",
                table
            ))
            .bind(district)
            .bind(generation)
            .execute(tx.conn()?)
            .await
            .map_err(|e| db_error("delete generation", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationStore for PostgresStore {
    async fn begin_generation(&self, district_id: DistrictId) -> Result<GenerationTicket> {
        let district = district_key(district_id)?;
        let mut tx = self.transactions.begin().await?;

        let (generation, published): (i64, Option<i64>) = sqlx::query_as(
            r#"
            INSERT INTO district_generations (district_id, last_generation)
            VALUES ($1, 1)
            ON CONFLICT (district_id) DO UPDATE
            SET last_generation = district_generations.last_generation + 1
            RETURNING last_generation, published_generation
            "#,
        )
        .bind(district)
        .fetch_one(tx.conn()?)
        .await
        .map_err(|e| db_error("allocate generation", e))?;

        sqlx::query(
            "INSERT INTO staged_generations (district_id, generation, base_generation) \
             VALUES ($1, $2, $3)",
        )
        .bind(district)
        .bind(generation)
        .bind(published)
        .execute(tx.conn()?)
        .await
        .map_err(|e| db_error("stage generation", e))?;

        tx.commit().await?;

        Ok(GenerationTicket {
            district_id,
            generation: to_u64(generation)?,
            base: published.map(to_u64).transpose()?,
        })
    }

    async fn stage_segments(&self, ticket: &GenerationTicket, segments: &[RawSegment]) -> Result<()> {
        let mut tx = self.staged_transaction(ticket).await?;
        Self::clear_staged(&mut tx, "raw_segments", ticket).await?;

        for segment in segments {
            sqlx::query(
                r#"
                INSERT INTO raw_segments (district_id, generation, segment_id, feature_id, class,
                    subclass, name, geometry, length_m, crosses_boundary, source_version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(district_key(ticket.district_id)?)
            .bind(to_i64(ticket.generation)?)
            .bind(to_i64(segment.id.0)?)
            .bind(&segment.feature_id)
            .bind(segment.class.as_str())
            .bind(&segment.subclass)
            .bind(&segment.name)
            .bind(geometry_to_json(geojson::Value::from(&segment.geometry))?)
            .bind(segment.length_m)
            .bind(segment.crosses_boundary)
            .bind(&segment.source_version)
            .execute(tx.conn()?)
            .await
            .map_err(|e| db_error("stage segment", e))?;
        }

        tx.commit().await
    }

    async fn stage_groups(&self, ticket: &GenerationTicket, groups: &[DedupGroup]) -> Result<()> {
        let mut tx = self.staged_transaction(ticket).await?;
        Self::clear_staged(&mut tx, "dedup_groups", ticket).await?;

        for group in groups {
            let member_ids: Vec<i64> =
                group.member_ids.iter().map(|id| to_i64(id.0)).collect::<Result<_>>()?;
            let bbox = group.geometry.bounding_rect();

            sqlx::query(
                r#"
                INSERT INTO dedup_groups (district_id, generation, group_id, member_ids, geometry,
                    class, name, length_m, member_count, deduplicated, min_x, min_y, max_x, max_y)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(district_key(ticket.district_id)?)
            .bind(to_i64(ticket.generation)?)
            .bind(to_i64(group.id.0)?)
            .bind(member_ids)
            .bind(geometry_to_json(geojson::Value::from(&group.geometry))?)
            .bind(group.class.as_str())
            .bind(&group.name)
            .bind(group.length_m)
            .bind(group.member_count as i32)
            .bind(group.deduplicated)
            .bind(bbox.map(|r| r.min().x))
            .bind(bbox.map(|r| r.min().y))
            .bind(bbox.map(|r| r.max().x))
            .bind(bbox.map(|r| r.max().y))
            .execute(tx.conn()?)
            .await
            .map_err(|e| db_error("stage group", e))?;
        }

        tx.commit().await
    }

    async fn stage_rollups(&self, ticket: &GenerationTicket, rollups: &[RollupRecord]) -> Result<()> {
        let mut tx = self.staged_transaction(ticket).await?;
        Self::clear_staged(&mut tx, "rollups", ticket).await?;

        for rollup in rollups {
            sqlx::query(&format!(
                "INSERT INTO rollups ({}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                ROLLUP_COLUMNS
            ))
            .bind(district_key(ticket.district_id)?)
            .bind(to_i64(ticket.generation)?)
            .bind(rollup.calculation_type.as_str())
            .bind(to_i64(rollup.total_count)?)
            .bind(rollup.total_length_m)
            .bind(rollup.total_length_km)
            .bind(rollup.total_length_mi)
            .bind(rollup.count_density)
            .bind(rollup.length_density)
            .bind(to_json(&rollup.by_class)?)
            .bind(&rollup.source_version)
            .bind(rollup.computed_at)
            .execute(tx.conn()?)
            .await
            .map_err(|e| db_error("stage rollup", e))?;
        }

        tx.commit().await
    }

    async fn stage_nodes(&self, ticket: &GenerationTicket, summary: &NodeSummary) -> Result<()> {
        let mut tx = self.staged_transaction(ticket).await?;
        Self::clear_staged(&mut tx, "node_summaries", ticket).await?;

        sqlx::query(
            r#"
            INSERT INTO node_summaries (district_id, generation, node_count, intersection_count,
                through_count, dead_end_count, segment_set, snap_precision)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(district_key(ticket.district_id)?)
        .bind(to_i64(ticket.generation)?)
        .bind(to_i64(summary.node_count)?)
        .bind(to_i64(summary.intersection_count)?)
        .bind(to_i64(summary.through_count)?)
        .bind(to_i64(summary.dead_end_count)?)
        .bind(summary.segment_set.as_str())
        .bind(summary.snap_precision)
        .execute(tx.conn()?)
        .await
        .map_err(|e| db_error("stage node summary", e))?;

        tx.commit().await
    }

    async fn publish_generation(&self, ticket: &GenerationTicket) -> Result<()> {
        let district = district_key(ticket.district_id)?;
        let generation = to_i64(ticket.generation)?;
        let mut tx = self.staged_transaction(ticket).await?;

        let (published,): (Option<i64>,) = sqlx::query_as(
            "SELECT published_generation FROM district_generations \
             WHERE district_id = $1 FOR UPDATE",
        )
        .bind(district)
        .fetch_one(tx.conn()?)
        .await
        .map_err(|e| db_error("lock generation pointer", e))?;

        let found = published.map(to_u64).transpose()?;
        if found != ticket.base {
            tx.rollback().await?;
            return Err(StreetmetricsError::ConcurrentRefresh {
                id: ticket.district_id,
                expected: ticket.base,
                found,
            });
        }

        sqlx::query(
            "UPDATE district_generations SET published_generation = $2, published_at = NOW() \
             WHERE district_id = $1",
        )
        .bind(district)
        .bind(generation)
        .execute(tx.conn()?)
        .await
        .map_err(|e| db_error("publish generation", e))?;

        sqlx::query("DELETE FROM staged_generations WHERE district_id = $1 AND generation = $2")
            .bind(district)
            .bind(generation)
            .execute(tx.conn()?)
            .await
            .map_err(|e| db_error("unstage generation", e))?;

        sqlx::query(&format!(
            "INSERT INTO rollup_history ({cols}) SELECT {cols} FROM rollups \
             WHERE district_id = $1 AND generation = $2",
            cols = ROLLUP_COLUMNS
        ))
        .bind(district)
        .bind(generation)
        .execute(tx.conn()?)
        .await
        .map_err(|e| db_error("record rollup history", e))?;

        if let Some(previous) = published {
            Self::delete_generation(&mut tx, district, previous).await?;
        }

        // Stagings older than this one can no longer publish
        let abandoned: Vec<(i64,)> = sqlx::query_as(
            "DELETE FROM staged_generations WHERE district_id = $1 AND generation < $2 \
             RETURNING generation",
        )
        .bind(district)
        .bind(generation)
        .fetch_all(tx.conn()?)
        .await
        .map_err(|e| db_error("sweep abandoned generations", e))?;

        for (stale,) in abandoned {
            Self::delete_generation(&mut tx, district, stale).await?;
        }

        tx.commit().await
    }

    async fn discard_generation(&self, ticket: &GenerationTicket) -> Result<()> {
        let district = district_key(ticket.district_id)?;
        let generation = to_i64(ticket.generation)?;
        let mut tx = self.transactions.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM staged_generations WHERE district_id = $1 AND generation = $2",
        )
        .bind(district)
        .bind(generation)
        .execute(tx.conn()?)
        .await
        .map_err(|e| db_error("discard generation", e))?;

        if removed.rows_affected() > 0 {
            Self::delete_generation(&mut tx, district, generation).await?;
        }

        tx.commit().await
    }

    async fn published_generation(&self, district_id: DistrictId) -> Result<Option<u64>> {
        let row: Option<(Option<i64>,)> = sqlx::query_as(
            "SELECT published_generation FROM district_generations WHERE district_id = $1",
        )
        .bind(district_key(district_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("read generation pointer", e))?;

        row.and_then(|(g,)| g).map(to_u64).transpose()
    }

    async fn raw_segments(&self, district_id: DistrictId) -> Result<Vec<RawSegment>> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM raw_segments WHERE district_id = $1 AND generation = {} \
             ORDER BY segment_id",
            PUBLISHED
        ))
        .bind(district_key(district_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("read segments", e))?;

        rows.iter().map(segment_from_row).collect()
    }

    async fn dedup_groups(&self, district_id: DistrictId) -> Result<Vec<DedupGroup>> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM dedup_groups WHERE district_id = $1 AND generation = {} \
             ORDER BY group_id",
            PUBLISHED
        ))
        .bind(district_key(district_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("read groups", e))?;

        rows.iter().map(group_from_row).collect()
    }

    async fn rollups(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM rollups WHERE district_id = $1 AND generation = {} \
             ORDER BY CASE calculation_type WHEN 'raw' THEN 0 ELSE 1 END",
            ROLLUP_COLUMNS, PUBLISHED
        ))
        .bind(district_key(district_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("read rollups", e))?;

        rows.iter().map(rollup_from_row).collect()
    }

    async fn node_summary(&self, district_id: DistrictId) -> Result<Option<NodeSummary>> {
        let row = sqlx::query(&format!(
            "SELECT * FROM node_summaries WHERE district_id = $1 AND generation = {}",
            PUBLISHED
        ))
        .bind(district_key(district_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("read node summary", e))?;

        row.as_ref().map(nodes_from_row).transpose()
    }

    async fn dedup_groups_in_bounds(&self, bounds: Rect<f64>) -> Result<Vec<DedupGroup>> {
        let rows = sqlx::query(
            r#"
            SELECT g.* FROM dedup_groups g
            JOIN district_generations d
              ON d.district_id = g.district_id AND d.published_generation = g.generation
            WHERE g.max_x >= $1 AND g.min_x <= $3 AND g.max_y >= $2 AND g.min_y <= $4
            ORDER BY g.district_id, g.group_id
            "#,
        )
        .bind(bounds.min().x)
        .bind(bounds.min().y)
        .bind(bounds.max().x)
        .bind(bounds.max().y)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("query groups in bounds", e))?;

        rows.iter().map(group_from_row).collect()
    }

    async fn rollup_history(&self, district_id: DistrictId) -> Result<Vec<RollupRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM rollup_history WHERE district_id = $1 \
             ORDER BY generation, CASE calculation_type WHEN 'raw' THEN 0 ELSE 1 END",
            ROLLUP_COLUMNS
        ))
        .bind(district_key(district_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("read rollup history", e))?;

        rows.iter().map(rollup_from_row).collect()
    }
}
