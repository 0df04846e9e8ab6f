use super::{is_image_extension, SearchStore};
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::filters::{
    AcquisitionFacets, LaneFilter, ObjectFilter, RoadFilter, SegmentationFilter, TelemetryFilter,
};
use crate::model::{
    AcqId, LaneRecord, MediaLink, ObjectDetection, RoadRecord, Second, SegmentationRecord,
    TelemetryRecord,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Search store over the ingestion database
///
/// Reads `acquisitions`, `telemetry`, `lane_markings`, `object_detections`,
/// `road_attributes`, `segmentation` and `media_links`. Categorical
/// predicates are pushed down; range predicates are left to the matchers.
#[derive(Clone)]
pub struct PgSearchStore {
    pool: PgPool,
}

/// Append `AND lower(btrim(column)) = ANY($n)` when `values` is non-empty
fn push_any<'a>(builder: &mut QueryBuilder<'a, Postgres>, column: &str, values: &BTreeSet<String>) {
    if values.is_empty() {
        return;
    }

    let values: Vec<String> = values.iter().cloned().collect();
    builder
        .push(" AND lower(btrim(")
        .push(column)
        .push(")) = ANY(")
        .push_bind(values)
        .push(")");
}

/// Start a `SELECT ... FROM table WHERE acq_id = ANY(universe)` query
fn select_in_universe<'a>(
    columns: &str,
    table: &str,
    universe: &[AcqId],
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("SELECT acq_id::text AS acq_id, sec::bigint AS sec, ");
    builder
        .push(columns)
        .push(" FROM ")
        .push(table)
        .push(" WHERE acq_id::text = ANY(")
        .push_bind(universe.to_vec())
        .push(")");
    builder
}

fn lower_all(extensions: &[String]) -> Vec<String> {
    extensions.iter().map(|ext| ext.to_lowercase()).collect()
}

impl PgSearchStore {
    /// Create a new store with its connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }
}

#[async_trait]
impl SearchStore for PgSearchStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("ping"))?;

        Ok(())
    }

    #[instrument(skip(self, facets))]
    async fn resolve_universe(&self, facets: &AcquisitionFacets) -> Result<Vec<AcqId>, StoreError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT acq_id::text FROM acquisitions WHERE 1=1");

        if !facets.ids.is_empty() {
            let ids: Vec<String> = facets.ids.iter().cloned().collect();
            builder.push(" AND acq_id::text = ANY(").push_bind(ids).push(")");
        }
        push_any(&mut builder, "vehicle", &facets.vehicle);
        push_any(&mut builder, "period", &facets.period);
        push_any(&mut builder, "weather", &facets.weather);
        push_any(&mut builder, "country", &facets.country);

        let ids: Vec<(String,)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("acquisitions"))?;

        debug!(acquisitions = ids.len(), "Resolved acquisition universe");

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn telemetry(
        &self,
        universe: &[AcqId],
        filter: &TelemetryFilter,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        let mut builder = select_in_universe(
            "speed::text AS speed, steering_angle::text AS steering_angle, \
             accel::text AS accel, brake::text AS brake, turn_signal::text AS turn_signal",
            "telemetry",
            universe,
        );
        push_any(&mut builder, "brake::text", &filter.brake);
        push_any(&mut builder, "turn_signal::text", &filter.turn_signal);

        builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("telemetry"))
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn lanes(
        &self,
        universe: &[AcqId],
        filter: &LaneFilter,
    ) -> Result<Vec<LaneRecord>, StoreError> {
        let mut builder = select_in_universe(
            "left_marking, right_marking, width::text AS width, \
             curvature::text AS curvature, lateral_offset::text AS offset",
            "lane_markings",
            universe,
        );
        push_any(&mut builder, "left_marking", &filter.left_marking);
        push_any(&mut builder, "right_marking", &filter.right_marking);

        builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("lane"))
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn objects(
        &self,
        universe: &[AcqId],
        filter: &ObjectFilter,
    ) -> Result<Vec<ObjectDetection>, StoreError> {
        let mut builder = select_in_universe(
            "class, confidence::text AS confidence, distance::text AS distance, \"position\"",
            "object_detections",
            universe,
        );
        push_any(&mut builder, "class", &filter.class);
        push_any(&mut builder, "\"position\"", &filter.position);

        builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("objects"))
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn road(
        &self,
        universe: &[AcqId],
        filter: &RoadFilter,
    ) -> Result<Vec<RoadRecord>, StoreError> {
        let mut builder = select_in_universe(
            "road_type, surface, landuse, oneway::text AS oneway, \
             maxspeed::text AS maxspeed, lanes::text AS lanes",
            "road_attributes",
            universe,
        );
        push_any(&mut builder, "road_type", &filter.road_type);
        push_any(&mut builder, "surface", &filter.surface);
        push_any(&mut builder, "landuse", &filter.landuse);
        push_any(&mut builder, "oneway::text", &filter.oneway);

        builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("road"))
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn segmentation(
        &self,
        universe: &[AcqId],
        _filter: &SegmentationFilter,
    ) -> Result<Vec<SegmentationRecord>, StoreError> {
        let mut builder = select_in_universe(
            "road::text AS road, sidewalk::text AS sidewalk, vegetation::text AS vegetation, \
             sky::text AS sky, building::text AS building, vehicle::text AS vehicle, \
             pedestrian::text AS pedestrian",
            "segmentation",
            universe,
        );

        builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("segmentation"))
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn media_acquisitions(
        &self,
        universe: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<AcqId>, StoreError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT acq_id::text
            FROM media_links
            WHERE acq_id::text = ANY($1)
              AND lower(ext) = ANY($2)
              AND sec IS NOT NULL
            "#,
        )
        .bind(universe)
        .bind(lower_all(extensions))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("media acquisitions"))?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    #[instrument(skip_all, fields(universe = universe.len()))]
    async fn media_seconds(
        &self,
        universe: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<(AcqId, Second)>, StoreError> {
        sqlx::query_as(
            r#"
            SELECT DISTINCT acq_id::text, sec::bigint
            FROM media_links
            WHERE acq_id::text = ANY($1)
              AND lower(ext) = ANY($2)
              AND sec IS NOT NULL
            "#,
        )
        .bind(universe)
        .bind(lower_all(extensions))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("media seconds"))
    }

    #[instrument(skip_all, fields(pairs = pairs.len()))]
    async fn links_for_pairs(
        &self,
        pairs: &[(AcqId, Second)],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError> {
        let (acq_ids, secs): (Vec<String>, Vec<i64>) = pairs.iter().cloned().unzip();

        sqlx::query_as::<_, MediaLink>(
            r#"
            SELECT m.acq_id::text AS acq_id, m.sec::bigint AS sec,
                   lower(m.ext) AS ext, m.link
            FROM media_links m
            JOIN UNNEST($1::text[], $2::bigint[]) AS p(acq_id, sec)
              ON m.acq_id::text = p.acq_id AND m.sec = p.sec
            WHERE lower(m.ext) = ANY($3)
            "#,
        )
        .bind(acq_ids)
        .bind(secs)
        .bind(lower_all(extensions))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("media links"))
    }

    #[instrument(skip_all, fields(acquisitions = acquisitions.len()))]
    async fn acquisition_artifacts(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
    ) -> Result<Vec<MediaLink>, StoreError> {
        let artifact_extensions: Vec<String> = lower_all(extensions)
            .into_iter()
            .filter(|ext| !is_image_extension(ext))
            .collect();

        if artifact_extensions.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, MediaLink>(
            r#"
            SELECT DISTINCT acq_id::text AS acq_id, NULL::bigint AS sec,
                   lower(ext) AS ext, link
            FROM media_links
            WHERE acq_id::text = ANY($1)
              AND lower(ext) = ANY($2)
              AND sec IS NULL
            "#,
        )
        .bind(acquisitions)
        .bind(artifact_extensions)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("acquisition artifacts"))
    }

    /// Evenly spread seconds per acquisition, picked inside one grouped query
    ///
    /// The index formula matches `sampler::sample_indices`; for N > K ≥ 2 it
    /// yields K distinct indices, so no collision fill is needed here.
    #[instrument(skip_all, fields(acquisitions = acquisitions.len(), per_acquisition))]
    async fn sample_links(
        &self,
        acquisitions: &[AcqId],
        extensions: &[String],
        per_acquisition: usize,
    ) -> Result<Vec<MediaLink>, StoreError> {
        sqlx::query_as::<_, MediaLink>(
            r#"
            WITH secs AS (
                SELECT DISTINCT acq_id::text AS acq_id, sec::bigint AS sec
                FROM media_links
                WHERE acq_id::text = ANY($1)
                  AND lower(ext) = ANY($2)
                  AND sec IS NOT NULL
            ),
            ranked AS (
                SELECT acq_id, sec,
                       ROW_NUMBER() OVER (PARTITION BY acq_id ORDER BY sec) - 1 AS idx,
                       COUNT(*) OVER (PARTITION BY acq_id) AS n
                FROM secs
            ),
            picked AS (
                SELECT acq_id, sec
                FROM ranked
                WHERE n <= $3
                   OR ($3 = 1 AND idx = 0)
                   OR idx IN (
                        SELECT (2 * g * (n - 1) + ($3 - 1)) / NULLIF(2 * ($3 - 1), 0)
                        FROM generate_series(0::bigint, $3 - 1) AS g
                   )
            )
            SELECT m.acq_id::text AS acq_id, m.sec::bigint AS sec,
                   lower(m.ext) AS ext, m.link
            FROM media_links m
            JOIN picked p ON m.acq_id::text = p.acq_id AND m.sec = p.sec
            WHERE lower(m.ext) = ANY($2)
            "#,
        )
        .bind(acquisitions)
        .bind(lower_all(extensions))
        .bind(per_acquisition as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::query("media sample"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorical_pushdown_sql() {
        let mut builder = select_in_universe("class", "object_detections", &["1".to_string()]);
        push_any(&mut builder, "class", &BTreeSet::from(["car".to_string()]));
        push_any(&mut builder, "position", &BTreeSet::new());

        let sql = builder.sql();
        assert!(sql.contains("FROM object_detections WHERE acq_id::text = ANY($1)"));
        assert!(sql.contains("AND lower(btrim(class)) = ANY($2)"));
        assert!(!sql.contains("position"));
    }

    #[test]
    fn test_pushdown_trims_stored_values() {
        let mut builder = select_in_universe("brake", "telemetry", &["1".to_string()]);
        push_any(&mut builder, "brake::text", &BTreeSet::from(["true".to_string()]));
        push_any(&mut builder, "\"position\"", &BTreeSet::from(["left".to_string()]));

        let sql = builder.sql();
        assert!(sql.contains("AND lower(btrim(brake::text)) = ANY($2)"));
        assert!(sql.contains("AND lower(btrim(\"position\")) = ANY($3)"));
        assert!(!sql.contains("lower(brake"));
    }

    #[test]
    fn test_lower_all_extensions() {
        assert_eq!(lower_all(&["JPG".to_string()]), vec!["jpg"]);
    }
}
