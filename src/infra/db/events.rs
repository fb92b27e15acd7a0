use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateEventParams, EventQueryFilter, EventWithCount, EventsRepo, RepoError,
        UpdateEventParams,
    },
    domain::entities::EventRecord,
    domain::types::{EventCategory, EventMode},
};

use super::{PostgresRepositories, map_sqlx_error};

const EVENT_COLUMNS: &str = "e.id, e.share_id, e.title, e.description, e.category, e.mode, \
    e.location, e.start_at, e.end_at, e.cert_template_path, e.signature_path, \
    e.certificates_sent, e.created_at, e.updated_at";

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    share_id: String,
    title: String,
    description: Option<String>,
    category: EventCategory,
    mode: EventMode,
    location: Option<String>,
    start_at: OffsetDateTime,
    end_at: OffsetDateTime,
    cert_template_path: Option<String>,
    signature_path: Option<String>,
    certificates_sent: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            share_id: row.share_id,
            title: row.title,
            description: row.description,
            category: row.category,
            mode: row.mode,
            location: row.location,
            start_at: row.start_at,
            end_at: row.end_at,
            cert_template_path: row.cert_template_path,
            signature_path: row.signature_path,
            certificates_sent: row.certificates_sent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventCountRow {
    #[sqlx(flatten)]
    event: EventRow,
    participant_count: i64,
}

impl PostgresRepositories {
    fn apply_event_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q EventQueryFilter) {
        if let Some(mode) = filter.mode {
            qb.push(" AND e.mode = ");
            qb.push_bind(mode);
        }

        if let Some(category) = filter.category {
            qb.push(" AND e.category = ");
            qb.push_bind(category);
        }

        if let Some(search) = filter.search.as_ref() {
            let pattern = format!("%{search}%");
            qb.push(" AND (e.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.location ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }
}

#[async_trait]
impl EventsRepo for PostgresRepositories {
    async fn create_event(&self, params: CreateEventParams) -> Result<EventRecord, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events AS e (
                share_id, title, description, category, mode, location,
                start_at, end_at, cert_template_path, signature_path
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING e.id, e.share_id, e.title, e.description, e.category, e.mode,
                      e.location, e.start_at, e.end_at, e.cert_template_path, e.signature_path,
                      e.certificates_sent, e.created_at, e.updated_at
            "#,
        )
        .bind(params.share_id)
        .bind(params.title)
        .bind(params.description)
        .bind(params.category)
        .bind(params.mode)
        .bind(params.location)
        .bind(params.start_at)
        .bind(params.end_at)
        .bind(params.cert_template_path)
        .bind(params.signature_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(EventRecord::from(row))
    }

    async fn update_event(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            UPDATE events AS e
            SET title = $2,
                description = $3,
                category = $4,
                mode = $5,
                location = $6,
                start_at = $7,
                end_at = $8,
                cert_template_path = $9,
                signature_path = $10,
                updated_at = now()
            WHERE e.id = $1
            RETURNING e.id, e.share_id, e.title, e.description, e.category, e.mode,
                      e.location, e.start_at, e.end_at, e.cert_template_path, e.signature_path,
                      e.certificates_sent, e.created_at, e.updated_at
            "#,
        )
        .bind(params.id)
        .bind(params.title)
        .bind(params.description)
        .bind(params.category)
        .bind(params.mode)
        .bind(params.location)
        .bind(params.start_at)
        .bind(params.end_at)
        .bind(params.cert_template_path)
        .bind(params.signature_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(EventRecord::from(row))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<EventRecord>, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EventRecord::from))
    }

    async fn find_by_share_id(&self, share_id: &str) -> Result<Option<EventRecord>, RepoError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.share_id = $1"
        ))
        .bind(share_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EventRecord::from))
    }

    async fn list_events(
        &self,
        filter: &EventQueryFilter,
    ) -> Result<Vec<EventWithCount>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(EVENT_COLUMNS);
        qb.push(
            ", (SELECT COUNT(*) FROM participants p WHERE p.event_id = e.id) AS participant_count \
             FROM events e WHERE 1=1",
        );
        Self::apply_event_filter(&mut qb, filter);
        qb.push(" ORDER BY e.created_at DESC, e.id DESC");

        let rows = qb
            .build_query_as::<EventCountRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(EventWithCount {
                    event: EventRecord::from(row.event),
                    participant_count: Self::convert_count(row.participant_count)?,
                })
            })
            .collect()
    }

    async fn list_due_events(&self, now: OffsetDateTime) -> Result<Vec<EventRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(EVENT_COLUMNS);
        qb.push(" FROM events e WHERE e.end_at < ");
        qb.push_bind(now);
        qb.push(" AND e.certificates_sent = FALSE ORDER BY e.end_at ASC, e.id ASC");

        let rows = qb
            .build_query_as::<EventRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    async fn mark_certificates_sent(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE events SET certificates_sent = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
