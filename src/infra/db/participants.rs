use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateParticipantParams, ParticipantSelection, ParticipantsRepo, RepoError,
    },
    domain::entities::ParticipantRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const PARTICIPANT_COLUMNS: &str = "id, event_id, name, email, phone, college, year_dept, \
    certificate_sent, certificate_sent_at, created_at";

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: Uuid,
    event_id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    college: Option<String>,
    year_dept: Option<String>,
    certificate_sent: bool,
    certificate_sent_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl From<ParticipantRow> for ParticipantRecord {
    fn from(row: ParticipantRow) -> Self {
        Self {
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            college: row.college,
            year_dept: row.year_dept,
            certificate_sent: row.certificate_sent,
            certificate_sent_at: row.certificate_sent_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ParticipantsRepo for PostgresRepositories {
    async fn create_participant(
        &self,
        params: CreateParticipantParams,
    ) -> Result<ParticipantRecord, RepoError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "INSERT INTO participants (event_id, name, email, phone, college, year_dept) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(params.event_id)
        .bind(params.name)
        .bind(params.email)
        .bind(params.phone)
        .bind(params.college)
        .bind(params.year_dept)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ParticipantRecord::from(row))
    }

    async fn find_participant(&self, id: Uuid) -> Result<Option<ParticipantRecord>, RepoError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ParticipantRecord::from))
    }

    async fn list_for_event(
        &self,
        event_id: Uuid,
        selection: &ParticipantSelection,
    ) -> Result<Vec<ParticipantRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(PARTICIPANT_COLUMNS);
        qb.push(" FROM participants WHERE event_id = ");
        qb.push_bind(event_id);

        if let Some(ids) = selection.ids.as_ref() {
            qb.push(" AND id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }

        if selection.unsent_only {
            qb.push(" AND certificate_sent = FALSE");
        }

        qb.push(" ORDER BY created_at ASC, id ASC");

        let rows = qb
            .build_query_as::<ParticipantRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ParticipantRecord::from).collect())
    }

    async fn mark_certificate_sent(
        &self,
        id: Uuid,
        sent_at: OffsetDateTime,
    ) -> Result<ParticipantRecord, RepoError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "UPDATE participants \
             SET certificate_sent = TRUE, certificate_sent_at = $2 \
             WHERE id = $1 \
             RETURNING {PARTICIPANT_COLUMNS}"
        ))
        .bind(id)
        .bind(sent_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ParticipantRecord::from(row))
    }
}
