//! PostgreSQL repository for signing requests.

use anyhow::Result;
use chrono::{DateTime, Utc};
use contract_core::types::{SigningRequest, SigningRequestRecord};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::repository::SigningRequestRepository;

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, contract_id, recipient_id, recipient_email, status,
        created_at, expires_at, signed_at, rejected_at,
        signature_data, pdf_path, signed_pdf_path
    FROM signing_requests
"#;

const INSERT_REQUEST: &str = r#"
    INSERT INTO signing_requests (
        id, contract_id, recipient_id, recipient_email, status,
        created_at, expires_at, signed_at, rejected_at,
        signature_data, pdf_path, signed_pdf_path
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

/// Only a pending row is ever written; terminal rows are left untouched.
const UPDATE_IF_PENDING: &str = r#"
    UPDATE signing_requests SET
        status = $2,
        signed_at = $3,
        rejected_at = $4,
        signature_data = $5,
        signed_pdf_path = $6,
        updated_at = NOW()
    WHERE id = $1 AND status = 'pending'
"#;

/// Name of the partial unique index allowing one pending request per contract.
const PENDING_INDEX: &str = "signing_requests_one_pending_per_contract";

/// Repository backed by the `signing_requests` table.
pub struct PgSigningRequestRepository {
    pool: PgPool,
}

impl PgSigningRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::migrate!("../../migrations").run(pool).await?;
        info!("Signing request migrations applied");
        Ok(())
    }

    fn row_to_record(r: &sqlx::postgres::PgRow) -> SigningRequestRecord {
        SigningRequestRecord {
            id: r.get("id"),
            contract_id: r.get("contract_id"),
            recipient_id: r.get("recipient_id"),
            recipient_email: r.get("recipient_email"),
            status: r.get("status"),
            created_at: r.get("created_at"),
            expires_at: r.get("expires_at"),
            signed_at: r.get("signed_at"),
            rejected_at: r.get("rejected_at"),
            signature_data: r.get("signature_data"),
            pdf_path: r.get("pdf_path"),
            signed_pdf_path: r.get("signed_pdf_path"),
        }
    }

    fn row_to_request(r: &sqlx::postgres::PgRow) -> Result<SigningRequest> {
        Ok(SigningRequest::try_from(Self::row_to_record(r))?)
    }
}

/// A unique violation on the pending index means the contract already has a
/// pending request; any other constraint is a real error.
fn is_duplicate_pending(constraint: Option<&str>) -> bool {
    constraint == Some(PENDING_INDEX)
}

#[async_trait::async_trait]
impl SigningRequestRepository for PgSigningRequestRepository {
    async fn insert(&self, request: &SigningRequest) -> Result<bool> {
        let record = SigningRequestRecord::from(request);

        let result = sqlx::query(INSERT_REQUEST)
        .bind(record.id)
        .bind(&record.contract_id)
        .bind(&record.recipient_id)
        .bind(&record.recipient_email)
        .bind(&record.status)
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(record.signed_at)
        .bind(record.rejected_at)
        .bind(&record.signature_data)
        .bind(&record.pdf_path)
        .bind(&record.signed_pdf_path)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(request_id = %record.id, contract_id = %record.contract_id, "Inserted signing request");
                Ok(true)
            }
            Err(sqlx::Error::Database(e)) if is_duplicate_pending(e.constraint()) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<SigningRequest>> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_request).transpose()
    }

    async fn find_pending_by_contract(&self, contract_id: &str) -> Result<Option<SigningRequest>> {
        let row = sqlx::query(&format!(
            "{} WHERE contract_id = $1 AND status = 'pending'",
            SELECT_COLUMNS
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_request).transpose()
    }

    async fn list_by_contract(&self, contract_id: &str) -> Result<Vec<SigningRequest>> {
        let rows = sqlx::query(&format!(
            "{} WHERE contract_id = $1 ORDER BY created_at ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_request).collect()
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<SigningRequest>> {
        let rows = sqlx::query(&format!(
            "{} WHERE status = 'pending' AND expires_at <= $1 ORDER BY expires_at ASC",
            SELECT_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_request).collect()
    }

    async fn update_if_pending(&self, request: &SigningRequest) -> Result<bool> {
        let record = SigningRequestRecord::from(request);

        let result = sqlx::query(UPDATE_IF_PENDING)
        .bind(record.id)
        .bind(&record.status)
        .bind(record.signed_at)
        .bind(record.rejected_at)
        .bind(&record.signature_data)
        .bind(&record.signed_pdf_path)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        debug!(request_id = %record.id, status = %record.status, updated, "Conditional signing request update");
        Ok(updated)
    }
}
