use async_trait::async_trait;
use discount_core::repository::{DiscountCode, ReadRepository, Repository, Result};
use discount_core::{Code, PageQuery, StorageError};
use jiff::Timestamp;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, info};

/// PostgreSQL implementation of the repository contract.
///
/// The primary key on `discount_codes.code` is the uniqueness constraint.
/// Bulk inserts rely on `ON CONFLICT DO NOTHING` and redemption is a single
/// `UPDATE ... WHERE used = FALSE`, so concurrent redeemers race inside the
/// database and exactly one of them sees an affected row.
///
/// Timestamps are stored as microseconds since the Unix epoch.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Creates a repository from an existing PostgreSQL connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new PostgreSQL connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Operation(format!("migration failed: {e}")))?;
        info!("postgres migrations applied");
        Ok(())
    }
}

fn to_micros(ts: Timestamp) -> i64 {
    ts.as_microsecond()
}

fn parse_timestamp(column: &str, micros: i64) -> Result<Timestamp> {
    Timestamp::from_microsecond(micros).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{micros}': {e}"))
    })
}

fn decode_row(row: &PgRow) -> Result<DiscountCode> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let used: bool = row.try_get("used").map_err(map_sqlx_error)?;
    let used_at: Option<i64> = row.try_get("used_at").map_err(map_sqlx_error)?;

    Ok(DiscountCode {
        code: Code::new_unchecked(code),
        created_at: parse_timestamp("created_at", created_at)?,
        used,
        used_at: used_at
            .map(|micros| parse_timestamp("used_at", micros))
            .transpose()?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ReadRepository for PgRepository {
    async fn get(&self, code: &Code) -> Result<Option<DiscountCode>> {
        let row = sqlx::query(
            r#"
            SELECT code, created_at, used, used_at
            FROM discount_codes
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn list(&self, query: &PageQuery) -> Result<(Vec<DiscountCode>, u64)> {
        let rows = sqlx::query(
            r#"
            SELECT code, created_at, used, used_at
            FROM discount_codes
            WHERE ($1 = FALSE OR used = FALSE)
            ORDER BY created_at DESC, code ASC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(query.only_unused())
        .bind(to_i64(query.offset()))
        .bind(to_i64(query.limit()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let items = rows.iter().map(decode_row).collect::<Result<Vec<_>>>()?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM discount_codes
            WHERE ($1 = FALSE OR used = FALSE)
            "#,
        )
        .bind(query.only_unused())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok((items, u64::try_from(total).unwrap_or_default()))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn insert_many(&self, codes: &[Code], created_at: Timestamp) -> Result<u64> {
        if codes.is_empty() {
            return Ok(0);
        }

        let values: Vec<String> = codes.iter().map(|code| code.as_str().to_owned()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO discount_codes (code, created_at)
            SELECT c, $2::BIGINT
            FROM UNNEST($1::TEXT[]) AS t(c)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(values)
        .bind(to_micros(created_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            submitted = codes.len(),
            inserted = result.rows_affected(),
            "bulk insert finished"
        );
        Ok(result.rows_affected())
    }

    async fn insert(&self, record: &DiscountCode) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO discount_codes (code, created_at, used, used_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.code.as_str())
        .bind(to_micros(record.created_at))
        .bind(record.used)
        .bind(record.used_at.map(to_micros))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(record.code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn set_used(&self, code: &Code, used: bool, at: Timestamp) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET used = $2,
                used_at = CASE WHEN $2 THEN $3::BIGINT ELSE NULL END
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .bind(used)
        .bind(to_micros(at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, code: &Code) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM discount_codes
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn redeem(&self, code: &Code, at: Timestamp) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE discount_codes
            SET used = TRUE,
                used_at = $2
            WHERE code = $1
              AND used = FALSE
            "#,
        )
        .bind(code.as_str())
        .bind(to_micros(at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }
}
