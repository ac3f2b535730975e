//! Best-effort lead persistence.
//!
//! Leads are diagnostic, not authoritative: every write failure is logged
//! and swallowed so the payment flow never depends on the database. The
//! whole store degrades to a no-op when `DATABASE_URL` is absent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub source: String,
    pub cpf: String,
    pub nome: String,
    pub email: String,
    pub phone: String,
    pub amount_cents: Option<i64>,
    pub title: String,
    pub transaction_id: String,
    pub status: String,
    pub tracking: String,
    pub user_agent: String,
    pub ip: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeadRow {
    pub nome: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub amount_cents: Option<i64>,
    pub title: Option<String>,
    pub tracking: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ComprovanteRow {
    pub id: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_cpf: Option<String>,
    pub customer_email: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub size_bytes: Option<i64>,
    pub mimetype: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Default)]
pub struct LeadStore {
    pool: Option<PgPool>,
}

impl LeadStore {
    /// Connects when a database URL is configured; otherwise every
    /// operation is a no-op.
    pub async fn connect(database_url: Option<&str>) -> Self {
        let Some(url) = database_url else {
            warn!("DATABASE_URL not set, lead persistence disabled");
            return Self { pool: None };
        };

        match PgPoolOptions::new().max_connections(5).connect(url).await {
            Ok(pool) => {
                info!("connected to database");
                Self { pool: Some(pool) }
            }
            Err(err) => {
                error!("database connection failed, persistence disabled: {}", err);
                Self { pool: None }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Idempotent schema setup, run once at startup instead of behind a
    /// per-request flag.
    pub async fn run_migrations(&self) {
        let Some(pool) = &self.pool else { return };

        let create = sqlx::query(
            "CREATE TABLE IF NOT EXISTS leads (\
                 id SERIAL PRIMARY KEY, \
                 created_at TIMESTAMPTZ DEFAULT NOW(), \
                 source TEXT, \
                 cpf TEXT, \
                 nome TEXT, \
                 email TEXT, \
                 phone TEXT, \
                 amount_cents BIGINT, \
                 title TEXT, \
                 transaction_id TEXT, \
                 status TEXT, \
                 tracking TEXT, \
                 user_agent TEXT, \
                 ip TEXT\
             )",
        )
        .execute(pool)
        .await;
        if let Err(err) = create {
            error!("leads table migration failed: {}", err);
            return;
        }
        // Older deployments predate the status column
        if let Err(err) =
            sqlx::query("ALTER TABLE leads ADD COLUMN IF NOT EXISTS status TEXT")
                .execute(pool)
                .await
        {
            error!("leads status column migration failed: {}", err);
        }
    }

    pub async fn save(&self, lead: NewLead) {
        let Some(pool) = &self.pool else { return };

        let result = sqlx::query(
            "INSERT INTO leads (\
                 source, cpf, nome, email, phone, amount_cents, title, \
                 transaction_id, status, tracking, user_agent, ip\
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
        )
        .bind(&lead.source)
        .bind(&lead.cpf)
        .bind(&lead.nome)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.amount_cents)
        .bind(&lead.title)
        .bind(&lead.transaction_id)
        .bind(&lead.status)
        .bind(&lead.tracking)
        .bind(&lead.user_agent)
        .bind(&lead.ip)
        .execute(pool)
        .await;

        if let Err(err) = result {
            error!("failed to save lead: {}", err);
        }
    }

    /// Webhook status transition; also touches the comprovantes table,
    /// which is owned by another service and may not exist.
    pub async fn mark_paid(&self, transaction_id: &str) {
        let Some(pool) = &self.pool else { return };

        if let Err(err) =
            sqlx::query("UPDATE leads SET status = $1 WHERE transaction_id = $2")
                .bind("PAID")
                .bind(transaction_id)
                .execute(pool)
                .await
        {
            error!("failed to update lead status: {}", err);
        }

        if let Err(err) =
            sqlx::query("UPDATE comprovantes SET status = $1 WHERE transaction_id = $2")
                .bind("paid")
                .bind(transaction_id)
                .execute(pool)
                .await
        {
            warn!("comprovantes update skipped: {}", err);
        }
    }

    pub async fn find_by_transaction(&self, transaction_id: &str) -> Option<LeadRow> {
        let pool = self.pool.as_ref()?;

        match sqlx::query_as::<_, LeadRow>(
            "SELECT nome, email, phone, cpf, amount_cents, title, tracking FROM leads \
             WHERE transaction_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(transaction_id)
        .fetch_optional(pool)
        .await
        {
            Ok(row) => row,
            Err(err) => {
                error!("lead lookup failed: {}", err);
                None
            }
        }
    }

    pub async fn list_comprovantes(
        &self,
        limit: i64,
    ) -> anyhow::Result<Vec<ComprovanteRow>> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("database not configured"))?;

        let rows = sqlx::query_as::<_, ComprovanteRow>(
            "SELECT id, created_at, transaction_id, customer_name, customer_cpf, \
                    customer_email, file_url, file_name, size_bytes, mimetype, status \
             FROM comprovantes ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
