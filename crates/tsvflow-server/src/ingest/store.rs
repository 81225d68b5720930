// Record Storage Layer

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use tsvflow_common::types::{FileOutcome, Record};

use super::error::StoreError;

/// Persistence used by the ingestion worker and the query API
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Paths of every file with a recorded outcome, successful or not.
    async fn processed_files(&self) -> Result<Vec<String>, StoreError>;

    async fn save_record(&self, record: &Record) -> Result<(), StoreError>;

    /// Record a file outcome. Saving the same file twice is a no-op.
    async fn save_file_outcome(&self, outcome: &FileOutcome) -> Result<(), StoreError>;

    /// All records of one unit, in insertion order.
    async fn records_by_unit(&self, unit_guid: &str) -> Result<Vec<Record>, StoreError>;
}

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    db: PgPool,
}

impl PgRecordStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    number: String,
    mqtt: String,
    inventory_id: String,
    unit_guid: String,
    message_id: String,
    message_text: String,
    context: String,
    message_class: String,
    level: String,
    area: String,
    address: String,
    block: String,
    kind: String,
    bit: String,
    invert_bit: String,
}

impl From<RecordRow> for Record {
    fn from(row: RecordRow) -> Self {
        Self {
            number: row.number,
            mqtt: row.mqtt,
            inventory_id: row.inventory_id,
            unit_guid: row.unit_guid,
            message_id: row.message_id,
            message_text: row.message_text,
            context: row.context,
            message_class: row.message_class,
            level: row.level,
            area: row.area,
            address: row.address,
            block: row.block,
            kind: row.kind,
            bit: row.bit,
            invert_bit: row.invert_bit,
        }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn processed_files(&self) -> Result<Vec<String>, StoreError> {
        let files: Vec<String> =
            sqlx::query_scalar("SELECT file FROM processed_files ORDER BY processed_at")
                .fetch_all(&self.db)
                .await?;

        debug!(count = files.len(), "Loaded processed files");
        Ok(files)
    }

    async fn save_record(&self, record: &Record) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO records (
                number, mqtt, inventory_id, unit_guid, message_id, message_text,
                context, message_class, level, area, address, block, kind, bit, invert_bit
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&record.number)
        .bind(&record.mqtt)
        .bind(&record.inventory_id)
        .bind(&record.unit_guid)
        .bind(&record.message_id)
        .bind(&record.message_text)
        .bind(&record.context)
        .bind(&record.message_class)
        .bind(&record.level)
        .bind(&record.area)
        .bind(&record.address)
        .bind(&record.block)
        .bind(&record.kind)
        .bind(&record.bit)
        .bind(&record.invert_bit)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn save_file_outcome(&self, outcome: &FileOutcome) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO processed_files (file, error, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (file) DO NOTHING
            "#,
        )
        .bind(&outcome.file)
        .bind(&outcome.error)
        .bind(outcome.processed_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn records_by_unit(&self, unit_guid: &str) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            r#"
            SELECT number, mqtt, inventory_id, unit_guid, message_id, message_text,
                   context, message_class, level, area, address, block, kind, bit, invert_bit
            FROM records
            WHERE unit_guid = $1
            ORDER BY id
            "#,
        )
        .bind(unit_guid)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Record::from).collect())
    }
}
