use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::AttemptDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::attempts::dsl as attempts_dsl;
use tickfill_core::attempts::{AttemptRecord, AttemptStore};
use tickfill_core::errors::Result;
use tickfill_market_data::{InstrumentId, Timestamp};

pub struct AttemptRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl AttemptRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl AttemptStore for AttemptRepository {
    fn has_attempt(
        &self,
        instrument_id: InstrumentId,
        start: Timestamp,
        end: Timestamp,
        provider_id: &str,
    ) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let count = attempts_dsl::attempts
            .filter(attempts_dsl::instrument_id.eq(instrument_id))
            .filter(attempts_dsl::provider_id.eq(provider_id))
            .filter(attempts_dsl::start_ts.eq(start))
            .filter(attempts_dsl::end_ts.eq(end))
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()?;
        Ok(count > 0)
    }

    fn load_attempts(&self, instrument_id: InstrumentId) -> Result<Vec<AttemptRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = attempts_dsl::attempts
            .filter(attempts_dsl::instrument_id.eq(instrument_id))
            .order((attempts_dsl::start_ts.asc(), attempts_dsl::provider_id.asc()))
            .select(AttemptDB::as_select())
            .load::<AttemptDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(AttemptRecord::from).collect())
    }

    async fn record_attempt(&self, record: AttemptRecord) -> Result<()> {
        let row = AttemptDB::from_record(&record, Utc::now().to_rfc3339());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_or_ignore_into(attempts_dsl::attempts)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }
}
