use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::TradingDataDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::trading_data::dsl as trading_data_dsl;
use crate::utils::chunk_for_sqlite;
use tickfill_core::errors::Result;
use tickfill_core::store::TradingDataStore;
use tickfill_market_data::{DataPoint, InstrumentId, Timestamp};

pub struct TradingDataRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TradingDataRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Number of stored bars for an instrument.
    pub fn count(&self, instrument_id: InstrumentId) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        trading_data_dsl::trading_data
            .filter(trading_data_dsl::instrument_id.eq(instrument_id))
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()
    }
}

#[async_trait]
impl TradingDataStore for TradingDataRepository {
    fn load(&self, instrument_id: InstrumentId, min_timestamp: Timestamp) -> Result<Vec<DataPoint>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = trading_data_dsl::trading_data
            .filter(trading_data_dsl::instrument_id.eq(instrument_id))
            .filter(trading_data_dsl::timestamp.ge(min_timestamp))
            .order(trading_data_dsl::timestamp.asc())
            .select(TradingDataDB::as_select())
            .load::<TradingDataDB>(&mut conn)
            .into_core()?;

        let points = rows
            .into_iter()
            .map(DataPoint::try_from)
            .collect::<std::result::Result<Vec<_>, StorageError>>()?;
        Ok(points)
    }

    fn load_timestamps(
        &self,
        instrument_id: InstrumentId,
        min_timestamp: Timestamp,
    ) -> Result<Vec<Timestamp>> {
        let mut conn = get_connection(&self.pool)?;
        trading_data_dsl::trading_data
            .filter(trading_data_dsl::instrument_id.eq(instrument_id))
            .filter(trading_data_dsl::timestamp.ge(min_timestamp))
            .order(trading_data_dsl::timestamp.asc())
            .select(trading_data_dsl::timestamp)
            .load::<i64>(&mut conn)
            .into_core()
    }

    async fn save(&self, instrument_id: InstrumentId, points: &[DataPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let rows: Vec<TradingDataDB> = points
            .iter()
            .map(|point| TradingDataDB::from_point(instrument_id, point))
            .collect();
        let offered = rows.len();

        let inserted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for chunk in chunk_for_sqlite(&rows) {
                    inserted += diesel::insert_or_ignore_into(trading_data_dsl::trading_data)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(inserted)
            })
            .await?;

        debug!(
            "Saved {} of {} bars for instrument {}",
            inserted, offered, instrument_id
        );
        Ok(inserted)
    }
}
