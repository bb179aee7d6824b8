use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::{InstrumentDB, NewInstrumentDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::instruments::dsl as instruments_dsl;
use tickfill_core::errors::{Error, Result};
use tickfill_core::store::{normalize_symbol, InstrumentStore};
use tickfill_market_data::Instrument;

pub struct InstrumentRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl InstrumentRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl InstrumentStore for InstrumentRepository {
    fn list_instruments(&self) -> Result<Vec<Instrument>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = instruments_dsl::instruments
            .select(InstrumentDB::as_select())
            .order(instruments_dsl::id.asc())
            .load::<InstrumentDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    fn find_instrument(&self, symbol: &str) -> Result<Option<Instrument>> {
        let mut conn = get_connection(&self.pool)?;
        let row = instruments_dsl::instruments
            .filter(instruments_dsl::symbol.eq(normalize_symbol(symbol)))
            .select(InstrumentDB::as_select())
            .first::<InstrumentDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(Instrument::from))
    }

    async fn get_or_create(&self, symbol: &str) -> Result<Instrument> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(Error::InvalidConfigValue(
                "instrument symbol must not be empty".to_string(),
            ));
        }

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Instrument> {
                let new_row = NewInstrumentDB {
                    symbol: symbol.clone(),
                    name: None,
                    industry: None,
                    created_at: Utc::now().to_rfc3339(),
                };
                diesel::insert_or_ignore_into(instruments_dsl::instruments)
                    .values(&new_row)
                    .execute(conn)
                    .into_core()?;

                let row = instruments_dsl::instruments
                    .filter(instruments_dsl::symbol.eq(&symbol))
                    .select(InstrumentDB::as_select())
                    .first::<InstrumentDB>(conn)
                    .into_core()?;
                Ok(Instrument::from(row))
            })
            .await
    }
}
