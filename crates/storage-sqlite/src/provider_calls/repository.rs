use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::DbPool;
use crate::errors::StorageError;
use crate::schema::provider_calls::dsl as provider_calls_dsl;
use crate::utils::chunk_for_sqlite;
use tickfill_market_data::{CallLogStore, CallTime, MarketDataError};

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::provider_calls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderCallDB {
    pub id: i64,
    pub provider_id: String,
    pub called_at: i64,
}

#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::provider_calls)]
pub struct NewProviderCallDB<'a> {
    pub provider_id: &'a str,
    pub called_at: i64,
}

/// Persists provider call times so rate limits hold across restarts.
///
/// The rate limiter calls this synchronously from its worker, so writes use
/// a pooled connection directly instead of the writer actor; SQLite's busy
/// timeout serializes them against the actor.
pub struct ProviderCallRepository {
    pool: Arc<DbPool>,
}

impl ProviderCallRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    fn replace_calls(
        conn: &mut SqliteConnection,
        provider: &str,
        calls: &[CallTime],
    ) -> Result<(), StorageError> {
        conn.immediate_transaction::<_, StorageError, _>(|c| {
            diesel::delete(
                provider_calls_dsl::provider_calls
                    .filter(provider_calls_dsl::provider_id.eq(provider)),
            )
            .execute(c)?;

            let rows: Vec<NewProviderCallDB> = calls
                .iter()
                .map(|&called_at| NewProviderCallDB {
                    provider_id: provider,
                    called_at,
                })
                .collect();
            for chunk in chunk_for_sqlite(&rows) {
                diesel::insert_into(provider_calls_dsl::provider_calls)
                    .values(chunk)
                    .execute(c)?;
            }
            Ok(())
        })
    }
}

impl CallLogStore for ProviderCallRepository {
    fn load_calls(&self, provider: &str) -> Result<Vec<CallTime>, MarketDataError> {
        let mut conn = self.pool.get().map_err(StorageError::from)?;
        let calls = provider_calls_dsl::provider_calls
            .filter(provider_calls_dsl::provider_id.eq(provider))
            .order(provider_calls_dsl::called_at.asc())
            .select(provider_calls_dsl::called_at)
            .load::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(calls)
    }

    fn save_calls(&self, provider: &str, calls: &[CallTime]) -> Result<(), MarketDataError> {
        let mut conn = self.pool.get().map_err(StorageError::from)?;
        Self::replace_calls(&mut conn, provider, calls)?;
        Ok(())
    }
}
