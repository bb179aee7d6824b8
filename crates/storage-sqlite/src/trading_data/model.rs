//! Database model for minute bars.
//!
//! Prices and volume are stored as text so decimals survive unchanged.

use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;
use tickfill_market_data::{DataPoint, InstrumentId};

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::trading_data)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_default_value = false)]
pub struct TradingDataDB {
    pub instrument_id: i64,
    pub timestamp: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub vwap: Option<String>,
}

impl TradingDataDB {
    pub fn from_point(instrument_id: InstrumentId, point: &DataPoint) -> Self {
        Self {
            instrument_id,
            timestamp: point.timestamp,
            open: point.open.to_string(),
            high: point.high.to_string(),
            low: point.low.to_string(),
            close: point.close.to_string(),
            volume: point.volume.to_string(),
            vwap: point.vwap.map(|v| v.to_string()),
        }
    }
}

fn parse_decimal(column: &str, value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(value)
        .map_err(|e| StorageError::InvalidValue(format!("{column} '{value}': {e}")))
}

impl TryFrom<TradingDataDB> for DataPoint {
    type Error = StorageError;

    fn try_from(db: TradingDataDB) -> Result<Self, Self::Error> {
        Ok(DataPoint {
            timestamp: db.timestamp,
            open: parse_decimal("open", &db.open)?,
            high: parse_decimal("high", &db.high)?,
            low: parse_decimal("low", &db.low)?,
            close: parse_decimal("close", &db.close)?,
            volume: parse_decimal("volume", &db.volume)?,
            vwap: db
                .vwap
                .as_deref()
                .map(|v| parse_decimal("vwap", v))
                .transpose()?,
        })
    }
}
