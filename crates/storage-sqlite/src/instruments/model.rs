//! Database models for instruments.

use diesel::prelude::*;

use tickfill_market_data::Instrument;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::instruments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstrumentDB {
    pub id: i64,
    pub symbol: String,
    pub name: Option<String>,
    pub industry: Option<String>,
    pub created_at: String,
}

/// Row inserted on first reference to a symbol; the id is assigned by SQLite.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::instruments)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewInstrumentDB {
    pub symbol: String,
    pub name: Option<String>,
    pub industry: Option<String>,
    pub created_at: String,
}

impl From<InstrumentDB> for Instrument {
    fn from(db: InstrumentDB) -> Self {
        Instrument {
            id: db.id,
            symbol: db.symbol,
            name: db.name,
            industry: db.industry,
        }
    }
}
