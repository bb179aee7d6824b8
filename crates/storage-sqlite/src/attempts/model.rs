use diesel::prelude::*;

use tickfill_core::attempts::AttemptRecord;

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::attempts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttemptDB {
    pub instrument_id: i64,
    pub provider_id: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub recorded_at: String,
}

impl AttemptDB {
    pub fn from_record(record: &AttemptRecord, recorded_at: String) -> Self {
        Self {
            instrument_id: record.instrument_id,
            provider_id: record.provider_id.clone(),
            start_ts: record.start,
            end_ts: record.end,
            recorded_at,
        }
    }
}

impl From<AttemptDB> for AttemptRecord {
    fn from(db: AttemptDB) -> Self {
        AttemptRecord::new(db.instrument_id, db.provider_id, db.start_ts, db.end_ts)
    }
}
