use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Store-assigned numeric identifier of an instrument
pub type InstrumentId = i64;

/// Whole seconds since the Unix epoch, UTC
pub type Timestamp = i64;
