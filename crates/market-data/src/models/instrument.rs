use serde::{Deserialize, Serialize};

use super::types::InstrumentId;

/// A tradable symbol tracked by the system.
///
/// Identity is the symbol; the numeric id is assigned by the store the first
/// time the symbol is referenced and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl Instrument {
    pub fn new(id: InstrumentId, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            name: None,
            industry: None,
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.symbol, self.id)
    }
}
