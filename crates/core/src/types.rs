//! Gemeinsame Identifikationstypen
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen mit anderen
//! Ganzzahlen (Sequenznummern, Sample-Zaehler) zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};

/// Spieler-ID wie sie vom Spielserver vergeben wird (Account-ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i32);

impl PlayerId {
    /// Gibt die innere Ganzzahl zurueck
    pub fn inner(&self) -> i32 {
        self.0
    }
}

impl From<i32> for PlayerId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player:{}", self.0)
    }
}
