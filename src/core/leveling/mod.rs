// Leveling: level table, score store port, and the service tying them together.

pub mod level_table;
pub mod leveling_service;
pub mod score_store;

pub use level_table::{Level, LevelTable, LevelTableError};
pub use leveling_service::{LevelingError, LevelingService};
pub use score_store::{ChatKeys, ScoreEntry, ScoreError, ScoreStore, Standing};
