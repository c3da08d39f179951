// The level table - an ordered list of XP thresholds, each bound to a title.
// Pure data plus a lookup. No I/O, no platform types.

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One configured tier.
///
/// **Threshold semantics:**
/// `xp` is the exclusive upper bound of the tier, not the minimum needed to
/// reach it. A user with XP below `xp` (and not below an earlier threshold)
/// sits in this tier. The last configured level is the ceiling and also
/// catches everything at or above its own threshold.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Level {
    /// Ordinal shown to users as `{level}`.
    pub level: u32,
    /// Exclusive XP threshold.
    pub xp: i64,
    /// Short title used in the leaderboard listing.
    pub title: String,
    /// Template for the XP card. Placeholders: `{username}`, `{xp}`,
    /// `{level}`, `{rank}`, `{total}`, `{title}`.
    pub format: String,
}

impl Level {
    /// Substitute the five card values into this level's template.
    ///
    /// One left-to-right pass over the template: inserted values are never
    /// scanned again, so a username like `{xp}` comes out verbatim. Unknown
    /// `{...}` sequences are kept as written.
    pub fn format_title(&self, username: &str, xp: i64, rank: u64, total: u64) -> String {
        let mut out = String::with_capacity(self.format.len() + username.len());
        let mut rest = self.format.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];

            let Some(close) = tail.find('}') else {
                rest = tail;
                break;
            };
            let value = match &tail[1..close] {
                "username" => Some(username.to_string()),
                "xp" => Some(xp.to_string()),
                "level" => Some(self.level.to_string()),
                "rank" => Some(rank.to_string()),
                "total" => Some(total.to_string()),
                "title" => Some(self.title.clone()),
                _ => None,
            };

            match value {
                Some(value) => {
                    out.push_str(&value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }

        out.push_str(rest);
        out
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelTableError {
    #[error("No XP levels defined")]
    Empty,

    #[error("XP levels must be in ascending threshold order (level {level} has threshold {xp})")]
    Unsorted { level: u32, xp: i64 },
}

// ============================================================================
// TABLE
// ============================================================================

/// Immutable, validated list of levels shared by every chat.
#[derive(Debug, Clone)]
pub struct LevelTable {
    levels: Vec<Level>,
}

impl LevelTable {
    /// Build a table, rejecting empty or descending lists.
    ///
    /// Equal thresholds are allowed; first match wins, so the later of two
    /// equal levels is never resolved.
    pub fn new(levels: Vec<Level>) -> Result<Self, LevelTableError> {
        if levels.is_empty() {
            return Err(LevelTableError::Empty);
        }

        for pair in levels.windows(2) {
            if pair[1].xp < pair[0].xp {
                return Err(LevelTableError::Unsorted {
                    level: pair[1].level,
                    xp: pair[1].xp,
                });
            }
        }

        Ok(Self { levels })
    }

    /// Resolve the level for an XP balance.
    ///
    /// First level whose threshold exceeds `xp` wins; if none does, the last
    /// level is the ceiling.
    pub fn resolve(&self, xp: i64) -> &Level {
        self.levels
            .iter()
            .find(|level| xp < level.xp)
            .unwrap_or_else(|| self.ceiling())
    }

    fn ceiling(&self) -> &Level {
        // Non-empty is checked in `new`.
        &self.levels[self.levels.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }
}
