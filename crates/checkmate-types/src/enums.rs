//! Enumeration types shared across the pipeline.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The three fixed factors that make up a qualification score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub enum FactorKey {
    /// Number of runners counted toward the field.
    FieldSize,
    /// Best odds of the rank-1 runner.
    FavoriteOdds,
    /// Best odds of the rank-2 runner.
    SecondFavoriteOdds,
}

impl FactorKey {
    /// All factor keys in canonical order.
    pub const ALL: [Self; 3] = [Self::FieldSize, Self::FavoriteOdds, Self::SecondFavoriteOdds];

    /// The wire name of the factor (`fieldSize`, `favoriteOdds`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FieldSize => "fieldSize",
            Self::FavoriteOdds => "favoriteOdds",
            Self::SecondFavoriteOdds => "secondFavoriteOdds",
        }
    }
}

impl core::fmt::Display for FactorKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of an ingestion adapter as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "UPPERCASE")]
pub enum AdapterHealth {
    /// The last run completed normally.
    Ok,
    /// The last run failed.
    Error,
}

impl AdapterHealth {
    /// Parse the store's textual status (`OK` / `ERROR`, case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("ok") {
            Some(Self::Ok)
        } else if raw.eq_ignore_ascii_case("error") {
            Some(Self::Error)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_keys_use_camel_case_on_the_wire() {
        for key in FactorKey::ALL {
            let json = serde_json::to_string(&key).ok();
            assert_eq!(json, Some(format!("\"{}\"", key.as_str())));
        }
    }

    #[test]
    fn adapter_health_parses_case_insensitively() {
        assert_eq!(AdapterHealth::parse("ok"), Some(AdapterHealth::Ok));
        assert_eq!(AdapterHealth::parse("ERROR"), Some(AdapterHealth::Error));
        assert_eq!(AdapterHealth::parse("degraded"), None);
        assert_eq!(
            serde_json::to_string(&AdapterHealth::Error).ok().as_deref(),
            Some("\"ERROR\"")
        );
    }
}
