use crate::domain::summary::CounterpartyCount;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterpartyType {
    #[serde(rename = "Smartmoney", alias = "Smart Money")]
    SmartMoney,
    Retail,
    Mixed,
    Unknown,
}

impl CounterpartyType {
    pub fn label(&self) -> &'static str {
        match self {
            CounterpartyType::SmartMoney => "Smart Money",
            CounterpartyType::Retail => "Retail",
            CounterpartyType::Mixed => "Mixed",
            CounterpartyType::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyInfo {
    #[serde(rename = "type")]
    pub kind: CounterpartyType,
}

// Broker codes shipped with the service; replace with COUNTERPARTY_TABLE_PATH.
const BUILTIN: &[(&str, CounterpartyType)] = &[
    ("AK", CounterpartyType::SmartMoney),
    ("BK", CounterpartyType::SmartMoney),
    ("KZ", CounterpartyType::SmartMoney),
    ("RX", CounterpartyType::SmartMoney),
    ("ZP", CounterpartyType::SmartMoney),
    ("YU", CounterpartyType::SmartMoney),
    ("CS", CounterpartyType::SmartMoney),
    ("DX", CounterpartyType::SmartMoney),
    ("AI", CounterpartyType::SmartMoney),
    ("CC", CounterpartyType::Mixed),
    ("LG", CounterpartyType::Mixed),
    ("DR", CounterpartyType::Mixed),
    ("OD", CounterpartyType::Mixed),
    ("YP", CounterpartyType::Retail),
    ("XL", CounterpartyType::Retail),
    ("PD", CounterpartyType::Retail),
    ("XC", CounterpartyType::Retail),
    ("KK", CounterpartyType::Retail),
    ("NI", CounterpartyType::Retail),
    ("CP", CounterpartyType::Retail),
];

/// Read-only name -> category lookup. Unknown names classify as [`CounterpartyType::Unknown`].
#[derive(Debug, Clone, Default)]
pub struct CounterpartyClassifier {
    table: HashMap<String, CounterpartyInfo>,
}

impl CounterpartyClassifier {
    pub fn new(table: HashMap<String, CounterpartyInfo>) -> Self {
        let table = table
            .into_iter()
            .map(|(name, info)| (normalize(&name), info))
            .collect();
        Self { table }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN
                .iter()
                .map(|(name, kind)| (name.to_string(), CounterpartyInfo { kind: *kind }))
                .collect(),
        )
    }

    /// Parses `{ "<name>": "<type>" }`.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let raw: HashMap<String, CounterpartyType> =
            serde_json::from_str(s).context("counterparty table is not a name -> type JSON map")?;
        Ok(Self::new(
            raw.into_iter()
                .map(|(name, kind)| (name, CounterpartyInfo { kind }))
                .collect(),
        ))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read counterparty table {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Table from `path` when configured, otherwise the built-in one.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let classifier = Self::from_path(path)?;
                tracing::info!(path = %path.display(), entries = classifier.len(), "loaded counterparty table");
                Ok(classifier)
            }
            None => Ok(Self::builtin()),
        }
    }

    pub fn classify(&self, name: &str) -> CounterpartyInfo {
        self.table
            .get(&normalize(name))
            .copied()
            .unwrap_or(CounterpartyInfo {
                kind: CounterpartyType::Unknown,
            })
    }

    /// Fills in the category of each ranked counterparty.
    pub fn annotate(&self, counts: &mut [CounterpartyCount]) {
        for c in counts {
            c.kind = Some(self.classify(&c.name).kind);
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_default_category() {
        let c = CounterpartyClassifier::builtin();
        assert_eq!(c.classify("AK").kind, CounterpartyType::SmartMoney);
        assert_eq!(c.classify(" yp ").kind, CounterpartyType::Retail);
        assert_eq!(c.classify("??").kind, CounterpartyType::Unknown);
        assert_eq!(c.classify("").kind, CounterpartyType::Unknown);
    }

    #[test]
    fn injected_table_replaces_builtin() {
        let c = CounterpartyClassifier::from_json_str(r#"{"zz": "Smartmoney", "AK": "Retail"}"#)
            .unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.classify("ZZ").kind, CounterpartyType::SmartMoney);
        assert_eq!(c.classify("AK").kind, CounterpartyType::Retail);
        assert_eq!(c.classify("BK").kind, CounterpartyType::Unknown);
    }

    #[test]
    fn rejects_unknown_type_names() {
        assert!(CounterpartyClassifier::from_json_str(r#"{"AK": "Whale"}"#).is_err());
    }

    #[test]
    fn annotate_sets_kind() {
        let c = CounterpartyClassifier::builtin();
        let mut counts = vec![
            CounterpartyCount { name: "BK".to_string(), count: 2, kind: None },
            CounterpartyCount { name: "QQ".to_string(), count: 1, kind: None },
        ];
        c.annotate(&mut counts);
        assert_eq!(counts[0].kind, Some(CounterpartyType::SmartMoney));
        assert_eq!(counts[1].kind, Some(CounterpartyType::Unknown));
        assert_eq!(CounterpartyType::SmartMoney.label(), "Smart Money");
    }
}
