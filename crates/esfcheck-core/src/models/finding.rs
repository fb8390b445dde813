//! Rule findings and severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Error,
    #[serde(alias = "WARNING")]
    Warn,
    Info,
    Ok,
}

impl Level {
    /// Sort rank: errors first, then warnings, then everything else.
    pub fn rank(self) -> u8 {
        match self {
            Level::Error => 0,
            Level::Warn => 1,
            Level::Info | Level::Ok => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Ok => "OK",
        }
    }

    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" | "ERR" => Some(Level::Error),
            "WARN" | "WARNING" => Some(Level::Warn),
            "INFO" => Some(Level::Info),
            "OK" => Some(Level::Ok),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rule check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable rule code, e.g. `BIN001`.
    pub code: String,
    pub level: Level,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub recommendation: String,
    /// The offending or confirmed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Where the value came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
}

impl Finding {
    pub fn new(code: impl Into<String>, level: Level, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            level,
            title: title.into(),
            description: String::new(),
            recommendation: String::new(),
            value: None,
            provenance: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_provenance(mut self, provenance: Option<&str>) -> Self {
        self.provenance = provenance.filter(|p| !p.is_empty()).map(str::to_string);
        self
    }

    /// Human-readable one-line message: title, then description and
    /// recommendation when present.
    pub fn message(&self) -> String {
        let mut message = self.title.clone();
        for part in [&self.description, &self.recommendation] {
            if !part.is_empty() {
                message.push_str(". ");
                message.push_str(part);
            }
        }
        if let Some(value) = &self.value {
            message.push_str(&format!(" [{}]", value));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_level_rank() {
        assert!(Level::Error.rank() < Level::Warn.rank());
        assert!(Level::Warn.rank() < Level::Info.rank());
        assert_eq!(Level::Info.rank(), Level::Ok.rank());
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("ERROR"), Some(Level::Error));
        assert_eq!(Level::parse("fatal"), None);
    }

    #[test]
    fn test_level_serde() {
        assert_eq!(serde_json::to_string(&Level::Warn).unwrap(), "\"WARN\"");
        let level: Level = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(level, Level::Warn);
    }

    #[test]
    fn test_message() {
        let finding = Finding::new("BIN001", Level::Error, "Invalid supplier BIN")
            .with_recommendation("Check the supplier card")
            .with_value("12345");
        assert_eq!(
            finding.message(),
            "Invalid supplier BIN. Check the supplier card [12345]"
        );
    }
}
