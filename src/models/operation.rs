//! Operation kinds recorded by the audit engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuditError;

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Entity, field value or relationship member was created
    Create,
    /// Field value was changed
    Modify,
    /// Entity, field value or relationship member was deleted
    Delete,
}

impl Operation {
    /// All operations, in a stable order
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Modify, Operation::Delete];

    /// Numeric code (`1`, `0`, `-1`)
    pub fn code(self) -> i8 {
        match self {
            Operation::Create => 1,
            Operation::Modify => 0,
            Operation::Delete => -1,
        }
    }

    /// Single-character symbol used in change summaries
    pub fn short(self) -> char {
        match self {
            Operation::Create => '+',
            Operation::Modify => '~',
            Operation::Delete => '-',
        }
    }

    /// Past tense verb for log lines
    pub fn past_tense(self) -> &'static str {
        match self {
            Operation::Create => "created",
            Operation::Modify => "modified",
            Operation::Delete => "deleted",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "CREATE"),
            Operation::Modify => write!(f, "MODIFY"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for Operation {
    type Err = AuditError;

    /// Accepts verbs (`create`, `add`), past tense (`created`, `removed`)
    /// and symbols (`+`, `~`, `-`), case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" | "add" | "created" | "added" | "+" => Ok(Operation::Create),
            "modify" | "modified" | "~" => Ok(Operation::Modify),
            "delete" | "remove" | "deleted" | "removed" | "-" => Ok(Operation::Delete),
            other => Err(AuditError::Config(format!("Unknown operation: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Create.to_string(), "CREATE");
        assert_eq!(Operation::Modify.to_string(), "MODIFY");
        assert_eq!(Operation::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_codes_and_symbols() {
        assert_eq!(Operation::Create.code(), 1);
        assert_eq!(Operation::Modify.code(), 0);
        assert_eq!(Operation::Delete.code(), -1);
        assert_eq!(Operation::Modify.short(), '~');
    }

    #[test]
    fn test_parse_vocabulary() {
        assert_eq!("Add".parse::<Operation>().unwrap(), Operation::Create);
        assert_eq!("removed".parse::<Operation>().unwrap(), Operation::Delete);
        assert_eq!("~".parse::<Operation>().unwrap(), Operation::Modify);
        assert!("explode".parse::<Operation>().is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&Operation::Modify).unwrap();
        assert_eq!(json, "\"modify\"");
    }
}
