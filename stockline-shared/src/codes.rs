use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of records that carry a human-readable display code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Order,
    OrderItem,
    Payment,
    Return,
    ReturnItem,
}

impl CodeKind {
    pub const ALL: [CodeKind; 5] = [
        CodeKind::Order,
        CodeKind::OrderItem,
        CodeKind::Payment,
        CodeKind::Return,
        CodeKind::ReturnItem,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            CodeKind::Order => "ORD",
            CodeKind::OrderItem => "OI",
            CodeKind::Payment => "PAY",
            CodeKind::Return => "RET",
            CodeKind::ReturnItem => "RI",
        }
    }

    /// Key of the counter row backing this kind.
    pub fn sequence_name(&self) -> &'static str {
        match self {
            CodeKind::Order => "orders",
            CodeKind::OrderItem => "order_items",
            CodeKind::Payment => "payments",
            CodeKind::Return => "returns",
            CodeKind::ReturnItem => "return_items",
        }
    }
}

/// A short code such as `ORD-000042`.
///
/// The numeric part always comes from an atomically incremented counter
/// owned by the store; codes are never derived from the largest existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayCode {
    pub kind: CodeKind,
    pub sequence: i64,
}

impl DisplayCode {
    pub fn new(kind: CodeKind, sequence: i64) -> Self {
        Self { kind, sequence }
    }
}

impl fmt::Display for DisplayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:06}", self.kind.prefix(), self.sequence)
    }
}
