// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Severity ranks and labels for aggregated log lines.
//!
//! The table is fixed: `DEBUG < INFO < WARN < ERROR < FATAL < ANY`. Rank 0 is
//! the most verbose. `ANY` doubles as the fallback label for any rank outside
//! the table, including negative ranks.

use serde::{Deserialize, Deserializer};

/// Severity labels in ascending rank order. (max 5 chars)
pub const SEV_LABELS: [&str; 6] = ["DEBUG", "INFO", "WARN", "ERROR", "FATAL", "ANY"];

/// Severity of a log line, ordered from most to least verbose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Rank 0, the most verbose. Also the starting point of the running
    /// maximum tracked per unit of work.
    #[default]
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    /// Terminal catch-all rank. Any out-of-table rank maps here.
    Any,
}

impl Severity {
    /// Maps an integer rank to a severity. Total: ranks outside the table
    /// (negative or above FATAL) map to [`Severity::Any`].
    #[must_use]
    pub fn from_rank(rank: i32) -> Self {
        match rank {
            0 => Severity::Debug,
            1 => Severity::Info,
            2 => Severity::Warn,
            3 => Severity::Error,
            4 => Severity::Fatal,
            _ => Severity::Any,
        }
    }

    #[must_use]
    pub fn rank(self) -> i32 {
        match self {
            Severity::Debug => 0,
            Severity::Info => 1,
            Severity::Warn => 2,
            Severity::Error => 3,
            Severity::Fatal => 4,
            Severity::Any => 5,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        SEV_LABELS[self.rank() as usize]
    }

    /// Parses a severity label, case-insensitively. Used by configuration to
    /// turn a `min_severity` setting into a rank threshold.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        SEV_LABELS
            .iter()
            .position(|l| *l == upper)
            .map(|rank| Severity::from_rank(rank as i32))
    }
}

/// Label at the given rank, `"ANY"` for any out-of-range rank. Total function.
#[must_use]
pub fn label_for(rank: i32) -> &'static str {
    Severity::from_rank(rank).label()
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Severity::from_label(&label).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "unknown severity label '{label}', expected one of: {}",
                SEV_LABELS.join(", ")
            ))
        })
    }
}
