//! Structured error types shared across TPS crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`TpsError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (replica ids, ensemble labels, lengths).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the path sampler.
///
/// Stopper and ensemble-continuation events during trajectory generation are
/// never reported through this type; they surface as rejected trials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum TpsError {
    /// Setup mistakes: malformed pair lists, weight mismatches, unknown labels.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// No sample satisfies a mover's replica and ensemble filters.
    #[error("selection error: {0}")]
    Selection(ErrorInfo),
    /// Programming-contract violations detected while moving.
    #[error("invariant error: {0}")]
    Invariant(ErrorInfo),
    /// Failures reported by a dynamics engine.
    #[error("engine error: {0}")]
    Engine(ErrorInfo),
    /// Serialization, schema and file errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl TpsError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            TpsError::Config(info)
            | TpsError::Selection(info)
            | TpsError::Invariant(info)
            | TpsError::Engine(info)
            | TpsError::Serde(info) => info,
        }
    }

    /// Returns the stable error code of the payload.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Shorthand for the empty-legal-set error raised by sample selection.
    pub fn empty_selection(mover: &str) -> Self {
        TpsError::Selection(
            ErrorInfo::new("empty-selection", "no legal sample for mover")
                .with_context("mover", mover)
                .with_hint("check the mover's replica and ensemble filters"),
        )
    }
}
