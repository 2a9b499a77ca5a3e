//! Status and body classification
//!
//! The node reports many distinct failures behind a handful of status codes,
//! so the status alone is not enough. Rules are kept in one ordered table and
//! evaluated top to bottom; the first rule whose status and body pattern both
//! match decides the [`FailureKind`]. Statuses the table does not claim fall
//! back by range: 5xx always fails with [`FailureKind::ServerError`], 4xx is
//! passed through to the caller.

use std::sync::OnceLock;
use regex::Regex;
use crate::error::FailureKind;

/// Body condition of a rule
#[derive(Debug)]
pub enum BodyPattern {
    /// Any body
    Any,
    /// Body contains the substring
    Contains(&'static str),
    /// Body matches the expression
    Matches(Regex),
}

impl BodyPattern {
    pub fn matches(&self, body: &str) -> bool {
        match self {
            BodyPattern::Any => true,
            BodyPattern::Contains(needle) => body.contains(needle),
            BodyPattern::Matches(regex) => regex.is_match(body),
        }
    }
}

/// One row of the classification table
#[derive(Debug)]
pub struct ClassificationRule {
    pub status: u16,
    pub body: BodyPattern,
    pub kind: FailureKind,
}

impl ClassificationRule {
    pub fn matches(&self, status: u16, body: &str) -> bool {
        self.status == status && self.body.matches(body)
    }
}

/// The rule table in evaluation order
pub fn rules() -> &'static [ClassificationRule] {
    static RULES: OnceLock<Vec<ClassificationRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            ClassificationRule {
                status: 400,
                body: BodyPattern::Contains("AlreadyExpiredException"),
                kind: FailureKind::AlreadyExpired,
            },
            ClassificationRule {
                status: 403,
                body: BodyPattern::Any,
                kind: FailureKind::Forbidden,
            },
            ClassificationRule {
                status: 404,
                body: BodyPattern::Any,
                kind: FailureKind::Missing,
            },
            ClassificationRule {
                status: 409,
                body: BodyPattern::Any,
                kind: FailureKind::Conflict,
            },
            ClassificationRule {
                status: 400,
                body: BodyPattern::Contains("script_lang not supported"),
                kind: FailureKind::ScriptLangNotSupported,
            },
            ClassificationRule {
                status: 500,
                body: BodyPattern::Contains("RoutingMissingException"),
                kind: FailureKind::RoutingMissing,
            },
            ClassificationRule {
                status: 500,
                body: BodyPattern::Matches(
                    Regex::new(r"(?s)ActionRequestValidationException.*no documents to get")
                        .expect("Valid regex pattern"),
                ),
                kind: FailureKind::NoDocumentsToGet,
            },
            ClassificationRule {
                status: 500,
                body: BodyPattern::Contains("NoShardAvailableActionException"),
                kind: FailureKind::NoShardAvailable,
            },
        ]
    })
}

/// Classify a completed response; `None` means the response is returned to the caller
pub fn classify(status: u16, body: &str) -> Option<FailureKind> {
    if let Some(rule) = rules().iter().find(|rule| rule.matches(status, body)) {
        return Some(rule.kind);
    }

    match status {
        500..=599 => Some(FailureKind::ServerError),
        _ => None,
    }
}

/// Message carried by every classified failure
pub fn failure_message(status: u16, transport_error: &str, body: &str) -> String {
    format!("{} Server Exception: {}\n{}", status, transport_error, body)
}
