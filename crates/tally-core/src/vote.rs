//! Vote domain types shared by the store, the limiter and the web layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Which counter a vote increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(CoreError::InvalidVoteType(other.to_string())),
        }
    }
}

/// Cumulative counts held by the tally row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl Totals {
    pub fn new(upvotes: u64, downvotes: u64) -> Self {
        Self { upvotes, downvotes }
    }

    /// Number of votes ever accepted.
    pub fn total(&self) -> u64 {
        self.upvotes + self.downvotes
    }
}

/// Opaque, non-empty string identifying a voter for rate limiting.
///
/// Whether it holds a session id or an IP address is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoterIdentity(String);

impl VoterIdentity {
    /// Wraps `raw`, rejecting empty and whitespace-only values.
    pub fn new(raw: impl Into<String>) -> CoreResult<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidIdentity);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something looked wrong while reading the tally, but the read still
/// produced a usable answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// The singleton tally row was missing; zeros were returned.
    MissingTally,
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::MissingTally => f.write_str("tally row is missing"),
        }
    }
}

/// Result of [`VoteStore::get_totals`](crate::VoteStore::get_totals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyRead {
    pub totals: Totals,
    pub warning: Option<IntegrityWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_type_parses_known_values() {
        assert_eq!("upvote".parse::<VoteType>().unwrap(), VoteType::Upvote);
        assert_eq!("downvote".parse::<VoteType>().unwrap(), VoteType::Downvote);
    }

    #[test]
    fn vote_type_rejects_unknown_values() {
        for raw in ["", "Upvote", "up", "sidevote", " upvote"] {
            let err = raw.parse::<VoteType>().unwrap_err();
            assert!(matches!(err, CoreError::InvalidVoteType(_)), "{raw:?}");
        }
    }

    #[test]
    fn vote_type_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&VoteType::Downvote).unwrap(),
            "\"downvote\""
        );
        let parsed: VoteType = serde_json::from_str("\"upvote\"").unwrap();
        assert_eq!(parsed, VoteType::Upvote);
    }

    #[test]
    fn totals_serialize_as_counts() {
        let json = serde_json::to_value(Totals::new(2, 1)).unwrap();
        assert_eq!(json, serde_json::json!({ "upvotes": 2, "downvotes": 1 }));
        assert_eq!(Totals::new(2, 1).total(), 3);
    }

    #[test]
    fn identity_rejects_blank() {
        assert!(matches!(
            VoterIdentity::new(""),
            Err(CoreError::InvalidIdentity)
        ));
        assert!(matches!(
            VoterIdentity::new("   "),
            Err(CoreError::InvalidIdentity)
        ));
    }

    #[test]
    fn identity_keeps_raw_value() {
        let id = VoterIdentity::new("203.0.113.7").unwrap();
        assert_eq!(id.as_str(), "203.0.113.7");
        assert_eq!(id.to_string(), "203.0.113.7");
    }
}
