use serde::{Deserialize, Serialize};
use tally_core::Totals;

/// Body of `POST /vote`. The vote type is kept raw so that a missing or
/// unknown value gets the same "invalid vote type" answer.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub vote_type: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TotalsResponse {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl From<Totals> for TotalsResponse {
    fn from(totals: Totals) -> Self {
        Self {
            upvotes: totals.upvotes,
            downvotes: totals.downvotes,
        }
    }
}
