//! Tally core library — vote counting and daily rate limiting.
//!
//! `tally-core` owns the durable state of the voting widget and knows
//! nothing about HTTP. The web frontend (`tally-web`) decides how voters are
//! identified and hands the core an opaque [`VoterIdentity`].
//!
//! # Modules
//!
//! - [`store`] — SQLite-backed [`VoteStore`]: the singleton tally plus the append-only vote log.
//! - [`limiter`] — [`RateLimiter`]: votes per identity per local calendar day.
//! - [`vote`] — Domain types ([`VoteType`], [`Totals`], [`VoterIdentity`]).
//! - [`error`] — Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod error;
pub mod limiter;
pub mod store;
pub mod vote;

pub use error::{CoreError, CoreResult};
pub use limiter::{start_of_day, RateLimiter, DEFAULT_DAILY_LIMIT};
pub use store::VoteStore;
pub use vote::{IntegrityWarning, TallyRead, Totals, VoteType, VoterIdentity};
