//! Per-identity daily vote limit.
//!
//! The window is the current local calendar day: it opens at local midnight
//! (inclusive) and has no upper bound, since records are only ever written
//! with the present time.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};

use crate::error::CoreResult;
use crate::store::VoteStore;
use crate::vote::{Totals, VoteType, VoterIdentity};

/// Votes each identity may cast per local day unless configured otherwise.
pub const DEFAULT_DAILY_LIMIT: u32 = 3;

/// Midnight at the start of `now`'s calendar day, in `now`'s time zone.
///
/// If midnight does not exist on that day (a DST gap), the first valid local
/// minute after it is used instead.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let end = now.naive_local();
    let mut local = now.date_naive().and_time(NaiveTime::MIN);
    while local < end {
        if let Some(start) = tz.from_local_datetime(&local).earliest() {
            return start;
        }
        local += Duration::minutes(1);
    }
    now.clone()
}

/// Answers "may this identity vote again today?" from the store's vote log.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    store: VoteStore,
    daily_limit: u32,
}

impl RateLimiter {
    pub fn new(store: VoteStore, daily_limit: u32) -> Self {
        Self { store, daily_limit }
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    pub fn store(&self) -> &VoteStore {
        &self.store
    }

    /// Checks against server local time.
    pub fn may_vote(&self, identity: &VoterIdentity) -> CoreResult<bool> {
        self.may_vote_at(identity, &Local::now())
    }

    /// `true` while `identity` has fewer than `daily_limit` records since the
    /// start of `now`'s day.
    pub fn may_vote_at<Tz: TimeZone>(
        &self,
        identity: &VoterIdentity,
        now: &DateTime<Tz>,
    ) -> CoreResult<bool> {
        Ok(self.used_at(identity, now)? < u64::from(self.daily_limit))
    }

    /// Votes `identity` has left today.
    pub fn remaining_at<Tz: TimeZone>(
        &self,
        identity: &VoterIdentity,
        now: &DateTime<Tz>,
    ) -> CoreResult<u32> {
        let used = self.used_at(identity, now)?;
        let left = u64::from(self.daily_limit).saturating_sub(used);
        Ok(u32::try_from(left).unwrap_or(self.daily_limit))
    }

    /// Records a vote if the identity is still under today's limit.
    pub fn cast(&self, identity: &VoterIdentity, vote_type: VoteType) -> CoreResult<Totals> {
        self.cast_at(identity, vote_type, &Local::now())
    }

    /// Limit check and record in a single store transaction.
    pub fn cast_at<Tz: TimeZone>(
        &self,
        identity: &VoterIdentity,
        vote_type: VoteType,
        now: &DateTime<Tz>,
    ) -> CoreResult<Totals> {
        let window_start = start_of_day(now).with_timezone(&Utc);
        self.store.cast_vote(
            identity,
            vote_type,
            self.daily_limit,
            window_start,
            now.with_timezone(&Utc),
        )
    }

    fn used_at<Tz: TimeZone>(&self, identity: &VoterIdentity, now: &DateTime<Tz>) -> CoreResult<u64> {
        let window_start = start_of_day(now).with_timezone(&Utc);
        self.store.count_since(identity, window_start)
    }
}
