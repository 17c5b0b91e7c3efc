//! Partner matching rules
//!
//! The matcher only ever removes from the pool. Inserting a participant that
//! found no partner is the caller's job.

use crate::matchmaking::pool::{WaitingEntry, WaitingPool};
use crate::types::{Category, Participant};

/// Trait for partner matching algorithms
pub trait PartnerMatcher: Send + Sync {
    /// Buckets scanned on behalf of `participant`
    fn candidate_buckets(&self, participant: &Participant) -> Vec<Category>;

    /// Whether a queued candidate accepts `participant`
    fn qualifies(&self, candidate: &Participant, participant: &Participant) -> bool;

    /// Find, remove and return the partner for `participant`, if any
    fn find_match(
        &self,
        pool: &mut WaitingPool,
        participant: &Participant,
    ) -> Option<WaitingEntry> {
        let buckets = self.candidate_buckets(participant);
        pool.take_first(&buckets, |entry| {
            entry.participant.id != participant.id
                && self.qualifies(&entry.participant, participant)
        })
    }
}

/// Default matcher based on declared category preferences
///
/// - A concrete desired category scans only that bucket, FIFO.
/// - "Both" scans the male and female buckets merged by arrival order.
///   The "both" bucket is never searched on a requester's behalf; those
///   participants are only paired by their own declarations.
/// - A candidate qualifies when it desires "both" or the requester's category.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferenceMatcher;

impl PreferenceMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PartnerMatcher for PreferenceMatcher {
    fn candidate_buckets(&self, participant: &Participant) -> Vec<Category> {
        match participant.desired {
            Category::Both => vec![Category::Male, Category::Female],
            concrete => vec![concrete],
        }
    }

    fn qualifies(&self, candidate: &Participant, participant: &Participant) -> bool {
        candidate.desired.accepts(participant.category)
    }
}
