//! Preference-indexed waiting pool
//!
//! One FIFO bucket per [`Category`]. Every entry carries a monotonically
//! increasing sequence number so that scans spanning several buckets can be
//! ordered by arrival.

use crate::types::{Category, ConnectionId, Participant};
use std::collections::{HashMap, VecDeque};

/// A participant queued for a partner
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingEntry {
    pub participant: Participant,
    /// Arrival order across all buckets
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct WaitingPool {
    buckets: [VecDeque<WaitingEntry>; 3],
    /// Bucket currently holding each queued connection
    index: HashMap<ConnectionId, Category>,
    next_seq: u64,
}

impl WaitingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant to the tail of the bucket for its own category.
    ///
    /// Returns `false` without touching the pool if the participant is
    /// already queued.
    pub fn enqueue(&mut self, participant: Participant) -> bool {
        if self.contains(&participant.id) {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.index
            .insert(participant.id.clone(), participant.category);
        let bucket = participant.category.index();
        self.buckets[bucket].push_back(WaitingEntry { participant, seq });
        true
    }

    /// Remove a participant from whichever bucket holds it
    pub fn remove(&mut self, connection_id: &str) -> Option<WaitingEntry> {
        let category = self.index.remove(connection_id)?;
        let bucket = &mut self.buckets[category.index()];
        let position = bucket
            .iter()
            .position(|entry| entry.participant.id == connection_id)?;
        bucket.remove(position)
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.index.contains_key(connection_id)
    }

    /// Category of the bucket currently holding the participant
    pub fn bucket_of(&self, connection_id: &str) -> Option<Category> {
        self.index.get(connection_id).copied()
    }

    /// Remove and return the earliest-arrived entry across `categories`
    /// that satisfies `qualifies`.
    pub fn take_first<F>(&mut self, categories: &[Category], mut qualifies: F) -> Option<WaitingEntry>
    where
        F: FnMut(&WaitingEntry) -> bool,
    {
        // Buckets are FIFO, so the first qualifying entry of each bucket is
        // that bucket's earliest; the overall winner has the lowest seq.
        let mut best: Option<(usize, usize, u64)> = None;

        for category in categories {
            let bucket_index = category.index();
            let found = self.buckets[bucket_index]
                .iter()
                .enumerate()
                .find(|(_, entry)| qualifies(*entry));

            if let Some((position, entry)) = found {
                let better = match best {
                    Some((_, _, seq)) => entry.seq < seq,
                    None => true,
                };
                if better {
                    best = Some((bucket_index, position, entry.seq));
                }
            }
        }

        let (bucket_index, position, _) = best?;
        let taken = self.buckets[bucket_index].remove(position)?;
        self.index.remove(&taken.participant.id);
        Some(taken)
    }

    /// Entries of one bucket in FIFO order
    pub fn bucket(&self, category: Category) -> impl Iterator<Item = &WaitingEntry> {
        self.buckets[category.index()].iter()
    }

    pub fn len_of(&self, category: Category) -> usize {
        self.buckets[category.index()].len()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Every queued entry paired with its bucket, bucket by bucket
    pub fn entries(&self) -> impl Iterator<Item = (Category, &WaitingEntry)> {
        Category::ALL.into_iter().flat_map(move |category| {
            self.buckets[category.index()]
                .iter()
                .map(move |entry| (category, entry))
        })
    }

    /// Ids of every queued participant, bucket by bucket
    pub fn waiting_ids(&self) -> Vec<ConnectionId> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|entry| entry.participant.id.clone()))
            .collect()
    }
}
