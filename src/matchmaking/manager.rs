//! Session manager: the single owner of matchmaking state
//!
//! Presence, waiting pool and rooms live together behind one mutex. Every
//! operation takes the lock once, finishes its transition, publishes the
//! resulting events and releases the lock, so no two operations can observe
//! the same waiting partner and per-connection event order always follows
//! state order. Delayed re-matches are scheduled after the lock is released.

use crate::error::{MatchError, Result};
use crate::matchmaking::matcher::{PartnerMatcher, PreferenceMatcher};
use crate::matchmaking::pool::WaitingPool;
use crate::matchmaking::presence::PresenceRegistry;
use crate::matchmaking::rematch::RematchDriver;
use crate::matchmaking::rooms::RoomRegistry;
use crate::metrics::MetricsCollector;
use crate::signaling::publisher::EventPublisher;
use crate::signaling::reports::{AbuseReport, LoggingReportForwarder, ReportForwarder};
use crate::types::{
    Category, ConnectionId, LeaveReason, Location, Participant, Placement, Room, RoomId,
    ServerEvent, SignalKind,
};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Read-only snapshot of matchmaking state and cumulative totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchmakingStats {
    /// Connections currently registered
    pub connected: usize,
    /// Connected but neither waiting nor paired
    pub idle: usize,
    /// Rooms currently open
    pub active_rooms: usize,
    pub waiting_total: usize,
    pub waiting_male: usize,
    pub waiting_female: usize,
    pub waiting_both: usize,
    /// Re-matches currently scheduled
    pub pending_rematches: usize,
    pub total_connections: u64,
    pub rooms_opened: u64,
    pub rematches: u64,
    pub signals_relayed: u64,
    pub signals_dropped: u64,
    pub reports_submitted: u64,
}

impl MatchmakingStats {
    pub fn waiting_in(&self, category: Category) -> usize {
        match category {
            Category::Male => self.waiting_male,
            Category::Female => self.waiting_female,
            Category::Both => self.waiting_both,
        }
    }
}

/// What caused a match attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTrigger {
    Declare,
    Next,
    Rematch,
}

impl MatchTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchTrigger::Declare => "declare",
            MatchTrigger::Next => "next",
            MatchTrigger::Rematch => "rematch",
        }
    }
}

/// Result of a match attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A room was opened with `partner`
    Matched {
        room_id: RoomId,
        partner: ConnectionId,
    },
    /// No compatible partner; queued in the pool
    Waiting,
}

#[derive(Debug, Default)]
struct Counters {
    total_connections: u64,
    rooms_opened: u64,
    rematches: u64,
    signals_relayed: u64,
    signals_dropped: u64,
    reports_submitted: u64,
}

#[derive(Debug, Default)]
struct CoreState {
    presence: PresenceRegistry,
    pool: WaitingPool,
    rooms: RoomRegistry,
    counters: Counters,
}

/// The main session manager
#[derive(Clone)]
pub struct SessionManager {
    /// Presence, pool and rooms under one lock
    state: Arc<Mutex<CoreState>>,
    /// Partner matching rule
    matcher: Arc<dyn PartnerMatcher>,
    /// Outbound event sink
    event_publisher: Arc<dyn EventPublisher>,
    /// Destination for abuse reports
    report_forwarder: Arc<dyn ReportForwarder>,
    /// Delayed re-match scheduling
    rematch: Arc<RematchDriver>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl SessionManager {
    /// Create a session manager with the default matcher and report forwarder
    pub fn new(
        event_publisher: Arc<dyn EventPublisher>,
        metrics_collector: Arc<MetricsCollector>,
        rematch_delay: Duration,
    ) -> Self {
        Self::with_components(
            event_publisher,
            Arc::new(PreferenceMatcher::new()),
            Arc::new(LoggingReportForwarder),
            metrics_collector,
            rematch_delay,
        )
    }

    /// Create with custom matcher and report forwarder
    pub fn with_components(
        event_publisher: Arc<dyn EventPublisher>,
        matcher: Arc<dyn PartnerMatcher>,
        report_forwarder: Arc<dyn ReportForwarder>,
        metrics_collector: Arc<MetricsCollector>,
        rematch_delay: Duration,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CoreState::default())),
            matcher,
            event_publisher,
            report_forwarder,
            rematch: Arc::new(RematchDriver::new(rematch_delay)),
            metrics_collector,
        }
    }

    /// Register a new connection as idle
    pub fn connect(&self, connection_id: &str, location: Location) -> Result<()> {
        let mut state = self.lock_state()?;

        if !state
            .presence
            .insert(connection_id.to_string(), location.clone(), current_timestamp())
        {
            warn!(
                "Duplicate connect ignored - connection_id: '{}'",
                connection_id
            );
            return Ok(());
        }

        state.counters.total_connections += 1;
        self.metrics_collector.record_connection();
        self.refresh_gauges(&state);

        info!(
            "Participant connected - connection_id: '{}', location: {} ({}), connected: {}",
            connection_id,
            location.name,
            location.code,
            state.presence.len()
        );
        Ok(())
    }

    /// Declare category and desired partner category, then match or enqueue.
    ///
    /// A participant that is already waiting or paired first leaves its
    /// current placement; a former partner is told `next` and re-matched.
    pub fn declare_preferences(
        &self,
        connection_id: &str,
        category: Category,
        desired: Category,
    ) -> Result<MatchOutcome> {
        let timer = self.metrics_collector.start_timer();

        let (outcome, survivor) = {
            let mut state = self.lock_state()?;
            self.rematch.cancel(connection_id)?;

            let location = match state.presence.get_mut(connection_id) {
                Some(entry) => {
                    entry.rematch_pending = false;
                    entry.location.clone()
                }
                None => {
                    return Err(MatchError::ParticipantNotFound {
                        connection_id: connection_id.to_string(),
                    }
                    .into())
                }
            };

            let survivor = self.leave_placement(&mut state, connection_id, LeaveReason::Next);

            let participant = Participant {
                id: connection_id.to_string(),
                category,
                desired,
                location,
                joined_at: current_timestamp(),
            };
            if let Some(entry) = state.presence.get_mut(connection_id) {
                entry.participant = Some(participant.clone());
            }

            info!(
                "Preferences declared - connection_id: '{}', category: {}, desired: {}",
                connection_id, category, desired
            );

            let outcome = self.match_or_enqueue(&mut state, participant, MatchTrigger::Declare);
            self.refresh_gauges(&state);
            (outcome, survivor)
        };

        if let Some(survivor) = survivor {
            self.schedule_rematch(survivor)?;
        }

        self.metrics_collector
            .record_operation("declare_preferences", timer.stop());
        Ok(outcome)
    }

    /// Forward a negotiation message to the sender's partner.
    ///
    /// Returns `false` when the room is gone or the sender is not a member;
    /// such messages are dropped without notifying anyone.
    pub fn relay_signal(
        &self,
        sender: &str,
        room_id: RoomId,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<bool> {
        let mut state = self.lock_state()?;

        let target = state.rooms.relay_target(&room_id, sender).cloned();
        match target {
            Some(target) => {
                state.counters.signals_relayed += 1;
                self.emit(
                    &target,
                    ServerEvent::signal(kind, room_id, sender.to_string(), payload),
                );
                self.metrics_collector.record_signal(kind, true);
                debug!(
                    "Relayed {} - room: {}, from: '{}', to: '{}'",
                    kind.as_str(),
                    room_id,
                    sender,
                    target
                );
                Ok(true)
            }
            None => {
                state.counters.signals_dropped += 1;
                self.metrics_collector.record_signal(kind, false);
                debug!(
                    "Dropped {} - sender '{}' is not in room {}",
                    kind.as_str(),
                    sender,
                    room_id
                );
                Ok(false)
            }
        }
    }

    /// Remove a connection and everything it holds.
    ///
    /// Idempotent: returns `false` when the connection is already gone.
    pub fn disconnect(&self, connection_id: &str) -> Result<bool> {
        let timer = self.metrics_collector.start_timer();

        let survivor = {
            let mut state = self.lock_state()?;
            self.rematch.cancel(connection_id)?;

            let entry = match state.presence.remove(connection_id) {
                Some(entry) => entry,
                None => {
                    debug!(
                        "Disconnect for unknown connection ignored - connection_id: '{}'",
                        connection_id
                    );
                    return Ok(false);
                }
            };

            state.pool.remove(connection_id);
            let survivor = self.close_room(&mut state, connection_id, LeaveReason::Disconnect);

            self.metrics_collector.record_disconnection();
            self.refresh_gauges(&state);

            let connected_for = current_timestamp() - entry.connected_at;
            info!(
                "Participant disconnected - connection_id: '{}', connected_for: {}s, partner: {:?}",
                connection_id,
                connected_for.num_seconds(),
                survivor
            );
            survivor
        };

        if let Some(survivor) = survivor {
            self.schedule_rematch(survivor)?;
        }

        self.metrics_collector
            .record_operation("disconnect", timer.stop());
        Ok(true)
    }

    /// Leave the current partner and immediately look for another.
    ///
    /// The former partner is told `next` and re-matched after the delay.
    /// Returns `None` when nothing was done: the participant is already
    /// waiting or has not declared preferences yet.
    pub fn request_next(&self, connection_id: &str) -> Result<Option<MatchOutcome>> {
        let (outcome, survivor) = {
            let mut state = self.lock_state()?;
            self.rematch.cancel(connection_id)?;

            let (placement, participant) = match state.presence.get_mut(connection_id) {
                Some(entry) => {
                    entry.rematch_pending = false;
                    (entry.placement, entry.participant.clone())
                }
                None => {
                    return Err(MatchError::ParticipantNotFound {
                        connection_id: connection_id.to_string(),
                    }
                    .into())
                }
            };

            let participant = match participant {
                Some(participant) => participant,
                None => {
                    debug!(
                        "Next requested before preferences were declared - connection_id: '{}'",
                        connection_id
                    );
                    return Ok(None);
                }
            };

            let survivor = match placement {
                Placement::Waiting(_) => {
                    debug!(
                        "Next requested while already waiting - connection_id: '{}'",
                        connection_id
                    );
                    return Ok(None);
                }
                Placement::Idle => None,
                Placement::InRoom(_) => {
                    self.leave_placement(&mut state, connection_id, LeaveReason::Next)
                }
            };

            info!("Next requested - connection_id: '{}'", connection_id);
            let outcome = self.match_or_enqueue(&mut state, participant, MatchTrigger::Next);
            self.refresh_gauges(&state);
            (outcome, survivor)
        };

        if let Some(survivor) = survivor {
            self.schedule_rematch(survivor)?;
        }

        Ok(Some(outcome))
    }

    /// Stop searching, or leave the current room, and go idle.
    ///
    /// Returns whether the participant was waiting or paired.
    pub fn cancel(&self, connection_id: &str) -> Result<bool> {
        let (was_placed, survivor) = {
            let mut state = self.lock_state()?;
            self.rematch.cancel(connection_id)?;

            let placement = match state.presence.get_mut(connection_id) {
                Some(entry) => {
                    entry.rematch_pending = false;
                    entry.placement
                }
                None => {
                    return Err(MatchError::ParticipantNotFound {
                        connection_id: connection_id.to_string(),
                    }
                    .into())
                }
            };

            let survivor = self.leave_placement(&mut state, connection_id, LeaveReason::Cancel);
            self.refresh_gauges(&state);

            if placement != Placement::Idle {
                info!(
                    "Matching cancelled - connection_id: '{}', was: {:?}",
                    connection_id, placement
                );
            }
            (placement != Placement::Idle, survivor)
        };

        if let Some(survivor) = survivor {
            self.schedule_rematch(survivor)?;
        }

        Ok(was_placed)
    }

    /// Accept an abuse report, acknowledge it and hand it to the forwarder.
    ///
    /// Returns whether the reported partner could be identified.
    pub fn report(&self, reporter: &str, room_id: RoomId, reason: &str) -> Result<bool> {
        let report = {
            let mut state = self.lock_state()?;

            if !state.presence.contains(reporter) {
                return Err(MatchError::ParticipantNotFound {
                    connection_id: reporter.to_string(),
                }
                .into());
            }

            let reported = state
                .rooms
                .get(&room_id)
                .and_then(|room| room.partner_of(reporter))
                .cloned();

            state.counters.reports_submitted += 1;
            self.emit(reporter, ServerEvent::ReportSubmitted { room_id });

            AbuseReport {
                reporter: reporter.to_string(),
                reported,
                room_id,
                reason: reason.to_string(),
                submitted_at: current_timestamp(),
            }
        };

        self.metrics_collector.record_report();
        self.report_forwarder.forward(&report)?;
        Ok(report.reported.is_some())
    }

    /// Fire a scheduled re-match for a participant whose partner left.
    ///
    /// A no-op unless the participant is still connected, idle and owed a
    /// re-match.
    pub fn run_rematch(&self, connection_id: &str) -> Result<Option<MatchOutcome>> {
        let mut state = self.lock_state()?;

        let participant = match state.presence.get_mut(connection_id) {
            Some(entry) if entry.rematch_pending && entry.is_idle() => {
                entry.rematch_pending = false;
                entry.participant.clone()
            }
            _ => None,
        };

        let participant = match participant {
            Some(participant) => participant,
            None => {
                debug!(
                    "Stale re-match skipped - connection_id: '{}'",
                    connection_id
                );
                self.metrics_collector.record_rematch("stale");
                return Ok(None);
            }
        };

        state.counters.rematches += 1;
        info!("Re-matching participant - connection_id: '{}'", connection_id);

        let outcome = self.match_or_enqueue(&mut state, participant, MatchTrigger::Rematch);
        self.metrics_collector.record_rematch(match outcome {
            MatchOutcome::Matched { .. } => "matched",
            MatchOutcome::Waiting => "waiting",
        });
        self.refresh_gauges(&state);
        Ok(Some(outcome))
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> Result<MatchmakingStats> {
        let state = self.lock_state()?;
        Ok(self.snapshot(&state))
    }

    /// Current placement of a connection
    pub fn placement_of(&self, connection_id: &str) -> Result<Option<Placement>> {
        let state = self.lock_state()?;
        Ok(state
            .presence
            .get(connection_id)
            .map(|entry| entry.placement))
    }

    /// Latest declared preferences of a connection
    pub fn participant(&self, connection_id: &str) -> Result<Option<Participant>> {
        let state = self.lock_state()?;
        Ok(state
            .presence
            .get(connection_id)
            .and_then(|entry| entry.participant.clone()))
    }

    /// Room record by id
    pub fn room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let state = self.lock_state()?;
        Ok(state.rooms.get(room_id).cloned())
    }

    /// Whether a delayed re-match is scheduled for the connection
    pub fn has_pending_rematch(&self, connection_id: &str) -> bool {
        self.rematch.is_pending(connection_id)
    }

    /// Cancel every scheduled re-match (shutdown)
    pub fn cancel_pending_rematches(&self) -> Result<usize> {
        self.rematch.cancel_all()
    }

    /// Verify that presence, pool and rooms agree with each other
    pub fn check_invariants(&self) -> Result<()> {
        let state = self.lock_state()?;

        let violation = |message: String| -> anyhow::Error {
            MatchError::InvariantViolation { message }.into()
        };

        // One walk over the buckets; every later lookup is a hash lookup
        let mut queued: HashMap<&str, Category> = HashMap::with_capacity(state.pool.len());
        for (category, entry) in state.pool.entries() {
            let id = entry.participant.id.as_str();
            if queued.insert(id, category).is_some() {
                return Err(violation(format!("participant '{}' is queued twice", id)));
            }
            if state.pool.bucket_of(id) != Some(category) {
                return Err(violation(format!(
                    "pool index disagrees with bucket {} for '{}'",
                    category, id
                )));
            }
            if !state.presence.contains(id) {
                return Err(violation(format!(
                    "disconnected participant '{}' is still waiting",
                    id
                )));
            }
        }

        for entry in state.presence.iter() {
            let id = &entry.connection_id;
            let bucket = queued.get(id.as_str()).copied();
            let room = state.rooms.room_of(id);

            match entry.placement {
                Placement::Idle => {
                    if bucket.is_some() || room.is_some() {
                        return Err(violation(format!(
                            "idle participant '{}' is still placed (bucket: {:?}, room: {:?})",
                            id, bucket, room
                        )));
                    }
                }
                Placement::Waiting(category) => {
                    if bucket != Some(category) {
                        return Err(violation(format!(
                            "participant '{}' should wait in {} but is in {:?}",
                            id, category, bucket
                        )));
                    }
                    if room.is_some() {
                        return Err(violation(format!(
                            "participant '{}' is both waiting and in a room",
                            id
                        )));
                    }
                    match &entry.participant {
                        Some(participant) if participant.category == category => {}
                        _ => {
                            return Err(violation(format!(
                                "participant '{}' waits in a bucket other than its category",
                                id
                            )))
                        }
                    }
                }
                Placement::InRoom(room_id) => {
                    if bucket.is_some() {
                        return Err(violation(format!(
                            "participant '{}' is both in room {} and waiting",
                            id, room_id
                        )));
                    }
                    let contained = state
                        .rooms
                        .get(&room_id)
                        .map(|room| room.contains(id))
                        .unwrap_or(false);
                    if room != Some(room_id) || !contained {
                        return Err(violation(format!(
                            "participant '{}' points at room {} which does not hold it",
                            id, room_id
                        )));
                    }
                }
            }
        }

        for room in state.rooms.iter() {
            if room.members[0] == room.members[1] {
                return Err(violation(format!(
                    "room {} pairs a participant with itself",
                    room.id
                )));
            }
            for member in room.members.iter() {
                match state.presence.get(member) {
                    Some(entry) if entry.placement == Placement::InRoom(room.id) => {}
                    _ => {
                        return Err(violation(format!(
                            "room {} has member '{}' that is not placed in it",
                            room.id, member
                        )))
                    }
                }
            }
        }

        if state.rooms.member_count() != state.rooms.len() * 2 {
            return Err(violation(format!(
                "{} rooms index {} members",
                state.rooms.len(),
                state.rooms.member_count()
            )));
        }

        let derived_idle = self.snapshot(&state).idle;
        if state.presence.idle_count() != derived_idle {
            return Err(violation(format!(
                "{} idle entries but counts imply {}",
                state.presence.idle_count(),
                derived_idle
            )));
        }

        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CoreState>> {
        self.state.lock().map_err(|_| {
            MatchError::InternalError {
                message: "Failed to acquire session state lock".to_string(),
            }
            .into()
        })
    }

    fn emit(&self, connection_id: &str, event: ServerEvent) {
        let name = event.name();
        if let Err(e) = self.event_publisher.publish(connection_id, event) {
            debug!(
                "Failed to deliver '{}' to '{}': {}",
                name, connection_id, e
            );
        }
    }

    /// Pair `participant` with a compatible waiting partner, or queue it
    fn match_or_enqueue(
        &self,
        state: &mut CoreState,
        mut participant: Participant,
        trigger: MatchTrigger,
    ) -> MatchOutcome {
        // Waiting time counts from this entry into matching, not from the
        // declaration that started an earlier session
        participant.joined_at = current_timestamp();
        if let Some(entry) = state.presence.get_mut(&participant.id) {
            entry.participant = Some(participant.clone());
        }

        match self.matcher.find_match(&mut state.pool, &participant) {
            Some(found) => {
                let partner = found.participant;
                let room = state
                    .rooms
                    .open_room(participant.id.clone(), partner.id.clone());

                state
                    .presence
                    .set_placement(&participant.id, Placement::InRoom(room.id));
                if let Some(entry) = state.presence.get_mut(&partner.id) {
                    entry.placement = Placement::InRoom(room.id);
                    entry.rematch_pending = false;
                }
                state.counters.rooms_opened += 1;

                let partner_waited = (current_timestamp() - partner.joined_at)
                    .to_std()
                    .unwrap_or_default();
                self.metrics_collector.record_match(trigger, partner_waited);

                self.emit(
                    &participant.id,
                    ServerEvent::MatchFound {
                        room_id: room.id,
                        partner: (&partner).into(),
                        initiator: true,
                    },
                );
                self.emit(
                    &partner.id,
                    ServerEvent::MatchFound {
                        room_id: room.id,
                        partner: (&participant).into(),
                        initiator: false,
                    },
                );

                info!(
                    "Match found - room: {}, initiator: '{}' ({}->{}), partner: '{}' ({}->{}), trigger: {}",
                    room.id,
                    participant.id,
                    participant.category,
                    participant.desired,
                    partner.id,
                    partner.category,
                    partner.desired,
                    trigger.as_str()
                );

                MatchOutcome::Matched {
                    room_id: room.id,
                    partner: partner.id,
                }
            }
            None => {
                let connection_id = participant.id.clone();
                let category = participant.category;

                if !state.pool.enqueue(participant) {
                    error!(
                        "Participant '{}' was already queued while idle",
                        connection_id
                    );
                }
                state
                    .presence
                    .set_placement(&connection_id, Placement::Waiting(category));
                self.emit(&connection_id, ServerEvent::WaitingForMatch);

                debug!(
                    "No partner available - connection_id: '{}', waiting in: {}, pool size: {}",
                    connection_id,
                    category,
                    state.pool.len()
                );
                MatchOutcome::Waiting
            }
        }
    }

    /// Take a participant out of the pool or its room and mark it idle.
    ///
    /// Returns the former partner that is now owed a re-match.
    fn leave_placement(
        &self,
        state: &mut CoreState,
        connection_id: &str,
        reason: LeaveReason,
    ) -> Option<ConnectionId> {
        let placement = state.presence.get(connection_id)?.placement;
        state.presence.set_placement(connection_id, Placement::Idle);

        match placement {
            Placement::Idle => None,
            Placement::Waiting(_) => {
                state.pool.remove(connection_id);
                None
            }
            Placement::InRoom(_) => self.close_room(state, connection_id, reason),
        }
    }

    /// Destroy the room of `departing` and notify the remaining member
    fn close_room(
        &self,
        state: &mut CoreState,
        departing: &str,
        reason: LeaveReason,
    ) -> Option<ConnectionId> {
        let closed = state.rooms.close_room_of(departing)?;
        let remaining = closed.remaining;

        if let Some(entry) = state.presence.get_mut(&remaining) {
            entry.placement = Placement::Idle;
            entry.rematch_pending = true;
        }

        self.emit(&remaining, ServerEvent::PartnerLeft { reason });
        self.metrics_collector.record_partner_left(reason);

        info!(
            "Room closed - room: {}, departing: '{}', remaining: '{}', reason: {}",
            closed.room.id, departing, remaining, reason
        );
        Some(remaining)
    }

    fn schedule_rematch(&self, connection_id: ConnectionId) -> Result<()> {
        let manager = self.clone();
        let task_connection_id = connection_id.clone();

        debug!(
            "Scheduling re-match - connection_id: '{}', delay: {}ms",
            connection_id,
            self.rematch.delay().as_millis()
        );

        self.rematch.schedule(connection_id, move || {
            if let Err(e) = manager.run_rematch(&task_connection_id) {
                error!(
                    "Re-match failed - connection_id: '{}', error: {}",
                    task_connection_id, e
                );
            }
        })
    }

    fn snapshot(&self, state: &CoreState) -> MatchmakingStats {
        MatchmakingStats {
            connected: state.presence.len(),
            idle: state
                .presence
                .len()
                .saturating_sub(state.pool.len() + state.rooms.member_count()),
            active_rooms: state.rooms.len(),
            waiting_total: state.pool.len(),
            waiting_male: state.pool.len_of(Category::Male),
            waiting_female: state.pool.len_of(Category::Female),
            waiting_both: state.pool.len_of(Category::Both),
            pending_rematches: self.rematch.pending_count(),
            total_connections: state.counters.total_connections,
            rooms_opened: state.counters.rooms_opened,
            rematches: state.counters.rematches,
            signals_relayed: state.counters.signals_relayed,
            signals_dropped: state.counters.signals_dropped,
            reports_submitted: state.counters.reports_submitted,
        }
    }

    fn refresh_gauges(&self, state: &CoreState) {
        self.metrics_collector
            .update_from_session_stats(&self.snapshot(state));
    }
}
