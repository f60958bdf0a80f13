use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::incident::Incident;

/// Sequence number handed out when a list fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Default)]
struct BoardState {
    incidents: Vec<Incident>,
    applied: u64,
    loaded: bool,
    /// Optimistic copy of each incident with a write outstanding.
    in_flight: HashMap<i64, Incident>,
}

/// Locally displayed incident list.
///
/// Overlapping refreshes resolve by start order: a response is applied only
/// if its ticket is newer than the one already applied, and always replaces
/// the whole list. Incidents with a write still in flight keep their
/// optimistic status and assignment across a replace.
#[derive(Default)]
pub struct IncidentBoard {
    state: Mutex<BoardState>,
    next_ticket: AtomicU64,
}

impl IncidentBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns false when the response is older than what is shown.
    pub fn apply_fetch(&self, ticket: FetchTicket, incidents: Vec<Incident>) -> bool {
        let mut state = self.lock();
        if ticket.0 <= state.applied {
            debug!(ticket = ticket.0, applied = state.applied, "Discarding stale incident list");
            return false;
        }
        let BoardState {
            incidents: shown,
            applied,
            loaded,
            in_flight,
        } = &mut *state;
        *applied = ticket.0;
        *shown = incidents;
        for incident in shown.iter_mut() {
            if let Some(pending) = in_flight.get(&incident.id) {
                debug!(incident_id = incident.id, "Keeping optimistic fields over refresh");
                overlay(incident, pending);
            }
        }
        *loaded = true;
        true
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn snapshot(&self) -> Vec<Incident> {
        self.lock().incidents.clone()
    }

    pub fn get(&self, id: i64) -> Option<Incident> {
        self.lock().incidents.iter().find(|i| i.id == id).cloned()
    }

    /// Show a newly created incident before the next refresh.
    pub fn insert(&self, incident: Incident) {
        let mut state = self.lock();
        state.incidents.retain(|i| i.id != incident.id);
        state.incidents.insert(0, incident);
    }

    pub fn update<R>(&self, id: i64, f: impl FnOnce(&mut Incident) -> R) -> Result<R> {
        let mut state = self.lock();
        let incident = state
            .incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("incident {}", id)))?;
        Ok(f(incident))
    }

    /// Like `update`, but also claims the in-flight slot for `id`.
    pub fn begin_update<R>(&self, id: i64, f: impl FnOnce(&mut Incident) -> Result<R>) -> Result<R> {
        let mut state = self.lock();
        if state.in_flight.contains_key(&id) {
            return Err(Error::AlreadyInFlight(id));
        }
        let incident = state
            .incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Error::NotFound(format!("incident {}", id)))?;
        let out = f(incident)?;
        let pending = incident.clone();
        state.in_flight.insert(id, pending);
        Ok(out)
    }

    pub fn finish_update(&self, id: i64) {
        self.lock().in_flight.remove(&id);
    }

    /// Show the backend's confirmed record, with `keep` re-applying the
    /// confirmed local change, and release the in-flight slot. Returns what
    /// is shown, or the record itself if the incident left the board.
    pub fn confirm_update(
        &self,
        mut confirmed: Incident,
        keep: impl FnOnce(&mut Incident),
    ) -> Incident {
        keep(&mut confirmed);
        let mut state = self.lock();
        state.in_flight.remove(&confirmed.id);
        match state.incidents.iter_mut().find(|i| i.id == confirmed.id) {
            Some(shown) => *shown = confirmed.clone(),
            None => debug!(incident_id = confirmed.id, "Confirmed incident no longer listed"),
        }
        confirmed
    }

    pub fn is_in_flight(&self, id: i64) -> bool {
        self.lock().in_flight.contains_key(&id)
    }

    /// Drop everything on logout. Tickets keep counting so in-flight
    /// responses from the old session are discarded.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.incidents.clear();
        state.in_flight.clear();
        state.loaded = false;
        state.applied = self.next_ticket.load(Ordering::SeqCst);
    }
}

fn overlay(incident: &mut Incident, pending: &Incident) {
    incident.status = pending.status;
    incident.assigned_user_id = pending.assigned_user_id;
    incident.assigned_user = pending.assigned_user.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::incident;
    use crate::types::incident::{IncidentStatus, Provenance};

    #[test]
    fn newer_ticket_wins_regardless_of_arrival() {
        let board = IncidentBoard::new();
        let a = board.begin_fetch();
        let b = board.begin_fetch();

        assert!(board.apply_fetch(b, vec![incident(2, None, Provenance::Camera)]));
        assert!(!board.apply_fetch(a, vec![incident(1, None, Provenance::Camera)]));
        let ids: Vec<i64> = board.snapshot().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn in_order_responses_apply() {
        let board = IncidentBoard::new();
        assert!(!board.is_loaded());
        let a = board.begin_fetch();
        assert!(board.apply_fetch(a, vec![]));
        let b = board.begin_fetch();
        assert!(board.apply_fetch(b, vec![incident(5, Some(1), Provenance::Camera)]));
        assert!(board.is_loaded());
        assert_eq!(board.snapshot().len(), 1);
    }

    #[test]
    fn begin_update_blocks_second_claim() {
        let board = IncidentBoard::new();
        let t = board.begin_fetch();
        board.apply_fetch(t, vec![incident(1, None, Provenance::Camera)]);

        board.begin_update(1, |_| Ok(())).unwrap();
        assert!(board.is_in_flight(1));
        assert_eq!(
            board.begin_update(1, |_| Ok(())).unwrap_err(),
            Error::AlreadyInFlight(1)
        );
        board.finish_update(1);
        assert!(board.begin_update(1, |_| Ok(())).is_ok());
    }

    #[test]
    fn failed_claim_leaves_slot_free() {
        let board = IncidentBoard::new();
        let t = board.begin_fetch();
        board.apply_fetch(t, vec![incident(1, None, Provenance::Camera)]);
        let err = board
            .begin_update(1, |_| -> Result<()> { Err(Error::Validation("no".into())) })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!board.is_in_flight(1));
        assert!(matches!(board.begin_update(99, |_| Ok(())), Err(Error::NotFound(_))));
    }

    #[test]
    fn clear_discards_responses_from_before_logout() {
        let board = IncidentBoard::new();
        let old = board.begin_fetch();
        board.clear();
        assert!(!board.apply_fetch(old, vec![incident(1, None, Provenance::Camera)]));
        assert!(board.snapshot().is_empty());
        let fresh = board.begin_fetch();
        assert!(board.apply_fetch(fresh, vec![]));
    }

    #[test]
    fn insert_puts_new_incident_first() {
        let board = IncidentBoard::new();
        let t = board.begin_fetch();
        board.apply_fetch(t, vec![incident(1, None, Provenance::Camera)]);
        board.insert(incident(2, None, Provenance::ViewerReport));
        assert_eq!(board.snapshot()[0].id, 2);
        board
            .update(1, |i| i.status = IncidentStatus::Acknowledged)
            .unwrap();
        assert!(board.get(1).unwrap().acknowledged());
    }

    #[test]
    fn refresh_keeps_fields_of_incident_in_flight() {
        let board = IncidentBoard::new();
        let t = board.begin_fetch();
        board.apply_fetch(t, vec![incident(1, None, Provenance::Camera)]);
        board
            .begin_update(1, |i| {
                i.status = IncidentStatus::Acknowledged;
                i.assigned_user_id = Some(7);
                Ok(())
            })
            .unwrap();

        let t = board.begin_fetch();
        assert!(board.apply_fetch(
            t,
            vec![
                incident(1, None, Provenance::Camera),
                incident(2, None, Provenance::Camera),
            ],
        ));
        let shown = board.get(1).unwrap();
        assert!(shown.acknowledged());
        assert_eq!(shown.assigned_user_id, Some(7));
        assert!(!board.get(2).unwrap().acknowledged());

        board.finish_update(1);
        let t = board.begin_fetch();
        board.apply_fetch(t, vec![incident(1, None, Provenance::Camera)]);
        assert!(!board.get(1).unwrap().acknowledged());
    }

    #[test]
    fn confirm_update_shows_backend_record() {
        let board = IncidentBoard::new();
        let t = board.begin_fetch();
        board.apply_fetch(t, vec![incident(1, None, Provenance::Camera)]);
        board.begin_update(1, |_| Ok(())).unwrap();

        let mut confirmed = incident(1, None, Provenance::Camera);
        confirmed.description = "confirmed".to_string();
        let shown = board.confirm_update(confirmed, |i| i.assigned_user_id = Some(7));

        assert_eq!(shown.assigned_user_id, Some(7));
        assert_eq!(board.get(1), Some(shown));
        assert!(!board.is_in_flight(1));
    }
}
