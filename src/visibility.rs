//! Which incidents each role gets to see.
//!
//! The backend returns every incident; filtering happens here so the rules
//! live in one pure function.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::config::AppConfig;
use crate::types::incident::{Incident, IncidentStatus, Provenance};
use crate::types::user::{Actor, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPolicy {
    /// Cameras at or above this id are shared AI workers visible to every viewer.
    pub ai_worker_camera_threshold: i64,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for VisibilityPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            ai_worker_camera_threshold: config.ai_worker_camera_threshold,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityBuckets {
    pub viewer_reports: Vec<Incident>,
    pub sos_alerts: Vec<Incident>,
    pub assigned_to_me: Vec<Incident>,
}

impl SecurityBuckets {
    /// Every incident in at least one bucket, once, in id order.
    pub fn union(&self) -> Vec<Incident> {
        let mut seen = BTreeSet::new();
        let mut all: Vec<Incident> = self
            .viewer_reports
            .iter()
            .chain(&self.sos_alerts)
            .chain(&self.assigned_to_me)
            .filter(|i| seen.insert(i.id))
            .cloned()
            .collect();
        all.sort_by_key(|i| i.id);
        all
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdminCounters {
    pub total: usize,
    pub pending: usize,
    pub acknowledged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminView {
    pub incidents: Vec<Incident>,
    pub counters: AdminCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncidentView {
    /// Identity not known yet. Nothing is shown.
    Resolving,
    Viewer { incidents: Vec<Incident> },
    Security(SecurityBuckets),
    Admin(AdminView),
}

impl IncidentView {
    /// Flat list of what the actor can see.
    pub fn incidents(&self) -> Vec<Incident> {
        match self {
            IncidentView::Resolving => Vec::new(),
            IncidentView::Viewer { incidents } => incidents.clone(),
            IncidentView::Security(buckets) => buckets.union(),
            IncidentView::Admin(view) => view.incidents.clone(),
        }
    }
}

pub fn visible_incidents(
    all: &[Incident],
    actor: Option<&Actor>,
    policy: VisibilityPolicy,
) -> IncidentView {
    let Some(actor) = actor else {
        return IncidentView::Resolving;
    };
    match actor.role {
        Role::Viewer => IncidentView::Viewer {
            incidents: all
                .iter()
                .filter(|i| viewer_can_see(i, actor, policy))
                .cloned()
                .collect(),
        },
        Role::Security => IncidentView::Security(security_buckets(all, actor)),
        Role::Admin => IncidentView::Admin(AdminView {
            incidents: all.to_vec(),
            counters: count(all),
        }),
    }
}

fn viewer_can_see(incident: &Incident, actor: &Actor, policy: VisibilityPolicy) -> bool {
    match incident.provenance {
        Provenance::SosAlert => incident.reporter_username() == Some(actor.username.as_str()),
        Provenance::ViewerReport => false,
        Provenance::Camera => incident
            .camera_id
            .map(|cam| actor.owns_camera(cam) || cam >= policy.ai_worker_camera_threshold)
            .unwrap_or(false),
    }
}

fn security_buckets(all: &[Incident], actor: &Actor) -> SecurityBuckets {
    SecurityBuckets {
        viewer_reports: matching(all, |i| i.provenance == Provenance::ViewerReport),
        sos_alerts: matching(all, |i| i.provenance == Provenance::SosAlert),
        assigned_to_me: matching(all, |i| i.assigned_user_id == Some(actor.id)),
    }
}

fn matching(all: &[Incident], pred: impl Fn(&Incident) -> bool) -> Vec<Incident> {
    all.iter().filter(|i| pred(i)).cloned().collect()
}

fn count(all: &[Incident]) -> AdminCounters {
    let acknowledged = all
        .iter()
        .filter(|i| i.status == IncidentStatus::Acknowledged)
        .count();
    AdminCounters {
        total: all.len(),
        pending: all.len() - acknowledged,
        acknowledged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{incident, sos_incident, user};

    fn ids(list: &[Incident]) -> Vec<i64> {
        list.iter().map(|i| i.id).collect()
    }

    fn sample() -> Vec<Incident> {
        let mut assigned = incident(6, Some(3), Provenance::Camera);
        assigned.assigned_user_id = Some(7);
        let mut acked = incident(7, Some(1200), Provenance::Camera);
        acked.status = IncidentStatus::Acknowledged;
        vec![
            incident(1, Some(3), Provenance::Camera),
            incident(2, Some(9), Provenance::Camera),
            incident(3, Some(1001), Provenance::Camera),
            incident(4, Some(3), Provenance::ViewerReport),
            sos_incident(5, Some(3), "bob"),
            assigned,
            acked,
            sos_incident(8, Some(9), "alice"),
            incident(9, None, Provenance::Camera),
        ]
    }

    #[test]
    fn unresolved_identity_shows_nothing() {
        let view = visible_incidents(&sample(), None, VisibilityPolicy::default());
        assert_eq!(view, IncidentView::Resolving);
        assert!(view.incidents().is_empty());
    }

    #[test]
    fn viewer_sees_owned_and_shared_cameras_plus_own_sos() {
        let alice = user(1, "alice", Role::Viewer, &[3]).actor();
        let view = visible_incidents(&sample(), Some(&alice), VisibilityPolicy::default());
        // 2 is someone else's camera, 4 a viewer report, 5 bob's SOS on alice's camera
        assert_eq!(ids(&view.incidents()), vec![1, 3, 6, 7, 8]);
    }

    #[test]
    fn threshold_is_configurable() {
        let alice = user(1, "alice", Role::Viewer, &[]).actor();
        let policy = VisibilityPolicy {
            ai_worker_camera_threshold: 1100,
        };
        let view = visible_incidents(&sample(), Some(&alice), policy);
        assert_eq!(ids(&view.incidents()), vec![7, 8]);
    }

    #[test]
    fn security_buckets_overlap_and_union_dedupes() {
        let mut all = sample();
        // a viewer report that is also assigned to the guard
        all[3].assigned_user_id = Some(7);
        let guard = user(7, "guard", Role::Security, &[]).actor();
        let IncidentView::Security(buckets) =
            visible_incidents(&all, Some(&guard), VisibilityPolicy::default())
        else {
            panic!("expected security view");
        };
        assert_eq!(ids(&buckets.viewer_reports), vec![4]);
        assert_eq!(ids(&buckets.sos_alerts), vec![5, 8]);
        assert_eq!(ids(&buckets.assigned_to_me), vec![4, 6]);
        assert_eq!(ids(&buckets.union()), vec![4, 5, 6, 8]);
    }

    #[test]
    fn admin_sees_everything_with_counters() {
        let admin = user(99, "root", Role::Admin, &[]).actor();
        let IncidentView::Admin(view) =
            visible_incidents(&sample(), Some(&admin), VisibilityPolicy::default())
        else {
            panic!("expected admin view");
        };
        assert_eq!(view.incidents.len(), 9);
        assert_eq!(
            view.counters,
            AdminCounters {
                total: 9,
                pending: 8,
                acknowledged: 1
            }
        );
    }

    #[test]
    fn view_serializes_with_kind_tag() {
        let json = serde_json::to_value(IncidentView::Resolving).unwrap();
        assert_eq!(json["kind"], "resolving");
        let admin = user(99, "root", Role::Admin, &[]).actor();
        let json =
            serde_json::to_value(visible_incidents(&[], Some(&admin), VisibilityPolicy::default()))
                .unwrap();
        assert_eq!(json["kind"], "admin");
        assert_eq!(json["counters"]["total"], 0);
    }
}
