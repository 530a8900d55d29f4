use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use clinicq_model::{CheckIn, CheckInID, DoctorID};

use super::eta::eta_minutes;
use crate::classification::{ArrivalStatus, classify};
use crate::config::UnassignedDoctorPolicy;

/// How a clinic's doctors are exposed to the builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DoctorCapacity {
    /// Per-doctor queues, in the clinic's listing order.
    Roster(Vec<DoctorID>),
    /// `n` anonymous doctors sharing one clinic-wide queue.
    Pooled(usize),
}

impl DoctorCapacity {
    pub fn is_empty(&self) -> bool {
        match self {
            DoctorCapacity::Roster(doctors) => doctors.is_empty(),
            DoctorCapacity::Pooled(slots) => *slots == 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuilderOptions {
    pub default_eta_minutes: u32,
    pub unassigned_doctor_policy: UnassignedDoctorPolicy,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            default_eta_minutes: 30,
            unassigned_doctor_policy: UnassignedDoctorPolicy::FirstDoctor,
        }
    }
}

/// One check-in's computed place in its queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputedAssignment {
    pub check_in_id: CheckInID,
    /// 1-based, contiguous within the assignment scope.
    pub position: u32,
    pub estimated_start: DateTime<Utc>,
    /// Set only for per-doctor queues.
    pub doctor_id: Option<DoctorID>,
    pub status: ArrivalStatus,
}

/// Result of building one clinic's queue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueuePlan {
    pub assignments: Vec<ComputedAssignment>,
    /// Check-ins the builder had nowhere to put (no doctors available).
    pub unplaced: Vec<CheckInID>,
}

struct Entry<'a> {
    check_in: &'a CheckIn,
    status: ArrivalStatus,
    eta: Duration,
}

impl Entry<'_> {
    fn anchor(&self) -> DateTime<Utc> {
        self.check_in
            .expected_arrival
            .unwrap_or(self.check_in.created_at)
    }

    /// Early patients cannot start before they are due; everyone else
    /// starts as soon as the doctor frees up.
    fn start_after(&self, free_at: DateTime<Utc>) -> DateTime<Utc> {
        match (self.status, self.check_in.expected_arrival) {
            (ArrivalStatus::Early, Some(arrival)) => free_at.max(arrival),
            _ => free_at,
        }
    }
}

/// `at + eta`, pinned to the latest representable instant instead of
/// overflowing.
fn advance(at: DateTime<Utc>, eta: Duration) -> DateTime<Utc> {
    at.checked_add_signed(eta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn time_order(a: &Entry<'_>, b: &Entry<'_>) -> Ordering {
    a.anchor()
        .cmp(&b.anchor())
        .then_with(|| a.check_in.created_at.cmp(&b.check_in.created_at))
        .then_with(|| a.check_in.id.cmp(&b.check_in.id))
}

fn per_doctor_order(a: &Entry<'_>, b: &Entry<'_>) -> Ordering {
    let a_scheduled = a.check_in.expected_arrival.is_some();
    let b_scheduled = b.check_in.expected_arrival.is_some();
    b_scheduled
        .cmp(&a_scheduled)
        .then_with(|| time_order(a, b))
}

/// Compute queue positions and estimated start times for one clinic.
///
/// Pure: the same `now`, check-ins and capacity always produce the same
/// plan.
pub fn build_queue(
    now: DateTime<Utc>,
    check_ins: &[CheckIn],
    capacity: &DoctorCapacity,
    options: &BuilderOptions,
) -> QueuePlan {
    let entries: Vec<Entry<'_>> = check_ins
        .iter()
        .map(|check_in| Entry {
            check_in,
            status: classify(now, check_in.expected_arrival),
            eta: Duration::minutes(i64::from(eta_minutes(
                check_in,
                options.default_eta_minutes,
            ))),
        })
        .collect();

    match capacity {
        DoctorCapacity::Roster(doctors) => build_per_doctor(
            now,
            entries,
            doctors,
            options.unassigned_doctor_policy,
        ),
        DoctorCapacity::Pooled(slots) => build_pooled(now, entries, *slots),
    }
}

fn bucket_for<'b, 'a>(
    buckets: &'b mut Vec<(DoctorID, Vec<Entry<'a>>)>,
    doctor_id: DoctorID,
) -> &'b mut Vec<Entry<'a>> {
    let idx = match buckets.iter().position(|(id, _)| *id == doctor_id) {
        Some(idx) => idx,
        None => {
            buckets.push((doctor_id, Vec::new()));
            buckets.len() - 1
        }
    };
    &mut buckets[idx].1
}

fn build_per_doctor(
    now: DateTime<Utc>,
    entries: Vec<Entry<'_>>,
    roster: &[DoctorID],
    policy: UnassignedDoctorPolicy,
) -> QueuePlan {
    // Roster doctors come first so index 0 is the first listed doctor.
    // Doctors referenced by a check-in but missing from the roster still get
    // their own scope, appended after the roster.
    let mut buckets: Vec<(DoctorID, Vec<Entry<'_>>)> =
        roster.iter().map(|id| (*id, Vec::new())).collect();
    let mut unassigned = Vec::new();

    for entry in entries {
        match entry.check_in.doctor_id {
            Some(doctor_id) => bucket_for(&mut buckets, doctor_id).push(entry),
            None => unassigned.push(entry),
        }
    }

    let mut plan = QueuePlan::default();

    if roster.is_empty() {
        plan.unplaced =
            unassigned.iter().map(|entry| entry.check_in.id).collect();
    } else {
        match policy {
            UnassignedDoctorPolicy::FirstDoctor => {
                buckets[0].1.extend(unassigned);
            }
            UnassignedDoctorPolicy::LeastLoaded => {
                let mut load: Vec<Duration> = buckets[..roster.len()]
                    .iter()
                    .map(|(_, queue)| {
                        queue.iter().fold(Duration::zero(), |acc, e| {
                            acc.checked_add(&e.eta).unwrap_or(Duration::MAX)
                        })
                    })
                    .collect();
                unassigned.sort_by(time_order);
                for entry in unassigned {
                    let target = load
                        .iter()
                        .enumerate()
                        .min_by_key(|(idx, minutes)| (**minutes, *idx))
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                    load[target] = load[target]
                        .checked_add(&entry.eta)
                        .unwrap_or(Duration::MAX);
                    buckets[target].1.push(entry);
                }
            }
        }
    }

    for (doctor_id, mut queue) in buckets {
        queue.sort_by(per_doctor_order);
        plan.assignments
            .extend(walk_single_line(now, queue, Some(doctor_id)));
    }

    plan
}

fn walk_single_line(
    now: DateTime<Utc>,
    queue: Vec<Entry<'_>>,
    doctor_id: Option<DoctorID>,
) -> Vec<ComputedAssignment> {
    let mut free_at = now;
    queue
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let estimated_start = entry.start_after(free_at);
            free_at = advance(free_at, entry.eta);
            ComputedAssignment {
                check_in_id: entry.check_in.id,
                position: (idx + 1) as u32,
                estimated_start,
                doctor_id,
                status: entry.status,
            }
        })
        .collect()
}

fn build_pooled(
    now: DateTime<Utc>,
    entries: Vec<Entry<'_>>,
    slots: usize,
) -> QueuePlan {
    if slots == 0 {
        return QueuePlan {
            assignments: Vec::new(),
            unplaced: entries.iter().map(|entry| entry.check_in.id).collect(),
        };
    }

    let mut by_class: [Vec<Entry<'_>>; 6] = Default::default();
    for entry in entries {
        by_class[entry.status.rank()].push(entry);
    }
    for class in by_class.iter_mut() {
        class.sort_by(time_order);
    }

    let [mut slightly_late, on_time, early, late, expired, walk_in] = by_class;

    // At most one slightly-late patient per doctor jumps ahead of the
    // on-time patients; the rest queue behind them.
    let overflow = slightly_late.split_off(slots.min(slightly_late.len()));
    let ordered = slightly_late
        .into_iter()
        .chain(on_time)
        .chain(overflow)
        .chain(early)
        .chain(late)
        .chain(expired)
        .chain(walk_in);

    let mut slot_free_at = vec![now; slots];
    let mut assignments = Vec::new();

    for (idx, entry) in ordered.enumerate() {
        let slot = earliest_slot(&slot_free_at);
        let estimated_start = entry.start_after(slot_free_at[slot]);
        slot_free_at[slot] = advance(slot_free_at[slot], entry.eta);
        assignments.push(ComputedAssignment {
            check_in_id: entry.check_in.id,
            position: (idx + 1) as u32,
            estimated_start,
            doctor_id: None,
            status: entry.status,
        });
    }

    QueuePlan {
        assignments,
        unplaced: Vec::new(),
    }
}

fn earliest_slot(slots: &[DateTime<Utc>]) -> usize {
    slots
        .iter()
        .enumerate()
        .min_by_key(|(idx, free_at)| (**free_at, *idx))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
