//! Scheduler state and its pure reducer.

use std::collections::HashMap;

use serde::Serialize;

use feedshelf_core::{FinalizedItem, Item};

use crate::runner::CategoryOutcome;

/// Load status of one queued category.
///
/// Advances only `Pending → Loading → {Ready | Empty}`; terminal statuses
/// never change within a generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CategoryStatus {
    Pending,
    Loading,
    Ready(Vec<FinalizedItem>),
    Empty,
}

impl CategoryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Empty)
    }

    pub fn valid_count(&self) -> usize {
        match self {
            Self::Ready(items) => items.len(),
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Empty => "empty",
        }
    }
}

impl From<CategoryOutcome> for CategoryStatus {
    fn from(outcome: CategoryOutcome) -> Self {
        match outcome {
            CategoryOutcome::Ready(items) => Self::Ready(items),
            CategoryOutcome::Empty => Self::Empty,
        }
    }
}

/// Closed set of transitions accepted by [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Reset {
        queue: Vec<String>,
        statuses: HashMap<String, CategoryStatus>,
        candidates: HashMap<String, Vec<Item>>,
        requested_count: usize,
    },
    RequestMore {
        requested_count: usize,
    },
    CategoryLoading {
        name: String,
    },
    CategoryResolved {
        name: String,
        status: CategoryStatus,
        prepared_count: usize,
    },
    CategoryFailed,
}

impl SchedulerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reset { .. } => "reset",
            Self::RequestMore { .. } => "request_more",
            Self::CategoryLoading { .. } => "category_loading",
            Self::CategoryResolved { .. } => "category_resolved",
            Self::CategoryFailed => "category_failed",
        }
    }
}

/// Everything the scheduler knows about the current generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerState {
    pub queue: Vec<String>,
    pub statuses: HashMap<String, CategoryStatus>,
    /// Raw items per category, as classified.
    pub candidates: HashMap<String, Vec<Item>>,
    /// Leading categories the consumer asked for.
    pub requested_count: usize,
    /// Length of the terminal prefix of `queue` last reported.
    pub prepared_count: usize,
    /// Single-flight lock: true while one category is being resolved.
    pub in_flight: bool,
}

impl SchedulerState {
    /// Statuses for a fresh queue: `pending` when the category has candidates, else `empty`.
    pub fn initial_statuses(
        queue: &[String],
        candidates: &HashMap<String, Vec<Item>>,
    ) -> HashMap<String, CategoryStatus> {
        queue
            .iter()
            .map(|name| {
                let has_items = candidates.get(name).is_some_and(|items| !items.is_empty());
                let status = if has_items {
                    CategoryStatus::Pending
                } else {
                    CategoryStatus::Empty
                };
                (name.clone(), status)
            })
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<&CategoryStatus> {
        self.statuses.get(name)
    }

    /// Length of the longest prefix of `queue` whose statuses are all terminal.
    pub fn terminal_prefix(&self) -> usize {
        self.queue
            .iter()
            .take_while(|name| self.statuses.get(*name).is_some_and(CategoryStatus::is_terminal))
            .count()
    }

    /// [`terminal_prefix`](Self::terminal_prefix) as it would be with `name` set to `status`.
    pub fn terminal_prefix_with(&self, name: &str, status: &CategoryStatus) -> usize {
        self.queue
            .iter()
            .take_while(|queued| {
                if queued.as_str() == name {
                    status.is_terminal()
                } else {
                    self.statuses.get(*queued).is_some_and(CategoryStatus::is_terminal)
                }
            })
            .count()
    }

    /// First `pending` category among the first `requested_count` queue entries.
    pub fn next_pending(&self) -> Option<&str> {
        self.queue
            .iter()
            .take(self.requested_count.min(self.queue.len()))
            .find(|name| matches!(self.statuses.get(*name), Some(CategoryStatus::Pending)))
            .map(String::as_str)
    }

    pub fn has_more(&self) -> bool {
        self.prepared_count < self.queue.len()
    }

    /// Non-empty ready categories within the prepared prefix, in queue order.
    pub fn prepared_categories(&self) -> Vec<(&str, &[FinalizedItem])> {
        self.queue
            .iter()
            .take(self.prepared_count.min(self.queue.len()))
            .filter_map(|name| match self.statuses.get(name) {
                Some(CategoryStatus::Ready(items)) if !items.is_empty() => Some((name.as_str(), items.as_slice())),
                _ => None,
            })
            .collect()
    }

    pub fn loading_count(&self) -> usize {
        self.statuses
            .values()
            .filter(|status| matches!(status, CategoryStatus::Loading))
            .count()
    }
}

/// Apply one event. Pure: no I/O, no clocks, no shared state.
///
/// `CategoryResolved` and `CategoryFailed` always release the single-flight
/// lock, whatever the rest of the state looks like.
pub fn reduce(mut state: SchedulerState, event: SchedulerEvent) -> SchedulerState {
    match event {
        SchedulerEvent::Reset {
            queue,
            statuses,
            candidates,
            requested_count,
        } => {
            let requested_count = requested_count.min(queue.len());
            SchedulerState {
                queue,
                statuses,
                candidates,
                requested_count,
                prepared_count: 0,
                in_flight: false,
            }
        }
        SchedulerEvent::RequestMore { requested_count } => {
            let clamped = requested_count.min(state.queue.len());
            if clamped > state.requested_count {
                state.requested_count = clamped;
            }
            state
        }
        SchedulerEvent::CategoryLoading { name } => {
            state.in_flight = true;
            if let Some(status) = state.statuses.get_mut(&name) {
                if *status == CategoryStatus::Pending {
                    *status = CategoryStatus::Loading;
                }
            }
            state
        }
        SchedulerEvent::CategoryResolved {
            name,
            status,
            prepared_count,
        } => {
            state.in_flight = false;
            if let Some(current) = state.statuses.get_mut(&name) {
                *current = status;
                state.prepared_count = prepared_count.min(state.queue.len());
            }
            state
        }
        SchedulerEvent::CategoryFailed => {
            state.in_flight = false;
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(n: usize) -> CategoryStatus {
        CategoryStatus::Ready((0..n).map(|i| FinalizedItem::unfetched(&Item::new(format!("w{i}"), "c"))).collect())
    }

    fn make_state(names: &[&str]) -> SchedulerState {
        let queue: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let statuses = queue.iter().map(|n| (n.clone(), CategoryStatus::Pending)).collect();
        let candidates = queue.iter().map(|n| (n.clone(), vec![Item::new(n.clone(), "c")])).collect();
        SchedulerState {
            queue,
            statuses,
            candidates,
            requested_count: 1,
            prepared_count: 0,
            in_flight: false,
        }
    }

    #[test]
    fn category_failed_always_releases_lock() {
        let mut state = make_state(&["A"]);
        state.in_flight = true;
        let next = reduce(state.clone(), SchedulerEvent::CategoryFailed);
        assert!(!next.in_flight);
        assert_eq!(next.statuses, state.statuses);

        let next = reduce(SchedulerState::default(), SchedulerEvent::CategoryFailed);
        assert!(!next.in_flight);
    }

    #[test]
    fn category_resolved_releases_lock_and_sets_prepared() {
        let mut state = make_state(&["A"]);
        state.in_flight = true;
        let next = reduce(
            state,
            SchedulerEvent::CategoryResolved {
                name: "A".into(),
                status: ready(1),
                prepared_count: 1,
            },
        );
        assert!(!next.in_flight);
        assert_eq!(next.prepared_count, 1);
        assert_eq!(next.statuses["A"].valid_count(), 1);
    }

    #[test]
    fn category_resolved_for_unknown_name_still_releases_lock() {
        let mut state = make_state(&["A"]);
        state.in_flight = true;
        let next = reduce(
            state,
            SchedulerEvent::CategoryResolved {
                name: "nope".into(),
                status: CategoryStatus::Empty,
                prepared_count: 1,
            },
        );
        assert!(!next.in_flight);
        assert_eq!(next.prepared_count, 0);
        assert!(!next.statuses.contains_key("nope"));
    }

    #[test]
    fn category_loading_on_non_pending_only_takes_lock() {
        let mut state = make_state(&["A"]);
        state.statuses.insert("A".into(), ready(1));
        let next = reduce(state, SchedulerEvent::CategoryLoading { name: "A".into() });
        assert!(next.in_flight);
        assert_eq!(next.statuses["A"], ready(1));
    }

    #[test]
    fn category_loading_marks_pending_as_loading() {
        let next = reduce(make_state(&["A", "B"]), SchedulerEvent::CategoryLoading { name: "A".into() });
        assert!(next.in_flight);
        assert_eq!(next.statuses["A"], CategoryStatus::Loading);
        assert_eq!(next.statuses["B"], CategoryStatus::Pending);
        assert_eq!(next.loading_count(), 1);
    }

    #[test]
    fn request_more_raises_and_clamps() {
        let state = make_state(&["A", "B", "C"]);
        let next = reduce(state, SchedulerEvent::RequestMore { requested_count: 2 });
        assert_eq!(next.requested_count, 2);

        let next = reduce(next, SchedulerEvent::RequestMore { requested_count: 10 });
        assert_eq!(next.requested_count, 3);

        let lowered = reduce(next.clone(), SchedulerEvent::RequestMore { requested_count: 1 });
        assert_eq!(lowered.requested_count, 3);

        let same = reduce(next.clone(), SchedulerEvent::RequestMore { requested_count: 3 });
        assert_eq!(same, next);
    }

    #[test]
    fn reset_replaces_everything() {
        let mut state = make_state(&["A"]);
        state.in_flight = true;
        state.prepared_count = 1;
        let next = reduce(
            state,
            SchedulerEvent::Reset {
                queue: vec!["X".into(), "Y".into()],
                statuses: HashMap::from([
                    ("X".to_string(), CategoryStatus::Pending),
                    ("Y".to_string(), CategoryStatus::Empty),
                ]),
                candidates: HashMap::new(),
                requested_count: 5,
            },
        );
        assert_eq!(next.queue, vec!["X", "Y"]);
        assert_eq!(next.requested_count, 2);
        assert_eq!(next.prepared_count, 0);
        assert!(!next.in_flight);
    }

    #[test]
    fn next_pending_stays_inside_window() {
        let mut state = make_state(&["A", "B", "C", "D", "E"]);
        state.requested_count = 2;
        assert_eq!(state.next_pending(), Some("A"));

        state.statuses.insert("A".into(), CategoryStatus::Loading);
        assert_eq!(state.next_pending(), Some("B"));

        state.statuses.insert("B".into(), CategoryStatus::Empty);
        assert_eq!(state.next_pending(), None);
    }

    #[test]
    fn terminal_prefix_stops_at_first_open_category() {
        let mut state = make_state(&["A", "B", "C"]);
        assert_eq!(state.terminal_prefix(), 0);
        state.statuses.insert("A".into(), CategoryStatus::Empty);
        state.statuses.insert("C".into(), ready(1));
        assert_eq!(state.terminal_prefix(), 1);
        assert_eq!(state.terminal_prefix_with("B", &ready(2)), 3);
        assert_eq!(state.terminal_prefix_with("B", &CategoryStatus::Loading), 1);
    }

    #[test]
    fn prepared_categories_skip_empty_and_unprepared() {
        let mut state = make_state(&["A", "B", "C"]);
        state.statuses.insert("A".into(), ready(2));
        state.statuses.insert("B".into(), CategoryStatus::Empty);
        state.statuses.insert("C".into(), ready(1));
        state.prepared_count = 2;
        let prepared = state.prepared_categories();
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].0, "A");
        assert_eq!(prepared[0].1.len(), 2);
        assert!(state.has_more());
    }

    #[test]
    fn initial_statuses_mark_empty_buckets() {
        let queue = vec!["A".to_string(), "B".to_string()];
        let candidates = HashMap::from([("A".to_string(), vec![Item::new("1", "a")])]);
        let statuses = SchedulerState::initial_statuses(&queue, &candidates);
        assert_eq!(statuses["A"], CategoryStatus::Pending);
        assert_eq!(statuses["B"], CategoryStatus::Empty);
    }

    #[test]
    fn prepared_count_never_decreases_across_events() {
        let mut state = make_state(&["A", "B", "C"]);
        state.requested_count = 3;
        let events = vec![
            SchedulerEvent::CategoryLoading { name: "A".into() },
            SchedulerEvent::CategoryResolved { name: "A".into(), status: ready(1), prepared_count: 1 },
            SchedulerEvent::RequestMore { requested_count: 3 },
            SchedulerEvent::CategoryLoading { name: "B".into() },
            SchedulerEvent::CategoryResolved { name: "B".into(), status: CategoryStatus::Empty, prepared_count: 2 },
            SchedulerEvent::CategoryLoading { name: "C".into() },
            SchedulerEvent::CategoryFailed,
            SchedulerEvent::RequestMore { requested_count: 3 },
        ];
        let mut last = 0;
        for event in events {
            state = reduce(state, event);
            assert!(state.prepared_count >= last);
            assert!(state.prepared_count <= state.queue.len());
            assert!(state.loading_count() <= 1);
            last = state.prepared_count;
        }
    }
}
