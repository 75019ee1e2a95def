//! Incremental search scheduler
//!
//! A query expands to one job per (root, matcher). Jobs run one per timer
//! tick so a large document never blocks the host loop; in between, the
//! tree may change freely and every job looks at it as it is when it runs.
//!
//! ```text
//!   perform_search ──> Queued ──tick──> Running ──queue empty──> Idle
//!         │                               │
//!         └──── search_canceled ──────────┴──> Canceled
//! ```

use super::query::{Matcher, SearchQuery};
use super::timer::MatchJobsTimer;
use crate::binder::NodeBinder;
use crate::config::InspectorConfig;
use crate::events::InspectorEvent;
use crate::id_map::Handle;
use dom::{InnerTree, NodeId};
use indexmap::IndexSet;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    /// Jobs queued, waiting for the first tick
    Queued,
    Running,
    Canceled,
}

#[derive(Debug)]
struct MatchJob {
    generation: u64,
    root: NodeId,
    matcher: Matcher,
}

pub struct SearchScheduler {
    state: SearchState,
    /// Bumped on every new query and every cancel
    generation: u64,
    query: Option<SearchQuery>,
    pending: VecDeque<MatchJob>,
    results: IndexSet<NodeId>,
    timer: MatchJobsTimer,
    tick_interval: Duration,
}

impl SearchScheduler {
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            state: SearchState::Idle,
            generation: 0,
            query: None,
            pending: VecDeque::new(),
            results: IndexSet::new(),
            timer: MatchJobsTimer::new(),
            tick_interval: config.search_tick_interval,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> Option<&SearchQuery> {
        self.query.as_ref()
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    /// Nodes reported so far for the current query, in report order
    pub fn results(&self) -> &IndexSet<NodeId> {
        &self.results
    }

    pub fn timer(&self) -> &MatchJobsTimer {
        &self.timer
    }

    /// Future resolving when the next job is due
    pub fn tick(&self) -> impl Future<Output = ()> + Send + 'static {
        self.timer.tick()
    }

    /// Start a new query, superseding any running one.
    ///
    /// With `run_synchronously` every job runs right away and the matches are
    /// reported as a single batch.
    pub fn perform_search<T: InnerTree>(
        &mut self,
        tree: &T,
        binder: &mut NodeBinder,
        query: &str,
        run_synchronously: bool,
    ) {
        self.search_canceled();

        let Some(query) = SearchQuery::parse(query) else {
            self.state = SearchState::Idle;
            return;
        };

        for root in binder.traversal_roots() {
            for matcher in query.matchers() {
                self.pending.push_back(MatchJob {
                    generation: self.generation,
                    root,
                    matcher: matcher.clone(),
                });
            }
        }
        tracing::debug!(
            "search {:?} queued {} job(s) (generation {})",
            query.text(),
            self.pending.len(),
            self.generation
        );
        self.query = Some(query);

        if run_synchronously {
            self.state = SearchState::Running;
            let mut batch = Vec::new();
            while let Some(job) = self.pending.pop_front() {
                batch.extend(self.run_job(tree, binder, job));
            }
            self.report(binder, batch);
            self.state = SearchState::Idle;
        } else {
            self.state = SearchState::Queued;
            self.timer.start();
        }
    }

    /// Run the next pending job and report what it found
    pub fn on_match_jobs_timer<T: InnerTree>(&mut self, tree: &T, binder: &mut NodeBinder) {
        let Some(job) = self.pending.pop_front() else {
            self.timer.stop();
            if self.state != SearchState::Canceled {
                self.state = SearchState::Idle;
            }
            return;
        };
        self.state = SearchState::Running;

        if job.generation != self.generation {
            tracing::trace!("dropping job of superseded generation {}", job.generation);
        } else if !binder.is_traversal_root(job.root) {
            tracing::warn!("search root {} is gone, skipping {:?}", job.root, job.matcher);
        } else {
            tracing::trace!("search tick: {:?} under {}", job.matcher, job.root);
            let handles = self.run_job(tree, binder, job);
            self.report(binder, handles);
        }

        if self.pending.is_empty() {
            self.timer.stop();
            self.state = SearchState::Idle;
            tracing::debug!("search finished with {} result(s)", self.results.len());
        } else {
            self.timer.schedule_after(self.tick_interval);
        }
    }

    /// Drop pending jobs and results. Harmless when nothing is running.
    pub fn search_canceled(&mut self) {
        self.generation += 1;
        self.timer.stop();
        self.results.clear();
        self.query = None;
        if !self.pending.is_empty() || matches!(self.state, SearchState::Queued | SearchState::Running) {
            tracing::debug!("search canceled with {} job(s) pending", self.pending.len());
            self.pending.clear();
            self.state = SearchState::Canceled;
        }
    }

    /// Match the subtree of `job.root`, binding new matches
    fn run_job<T: InnerTree>(
        &mut self,
        tree: &T,
        binder: &mut NodeBinder,
        job: MatchJob,
    ) -> Vec<Handle> {
        let matches: Vec<NodeId> = tree
            .inner_descendants(job.root)
            .filter(|&id| !self.results.contains(&id))
            .filter(|&id| tree.node(id).is_some_and(|node| job.matcher.matches(node)))
            .collect();

        let mut handles = Vec::with_capacity(matches.len());
        for node in matches {
            if let Some(handle) = binder.push_node_path_to_frontend(tree, node) {
                self.results.insert(node);
                handles.push(handle);
            }
        }
        handles
    }

    fn report(&self, binder: &NodeBinder, nodes: Vec<Handle>) {
        if nodes.is_empty() {
            return;
        }
        binder
            .frontend()
            .publish(InspectorEvent::SearchResults { nodes });
    }
}
