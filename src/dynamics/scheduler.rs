//! Partitions body pairs into solver phases and work items.
//!
//! Within a phase no dynamic body appears twice, so every work item of a
//! phase can be processed at the same time. Static bodies are never written
//! by the solver and may be shared freely.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_SOLVER_PHASES, MIN_PAIRS_PER_WORK_ITEM};
use crate::core::constraints::{BodyIndexPair, Joint};

/// One unit of narrow-phase work: a contact pair or a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchPair {
    pub body_a: usize,
    pub body_b: usize,
    pub is_contact: bool,
    /// Index into the world's joints; meaningful when `is_contact` is false.
    pub joint_index: usize,
    pub is_valid: bool,
}

impl DispatchPair {
    pub fn contact(pair: BodyIndexPair) -> Self {
        let pair = pair.ordered();
        Self {
            body_a: pair.body_a,
            body_b: pair.body_b,
            is_contact: true,
            joint_index: 0,
            is_valid: true,
        }
    }

    pub fn joint(pair: BodyIndexPair, joint_index: usize) -> Self {
        let pair = pair.ordered();
        Self {
            body_a: pair.body_a,
            body_b: pair.body_b,
            is_contact: false,
            joint_index,
            is_valid: true,
        }
    }

    pub fn is_joint(&self) -> bool {
        !self.is_contact
    }

    pub fn body_pair(&self) -> BodyIndexPair {
        BodyIndexPair::new(self.body_a, self.body_b)
    }

    fn sort_key(&self) -> (usize, usize, bool, usize) {
        (self.body_a, self.body_b, self.is_contact, self.joint_index)
    }
}

/// A contiguous range of dispatch pairs processed as one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverPhaseInfo {
    pub dispatch_pair_offset: usize,
    pub num_dispatch_pairs: usize,
    pub first_work_item: usize,
    pub num_work_items: usize,
    /// Set on the overflow phase, which may repeat dynamic bodies and is
    /// therefore a single work item.
    pub contains_duplicate_bodies: bool,
}

/// Phase and work-item layout over the dispatch pair array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverSchedulerInfo {
    pub phases: Vec<SolverPhaseInfo>,
    work_items: Vec<(usize, usize)>,
}

impl SolverSchedulerInfo {
    pub fn num_work_items(&self) -> usize {
        self.work_items.len()
    }

    pub fn num_phases(&self) -> usize {
        self.phases.len()
    }

    /// `(offset, count)` of the dispatch pairs read by `work_item`.
    pub fn get_work_item_read_offset(&self, work_item: usize) -> (usize, usize) {
        self.work_items.get(work_item).copied().unwrap_or((0, 0))
    }
}

/// Fixed-size bitset over dynamic body indices.
struct BodySet {
    words: Vec<u64>,
}

impl BodySet {
    fn new(num_bodies: usize) -> Self {
        Self {
            words: vec![0; num_bodies.div_ceil(64)],
        }
    }

    fn contains(&self, body: usize) -> bool {
        self.words
            .get(body / 64)
            .is_some_and(|word| word & (1 << (body % 64)) != 0)
    }

    fn insert(&mut self, body: usize) {
        if let Some(word) = self.words.get_mut(body / 64) {
            *word |= 1 << (body % 64);
        }
    }

    fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Builds the dispatch pairs for one step together with their schedule.
    ///
    /// Contact pairs and joint pairs are normalised so `body_a < body_b`.
    /// Contacts between bodies joined by a joint with collision disabled are
    /// kept but marked invalid.
    pub fn build(
        contact_pairs: &[BodyIndexPair],
        joints: &[Joint],
        num_dynamic_bodies: usize,
        thread_count_hint: usize,
    ) -> (Vec<DispatchPair>, SolverSchedulerInfo) {
        let mut pairs: Vec<DispatchPair> = contact_pairs
            .iter()
            .map(|&pair| DispatchPair::contact(pair))
            .chain(
                joints
                    .iter()
                    .enumerate()
                    .map(|(index, joint)| DispatchPair::joint(joint.body_pair, index)),
            )
            .collect();
        pairs.sort_unstable_by_key(DispatchPair::sort_key);

        for joint in joints.iter().filter(|joint| !joint.enable_collision) {
            let bodies = joint.body_pair.ordered();
            for pair in pairs
                .iter_mut()
                .filter(|pair| pair.is_contact && pair.body_pair() == bodies)
            {
                pair.is_valid = false;
            }
        }

        let phases = Self::partition(pairs, num_dynamic_bodies);
        let threads = thread_count_hint.max(1);

        let mut ordered = Vec::with_capacity(phases.iter().map(Vec::len).sum());
        let mut info = SolverSchedulerInfo::default();
        let last_phase = phases.len().saturating_sub(1);
        for (phase_index, phase) in phases.into_iter().enumerate() {
            let duplicates = phase_index == MAX_SOLVER_PHASES - 1 && phase_index == last_phase;
            let offset = ordered.len();
            let count = phase.len();
            let per_item = if duplicates {
                count.max(1)
            } else {
                MIN_PAIRS_PER_WORK_ITEM.max(count.div_ceil(threads))
            };

            let first_work_item = info.work_items.len();
            let mut start = 0;
            while start < count {
                let len = per_item.min(count - start);
                info.work_items.push((offset + start, len));
                start += len;
            }

            info.phases.push(SolverPhaseInfo {
                dispatch_pair_offset: offset,
                num_dispatch_pairs: count,
                first_work_item,
                num_work_items: info.work_items.len() - first_work_item,
                contains_duplicate_bodies: duplicates,
            });
            ordered.extend(phase);
        }

        debug!(
            "scheduler: {} dispatch pairs in {} phases, {} work items",
            ordered.len(),
            info.phases.len(),
            info.work_items.len()
        );
        (ordered, info)
    }

    /// Greedy partition: each phase takes every remaining pair whose dynamic
    /// bodies are still free in that phase. The last allowed phase takes
    /// whatever is left.
    fn partition(pairs: Vec<DispatchPair>, num_dynamic_bodies: usize) -> Vec<Vec<DispatchPair>> {
        let mut phases = Vec::new();
        let mut remaining = pairs;
        let mut used = BodySet::new(num_dynamic_bodies);

        while !remaining.is_empty() {
            if phases.len() == MAX_SOLVER_PHASES - 1 {
                phases.push(std::mem::take(&mut remaining));
                break;
            }

            used.clear();
            let mut phase = Vec::new();
            let mut deferred = Vec::new();
            for pair in remaining {
                let is_dynamic = |body: usize| body < num_dynamic_bodies;
                let busy = |body: usize| is_dynamic(body) && used.contains(body);
                if busy(pair.body_a) || busy(pair.body_b) {
                    deferred.push(pair);
                    continue;
                }
                for body in [pair.body_a, pair.body_b] {
                    if is_dynamic(body) {
                        used.insert(body);
                    }
                }
                phase.push(pair);
            }
            phases.push(phase);
            remaining = deferred;
        }
        phases
    }
}
