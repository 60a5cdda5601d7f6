//! Turns scheduled dispatch pairs into contact manifolds and joint jacobians.

use std::sync::Arc;

use log::{debug, trace};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::contact::{ContactManifold, ManifoldQueries};
use crate::core::constraints::BodyIndexPair;
use crate::dynamics::jacobian::JointJacobian;
use crate::dynamics::scheduler::{DispatchPair, SolverSchedulerInfo};
use crate::utils::job::JobHandle;
use crate::utils::stream::{StreamWriter, WorkItemStream};
use crate::world::PhysicsWorld;

/// Streams written by the narrow phase, one bucket per work item.
#[derive(Debug, Clone, Default)]
pub struct NarrowPhaseOutput {
    pub contacts: WorkItemStream<ContactManifold>,
    pub jacobians: WorkItemStream<JointJacobian>,
    /// Dispatch pairs skipped because they were invalid or out of range.
    pub skipped_pairs: usize,
}

/// Completion token of a scheduled narrow phase.
pub type NarrowPhaseHandle = JobHandle<NarrowPhaseOutput>;

pub struct NarrowPhase;

impl NarrowPhase {
    /// Processes the pairs read by one work item.
    pub fn process_work_item(
        world: &PhysicsWorld,
        dispatch_pairs: &[DispatchPair],
        scheduler_info: &SolverSchedulerInfo,
        time_step: f32,
        contacts: &mut StreamWriter<'_, ContactManifold>,
        jacobians: &mut StreamWriter<'_, JointJacobian>,
    ) -> usize {
        let (offset, count) = scheduler_info.get_work_item_read_offset(contacts.work_item());
        let Some(pairs) = dispatch_pairs.get(offset..offset + count) else {
            trace!("work item {} reads past the dispatch pairs", contacts.work_item());
            return count;
        };

        let mut skipped = 0;
        let mut manifolds = Vec::new();
        for pair in pairs {
            if !pair.is_valid {
                skipped += 1;
                continue;
            }
            if pair.is_contact {
                if !Self::process_contact(world, pair, time_step, &mut manifolds) {
                    skipped += 1;
                }
                for manifold in manifolds.drain(..) {
                    contacts.write(manifold);
                }
            } else if let Some(jacobian) = Self::process_joint(world, pair) {
                jacobians.write(jacobian);
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            trace!("work item {}: skipped {} dispatch pairs", contacts.work_item(), skipped);
        }
        skipped
    }

    fn process_contact(
        world: &PhysicsWorld,
        pair: &DispatchPair,
        time_step: f32,
        out: &mut Vec<ContactManifold>,
    ) -> bool {
        let (Some(body_a), Some(body_b)) = (world.bodies.get(pair.body_a), world.bodies.get(pair.body_b))
        else {
            return false;
        };
        ManifoldQueries::body_body(
            body_a,
            body_b,
            &world.motion_velocity(pair.body_a),
            &world.motion_velocity(pair.body_b),
            world.collision_tolerance,
            time_step,
            BodyIndexPair::new(pair.body_a, pair.body_b),
            out,
        );
        true
    }

    fn process_joint(world: &PhysicsWorld, pair: &DispatchPair) -> Option<JointJacobian> {
        let joint = world.joints.get(pair.joint_index)?;
        let motion_a = world.motion_data(joint.body_pair.body_a)?;
        let motion_b = world.motion_data(joint.body_pair.body_b)?;
        Some(JointJacobian::build(joint, pair.joint_index, &motion_a, &motion_b))
    }

    /// Runs every work item, in parallel when `parallel` is set and the
    /// `parallel` feature is enabled. Both paths write identical streams.
    pub fn process_body_pairs(
        world: &PhysicsWorld,
        dispatch_pairs: &[DispatchPair],
        scheduler_info: &SolverSchedulerInfo,
        time_step: f32,
        parallel: bool,
    ) -> NarrowPhaseOutput {
        let num_work_items = scheduler_info.num_work_items();
        let mut contacts = WorkItemStream::new(num_work_items);
        let mut jacobians = WorkItemStream::new(num_work_items);

        #[cfg(feature = "parallel")]
        let skipped_pairs = if parallel {
            contacts
                .par_writers()
                .zip(jacobians.par_writers())
                .map(|(mut contact_writer, mut jacobian_writer)| {
                    Self::process_work_item(
                        world,
                        dispatch_pairs,
                        scheduler_info,
                        time_step,
                        &mut contact_writer,
                        &mut jacobian_writer,
                    )
                })
                .sum()
        } else {
            Self::process_sequential(world, dispatch_pairs, scheduler_info, time_step, &mut contacts, &mut jacobians)
        };
        #[cfg(not(feature = "parallel"))]
        let skipped_pairs = {
            let _ = parallel;
            Self::process_sequential(world, dispatch_pairs, scheduler_info, time_step, &mut contacts, &mut jacobians)
        };

        debug!(
            "narrow phase: {} work items, {} manifolds, {} jacobians, {} skipped",
            num_work_items,
            contacts.len(),
            jacobians.len(),
            skipped_pairs
        );
        NarrowPhaseOutput {
            contacts,
            jacobians,
            skipped_pairs,
        }
    }

    fn process_sequential(
        world: &PhysicsWorld,
        dispatch_pairs: &[DispatchPair],
        scheduler_info: &SolverSchedulerInfo,
        time_step: f32,
        contacts: &mut WorkItemStream<ContactManifold>,
        jacobians: &mut WorkItemStream<JointJacobian>,
    ) -> usize {
        contacts
            .writers()
            .zip(jacobians.writers())
            .map(|(mut contact_writer, mut jacobian_writer)| {
                Self::process_work_item(
                    world,
                    dispatch_pairs,
                    scheduler_info,
                    time_step,
                    &mut contact_writer,
                    &mut jacobian_writer,
                )
            })
            .sum()
    }

    /// Spawns the narrow phase off the calling thread. The dispatch pairs
    /// are dropped inside the task once the last work item has finished.
    pub fn schedule(
        world: Arc<PhysicsWorld>,
        dispatch_pairs: Vec<DispatchPair>,
        scheduler_info: SolverSchedulerInfo,
        time_step: f32,
        parallel: bool,
    ) -> NarrowPhaseHandle {
        JobHandle::spawn("narrow phase", move || {
            let output =
                Self::process_body_pairs(&world, &dispatch_pairs, &scheduler_info, time_step, parallel);
            drop(dispatch_pairs);
            output
        })
    }
}
