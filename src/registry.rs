//! Stable-handle table of live transfer jobs.
//!
//! Jobs are stored in a slot arena and addressed by a generation-checked
//! handle, so a handle that outlives its job can never resolve to an
//! unrelated job reusing the same slot. The handle doubles as the delivery
//! token given to the spawned worker. All mutation happens on the
//! coordinator's control task.

use std::collections::HashMap;

use crate::worker::WorkerHandle;

/// Caller-supplied correlation token for one transfer job. Must be unique
/// among currently-live jobs; reuse after the job closes starts an unrelated
/// job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Coordinator-private identifier of a job slot: index plus generation
/// counter. Resolving a handle whose job was reclaimed fails instead of
/// returning whatever occupies the slot now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    index: u32,
    generation: u32,
}

/// One live transfer job: the caller's token and exclusive ownership of the
/// worker performing the transfer.
pub struct Job {
    pub request_id: RequestId,
    worker: Option<WorkerHandle>,
}

impl Job {
    /// The worker's command channel, if ownership has not been released.
    pub fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    /// Drop the job's exclusive ownership of its worker. Closing the command
    /// channel is the worker's cue to stop; teardown is asynchronous and
    /// best-effort, the job itself stays live until its terminal event.
    pub fn release_worker(&mut self) {
        self.worker = None;
    }
}

struct Slot {
    generation: u32,
    job: Option<Job>,
}

/// Slot arena of live jobs with a request-id index.
#[derive(Default)]
pub struct JobTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_request: HashMap<RequestId, JobHandle>,
}

impl JobTable {
    /// Allocate a slot, build the worker with the slot's handle as its
    /// delivery token, and record the token mapping.
    ///
    /// Panics if `request_id` already maps to a live job: live-token reuse is
    /// a caller programming error, not a recoverable condition.
    pub fn create(
        &mut self,
        request_id: RequestId,
        build_worker: impl FnOnce(JobHandle) -> WorkerHandle,
    ) -> JobHandle {
        assert!(
            !self.by_request.contains_key(&request_id),
            "transfer {:?} already has a live job",
            request_id
        );
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    job: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.slots[index as usize].generation;
        let handle = JobHandle { index, generation };
        let worker = build_worker(handle);
        self.slots[index as usize].job = Some(Job {
            request_id,
            worker: Some(worker),
        });
        self.by_request.insert(request_id, handle);
        handle
    }

    /// Handle of the live job started with `request_id`, if any.
    pub fn find(&self, request_id: RequestId) -> Option<JobHandle> {
        self.by_request.get(&request_id).copied()
    }

    /// Resolve a handle. Fails for handles whose job was reclaimed, even if
    /// the slot has since been reused.
    pub fn get(&self, handle: JobHandle) -> Option<&Job> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.job.as_ref())
    }

    /// Remove a job and its token mapping, returning the job (and with it
    /// ownership of any worker it still holds).
    ///
    /// Panics if the handle does not resolve: `close` is only reached from
    /// reclamation of a resolved job, so a miss means the handle-validity
    /// invariant is already broken.
    pub fn close(&mut self, handle: JobHandle) -> Job {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation);
        let Some(slot) = slot else {
            panic!("reclaiming unknown job handle {:?}", handle);
        };
        let Some(job) = slot.job.take() else {
            panic!("reclaiming empty job slot {:?}", handle);
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.by_request.remove(&job.request_id);
        job
    }

    /// Visit every live job. Used by shutdown to release all workers.
    pub fn for_each(&mut self, mut visit: impl FnMut(JobHandle, &mut Job)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(job) = slot.job.as_mut() {
                let handle = JobHandle {
                    index: index as u32,
                    generation: slot.generation,
                };
                visit(handle, job);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_request.len()
    }
}
