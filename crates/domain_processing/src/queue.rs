//! In-memory priority job queue
//!
//! Requests are kept ordered by priority tier. Ordering within a tier is the
//! order of insertion, so a stable sort by priority alone is enough to keep
//! the queue canonical after every insertion.

use std::collections::VecDeque;

use core_kernel::JobId;

use crate::request::ProcessingRequest;

/// Priority-ordered queue of processing requests
///
/// Not synchronised; the dispatcher owns it behind its state mutex.
#[derive(Debug, Default)]
pub struct JobQueue {
    items: VecDeque<ProcessingRequest>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request behind everything of equal or higher priority
    pub fn push_back(&mut self, request: ProcessingRequest) {
        self.items.push_back(request);
        self.resort();
    }

    /// Places a request ahead of every queued request of equal priority
    ///
    /// The request is inserted at the head and the queue is re-sorted, so it
    /// still lands behind any request of strictly higher priority.
    pub fn push_front(&mut self, request: ProcessingRequest) {
        self.items.push_front(request);
        self.resort();
    }

    /// Removes the next request to dispatch
    pub fn pop(&mut self) -> Option<ProcessingRequest> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of a queued job, 0 being next to dispatch
    pub fn position(&self, job_id: JobId) -> Option<usize> {
        self.items.iter().position(|r| r.id == job_id)
    }

    /// Removes every queued request, returning them in dispatch order
    pub fn drain(&mut self) -> Vec<ProcessingRequest> {
        self.items.drain(..).collect()
    }

    fn resort(&mut self) {
        // sort_by_key on a slice is stable
        self.items
            .make_contiguous()
            .sort_by_key(|r| r.priority.rank());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{DocumentSubmission, JobPriority};
    use core_kernel::DocumentId;
    use proptest::prelude::*;

    fn request(priority: JobPriority) -> ProcessingRequest {
        let submission = DocumentSubmission::new(DocumentId::new(), "/scan.pdf", "pdf");
        ProcessingRequest::from_submission(submission, priority, 3, None)
    }

    fn drain_priorities(queue: &mut JobQueue) -> Vec<JobPriority> {
        std::iter::from_fn(|| queue.pop()).map(|r| r.priority).collect()
    }

    #[test]
    fn test_pops_by_priority() {
        let mut queue = JobQueue::new();
        queue.push_back(request(JobPriority::Low));
        queue.push_back(request(JobPriority::High));
        queue.push_back(request(JobPriority::Normal));

        assert_eq!(
            drain_priorities(&mut queue),
            vec![JobPriority::High, JobPriority::Normal, JobPriority::Low]
        );
    }

    #[test]
    fn test_stable_within_tier() {
        let mut queue = JobQueue::new();
        let first = request(JobPriority::Normal);
        let second = request(JobPriority::Normal);
        let (a, b) = (first.id, second.id);
        queue.push_back(first);
        queue.push_back(second);

        assert_eq!(queue.pop().map(|r| r.id), Some(a));
        assert_eq!(queue.pop().map(|r| r.id), Some(b));
    }

    #[test]
    fn test_push_front_jumps_equal_priority_only() {
        let mut queue = JobQueue::new();
        let existing_high = request(JobPriority::High);
        let existing_high_id = existing_high.id;
        queue.push_back(existing_high);
        queue.push_back(request(JobPriority::Normal));
        queue.push_back(request(JobPriority::Low));

        let urgent = request(JobPriority::High);
        let urgent_id = urgent.id;
        queue.push_front(urgent);

        // Ahead of the earlier high item, since push_front wins ties
        assert_eq!(queue.position(urgent_id), Some(0));
        assert_eq!(queue.position(existing_high_id), Some(1));

        let normal = request(JobPriority::Normal);
        let normal_id = normal.id;
        queue.push_front(normal);
        // Behind both high items, ahead of the queued normal
        assert_eq!(queue.position(normal_id), Some(2));
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = JobQueue::new();
        queue.push_back(request(JobPriority::Low));
        queue.push_back(request(JobPriority::High));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].priority, JobPriority::High);
        assert!(queue.is_empty());
    }

    fn priority_strategy() -> impl Strategy<Value = JobPriority> {
        prop_oneof![
            Just(JobPriority::High),
            Just(JobPriority::Normal),
            Just(JobPriority::Low),
        ]
    }

    proptest! {
        #[test]
        fn queue_is_priority_sorted_and_stable(priorities in prop::collection::vec(priority_strategy(), 0..40)) {
            let mut queue = JobQueue::new();
            let mut expected: Vec<(u8, JobId)> = Vec::new();
            for priority in priorities {
                let req = request(priority);
                expected.push((priority.rank(), req.id));
                queue.push_back(req);
            }
            expected.sort_by_key(|(rank, _)| *rank);

            let popped: Vec<JobId> = std::iter::from_fn(|| queue.pop()).map(|r| r.id).collect();
            let expected_ids: Vec<JobId> = expected.into_iter().map(|(_, id)| id).collect();
            prop_assert_eq!(popped, expected_ids);
        }
    }
}
