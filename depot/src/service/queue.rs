//! FIFO queue of pending download tasks, unique by package.
//!
//! Uniqueness is enforced by the enqueue path: callers remove any existing
//! entry for a package (emitting `Cancelled` for each) before pushing the
//! replacement, so the queue itself stays a plain FIFO.

use std::collections::VecDeque;

use crate::release::Task;

/// Ordered list of tasks waiting for the single download slot.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task at the tail.
    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Removes and returns the head task.
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Removes every task for `package`, preserving the order of the rest.
    ///
    /// Returns the removed tasks so the caller can emit a `Cancelled`
    /// event for each.
    pub fn remove(&mut self, package: &str) -> Vec<Task> {
        let (removed, kept): (Vec<Task>, Vec<Task>) = self
            .tasks
            .drain(..)
            .partition(|task| task.package == package);
        self.tasks = kept.into();
        removed
    }

    /// Removes and returns every queued task.
    pub fn drain_all(&mut self) -> Vec<Task> {
        self.tasks.drain(..).collect()
    }

    /// Returns true if a task for `package` is queued.
    pub fn contains(&self, package: &str) -> bool {
        self.tasks.iter().any(|task| task.package == package)
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if no tasks are queued.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseDescriptor;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::collections::HashMap;

    fn make_task(package: &str) -> Task {
        let release = ReleaseDescriptor {
            package: package.to_string(),
            display_name: package.to_string(),
            version_code: 1,
            version_name: String::new(),
            url: format!("https://repo.example.org/{}.zip", package),
            auth_token: None,
            hash: "00".repeat(32),
            hash_type: String::new(),
            signer: "11".repeat(32),
            permissions: BTreeSet::new(),
            cache_file_name: format!("{}.zip", package),
        };
        Task::new(package, package, release)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        queue.push(make_task("com.example.a"));
        queue.push(make_task("com.example.b"));
        queue.push(make_task("com.example.c"));

        assert_eq!(queue.pop().unwrap().package, "com.example.a");
        assert_eq!(queue.pop().unwrap().package, "com.example.b");
        assert_eq!(queue.pop().unwrap().package, "com.example.c");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_remove_returns_matching_tasks() {
        let mut queue = TaskQueue::new();
        queue.push(make_task("com.example.a"));
        queue.push(make_task("com.example.b"));

        let removed = queue.remove("com.example.a");
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].package, "com.example.a");
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains("com.example.a"));
        assert!(queue.contains("com.example.b"));
    }

    #[test]
    fn test_remove_preserves_order_of_rest() {
        let mut queue = TaskQueue::new();
        queue.push(make_task("com.example.a"));
        queue.push(make_task("com.example.b"));
        queue.push(make_task("com.example.c"));

        queue.remove("com.example.b");

        assert_eq!(queue.pop().unwrap().package, "com.example.a");
        assert_eq!(queue.pop().unwrap().package, "com.example.c");
    }

    #[test]
    fn test_remove_missing_package_is_empty() {
        let mut queue = TaskQueue::new();
        queue.push(make_task("com.example.a"));

        assert!(queue.remove("com.example.zzz").is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_all() {
        let mut queue = TaskQueue::new();
        queue.push(make_task("com.example.a"));
        queue.push(make_task("com.example.b"));

        let drained = queue.drain_all();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    proptest! {
        /// The enqueue protocol (remove-then-push) leaves at most one queued
        /// task per package for any sequence of enqueues.
        #[test]
        fn test_enqueue_sequences_stay_unique(names in proptest::collection::vec("[a-c]", 0..32)) {
            let mut queue = TaskQueue::new();
            for name in &names {
                queue.remove(name);
                queue.push(make_task(name));
            }

            let mut counts: HashMap<String, usize> = HashMap::new();
            while let Some(task) = queue.pop() {
                *counts.entry(task.package).or_insert(0) += 1;
            }
            for (package, count) in counts {
                prop_assert_eq!(count, 1, "package {} queued {} times", package, count);
            }
        }
    }
}
