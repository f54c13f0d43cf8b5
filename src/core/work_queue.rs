//! `WorkQueue`: a priority-tiered (`high`/`medium`/`low`) thread pool with a
//! fairness ratio between medium and low work, used by contingency analysis
//! and optionally by diagnostics. A process-wide singleton with a defined
//! teardown, three queues guarded by one mutex and condition variable, and a
//! configurable priority ratio. The promise/future pairing is realized with
//! `std::sync::mpsc` rather than hand-rolled promises, since the crate
//! carries no async runtime to build a future type on.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::JoinHandle;

pub const DEFAULT_PRIORITY_RATIO: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkPriority {
    High,
    Medium,
    Low,
}

/// A unit of work the queue can execute.
pub trait WorkBlock: Send {
    fn execute(self: Box<Self>);
}

struct ClosureBlock<F: FnOnce() + Send> {
    func: Option<F>,
}

impl<F: FnOnce() + Send> WorkBlock for ClosureBlock<F> {
    fn execute(mut self: Box<Self>) {
        if let Some(f) = self.func.take() {
            f();
        }
    }
}

/// A handle to a work block's eventual result, the Rust analogue of the
/// source's `std::shared_future<retType>`.
pub struct WorkHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> WorkHandle<T> {
    pub fn wait(self) -> T {
        self.rx.recv().expect("work block dropped before completion")
    }
}

struct Queues {
    high: VecDeque<Box<dyn WorkBlock>>,
    medium: VecDeque<Box<dyn WorkBlock>>,
    low: VecDeque<Box<dyn WorkBlock>>,
    halt: bool,
    med_counter: u32,
    priority_ratio: u32,
}

/// Worker-pool work queue. Construct with [`WorkQueue::new`] (a bounded
/// instance) or reach the process-wide instance via [`WorkQueue::instance`].
pub struct WorkQueue {
    queues: Arc<(Mutex<Queues>, Condvar)>,
    workers: Vec<JoinHandle<()>>,
    synchronous: bool,
}

impl WorkQueue {
    /// Callers wanting the default worker count pick `None`, which resolves
    /// to `hardware_concurrency() + 1`. `Some(0)` means synchronous (inline)
    /// execution.
    pub fn new(thread_count: Option<usize>) -> Self {
        let count = thread_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() + 1)
                .unwrap_or(2)
        });

        let queues = Arc::new((
            Mutex::new(Queues {
                high: VecDeque::new(),
                medium: VecDeque::new(),
                low: VecDeque::new(),
                halt: false,
                med_counter: 0,
                priority_ratio: DEFAULT_PRIORITY_RATIO,
            }),
            Condvar::new(),
        ));

        if count == 0 {
            return WorkQueue {
                queues,
                workers: Vec::new(),
                synchronous: true,
            };
        }

        let mut workers = Vec::with_capacity(count);
        for _ in 0..count {
            let queues = queues.clone();
            workers.push(std::thread::spawn(move || worker_loop(queues)));
        }

        WorkQueue {
            queues,
            workers,
            synchronous: false,
        }
    }

    /// The process-wide singleton, constructed once under a one-time
    /// initializer.
    pub fn instance() -> &'static Mutex<WorkQueue> {
        static INSTANCE: OnceLock<Mutex<WorkQueue>> = OnceLock::new();
        INSTANCE.get_or_init(|| Mutex::new(WorkQueue::new(None)))
    }

    /// Updates the fairness ratio shared with the running worker threads;
    /// takes effect on their next pop, not just on `self`.
    pub fn set_priority_ratio(&self, ratio: u32) {
        let (lock, _) = &*self.queues;
        let mut q = lock.lock().unwrap();
        q.priority_ratio = if ratio > 0 { ratio } else { DEFAULT_PRIORITY_RATIO };
    }

    pub fn is_empty(&self) -> bool {
        self.num_blocks() == 0
    }

    pub fn num_blocks(&self) -> usize {
        let (lock, _) = &*self.queues;
        let q = lock.lock().unwrap();
        q.high.len() + q.medium.len() + q.low.len()
    }

    /// Submit a closure, returning a handle to its result. Runs inline if
    /// this queue has zero workers.
    pub fn add_work<F, T>(&self, priority: WorkPriority, func: F) -> WorkHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let block = ClosureBlock {
            func: Some(move || {
                let result = func();
                let _ = tx.send(result);
            }),
        };

        if self.synchronous {
            Box::new(block).execute();
            return WorkHandle { rx };
        }

        let (lock, cvar) = &*self.queues;
        {
            let mut q = lock.lock().unwrap();
            match priority {
                WorkPriority::High => q.high.push_back(Box::new(block)),
                WorkPriority::Medium => q.medium.push_back(Box::new(block)),
                WorkPriority::Low => q.low.push_back(Box::new(block)),
            }
        }
        cvar.notify_one();
        WorkHandle { rx }
    }

    pub fn destroy_worker_queue(self) {
        let (lock, cvar) = &*self.queues;
        {
            let mut q = lock.lock().unwrap();
            q.halt = true;
        }
        cvar.notify_all();
        for w in self.workers {
            let _ = w.join();
        }
    }
}

/// Pops the next block by priority and fairness: high first; otherwise every
/// `priority_ratio` medium items, one low item. Reads `priority_ratio` from
/// the locked `Queues` itself so a live `set_priority_ratio` call is visible
/// to every worker on its next pop.
fn pop_next(q: &mut Queues) -> Option<Box<dyn WorkBlock>> {
    if let Some(b) = q.high.pop_front() {
        return Some(b);
    }
    if q.med_counter >= q.priority_ratio {
        if let Some(b) = q.low.pop_front() {
            q.med_counter = 0;
            return Some(b);
        }
    }
    if let Some(b) = q.medium.pop_front() {
        q.med_counter += 1;
        return Some(b);
    }
    q.low.pop_front()
}

fn worker_loop(queues: Arc<(Mutex<Queues>, Condvar)>) {
    let (lock, cvar) = &*queues;
    loop {
        let block = {
            let mut q = lock.lock().unwrap();
            loop {
                if let Some(b) = pop_next(&mut q) {
                    break Some(b);
                }
                if q.halt {
                    break None;
                }
                q = cvar.wait(q).unwrap();
            }
        };
        match block {
            Some(b) => b.execute(),
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn synchronous_queue_runs_inline() {
        let q = WorkQueue::new(Some(0));
        let handle = q.add_work(WorkPriority::Medium, || 2 + 2);
        assert_eq!(handle.wait(), 4);
    }

    #[test]
    fn threaded_queue_completes_all_work() {
        let q = WorkQueue::new(Some(4));
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for i in 0..20 {
            let counter = counter.clone();
            handles.push(q.add_work(WorkPriority::Medium, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                i
            }));
        }
        let mut results: Vec<i32> = handles.into_iter().map(|h| h.wait()).collect();
        results.sort();
        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn high_priority_work_is_not_starved() {
        let q = WorkQueue::new(Some(1));
        let h = q.add_work(WorkPriority::High, || "urgent");
        assert_eq!(h.wait(), "urgent");
    }

    fn push_label(q: &mut Queues, priority: WorkPriority, label: &'static str) {
        let block: Box<dyn WorkBlock> = Box::new(ClosureBlock {
            func: Some(move || {
                let _ = label;
            }),
        });
        match priority {
            WorkPriority::High => q.high.push_back(block),
            WorkPriority::Medium => q.medium.push_back(block),
            WorkPriority::Low => q.low.push_back(block),
        }
    }

    #[test]
    fn priority_ratio_takes_effect_live() {
        let mut q = Queues {
            high: VecDeque::new(),
            medium: VecDeque::new(),
            low: VecDeque::new(),
            halt: false,
            med_counter: 0,
            priority_ratio: 2,
        };
        for _ in 0..4 {
            push_label(&mut q, WorkPriority::Medium, "m");
        }
        push_label(&mut q, WorkPriority::Low, "l");

        // priority_ratio == 2: medium, medium, then low.
        assert!(pop_next(&mut q).is_some()); // medium
        assert!(pop_next(&mut q).is_some()); // medium
        assert_eq!(q.low.len(), 1);
        pop_next(&mut q); // low, resets med_counter

        // Mutating priority_ratio on the same shared Queues (as
        // `WorkQueue::set_priority_ratio` does under its mutex) changes
        // fairness on the very next pop, not just for a future instance.
        q.priority_ratio = 1;
        push_label(&mut q, WorkPriority::Low, "l2");
        assert!(pop_next(&mut q).is_some()); // medium, med_counter -> 1
        assert_eq!(q.low.len(), 1);
        pop_next(&mut q); // med_counter >= 1 now, low goes next
        assert_eq!(q.low.len(), 0);
    }
}
