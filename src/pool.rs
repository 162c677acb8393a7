//! A worker pool with a bounded task queue.
//!
//! The pool runs boxed closures on a fixed number of worker threads. The
//! queue is bounded: [`ThreadPool::enqueue`] blocks when it is full, which
//! applies back-pressure to producers. [`ThreadPool::join`] drains the
//! queue, destroys the workers, and is idempotent; enqueueing after a join
//! reinitializes the pool.
//!
//! # Examples
//!
//! ```
//! use metadbg::pool::ThreadPool;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let mut pool = ThreadPool::new(2, 100);
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..10 {
//!     let counter = counter.clone();
//!     pool.enqueue(move || { counter.fetch_add(1, Ordering::SeqCst); });
//! }
//! pool.join();
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;


//-----------------------------------------------------------------------------

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct State {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    task_added: Condvar,
    task_taken: Condvar,
}

struct Workers {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

//-----------------------------------------------------------------------------

/// A fixed-size worker pool with a bounded queue.
///
/// See the module documentation for an example.
pub struct ThreadPool {
    num_threads: usize,
    max_tasks: usize,
    workers: Option<Workers>,
}

impl ThreadPool {
    /// Creates a pool with the given number of workers.
    ///
    /// The queue bound is `max_tasks` capped by five tasks per worker.
    /// Workers are started lazily by the first [`ThreadPool::enqueue`].
    ///
    /// # Panics
    ///
    /// Panics if `num_threads == 0` or `max_tasks == 0`.
    pub fn new(num_threads: usize, max_tasks: usize) -> Self {
        assert!(num_threads > 0, "ThreadPool: No worker threads");
        assert!(max_tasks > 0, "ThreadPool: Empty task queue");
        ThreadPool {
            num_threads,
            max_tasks: max_tasks.min(num_threads * 5),
            workers: None,
        }
    }

    /// Returns the number of worker threads.
    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Returns the queue bound.
    #[inline]
    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    // Starts the workers.
    fn initialize(&mut self) {
        let shared = Arc::new(Shared::default());
        let mut handles = Vec::with_capacity(self.num_threads);
        for _ in 0..self.num_threads {
            let shared = shared.clone();
            handles.push(std::thread::spawn(move || {
                loop {
                    let task = {
                        let mut state = shared.state.lock().unwrap();
                        loop {
                            if let Some(task) = state.tasks.pop_front() {
                                shared.task_taken.notify_one();
                                break Some(task);
                            }
                            if state.shutdown {
                                break None;
                            }
                            state = shared.task_added.wait(state).unwrap();
                        }
                    };
                    match task {
                        Some(task) => task(),
                        None => return,
                    }
                }
            }));
        }
        self.workers = Some(Workers { shared, handles });
    }

    /// Submits a task, blocking while the queue is full.
    ///
    /// Reinitializes the pool if the workers were destroyed by a previous
    /// [`ThreadPool::join`].
    pub fn enqueue<F: FnOnce() + Send + 'static>(&mut self, task: F) {
        if self.workers.is_none() {
            self.initialize();
        }
        let shared = &self.workers.as_ref().unwrap().shared;
        let mut state = shared.state.lock().unwrap();
        while state.tasks.len() >= self.max_tasks {
            state = shared.task_taken.wait(state).unwrap();
        }
        state.tasks.push_back(Box::new(task));
        drop(state);
        shared.task_added.notify_one();
    }

    /// Waits until all submitted tasks have completed and destroys the
    /// workers. A join without preceding tasks is a no-op.
    pub fn join(&mut self) {
        let workers = match self.workers.take() {
            Some(workers) => workers,
            None => return,
        };
        {
            let mut state = workers.shared.state.lock().unwrap();
            state.shutdown = true;
        }
        workers.shared.task_added.notify_all();
        for handle in workers.handles {
            handle.join().unwrap();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.join();
    }
}

//-----------------------------------------------------------------------------
