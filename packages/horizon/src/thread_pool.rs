//! Fork-join execution of per-frame parallel phases.

use crossbeam::{
    channel::{self, Sender},
    sync::WaitGroup,
};
use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};

// task sent to a worker thread, its real lifetime erased
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs a batch of tasks in parallel and blocks until all of them are done.
///
/// Worker threads are spawned once and live as long as the pool, taking
/// tasks from a shared queue. Tasks may still borrow from the caller's stack,
/// such as per-worker buffers and disjoint canvas regions, since `run` does
/// not return before every task it submitted has finished. The first task
/// runs on the calling thread. A panic in any task is resumed on the calling
/// thread once all tasks have stopped.
#[derive(Debug)]
pub struct ForkJoinPool {
    workers: usize,
    jobs: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

// waits for the jobs of one `run` call, even while unwinding
struct JoinGuard(Option<WaitGroup>);

impl JoinGuard {
    fn handle(&self) -> Option<WaitGroup> {
        self.0.clone()
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        if let Some(wait_group) = self.0.take() {
            wait_group.wait();
        }
    }
}

impl ForkJoinPool {
    /// Construct with a given number of workers, spawning all but one of
    /// them as threads. The calling thread is the last worker.
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "fork-join pool needs at least 1 worker");
        let (send, recv) = channel::unbounded::<Job>();
        let threads = (1..workers)
            .map(|_| {
                let recv = recv.clone();
                thread::spawn(move || {
                    // ends once the pool drops its sender
                    for job in recv {
                        job();
                    }
                })
            })
            .collect();
        ForkJoinPool {
            workers,
            jobs: Some(send),
            threads,
        }
    }

    /// Number of workers, ie. how many pieces callers should split work into.
    pub fn workers(&self) -> usize {
        self.workers
    }

    // hand a job to a worker thread, or run it here if there are none
    fn submit(&self, job: Job) {
        match self.jobs.as_ref() {
            Some(jobs) => if let Err(rejected) = jobs.send(job) {
                (rejected.0)();
            },
            None => job(),
        }
    }

    /// Call `f` with each item and its index, in parallel, returning the
    /// results in order.
    pub fn run<I, T, R, F>(&self, items: I, f: F) -> Vec<R>
    where
        I: IntoIterator<Item=T>,
        T: Send,
        R: Send,
        F: Fn(usize, T) -> R + Sync,
    {
        let f = &f;
        let mut items = items.into_iter().enumerate();
        let (first_i, first_item) = match items.next() {
            Some(first) => first,
            None => return Vec::new(),
        };

        let (send_result, recv_result) = channel::unbounded();
        let guard = JoinGuard(Some(WaitGroup::new()));
        let mut submitted = 0;
        for (i, item) in items {
            let send_result = send_result.clone();
            let done = guard.handle();
            let job: Box<dyn FnOnce() + Send + '_> = Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| f(i, item)));
                let _ = send_result.send((i, result));
                drop(send_result);
                drop(done);
            });
            // SAFETY: the job touches nothing borrowed after dropping its wait
            // group handle, and the guard outlives this call's borrows and
            // waits for every handle to be dropped.
            let job: Job = unsafe { mem::transmute(job) };
            self.submit(job);
            submitted += 1;
        }
        drop(send_result);

        let first_result = panic::catch_unwind(AssertUnwindSafe(|| f(first_i, first_item)));
        drop(guard);

        let mut results = (0..=submitted).map(|_| None).collect::<Vec<Option<R>>>();
        let mut panicked = None;
        for (i, result) in Some((first_i, first_result)).into_iter().chain(recv_result.try_iter()) {
            match result {
                Ok(r) => results[i] = Some(r),
                Err(e) => panicked = Some(e),
            }
        }
        if let Some(e) = panicked {
            panic::resume_unwind(e);
        }
        results.into_iter().flatten().collect()
    }
}

impl Drop for ForkJoinPool {
    fn drop(&mut self) {
        self.jobs.take();
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}


#[test]
fn test_run_preserves_order_and_borrows() {
    let pool = ForkJoinPool::new(4);
    let mut buffers = vec![Vec::new(); 4];
    let lens = pool.run(buffers.iter_mut(), |i, buf| {
        for k in 0..=i {
            buf.push(k);
        }
        buf.len()
    });
    assert_eq!(lens, vec![1, 2, 3, 4]);
    assert_eq!(buffers[3], vec![0, 1, 2, 3]);
    assert!(pool.run(Vec::<u32>::new(), |_, n| n).is_empty());
}

#[test]
fn test_workers_outlive_calls() {
    use std::collections::HashSet;

    let pool = ForkJoinPool::new(3);
    let mut threads = HashSet::new();
    for _ in 0..20 {
        threads.extend(pool.run(0..3, |_, _| thread::current().id()));
    }
    // the caller and two workers, never a fresh thread per call
    assert!(threads.len() <= 3, "{} threads", threads.len());
    assert!(threads.contains(&thread::current().id()));
}

#[test]
fn test_single_worker_runs_everything_inline() {
    let pool = ForkJoinPool::new(1);
    let ids = pool.run(0..5, |i, n| (i, n * 2, thread::current().id()));
    assert_eq!(ids.len(), 5);
    assert!(ids.iter().enumerate().all(|(k, &(i, n, id))| {
        i == k && n == 2 * k && id == thread::current().id()
    }));
}

#[test]
fn test_pool_survives_panicking_task() {
    let pool = ForkJoinPool::new(2);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.run(0..2, |i, _| {
            if i == 1 {
                panic!("task failed");
            }
        })
    }));
    assert!(result.is_err());
    assert_eq!(pool.run(0..2, |i, _| i), vec![0, 1]);
}

#[test]
#[should_panic]
fn test_run_propagates_panics() {
    let pool = ForkJoinPool::new(2);
    pool.run(0..2, |i, _| {
        if i == 1 {
            panic!("task failed");
        }
    });
}
