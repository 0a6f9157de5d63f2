//! The bounded, admission-controlled render queue.
//!
//! Bookkeeping (`submit`, `advance`, `cancel`, timer fires, settlement) is
//! serialized behind a single async mutex: the visible effect is that no
//! two bookkeeping steps ever observe a partially updated queue, matching
//! the "logically single-threaded" scheduling model. Per-job render work
//! (`process`) runs off this serialization point so up to `concurrency`
//! renders proceed in parallel.

use crate::events::{QueueEvent, QueueObserver};
use crate::pdf_result::PdfResult;
use crate::queue_item::{CancelHandle, QueueItem};
use crate::render_error::RenderError;
use docrender_shared::{ErrorCode, ErrorEnvelope};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, oneshot};

/// Immutable queue configuration, validated at construction.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Maximum number of renders permitted to run concurrently. `0` means
    /// the queue admits work but never starts it.
    pub concurrency: usize,
    /// How long an item may wait before being promoted, in milliseconds.
    pub queue_timeout_ms: u64,
    /// How long a render may run before being aborted, in milliseconds.
    pub execution_timeout_ms: u64,
    /// Maximum number of items (waiting + running) admitted at once.
    pub max_task_count: usize,
}

impl QueueConfig {
    /// Validate the configuration, matching the invariants of `queueTimeoutMs
    /// > 0`, `executionTimeoutMs > 0`, and `maxTaskCount >= 1`.
    pub fn validate(self) -> Result<Self, ErrorEnvelope> {
        if self.queue_timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "queueTimeoutMs must be greater than zero",
            ));
        }
        if self.execution_timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "executionTimeoutMs must be greater than zero",
            ));
        }
        if self.max_task_count == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "maxTaskCount must be at least one",
            ));
        }
        Ok(self)
    }
}

enum TimerKind {
    QueueTimeout,
    Execution,
}

struct Entry {
    item: QueueItem,
    sender: Option<oneshot::Sender<Result<PdfResult, RenderError>>>,
    timer: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for Entry {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

struct State {
    waiting: VecDeque<String>,
    running: HashSet<String>,
    entries: HashMap<String, Entry>,
}

impl State {
    fn new() -> Self {
        Self {
            waiting: VecDeque::new(),
            running: HashSet::new(),
            entries: HashMap::new(),
        }
    }
}

struct QueueCore<O> {
    config: QueueConfig,
    observer: O,
    state: Mutex<State>,
    created_at: Instant,
}

impl<O> QueueCore<O> {
    fn millis_since(&self, instant: Instant) -> u64 {
        u64::try_from(instant.saturating_duration_since(self.created_at).as_millis())
            .unwrap_or(u64::MAX)
    }

    fn millis_elapsed(&self, since: Instant) -> u64 {
        u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// The bounded FIFO render queue.
///
/// Cheap to clone: internally an `Arc` handle shared across the HTTP front
/// door's request tasks and the background timer tasks it spawns.
pub struct Queue<O> {
    core: Arc<QueueCore<O>>,
}

impl<O> Clone for Queue<O> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<O> Queue<O>
where
    O: QueueObserver + 'static,
{
    /// Construct a new queue from a validated configuration.
    pub fn new(config: QueueConfig, observer: O) -> Result<Self, ErrorEnvelope> {
        let config = config.validate()?;
        Ok(Self {
            core: Arc::new(QueueCore {
                config,
                observer,
                state: Mutex::new(State::new()),
                created_at: Instant::now(),
            }),
        })
    }

    /// Submit an item for rendering.
    ///
    /// Returns synchronously-rejecting [`RenderError::QueueFull`] when the
    /// queue is already at `maxTaskCount`; otherwise returns a future that
    /// resolves once the item settles (success, failure, timeout, or
    /// cancellation via [`Queue::cancel`]).
    pub async fn submit(&self, mut item: QueueItem) -> Result<PdfResult, RenderError> {
        let job_id = item.job_id().as_str().to_string();
        let (tx, rx) = oneshot::channel();

        let admitted = {
            let mut state = self.core.state.lock().await;
            if state.waiting.len() + state.running.len() >= self.core.config.max_task_count {
                false
            } else {
                let now = Instant::now();
                item.notify_queue_add(now);
                state.waiting.push_back(job_id.clone());
                state.entries.insert(
                    job_id.clone(),
                    Entry {
                        item,
                        sender: Some(tx),
                        timer: None,
                    },
                );
                true
            }
        };

        if !admitted {
            self.core
                .observer
                .on_event(QueueEvent::QueueFull { job_id });
            return Err(RenderError::QueueFull);
        }

        self.core.observer.on_event(QueueEvent::QueueNew {
            job_id: job_id.clone(),
            added_at_ms: self.core.millis_since(Instant::now()),
        });
        self.arm_timer(job_id.clone(), TimerKind::QueueTimeout).await;
        self.advance().await;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RenderError::InternalFailure(
                "submission channel dropped without a settlement".to_string(),
            )),
        }
    }

    /// Cancel an admitted item, wherever it currently sits.
    ///
    /// Idempotent and safe in any state: a no-op if the item has already
    /// settled or was never admitted.
    pub async fn cancel(&self, job_id: &str) {
        enum Location {
            Waiting,
            Running,
        }

        let (location, cancel_handle, sender) = {
            let mut state = self.core.state.lock().await;
            if let Some(position) = state.waiting.iter().position(|id| id == job_id) {
                state.waiting.remove(position);
                match state.entries.remove(job_id) {
                    Some(mut entry) => (
                        Some(Location::Waiting),
                        Some(entry.item.cancel_handle()),
                        entry.sender.take(),
                    ),
                    None => (None, None, None),
                }
            } else if state.running.remove(job_id) {
                match state.entries.remove(job_id) {
                    Some(mut entry) => (
                        Some(Location::Running),
                        Some(entry.item.cancel_handle()),
                        entry.sender.take(),
                    ),
                    None => (None, None, None),
                }
            } else {
                (None, None, None)
            }
        };

        let Some(location) = location else {
            return;
        };

        match location {
            Location::Waiting => self.core.observer.on_event(QueueEvent::QueueAbort {
                job_id: job_id.to_string(),
            }),
            Location::Running => self.core.observer.on_event(QueueEvent::ProcessAbort {
                job_id: job_id.to_string(),
            }),
        }

        if let Some(cancel_handle) = cancel_handle {
            (cancel_handle)().await;
        }

        if let Some(sender) = sender {
            let _ = sender.send(Err(RenderError::ProcessingCancelled));
        }

        self.advance().await;
    }

    /// Returns true when the queue is at `maxTaskCount`. Pure observer.
    pub async fn is_queue_full(&self) -> bool {
        let state = self.core.state.lock().await;
        state.waiting.len() + state.running.len() >= self.core.config.max_task_count
    }

    /// Number of items currently waiting. Pure observer.
    pub async fn count_waiting(&self) -> usize {
        self.core.state.lock().await.waiting.len()
    }

    /// Number of items currently running. Pure observer.
    pub async fn count_running(&self) -> usize {
        self.core.state.lock().await.running.len()
    }

    async fn arm_timer(&self, job_id: String, kind: TimerKind) {
        let duration = match kind {
            TimerKind::QueueTimeout => Duration::from_millis(self.core.config.queue_timeout_ms),
            TimerKind::Execution => Duration::from_millis(self.core.config.execution_timeout_ms),
        };

        let queue = self.clone();
        let job_id_for_task = job_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            match kind {
                TimerKind::QueueTimeout => queue.fire_queue_timeout(job_id_for_task).await,
                TimerKind::Execution => queue.fire_execution_timeout(job_id_for_task).await,
            }
        });

        let mut state = self.core.state.lock().await;
        if let Some(entry) = state.entries.get_mut(&job_id) {
            entry.timer = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Promote items from waiting to running while the concurrency budget
    /// allows it. The single place that performs `waiting -> running`
    /// transitions, per the "advance protocol".
    async fn advance(&self) {
        loop {
            let promoted = {
                let mut state = self.core.state.lock().await;
                if state.running.len() >= self.core.config.concurrency {
                    None
                } else if let Some(job_id) = state.waiting.pop_front() {
                    if let Some(entry) = state.entries.get_mut(&job_id) {
                        entry.timer.take().inspect(|handle| handle.abort());
                        entry.item.notify_queue_start(Instant::now());
                    }
                    state.running.insert(job_id.clone());
                    Some(job_id)
                } else {
                    None
                }
            };

            let Some(job_id) = promoted else {
                return;
            };

            self.core.observer.on_event(QueueEvent::ProcessStarted {
                job_id: job_id.clone(),
                started_at_ms: self.core.millis_since(Instant::now()),
            });
            self.arm_timer(job_id.clone(), TimerKind::Execution).await;
            self.start_process(job_id).await;
        }
    }

    async fn start_process(&self, job_id: String) {
        let process_fn = {
            let mut state = self.core.state.lock().await;
            state
                .entries
                .get_mut(&job_id)
                .and_then(|entry| entry.item.take_process())
        };

        let Some(process_fn) = process_fn else {
            return;
        };

        let queue = self.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let result = process_fn().await;
            queue.on_process_settled(job_id, result, start).await;
        });
    }

    async fn on_process_settled(
        &self,
        job_id: String,
        result: Result<PdfResult, RenderError>,
        started: Instant,
    ) {
        let sender = {
            let mut state = self.core.state.lock().await;
            if !state.running.remove(&job_id) {
                return;
            }
            match state.entries.remove(&job_id) {
                Some(mut entry) => entry.sender.take(),
                None => return,
            }
        };

        match &result {
            Ok(_) => self.core.observer.on_event(QueueEvent::ProcessSuccess {
                job_id: job_id.clone(),
                duration_ms: self.core.millis_elapsed(started),
            }),
            Err(err) if !err.is_cancelled() => {
                self.core.observer.on_event(QueueEvent::ProcessFailure {
                    job_id: job_id.clone(),
                    duration_ms: self.core.millis_elapsed(started),
                });
            },
            Err(_) => {},
        }

        if let Some(sender) = sender {
            let _ = sender.send(result);
        }

        self.advance().await;
    }

    async fn fire_queue_timeout(&self, job_id: String) {
        let (sender, waited_ms) = {
            let mut state = self.core.state.lock().await;
            let Some(position) = state.waiting.iter().position(|id| id == &job_id) else {
                return;
            };
            state.waiting.remove(position);
            match state.entries.remove(&job_id) {
                Some(mut entry) => {
                    let waited_ms = entry
                        .item
                        .added_at()
                        .map_or(0, |added_at| self.core.millis_elapsed(added_at));
                    // This fire runs inside the very timer task stored in
                    // `entry.timer`; dropping the Entry normally would abort
                    // it mid-flight via `impl Drop`, cancelling the
                    // `advance()` call below before it completes. Detach it
                    // without aborting instead and let the task finish.
                    entry.timer = None;
                    (entry.sender.take(), waited_ms)
                },
                None => return,
            }
        };

        self.core.observer.on_event(QueueEvent::QueueTimeout {
            job_id: job_id.clone(),
            waited_ms,
        });

        if let Some(sender) = sender {
            let _ = sender.send(Err(RenderError::QueueTimeout));
        }

        self.advance().await;
    }

    async fn fire_execution_timeout(&self, job_id: String) {
        let found: Option<(CancelHandle, u64)> = {
            let state = self.core.state.lock().await;
            if !state.running.contains(&job_id) {
                None
            } else {
                state.entries.get(&job_id).map(|entry| {
                    let duration_ms = entry
                        .item
                        .started_at()
                        .map_or(0, |started_at| self.core.millis_elapsed(started_at));
                    (entry.item.cancel_handle(), duration_ms)
                })
            }
        };

        let Some((cancel_handle, duration_ms)) = found else {
            return;
        };

        self.core.observer.on_event(QueueEvent::ProcessTimeout {
            job_id: job_id.clone(),
            duration_ms,
        });

        (cancel_handle)().await;

        let sender = {
            let mut state = self.core.state.lock().await;
            if !state.running.remove(&job_id) {
                return;
            }
            match state.entries.remove(&job_id) {
                Some(mut entry) => {
                    // Same self-abort hazard as `fire_queue_timeout`: this
                    // fire runs inside the execution timer task stored in
                    // `entry.timer`. Detach rather than abort so the
                    // `advance()` call below isn't cancelled mid-flight.
                    entry.timer = None;
                    entry.sender.take()
                },
                None => return,
            }
        };

        if let Some(sender) = sender {
            let _ = sender.send(Err(RenderError::JobTimeout));
        }

        self.advance().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopObserver;
    use docrender_shared::CorrelationId;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(concurrency: usize, max_task_count: usize) -> QueueConfig {
        QueueConfig {
            concurrency,
            queue_timeout_ms: 5_000,
            execution_timeout_ms: 5_000,
            max_task_count,
        }
    }

    fn item_that_sleeps(job_id: &str, millis: u64) -> QueueItem {
        QueueItem::new(
            CorrelationId::parse(job_id).expect("valid id"),
            Box::new(move || {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    Ok(PdfResult::new(Vec::new(), "now".to_string()))
                })
            }),
            || Box::pin(async {}) as crate::queue_item::CancelFuture,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_rejects_synchronously_before_the_running_item_settles() {
        let queue = Queue::new(config(1, 1), NoopObserver).expect("valid config");
        let a = item_that_sleeps("job_a", 3_000);

        let queue_for_a = queue.clone();
        let a_handle = tokio::spawn(async move { queue_for_a.submit(a).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let b = item_that_sleeps("job_b", 10);
        let b_result = queue.submit(b).await;
        assert_eq!(b_result, Err(RenderError::QueueFull));

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let a_result = a_handle.await.expect("join");
        assert!(a_result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn queue_timeout_fires_without_ever_invoking_process() {
        let queue = Queue::new(
            QueueConfig {
                concurrency: 0,
                queue_timeout_ms: 1,
                execution_timeout_ms: 5_000,
                max_task_count: 1,
            },
            NoopObserver,
        )
        .expect("valid config");

        let invoked = Arc::new(AtomicUsize::new(0));
        let invoked_for_closure = Arc::clone(&invoked);
        let item = QueueItem::new(
            CorrelationId::parse("job_x").expect("valid id"),
            Box::new(move || {
                invoked_for_closure.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(PdfResult::new(Vec::new(), "now".to_string())) })
            }),
            || Box::pin(async {}) as crate::queue_item::CancelFuture,
        );

        let result = queue.submit(item).await;
        assert_eq!(result, Err(RenderError::QueueTimeout));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn execution_timeout_invokes_cancel_and_rejects_with_job_timeout() {
        let queue = Queue::new(
            QueueConfig {
                concurrency: 1,
                queue_timeout_ms: 5_000,
                execution_timeout_ms: 1,
                max_task_count: 1,
            },
            NoopObserver,
        )
        .expect("valid config");

        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled_for_closure = Arc::clone(&cancelled);
        let item = QueueItem::new(
            CorrelationId::parse("job_y").expect("valid id"),
            Box::new(|| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(3_000)).await;
                    Ok(PdfResult::new(Vec::new(), "now".to_string()))
                })
            }),
            move || {
                let cancelled = Arc::clone(&cancelled_for_closure);
                Box::pin(async move {
                    cancelled.fetch_add(1, Ordering::SeqCst);
                }) as crate::queue_item::CancelFuture
            },
        );

        let result = queue.submit(item).await;
        assert_eq!(result, Err(RenderError::JobTimeout));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_while_waiting_leaves_exactly_one_running_one_waiting() {
        let queue = Queue::new(config(1, 5), NoopObserver).expect("valid config");

        let a = item_that_sleeps("job_a", 50);
        let b = item_that_sleeps("job_b", 50);
        let c = item_that_sleeps("job_c", 10);

        let queue_a = queue.clone();
        let a_handle = tokio::spawn(async move { queue_a.submit(a).await });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let queue_b = queue.clone();
        let b_handle = tokio::spawn(async move { queue_b.submit(b).await });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let queue_c = queue.clone();
        let c_handle = tokio::spawn(async move { queue_c.submit(c).await });
        tokio::time::sleep(Duration::from_millis(1)).await;

        queue.cancel("job_c").await;

        assert_eq!(queue.count_waiting().await, 1);
        assert_eq!(queue.count_running().await, 1);

        let c_result = c_handle.await.expect("join");
        assert_eq!(c_result, Err(RenderError::ProcessingCancelled));

        let a_result = a_handle.await.expect("join");
        let b_result = b_handle.await.expect("join");
        assert!(a_result.is_ok());
        assert!(b_result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_while_running_invokes_cancel_fn_and_leaves_the_other_job_intact() {
        let queue = Queue::new(config(2, 2), NoopObserver).expect("valid config");

        let cancelled = Arc::new(AtomicUsize::new(0));
        let cancelled_for_closure = Arc::clone(&cancelled);
        let a = item_that_sleeps("job_a", 100);
        let b = QueueItem::new(
            CorrelationId::parse("job_b").expect("valid id"),
            Box::new(|| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(PdfResult::new(Vec::new(), "now".to_string()))
                })
            }),
            move || {
                let cancelled = Arc::clone(&cancelled_for_closure);
                Box::pin(async move {
                    cancelled.fetch_add(1, Ordering::SeqCst);
                }) as crate::queue_item::CancelFuture
            },
        );

        let queue_a = queue.clone();
        let a_handle = tokio::spawn(async move { queue_a.submit(a).await });
        let queue_b = queue.clone();
        let b_handle = tokio::spawn(async move { queue_b.submit(b).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(queue.count_running().await, 2);

        queue.cancel("job_b").await;

        let b_result = b_handle.await.expect("join");
        assert_eq!(b_result, Err(RenderError::ProcessingCancelled));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);

        let a_result = a_handle.await.expect("join");
        assert!(a_result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn fifo_order_holds_regardless_of_per_job_duration() {
        let queue = Queue::new(config(1, 5), NoopObserver).expect("valid config");
        let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        let make_item = |job_id: &'static str, millis: u64, order: Arc<Mutex<Vec<&'static str>>>| {
            QueueItem::new(
                CorrelationId::parse(job_id).expect("valid id"),
                Box::new(move || {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(millis)).await;
                        order.lock().await.push(job_id);
                        Ok(PdfResult::new(Vec::new(), "now".to_string()))
                    })
                }),
                || Box::pin(async {}) as crate::queue_item::CancelFuture,
            )
        };

        let one = make_item("job_one", 250, Arc::clone(&order));
        let two = make_item("job_two", 100, Arc::clone(&order));
        let three = make_item("job_three", 20, Arc::clone(&order));

        let queue_one = queue.clone();
        let h1 = tokio::spawn(async move { queue_one.submit(one).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        let queue_two = queue.clone();
        let h2 = tokio::spawn(async move { queue_two.submit(two).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        let queue_three = queue.clone();
        let h3 = tokio::spawn(async move { queue_three.submit(three).await });

        let (r1, r2, r3) = tokio::join!(h1, h2, h3);
        assert!(r1.expect("join").is_ok());
        assert!(r2.expect("join").is_ok());
        assert!(r3.expect("join").is_ok());

        assert_eq!(*order.lock().await, vec!["job_one", "job_two", "job_three"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Property-style check of the two invariants named in the capacity
        // laws: |waiting| + |running| <= maxTaskCount, and |running| <=
        // concurrency, across randomized (concurrency, capacity, burst size)
        // triples. Kept to 32 cases (default proptest is 256): every case
        // drives real async sleeps, unlike the teacher's sync validators.
        #[test]
        fn capacity_invariants_hold_under_random_concurrent_bursts(
            concurrency in 1usize..4,
            extra_capacity in 0usize..4,
            job_count in 1usize..8,
        ) {
            let max_task_count = concurrency + extra_capacity + 1;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("current-thread runtime");

            let (waiting, running) = runtime.block_on(async {
                let queue = Queue::new(config(concurrency, max_task_count), NoopObserver)
                    .expect("valid config");
                let mut handles = Vec::with_capacity(job_count);
                for index in 0..job_count {
                    let queue_for_job = queue.clone();
                    let item = item_that_sleeps(&format!("job_{index}"), 20);
                    handles.push(tokio::spawn(async move { queue_for_job.submit(item).await }));
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
                let snapshot = (queue.count_waiting().await, queue.count_running().await);
                for handle in handles {
                    let _ = handle.await;
                }
                snapshot
            });

            prop_assert!(waiting + running <= max_task_count);
            prop_assert!(running <= concurrency);
        }
    }
}
