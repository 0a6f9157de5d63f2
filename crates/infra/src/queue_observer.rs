//! Translates [`QueueEvent`]s into logger/telemetry calls.
//!
//! Grounded on `crates/adapters/src/telemetry.rs`'s `TelemetryPort` usage and
//! the teacher's `JobProgressWriter` (`crates/infra/src/jobs.rs` in the
//! original semantic-search layout): a small struct holding the ports it
//! reports through, with one match arm per lifecycle event. Never coupled to
//! a particular metrics library — the queue only knows about
//! `QueueObserver`, per `crates/domain/src/events.rs`'s own design note.

use docrender_domain::{QueueEvent, QueueObserver};
use docrender_ports::{LoggerPort, TelemetryPort};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reports every queue lifecycle event as a counter plus a structured log
/// line, and the two duration-bearing events as timers too.
pub struct TelemetryQueueObserver {
    logger: Arc<dyn LoggerPort>,
    telemetry: Arc<dyn TelemetryPort>,
}

impl TelemetryQueueObserver {
    /// Build an observer reporting through `logger` and `telemetry`.
    #[must_use]
    pub fn new(logger: Arc<dyn LoggerPort>, telemetry: Arc<dyn TelemetryPort>) -> Self {
        Self { logger, telemetry }
    }

    fn job_fields(job_id: &str) -> BTreeMap<Box<str>, serde_json::Value> {
        let mut fields = BTreeMap::new();
        fields.insert(
            "jobId".into(),
            serde_json::Value::String(job_id.to_string()),
        );
        fields
    }
}

impl QueueObserver for TelemetryQueueObserver {
    fn on_event(&self, event: QueueEvent) {
        match event {
            QueueEvent::QueueNew { job_id, .. } => {
                self.telemetry.increment_counter("queue.new", 1, None);
                self.logger
                    .debug("queue.new", "item admitted to queue", Some(Self::job_fields(&job_id)));
            },
            QueueEvent::QueueFull { job_id } => {
                self.telemetry.increment_counter("queue.full", 1, None);
                self.logger.warn(
                    "queue.full",
                    "admission refused: queue at capacity",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::QueueTimeout { job_id, waited_ms } => {
                self.telemetry.increment_counter("queue.timeout", 1, None);
                self.telemetry.record_timer_ms("queue.wait", waited_ms, None);
                self.logger.warn(
                    "queue.timeout",
                    "item aged out of the waiting set",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::QueueAbort { job_id } => {
                self.telemetry.increment_counter("queue.abort", 1, None);
                self.logger.info(
                    "queue.abort",
                    "waiting item cancelled by client",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::ProcessStarted { job_id, .. } => {
                self.telemetry
                    .increment_counter("process.started", 1, None);
                self.logger.debug(
                    "process.started",
                    "item promoted to running",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::ProcessSuccess { job_id, duration_ms } => {
                self.telemetry
                    .increment_counter("process.success", 1, None);
                self.telemetry
                    .record_timer_ms("process.duration", duration_ms, None);
                self.logger.info(
                    "process.success",
                    "render completed",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::ProcessFailure { job_id, duration_ms } => {
                self.telemetry
                    .increment_counter("process.failure", 1, None);
                self.telemetry
                    .record_timer_ms("process.duration", duration_ms, None);
                self.logger.error(
                    "process.failure",
                    "render failed",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::ProcessAbort { job_id } => {
                self.telemetry.increment_counter("process.abort", 1, None);
                self.logger.info(
                    "process.abort",
                    "running item cancelled by client",
                    Some(Self::job_fields(&job_id)),
                );
            },
            QueueEvent::ProcessTimeout { job_id, duration_ms } => {
                self.telemetry
                    .increment_counter("process.timeout", 1, None);
                self.telemetry
                    .record_timer_ms("process.duration", duration_ms, None);
                self.logger.error(
                    "process.timeout",
                    "render exceeded its execution timeout",
                    Some(Self::job_fields(&job_id)),
                );
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrender_ports::{TelemetryTags, TelemetryTimer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<Box<str>>>,
    }

    impl LoggerPort for RecordingLogger {
        fn log(&self, event: docrender_ports::LogEvent) {
            self.events
                .lock()
                .expect("logger lock")
                .push(event.event.clone());
        }

        fn child(&self, _fields: docrender_ports::LogFields) -> Box<dyn LoggerPort> {
            Box::new(Self::default())
        }
    }

    #[derive(Default)]
    struct RecordingTelemetry {
        counters: Mutex<Vec<Box<str>>>,
    }

    struct NoopTimer;
    impl TelemetryTimer for NoopTimer {
        fn stop(&self) {}
    }

    impl TelemetryPort for RecordingTelemetry {
        fn increment_counter(&self, name: &str, _value: u64, _tags: Option<&TelemetryTags>) {
            self.counters
                .lock()
                .expect("telemetry lock")
                .push(name.to_owned().into_boxed_str());
        }

        fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

        fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
            Box::new(NoopTimer)
        }
    }

    #[test]
    fn process_success_reports_a_counter_a_timer_and_an_info_log() {
        let logger = Arc::new(RecordingLogger::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let observer = TelemetryQueueObserver::new(logger.clone(), telemetry.clone());

        observer.on_event(QueueEvent::ProcessSuccess {
            job_id: "job_1".to_string(),
            duration_ms: 42,
        });

        assert_eq!(
            *logger.events.lock().expect("logger lock"),
            vec![Box::from("process.success")]
        );
        assert_eq!(
            *telemetry.counters.lock().expect("telemetry lock"),
            vec![Box::from("process.success")]
        );
    }

    #[test]
    fn queue_full_reports_a_warn_log() {
        let logger = Arc::new(RecordingLogger::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let observer = TelemetryQueueObserver::new(logger.clone(), telemetry.clone());

        observer.on_event(QueueEvent::QueueFull {
            job_id: "job_2".to_string(),
        });

        assert_eq!(
            *logger.events.lock().expect("logger lock"),
            vec![Box::from("queue.full")]
        );
    }
}
