use deferd_core::{EventKind, Subscribe, TaskEvent};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, proto::MetricFamily};

/// Event counters backed by a private [`Registry`]. Cloning shares the underlying metrics.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    events: IntCounterVec,
    in_flight: IntGauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register the metrics into an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let events = IntCounterVec::new(
            Opts::new("deferd_task_events_total", "Task lifecycle events by kind"),
            &["event"],
        )?;
        let in_flight = IntGauge::new(
            "deferd_tasks_in_flight",
            "Tasks currently holding an admission slot",
        )?;
        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            registry,
            events,
            in_flight,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    pub fn event_count(&self, kind: EventKind) -> u64 {
        self.events.with_label_values(&[kind.as_str()]).get()
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.get()
    }
}

impl Subscribe for PrometheusMetrics {
    fn on_event(&self, event: &TaskEvent) {
        self.events.with_label_values(&[event.kind.as_str()]).inc();
        if event.kind == EventKind::Scheduled {
            self.in_flight.inc();
        } else if event.kind.is_release() {
            self.in_flight.dec();
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}
