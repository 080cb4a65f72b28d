//! Per-invocation telemetry collection.
//!
//! A [`MetricsCollector`] lives for exactly one invocation. It records a start
//! snapshot, accumulates named attributes, computes end-minus-start deltas once,
//! and finishes into an ordered [`Attributes`] map. Finishing never fails, so a
//! stage can always report, whatever happened before.

use serde_json::Value;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::types::Attributes;

/// Language label reported with every invocation.
const LANG: &str = "rust";

static CONTAINER_ID: OnceLock<String> = OnceLock::new();

/// Identifier of the current process, stable across invocations it serves.
pub fn container_id() -> &'static str {
    CONTAINER_ID.get_or_init(|| uuid::Uuid::new_v4().to_string())
}

/// Process CPU time in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTicks {
    user: u64,
    kernel: u64,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    instant: Instant,
    epoch_ms: u64,
    cpu: Option<CpuTicks>,
}

impl Snapshot {
    fn take() -> Self {
        Self {
            instant: Instant::now(),
            epoch_ms: epoch_millis(),
            cpu: read_cpu_ticks(),
        }
    }
}

/// Accumulates telemetry for one invocation.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    attributes: Attributes,
    start: Option<Snapshot>,
    deltas_computed: bool,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start-of-invocation snapshot and identity attributes.
    pub fn snapshot_start(&mut self) {
        let snapshot = Snapshot::take();
        self.add_attribute("version", crate::VERSION);
        self.add_attribute("lang", LANG);
        self.add_attribute("container_id", container_id());
        self.add_attribute("start_time", snapshot.epoch_ms);
        self.start = Some(snapshot);
    }

    /// Set an attribute. A repeated name overwrites the value in place.
    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Look up a previously set attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Take the end snapshot and record deltas against the start snapshot.
    ///
    /// Only the first call after [`snapshot_start`](Self::snapshot_start) has
    /// any effect.
    pub fn snapshot_end_and_compute_deltas(&mut self) {
        if self.deltas_computed {
            return;
        }
        let Some(start) = self.start else {
            tracing::debug!("No start snapshot recorded; skipping delta computation");
            return;
        };

        let end = Snapshot::take();
        let runtime_ms = u64::try_from(end.instant.duration_since(start.instant).as_millis())
            .unwrap_or(u64::MAX);
        self.add_attribute("end_time", end.epoch_ms);
        self.add_attribute("runtime", runtime_ms);

        if let (Some(before), Some(after)) = (start.cpu, end.cpu) {
            self.add_attribute("cpu_user_delta", after.user.saturating_sub(before.user));
            self.add_attribute("cpu_kernel_delta", after.kernel.saturating_sub(before.kernel));
        }
        self.deltas_computed = true;
    }

    /// Whether deltas have been computed.
    pub fn has_deltas(&self) -> bool {
        self.deltas_computed
    }

    /// Finalize into the ordered attribute map.
    ///
    /// Identity attributes are filled in when the start snapshot was never
    /// taken, so the map is never empty.
    pub fn finish(mut self) -> Attributes {
        if !self.attributes.contains_key("version") {
            self.add_attribute("version", crate::VERSION);
        }
        if !self.attributes.contains_key("lang") {
            self.add_attribute("lang", LANG);
        }
        self.attributes
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Read utime/stime for this process from `/proc/self/stat`.
#[cfg(target_os = "linux")]
fn read_cpu_ticks() -> Option<CpuTicks> {
    let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
    // comm (field 2) may contain spaces; fields after it start at `state`.
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace().skip(11);
    let user = fields.next()?.parse().ok()?;
    let kernel = fields.next()?.parse().ok()?;
    Some(CpuTicks { user, kernel })
}

#[cfg(not(target_os = "linux"))]
fn read_cpu_ticks() -> Option<CpuTicks> {
    None
}
