use bevy::prelude::Resource;
use serde_json::Value;

/// The small externally-visible state unit propagated between participants.
/// Application-defined; this crate's demo publishes the graph rotation.
pub type SharedRecord = Value;

/// Numeric slack under which two records count as the same value, so tiny
/// per-frame wiggles do not flood the channel.
const SEND_TOLERANCE: f64 = 1e-4;

/// The channel a record travels over. `poll` drains pending remote updates,
/// newest last; `send` forwards a local one. Implementations are supplied by
/// the embedding host — this crate never opens sockets itself.
pub trait SharedTransport: Send + Sync {
    fn send(&mut self, record: &SharedRecord);
    fn poll(&mut self) -> Option<SharedRecord>;
}

/// Optional synchronization of one shared record across participants.
///
/// Without a transport attached every call succeeds trivially — local-only
/// mode is not an error. Remote updates coalesce to the latest value and
/// raise `changed` once per distinct update; the local consumer applies the
/// record and clears the flag.
#[derive(Resource, Default)]
pub struct SharedStateBridge {
    record: SharedRecord,
    changed: bool,
    last_sent: Option<SharedRecord>,
    transport: Option<Box<dyn SharedTransport>>,
}

impl SharedStateBridge {
    pub fn with_transport(transport: Box<dyn SharedTransport>) -> Self {
        SharedStateBridge {
            transport: Some(transport),
            ..Default::default()
        }
    }

    pub fn attach_transport(&mut self, transport: Box<dyn SharedTransport>) {
        self.transport = Some(transport);
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Update the local record and, when a transport is attached, forward it
    /// — debounced: values within tolerance of the last send are not
    /// re-propagated.
    pub fn set_shared_data(&mut self, record: SharedRecord) {
        self.record = record;
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Some(last) = &self.last_sent {
            if approx_eq(last, &self.record, SEND_TOLERANCE) {
                return;
            }
        }
        transport.send(&self.record);
        self.last_sent = Some(self.record.clone());
    }

    /// Current local record; seeds late-joining participants.
    pub fn get_shared_data(&self) -> &SharedRecord {
        &self.record
    }

    /// Drain pending remote updates, keeping only the newest. Rapid
    /// successive updates collapse to one observation of the latest value.
    pub fn pump(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let mut latest = None;
        while let Some(record) = transport.poll() {
            latest = Some(record);
        }
        let Some(record) = latest else {
            return;
        };
        if !approx_eq(&self.record, &record, SEND_TOLERANCE) {
            self.changed = true;
        }
        self.record = record;
    }

    /// True from a distinct remote update until the consumer clears it.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn clear_changed(&mut self) {
        self.changed = false;
    }
}

/// Structural equality with numeric tolerance, recursively over arrays and
/// objects.
pub fn approx_eq(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= tolerance,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| approx_eq(x, y, tolerance))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| approx_eq(x, y, tolerance)))
        }
        _ => a == b,
    }
}
