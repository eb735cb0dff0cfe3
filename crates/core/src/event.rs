use chrono::{DateTime, Utc};

/// A domain event emitted by an aggregate's `handle`.
///
/// Events are immutable facts. The infrastructure layer logs them and
/// folds them into the stored aggregate state.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "purchasing.order.placed").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
