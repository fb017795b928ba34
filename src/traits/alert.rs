//! Best-effort alerting.

/// Receiver for operator alerts such as a late train.
///
/// Implementations must return quickly and must not fail the caller; a sink
/// that talks to the network should hand the message to a background task.
pub trait AlertSink: Send + Sync {
    /// Deliver an alert message.
    fn send_alert(&self, message: &str);
}
