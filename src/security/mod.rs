// Security event reporting
// Suspicious-activity reports raised by session tracking, delivered to a
// pluggable sink

pub mod sink;
pub mod types;

pub use sink::{MemorySecurityEventSink, SecurityEventSink, TracingSecurityEventSink};
pub use types::{SecurityEvent, SecuritySeverity};
