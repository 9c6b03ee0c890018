// Library exports

pub mod config;
pub mod security;
pub mod session;

pub use security::{
    MemorySecurityEventSink, SecurityEvent, SecurityEventSink, SecuritySeverity,
    TracingSecurityEventSink,
};
pub use session::{
    ExpirySweeper, SessionConfig, SessionManager, SessionRecord, SessionStats, SessionStore,
};
