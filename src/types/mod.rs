// ABOUTME: Validated domain types.
// ABOUTME: Host specifications resolved from user-supplied strings.

mod host_spec;

pub use host_spec::{DEFAULT_SSH_PORT, HostSpec, HostSpecError};
