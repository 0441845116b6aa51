/// Whole chains arrive in one request body.
pub(crate) const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
pub(crate) const RELAY_TIMEOUT_SECS: u64 = 10;
