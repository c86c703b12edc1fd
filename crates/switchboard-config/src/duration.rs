use std::time::Duration;

/// Parse a human-readable duration string (`"30s"`, `"5m"`, `"1h"`) the
/// same way the rest of this codebase's config layers do, surfacing a
/// readable error instead of panicking on a malformed config value.
///
/// # Errors
///
/// Returns an error if `value` is not a duration `duration_str` understands.
pub fn parse(field: &str, value: &str) -> anyhow::Result<Duration> {
    duration_str::parse(value).map_err(|e| anyhow::anyhow!("invalid duration for `{field}`: '{value}': {e}"))
}
