//! Local host identity

use sysinfo::System;

/// Hostname of the machine, if the OS reports a non-empty one.
pub fn hostname() -> Option<String> {
    System::host_name().map(|name| name.trim().to_string()).filter(|name| !name.is_empty())
}
