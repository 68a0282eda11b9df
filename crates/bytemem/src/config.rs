// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide capability configuration, resolved once on first use.

use std::env;
use std::sync::LazyLock;

use tracing::{Level, event};

/// Name of the environment variable that disables memory mapping for the whole process.
///
/// When set to `1` or `true` (case-insensitive), file-backed factories read files into heap
/// memory instead of mapping them. The variable is read once, the first time any factory
/// needs to know whether mapping is available.
pub const DISABLE_MAPPING_ENV_VAR: &str = "BYTEMEM_DISABLE_MMAP";

static MAPPING_SUPPORTED: LazyLock<bool> = LazyLock::new(|| {
    let disabled = env::var(DISABLE_MAPPING_ENV_VAR).is_ok_and(|value| is_truthy(&value));
    let supported = cfg!(any(unix, windows)) && !disabled;

    event!(
        Level::DEBUG,
        message = "resolved memory mapping capability",
        supported,
        disabled_by_environment = disabled
    );

    supported
});

/// Whether memory mapping is used by the file-backed factories by default.
///
/// This is `false` on targets without a memory mapping facility and when
/// [`DISABLE_MAPPING_ENV_VAR`] is set. Individual calls may still override the
/// decision via [`FileOptions::memory_mapping()`][crate::FileOptions::memory_mapping].
#[must_use]
pub fn memory_mapping_supported() -> bool {
    *MAPPING_SUPPORTED
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy(" TRUE "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn capability_is_stable() {
        assert_eq!(memory_mapping_supported(), memory_mapping_supported());
    }
}
