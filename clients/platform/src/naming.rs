//! Random names for test resources.

use uuid::Uuid;

/// `{prefix}-{8 hex chars}`, unique per call. Keeps concurrently running
/// suites from colliding on user-visible names.
pub fn rand_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..8])
}
