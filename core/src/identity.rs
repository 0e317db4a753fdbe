//! Identifier casing helpers.
//!
//! Older clients wrote rows keyed by whatever casing the auth subsystem
//! returned at the time, so one logical user may own rows under several
//! spellings of the same id. All new writes use the lowercase
//! [`canonical_id`]; reads and deletes go through [`candidate_ids`] until the
//! stored data has been backfilled.

/// The single key used for new writes and storage paths.
pub fn canonical_id(id: &str) -> String {
    id.to_lowercase()
}

/// Spellings under which `id` may have been stored: original, lowercase,
/// uppercase, in that order and without duplicates.
pub fn candidate_ids(id: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(3);
    for variant in [id.to_string(), id.to_lowercase(), id.to_uppercase()] {
        if !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

/// Whether two ids name the same principal, ignoring case.
pub fn same_identity(a: &str, b: &str) -> bool {
    canonical_id(a) == canonical_id(b)
}

/// Storage folder that holds `id`'s objects.
pub fn storage_prefix(id: &str) -> String {
    canonical_id(id)
}
