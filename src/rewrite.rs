//! Candidate path generation.
//!
//! Clients reach the catalog with logical names written under several
//! naming conventions. The rewrite table below maps one logical name to
//! every spelling the catalog is known to register it under. The table is
//! closed: new conventions are added as new entries in [`rewrite`], in
//! precedence order.

/// Prefix under which the catalog registers grid namespaces
pub const GRID_PREFIX: &str = "/grid";
/// Top-level namespace subject to the dataset rewrite
pub const EXPERIMENT_NAMESPACE: &str = "atlas";
/// Dataset sub-namespace inserted by the dataset rewrite
pub const DATASET_NAMESPACE: &str = "dq2";

/// Split a path on `/`, dropping empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Join segments into an absolute path (`["a", "b"]` → `"/a/b"`).
pub fn join_segments(segments: &[&str]) -> String {
    segments.iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(segment);
        path
    })
}

/// Produce the ordered candidate set for `lfn`.
///
/// The unmodified name always comes first.
pub fn rewrite(lfn: &str) -> Vec<String> {
    let mut candidates = vec![lfn.to_string()];

    // /atlas/x -> /grid/atlas/x
    if !lfn.starts_with(GRID_PREFIX) {
        candidates.push(format!("{}{}", GRID_PREFIX, lfn));
    }

    // /atlas/<not dq2>/x -> /grid/atlas/dq2/<not dq2>/x
    let parts = segments(lfn);
    if parts.len() > 2 && parts[0] == EXPERIMENT_NAMESPACE && parts[1] != DATASET_NAMESPACE {
        candidates.push(format!(
            "{}/{}/{}{}",
            GRID_PREFIX,
            EXPERIMENT_NAMESPACE,
            DATASET_NAMESPACE,
            join_segments(&parts[1..])
        ));
    }

    candidates
}
