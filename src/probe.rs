//! Directory probing fallback.
//!
//! Datasets get renamed (suffixes appended to the directory name) and the
//! catalog layout changed over time: older registrations lack the
//! intermediate directory level that current ones have, e.g.
//!
//! ```text
//! current: /atlas/dq2/data11_7TeV/NTUP_TOP/f369_m812/data11_7TeV.00180309.NTUP_TOP.f369_m812_tid367204_00/<file>
//! old:     /atlas/dq2/data11_7TeV/NTUP_TOP/data11_7TeV.00180309.NTUP_TOP.f369_m812_tid367204_00_sub021131151/<file>
//! ```
//!
//! The probe lists the directory holding the dataset directory, and the
//! one above it, and keeps every child whose name starts with the dataset
//! directory name. Each listing is a full directory enumeration in the
//! catalog, so this only runs after all direct candidates failed.

use crate::catalog::CatalogClient;
use crate::rewrite::{join_segments, segments};

pub struct DirectoryProbe<'a> {
    catalog: &'a CatalogClient,
}

impl<'a> DirectoryProbe<'a> {
    pub fn new(catalog: &'a CatalogClient) -> Self {
        DirectoryProbe { catalog }
    }

    /// Secondary candidates for `lfn`, parent layout first, in listing order.
    /// `client` tags any catalog failure the listings run into.
    pub fn probe(&self, lfn: &str, client: &str) -> Vec<String> {
        let parts = segments(lfn);
        if parts.len() < 3 {
            return Vec::new();
        }

        let n = parts.len();
        let filename = parts[n - 1];
        let dirname = parts[n - 2];
        let parent = join_segments(&parts[..n - 2]);
        let grandparent = join_segments(&parts[..n - 3]);

        let mut candidates = self.matching_children(&parent, dirname, filename, client);
        // the namespace root is never listed
        if !grandparent.is_empty() {
            candidates.extend(self.matching_children(&grandparent, dirname, filename, client));
        }

        log::debug!("probe of {} produced {} candidates", lfn, candidates.len());
        candidates
    }

    fn matching_children(
        &self,
        dir: &str,
        dirname: &str,
        filename: &str,
        client: &str,
    ) -> Vec<String> {
        self.catalog
            .list_dir(dir, client)
            .into_iter()
            .filter(|child| child.starts_with(dirname))
            .map(|child| format!("{}/{}/{}", dir, child, filename))
            .collect()
    }
}
