//! Replica selection.

use crate::catalog::ReplicaRecord;
use crate::config::FilterConfig;

/// Picks the first acceptable replica out of a catalog reply.
///
/// Rules, applied per replica in catalog order:
/// - empty storage names are skipped
/// - any `forbidden` substring rejects the replica
/// - with a non-empty `required` list, at least one entry must occur
/// - with a root configured, the root must occur and the accepted name
///   starts at its first occurrence
///
/// Matching is case-sensitive substring containment.
#[derive(Debug, Clone)]
pub struct ReplicaFilter {
    filter: FilterConfig,
    root: String,
}

impl ReplicaFilter {
    pub fn new(filter: FilterConfig, root: impl Into<String>) -> Self {
        ReplicaFilter {
            filter,
            root: root.into(),
        }
    }

    pub fn accept(&self, replicas: &[ReplicaRecord], client: &str) -> Option<String> {
        replicas.iter().find_map(|replica| self.check(&replica.sfn, client))
    }

    fn check(&self, sfn: &str, client: &str) -> Option<String> {
        if sfn.is_empty() {
            return None;
        }
        log::trace!("{} testing pfn={}", client, sfn);

        if self.filter.forbidden.iter().any(|f| sfn.contains(f.as_str())) {
            return None;
        }

        let matched = if self.filter.required.is_empty() {
            None
        } else {
            Some(self.filter.required.iter().find(|m| sfn.contains(m.as_str()))?)
        };

        let pfn = if self.root.is_empty() {
            sfn
        } else {
            &sfn[sfn.find(self.root.as_str())?..]
        };

        log::debug!(
            "{} accepted pfn={} using matching={}",
            client,
            pfn,
            matched.map(String::as_str).unwrap_or("*")
        );
        Some(pfn.to_string())
    }
}
