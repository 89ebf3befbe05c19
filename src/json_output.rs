use serde_json::json;

use crate::cache::CacheStats;
use crate::locate::{RedirectTarget, StatOutcome};
use crate::metrics::MetricsSnapshot;
use crate::resolver::Resolution;

/// JSON output formatter for CLI commands
pub struct JsonOutput;

impl JsonOutput {
    pub fn candidates(lfn: &str, candidates: &[String]) -> String {
        json!({
            "lfn": lfn,
            "candidates": candidates,
        })
        .to_string()
    }

    pub fn resolution(lfn: &str, resolution: Option<&Resolution>) -> String {
        match resolution {
            Some(r) => json!({
                "lfn": lfn,
                "found": true,
                "pfn": r.pfn,
                "source": r.source,
            }),
            None => json!({
                "lfn": lfn,
                "found": false,
            }),
        }
        .to_string()
    }

    pub fn redirect(lfn: &str, target: &RedirectTarget) -> String {
        json!({
            "lfn": lfn,
            "redirect": target,
            "url": target.to_string(),
        })
        .to_string()
    }

    pub fn stat(lfn: &str, outcome: &StatOutcome) -> String {
        json!({
            "lfn": lfn,
            "stat": outcome,
        })
        .to_string()
    }

    pub fn summary(metrics: &MetricsSnapshot, cache: &CacheStats) -> String {
        json!({
            "metrics": metrics,
            "cache": cache,
            "cache_hit_rate_percent": metrics.cache_hit_rate() as u32,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })
        .to_string()
    }

    pub fn error(message: &str, code: i32) -> String {
        json!({
            "error": {
                "message": message,
                "code": code,
            }
        })
        .to_string()
    }
}
