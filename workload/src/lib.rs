//! MapReduce applications runnable by a worker.
//!
//! A job names its map and reduce code; workers resolve that name here.

use common::Workload;

pub mod log_levels;
pub mod vertex_degree;
pub mod wc;

/// Every workload name [`try_named`] knows.
pub const NAMES: [&str; 3] = ["wc", "vertex-degree", "log-levels"];

/// Looks up a workload by name.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "vertex-degree" => Some(Workload {
            map_fn: vertex_degree::map,
            reduce_fn: vertex_degree::reduce,
        }),
        "log-levels" => Some(Workload {
            map_fn: log_levels::map,
            reduce_fn: log_levels::reduce,
        }),
        _ => None,
    }
}

/// Adds up counts emitted as JSON integers.
pub(crate) fn sum_counts(values: impl Iterator<Item = serde_json::Value>) -> anyhow::Result<u64> {
    let mut total = 0u64;
    for value in values {
        let n = value
            .as_u64()
            .ok_or_else(|| anyhow::anyhow!("expected a count, got {value}"))?;
        total = total
            .checked_add(n)
            .ok_or_else(|| anyhow::anyhow!("count overflow"))?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_listed_name_resolves() {
        for name in NAMES {
            assert!(try_named(name).is_some(), "{name}");
        }
        assert!(try_named("grep").is_none());
    }

    #[test]
    fn sum_counts_rejects_non_counts() {
        assert_eq!(sum_counts([json!(1), json!(2)].into_iter()).unwrap(), 3);
        assert!(sum_counts([json!(1), json!("x")].into_iter()).is_err());
        assert!(sum_counts([json!(u64::MAX), json!(1)].into_iter()).is_err());
    }
}
