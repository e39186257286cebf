use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub users: usize,
    pub codecs: Vec<String>,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub total_wall_ns: u128,
}

/// Metrics for one case. Values that cannot be computed are NaN, which
/// serde_json writes as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub name: String,

    pub ops_per_second: f64,
    pub nanos_per_op: f64,
    pub iterations_executed: u64,

    pub memory_delta_bytes: u64,
    pub bytes_per_op: f64,

    pub samples: usize,
    pub elapsed_ns: u128,
    pub calibration_iters: u64,
    pub batch_size: u64,
    pub rate_cv: f64,

    pub allocated_bytes: u64,
    pub alloc_bytes_per_op: f64,
    /// Highest rise of the live heap above the baseline during sampling.
    pub peak_delta_bytes: u64,
    pub memory_reliable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub results: Vec<RunResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_serializes_as_null() {
        let r = RunResult {
            name: "noop".to_string(),
            ops_per_second: f64::NAN,
            nanos_per_op: f64::NAN,
            iterations_executed: 0,
            memory_delta_bytes: 0,
            bytes_per_op: f64::NAN,
            samples: 0,
            elapsed_ns: 0,
            calibration_iters: 1,
            batch_size: 1,
            rate_cv: f64::NAN,
            allocated_bytes: 0,
            alloc_bytes_per_op: f64::NAN,
            peak_delta_bytes: 0,
            memory_reliable: false,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["name"], "noop");
        assert!(v["ops_per_second"].is_null());
        assert!(v["bytes_per_op"].is_null());
        assert_eq!(v["iterations_executed"], 0);
    }
}
