use std::hint::black_box;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::codecs::CodecError;
use crate::memory::{MemoryProbe, MemorySnapshot, TrackingProbe};
use crate::schema::RunResult;
use crate::{Error, Result};

/// Largest batch the calibration ramp will try.
const MAX_BATCH: u64 = 1 << 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub profile: Profile,
    /// A batch must run at least this long to count as a sample.
    pub min_sample_time: Duration,
    /// Total time budget per case, calibration included.
    pub max_time: Duration,
    pub min_samples: usize,
    pub max_samples: usize,
    /// Stop sampling once the coefficient of variation of per-sample rates
    /// drops to this value.
    pub cv_threshold: f64,
    /// Refuse to run a suite when the memory probe is unavailable.
    pub require_memory_probe: bool,
}

impl BenchConfig {
    pub fn new(profile: Profile) -> Self {
        match profile {
            Profile::Quick => Self {
                profile,
                min_sample_time: Duration::from_millis(10),
                max_time: Duration::from_secs(1),
                min_samples: 5,
                max_samples: 50,
                cv_threshold: 0.05,
                require_memory_probe: true,
            },
            Profile::Full => Self {
                profile,
                min_sample_time: Duration::from_millis(50),
                max_time: Duration::from_secs(5),
                min_samples: 10,
                max_samples: 200,
                cv_threshold: 0.02,
                require_memory_probe: true,
            },
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new(Profile::Quick)
    }
}

/// Raw timings from one calibrated measurement loop.
#[derive(Clone, Debug, Default)]
pub struct Measured {
    pub calibration_iters: u64,
    pub batch_size: u64,
    /// Measured iterations, calibration excluded.
    pub iters: u64,
    pub total_ns: u128,
    /// Per-sample rates in ops/sec.
    pub sample_rates: Vec<f64>,
    /// Sampling stopped on the CV threshold rather than a bound.
    pub stable: bool,
}

impl Measured {
    pub fn ops_per_second(&self) -> f64 {
        if self.iters == 0 || self.total_ns == 0 {
            return f64::NAN;
        }
        self.iters as f64 / (self.total_ns as f64 / 1e9)
    }

    pub fn rate_cv(&self) -> f64 {
        coefficient_of_variation(&self.sample_rates)
    }
}

/// `1e9 / ops_per_second`, or NaN when the rate is not a positive number.
pub fn nanos_per_op(ops_per_second: f64) -> f64 {
    if ops_per_second.is_finite() && ops_per_second > 0.0 {
        1e9 / ops_per_second
    } else {
        f64::NAN
    }
}

/// `bytes / iters`, or NaN for zero iterations.
pub fn bytes_per_op(bytes: u64, iters: u64) -> f64 {
    if iters == 0 {
        f64::NAN
    } else {
        bytes as f64 / iters as f64
    }
}

/// Sample standard deviation over mean. NaN with fewer than two samples.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return f64::NAN;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt() / mean.abs()
}

fn run_batch<T, E>(batch: u64, f: &mut impl FnMut() -> Result<T, E>) -> Result<Duration, E> {
    let start = Instant::now();
    for _ in 0..batch {
        black_box(f()?);
    }
    Ok(start.elapsed())
}

/// Outcome of the calibration ramp, consumed by [`sample`].
#[derive(Clone, Copy, Debug)]
pub struct Calibration {
    pub batch_size: u64,
    pub iters: u64,
    started: Instant,
}

/// Double the batch size until one batch lasts `min_sample_time`.
pub fn calibrate<T, E>(
    cfg: &BenchConfig,
    f: &mut impl FnMut() -> Result<T, E>,
) -> Result<Calibration, E> {
    let started = Instant::now();
    let mut batch = 1u64;
    let mut iters = 0u64;
    loop {
        let elapsed = run_batch(batch, f)?;
        iters += batch;
        if elapsed >= cfg.min_sample_time
            || started.elapsed() >= cfg.max_time
            || batch >= MAX_BATCH
        {
            break;
        }
        batch = batch.saturating_mul(2).min(MAX_BATCH);
    }
    Ok(Calibration {
        batch_size: batch,
        iters,
        started,
    })
}

/// Sample calibrated batches until the rate is stable or the budget, which
/// includes calibration, runs out.
pub fn sample<T, E>(
    cfg: &BenchConfig,
    cal: &Calibration,
    f: &mut impl FnMut() -> Result<T, E>,
) -> Result<Measured, E> {
    let batch = cal.batch_size;
    let mut m = Measured {
        calibration_iters: cal.iters,
        batch_size: batch,
        // Sized up front so the vector does not grow while memory is read.
        sample_rates: Vec::with_capacity(cfg.max_samples.min(1024)),
        ..Measured::default()
    };

    while m.sample_rates.len() < cfg.max_samples {
        if cal.started.elapsed() >= cfg.max_time && !m.sample_rates.is_empty() {
            break;
        }
        let elapsed = run_batch(batch, f)?;
        let ns = elapsed.as_nanos();
        m.iters += batch;
        m.total_ns += ns;
        if ns > 0 {
            m.sample_rates.push(batch as f64 / elapsed.as_secs_f64());
        } else {
            // Below timer resolution; treat as an unbounded-rate sample.
            m.sample_rates.push(f64::INFINITY);
        }

        if m.sample_rates.len() >= cfg.min_samples {
            let cv = m.rate_cv();
            if cv.is_finite() && cv <= cfg.cv_threshold {
                m.stable = true;
                break;
            }
        }
    }

    Ok(m)
}

/// [`calibrate`] followed by [`sample`].
pub fn measure_fn<T, E>(
    cfg: &BenchConfig,
    mut f: impl FnMut() -> Result<T, E>,
) -> Result<Measured, E> {
    let cal = calibrate(cfg, &mut f)?;
    sample(cfg, &cal, &mut f)
}

/// Drives single cases through the calibrated loop and collects heap readings
/// around them.
pub struct Runner<P = TrackingProbe> {
    config: BenchConfig,
    probe: P,
}

impl Runner<TrackingProbe> {
    pub fn new(config: BenchConfig) -> Self {
        Self::with_probe(config, TrackingProbe)
    }
}

impl<P: MemoryProbe> Runner<P> {
    pub fn with_probe(config: BenchConfig, probe: P) -> Self {
        Self { config, probe }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// `Error::ProbeUnavailable` when the config requires a live probe and
    /// this one is not.
    pub fn check_probe(&self) -> Result<()> {
        if self.config.require_memory_probe && !self.probe.is_available() {
            return Err(Error::ProbeUnavailable);
        }
        Ok(())
    }

    fn baseline(&self, available: bool) -> MemorySnapshot {
        if !available {
            return MemorySnapshot::default();
        }
        self.probe.settle();
        self.probe.reset_peak();
        self.probe.snapshot()
    }

    fn reading(&self, available: bool) -> MemorySnapshot {
        if !available {
            return MemorySnapshot::default();
        }
        self.probe.settle();
        self.probe.snapshot()
    }

    pub fn run_case<T>(
        &self,
        name: &str,
        mut operation: impl FnMut() -> Result<T, CodecError>,
    ) -> Result<RunResult> {
        let memory_reliable = self.probe.is_available();
        let case_err = |source| Error::Case {
            name: name.to_string(),
            source,
        };

        let cal = calibrate(&self.config, &mut operation).map_err(case_err)?;
        // The memory window covers the measured samples only.
        let before = self.baseline(memory_reliable);
        let m = sample(&self.config, &cal, &mut operation).map_err(case_err)?;
        let after = self.reading(memory_reliable);

        debug!(
            case = name,
            batch = cal.batch_size,
            calibration_iters = cal.iters,
            "calibrated batch size"
        );
        if m.stable {
            debug!(
                case = name,
                samples = m.sample_rates.len(),
                cv = m.rate_cv(),
                "rate stable"
            );
        }

        let memory_delta_bytes = after.live_delta(&before);
        let allocated_bytes = after.allocated_delta(&before);
        let peak_delta_bytes = after.peak_delta(&before);

        let ops_per_second = m.ops_per_second();
        let result = RunResult {
            name: name.to_string(),
            ops_per_second,
            nanos_per_op: nanos_per_op(ops_per_second),
            iterations_executed: m.iters,
            memory_delta_bytes,
            bytes_per_op: if memory_reliable {
                bytes_per_op(memory_delta_bytes, m.iters)
            } else {
                f64::NAN
            },
            samples: m.sample_rates.len(),
            elapsed_ns: m.total_ns,
            calibration_iters: m.calibration_iters,
            batch_size: m.batch_size,
            rate_cv: m.rate_cv(),
            allocated_bytes,
            alloc_bytes_per_op: if memory_reliable {
                bytes_per_op(allocated_bytes, m.iters)
            } else {
                f64::NAN
            },
            peak_delta_bytes,
            memory_reliable,
        };

        info!(
            case = name,
            ops_per_second = result.ops_per_second,
            iters = result.iterations_executed,
            samples = result.samples,
            "case finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySnapshot;
    use std::cell::Cell;

    fn test_config() -> BenchConfig {
        BenchConfig {
            min_sample_time: Duration::from_millis(1),
            max_time: Duration::from_millis(100),
            min_samples: 3,
            max_samples: 10,
            ..BenchConfig::default()
        }
    }

    /// Probe that replays a fixed sequence of readings.
    struct ScriptedProbe {
        readings: Vec<MemorySnapshot>,
        next: Cell<usize>,
    }

    impl MemoryProbe for ScriptedProbe {
        fn is_available(&self) -> bool {
            true
        }

        fn snapshot(&self) -> MemorySnapshot {
            let i = self.next.get();
            self.next.set(i + 1);
            self.readings[i.min(self.readings.len() - 1)]
        }
    }

    #[test]
    fn test_trivial_op_rate() {
        let m = measure_fn(&test_config(), || Ok::<_, CodecError>(42u64)).unwrap();
        let ops = m.ops_per_second();
        assert!(ops.is_finite() && ops > 0.0);
        assert!(m.iters > 0);
        assert_eq!(m.iters % m.batch_size, 0);

        let ns = nanos_per_op(ops);
        assert!((ns * ops - 1e9).abs() <= 1e9 * 1e-9);
    }

    #[test]
    fn test_sample_bounds_respected() {
        let cfg = test_config();
        let m = measure_fn(&cfg, || Ok::<_, CodecError>(())).unwrap();
        assert!(!m.sample_rates.is_empty());
        assert!(m.sample_rates.len() <= cfg.max_samples);
    }

    #[test]
    fn test_zero_max_samples_yields_sentinels() {
        let cfg = BenchConfig {
            max_samples: 0,
            ..test_config()
        };
        let runner = Runner::with_probe(
            cfg,
            ScriptedProbe {
                readings: vec![MemorySnapshot::default()],
                next: Cell::new(0),
            },
        );
        let r = runner.run_case("empty", || Ok(())).unwrap();
        assert_eq!(r.iterations_executed, 0);
        assert!(r.ops_per_second.is_nan());
        assert!(r.nanos_per_op.is_nan());
        assert!(r.bytes_per_op.is_nan());
    }

    #[test]
    fn test_memory_delta_clamped() {
        let before = MemorySnapshot {
            live_bytes: 10_000,
            allocated_bytes: 50_000,
            allocations: 10,
            peak_live_bytes: 10_000,
        };
        let after = MemorySnapshot {
            live_bytes: 2_000,
            allocated_bytes: 90_000,
            allocations: 20,
            peak_live_bytes: 26_000,
        };
        let runner = Runner::with_probe(
            test_config(),
            ScriptedProbe {
                readings: vec![before, after],
                next: Cell::new(0),
            },
        );
        let r = runner.run_case("shrinking", || Ok(())).unwrap();
        assert_eq!(r.memory_delta_bytes, 0);
        assert!(r.memory_reliable);
        assert!(r.iterations_executed > 0);
        assert_eq!(r.bytes_per_op, 0.0);
        assert_eq!(r.allocated_bytes, 40_000);
        assert!(r.alloc_bytes_per_op.is_finite());
        assert_eq!(r.peak_delta_bytes, 16_000);
    }

    /// Counts snapshot calls so a test can see when the baseline is taken.
    struct CountingProbe {
        snapshots: Cell<u32>,
        peak_resets: Cell<u32>,
    }

    impl MemoryProbe for CountingProbe {
        fn is_available(&self) -> bool {
            true
        }

        fn reset_peak(&self) {
            self.peak_resets.set(self.peak_resets.get() + 1);
        }

        fn snapshot(&self) -> MemorySnapshot {
            self.snapshots.set(self.snapshots.get() + 1);
            MemorySnapshot::default()
        }
    }

    #[test]
    fn test_baseline_taken_after_calibration() {
        let probe = CountingProbe {
            snapshots: Cell::new(0),
            peak_resets: Cell::new(0),
        };
        let runner = Runner::with_probe(test_config(), probe);
        let mut calls = 0u64;
        let mut snapshots_at = Vec::new();
        let r = runner
            .run_case("ordered", || {
                calls += 1;
                snapshots_at.push(runner.probe().snapshots.get());
                Ok(())
            })
            .unwrap();

        let calibration = r.calibration_iters as usize;
        assert!(snapshots_at[..calibration].iter().all(|&n| n == 0));
        assert!(snapshots_at[calibration..].iter().all(|&n| n == 1));
        assert_eq!(snapshots_at.len() as u64, calls);
        assert_eq!(calls, r.calibration_iters + r.iterations_executed);
        assert_eq!(runner.probe().snapshots.get(), 2);
        assert_eq!(runner.probe().peak_resets.get(), 1);
    }

    #[test]
    fn test_case_error_propagates_with_name() {
        let runner = Runner::with_probe(
            test_config(),
            ScriptedProbe {
                readings: vec![MemorySnapshot::default()],
                next: Cell::new(0),
            },
        );
        let mut calls = 0u32;
        let err = runner
            .run_case("flaky", || {
                calls += 1;
                if calls == 3 {
                    Err(CodecError::encode(std::io::Error::other("boom")))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        match err {
            Error::Case { name, source } => {
                assert_eq!(name, "flaky");
                assert!(source.to_string().contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls, 3, "failing case must not be retried");
    }

    #[test]
    fn test_unavailable_probe_flags_memory() {
        let runner = Runner::new(test_config());
        let r = runner.run_case("unprobed", || Ok(())).unwrap();
        assert!(!r.memory_reliable);
        assert_eq!(r.memory_delta_bytes, 0);
        assert!(r.bytes_per_op.is_nan());
        assert!(r.ops_per_second > 0.0);
    }

    #[test]
    fn test_memory_precondition_follows_config() {
        let runner = Runner::new(test_config());
        assert!(matches!(runner.check_probe(), Err(Error::ProbeUnavailable)));
        let lenient = Runner::new(BenchConfig {
            require_memory_probe: false,
            ..test_config()
        });
        assert!(lenient.check_probe().is_ok());
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert!(coefficient_of_variation(&[1.0]).is_nan());
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), 0.0);
        let cv = coefficient_of_variation(&[9.0, 10.0, 11.0]);
        assert!((cv - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_bytes_per_op_sentinel() {
        assert!(bytes_per_op(100, 0).is_nan());
        assert_eq!(bytes_per_op(100, 4), 25.0);
    }
}
