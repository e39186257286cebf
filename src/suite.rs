//! Sequential suite driver.
//!
//! Cases run strictly one after another: a case starts only once the previous
//! case's [`Runner::run_case`] call, trailing heap reading included, has
//! returned. The first failure ends the suite.

use std::collections::HashSet;
use std::hint::black_box;
use std::io::Write;
use std::time::Instant;

use tracing::info;

use crate::codecs::CodecError;
use crate::harness::Runner;
use crate::memory::MemoryProbe;
use crate::schema::RunResult;
use crate::{Error, Result};

type Operation<'a> = Box<dyn FnMut() -> Result<(), CodecError> + 'a>;

/// A named operation under measurement.
pub struct BenchCase<'a> {
    name: String,
    operation: Operation<'a>,
}

impl<'a> BenchCase<'a> {
    /// Wrap an operation; its value is passed through `black_box` and dropped.
    pub fn new<T>(
        name: impl Into<String>,
        mut operation: impl FnMut() -> Result<T, CodecError> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            operation: Box::new(move || {
                black_box(operation()?);
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub results: Vec<RunResult>,
    pub total_wall_ns: u128,
}

#[derive(Default)]
pub struct Suite<'a> {
    cases: Vec<BenchCase<'a>>,
    names: HashSet<String>,
}

impl<'a> Suite<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, case: BenchCase<'a>) -> Result<()> {
        if !self.names.insert(case.name.clone()) {
            return Err(Error::DuplicateCase(case.name));
        }
        self.cases.push(case);
        Ok(())
    }

    pub fn extend(&mut self, cases: impl IntoIterator<Item = BenchCase<'a>>) -> Result<()> {
        for case in cases {
            self.push(case)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cases.iter().map(|c| c.name())
    }

    /// Run every case in insertion order, writing progress and result blocks
    /// to `progress`.
    pub fn run<P: MemoryProbe>(
        mut self,
        runner: &Runner<P>,
        progress: &mut dyn Write,
    ) -> Result<SuiteReport> {
        runner.check_probe()?;

        let start = Instant::now();
        let mut results = Vec::with_capacity(self.cases.len());
        for case in &mut self.cases {
            writeln!(progress, "\n--- Running: {} ---", case.name)?;
            let result = runner.run_case(&case.name, &mut case.operation)?;
            write_result(progress, &result)?;
            results.push(result);
        }
        let total_wall_ns = start.elapsed().as_nanos();
        info!(
            cases = results.len(),
            total_ms = total_wall_ns as f64 / 1e6,
            "suite finished"
        );

        Ok(SuiteReport {
            results,
            total_wall_ns,
        })
    }
}

fn write_result(out: &mut dyn Write, r: &RunResult) -> std::io::Result<()> {
    writeln!(out, "RESULT: {}", r.name)?;
    writeln!(out, "  ops/sec: {:.2}", r.ops_per_second)?;
    if r.nanos_per_op.is_finite() {
        writeln!(out, "  ns/op: {:.0}", r.nanos_per_op)?;
    }
    writeln!(out, "  executed: {}", r.iterations_executed)?;
    if r.memory_reliable {
        writeln!(
            out,
            "  mem delta: {} bytes ({:.3} MB)",
            r.memory_delta_bytes,
            r.memory_delta_bytes as f64 / 1_048_576.0
        )?;
        writeln!(
            out,
            "  peak delta: {} bytes ({:.3} MB)",
            r.peak_delta_bytes,
            r.peak_delta_bytes as f64 / 1_048_576.0
        )?;
        writeln!(out, "  alloc/op: {:.0} bytes", r.alloc_bytes_per_op)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::BenchConfig;
    use crate::memory::MemorySnapshot;
    use std::time::Duration;

    struct FixedProbe;

    impl MemoryProbe for FixedProbe {
        fn is_available(&self) -> bool {
            true
        }

        fn snapshot(&self) -> MemorySnapshot {
            MemorySnapshot::default()
        }
    }

    fn quick() -> BenchConfig {
        BenchConfig {
            min_sample_time: Duration::from_millis(1),
            max_time: Duration::from_millis(50),
            min_samples: 3,
            max_samples: 8,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_order_preserved() {
        let mut suite = Suite::new();
        for name in ["A", "B", "C"] {
            suite.push(BenchCase::new(name, || Ok(1u8))).unwrap();
        }
        let runner = Runner::with_probe(quick(), FixedProbe);
        let mut out = Vec::new();
        let report = suite.run(&runner, &mut out).unwrap();

        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);

        let text = String::from_utf8(out).unwrap();
        let a = text.find("RESULT: A").unwrap();
        let b = text.find("RESULT: B").unwrap();
        let c = text.find("RESULT: C").unwrap();
        assert!(a < b && b < c);
        assert_eq!(text.matches("  peak delta: 0 bytes").count(), 3);
        assert!(report.total_wall_ns > 0);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut suite = Suite::new();
        suite.push(BenchCase::new("same", || Ok(()))).unwrap();
        let err = suite.push(BenchCase::new("same", || Ok(()))).unwrap_err();
        assert!(matches!(err, Error::DuplicateCase(ref n) if n == "same"));
        assert_eq!(suite.len(), 1);
    }

    #[test]
    fn test_probe_unavailable_refuses_to_start() {
        let mut ran = false;
        let mut suite = Suite::new();
        suite
            .push(BenchCase::new("never", || {
                ran = true;
                Ok(())
            }))
            .unwrap();
        // Unit tests run without the tracking allocator installed.
        let runner = Runner::new(quick());
        let mut out = Vec::new();
        let err = suite.run(&runner, &mut out).unwrap_err();
        assert!(matches!(err, Error::ProbeUnavailable));
        assert!(out.is_empty());
        assert!(!ran);
    }

    #[test]
    fn test_unreliable_memory_allowed_when_not_required() {
        let mut suite = Suite::new();
        suite.push(BenchCase::new("noop", || Ok(()))).unwrap();
        let cfg = BenchConfig {
            require_memory_probe: false,
            ..quick()
        };
        let report = suite.run(&Runner::new(cfg), &mut Vec::new()).unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(!report.results[0].memory_reliable);
    }

    #[test]
    fn test_failure_aborts_suite() {
        let mut third_ran = false;
        let mut suite = Suite::new();
        suite.push(BenchCase::new("ok", || Ok(()))).unwrap();
        suite
            .push(BenchCase::new("broken", || {
                Err::<(), _>(CodecError::decode(std::io::Error::other("bad input")))
            }))
            .unwrap();
        suite
            .push(BenchCase::new("after", || {
                third_ran = true;
                Ok(())
            }))
            .unwrap();

        let runner = Runner::with_probe(quick(), FixedProbe);
        let err = suite.run(&runner, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Case { ref name, .. } if name == "broken"));
        assert!(!third_ran);
    }
}
