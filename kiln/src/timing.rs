//! Helps to understand where the time of a build goes.
//!
//! Fonts build on many threads at once so timings are kept per thread, then
//! summarized per stage once everything is done.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Write,
    thread::ThreadId,
    time::{Duration, Instant},
};

/// Identifies one stage of one font.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageId {
    pub font: String,
    pub stage: &'static str,
}

impl StageId {
    pub fn new(font: impl Into<String>, stage: &'static str) -> StageId {
        StageId {
            font: font.into(),
            stage,
        }
    }
}

/// Tracks time for stages that run on many threads.
///
/// Not threadsafe itself; the pipeline keeps it behind a lock.
#[derive(Debug)]
pub struct JobTimer {
    /// The beginning of time
    t0: Instant,
    job_times: HashMap<ThreadId, Vec<JobTimeState>>,
}

impl Default for JobTimer {
    fn default() -> Self {
        Self {
            t0: Instant::now(),
            job_times: Default::default(),
        }
    }
}

impl JobTimer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Start timing a stage that is ready to run.
    pub fn create_timer(&self, id: StageId) -> JobTime {
        let now = Instant::now();
        JobTime::Ready(JobTimeState {
            id,
            thread_id: std::thread::current().id(),
            run: now,
            complete: now,
        })
    }

    pub fn add(&mut self, timing: JobTime) {
        let state = match timing {
            JobTime::Done(state) => state,
            other => {
                log::warn!("trying to add unfinished timing '{other:?}'");
                return;
            }
        };
        self.job_times
            .entry(state.thread_id)
            .or_default()
            .push(state);
    }

    pub fn len(&self) -> usize {
        self.job_times.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total time and count per stage, slowest first.
    pub fn per_stage(&self) -> Vec<(&'static str, Duration, usize)> {
        let mut totals: BTreeMap<&'static str, (Duration, usize)> = BTreeMap::new();
        for state in self.job_times.values().flatten() {
            let entry = totals.entry(state.id.stage).or_default();
            entry.0 += state.complete - state.run;
            entry.1 += 1;
        }
        let mut totals: Vec<_> = totals
            .into_iter()
            .map(|(stage, (total, count))| (stage, total, count))
            .collect();
        totals.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        totals
    }

    /// A table of stage timings, for humans.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let wall = self
            .job_times
            .values()
            .flatten()
            .map(|t| t.complete - self.t0)
            .max()
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{} stages on {} threads in {:.3}s",
            self.len(),
            self.job_times.len(),
            wall.as_secs_f64()
        );
        let _ = writeln!(out, "{:<16} {:>6} {:>10}", "stage", "count", "total (s)");
        for (stage, total, count) in self.per_stage() {
            let _ = writeln!(out, "{stage:<16} {count:>6} {:>10.3}", total.as_secs_f64());
        }
        out
    }
}

/// Inner state for timing stages.
#[derive(Debug, Clone)]
pub struct JobTimeState {
    id: StageId,
    thread_id: ThreadId,
    run: Instant,
    complete: Instant,
}

/// A state machine tracking timer progress.
#[derive(Debug, Clone)]
pub enum JobTime {
    /// The stage is ready to run.
    Ready(JobTimeState),
    /// The stage is running.
    Running(JobTimeState),
    /// The stage has completed.
    Done(JobTimeState),
}

impl JobTime {
    /// Mark that the stage is running.
    ///
    /// This records the current time and the current thread Id.
    pub fn run(self) -> Self {
        match self {
            JobTime::Ready(mut state) => {
                state.run = Instant::now();
                state.thread_id = std::thread::current().id();
                JobTime::Running(state)
            }
            other => {
                log::warn!("attempting to rerun timer: {other:?}");
                other
            }
        }
    }

    /// Finish the timer. Expects the timer to be running.
    pub fn complete(self) -> Self {
        match self {
            JobTime::Running(mut s) => {
                s.complete = Instant::now();
                JobTime::Done(s)
            }
            other => {
                log::warn!("attempting to complete a timer that isn't running: {other:?}");
                other
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{JobTimer, StageId};

    #[test]
    fn only_finished_timers_count() {
        let mut timer = JobTimer::new();
        let ready = timer.create_timer(StageId::new("Test-Regular", "normalize"));
        timer.add(ready);
        assert!(timer.is_empty());

        let done = timer
            .create_timer(StageId::new("Test-Regular", "normalize"))
            .run()
            .complete();
        timer.add(done);
        assert_eq!(1, timer.len());
    }

    #[test]
    fn complete_needs_run() {
        let mut timer = JobTimer::new();
        let skipped = timer.create_timer(StageId::new("Test-Regular", "layout")).complete();
        timer.add(skipped);
        assert!(timer.is_empty());
    }

    #[test]
    fn totals_per_stage() {
        let mut timer = JobTimer::new();
        for font in ["Test-Regular", "Test-Bold"] {
            for stage in ["normalize", "layout"] {
                let t = timer.create_timer(StageId::new(font, stage)).run().complete();
                timer.add(t);
            }
        }
        let mut stages: Vec<_> = timer
            .per_stage()
            .into_iter()
            .map(|(stage, _, count)| (stage, count))
            .collect();
        stages.sort();
        assert_eq!(vec![("layout", 2), ("normalize", 2)], stages);
        let report = timer.report();
        assert!(report.starts_with("4 stages on 1 threads"), "{report}");
    }
}
