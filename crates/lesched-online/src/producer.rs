//! Replays a prepared series into the problem queue at a controlled rate.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lesched_solver::LinearEquationSeries;
use tracing::{debug, info};

use crate::queue::ProblemQueue;

/// Producer thread handle. Instances are released back-to-front; each
/// arrival is scheduled `score / load_factor` seconds after the previous
/// one on a cumulative timeline, so sleep jitter does not drift the rate.
pub struct SeriesProducer {
    handle: Option<thread::JoinHandle<()>>,
}

impl SeriesProducer {
    pub fn spawn(
        series: LinearEquationSeries,
        load_factor: f64,
        queue: Arc<ProblemQueue>,
    ) -> Self {
        debug_assert!(load_factor > 0.0, "load factor must be positive");
        let handle = thread::Builder::new()
            .name("lesched-producer".to_string())
            .spawn(move || produce(series, load_factor, &queue))
            .expect("failed to spawn producer thread");
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the series to be fully replayed.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("producer thread panicked");
        }
    }
}

fn produce(mut series: LinearEquationSeries, load_factor: f64, queue: &ProblemQueue) {
    let started = Instant::now();
    let mut scheduled = 0.0;

    while let Some(le) = series.instances.pop() {
        // Creating the next problem "takes" score / load_factor seconds.
        scheduled += le.score / load_factor;
        let wait = scheduled - started.elapsed().as_secs_f64();
        if wait > 0.0 {
            thread::sleep(Duration::from_secs_f64(wait));
        }

        debug!(n = le.n, score = le.score, "problem arrived");
        queue.push(le);
    }

    info!(
        elapsed = started.elapsed().as_secs_f64(),
        paced = scheduled,
        "producer drained series"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesched_solver::LinearEquation;

    fn series_with_scores(scores: &[f64]) -> LinearEquationSeries {
        LinearEquationSeries {
            instances: scores
                .iter()
                .map(|&score| LinearEquation::new(1, vec![1.0], vec![1.0], score))
                .collect(),
        }
    }

    #[test]
    fn replays_everything_back_to_front() {
        let queue = Arc::new(ProblemQueue::new());
        let series = series_with_scores(&[0.0, 0.0, 0.0]);
        SeriesProducer::spawn(series, f64::MAX, Arc::clone(&queue)).join();
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn pacing_respects_the_load_factor() {
        let queue = Arc::new(ProblemQueue::new());
        let series = series_with_scores(&[0.04, 0.04, 0.04]);

        let started = Instant::now();
        SeriesProducer::spawn(series, 1.0, Arc::clone(&queue)).join();
        let elapsed = started.elapsed().as_secs_f64();

        // Cumulative schedule: 3 * 0.04s / 1.0 at minimum.
        assert!(elapsed >= 0.12, "drained too fast: {elapsed}s");
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn overload_factor_accelerates_arrivals() {
        let queue = Arc::new(ProblemQueue::new());
        let series = series_with_scores(&[0.1, 0.1]);

        let started = Instant::now();
        SeriesProducer::spawn(series, 100.0, Arc::clone(&queue)).join();
        let elapsed = started.elapsed().as_secs_f64();

        assert!(elapsed < 0.1, "overloaded drain too slow: {elapsed}s");
    }
}
