//! Ordered problem series and its packed binary file format.
//!
//! Layout, little-endian and tightly packed: `count: u64`, then per
//! instance `n: u64`, `score: f64`, `n·n` doubles of `A` (row-major) and
//! `n` doubles of `b`.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;
use tracing::info;

use crate::equation::{generate_diagonally_dominant, read_u64, write_u64, LinearEquation};
use crate::lu;

/// A finite problem sequence. The producer consumes it back-to-front.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearEquationSeries {
    pub instances: Vec<LinearEquation>,
}

impl LinearEquationSeries {
    /// Generate instances with dimensions drawn uniformly from
    /// `[min_n, max_n]` until their combined score reaches
    /// `min_total_score`. Each score is the measured wall-clock of the
    /// serial LU solve on this machine, which makes the series a pacing
    /// reference for the producer.
    pub fn generate(min_n: usize, max_n: usize, min_total_score: f64) -> Self {
        let mut rng = rand::thread_rng();
        let mut series = Self::default();
        let mut total_score = 0.0;

        while total_score < min_total_score {
            let n = rng.gen_range(min_n..=max_n);
            let mut instance = generate_diagonally_dominant(n, &mut rng);

            let started = Instant::now();
            lu::solve(instance.clone()).expect("diagonally dominant system is non-singular");
            let score = started.elapsed().as_secs_f64();

            instance.score = score;
            total_score += score;
            series.instances.push(instance);
        }

        info!(
            instances = series.instances.len(),
            total_score, "generated problem series"
        );
        series
    }

    pub fn total_score(&self) -> f64 {
        self.instances.iter().map(|instance| instance.score).sum()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn save(&self, path: &std::path::Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_u64(&mut writer, self.instances.len() as u64)?;
        for instance in &self.instances {
            instance.write_to(&mut writer)?;
        }
        writer.flush()
    }

    pub fn load(path: &std::path::Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let count = read_u64(&mut reader)? as usize;
        let mut instances = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            instances.push(LinearEquation::read_from(&mut reader)?);
        }
        Ok(Self { instances })
    }
}

/// Cache file name shared by runs with identical generation parameters.
pub fn cache_path(min_n: usize, max_n: usize, min_total_score: f64) -> PathBuf {
    PathBuf::from(format!("series_{min_n}_{max_n}_{min_total_score}.raw"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn series_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("series.raw");

        let mut rng = rand::thread_rng();
        let mut series = LinearEquationSeries::default();
        for n in [3usize, 8, 5] {
            let mut instance = generate_diagonally_dominant(n, &mut rng);
            instance.score = n as f64 * 0.25;
            series.instances.push(instance);
        }

        series.save(&path).unwrap();
        let loaded = LinearEquationSeries::load(&path).unwrap();

        assert_eq!(loaded.len(), series.len());
        for (read, written) in loaded.instances.iter().zip(&series.instances) {
            assert_eq!(read.n, written.n);
            assert_eq!(read.score, written.score);
            assert_eq!(read.a, written.a);
            assert_eq!(read.b, written.b);
        }
    }

    #[test]
    fn empty_series_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.raw");
        LinearEquationSeries::default().save(&path).unwrap();
        assert!(LinearEquationSeries::load(&path).unwrap().is_empty());
    }

    #[test]
    fn cache_path_encodes_parameters() {
        assert_eq!(
            cache_path(8, 512, 30.0),
            PathBuf::from("series_8_512_30.raw")
        );
        assert_eq!(
            cache_path(64, 128, 2.5),
            PathBuf::from("series_64_128_2.5.raw")
        );
    }

    #[test]
    fn generate_reaches_minimum_total_score() {
        let series = LinearEquationSeries::generate(4, 8, 0.000_001);
        assert!(!series.is_empty());
        assert!(series.total_score() >= 0.000_001);
        for instance in &series.instances {
            assert!(instance.n >= 4 && instance.n <= 8);
            assert!(instance.score > 0.0);
        }
    }
}
