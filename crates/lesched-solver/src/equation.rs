//! A single `A x = b` problem instance.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::Rng;

/// One linear system: row-major `n × n` matrix, right-hand side and the
/// reference serial solve time ("score") used for scheduling pacing.
///
/// Ownership moves producer → problem queue → dispatcher → exactly one
/// task; the solver consumes the buffers in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEquation {
    pub n: usize,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub score: f64,
}

impl LinearEquation {
    pub fn zeroed(n: usize) -> Self {
        Self {
            n,
            a: vec![0.0; n * n],
            b: vec![0.0; n],
            score: 0.0,
        }
    }

    pub fn new(n: usize, a: Vec<f64>, b: Vec<f64>, score: f64) -> Self {
        debug_assert_eq!(a.len(), n * n);
        debug_assert_eq!(b.len(), n);
        Self { n, a, b, score }
    }

    /// Infinity norm of the residual `A x − b`, evaluated against this
    /// (unclobbered) instance.
    pub fn max_residual(&self, x: &[f64]) -> f64 {
        debug_assert_eq!(x.len(), self.n);
        let n = self.n;
        let mut max = 0.0f64;
        for row in 0..n {
            let mut sum = 0.0;
            for col in 0..n {
                sum += self.a[row * n + col] * x[col];
            }
            max = max.max((sum - self.b[row]).abs());
        }
        max
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u64(writer, self.n as u64)?;
        writer.write_all(&self.score.to_le_bytes())?;
        write_f64_slice(writer, &self.a)?;
        write_f64_slice(writer, &self.b)
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let n = read_u64(reader)? as usize;
        let score = f64::from_le_bytes(read_bytes(reader)?);
        let a = read_f64_vec(reader, n * n)?;
        let b = read_f64_vec(reader, n)?;
        Ok(Self { n, a, b, score })
    }

    /// Single-instance file: same layout as a series entry, without the
    /// leading count.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

/// Generate a strictly diagonally dominant system, so factorization can
/// never hit a singular pivot.
pub fn generate_diagonally_dominant(n: usize, rng: &mut impl Rng) -> LinearEquation {
    let mut le = LinearEquation::zeroed(n);
    for row in 0..n {
        let mut row_sum = 0.0;
        for col in 0..n {
            if row == col {
                continue;
            }
            let val = rng.gen_range(-1.0..1.0);
            le.a[row * n + col] = val;
            row_sum += val.abs();
        }
        le.a[row * n + row] = row_sum + 1.0;
        le.b[row] = rng.gen_range(-1.0..1.0);
    }
    le
}

pub(crate) fn write_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_bytes(reader)?))
}

pub(crate) fn read_bytes<R: Read, const LEN: usize>(reader: &mut R) -> io::Result<[u8; LEN]> {
    let mut bytes = [0u8; LEN];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn write_f64_slice<W: Write>(writer: &mut W, values: &[f64]) -> io::Result<()> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    writer.write_all(&bytes)
}

fn read_f64_vec<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<f64>> {
    let mut bytes = vec![0u8; len * 8];
    reader.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generated_system_is_diagonally_dominant() {
        let mut rng = rand::thread_rng();
        let le = generate_diagonally_dominant(16, &mut rng);
        for row in 0..16 {
            let diagonal = le.a[row * 16 + row].abs();
            let off_sum: f64 = (0..16)
                .filter(|&col| col != row)
                .map(|col| le.a[row * 16 + col].abs())
                .sum();
            assert!(diagonal > off_sum);
        }
    }

    #[test]
    fn single_instance_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("problem.raw");

        let mut rng = rand::thread_rng();
        let mut le = generate_diagonally_dominant(5, &mut rng);
        le.score = 0.125;
        le.save(&path).unwrap();

        let loaded = LinearEquation::load(&path).unwrap();
        assert_eq!(loaded, le);
    }

    #[test]
    fn residual_is_zero_for_exact_solution() {
        // A = [[2, 0], [0, 4]], b = [2, 8] -> x = [1, 2]
        let le = LinearEquation::new(2, vec![2.0, 0.0, 0.0, 4.0], vec![2.0, 8.0], 0.0);
        assert_eq!(le.max_residual(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncated.raw");
        std::fs::write(&path, [0u8; 12]).unwrap();
        let err = LinearEquation::load(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
