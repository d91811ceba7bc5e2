//! TEXMEX corpus readers (<http://corpus-texmex.irisa.fr/>).
//!
//! Each record is a little-endian `i32` dimension followed by `dim`
//! payload elements: `f32` for fvecs, `i32` for ivecs, `u8` for bvecs.
//! Every record in a file must carry the same dimension.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{IndexError, Result};
use crate::matrix::Matrix;

use super::VectorReader;

/// Reads `.fvecs` files (f32 payload).
pub struct FvecsReader {
    path: PathBuf,
}

/// Reads `.ivecs` files (i32 payload). Values are widened losslessly to
/// f32 for ids below 2^24, which covers the TEXMEX ground-truth files.
pub struct IvecsReader {
    path: PathBuf,
}

/// Reads `.bvecs` files (u8 payload).
pub struct BvecsReader {
    path: PathBuf,
}

impl FvecsReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!("fvecs reader created for {}", path.display());
        Self { path }
    }
}

impl IvecsReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!("ivecs reader created for {}", path.display());
        Self { path }
    }
}

impl BvecsReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!("bvecs reader created for {}", path.display());
        Self { path }
    }
}

impl VectorReader for FvecsReader {
    fn open(&mut self) -> Result<(usize, usize)> {
        probe(&self.path, 4)
    }

    fn read_all(&mut self) -> Result<Matrix> {
        read_records(&self.path, 4, |b| {
            f32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }
}

impl VectorReader for IvecsReader {
    fn open(&mut self) -> Result<(usize, usize)> {
        probe(&self.path, 4)
    }

    fn read_all(&mut self) -> Result<Matrix> {
        read_records(&self.path, 4, |b| {
            i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32
        })
    }
}

impl VectorReader for BvecsReader {
    fn open(&mut self) -> Result<(usize, usize)> {
        probe(&self.path, 1)
    }

    fn read_all(&mut self) -> Result<Matrix> {
        read_records(&self.path, 1, |b| b[0] as f32)
    }
}

/// Read the leading dimension and derive the record count from the file
/// length. The length must be a whole number of records.
fn probe(path: &Path, elem_size: usize) -> Result<(usize, usize)> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    let dim = i32::from_le_bytes(buf);
    if dim < 1 {
        return Err(IndexError::corrupt(format!(
            "{}: record dimension {dim} is not positive",
            path.display()
        )));
    }
    let record = 4 + dim as u64 * elem_size as u64;
    let len = file.metadata()?.len();
    if len % record != 0 {
        return Err(IndexError::corrupt(format!(
            "{}: {len} bytes is not a whole number of {record}-byte records",
            path.display()
        )));
    }
    Ok((dim as usize, (len / record) as usize))
}

fn read_records<F>(path: &Path, elem_size: usize, decode: F) -> Result<Matrix>
where
    F: Fn(&[u8]) -> f32,
{
    let (dim, n) = probe(path, elem_size)?;
    let mut reader = BufReader::new(File::open(path)?);

    let mut matrix = Matrix::with_capacity(dim, n);
    let mut prefix = [0u8; 4];
    let mut payload = vec![0u8; dim * elem_size];
    let mut row = vec![0.0f32; dim];
    for _ in 0..n {
        reader.read_exact(&mut prefix)?;
        let record_dim = i32::from_le_bytes(prefix);
        if record_dim != dim as i32 {
            return Err(IndexError::corrupt(format!(
                "{}: records disagree on dimension ({record_dim} vs {dim})",
                path.display()
            )));
        }
        reader.read_exact(&mut payload)?;
        for (dst, src) in row.iter_mut().zip(payload.chunks_exact(elem_size)) {
            *dst = decode(src);
        }
        matrix.push(&row);
    }
    debug!("read {n} x {dim} vectors from {}", path.display());
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fvecs(records: &[Vec<f32>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".fvecs").tempfile().unwrap();
        for record in records {
            file.write_all(&(record.len() as i32).to_le_bytes()).unwrap();
            for &x in record {
                file.write_all(&x.to_le_bytes()).unwrap();
            }
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn fvecs_round_trip() {
        let file = write_fvecs(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let mut reader = FvecsReader::new(file.path());

        assert_eq!(reader.open().unwrap(), (3, 2));
        let matrix = reader.read_all().unwrap();
        assert_eq!(matrix.rows(), 2);
        assert_eq!(matrix.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn ivecs_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for record in [[7i32, 8], [9, 10]] {
            file.write_all(&2i32.to_le_bytes()).unwrap();
            for v in record {
                file.write_all(&v.to_le_bytes()).unwrap();
            }
        }
        file.flush().unwrap();

        let matrix = IvecsReader::new(file.path()).read_all().unwrap();
        assert_eq!(matrix.row(0), &[7.0, 8.0]);
        assert_eq!(matrix.row(1), &[9.0, 10.0]);
    }

    #[test]
    fn bvecs_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&2i32.to_le_bytes()).unwrap();
        file.write_all(&[200u8, 255]).unwrap();
        file.flush().unwrap();

        let matrix = BvecsReader::new(file.path()).read_all().unwrap();
        assert_eq!(matrix.row(0), &[200.0, 255.0]);
    }

    #[test]
    fn disagreeing_dimensions_are_corrupt() {
        // Second record claims dim 2 in a file whose first record says 3;
        // total length still divides evenly (3 + 1 floats + 2 prefixes).
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&3i32.to_le_bytes()).unwrap();
        for x in [1.0f32, 2.0, 3.0] {
            file.write_all(&x.to_le_bytes()).unwrap();
        }
        file.write_all(&2i32.to_le_bytes()).unwrap();
        for x in [4.0f32, 5.0, 6.0] {
            file.write_all(&x.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();

        assert!(matches!(
            FvecsReader::new(file.path()).read_all(),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn ragged_file_length_is_corrupt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&2i32.to_le_bytes()).unwrap();
        file.write_all(&1.0f32.to_le_bytes()).unwrap();
        // Missing the second component.
        file.flush().unwrap();

        assert!(matches!(
            FvecsReader::new(file.path()).open(),
            Err(IndexError::Corrupt(_))
        ));
    }
}
