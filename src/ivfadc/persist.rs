//! Binary persistence of a populated index.
//!
//! Single little-endian file:
//!
//! ```text
//! magic            8 bytes  "IVFADC\0" + format version (1)
//! header           i32 D, i32 K_c, i32 M, i32 K_s, i64 N_total
//! coarse centroids K_c x D x f32
//! pq centroids     M x K_s x (D/M) x f32
//! cell sizes       K_c x i64
//! cells, in order  per cell: size x i64 ids, then size x M u8 codes
//! ```
//!
//! Load validates the magic/version, the header shape, and that the cell
//! sizes sum to N_total; any mismatch is `Corrupt`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;

use crate::coarse::CoarseQuantizer;
use crate::error::{IndexError, Result};
use crate::invlist::InvertedIndex;
use crate::pq::ProductQuantizer;

use super::engine::{IvfAdc, State};

/// File magic; the trailing byte is the format version.
const MAGIC: [u8; 8] = *b"IVFADC\0\x01";

impl IvfAdc {
    /// Serialize the populated index to `writer`.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.state != State::Populated {
            return Err(IndexError::invalid_state(
                "only a populated index can be saved",
            ));
        }

        let k_c = self.coarse.num_cells();
        let m = self.pq.num_subquantizers();
        let k_s = self.pq.num_centroids();

        writer.write_all(&MAGIC)?;
        writer.write_all(&(self.dim as i32).to_le_bytes())?;
        writer.write_all(&(k_c as i32).to_le_bytes())?;
        writer.write_all(&(m as i32).to_le_bytes())?;
        writer.write_all(&(k_s as i32).to_le_bytes())?;
        writer.write_all(&(self.next_id as i64).to_le_bytes())?;

        write_f32s(writer, self.coarse.centroids()?)?;
        write_f32s(writer, self.pq.codebooks())?;

        for cell in 0..k_c {
            writer.write_all(&(self.lists.len(cell) as i64).to_le_bytes())?;
        }
        for cell in 0..k_c {
            for &id in self.lists.cell_ids(cell) {
                writer.write_all(&(id as i64).to_le_bytes())?;
            }
            writer.write_all(self.lists.cell_codes(cell))?;
        }
        Ok(())
    }

    /// Deserialize a populated index from `reader`.
    pub fn load<R: Read>(reader: &mut R) -> Result<IvfAdc> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(IndexError::corrupt(
                "bad magic bytes or unsupported format version",
            ));
        }

        let dim = read_i32(reader)?;
        let k_c = read_i32(reader)?;
        let m = read_i32(reader)?;
        let k_s = read_i32(reader)?;
        let n_total = read_i64(reader)?;
        if dim < 1 || k_c < 1 || m < 1 || k_s < 1 || k_s > 256 || n_total < 0 {
            return Err(IndexError::corrupt(format!(
                "implausible header: D={dim} K_c={k_c} M={m} K_s={k_s} N={n_total}"
            )));
        }
        let (dim, k_c, m, k_s) = (dim as usize, k_c as usize, m as usize, k_s as usize);
        if dim % m != 0 {
            return Err(IndexError::corrupt(format!(
                "header dimension {dim} is not a multiple of {m} subquantizers"
            )));
        }
        let sub_dim = dim / m;

        let coarse =
            CoarseQuantizer::from_centroids(read_f32s(reader, k_c * dim)?, dim)
                .map_err(|e| IndexError::corrupt(e.to_string()))?;
        let pq = ProductQuantizer::from_codebooks(
            read_f32s(reader, m * k_s * sub_dim)?,
            m,
            k_s,
            sub_dim,
        )
        .map_err(|e| IndexError::corrupt(e.to_string()))?;

        let mut sizes = Vec::with_capacity(k_c);
        for _ in 0..k_c {
            let size = read_i64(reader)?;
            if size < 0 {
                return Err(IndexError::corrupt("negative cell size"));
            }
            sizes.push(size as usize);
        }
        let total: usize = sizes.iter().sum();
        if total as i64 != n_total {
            return Err(IndexError::corrupt(format!(
                "cell sizes sum to {total}, header says {n_total}"
            )));
        }

        let mut lists = InvertedIndex::new(k_c, m);
        for (cell, &size) in sizes.iter().enumerate() {
            let mut ids = Vec::with_capacity(size);
            for _ in 0..size {
                ids.push(read_i64(reader)? as u64);
            }
            let mut codes = vec![0u8; size * m];
            reader.read_exact(&mut codes)?;
            if k_s < 256 {
                if let Some(&bad) = codes.iter().find(|&&c| c as usize >= k_s) {
                    return Err(IndexError::corrupt(format!(
                        "subcode {bad} out of range for {k_s} codewords"
                    )));
                }
            }
            for (i, &id) in ids.iter().enumerate() {
                lists.append(cell, id, &codes[i * m..(i + 1) * m]);
            }
        }

        info!("loaded ivfadc index: {k_c} cells, {total} vectors, dim {dim}");
        Ok(IvfAdc {
            coarse,
            pq,
            lists,
            state: State::Populated,
            dim,
            next_id: n_total as u64,
        })
    }

    /// Save to a file path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from a file path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<IvfAdc> {
        let mut reader = BufReader::new(File::open(path)?);
        IvfAdc::load(&mut reader)
    }
}

fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> Result<()> {
    for &x in values {
        writer.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

fn read_f32s<R: Read>(reader: &mut R, len: usize) -> Result<Vec<f32>> {
    let mut bytes = vec![0u8; len * 4];
    reader.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ivfadc::IvfAdcParams;
    use crate::matrix::Matrix;

    fn populated_index() -> IvfAdc {
        let mut data = Matrix::new(4);
        for i in 0..32 {
            let row: Vec<f32> = (0..4).map(|d| ((i * 5 + d) % 23) as f32).collect();
            data.push(&row);
        }
        let mut index = IvfAdc::new(IvfAdcParams {
            coarse_centroids: 4,
            coarse_max_iter: 10,
            coarse_seed: 0,
            pq_subquantizers: 2,
            pq_centroids: 8,
            pq_max_iter: 10,
            pq_seed: 0,
        })
        .unwrap();
        index.train(&data).unwrap();
        index.add(&data).unwrap();
        index
    }

    #[test]
    fn unpopulated_index_refuses_to_save() {
        let index = IvfAdc::new(IvfAdcParams::default()).unwrap();
        let mut buf = Vec::new();
        assert!(matches!(
            index.save(&mut buf),
            Err(IndexError::InvalidState(_))
        ));
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let index = populated_index();
        let mut buf = Vec::new();
        index.save(&mut buf).unwrap();

        buf[6] = b'X';
        assert!(matches!(
            IvfAdc::load(&mut buf.as_slice()),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn wrong_version_is_corrupt() {
        let index = populated_index();
        let mut buf = Vec::new();
        index.save(&mut buf).unwrap();

        buf[7] = 2;
        assert!(matches!(
            IvfAdc::load(&mut buf.as_slice()),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn size_sum_mismatch_is_corrupt() {
        let index = populated_index();
        let mut buf = Vec::new();
        index.save(&mut buf).unwrap();

        // N_total sits after magic (8) and four i32 header fields (16).
        let n = i64::from_le_bytes(buf[24..32].try_into().unwrap());
        buf[24..32].copy_from_slice(&(n + 1).to_le_bytes());
        assert!(matches!(
            IvfAdc::load(&mut buf.as_slice()),
            Err(IndexError::Corrupt(_))
        ));
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let index = populated_index();
        let mut buf = Vec::new();
        index.save(&mut buf).unwrap();

        buf.truncate(buf.len() / 2);
        assert!(matches!(
            IvfAdc::load(&mut buf.as_slice()),
            Err(IndexError::Io(_))
        ));
    }
}
