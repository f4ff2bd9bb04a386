//! POS fixed-record loader and writer.
//!
//! A POS file is a bare stream of big-endian 4-byte floats, `input_cols`
//! per record. The column map selects which source columns land in the
//! four output fields (x, y, z, value). File size must divide exactly into
//! records; any NaN in a mapped field rejects the whole load.

use ionvue_core::ion::bound_cube_of;
use ionvue_core::{IonHit, Point3D, RefreshContext, RefreshError, Result, PROGRESS_CHUNK};
use memmap2::Mmap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Mapping from the four output fields to source column indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosColumnMap {
    pub input_cols: usize,
    /// Source column for each of x, y, z, value.
    pub index: [usize; 4],
}

impl Default for PosColumnMap {
    fn default() -> Self {
        Self {
            input_cols: 4,
            index: [0, 1, 2, 3],
        }
    }
}

impl PosColumnMap {
    fn record_size(&self) -> usize {
        self.input_cols * 4
    }

    fn check(&self) -> Result<()> {
        if self.input_cols == 0 || self.index.iter().any(|&i| i >= self.input_cols) {
            return Err(RefreshError::Format);
        }
        Ok(())
    }

    /// Decode one mapped record from raw big-endian bytes.
    fn decode(&self, record: &[u8]) -> IonHit {
        let field = |col: usize| {
            let off = col * 4;
            f32::from_be_bytes([record[off], record[off + 1], record[off + 2], record[off + 3]])
        };
        IonHit::new(
            Point3D::new(
                field(self.index[0]),
                field(self.index[1]),
                field(self.index[2]),
            ),
            field(self.index[3]),
        )
    }
}

fn file_record_count(path: &Path, map: &PosColumnMap) -> Result<(u64, usize)> {
    let meta = std::fs::metadata(path)
        .map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let size = meta.len();
    if size == 0 {
        return Err(RefreshError::EmptyFile);
    }
    let rec = map.record_size() as u64;
    if size % rec != 0 {
        return Err(RefreshError::SizeModulus);
    }
    Ok((size, (size / rec) as usize))
}

/// Load an entire POS file.
///
/// Reads in power-of-two record chunks, starting at 512 records and
/// halving until the chunk fits what remains, so the tail is consumed
/// without a partial read.
pub fn load_pos(path: &Path, map: &PosColumnMap, ctx: &RefreshContext) -> Result<Vec<IonHit>> {
    map.check()?;
    let (file_size, total) = file_record_count(path, map)?;
    debug!(path = %path.display(), records = total, "pos load");

    let file =
        File::open(path).map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    let rec_size = map.record_size();
    let mut ions = Vec::new();
    ions.try_reserve_exact(total)
        .map_err(|_| RefreshError::AllocFail)?;

    let mut rows = 512usize;
    while rows > 1 && (rows * rec_size) as u64 > file_size {
        rows >>= 1;
    }

    let mut buf = vec![0u8; rows * rec_size];
    let mut remaining = total;
    let mut since_poll = 0usize;
    while remaining > 0 {
        while rows > remaining {
            rows >>= 1;
        }
        let want = rows * rec_size;
        reader
            .read_exact(&mut buf[..want])
            .map_err(|_| RefreshError::ReadFail)?;

        for record in buf[..want].chunks_exact(rec_size) {
            let hit = map.decode(record);
            if hit.has_nan() {
                return Err(RefreshError::NanFound);
            }
            ions.push(hit);
        }
        remaining -= rows;

        since_poll += rows;
        if since_poll >= PROGRESS_CHUNK {
            since_poll = 0;
            let done = total - remaining;
            ctx.progress
                .set_filter_progress((done * 100 / total) as u32);
            if ctx.cancel.is_cancelled() {
                return Err(RefreshError::Aborted);
            }
        }
    }
    ctx.progress.set_filter_progress(100);

    if bound_cube_of(&ions).is_numerically_big() {
        warn!(path = %path.display(), "dataset bounds are suspiciously large");
    }
    Ok(ions)
}

/// Load `limit` records chosen uniformly without replacement.
///
/// Falls back to the full loader when `limit` covers the file. Sample
/// offsets are sorted ascending so reads always seek forward.
pub fn load_pos_sampled(
    path: &Path,
    map: &PosColumnMap,
    limit: usize,
    ctx: &RefreshContext,
) -> Result<Vec<IonHit>> {
    map.check()?;
    let (_, total) = file_record_count(path, map)?;
    if limit >= total {
        return load_pos(path, map, ctx);
    }

    let mut rng = StdRng::from_entropy();
    let chosen =
        ionvue_core::sampling::random_unique_indices(limit, total, &mut rng, &ctx.cancel)?;

    let file =
        File::open(path).map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    // Sampled access is random; let the OS page in what we touch.
    let mmap = unsafe { Mmap::map(&file).map_err(|_| RefreshError::ReadFail)? };

    let rec_size = map.record_size();
    let mut ions = Vec::new();
    ions.try_reserve_exact(limit)
        .map_err(|_| RefreshError::AllocFail)?;

    for (n, &idx) in chosen.iter().enumerate() {
        let off = idx * rec_size;
        let record = mmap.get(off..off + rec_size).ok_or(RefreshError::ReadFail)?;
        let hit = map.decode(record);
        if hit.has_nan() {
            return Err(RefreshError::NanFound);
        }
        ions.push(hit);

        if n % PROGRESS_CHUNK == 0 {
            ctx.progress.set_filter_progress((n * 100 / limit) as u32);
            if ctx.cancel.is_cancelled() {
                return Err(RefreshError::Aborted);
            }
        }
    }
    ctx.progress.set_filter_progress(100);
    Ok(ions)
}

/// Write ions as a plain 4-column POS file (x, y, z, m/c big-endian).
pub fn write_pos(path: &Path, ions: &[IonHit]) -> Result<()> {
    use std::io::Write;
    let file = File::create(path)
        .map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let mut writer = std::io::BufWriter::new(file);
    for ion in ions {
        writer
            .write_all(&ion.to_be_bytes())
            .map_err(|_| RefreshError::ReadFail)?;
    }
    writer.flush().map_err(|_| RefreshError::ReadFail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_map_rejects_bad_index() {
        let map = PosColumnMap {
            input_cols: 4,
            index: [0, 1, 2, 4],
        };
        assert_eq!(map.check(), Err(RefreshError::Format));
    }

    #[test]
    fn test_decode_respects_index_map() {
        // record of 5 columns; select columns 4,2,1,0
        let map = PosColumnMap {
            input_cols: 5,
            index: [4, 2, 1, 0],
        };
        let mut rec = Vec::new();
        for v in [10.0f32, 11.0, 12.0, 13.0, 14.0] {
            rec.extend_from_slice(&v.to_be_bytes());
        }
        let hit = map.decode(&rec);
        assert_eq!(hit.pos, Point3D::new(14.0, 12.0, 11.0));
        assert_eq!(hit.mass_to_charge, 10.0);
    }
}
