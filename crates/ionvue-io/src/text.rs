//! Delimited-text ion loader.
//!
//! Text exports carry an unknown-length header. Pass one walks the file
//! line by line until it finds a line with enough fields whose selected
//! columns all parse as floats; that line starts the data section. Pass
//! two scans the remainder in binary, recording an entry offset for every
//! line that follows numeric content. The entry offsets make the sampled
//! load a matter of seek-and-parse.

use ionvue_core::{IonHit, Point3D, RefreshContext, RefreshError, Result, PROGRESS_CHUNK};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Accepted field separators.
pub const TEXT_DELIMITERS: &[char] = &['\t', ' ', ','];

fn split_fields(line: &str) -> Vec<&str> {
    line.split(TEXT_DELIMITERS)
        .filter(|f| !f.is_empty())
        .collect()
}

fn parse_selected(fields: &[&str], selected: &[usize; 4]) -> Result<IonHit> {
    let mut vals = [0.0f32; 4];
    for (slot, &col) in selected.iter().enumerate() {
        let field = fields.get(col).ok_or(RefreshError::FieldCount)?;
        vals[slot] = field.parse().map_err(|_| RefreshError::Format)?;
    }
    let hit = IonHit::new(Point3D::new(vals[0], vals[1], vals[2]), vals[3]);
    if hit.has_nan() {
        return Err(RefreshError::NanFound);
    }
    Ok(hit)
}

/// Byte offset of the first data line: the first line with enough fields
/// where every selected column parses as a float.
fn find_data_start(path: &Path, selected: &[usize; 4]) -> Result<u64> {
    let file =
        File::open(path).map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let max_col = *selected.iter().max().expect("four columns");

    let mut offset = 0u64;
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|_| RefreshError::ReadFail)?;
        if n == 0 {
            return Err(RefreshError::HeaderOnly);
        }

        let fields = split_fields(line.trim_end());
        if fields.len() > max_col
            && selected
                .iter()
                .all(|&c| fields[c].parse::<f32>().is_ok())
        {
            return Ok(offset);
        }
        offset += n as u64;
    }
}

/// Offsets (from file start) of the start of every data line at or after
/// `data_start`. A line counts only once numeric content has been seen
/// since the previous entry, which drops trailing non-numeric runs.
fn scan_line_offsets(path: &Path, data_start: u64, ctx: &RefreshContext) -> Result<Vec<u64>> {
    let file =
        File::open(path).map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(data_start))
        .map_err(|_| RefreshError::ReadFail)?;

    let mut offsets = vec![data_start];
    let mut seen_numeric = false;
    let mut pos = data_start;
    let mut buf = [0u8; 16384];
    loop {
        let n = reader.read(&mut buf).map_err(|_| RefreshError::ReadFail)?;
        if n == 0 {
            break;
        }
        for (i, &b) in buf[..n].iter().enumerate() {
            if b == b'\n' {
                if seen_numeric {
                    offsets.push(pos + i as u64 + 1);
                    seen_numeric = false;
                }
            } else if b.is_ascii_digit() {
                seen_numeric = true;
            }
        }
        pos += n as u64;
        if ctx.cancel.is_cancelled() {
            return Err(RefreshError::Aborted);
        }
    }
    // The final entry points at EOF whenever the file ends with a newline.
    if offsets.last() == Some(&pos) {
        offsets.pop();
    }
    Ok(offsets)
}

/// Load every data line of a delimited text file.
pub fn load_text(path: &Path, selected: &[usize; 4], ctx: &RefreshContext) -> Result<Vec<IonHit>> {
    let data_start = find_data_start(path, selected)?;
    debug!(path = %path.display(), data_start, "text load");

    let file =
        File::open(path).map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(data_start))
        .map_err(|_| RefreshError::ReadFail)?;

    let mut ions = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(|_| RefreshError::ReadFail)?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        ions.push(parse_selected(&split_fields(trimmed), selected)?);

        if n % PROGRESS_CHUNK == 0 && ctx.cancel.is_cancelled() {
            return Err(RefreshError::Aborted);
        }
    }
    if ions.is_empty() {
        return Err(RefreshError::HeaderOnly);
    }
    ctx.progress.set_filter_progress(100);
    Ok(ions)
}

/// Load `limit` uniformly sampled data lines. Falls back to the full
/// loader when `limit` covers every line.
pub fn load_text_sampled(
    path: &Path,
    selected: &[usize; 4],
    limit: usize,
    ctx: &RefreshContext,
) -> Result<Vec<IonHit>> {
    let data_start = find_data_start(path, selected)?;
    let offsets = scan_line_offsets(path, data_start, ctx)?;
    if limit >= offsets.len() {
        return load_text(path, selected, ctx);
    }

    let mut rng = StdRng::from_entropy();
    let chosen =
        ionvue_core::sampling::random_unique_indices(limit, offsets.len(), &mut rng, &ctx.cancel)?;

    let file =
        File::open(path).map_err(|e| RefreshError::OpenFail(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    let mut ions = Vec::new();
    ions.try_reserve_exact(limit)
        .map_err(|_| RefreshError::AllocFail)?;
    let mut line = String::new();
    for (n, &idx) in chosen.iter().enumerate() {
        reader
            .seek(SeekFrom::Start(offsets[idx]))
            .map_err(|_| RefreshError::ReadFail)?;
        line.clear();
        reader
            .read_line(&mut line)
            .map_err(|_| RefreshError::ReadFail)?;
        ions.push(parse_selected(&split_fields(line.trim()), selected)?);

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
