//! Read-side helpers for fragmented MP4 output.
//!
//! Used by diagnostics and tests to walk the byte stream a session produced
//! without a full demuxer.

use livemux_common::{Error, Result};

/// Location of one box inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub box_type: [u8; 4],
    /// Offset of the size field from the start of the buffer.
    pub offset: usize,
    /// 8, or 16 for a 64-bit size.
    pub header_len: usize,
    /// Total box size including the header.
    pub size: u64,
}

impl BoxHeader {
    /// Slice of `data` covering this box.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.size as usize]
    }

    /// Slice of `data` covering this box's content.
    pub fn content<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset + self.header_len..self.offset + self.size as usize]
    }
}

fn be_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::Validation(format!("truncated read at offset {at}")))
}

fn be_u64(data: &[u8], at: usize) -> Result<u64> {
    let hi = be_u32(data, at)? as u64;
    let lo = be_u32(data, at + 4)? as u64;
    Ok((hi << 32) | lo)
}

fn read_header(data: &[u8], offset: usize) -> Result<BoxHeader> {
    let size32 = be_u32(data, offset)?;
    let box_type = data
        .get(offset + 4..offset + 8)
        .and_then(|b| <[u8; 4]>::try_from(b).ok())
        .ok_or_else(|| Error::Validation(format!("truncated box header at {offset}")))?;

    let (size, header_len) = match size32 {
        0 => ((data.len() - offset) as u64, 8),
        1 => (be_u64(data, offset + 8)?, 16),
        n => (n as u64, 8),
    };

    if size < header_len as u64 || offset as u64 + size > data.len() as u64 {
        return Err(Error::Validation(format!(
            "box '{}' at {offset} has invalid size {size}",
            String::from_utf8_lossy(&box_type)
        )));
    }

    Ok(BoxHeader {
        box_type,
        offset,
        header_len,
        size,
    })
}

/// Walk the sibling boxes that make up `data`.
pub fn top_level_boxes(data: &[u8]) -> Result<Vec<BoxHeader>> {
    let mut boxes = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let header = read_header(data, offset)?;
        offset += header.size as usize;
        boxes.push(header);
    }
    Ok(boxes)
}

/// Follow a path of container boxes and return the bytes of the last box
/// named, header included. Returns `None` if any step is missing.
pub fn find_box<'a>(data: &'a [u8], path: &[[u8; 4]]) -> Option<&'a [u8]> {
    let mut current = data;
    let mut found = None;
    for (depth, name) in path.iter().enumerate() {
        let boxes = top_level_boxes(current).ok()?;
        let header = boxes.into_iter().find(|b| &b.box_type == name)?;
        let bytes = header.bytes(current);
        found = Some(bytes);
        if depth + 1 < path.len() {
            current = header.content(current);
        }
    }
    found
}

/// Summary of one `moof` (single `traf`, single `trun`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSummary {
    pub sequence_number: u32,
    pub track_id: u32,
    pub base_decode_time: u64,
    pub data_offset: Option<i32>,
    pub sample_durations: Vec<u32>,
    pub sample_sizes: Vec<u32>,
    pub sample_flags: Vec<u32>,
    /// Length of the `mdat` payload following the `moof`, when present.
    pub mdat_len: Option<u64>,
}

impl FragmentSummary {
    pub fn sample_count(&self) -> usize {
        self.sample_sizes.len()
    }
}

/// Summarize a fragment. `data` must start with a `moof` box; an `mdat`
/// directly after it is measured if present.
pub fn summarize_fragment(data: &[u8]) -> Result<FragmentSummary> {
    let moof = read_header(data, 0)?;
    if &moof.box_type != b"moof" {
        return Err(Error::Validation(format!(
            "expected moof, found '{}'",
            String::from_utf8_lossy(&moof.box_type)
        )));
    }
    let moof_bytes = moof.bytes(data);

    let missing = |name: &str| Error::Validation(format!("moof without {name}"));

    let mfhd = find_box(moof_bytes, &[*b"moof", *b"mfhd"]).ok_or_else(|| missing("mfhd"))?;
    let sequence_number = be_u32(mfhd, 12)?;

    let tfhd = find_box(moof_bytes, &[*b"moof", *b"traf", *b"tfhd"])
        .ok_or_else(|| missing("tfhd"))?;
    let track_id = be_u32(tfhd, 12)?;

    let tfdt = find_box(moof_bytes, &[*b"moof", *b"traf", *b"tfdt"])
        .ok_or_else(|| missing("tfdt"))?;
    let base_decode_time = match tfdt.get(8) {
        Some(1) => be_u64(tfdt, 12)?,
        _ => be_u32(tfdt, 12)? as u64,
    };

    let trun = find_box(moof_bytes, &[*b"moof", *b"traf", *b"trun"])
        .ok_or_else(|| missing("trun"))?;
    let flags = be_u32(trun, 8)? & 0x00FF_FFFF;
    let count = be_u32(trun, 12)? as usize;
    let mut pos = 16;

    let data_offset = if flags & 0x000001 != 0 {
        let v = be_u32(trun, pos)? as i32;
        pos += 4;
        Some(v)
    } else {
        None
    };
    if flags & 0x000004 != 0 {
        // first_sample_flags
        pos += 4;
    }

    let entry_size = [0x000100, 0x000200, 0x000400, 0x000800]
        .iter()
        .filter(|&&f| flags & f != 0)
        .count()
        * 4;
    let available = trun.len().saturating_sub(pos);
    if count.checked_mul(entry_size).map_or(true, |need| need > available) {
        return Err(Error::Validation(format!(
            "trun declares {count} samples in {available} bytes"
        )));
    }
    // Nothing is read per sample without per-sample fields.
    let count = if entry_size == 0 { 0 } else { count };

    let mut sample_durations = Vec::with_capacity(count);
    let mut sample_sizes = Vec::with_capacity(count);
    let mut sample_flags = Vec::with_capacity(count);
    for _ in 0..count {
        if flags & 0x000100 != 0 {
            sample_durations.push(be_u32(trun, pos)?);
            pos += 4;
        }
        if flags & 0x000200 != 0 {
            sample_sizes.push(be_u32(trun, pos)?);
            pos += 4;
        }
        if flags & 0x000400 != 0 {
            sample_flags.push(be_u32(trun, pos)?);
            pos += 4;
        }
        if flags & 0x000800 != 0 {
            pos += 4;
        }
    }

    let rest = &data[moof.size as usize..];
    let mdat_len = match read_header(rest, 0) {
        Ok(h) if &h.box_type == b"mdat" => Some(h.size - h.header_len as u64),
        _ => None,
    };

    Ok(FragmentSummary {
        sequence_number,
        track_id,
        base_decode_time,
        data_offset,
        sample_durations,
        sample_sizes,
        sample_flags,
        mdat_len,
    })
}
