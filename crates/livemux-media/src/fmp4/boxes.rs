//! ISO BMFF box serialization primitives.
//!
//! Each box follows the standard layout: 4-byte size (big-endian u32),
//! 4-byte type (ASCII), then box-specific content.

// ---------------------------------------------------------------------------
// Low-level box writing helpers
// ---------------------------------------------------------------------------

/// Write a complete box: size (u32 BE) + type (4 ASCII bytes) + content.
pub(crate) fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let size = (8 + content.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

/// Write a container box (size + type + children concatenated).
pub(crate) fn write_container_box(box_type: &[u8; 4], children: &[&[u8]]) -> Vec<u8> {
    let children_len: usize = children.iter().map(|c| c.len()).sum();
    let size = (8 + children_len) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

/// Full box header (version + flags).
pub(crate) fn fullbox_header(version: u8, flags: u32) -> [u8; 4] {
    let val = ((version as u32) << 24) | (flags & 0x00FFFFFF);
    val.to_be_bytes()
}

const IDENTITY_MATRIX: [u32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

fn write_matrix(content: &mut Vec<u8>) {
    for value in IDENTITY_MATRIX {
        content.extend_from_slice(&value.to_be_bytes());
    }
}

// ---------------------------------------------------------------------------
// ftyp
// ---------------------------------------------------------------------------

pub(crate) fn write_ftyp(major_brand: &[u8; 4], minor_version: u32, brands: &[[u8; 4]]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + brands.len() * 4);
    content.extend_from_slice(major_brand);
    content.extend_from_slice(&minor_version.to_be_bytes());
    for brand in brands {
        content.extend_from_slice(brand);
    }
    write_box(b"ftyp", &content)
}

// ---------------------------------------------------------------------------
// mvhd (version 1 for 64-bit times)
// ---------------------------------------------------------------------------

pub(crate) fn write_mvhd(timescale: u32, next_track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(112);
    content.extend_from_slice(&fullbox_header(1, 0));
    // creation_time, modification_time
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    // duration unknown for a live stream
    content.extend_from_slice(&0u64.to_be_bytes());
    // rate = 1.0 (fixed 16.16)
    content.extend_from_slice(&0x00010000u32.to_be_bytes());
    // volume = 1.0 (fixed 8.8)
    content.extend_from_slice(&0x0100u16.to_be_bytes());
    // reserved (2 + 8 bytes)
    content.extend_from_slice(&[0u8; 10]);
    write_matrix(&mut content);
    // pre_defined (6 * 4 bytes)
    content.extend_from_slice(&[0u8; 24]);
    content.extend_from_slice(&next_track_id.to_be_bytes());

    write_box(b"mvhd", &content)
}

// ---------------------------------------------------------------------------
// tkhd (version 1)
// ---------------------------------------------------------------------------

pub(crate) fn write_tkhd(track_id: u32, is_video: bool, width: u32, height: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(96);
    // flags = 7 (enabled | in_movie | in_preview)
    content.extend_from_slice(&fullbox_header(1, 7));
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&track_id.to_be_bytes());
    // reserved
    content.extend_from_slice(&0u32.to_be_bytes());
    // duration
    content.extend_from_slice(&0u64.to_be_bytes());
    // reserved (2 * u32)
    content.extend_from_slice(&[0u8; 8]);
    // layer, alternate_group
    content.extend_from_slice(&0u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    let volume: u16 = if is_video { 0 } else { 0x0100 };
    content.extend_from_slice(&volume.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes());
    write_matrix(&mut content);
    // width and height (16.16 fixed point)
    content.extend_from_slice(&(width << 16).to_be_bytes());
    content.extend_from_slice(&(height << 16).to_be_bytes());

    write_box(b"tkhd", &content)
}

// ---------------------------------------------------------------------------
// mdhd (version 1)
// ---------------------------------------------------------------------------

pub(crate) fn write_mdhd(timescale: u32, language: [u8; 3]) -> Vec<u8> {
    let mut content = Vec::with_capacity(36);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&pack_language(language).to_be_bytes());
    // pre_defined
    content.extend_from_slice(&0u16.to_be_bytes());

    write_box(b"mdhd", &content)
}

/// ISO-639-2/T code packed as three 5-bit values offset from 0x60.
fn pack_language(code: [u8; 3]) -> u16 {
    code.iter()
        .fold(0u16, |acc, &c| (acc << 5) | (c.saturating_sub(0x60) as u16 & 0x1F))
}

// ---------------------------------------------------------------------------
// hdlr
// ---------------------------------------------------------------------------

pub(crate) fn write_hdlr(handler_type: &[u8; 4], name: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(24 + name.len() + 1);
    content.extend_from_slice(&fullbox_header(0, 0));
    // pre_defined
    content.extend_from_slice(&0u32.to_be_bytes());
    content.extend_from_slice(handler_type);
    // reserved (3 * u32)
    content.extend_from_slice(&[0u8; 12]);
    // name (null-terminated)
    content.extend_from_slice(name);
    content.push(0);

    write_box(b"hdlr", &content)
}

// ---------------------------------------------------------------------------
// dinf + dref
// ---------------------------------------------------------------------------

pub(crate) fn write_dinf() -> Vec<u8> {
    // flags = 1 => self-contained
    let url_box = write_box(b"url ", &fullbox_header(0, 1));
    let dref_box = {
        let mut c = Vec::with_capacity(8 + url_box.len());
        c.extend_from_slice(&fullbox_header(0, 0));
        c.extend_from_slice(&1u32.to_be_bytes());
        c.extend_from_slice(&url_box);
        write_box(b"dref", &c)
    };
    write_container_box(b"dinf", &[&dref_box])
}

// ---------------------------------------------------------------------------
// vmhd / smhd
// ---------------------------------------------------------------------------

pub(crate) fn write_vmhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(0, 1));
    // graphicsmode + opcolor
    content.extend_from_slice(&[0u8; 8]);
    write_box(b"vmhd", &content)
}

pub(crate) fn write_smhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    // balance + reserved
    content.extend_from_slice(&[0u8; 4]);
    write_box(b"smhd", &content)
}

// ---------------------------------------------------------------------------
// stbl and its empty tables
// ---------------------------------------------------------------------------

fn write_empty_table(box_type: &[u8; 4]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes()); // entry count
    write_box(box_type, &content)
}

fn write_empty_stsz() -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes()); // sample size
    content.extend_from_slice(&0u32.to_be_bytes()); // sample count
    write_box(b"stsz", &content)
}

/// `stsd` with zero or one sample entry.
pub(crate) fn write_stsd(entry: Option<&[u8]>) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + entry.map_or(0, <[u8]>::len));
    content.extend_from_slice(&fullbox_header(0, 0));
    match entry {
        Some(entry) => {
            content.extend_from_slice(&1u32.to_be_bytes());
            content.extend_from_slice(entry);
        }
        None => content.extend_from_slice(&0u32.to_be_bytes()),
    }
    write_box(b"stsd", &content)
}

pub(crate) fn write_stbl(stsd: &[u8]) -> Vec<u8> {
    let stts = write_empty_table(b"stts");
    let stsc = write_empty_table(b"stsc");
    let stsz = write_empty_stsz();
    let stco = write_empty_table(b"stco");
    write_container_box(b"stbl", &[stsd, &stts, &stsc, &stsz, &stco])
}

// ---------------------------------------------------------------------------
// Sample entries
// ---------------------------------------------------------------------------

/// Visual sample entry (`avc1`, `hvc1`) with one configuration child box.
pub(crate) fn write_visual_sample_entry(
    fourcc: &[u8; 4],
    width: u32,
    height: u32,
    config_type: &[u8; 4],
    config: &[u8],
) -> Vec<u8> {
    let mut entry = Vec::with_capacity(78 + config.len() + 8);
    // reserved (6 bytes) + data reference index
    entry.extend_from_slice(&[0u8; 6]);
    entry.extend_from_slice(&1u16.to_be_bytes());
    // pre_defined + reserved
    entry.extend_from_slice(&[0u8; 16]);
    entry.extend_from_slice(&(width.min(u16::MAX as u32) as u16).to_be_bytes());
    entry.extend_from_slice(&(height.min(u16::MAX as u32) as u16).to_be_bytes());
    // 72 dpi
    entry.extend_from_slice(&0x00480000u32.to_be_bytes());
    entry.extend_from_slice(&0x00480000u32.to_be_bytes());
    entry.extend_from_slice(&0u32.to_be_bytes());
    // frame count
    entry.extend_from_slice(&1u16.to_be_bytes());
    // compressor name
    entry.extend_from_slice(&[0u8; 32]);
    // depth
    entry.extend_from_slice(&0x0018u16.to_be_bytes());
    entry.extend_from_slice(&(-1i16).to_be_bytes());

    entry.extend_from_slice(&write_box(config_type, config));

    write_box(fourcc, &entry)
}

/// Generic audio sample entry (`mp4a`, `pcma`, `pcmu`), optionally carrying
/// one child box.
pub(crate) fn write_audio_sample_entry(
    fourcc: &[u8; 4],
    channels: u16,
    sample_size: u16,
    sample_rate: u32,
    child: Option<&[u8]>,
) -> Vec<u8> {
    let mut entry = Vec::with_capacity(28 + child.map_or(0, <[u8]>::len));
    entry.extend_from_slice(&[0u8; 6]);
    entry.extend_from_slice(&1u16.to_be_bytes());
    // reserved (2 * u32)
    entry.extend_from_slice(&[0u8; 8]);
    entry.extend_from_slice(&channels.to_be_bytes());
    entry.extend_from_slice(&sample_size.to_be_bytes());
    // pre_defined + reserved
    entry.extend_from_slice(&[0u8; 4]);
    // sample rate (16.16), integer part only
    entry.extend_from_slice(&(sample_rate.min(u16::MAX as u32) << 16).to_be_bytes());

    if let Some(child) = child {
        entry.extend_from_slice(child);
    }

    write_box(fourcc, &entry)
}

/// MPEG-4 descriptor with an expandable size field.
fn write_descriptor(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    out.push(tag);
    let len = payload.len() as u32;
    let mut shift = 21;
    while shift > 0 && (len >> shift) == 0 {
        shift -= 7;
    }
    while shift > 0 {
        out.push(0x80 | ((len >> shift) & 0x7F) as u8);
        shift -= 7;
    }
    out.push((len & 0x7F) as u8);
    out.extend_from_slice(payload);
    out
}

/// `esds` box carrying an AAC AudioSpecificConfig.
pub(crate) fn write_esds(track_id: u32, audio_specific_config: &[u8]) -> Vec<u8> {
    let decoder_specific = write_descriptor(0x05, audio_specific_config);

    let mut decoder_config = Vec::with_capacity(13 + decoder_specific.len());
    decoder_config.push(0x40); // objectTypeIndication: MPEG-4 audio
    decoder_config.push(0x15); // streamType audio << 2 | reserved
    decoder_config.extend_from_slice(&[0u8; 3]); // bufferSizeDB
    decoder_config.extend_from_slice(&0u32.to_be_bytes()); // maxBitrate
    decoder_config.extend_from_slice(&0u32.to_be_bytes()); // avgBitrate
    decoder_config.extend_from_slice(&decoder_specific);
    let decoder_config = write_descriptor(0x04, &decoder_config);

    let sl_config = write_descriptor(0x06, &[0x02]);

    let mut es = Vec::with_capacity(3 + decoder_config.len() + sl_config.len());
    es.extend_from_slice(&(track_id as u16).to_be_bytes());
    es.push(0); // flags
    es.extend_from_slice(&decoder_config);
    es.extend_from_slice(&sl_config);
    let es = write_descriptor(0x03, &es);

    let mut content = Vec::with_capacity(4 + es.len());
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&es);
    write_box(b"esds", &content)
}

// ---------------------------------------------------------------------------
// trex
// ---------------------------------------------------------------------------

pub(crate) fn write_trex(track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(24);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&track_id.to_be_bytes());
    content.extend_from_slice(&1u32.to_be_bytes()); // default sample description index
    content.extend_from_slice(&0u32.to_be_bytes()); // default sample duration
    content.extend_from_slice(&0u32.to_be_bytes()); // default sample size
    content.extend_from_slice(&0u32.to_be_bytes()); // default sample flags
    write_box(b"trex", &content)
}

// ---------------------------------------------------------------------------
// moof boxes
// ---------------------------------------------------------------------------

pub(crate) fn write_mfhd(sequence_number: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&sequence_number.to_be_bytes());
    write_box(b"mfhd", &content)
}

/// `tfhd` with default-base-is-moof (0x020000).
pub(crate) fn write_tfhd(track_id: u32) -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0x020000));
    content.extend_from_slice(&track_id.to_be_bytes());
    write_box(b"tfhd", &content)
}

/// `tfdt` version 1 (64-bit base media decode time).
pub(crate) fn write_tfdt(base_media_decode_time: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&base_media_decode_time.to_be_bytes());
    write_box(b"tfdt", &content)
}

/// A single sample's entry in `trun`.
pub(crate) struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
}

pub(crate) const TRUN_DATA_OFFSET: u32 = 0x000001;
pub(crate) const TRUN_SAMPLE_DURATION: u32 = 0x000100;
pub(crate) const TRUN_SAMPLE_SIZE: u32 = 0x000200;
pub(crate) const TRUN_SAMPLE_FLAGS: u32 = 0x000400;

/// Size of a `trun` box written by [`write_trun`].
pub(crate) fn trun_size(sample_count: usize) -> usize {
    8 + 4 + 4 + 4 + sample_count * 12
}

/// Write the `trun` box.
///
/// `data_offset` is the offset from the start of the containing moof to the
/// first byte of sample data in mdat.
pub(crate) fn write_trun(samples: &[TrunSample], data_offset: i32) -> Vec<u8> {
    let trun_flags = TRUN_DATA_OFFSET | TRUN_SAMPLE_DURATION | TRUN_SAMPLE_SIZE | TRUN_SAMPLE_FLAGS;
    let mut content = Vec::with_capacity(trun_size(samples.len()) - 8);
    content.extend_from_slice(&fullbox_header(0, trun_flags));
    content.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    content.extend_from_slice(&data_offset.to_be_bytes());
    for s in samples {
        content.extend_from_slice(&s.duration.to_be_bytes());
        content.extend_from_slice(&s.size.to_be_bytes());
        content.extend_from_slice(&s.flags.to_be_bytes());
    }
    write_box(b"trun", &content)
}

/// Header length `write_mdat_header` will produce for `data_size` bytes.
pub(crate) fn mdat_header_size(data_size: u64) -> usize {
    if data_size + 8 > u32::MAX as u64 {
        16
    } else {
        8
    }
}

/// Write the `mdat` box header; the caller appends the data.
pub(crate) fn write_mdat_header(data_size: u64) -> Vec<u8> {
    if mdat_header_size(data_size) == 16 {
        let mut hdr = Vec::with_capacity(16);
        hdr.extend_from_slice(&1u32.to_be_bytes());
        hdr.extend_from_slice(b"mdat");
        hdr.extend_from_slice(&(data_size + 16).to_be_bytes());
        hdr
    } else {
        let mut hdr = Vec::with_capacity(8);
        hdr.extend_from_slice(&((data_size + 8) as u32).to_be_bytes());
        hdr.extend_from_slice(b"mdat");
        hdr
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_write_box_size_and_type() {
        let b = write_box(b"test", &[1, 2, 3]);
        assert_eq!(b.len(), 11);
        assert_eq!(read_u32(&b, 0), 11);
        assert_eq!(&b[4..8], b"test");
        assert_eq!(&b[8..], &[1, 2, 3]);
    }

    #[test]
    fn test_write_container_box() {
        let child1 = write_box(b"ch_1", &[0xAA]);
        let child2 = write_box(b"ch_2", &[0xBB, 0xCC]);
        let container = write_container_box(b"cont", &[&child1, &child2]);
        assert_eq!(container.len(), 27);
        assert_eq!(read_u32(&container, 0), 27);
        assert_eq!(&container[4..8], b"cont");
    }

    #[test]
    fn test_ftyp_brands() {
        let ftyp = write_ftyp(b"isom", 0x200, &[*b"isom", *b"iso2", *b"avc1", *b"mp41"]);
        assert_eq!(ftyp.len(), 32);
        assert_eq!(&ftyp[8..12], b"isom");
        assert_eq!(read_u32(&ftyp, 12), 0x200);
        assert_eq!(&ftyp[24..28], b"avc1");
    }

    #[test]
    fn test_mvhd_next_track_id() {
        let mvhd = write_mvhd(1000, 3);
        assert_eq!(mvhd.len(), 120);
        assert_eq!(read_u32(&mvhd, 28), 1000);
        assert_eq!(read_u32(&mvhd, 116), 3);
    }

    #[test]
    fn test_tkhd_box_size() {
        let tkhd = write_tkhd(1, true, 1920, 1080);
        assert_eq!(tkhd.len(), 104);
        assert_eq!(read_u32(&tkhd, 28), 1);
        assert_eq!(read_u32(&tkhd, 96), 1920 << 16);
    }

    #[test]
    fn test_mdhd_language() {
        let mdhd = write_mdhd(1000, *b"und");
        assert_eq!(mdhd.len(), 44);
        assert_eq!(u16::from_be_bytes([mdhd[40], mdhd[41]]), 0x55C4);
    }

    #[test]
    fn test_empty_stsd() {
        let stsd = write_stsd(None);
        assert_eq!(stsd.len(), 16);
        assert_eq!(read_u32(&stsd, 12), 0);
    }

    #[test]
    fn test_audio_sample_entry_fields() {
        let entry = write_audio_sample_entry(b"pcmu", 1, 8, 8000, None);
        assert_eq!(entry.len(), 36);
        assert_eq!(&entry[4..8], b"pcmu");
        assert_eq!(u16::from_be_bytes([entry[24], entry[25]]), 1);
        assert_eq!(u16::from_be_bytes([entry[26], entry[27]]), 8);
        assert_eq!(read_u32(&entry, 32), 8000 << 16);
    }

    #[test]
    fn test_esds_wraps_config() {
        let esds = write_esds(2, &[0x12, 0x10]);
        assert_eq!(&esds[4..8], b"esds");
        assert_eq!(read_u32(&esds, 0) as usize, esds.len());
        // ES_Descriptor tag follows the full box header.
        assert_eq!(esds[12], 0x03);
        let asc_at = esds.windows(4).position(|w| w == [0x05, 0x02, 0x12, 0x10]);
        assert!(asc_at.is_some());
        assert_eq!(&esds[esds.len() - 3..], &[0x06, 0x01, 0x02]);
    }

    #[test]
    fn test_descriptor_long_length() {
        let payload = vec![0u8; 200];
        let d = write_descriptor(0x05, &payload);
        assert_eq!(&d[..3], &[0x05, 0x81, 0x48]);
        assert_eq!(d.len(), 203);
    }

    #[test]
    fn test_trun_layout() {
        let samples = [
            TrunSample { duration: 40, size: 100, flags: 0x02000000 },
            TrunSample { duration: 40, size: 20, flags: 0x01010000 },
        ];
        let trun = write_trun(&samples, 120);
        assert_eq!(trun.len(), trun_size(2));
        assert_eq!(read_u32(&trun, 8), 0x000701);
        assert_eq!(read_u32(&trun, 12), 2);
        assert_eq!(read_u32(&trun, 16), 120);
        assert_eq!(read_u32(&trun, 20), 40);
        assert_eq!(read_u32(&trun, 24), 100);
        assert_eq!(read_u32(&trun, 28), 0x02000000);
    }

    #[test]
    fn test_mdat_header_normal() {
        let hdr = write_mdat_header(100);
        assert_eq!(hdr.len(), 8);
        assert_eq!(read_u32(&hdr, 0), 108);
        assert_eq!(&hdr[4..8], b"mdat");
    }

    #[test]
    fn test_mdat_header_extended() {
        let hdr = write_mdat_header(u32::MAX as u64);
        assert_eq!(hdr.len(), 16);
        assert_eq!(read_u32(&hdr, 0), 1);
        assert_eq!(mdat_header_size(u32::MAX as u64), 16);
    }
}
