//! Initialization segment box tree (ftyp + moov).
//!
//! The tree is built incrementally as tracks are negotiated and serialized
//! once when the session attaches.

use bytes::Bytes;
use livemux_common::MediaKind;

use super::boxes;

/// Timescale used for the movie and every track (milliseconds).
pub const TIMESCALE: u32 = 1000;

/// `ftyp` contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ftyp {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
}

impl Ftyp {
    /// `isom` / `0x200` with `isom, iso2, <codec brand>, mp41`.
    pub fn for_codec_brand(brand: [u8; 4]) -> Self {
        Self {
            major_brand: *b"isom",
            minor_version: 0x200,
            compatible_brands: vec![*b"isom", *b"iso2", brand, *b"mp41"],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        boxes::write_ftyp(&self.major_brand, self.minor_version, &self.compatible_brands)
    }
}

impl Default for Ftyp {
    /// Brands used when no video track set them.
    fn default() -> Self {
        Self {
            major_brand: *b"isom",
            minor_version: 0x200,
            compatible_brands: vec![*b"isom", *b"iso2", *b"mp41"],
        }
    }
}

/// The single entry of a track's `stsd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleEntry {
    /// `avc1` with an `avcC` record.
    Avc1 { width: u32, height: u32, avcc: Vec<u8> },
    /// `hvc1` with an `hvcC` record.
    Hvc1 { width: u32, height: u32, hvcc: Vec<u8> },
    /// `mp4a` with an `esds` wrapping the AudioSpecificConfig.
    Mp4a {
        channels: u16,
        sample_rate: u32,
        audio_specific_config: Vec<u8>,
    },
    /// Generic audio sample entry with no child boxes (`pcma`, `pcmu`).
    Audio {
        fourcc: [u8; 4],
        channels: u16,
        sample_size: u16,
        sample_rate: u32,
    },
}

impl SampleEntry {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Avc1 { .. } => *b"avc1",
            Self::Hvc1 { .. } => *b"hvc1",
            Self::Mp4a { .. } => *b"mp4a",
            Self::Audio { fourcc, .. } => *fourcc,
        }
    }

    fn encode(&self, track_id: u32) -> Vec<u8> {
        match self {
            Self::Avc1 { width, height, avcc } => {
                boxes::write_visual_sample_entry(b"avc1", *width, *height, b"avcC", avcc)
            }
            Self::Hvc1 { width, height, hvcc } => {
                boxes::write_visual_sample_entry(b"hvc1", *width, *height, b"hvcC", hvcc)
            }
            Self::Mp4a {
                channels,
                sample_rate,
                audio_specific_config,
            } => {
                let esds = boxes::write_esds(track_id, audio_specific_config);
                boxes::write_audio_sample_entry(b"mp4a", *channels, 16, *sample_rate, Some(&esds))
            }
            Self::Audio {
                fourcc,
                channels,
                sample_size,
                sample_rate,
            } => boxes::write_audio_sample_entry(fourcc, *channels, *sample_size, *sample_rate, None),
        }
    }
}

/// One `trak`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trak {
    pub track_id: u32,
    pub kind: MediaKind,
    pub width: u32,
    pub height: u32,
    /// `None` leaves the `stsd` empty (codec without a sample description).
    pub sample_entry: Option<SampleEntry>,
}

impl Trak {
    /// An empty track skeleton for `kind` with timescale [`TIMESCALE`].
    pub fn empty(track_id: u32, kind: MediaKind) -> Self {
        Self {
            track_id,
            kind,
            width: 0,
            height: 0,
            sample_entry: None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let is_video = self.kind == MediaKind::Video;
        let tkhd = boxes::write_tkhd(self.track_id, is_video, self.width, self.height);

        let mdhd = boxes::write_mdhd(TIMESCALE, *b"chi");
        let (hdlr, media_header) = if is_video {
            (boxes::write_hdlr(b"vide", b"VideoHandler"), boxes::write_vmhd())
        } else {
            (boxes::write_hdlr(b"soun", b"SoundHandler"), boxes::write_smhd())
        };

        let entry = self.sample_entry.as_ref().map(|e| e.encode(self.track_id));
        let stsd = boxes::write_stsd(entry.as_deref());
        let stbl = boxes::write_stbl(&stsd);
        let dinf = boxes::write_dinf();
        let minf = boxes::write_container_box(b"minf", &[&media_header, &dinf, &stbl]);
        let mdia = boxes::write_container_box(b"mdia", &[&mdhd, &hdlr, &minf]);

        boxes::write_container_box(b"trak", &[&tkhd, &mdia])
    }
}

/// One `trex` in `mvex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trex {
    pub track_id: u32,
}

/// The `moov` tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moov {
    /// Next-track-id counter from `mvhd`; starts at 1.
    pub next_track_id: u32,
    pub traks: Vec<Trak>,
    pub trexs: Vec<Trex>,
}

impl Default for Moov {
    fn default() -> Self {
        Self {
            next_track_id: 1,
            traks: Vec::new(),
            trexs: Vec::new(),
        }
    }
}

impl Moov {
    /// Take the next track id and advance the counter.
    pub fn allocate_track_id(&mut self) -> u32 {
        let id = self.next_track_id;
        self.next_track_id = self.next_track_id.wrapping_add(1);
        id
    }

    pub fn encode(&self) -> Vec<u8> {
        let mvhd = boxes::write_mvhd(TIMESCALE, self.next_track_id);
        let traks: Vec<Vec<u8>> = self.traks.iter().map(Trak::encode).collect();
        let trexs: Vec<Vec<u8>> = self
            .trexs
            .iter()
            .map(|t| boxes::write_trex(t.track_id))
            .collect();

        let trex_refs: Vec<&[u8]> = trexs.iter().map(Vec::as_slice).collect();
        let mvex = boxes::write_container_box(b"mvex", &trex_refs);

        let mut children: Vec<&[u8]> = Vec::with_capacity(traks.len() + 2);
        children.push(mvhd.as_slice());
        children.extend(traks.iter().map(Vec::as_slice));
        children.push(mvex.as_slice());
        boxes::write_container_box(b"moov", &children)
    }
}

/// The pending initialization segment a session owns until it attaches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSegment {
    /// Set by the video negotiation; [`Ftyp::default`] otherwise.
    pub ftyp: Option<Ftyp>,
    pub moov: Moov,
}

impl InitSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `ftyp` followed by `moov`.
    pub fn encode(&self) -> Bytes {
        let ftyp = match &self.ftyp {
            Some(ftyp) => ftyp.encode(),
            None => Ftyp::default().encode(),
        };
        let moov = self.moov.encode();

        let mut out = Vec::with_capacity(ftyp.len() + moov.len());
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&moov);
        Bytes::from(out)
    }
}
