//! Track description negotiation.
//!
//! Turns a discovered track's codec identity and parameters into the static
//! `trak` / `trex` skeleton for the initialization segment, plus the number
//! of source framing bytes to strip from each payload.

use livemux_common::{AudioCodec, AudioTrackInfo, MediaKind, Result, VideoCodec, VideoTrackInfo};

use crate::codec::{aac, h264, hevc};
use crate::fmp4::{Ftyp, SampleEntry, Trak, Trex};

/// Framing bytes preceding H.264 sample data.
pub const H264_PAYLOAD_PREFIX: usize = 5;
/// Framing bytes preceding H.265 sample data.
pub const H265_PAYLOAD_PREFIX: usize = 8;
/// Framing bytes preceding AV1 sample data.
pub const AV1_PAYLOAD_PREFIX: usize = 5;

/// Result of negotiating one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedTrack {
    pub trak: Trak,
    pub trex: Trex,
    /// Bytes to strip from the front of every payload of this track.
    pub payload_prefix: usize,
    /// Brands the track requires, if it decides them.
    pub ftyp: Option<Ftyp>,
}

impl NegotiatedTrack {
    fn new(trak: Trak, payload_prefix: usize, ftyp: Option<Ftyp>) -> Self {
        Self {
            trex: Trex {
                track_id: trak.track_id,
            },
            trak,
            payload_prefix,
            ftyp,
        }
    }
}

/// Build the description for a video track using `track_id`.
///
/// Fails with `InvalidParameters` when fewer parameter sets than the codec
/// needs are present.
pub fn negotiate_video(track_id: u32, info: &VideoTrackInfo) -> Result<NegotiatedTrack> {
    info.validate()?;

    let mut trak = Trak::empty(track_id, MediaKind::Video);
    let sets = &info.parameter_sets;

    let (prefix, brand) = match &info.codec {
        VideoCodec::H264 => {
            let (sps, pps) = (&sets[0], &sets[1]);
            let parsed = h264::parse_sps(sps);
            let (width, height) = match &parsed {
                Some(p) => (p.width, p.height),
                None => {
                    tracing::warn!(track_id, "Unparseable H.264 SPS, dimensions unknown");
                    (0, 0)
                }
            };
            trak.width = width;
            trak.height = height;
            match h264::decoder_configuration(sps, pps, parsed.as_ref()) {
                Some(avcc) => {
                    trak.sample_entry = Some(SampleEntry::Avc1 {
                        width,
                        height,
                        avcc,
                    })
                }
                None => tracing::warn!(
                    track_id,
                    "H.264 parameter set too large for avcC, sample description left empty"
                ),
            }
            (H264_PAYLOAD_PREFIX, *b"avc1")
        }
        VideoCodec::H265 => {
            let (vps, sps, pps) = (&sets[0], &sets[1], &sets[2]);
            match hevc::parse_sps(sps) {
                Some(parsed) => {
                    trak.width = parsed.width;
                    trak.height = parsed.height;
                    match hevc::decoder_configuration(vps, sps, pps, &parsed) {
                        Some(hvcc) => {
                            trak.sample_entry = Some(SampleEntry::Hvc1 {
                                width: parsed.width,
                                height: parsed.height,
                                hvcc,
                            })
                        }
                        None => tracing::warn!(
                            track_id,
                            "H.265 parameter set too large for hvcC, sample description left empty"
                        ),
                    }
                }
                None => {
                    tracing::warn!(
                        track_id,
                        "Unparseable H.265 SPS, sample description left empty"
                    );
                }
            }
            (H265_PAYLOAD_PREFIX, *b"hvc1")
        }
        VideoCodec::Av1 => {
            tracing::warn!(track_id, "AV1 has no sample description, stsd left empty");
            (AV1_PAYLOAD_PREFIX, *b"av01")
        }
        VideoCodec::Other(name) => {
            tracing::warn!(track_id, codec = %name, "Unsupported video codec, stsd left empty");
            return Ok(NegotiatedTrack::new(trak, 0, None));
        }
    };

    tracing::debug!(track_id, codec = %info.codec, width = trak.width, height = trak.height, "Negotiated video track");
    Ok(NegotiatedTrack::new(trak, prefix, Some(Ftyp::for_codec_brand(brand))))
}

/// Build the description for an audio track using `track_id`.
pub fn negotiate_audio(track_id: u32, info: &AudioTrackInfo) -> Result<NegotiatedTrack> {
    let mut trak = Trak::empty(track_id, MediaKind::Audio);

    match &info.codec {
        AudioCodec::Aac => match aac::AacProfile::from_object_type(info.audio_object_type) {
            Some(profile) => {
                trak.sample_entry = Some(SampleEntry::Mp4a {
                    channels: info.channels,
                    sample_rate: info.sample_rate,
                    audio_specific_config: aac::audio_specific_config(
                        profile,
                        info.sample_rate,
                        info.channels,
                    ),
                });
            }
            None => {
                tracing::warn!(
                    track_id,
                    audio_object_type = info.audio_object_type,
                    "Unsupported AAC object type, stsd left empty"
                );
            }
        },
        AudioCodec::Pcma | AudioCodec::Pcmu => {
            let fourcc = if info.codec == AudioCodec::Pcma {
                *b"pcma"
            } else {
                *b"pcmu"
            };
            trak.sample_entry = Some(SampleEntry::Audio {
                fourcc,
                channels: info.channels,
                sample_size: info.sample_size,
                sample_rate: info.sample_rate,
            });
        }
        AudioCodec::Other(name) => {
            tracing::warn!(track_id, codec = %name, "Unsupported audio codec, stsd left empty");
        }
    }

    tracing::debug!(track_id, codec = %info.codec, sample_rate = info.sample_rate, "Negotiated audio track");
    Ok(NegotiatedTrack::new(trak, 0, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use livemux_common::Error;

    fn h264_info() -> VideoTrackInfo {
        VideoTrackInfo::new(
            VideoCodec::H264,
            vec![
                Bytes::from(crate::codec::h264::tests::baseline_sps(80, 45, 0)),
                Bytes::from_static(&[0x68, 0xCE, 0x3C, 0x80]),
            ],
        )
    }

    #[test]
    fn h264_builds_avc1_with_dimensions() {
        let negotiated = negotiate_video(1, &h264_info()).unwrap();
        assert_eq!(negotiated.payload_prefix, 5);
        assert_eq!(negotiated.trex.track_id, 1);
        assert_eq!(negotiated.trak.width, 1280);
        assert_eq!(negotiated.trak.height, 720);
        let ftyp = negotiated.ftyp.unwrap();
        assert_eq!(
            ftyp.compatible_brands,
            vec![*b"isom", *b"iso2", *b"avc1", *b"mp41"]
        );
        assert!(matches!(
            negotiated.trak.sample_entry,
            Some(SampleEntry::Avc1 { width: 1280, .. })
        ));
    }

    #[test]
    fn oversized_pps_leaves_stsd_empty() {
        let info = VideoTrackInfo::new(
            VideoCodec::H264,
            vec![
                Bytes::from(crate::codec::h264::tests::baseline_sps(80, 45, 0)),
                Bytes::from(vec![0x68; 70_000]),
            ],
        );
        let negotiated = negotiate_video(1, &info).unwrap();
        assert_eq!(negotiated.trak.width, 1280);
        assert!(negotiated.trak.sample_entry.is_none());
    }

    #[test]
    fn h264_with_one_parameter_set_is_rejected() {
        let info = VideoTrackInfo::new(VideoCodec::H264, vec![Bytes::from_static(&[0x67])]);
        let err = negotiate_video(1, &info).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters { need: 2, have: 1, .. }));
    }

    #[test]
    fn h265_builds_hvc1() {
        let info = VideoTrackInfo::new(
            VideoCodec::H265,
            vec![
                Bytes::from_static(&[0x40, 0x01, 0x0C]),
                Bytes::from(crate::codec::hevc::tests::main_sps(1920, 1080, 0)),
                Bytes::from_static(&[0x44, 0x01, 0xC1]),
            ],
        );
        let negotiated = negotiate_video(3, &info).unwrap();
        assert_eq!(negotiated.payload_prefix, 8);
        assert_eq!(negotiated.ftyp.unwrap().compatible_brands[2], *b"hvc1");
        assert_eq!(negotiated.trak.sample_entry.unwrap().fourcc(), *b"hvc1");
    }

    #[test]
    fn av1_sets_brand_without_sample_entry() {
        let info = VideoTrackInfo::new(VideoCodec::Av1, vec![]);
        let negotiated = negotiate_video(1, &info).unwrap();
        assert_eq!(negotiated.payload_prefix, 5);
        assert!(negotiated.trak.sample_entry.is_none());
        assert_eq!(negotiated.ftyp.unwrap().compatible_brands[2], *b"av01");
    }

    #[test]
    fn aac_object_types() {
        for (aot, expect_entry) in [(1, true), (2, true), (3, true), (4, false), (0, false)] {
            let info = AudioTrackInfo::aac(aot, 44100, 2);
            let negotiated = negotiate_audio(2, &info).unwrap();
            assert_eq!(negotiated.trak.sample_entry.is_some(), expect_entry, "aot {aot}");
            assert_eq!(negotiated.payload_prefix, 0);
            assert!(negotiated.ftyp.is_none());
        }
    }

    #[test]
    fn g711_uses_generic_sample_entry() {
        let info = AudioTrackInfo::g711(AudioCodec::Pcma, 8000, 1);
        let negotiated = negotiate_audio(1, &info).unwrap();
        assert_eq!(
            negotiated.trak.sample_entry,
            Some(SampleEntry::Audio {
                fourcc: *b"pcma",
                channels: 1,
                sample_size: 8,
                sample_rate: 8000,
            })
        );
    }
}
