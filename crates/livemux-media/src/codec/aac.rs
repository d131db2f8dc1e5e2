//! MPEG-4 AudioSpecificConfig construction for AAC tracks.

use super::bits::BitWriter;

/// AAC profile as selected by a source's audio object type value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    /// HE-AAC v1 (AAC-LC core plus SBR).
    HeAacV1,
    /// AAC Low Complexity.
    Lc,
    /// HE-AAC v2 (HE-AAC v1 plus parametric stereo).
    HeAacV2,
}

impl AacProfile {
    /// Map the source selector (1, 2, 3) to a profile.
    pub fn from_object_type(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::HeAacV1),
            2 => Some(Self::Lc),
            3 => Some(Self::HeAacV2),
            _ => None,
        }
    }

    /// Object type indication signalled first in the config.
    fn signalled_object_type(self) -> u32 {
        match self {
            Self::Lc => 2,
            Self::HeAacV1 => 5,
            Self::HeAacV2 => 29,
        }
    }
}

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

fn write_frequency(w: &mut BitWriter, rate: u32) {
    match SAMPLING_FREQUENCIES.iter().position(|&f| f == rate) {
        Some(index) => w.write_bits(index as u32, 4),
        None => {
            w.write_bits(0xF, 4);
            w.write_bits(rate, 24);
        }
    }
}

/// Build an AudioSpecificConfig.
///
/// `sample_rate` is the output rate. HE-AAC profiles use explicit
/// hierarchical signalling with the core coder running at half that rate.
pub fn audio_specific_config(profile: AacProfile, sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits(profile.signalled_object_type(), 5);

    let channel_config = match profile {
        // PS decodes a mono core into stereo.
        AacProfile::HeAacV2 => 1,
        _ => u32::from(channels.min(7)),
    };

    match profile {
        AacProfile::Lc => {
            write_frequency(&mut w, sample_rate);
            w.write_bits(channel_config, 4);
        }
        AacProfile::HeAacV1 | AacProfile::HeAacV2 => {
            write_frequency(&mut w, sample_rate / 2);
            w.write_bits(channel_config, 4);
            write_frequency(&mut w, sample_rate);
            w.write_bits(2, 5); // underlying AAC-LC
        }
    }

    // GASpecificConfig: frameLengthFlag, dependsOnCoreCoder, extensionFlag.
    w.write_bits(0, 3);
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bits::BitReader;

    #[test]
    fn object_type_mapping() {
        assert_eq!(AacProfile::from_object_type(1), Some(AacProfile::HeAacV1));
        assert_eq!(AacProfile::from_object_type(2), Some(AacProfile::Lc));
        assert_eq!(AacProfile::from_object_type(3), Some(AacProfile::HeAacV2));
        assert_eq!(AacProfile::from_object_type(0), None);
        assert_eq!(AacProfile::from_object_type(4), None);
    }

    #[test]
    fn lc_stereo_44100() {
        assert_eq!(audio_specific_config(AacProfile::Lc, 44100, 2), vec![0x12, 0x10]);
    }

    #[test]
    fn lc_mono_48000() {
        // 00010 0011 0001 000
        assert_eq!(audio_specific_config(AacProfile::Lc, 48000, 1), vec![0x11, 0x88]);
    }

    #[test]
    fn he_aac_signals_sbr_extension() {
        let asc = audio_specific_config(AacProfile::HeAacV1, 44100, 2);
        let mut r = BitReader::new(&asc);
        assert_eq!(r.read_bits(5), Some(5));
        assert_eq!(r.read_bits(4), Some(7)); // 22050 core
        assert_eq!(r.read_bits(4), Some(2));
        assert_eq!(r.read_bits(4), Some(4)); // 44100 output
        assert_eq!(r.read_bits(5), Some(2));
    }

    #[test]
    fn he_aac_v2_uses_mono_core() {
        let asc = audio_specific_config(AacProfile::HeAacV2, 48000, 2);
        let mut r = BitReader::new(&asc);
        assert_eq!(r.read_bits(5), Some(29));
        assert_eq!(r.read_bits(4), Some(6)); // 24000 core
        assert_eq!(r.read_bits(4), Some(1));
    }

    #[test]
    fn unlisted_rate_uses_escape() {
        let asc = audio_specific_config(AacProfile::Lc, 44000, 2);
        let mut r = BitReader::new(&asc);
        r.read_bits(5);
        assert_eq!(r.read_bits(4), Some(0xF));
        assert_eq!(r.read_bits(24), Some(44000));
    }
}
