//! HEVC Sequence Parameter Set parsing and `hvcC` record construction.

use super::bits::{remove_emulation_prevention, BitReader};

/// NAL unit types carried in the `hvcC` arrays.
pub const NAL_VPS: u8 = 32;
pub const NAL_SPS: u8 = 33;
pub const NAL_PPS: u8 = 34;

/// Fields of an HEVC SPS needed for the sample description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcSps {
    pub max_sub_layers: u8,
    pub temporal_id_nesting: bool,
    /// profile_space (2) | tier_flag (1) | profile_idc (5).
    pub profile_byte: u8,
    pub profile_compatibility: u32,
    /// 48 bits of general constraint indicator flags.
    pub constraint_flags: u64,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    /// Picture width after the conformance window.
    pub width: u32,
    /// Picture height after the conformance window.
    pub height: u32,
}

/// Parse SPS NAL unit (including its two-byte NAL header).
pub fn parse_sps(data: &[u8]) -> Option<HevcSps> {
    if data.len() < 3 {
        return None;
    }

    let rbsp = remove_emulation_prevention(data);
    let mut reader = BitReader::new(&rbsp[2..]);

    // sps_video_parameter_set_id
    reader.read_bits(4)?;
    let max_sub_layers_minus1 = reader.read_bits(3)? as u8;
    let temporal_id_nesting = reader.read_flag()?;

    let profile_byte = reader.read_bits(8)? as u8;
    let profile_compatibility = reader.read_bits(32)?;
    let constraint_hi = reader.read_bits(16)? as u64;
    let constraint_lo = reader.read_bits(32)? as u64;
    let level_idc = reader.read_bits(8)? as u8;
    skip_sub_layers(&mut reader, max_sub_layers_minus1)?;

    // sps_seq_parameter_set_id
    reader.read_ue()?;

    let chroma_format_idc = reader.read_ue()?;
    if chroma_format_idc == 3 {
        // separate_colour_plane_flag
        reader.read_bits(1)?;
    }

    let mut width = reader.read_ue()?;
    let mut height = reader.read_ue()?;

    if reader.read_flag()? {
        let left = reader.read_ue()?;
        let right = reader.read_ue()?;
        let top = reader.read_ue()?;
        let bottom = reader.read_ue()?;
        let (sub_width, sub_height) = match chroma_format_idc {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        };
        width = width.saturating_sub(left.checked_add(right)?.checked_mul(sub_width)?);
        height = height.saturating_sub(top.checked_add(bottom)?.checked_mul(sub_height)?);
    }

    let bit_depth_luma = read_bit_depth(&mut reader)?;
    let bit_depth_chroma = read_bit_depth(&mut reader)?;

    Some(HevcSps {
        max_sub_layers: max_sub_layers_minus1 + 1,
        temporal_id_nesting,
        profile_byte,
        profile_compatibility,
        constraint_flags: (constraint_hi << 32) | constraint_lo,
        level_idc,
        chroma_format_idc,
        bit_depth_luma,
        bit_depth_chroma,
        width,
        height,
    })
}

fn read_bit_depth(reader: &mut BitReader) -> Option<u8> {
    reader.read_ue()?.checked_add(8).and_then(|v| u8::try_from(v).ok())
}

/// Skip the sub-layer part of profile_tier_level.
fn skip_sub_layers(reader: &mut BitReader, max_sub_layers_minus1: u8) -> Option<()> {
    let mut sub_layer_profile_present = vec![false; max_sub_layers_minus1 as usize];
    let mut sub_layer_level_present = vec![false; max_sub_layers_minus1 as usize];

    for i in 0..max_sub_layers_minus1 as usize {
        sub_layer_profile_present[i] = reader.read_flag()?;
        sub_layer_level_present[i] = reader.read_flag()?;
    }

    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            reader.read_bits(2)?; // reserved_zero_2bits
        }
    }

    for i in 0..max_sub_layers_minus1 as usize {
        if sub_layer_profile_present[i] {
            reader.read_bits(8)?;
            reader.read_bits(32)?;
            reader.read_bits(32)?;
            reader.read_bits(16)?;
        }
        if sub_layer_level_present[i] {
            reader.read_bits(8)?; // sub_layer_level_idc
        }
    }

    Some(())
}

/// Build the HEVCDecoderConfigurationRecord (`hvcC` payload) with one VPS,
/// SPS and PPS, each in its own complete array, and 4-byte NAL lengths.
/// `None` when a parameter set does not fit the 16-bit length field.
pub fn decoder_configuration(
    vps: &[u8],
    sps: &[u8],
    pps: &[u8],
    parsed: &HevcSps,
) -> Option<Vec<u8>> {
    let mut record = Vec::with_capacity(23 + 3 * 5 + vps.len() + sps.len() + pps.len());
    record.push(1); // configurationVersion
    record.push(parsed.profile_byte);
    record.extend_from_slice(&parsed.profile_compatibility.to_be_bytes());
    record.extend_from_slice(&parsed.constraint_flags.to_be_bytes()[2..]);
    record.push(parsed.level_idc);
    record.extend_from_slice(&0xF000u16.to_be_bytes()); // min_spatial_segmentation_idc = 0
    record.push(0xFC); // parallelismType = 0
    record.push(0xFC | (parsed.chroma_format_idc as u8 & 0x03));
    record.push(0xF8 | (parsed.bit_depth_luma.saturating_sub(8) & 0x07));
    record.push(0xF8 | (parsed.bit_depth_chroma.saturating_sub(8) & 0x07));
    record.extend_from_slice(&0u16.to_be_bytes()); // avgFrameRate
    record.push(
        ((parsed.max_sub_layers & 0x07) << 3) | ((parsed.temporal_id_nesting as u8) << 2) | 0x03,
    );
    record.push(3); // numOfArrays

    for (nal_type, nal) in [(NAL_VPS, vps), (NAL_SPS, sps), (NAL_PPS, pps)] {
        record.push(0x80 | nal_type); // array_completeness = 1
        record.extend_from_slice(&1u16.to_be_bytes());
        let len = u16::try_from(nal.len()).ok()?;
        record.extend_from_slice(&len.to_be_bytes());
        record.extend_from_slice(nal);
    }

    Some(record)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::bits::BitWriter;

    /// Main-profile SPS with the given luma dimensions and bottom window.
    pub(crate) fn main_sps(width: u32, height: u32, crop_bottom: u32) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_bits(0x4201, 16); // NAL header, type 33
        w.write_bits(0, 4); // vps id
        w.write_bits(0, 3); // max_sub_layers_minus1
        w.write_bits(1, 1); // temporal_id_nesting
        w.write_bits(0x01, 8); // Main profile
        w.write_bits(0x6000_0000, 32);
        w.write_bits(0x9000, 16);
        w.write_bits(0, 32);
        w.write_bits(93, 8); // level 3.1
        w.write_ue(0); // sps id
        w.write_ue(1); // 4:2:0
        w.write_ue(width);
        w.write_ue(height);
        if crop_bottom > 0 {
            w.write_bits(1, 1);
            w.write_ue(0);
            w.write_ue(0);
            w.write_ue(0);
            w.write_ue(crop_bottom);
        } else {
            w.write_bits(0, 1);
        }
        w.write_ue(0); // bit_depth_luma_minus8
        w.write_ue(0); // bit_depth_chroma_minus8
        w.write_bits(1, 1);
        w.into_bytes()
    }

    #[test]
    fn parses_main_profile_sps() {
        let sps = parse_sps(&main_sps(1280, 720, 0)).unwrap();
        assert_eq!(sps.width, 1280);
        assert_eq!(sps.height, 720);
        assert_eq!(sps.profile_byte, 0x01);
        assert_eq!(sps.profile_compatibility, 0x6000_0000);
        assert_eq!(sps.constraint_flags, 0x9000_0000_0000);
        assert_eq!(sps.level_idc, 93);
        assert_eq!(sps.max_sub_layers, 1);
        assert!(sps.temporal_id_nesting);
        assert_eq!(sps.bit_depth_luma, 8);
    }

    #[test]
    fn conformance_window_crops() {
        let sps = parse_sps(&main_sps(1920, 1088, 4)).unwrap();
        assert_eq!(sps.width, 1920);
        assert_eq!(sps.height, 1080);
    }

    #[test]
    fn out_of_range_bit_depth_is_rejected() {
        let valid = main_sps(1280, 720, 0);
        // Header and profile_tier_level are byte aligned up to the sps id.
        let mut w = BitWriter::new();
        for &byte in &valid[..15] {
            w.write_bits(byte as u32, 8);
        }
        w.write_ue(0); // sps id
        w.write_ue(1);
        w.write_ue(1280);
        w.write_ue(720);
        w.write_bits(0, 1);
        // bit_depth_luma_minus8 = 2^32 - 2
        w.write_bits(0, 31);
        w.write_bits(1, 1);
        w.write_bits(0x7FFF_FFFF, 31);
        w.write_ue(0);
        w.write_bits(1, 1);
        assert!(parse_sps(&w.into_bytes()).is_none());
    }

    #[test]
    fn hvcc_record_has_three_arrays() {
        let raw = main_sps(1280, 720, 0);
        let parsed = parse_sps(&raw).unwrap();
        let vps = [0x40, 0x01, 0x0C];
        let pps = [0x44, 0x01, 0xC1];
        let record = decoder_configuration(&vps, &raw, &pps, &parsed).unwrap();

        assert_eq!(record[0], 1);
        assert_eq!(record[1], 0x01);
        assert_eq!(record[12], 93);
        assert_eq!(record[21] & 0x03, 3); // lengthSizeMinusOne
        assert_eq!(record[22], 3);

        let mut pos = 23;
        for (nal_type, nal) in [(NAL_VPS, &vps[..]), (NAL_SPS, &raw[..]), (NAL_PPS, &pps[..])] {
            assert_eq!(record[pos], 0x80 | nal_type);
            assert_eq!(u16::from_be_bytes([record[pos + 1], record[pos + 2]]), 1);
            let len = u16::from_be_bytes([record[pos + 3], record[pos + 4]]) as usize;
            assert_eq!(&record[pos + 5..pos + 5 + len], nal);
            pos += 5 + len;
        }
        assert_eq!(pos, record.len());
    }

    #[test]
    fn oversized_parameter_set_has_no_record() {
        let raw = main_sps(1280, 720, 0);
        let parsed = parse_sps(&raw).unwrap();
        let pps = vec![0x44; usize::from(u16::MAX) + 1];
        assert!(decoder_configuration(&[0x40, 0x01], &raw, &pps, &parsed).is_none());
    }
}
