//! H.264 Sequence Parameter Set parsing and `avcC` record construction.

use super::bits::{remove_emulation_prevention, BitReader};

/// The subset of an H.264 SPS needed for the sample description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcSps {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    /// Cropped picture width in pixels.
    pub width: u32,
    /// Cropped picture height in pixels.
    pub height: u32,
}

/// Profiles whose SPS carries chroma format and bit depth fields.
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// Parse an SPS NAL unit (including its one-byte NAL header).
pub fn parse_sps(data: &[u8]) -> Option<AvcSps> {
    if data.len() < 4 {
        return None;
    }

    let rbsp = remove_emulation_prevention(data);
    let mut reader = BitReader::new(&rbsp[1..]);

    let profile_idc = reader.read_bits(8)? as u8;
    let constraint_flags = reader.read_bits(8)? as u8;
    let level_idc = reader.read_bits(8)? as u8;

    // seq_parameter_set_id
    reader.read_ue()?;

    let mut chroma_format_idc = 1;
    let mut bit_depth_luma = 8;
    let mut bit_depth_chroma = 8;
    let mut separate_colour_plane = false;

    if is_high_profile(profile_idc) {
        chroma_format_idc = reader.read_ue()?;
        if chroma_format_idc == 3 {
            separate_colour_plane = reader.read_flag()?;
        }
        bit_depth_luma = read_bit_depth(&mut reader)?;
        bit_depth_chroma = read_bit_depth(&mut reader)?;
        // qpprime_y_zero_transform_bypass_flag
        reader.read_bits(1)?;
        if reader.read_flag()? {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if reader.read_flag()? {
                    skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    // log2_max_frame_num_minus4
    reader.read_ue()?;

    let pic_order_cnt_type = reader.read_ue()?;
    if pic_order_cnt_type == 0 {
        // log2_max_pic_order_cnt_lsb_minus4
        reader.read_ue()?;
    } else if pic_order_cnt_type == 1 {
        reader.read_bits(1)?; // delta_pic_order_always_zero_flag
        reader.read_se()?; // offset_for_non_ref_pic
        reader.read_se()?; // offset_for_top_to_bottom_field
        let cycle = reader.read_ue()?;
        for _ in 0..cycle {
            reader.read_se()?;
        }
    }

    // max_num_ref_frames
    reader.read_ue()?;
    // gaps_in_frame_num_value_allowed_flag
    reader.read_bits(1)?;

    let pic_width_in_mbs = reader.read_ue()?.checked_add(1)?;
    let pic_height_in_map_units = reader.read_ue()?.checked_add(1)?;
    let frame_mbs_only = reader.read_flag()?;
    if !frame_mbs_only {
        // mb_adaptive_frame_field_flag
        reader.read_bits(1)?;
    }
    // direct_8x8_inference_flag
    reader.read_bits(1)?;

    let field_factor: u32 = if frame_mbs_only { 1 } else { 2 };
    let mut width = pic_width_in_mbs.checked_mul(16)?;
    let mut height = pic_height_in_map_units.checked_mul(16 * field_factor)?;

    if reader.read_flag()? {
        let left = reader.read_ue()?;
        let right = reader.read_ue()?;
        let top = reader.read_ue()?;
        let bottom = reader.read_ue()?;

        let (crop_x, crop_y) = match (chroma_format_idc, separate_colour_plane) {
            (0, _) | (3, true) => (1, field_factor),
            (1, _) => (2, 2 * field_factor),
            (2, _) => (2, field_factor),
            _ => (1, field_factor),
        };
        width = width.saturating_sub(left.checked_add(right)?.checked_mul(crop_x)?);
        height = height.saturating_sub(top.checked_add(bottom)?.checked_mul(crop_y)?);
    }

    Some(AvcSps {
        profile_idc,
        constraint_flags,
        level_idc,
        chroma_format_idc,
        bit_depth_luma,
        bit_depth_chroma,
        width,
        height,
    })
}

/// `bit_depth_*_minus8` as a bit depth; `None` when out of range.
fn read_bit_depth(reader: &mut BitReader) -> Option<u8> {
    reader.read_ue()?.checked_add(8).and_then(|v| u8::try_from(v).ok())
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Option<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = reader.read_se()?;
            next_scale = (last_scale + delta.rem_euclid(256)) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Some(())
}

/// Build the AVCDecoderConfigurationRecord (`avcC` payload) for one SPS and
/// one PPS, with 4-byte NAL length fields.
///
/// Profile, compatibility and level are copied from the SPS header bytes; the
/// high-profile extension is appended when `parsed` identifies such a profile.
/// `None` when a parameter set does not fit the 16-bit length field.
pub fn decoder_configuration(
    sps: &[u8],
    pps: &[u8],
    parsed: Option<&AvcSps>,
) -> Option<Vec<u8>> {
    let sps_len = u16::try_from(sps.len()).ok()?;
    let pps_len = u16::try_from(pps.len()).ok()?;

    let mut record = Vec::with_capacity(11 + sps.len() + pps.len() + 4);
    record.push(1); // configurationVersion
    record.push(*sps.get(1).unwrap_or(&0)); // AVCProfileIndication
    record.push(*sps.get(2).unwrap_or(&0)); // profile_compatibility
    record.push(*sps.get(3).unwrap_or(&0)); // AVCLevelIndication
    record.push(0xFC | 3); // lengthSizeMinusOne = 3
    record.push(0xE0 | 1); // numOfSequenceParameterSets = 1
    record.extend_from_slice(&sps_len.to_be_bytes());
    record.extend_from_slice(sps);
    record.push(1); // numOfPictureParameterSets
    record.extend_from_slice(&pps_len.to_be_bytes());
    record.extend_from_slice(pps);

    if let Some(sps) = parsed.filter(|s| is_high_profile(s.profile_idc)) {
        record.push(0xFC | (sps.chroma_format_idc as u8 & 0x03));
        record.push(0xF8 | (sps.bit_depth_luma.saturating_sub(8) & 0x07));
        record.push(0xF8 | (sps.bit_depth_chroma.saturating_sub(8) & 0x07));
        record.push(0); // numOfSequenceParameterSetExt
    }

    Some(record)
}
