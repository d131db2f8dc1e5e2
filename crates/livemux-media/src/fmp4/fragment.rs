//! Movie fragment (moof + mdat) accumulation and serialization.

use bytes::Bytes;
use livemux_common::{Error, Result};

use super::boxes::{self, TrunSample};

/// `trun` sample flags for a sync sample.
pub const SYNC_SAMPLE_FLAGS: u32 = 0x0200_0000;
/// `trun` sample flags for a non-sync sample (depends on others, not sync).
pub const NON_SYNC_SAMPLE_FLAGS: u32 = 0x0101_0000;

/// One sample inside an open fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Decode time relative to the track epoch, in timescale units.
    pub decode_time: u32,
    pub duration: u32,
    pub sync: bool,
    pub data: Bytes,
}

/// Samples of one track sharing one sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    sequence_number: u32,
    track_id: u32,
    samples: Vec<Sample>,
}

impl Fragment {
    pub fn new(sequence_number: u32, track_id: u32) -> Self {
        Self {
            sequence_number,
            track_id,
            samples: Vec::new(),
        }
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append a sample with its full timing and size information.
    pub fn add_full_sample(&mut self, decode_time: u32, duration: u32, data: Bytes, sync: bool) {
        self.samples.push(Sample {
            decode_time,
            duration,
            sync,
            data,
        });
    }

    /// Serialize to `moof` + `mdat`.
    ///
    /// The base media decode time is the first sample's decode time; samples
    /// are expected to be contiguous.
    pub fn encode(&self) -> Result<Bytes> {
        let first = self.samples.first().ok_or_else(|| {
            Error::encode(format!(
                "fragment {} for track {} has no samples",
                self.sequence_number, self.track_id
            ))
        })?;

        let trun_samples = self
            .samples
            .iter()
            .map(|s| {
                let size = u32::try_from(s.data.len())
                    .map_err(|_| Error::encode(format!("sample of {} bytes", s.data.len())))?;
                Ok(TrunSample {
                    duration: s.duration,
                    size,
                    flags: if s.sync {
                        SYNC_SAMPLE_FLAGS
                    } else {
                        NON_SYNC_SAMPLE_FLAGS
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mfhd = boxes::write_mfhd(self.sequence_number);
        let tfhd = boxes::write_tfhd(self.track_id);
        let tfdt = boxes::write_tfdt(first.decode_time as u64);

        // data_offset = moof_size + mdat header size
        let traf_size = 8 + tfhd.len() + tfdt.len() + boxes::trun_size(trun_samples.len());
        let moof_size = 8 + mfhd.len() + traf_size;

        let total_data_size: u64 = self.samples.iter().map(|s| s.data.len() as u64).sum();
        let mdat_hdr_size = boxes::mdat_header_size(total_data_size);

        let data_offset = i32::try_from(moof_size + mdat_hdr_size)
            .map_err(|_| Error::encode("moof too large for trun data offset"))?;

        let trun = boxes::write_trun(&trun_samples, data_offset);
        let traf = boxes::write_container_box(b"traf", &[&tfhd, &tfdt, &trun]);
        let moof = boxes::write_container_box(b"moof", &[&mfhd, &traf]);
        let mdat_hdr = boxes::write_mdat_header(total_data_size);

        let capacity = usize::try_from(moof.len() as u64 + mdat_hdr.len() as u64 + total_data_size)
            .map_err(|_| Error::encode("fragment exceeds addressable memory"))?;
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&moof);
        out.extend_from_slice(&mdat_hdr);
        for sample in &self.samples {
            out.extend_from_slice(&sample.data);
        }
        Ok(Bytes::from(out))
    }
}
