// crates/velocut-media/src/audio.rs
//
// Audio composition: one chunk per active audio track in, one chunk out.
//
// Mixing is plain sample-wise saturating addition in i16 — no gain, no
// normalisation. Per-track gain is the producer's job.
//
// Fast paths:
//   - every input silent  → deferred silence (nothing allocated)
//   - exactly one audible → that chunk is handed straight through. The
//     mixer owns its inputs, so this is a move, never an alias of a buffer
//     a track still holds.

use velocut_core::media_types::{Chunk, Pts, Sample, SampleChunk};

/// Mixes the per-track chunks of one time step.
#[derive(Clone, Copy, Debug)]
pub struct AudioMixer {
    chunk_size: usize,
    channels:   u16,
}

impl AudioMixer {
    /// `chunk_size` counts interleaved samples across all `channels`.
    pub fn new(chunk_size: usize, channels: u16) -> Self {
        assert!(channels > 0, "AudioMixer::new — channels must be > 0");
        assert_eq!(
            chunk_size % channels as usize,
            0,
            "AudioMixer::new — chunk size {chunk_size} is not a multiple of {channels} channels",
        );
        Self { chunk_size, channels }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Mix `inputs` into a single chunk stamped with `pts`.
    ///
    /// Every audible input must have exactly `chunk_size` unread samples and
    /// the mixer's channel count. A mismatch means the caller assembled the
    /// wrong chunks and panics rather than truncating or padding.
    pub fn generate(&self, inputs: Vec<Chunk>, pts: Pts) -> Chunk {
        let mut audible: Vec<SampleChunk> = inputs
            .into_iter()
            .filter_map(|c| match c {
                Chunk::Empty { .. } => None,
                Chunk::Filled(s) => Some(s),
            })
            .collect();

        for c in &audible {
            self.check_input(c);
        }

        match audible.len() {
            0 => Chunk::empty(self.channels, self.chunk_size, pts),
            1 => {
                let mut only = audible.remove(0);
                only.set_pts(pts);
                Chunk::Filled(only)
            }
            n => {
                log::trace!("[mixer] mixing {n} chunks at pts {pts}");
                let mut out: Vec<Sample> = vec![0; self.chunk_size];
                for mut input in audible {
                    for (o, &s) in out.iter_mut().zip(input.unread_samples()) {
                        *o = o.saturating_add(s);
                    }
                    input.consume(self.chunk_size);
                }
                Chunk::Filled(SampleChunk::new(self.channels, out, pts))
            }
        }
    }

    fn check_input(&self, c: &SampleChunk) {
        assert_eq!(
            c.unread(),
            self.chunk_size,
            "AudioMixer::generate — input at pts {} has {} unread samples, expected {}",
            c.pts(),
            c.unread(),
            self.chunk_size,
        );
        assert_eq!(
            c.channels(),
            self.channels,
            "AudioMixer::generate — input at pts {} has {} channels, expected {}",
            c.pts(),
            c.channels(),
            self.channels,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velocut_core::media_types::{MAX_SAMPLE, MIN_SAMPLE};

    fn filled(samples: &[i16]) -> Chunk {
        SampleChunk::new(2, samples.to_vec(), 0).into()
    }

    fn samples(c: Chunk) -> Vec<i16> {
        c.materialize().unread_samples().to_vec()
    }

    #[test]
    fn saturates_at_both_bounds() {
        let mixer = AudioMixer::new(4, 2);
        let out = mixer.generate(
            vec![filled(&[30000, -30000, 0, 1]), filled(&[10000, -10000, 0, 1])],
            5,
        );
        assert_eq!(out.pts(), 5);
        assert_eq!(samples(out), vec![MAX_SAMPLE, MIN_SAMPLE, 0, 2]);
    }

    #[test]
    fn three_way_mix_accumulates_and_clamps() {
        let mixer = AudioMixer::new(2, 1);
        let c = |v: [i16; 2]| -> Chunk { SampleChunk::new(1, v.to_vec(), 0).into() };
        let out = mixer.generate(vec![c([100, 20000]), c([200, 10000]), c([-50, 5000])], 0);
        assert_eq!(samples(out), vec![250, MAX_SAMPLE]);
    }

    #[test]
    fn no_inputs_yields_deferred_silence() {
        let mixer = AudioMixer::new(8, 2);
        let out = mixer.generate(Vec::new(), 3);
        assert!(out.is_empty());
        assert_eq!(out.pts(), 3);
        assert_eq!(samples(out), vec![0; 8]);
    }

    #[test]
    fn silent_inputs_are_filtered_out() {
        let mixer = AudioMixer::new(4, 2);
        let out = mixer.generate(vec![Chunk::empty(2, 4, 0), Chunk::empty(2, 4, 0)], 1);
        assert!(out.is_empty());
    }

    #[test]
    fn single_audible_input_passes_through() {
        let mixer = AudioMixer::new(4, 2);
        let out = mixer.generate(vec![Chunk::empty(2, 4, 0), filled(&[1, 2, 3, 4])], 9);
        assert_eq!(out.pts(), 9);
        assert_eq!(samples(out), vec![1, 2, 3, 4]);
    }

    #[test]
    fn partially_read_inputs_mix_from_cursor() {
        let mixer = AudioMixer::new(2, 2);
        let mut a = SampleChunk::new(2, vec![9, 9, 1, 1], 0);
        a.consume(2);
        let out = mixer.generate(vec![a.into(), filled(&[5, 6])], 0);
        assert_eq!(samples(out), vec![6, 7]);
    }

    #[test]
    #[should_panic(expected = "expected 4")]
    fn mismatched_size_panics() {
        let mixer = AudioMixer::new(4, 2);
        mixer.generate(vec![filled(&[1, 2, 3, 4]), filled(&[1, 2])], 0);
    }

    #[test]
    #[should_panic(expected = "unread samples")]
    fn mismatched_single_input_panics() {
        let mixer = AudioMixer::new(4, 2);
        mixer.generate(vec![filled(&[1, 2])], 0);
    }
}
