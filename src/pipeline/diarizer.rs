use crate::audio::AudioSource;
use crate::pipeline::{CancelToken, DiarizationError, SpeakerDiarizer};
use crate::transcript::{SpeakerTurn, TranscriptSegment, UNKNOWN_SPEAKER};
use sortformer_rs::sortformer::Sortformer;
use std::path::Path;
use std::sync::Mutex;

const DIAR_CHUNK_SECS: usize = 600; // 10 minutes per chunk
const DIAR_OVERLAP_SECS: usize = 30; // 30 second overlap

/// Turns closer than this with the same speaker are merged.
const MERGE_GAP_MS: u64 = 500;

/// Speaker diarizer backed by the Sortformer model.
///
/// The model handle is process-scoped and reused across runs; inference
/// needs exclusive access, hence the mutex.
pub struct SortformerDiarizer {
    model: Mutex<Sortformer>,
}

impl SortformerDiarizer {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, DiarizationError> {
        let sortformer = Sortformer::new(model_path.as_ref()).map_err(|e| {
            DiarizationError::Model(format!("Failed to load Sortformer model: {}", e))
        })?;

        Ok(Self {
            model: Mutex::new(sortformer),
        })
    }

    fn diarize_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
        offset_ms: u64,
    ) -> Result<Vec<SpeakerTurn>, DiarizationError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| DiarizationError::Model("diarization model lock poisoned".to_string()))?;

        let segments = model
            .diarize(samples.to_vec(), sample_rate, 1)
            .map_err(|e| DiarizationError::Model(format!("Diarization failed: {}", e)))?;

        Ok(segments
            .iter()
            .map(|seg| SpeakerTurn {
                speaker: speaker_label(seg.speaker_id),
                start_ms: (seg.start as f64 * 1000.0) as u64 + offset_ms,
                end_ms: (seg.end as f64 * 1000.0) as u64 + offset_ms,
            })
            .collect())
    }
}

impl SpeakerDiarizer for SortformerDiarizer {
    fn diarize(
        &self,
        audio: &AudioSource,
        cancel: &CancelToken,
    ) -> Result<Vec<SpeakerTurn>, DiarizationError> {
        let samples = audio.samples();
        let sample_rate = audio.sample_rate();
        let chunk_samples = DIAR_CHUNK_SECS * sample_rate as usize;
        let overlap_samples = DIAR_OVERLAP_SECS * sample_rate as usize;

        if cancel.is_cancelled() {
            return Err(DiarizationError::Cancelled);
        }

        if samples.len() <= chunk_samples {
            let mut turns = self.diarize_chunk(samples, sample_rate, 0)?;
            merge_adjacent_turns(&mut turns);
            return Ok(turns);
        }

        let mut all_turns = Vec::new();
        let mut chunk_start = 0usize;
        let total_samples = samples.len();

        while chunk_start < total_samples {
            if cancel.is_cancelled() {
                return Err(DiarizationError::Cancelled);
            }

            let chunk_end = (chunk_start + chunk_samples).min(total_samples);
            let offset_ms = (chunk_start as f64 / sample_rate as f64 * 1000.0) as u64;

            tracing::debug!(
                from_secs = chunk_start / sample_rate as usize,
                to_secs = chunk_end / sample_rate as usize,
                "diarizing chunk"
            );

            let turns = self.diarize_chunk(&samples[chunk_start..chunk_end], sample_rate, offset_ms)?;

            for turn in turns {
                // Skip turns entirely inside the overlap region already
                // covered by the previous chunk.
                if chunk_start > 0 {
                    let overlap_boundary_ms = offset_ms + (DIAR_OVERLAP_SECS as u64 * 1000);
                    if turn.end_ms <= overlap_boundary_ms {
                        continue;
                    }
                }
                all_turns.push(turn);
            }

            chunk_start = chunk_end - overlap_samples;
            if chunk_start >= total_samples - overlap_samples {
                break;
            }
        }

        merge_adjacent_turns(&mut all_turns);
        Ok(all_turns)
    }
}

/// Format an opaque per-run speaker label. Labels are not stable across
/// runs.
pub fn speaker_label(speaker_id: usize) -> String {
    format!("SPEAKER_{:02}", speaker_id)
}

/// Sort turns by start time and merge same-speaker turns separated by less
/// than `MERGE_GAP_MS`. Turns of different speakers are left alone even when
/// they overlap.
pub fn merge_adjacent_turns(turns: &mut Vec<SpeakerTurn>) {
    if turns.len() < 2 {
        return;
    }

    turns.sort_by_key(|t| (t.start_ms, t.end_ms));

    let mut merged: Vec<SpeakerTurn> = Vec::with_capacity(turns.len());
    for turn in turns.drain(..) {
        match merged.last_mut() {
            Some(last)
                if last.speaker == turn.speaker
                    && turn.start_ms <= last.end_ms + MERGE_GAP_MS =>
            {
                last.end_ms = last.end_ms.max(turn.end_ms);
            }
            _ => merged.push(turn),
        }
    }

    *turns = merged;
}

/// Overlap-resolution: assign each segment the label of the turn with the
/// strictly greatest temporal overlap.
///
/// Turns are iterated in start-time order and a candidate only replaces the
/// current best on strictly greater overlap, so equal-overlap ties go to the
/// earlier-starting turn. A segment no turn overlaps keeps the
/// `UNKNOWN_SPEAKER` sentinel. Turns may overlap each other; no disjointness
/// is assumed.
pub fn assign_speakers(segments: &mut [TranscriptSegment], turns: &[SpeakerTurn]) {
    let mut ordered: Vec<&SpeakerTurn> = turns.iter().collect();
    ordered.sort_by_key(|t| (t.start_ms, t.end_ms));

    for segment in segments.iter_mut() {
        let mut best: Option<&str> = None;
        let mut best_overlap = 0u64;

        for turn in &ordered {
            let overlap = overlap_ms(
                segment.start_ms,
                segment.end_ms,
                turn.start_ms,
                turn.end_ms,
            );
            if overlap > best_overlap {
                best_overlap = overlap;
                best = Some(turn.speaker.as_str());
            }
        }

        segment.speaker = best.unwrap_or(UNKNOWN_SPEAKER).to_string();
    }
}

fn overlap_ms(a_start: u64, a_end: u64, b_start: u64, b_end: u64) -> u64 {
    a_end.min(b_end).saturating_sub(a_start.max(b_start))
}
