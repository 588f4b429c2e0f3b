use crate::audio::AudioSource;
use crate::pipeline::{AlignmentError, CancelToken, WordAligner};
use crate::transcript::{TranscriptSegment, WordTiming};
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext};

/// Word-level aligner backed by the same whisper context as the recognizer.
///
/// Each segment's audio window is re-decoded with token timestamps and a
/// one-token maximum segment length, which makes whisper emit one
/// sub-word piece per output segment; pieces are then folded back into
/// whitespace-delimited words. Alignment is an enhancement: any per-segment
/// failure leaves that segment's word timings empty and the run continues.
pub struct WhisperAligner {
    ctx: Arc<WhisperContext>,
    threads: Option<i32>,
}

/// One sub-word piece with its raw timing, before folding into words.
#[derive(Debug, Clone)]
struct Piece {
    text: String,
    start_ms: u64,
    end_ms: u64,
    confidence: f32,
}

impl WhisperAligner {
    pub fn new(ctx: Arc<WhisperContext>, threads: Option<i32>) -> Self {
        Self { ctx, threads }
    }

    fn align_segment(
        &self,
        audio: &AudioSource,
        segment: &TranscriptSegment,
    ) -> Result<Vec<WordTiming>, AlignmentError> {
        let window = audio.window(segment.start_ms, segment.end_ms);
        if window.is_empty() {
            return Err(AlignmentError::Model(
                "segment window outside audio stream".to_string(),
            ));
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| AlignmentError::Model(format!("Failed to create state: {}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_token_timestamps(true);
        params.set_max_len(1);
        if let Some(threads) = self.threads {
            params.set_n_threads(threads);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, window)
            .map_err(|e| AlignmentError::Model(format!("Alignment inference failed: {}", e)))?;

        let mut pieces = Vec::new();
        let num_segments = state.full_n_segments();
        for i in 0..num_segments {
            if let Some(piece) = state.get_segment(i) {
                let text = piece
                    .to_str_lossy()
                    .map_err(|e| AlignmentError::Model(format!("Failed to get text: {}", e)))?
                    .to_string();
                pieces.push(Piece {
                    text,
                    start_ms: (piece.start_timestamp().max(0) as u64) * 10 + segment.start_ms,
                    end_ms: (piece.end_timestamp().max(0) as u64) * 10 + segment.start_ms,
                    confidence: (1.0 - piece.no_speech_probability()).clamp(0.0, 1.0),
                });
            }
        }

        Ok(fold_pieces(&pieces, segment.start_ms, segment.end_ms))
    }
}

impl WordAligner for WhisperAligner {
    fn align(
        &self,
        audio: &AudioSource,
        segments: &[TranscriptSegment],
        cancel: &CancelToken,
    ) -> Result<Vec<TranscriptSegment>, AlignmentError> {
        let mut out = Vec::with_capacity(segments.len());

        for segment in segments {
            if cancel.is_cancelled() {
                return Err(AlignmentError::Cancelled);
            }

            let mut enriched = segment.clone();
            if segment.text.trim().is_empty() {
                out.push(enriched);
                continue;
            }

            match self.align_segment(audio, segment) {
                Ok(words) if !words.is_empty() => {
                    enriched.words = Some(words);
                }
                Ok(_) => {}
                Err(AlignmentError::Cancelled) => return Err(AlignmentError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        segment = segment.index,
                        error = %e,
                        "word alignment failed for segment, keeping coarse timing"
                    );
                }
            }
            out.push(enriched);
        }

        Ok(out)
    }
}

/// Fold sub-word pieces into whole words.
///
/// Whisper marks word-initial pieces with a leading space; a piece starting
/// with whitespace closes the word in progress. Word timings are clamped to
/// the parent segment's window and a word's confidence is the mean of its
/// pieces' confidences.
fn fold_pieces(pieces: &[Piece], window_start_ms: u64, window_end_ms: u64) -> Vec<WordTiming> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut start_ms = 0u64;
    let mut end_ms = 0u64;
    let mut confidence_sum = 0.0f32;
    let mut piece_count = 0u32;

    let mut flush = |text: &mut String,
                     start_ms: u64,
                     end_ms: u64,
                     confidence_sum: &mut f32,
                     piece_count: &mut u32,
                     words: &mut Vec<WordTiming>| {
        let word = text.trim().to_string();
        if !word.is_empty() {
            let start = start_ms.clamp(window_start_ms, window_end_ms);
            let end = end_ms.clamp(start, window_end_ms);
            let confidence = if *piece_count > 0 {
                *confidence_sum / *piece_count as f32
            } else {
                0.0
            };
            words.push(WordTiming {
                word,
                start_ms: start,
                end_ms: end,
                confidence,
            });
        }
        text.clear();
        *confidence_sum = 0.0;
        *piece_count = 0;
    };

    for piece in pieces {
        let starts_word = piece.text.starts_with(char::is_whitespace);
        if starts_word && !text.trim().is_empty() {
            flush(
                &mut text,
                start_ms,
                end_ms,
                &mut confidence_sum,
                &mut piece_count,
                &mut words,
            );
        }
        if text.is_empty() {
            start_ms = piece.start_ms;
        }
        text.push_str(&piece.text);
        end_ms = piece.end_ms;
        confidence_sum += piece.confidence;
        piece_count += 1;
    }
    flush(
        &mut text,
        start_ms,
        end_ms,
        &mut confidence_sum,
        &mut piece_count,
        &mut words,
    );

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(text: &str, start_ms: u64, end_ms: u64) -> Piece {
        Piece {
            text: text.to_string(),
            start_ms,
            end_ms,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_fold_pieces_splits_on_leading_space() {
        let pieces = vec![
            piece(" hel", 1000, 1200),
            piece("lo", 1200, 1400),
            piece(" world", 1400, 1900),
        ];
        let words = fold_pieces(&pieces, 1000, 2000);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "hello");
        assert_eq!(words[0].start_ms, 1000);
        assert_eq!(words[0].end_ms, 1400);
        assert_eq!(words[1].word, "world");
        assert_eq!(words[1].start_ms, 1400);
    }

    #[test]
    fn test_fold_pieces_clamps_to_window() {
        let pieces = vec![piece(" late", 1800, 2600)];
        let words = fold_pieces(&pieces, 1000, 2000);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].end_ms, 2000);
        assert!(words[0].start_ms >= 1000 && words[0].start_ms <= 2000);
    }

    #[test]
    fn test_fold_pieces_in_reading_order() {
        let pieces = vec![
            piece(" one", 0, 300),
            piece(" two", 300, 600),
            piece(" three", 600, 900),
        ];
        let words = fold_pieces(&pieces, 0, 1000);
        let texts: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(words.windows(2).all(|w| w[0].start_ms <= w[1].start_ms));
    }

    #[test]
    fn test_fold_pieces_empty() {
        assert!(fold_pieces(&[], 0, 1000).is_empty());
    }

    #[test]
    fn test_fold_pieces_averages_confidence() {
        let pieces = vec![
            Piece {
                text: " ab".to_string(),
                start_ms: 0,
                end_ms: 100,
                confidence: 1.0,
            },
            Piece {
                text: "cd".to_string(),
                start_ms: 100,
                end_ms: 200,
                confidence: 0.5,
            },
        ];
        let words = fold_pieces(&pieces, 0, 1000);
        assert_eq!(words.len(), 1);
        assert!((words[0].confidence - 0.75).abs() < 1e-6);
    }
}
