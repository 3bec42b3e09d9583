//! Maps dialogue lines onto the concatenated narration track.
//!
//! Narration is synthesized once as a continuous master track, while video
//! rendering happens in fixed-size batches of lines. The chunks produced here
//! are the only place that decides which seconds of the master track belong
//! to which lines.

use crate::dialogue::DialogueLine;
use crate::error::{ShortsError, ShortsResult};

/// Drift allowed between summed line durations and the encoded master track.
pub const SLICE_TOLERANCE_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineChunk {
    pub index: usize,
    /// Index of this chunk's first line in the full sequence.
    pub first_line: usize,
    pub start_offset: f64,
    pub end_offset: f64,
    pub lines: Vec<DialogueLine>,
}

impl TimelineChunk {
    pub fn duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }

    /// Per-line `(start, end)` windows relative to the chunk start.
    pub fn line_windows(&self) -> impl Iterator<Item = (f64, f64, &DialogueLine)> + '_ {
        self.lines.iter().scan(0.0_f64, |cursor, line| {
            let start = *cursor;
            *cursor += line.duration_seconds;
            Some((start, *cursor, line))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSlice {
    pub offset: f64,
    pub length: f64,
}

impl AudioSlice {
    /// Shortens the slice so it ends no later than `master_duration`.
    pub fn clamped_to(self, master_duration: f64) -> Self {
        let offset = self.offset.clamp(0.0, master_duration.max(0.0));
        let end = (self.offset + self.length).min(master_duration);
        Self {
            offset,
            length: (end - offset).max(0.0),
        }
    }
}

pub fn segment(lines: &[DialogueLine], chunk_size: usize) -> ShortsResult<Vec<TimelineChunk>> {
    if chunk_size < 1 {
        return Err(ShortsError::config("chunk size must be at least 1 line"));
    }

    let mut cumulative = Vec::with_capacity(lines.len() + 1);
    cumulative.push(0.0_f64);
    for line in lines {
        let last = cumulative[cumulative.len() - 1];
        cumulative.push(last + line.duration_seconds);
    }

    let chunks = lines
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, group)| {
            let i0 = index * chunk_size;
            let i1 = i0 + group.len();
            TimelineChunk {
                index,
                first_line: i0,
                start_offset: cumulative[i0],
                end_offset: cumulative[i1],
                lines: group.to_vec(),
            }
        })
        .collect();

    Ok(chunks)
}

pub fn slice_audio(
    master_track_duration_seconds: f64,
    chunk: &TimelineChunk,
) -> ShortsResult<AudioSlice> {
    slice_audio_with_tolerance(master_track_duration_seconds, chunk, SLICE_TOLERANCE_SECONDS)
}

pub fn slice_audio_with_tolerance(
    master_track_duration_seconds: f64,
    chunk: &TimelineChunk,
    tolerance: f64,
) -> ShortsResult<AudioSlice> {
    if chunk.end_offset > master_track_duration_seconds + tolerance {
        return Err(ShortsError::Range {
            chunk: chunk.index,
            end: chunk.end_offset,
            available: master_track_duration_seconds,
        });
    }

    Ok(AudioSlice {
        offset: chunk.start_offset,
        length: chunk.duration(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_with(durations: &[f64]) -> Vec<DialogueLine> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| DialogueLine::new(
                if i % 2 == 0 { "Alice" } else { "Bob" },
                format!("line {i}"),
                None,
                *d,
            ))
            .collect()
    }

    #[test]
    fn two_chunks_from_five_lines() {
        let lines = lines_with(&[2.0, 3.0, 1.5, 4.0, 2.5]);
        let chunks = segment(&lines, 3).unwrap();
        assert_eq!(chunks.len(), 2);

        assert_eq!(chunks[0].lines.len(), 3);
        assert!((chunks[0].start_offset - 0.0).abs() < 1e-9);
        assert!((chunks[0].end_offset - 6.5).abs() < 1e-9);

        assert_eq!(chunks[1].lines.len(), 2);
        assert_eq!(chunks[1].first_line, 3);
        assert!((chunks[1].start_offset - 6.5).abs() < 1e-9);
        assert!((chunks[1].end_offset - 13.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(segment(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn zero_chunk_size_is_a_configuration_error() {
        let err = segment(&lines_with(&[1.0]), 0).unwrap_err();
        assert!(matches!(err, ShortsError::Configuration(_)));
    }

    #[test]
    fn chunks_partition_lines_in_order() {
        let durations: Vec<f64> = (0..23).map(|i| 0.37 + (i as f64) * 0.113).collect();
        let lines = lines_with(&durations);

        for chunk_size in 1..=30 {
            let chunks = segment(&lines, chunk_size).unwrap();
            let rebuilt: Vec<DialogueLine> =
                chunks.iter().flat_map(|c| c.lines.iter().cloned()).collect();
            assert_eq!(rebuilt, lines, "chunk_size={chunk_size}");

            for pair in chunks.windows(2) {
                assert_eq!(pair[0].end_offset, pair[1].start_offset);
                assert_eq!(pair[0].first_line + pair[0].lines.len(), pair[1].first_line);
            }

            for chunk in &chunks {
                assert!(chunk.lines.len() <= chunk_size);
                let sum: f64 = chunk.lines.iter().map(|l| l.duration_seconds).sum();
                assert!((chunk.duration() - sum).abs() <= 0.001);
            }
        }
    }

    #[test]
    fn line_windows_are_relative_to_chunk() {
        let lines = lines_with(&[2.0, 3.0, 1.5, 4.0, 2.5]);
        let chunks = segment(&lines, 3).unwrap();
        let windows: Vec<(f64, f64)> = chunks[1].line_windows().map(|(s, e, _)| (s, e)).collect();
        assert_eq!(windows, vec![(0.0, 4.0), (4.0, 6.5)]);
    }

    #[test]
    fn slice_within_tolerance() {
        let lines = lines_with(&[2.0, 3.0, 1.5, 4.0, 2.5]);
        let chunks = segment(&lines, 3).unwrap();

        let slice = slice_audio(12.95, &chunks[1]).unwrap();
        assert!((slice.offset - 6.5).abs() < 1e-9);
        assert!((slice.length - 6.5).abs() < 1e-9);
    }

    #[test]
    fn slice_past_master_track_is_reported() {
        let lines = lines_with(&[2.0, 3.0, 1.5, 4.0, 2.5]);
        let chunks = segment(&lines, 3).unwrap();

        let err = slice_audio(12.0, &chunks[1]).unwrap_err();
        match err {
            ShortsError::Range { chunk, end, available } => {
                assert_eq!(chunk, 1);
                assert!((end - 13.0).abs() < 1e-9);
                assert!((available - 12.0).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }

        // First chunk is unaffected by the drift at the end.
        assert!(slice_audio(12.0, &chunks[0]).is_ok());
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let master = 12.0;
        let chunk = |end_offset: f64| TimelineChunk {
            index: 0,
            first_line: 0,
            start_offset: 0.0,
            end_offset,
            lines: lines_with(&[end_offset]),
        };

        let at_edge = chunk(master + SLICE_TOLERANCE_SECONDS);
        let slice = slice_audio(master, &at_edge).unwrap();
        assert_eq!(slice.length, at_edge.end_offset);

        let past_edge = chunk(master + SLICE_TOLERANCE_SECONDS + 1e-6);
        assert!(matches!(
            slice_audio(master, &past_edge),
            Err(ShortsError::Range { chunk: 0, .. })
        ));
    }

    #[test]
    fn clamping_trims_the_tail() {
        let slice = AudioSlice { offset: 6.5, length: 6.5 }.clamped_to(12.0);
        assert!((slice.offset - 6.5).abs() < 1e-9);
        assert!((slice.length - 5.5).abs() < 1e-9);
    }
}
