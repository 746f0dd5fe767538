use tracing::warn;

use crate::{
    types::{AlignedFrame, ScreenshotRecord, SubtitleSegment, VideoRecord},
    vtt::parse_vtt,
};

/// Pair every screenshot with the segments that start inside its window.
///
/// Screenshot `i` owns `[t_i, t_{i+1})`; the last one owns `[t_last, +inf)`.
/// Only a segment's start decides membership. Segments starting before the
/// first screenshot belong to no frame.
pub fn align(
    screenshots: &[ScreenshotRecord],
    original_segments: &[SubtitleSegment],
    translated_segments: &[SubtitleSegment],
) -> Vec<AlignedFrame> {
    let valid: Vec<&ScreenshotRecord> = screenshots
        .iter()
        .filter(|shot| {
            let ok = shot.timestamp_seconds.is_finite();
            if !ok {
                warn!(filename = %shot.filename, "screenshot has no usable timestamp, excluding");
            }
            ok
        })
        .collect();

    valid
        .iter()
        .enumerate()
        .map(|(i, shot)| {
            let start = shot.timestamp_seconds;
            let end = valid
                .get(i + 1)
                .map(|next| next.timestamp_seconds)
                .unwrap_or(f64::INFINITY);

            AlignedFrame {
                screenshot: (*shot).clone(),
                original_segments: segments_in_window(original_segments, start, end),
                translated_segments: segments_in_window(translated_segments, start, end),
            }
        })
        .collect()
}

/// Parse a stored record's tracks and align them with its screenshots
pub fn align_record(record: &VideoRecord) -> Vec<AlignedFrame> {
    let original = parse_vtt(&record.transcription);
    let translated = parse_vtt(&record.translation);
    align(&record.screenshots, &original, &translated)
}

fn segments_in_window(segments: &[SubtitleSegment], start: f64, end: f64) -> Vec<SubtitleSegment> {
    segments
        .iter()
        .filter(|seg| start <= seg.start_seconds && seg.start_seconds < end)
        .cloned()
        .collect()
}
