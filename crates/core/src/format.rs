use crate::types::SubtitleSegment;

pub const VTT_HEADER: &str = "WEBVTT";

/// Format seconds as MM:SS, or HH:MM:SS once past the first hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

/// Format seconds as an `HH:MM:SS.mmm` cue timestamp
pub fn format_vtt_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let hours = total_ms / 3_600_000;
    let mins = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
}

/// Render segments as a WEBVTT document
pub fn render_vtt(segments: &[SubtitleSegment]) -> String {
    let mut output = String::from(VTT_HEADER);
    output.push_str("\n\n");
    for seg in segments {
        output.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_timestamp(seg.start_seconds),
            format_vtt_timestamp(seg.end_seconds),
            cue_text(&seg.text)
        ));
    }
    output
}

// a blank line would end the cue early
fn cue_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join segment texts into one running text
pub fn segments_plain_text(segments: &[SubtitleSegment]) -> String {
    segments
        .iter()
        .map(|seg| seg.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip header and timing lines from a WEBVTT document, keeping only cue text
pub fn extract_text_from_vtt(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("-->") && *line != VTT_HEADER)
        .collect::<Vec<_>>()
        .join(" ")
}
