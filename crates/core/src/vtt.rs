use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::{
    error::{PipelineError, Result},
    types::SubtitleSegment,
};

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,}):([0-5]\d):([0-5]\d)\.(\d{3})$").expect("timestamp pattern is valid")
});

/// Parse an `HH:MM:SS.mmm` cue timestamp into seconds
pub fn parse_vtt_timestamp(value: &str) -> Result<f64> {
    let malformed = || PipelineError::MalformedTimestamp {
        value: value.to_string(),
    };
    let caps = TIMESTAMP_RE.captures(value.trim()).ok_or_else(malformed)?;

    let field = |i: usize| -> Result<u64> { caps[i].parse::<u64>().map_err(|_| malformed()) };
    let hours = field(1)?;
    let mins = field(2)?;
    let secs = field(3)?;
    let millis = field(4)?;

    let whole_seconds = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(mins * 60 + secs))
        .ok_or_else(malformed)?;
    Ok(whole_seconds as f64 + millis as f64 / 1000.0)
}

/// Parse a WEBVTT document into segments.
///
/// Blocks without a timing line (header, NOTE, STYLE) are skipped. A cue whose
/// timing fails to parse is dropped on its own; the rest of the track survives.
pub fn parse_vtt(content: &str) -> Vec<SubtitleSegment> {
    let normalized = content.replace("\r\n", "\n");
    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    for line in normalized.lines().chain(std::iter::once("")) {
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }
        match parse_cue(&block) {
            Some(Ok(segment)) => segments.push(segment),
            Some(Err(e)) => warn!(error = %e, "skipping cue"),
            None => {}
        }
        block.clear();
    }

    segments
}

fn parse_cue(block: &[&str]) -> Option<Result<SubtitleSegment>> {
    let timing_index = block.iter().position(|line| line.contains("-->"))?;
    Some(parse_timed_cue(block[timing_index], &block[timing_index + 1..]))
}

fn parse_timed_cue(timing: &str, text_lines: &[&str]) -> Result<SubtitleSegment> {
    let (start, rest) = timing
        .split_once("-->")
        .ok_or_else(|| PipelineError::MalformedTimestamp {
            value: timing.to_string(),
        })?;
    // cue settings such as `align:start position:0%` may follow the end time
    let end = rest.split_whitespace().next().unwrap_or_default();

    let start_seconds = parse_vtt_timestamp(start)?;
    let end_seconds = parse_vtt_timestamp(end)?;
    if start_seconds > end_seconds {
        return Err(PipelineError::MalformedTimestamp {
            value: timing.trim().to_string(),
        });
    }

    let text = text_lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(SubtitleSegment {
        start_seconds,
        end_seconds,
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp() {
        assert_eq!(parse_vtt_timestamp("00:00:05.500").unwrap(), 5.5);
        let parsed = parse_vtt_timestamp("01:02:03.004").unwrap();
        assert!((parsed - 3723.004).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        for bad in ["0:00:05.500", "00:00:05,500", "00:61:00.000", "00:00:05", "abc"] {
            assert!(
                matches!(
                    parse_vtt_timestamp(bad),
                    Err(PipelineError::MalformedTimestamp { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn oversized_hours_are_malformed() {
        assert!(matches!(
            parse_vtt_timestamp("9999999999999999:00:00.000"),
            Err(PipelineError::MalformedTimestamp { .. })
        ));
        assert!(matches!(
            parse_vtt_timestamp("99999999999999999999:00:00.000"),
            Err(PipelineError::MalformedTimestamp { .. })
        ));

        let vtt = "WEBVTT\n\n9999999999999999:00:00.000 --> 9999999999999999:00:01.000\nhuge\n\n00:00:01.000 --> 00:00:02.000\nkeep\n";
        let texts: Vec<_> = parse_vtt(vtt).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["keep"]);
    }

    #[test]
    fn parses_multiline_cues_and_skips_header() {
        let vtt = "WEBVTT\nKind: captions\n\n00:00:01.000 --> 00:00:02.000\nline one\nline two\n\n00:00:03.000 --> 00:00:04.000 align:start position:0%\nnext\n";
        let segments = parse_vtt(vtt);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "line one\nline two");
        assert_eq!(segments[1].start_seconds, 3.0);
        assert_eq!(segments[1].end_seconds, 4.0);
        assert_eq!(segments[1].text, "next");
    }

    #[test]
    fn malformed_cue_is_dropped_without_losing_the_rest() {
        let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nkeep\n\n00:00:xx.000 --> 00:00:04.000\ndrop\n\n00:00:09.000 --> 00:00:08.000\nbackwards\n\n00:00:05.000 --> 00:00:06.000\nalso keep\n";
        let texts: Vec<_> = parse_vtt(vtt).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec!["keep", "also keep"]);
    }

    #[test]
    fn handles_crlf_and_cue_identifiers() {
        let vtt = "WEBVTT\r\n\r\n1\r\n00:00:01.000 --> 00:00:02.000\r\nhello\r\n";
        let segments = parse_vtt(vtt);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello");
    }
}
