// Progress parsing over arbitrarily chunked diagnostic streams

use ffjob::engine::{EventState, ProgressParser, ProgressSample, parse_chunk};
use proptest::prelude::*;
use uuid::Uuid;

const STREAM: &str = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':\n\
  Duration: 00:00:20.00, start: 0.000000, bitrate: 2500 kb/s\n\
frame=   60 fps=0.0 q=28.0 size=     256kB time=00:00:02.00 bitrate=1048.6kbits/s speed=4.00x\r\
frame=  120 fps=118 q=28.0 size=     512kB time=00:00:04.00 bitrate=1048.6kbits/s speed=3.95x\r\
frame=  300 fps=120 q=28.0 size=    1280kB time=00:00:10.00 bitrate=1048.6kbits/s speed=4.01x\r\
frame=  600 fps=120 q=28.0 size=    2560kB time=00:00:20.00 bitrate=1048.6kbits/s speed=4.00x\n";

fn samples_in_pieces(pieces: &[&str]) -> Vec<ProgressSample> {
    let mut buffer = String::new();
    let mut samples = Vec::new();
    for piece in pieces {
        let (found, rest) = parse_chunk(&buffer, piece);
        samples.extend(found);
        buffer = rest;
    }
    samples
}

/// Cut `text` at the given char offsets
fn split_at_offsets<'a>(text: &'a str, mut cuts: Vec<usize>) -> Vec<&'a str> {
    cuts.retain(|&c| text.is_char_boundary(c));
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in cuts {
        pieces.push(&text[start..cut]);
        start = cut;
    }
    pieces.push(&text[start..]);
    pieces
}

#[test]
fn test_whole_stream_samples() {
    let samples = samples_in_pieces(&[STREAM]);
    let times: Vec<f64> = samples.iter().map(|s| s.time_seconds).collect();
    assert_eq!(times, [2.0, 4.0, 10.0, 20.0]);
    assert_eq!(samples[0].size_bytes, Some(256 * 1024));
    assert_eq!(samples[1].speed, Some(3.95));
}

#[test]
fn test_parser_learns_duration_from_stream() {
    let mut parser = ProgressParser::new(Uuid::nil(), None);
    let events = parser.feed(STREAM);

    let percents: Vec<f64> = events.iter().map(|e| e.percent).collect();
    assert_eq!(percents, [10.0, 20.0, 50.0, 100.0]);
    assert!(events.iter().all(|e| e.state == EventState::Processing));
    assert_eq!(events[2].eta_seconds.map(|e| (e * 100.0).round()), Some(249.0));
}

proptest! {
    #[test]
    fn prop_chunking_does_not_change_samples(cuts in prop::collection::vec(0..STREAM.len(), 0..24)) {
        let pieces = split_at_offsets(STREAM, cuts);
        prop_assert_eq!(samples_in_pieces(&pieces), samples_in_pieces(&[STREAM]));
    }

    #[test]
    fn prop_percent_never_decreases(cuts in prop::collection::vec(0..STREAM.len(), 0..24)) {
        let mut parser = ProgressParser::new(Uuid::nil(), None);
        let mut last = 0.0;
        for piece in split_at_offsets(STREAM, cuts) {
            for event in parser.feed(piece) {
                prop_assert!(event.percent >= last);
                prop_assert!(event.percent <= 100.0);
                last = event.percent;
            }
        }
        prop_assert_eq!(last, 100.0);
    }
}
