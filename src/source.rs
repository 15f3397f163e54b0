//! Landmark frame sources. The landmark model itself runs elsewhere; the
//! core only sees its per-frame output.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

use crate::hand::Frame;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl SourceError {
    /// A bad line can be skipped; an I/O failure ends the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Decode { .. })
    }
}

pub trait LandmarkSource {
    /// `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// One JSON frame per line, e.g.
/// `{"hands":[{"side":"Left","landmarks":[{"x":1.0,"y":2.0,"z":0.0}, ...]}]}`.
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            return serde_json::from_str(text)
                .map(Some)
                .map_err(|source| SourceError::Decode {
                    line: self.line,
                    source,
                });
        }
    }
}

/// `-` reads standard input.
pub fn open(path: &str) -> io::Result<Box<dyn LandmarkSource>> {
    if path == "-" {
        return Ok(Box::new(JsonLinesSource::new(io::stdin().lock())));
    }
    let file = File::open(Path::new(path))?;
    Ok(Box::new(JsonLinesSource::new(BufReader::new(file))))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::fixtures::upright;
    use crate::hand::{LANDMARK_COUNT, Side};
    use std::io::Cursor;

    #[test]
    fn test_reads_frames_and_skips_blank_lines() {
        let hand = upright((300.0, 400.0), [0, 1, 0, 0, 0]);
        let input = format!("{}\n\n   \n{{}}\n", replay::line(&[hand.clone()]));
        let mut src = JsonLinesSource::new(Cursor::new(input));

        let first = src.next_frame().unwrap().unwrap();
        assert_eq!(first.hands, vec![hand]);
        assert_eq!(first.hands[0].landmarks.len(), LANDMARK_COUNT);

        // `{}` is a frame without hands
        let second = src.next_frame().unwrap().unwrap();
        assert!(second.hands.is_empty());
        assert_eq!(src.line, 4);

        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_side_and_depth_are_optional() {
        let json = r#"{"hands":[{"landmarks":[{"x":1,"y":2}]}]}"#;
        let mut src = JsonLinesSource::new(Cursor::new(json));
        let frame = src.next_frame().unwrap().unwrap();
        assert_eq!(frame.hands[0].side, Side::Right);
        assert_eq!(frame.hands[0].landmarks[0].z, 0.0);
    }

    #[test]
    fn test_bad_line_reports_position_and_continues() {
        let input = "{}\nnot json\n{\"hands\":[]}\n";
        let mut src = JsonLinesSource::new(Cursor::new(input));
        assert!(src.next_frame().unwrap().is_some());

        let err = src.next_frame().unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, SourceError::Decode { line: 2, .. }));
        assert!(err.to_string().starts_with("line 2:"));

        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(open("/nonexistent/handcalc/frames.jsonl").is_err());
    }
}
