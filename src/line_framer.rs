//! Reassembles newline-delimited records out of whatever chunks the socket
//! hands us. TCP gives no guarantee that a read ends on a line boundary, so
//! anything after the last `\n` is carried over into the next call.

/// Splits a byte stream into trimmed text lines.
#[derive(Debug, Default, Clone)]
pub struct LineFramer {
    carry: Vec<u8>,
}

impl LineFramer {
    /// Instantiate a framer with an empty carry-over buffer.
    pub fn new() -> Self {
        Self { carry: Vec::new() }
    }

    /// Feed a freshly received chunk and collect every line it completes.
    ///
    /// Lines are returned in arrival order with the newline and surrounding
    /// whitespace stripped. Blank lines are returned as empty strings; it is
    /// up to the parser to ignore them. Bytes that are not valid UTF-8 are
    /// replaced rather than dropped so the parser can report the line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            self.carry.extend_from_slice(head);
            lines.push(String::from_utf8_lossy(&self.carry).trim().to_owned());
            self.carry.clear();
            rest = &tail[1..];
        }
        self.carry.extend_from_slice(rest);

        lines
    }

    /// Bytes received after the last newline, still waiting for their line
    /// to complete.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &[u8] = b"0,1000.0,0.1,0.2,9.8\n1,1000.0,0.3,0.1,9.7\n\n0,1050.0,0.1,0.2,9.8\n";

    fn frame_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut framer = LineFramer::new();
        chunks.iter().flat_map(|c| framer.push(c)).collect()
    }

    #[test]
    fn whole_stream_yields_every_line() {
        let lines = frame_all(&[STREAM]);
        assert_eq!(
            lines,
            vec![
                "0,1000.0,0.1,0.2,9.8",
                "1,1000.0,0.3,0.1,9.7",
                "",
                "0,1050.0,0.1,0.2,9.8",
            ]
        );
    }

    #[test]
    fn any_two_way_split_matches_whole_stream() {
        let whole = frame_all(&[STREAM]);
        for cut in 0..=STREAM.len() {
            let (a, b) = STREAM.split_at(cut);
            assert_eq!(frame_all(&[a, b]), whole, "split at {cut}");
        }
    }

    #[test]
    fn byte_at_a_time_matches_whole_stream() {
        let chunks: Vec<&[u8]> = STREAM.chunks(1).collect();
        assert_eq!(frame_all(&chunks), frame_all(&[STREAM]));
    }

    #[test]
    fn partial_line_is_carried_over() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"3,1500.0,0.1").is_empty());
        assert_eq!(framer.pending(), b"3,1500.0,0.1");
        assert!(framer.push(b"").is_empty());
        assert_eq!(framer.push(b",0.2,9.8\r\n4,"), vec!["3,1500.0,0.1,0.2,9.8"]);
        assert_eq!(framer.pending(), b"4,");
    }

    #[test]
    fn reset_discards_partial_line() {
        let mut framer = LineFramer::new();
        framer.push(b"garbage without newline");
        framer.reset();
        assert_eq!(framer.push(b"0,1.0,0,0,0\n"), vec!["0,1.0,0,0,0"]);
    }

    #[test]
    fn invalid_utf8_is_kept_as_a_line() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"\xff\xfe,1\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(",1"));
    }
}
