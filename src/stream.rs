//! Lazy, bounded-chunk hashline formatting over an async byte source.
//!
//! Mirrors `format_hashlines` line-for-line but never holds the whole file
//! in memory as a single formatted string; callers who already have the
//! whole file as a string should just use [`crate::format::format_hashlines`].

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::format::format_record;

#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    pub start_line: usize,
    pub max_chunk_lines: usize,
    pub max_chunk_bytes: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            start_line: 1,
            max_chunk_lines: 200,
            max_chunk_bytes: 64 * 1024,
        }
    }
}

struct ChunkBuilder {
    buf: String,
    lines_in_buf: usize,
    max_chunk_lines: usize,
    max_chunk_bytes: usize,
}

impl ChunkBuilder {
    fn new(opts: &StreamOptions) -> Self {
        ChunkBuilder {
            buf: String::new(),
            lines_in_buf: 0,
            max_chunk_lines: opts.max_chunk_lines.max(1),
            max_chunk_bytes: opts.max_chunk_bytes.max(1),
        }
    }

    /// Push one formatted record; returns a finished chunk if a limit was
    /// reached (the record that triggered the flush is included in it).
    fn push(&mut self, record: String) -> Option<String> {
        if self.lines_in_buf > 0 {
            self.buf.push('\n');
        }
        self.buf.push_str(&record);
        self.lines_in_buf += 1;

        if self.lines_in_buf >= self.max_chunk_lines || self.buf.len() >= self.max_chunk_bytes {
            return Some(self.take());
        }
        None
    }

    fn take(&mut self) -> String {
        self.lines_in_buf = 0;
        std::mem::take(&mut self.buf)
    }

    fn is_empty(&self) -> bool {
        self.lines_in_buf == 0
    }
}

/// Read `source` to completion, emitting hashline-formatted chunks as they
/// fill up. Concatenating the returned chunks with `\n` reproduces
/// `format_hashlines`'s output exactly.
pub async fn stream_hashlines<R>(mut source: R, opts: StreamOptions) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    source.read_to_end(&mut raw).await?;
    let text = String::from_utf8_lossy(&raw);

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut builder = ChunkBuilder::new(&opts);
    let mut line_no = opts.start_line;
    let mut pending = String::new();

    for c in text.chars() {
        if c == '\n' {
            let record = format_record(line_no, &pending);
            pending.clear();
            line_no += 1;
            if let Some(chunk) = builder.push(record) {
                chunks.push(chunk);
            }
        } else {
            pending.push(c);
        }
    }

    // Residual text after the last newline (or the whole source, if it had
    // none) is still one line.
    let record = format_record(line_no, &pending);
    if let Some(chunk) = builder.push(record) {
        chunks.push(chunk);
    }

    if !builder.is_empty() {
        chunks.push(builder.take());
    }

    Ok(chunks)
}

/// Entry point for producers that already have discrete lines (e.g. grep
/// output) rather than a raw byte stream.
pub fn stream_hashlines_from_lines<I, S>(lines: I, opts: StreamOptions) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut chunks = Vec::new();
    let mut builder = ChunkBuilder::new(&opts);
    let mut line_no = opts.start_line;

    for line in lines {
        let record = format_record(line_no, line.as_ref());
        line_no += 1;
        if let Some(chunk) = builder.push(record) {
            chunks.push(chunk);
        }
    }

    if !builder.is_empty() {
        chunks.push(builder.take());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::format_hashlines;
    use std::io::Cursor;

    fn joined(chunks: &[String]) -> String {
        chunks.join("\n")
    }

    #[tokio::test]
    async fn empty_source_yields_no_chunks() {
        let chunks = stream_hashlines(Cursor::new(Vec::new()), StreamOptions::default())
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn matches_one_shot_formatter_for_small_input() {
        let content = "fn main() {\n    println!(\"hi\");\n}\n";
        let chunks = stream_hashlines(Cursor::new(content), StreamOptions::default())
            .await
            .unwrap();
        assert_eq!(joined(&chunks), format_hashlines(content, 1));
    }

    #[tokio::test]
    async fn no_trailing_newline_still_emits_last_line() {
        let content = "a\nb\nc";
        let chunks = stream_hashlines(Cursor::new(content), StreamOptions::default())
            .await
            .unwrap();
        assert_eq!(joined(&chunks), format_hashlines(content, 1));
    }

    #[tokio::test]
    async fn trailing_newline_emits_final_empty_record() {
        let content = "a\nb\n";
        let chunks = stream_hashlines(Cursor::new(content), StreamOptions::default())
            .await
            .unwrap();
        assert_eq!(joined(&chunks), format_hashlines(content, 1));
    }

    #[tokio::test]
    async fn respects_max_chunk_lines() {
        let content = "a\nb\nc\nd\ne\n";
        let opts = StreamOptions {
            start_line: 1,
            max_chunk_lines: 2,
            max_chunk_bytes: usize::MAX,
        };
        let chunks = stream_hashlines(Cursor::new(content), opts).await.unwrap();
        // 6 logical lines (a,b,c,d,e,"") at 2 per chunk -> 3 chunks.
        assert_eq!(chunks.len(), 3);
        assert_eq!(joined(&chunks), format_hashlines(content, 1));
    }

    #[tokio::test]
    async fn respects_max_chunk_bytes() {
        let content = "aaaa\nbbbb\ncccc\n";
        let opts = StreamOptions {
            start_line: 1,
            max_chunk_lines: usize::MAX,
            max_chunk_bytes: 10,
        };
        let chunks = stream_hashlines(Cursor::new(content), opts).await.unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(joined(&chunks), format_hashlines(content, 1));
    }

    #[test]
    fn line_iterator_entry_point_matches_chunked_bytes() {
        let lines = vec!["one", "two", "three"];
        let chunks = stream_hashlines_from_lines(lines.clone(), StreamOptions::default());
        let expected = format_hashlines(&lines.join("\n"), 1);
        assert_eq!(joined(&chunks), expected);
    }

    #[test]
    fn line_iterator_respects_start_line() {
        let lines = vec!["x", "y"];
        let opts = StreamOptions {
            start_line: 42,
            ..StreamOptions::default()
        };
        let chunks = stream_hashlines_from_lines(lines, opts);
        assert!(joined(&chunks).starts_with("42#"));
    }
}
