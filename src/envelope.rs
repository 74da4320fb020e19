//! File-text envelope: canonicalize BOM/line-endings on input, restore them
//! bit-exact on output. Edit logic only ever touches canonical content.

const BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub content: String,
    pub had_bom: bool,
    pub line_ending: LineEnding,
}

impl Envelope {
    /// Canonicalize raw bytes (decoded as UTF-8) into the envelope form.
    ///
    /// Detects BOM and strips it; detects whichever of `\n`/`\r\n` occurs
    /// first in the pre-strip content (ties favor `\n`); normalizes all
    /// line endings to `\n`.
    pub fn canonicalize(raw: &str) -> Self {
        let had_bom = raw.starts_with(BOM);
        let stripped = if had_bom { &raw[BOM.len_utf8()..] } else { raw };

        let line_ending = detect_line_ending(stripped);

        let mut content = String::with_capacity(stripped.len());
        let mut chars = stripped.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    content.push('\n');
                }
                other => content.push(other),
            }
        }

        Envelope {
            content,
            had_bom,
            line_ending,
        }
    }

    /// Restore canonical content to on-disk form: re-apply the original
    /// line ending everywhere, prepend the BOM if one was present.
    pub fn restore(&self) -> String {
        let mut out = String::with_capacity(self.content.len() + 3);
        if self.had_bom {
            out.push(BOM);
        }
        if self.line_ending == LineEnding::Lf {
            out.push_str(&self.content);
        } else {
            out.push_str(&self.content.replace('\n', self.line_ending.as_str()));
        }
        out
    }
}

fn detect_line_ending(s: &str) -> LineEnding {
    match s.find('\n') {
        None => LineEnding::Lf,
        Some(idx) => {
            if idx > 0 && s.as_bytes()[idx - 1] == b'\r' {
                LineEnding::CrLf
            } else {
                LineEnding::Lf
            }
        }
    }
}
