use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::warn;

/// One `level [@xref@] tag [value]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GedcomLine {
    pub level: u32,
    /// Record id of a level-0 definition, without the `@` delimiters.
    pub xref: Option<String>,
    pub tag: String,
    pub value: String,
}

impl GedcomLine {
    pub fn new(level: u32, tag: &str, value: &str) -> Self {
        Self {
            level,
            xref: None,
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }

    pub fn record(xref: &str, tag: &str, value: &str) -> Self {
        Self {
            level: 0,
            xref: Some(xref.to_string()),
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }

    /// Splits a raw line. Only the single delimiter space before the value is
    /// consumed, since trailing spaces matter for `CONC`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start_matches('\u{feff}').trim_start();
        let line = line.trim_end_matches(['\r', '\n']);

        let (level, rest) = split_token(line)?;
        let level: u32 = level.parse().ok()?;

        let (mut tag, mut rest) = split_token(rest)?;
        let mut xref = None;
        if tag.len() > 2 && tag.starts_with('@') && tag.ends_with('@') {
            xref = Some(tag[1..tag.len() - 1].to_string());
            (tag, rest) = split_token(rest)?;
        }

        Some(Self {
            level,
            xref,
            tag: tag.to_string(),
            value: rest.to_string(),
        })
    }
}

/// Returns the leading token and everything after its delimiter space.
fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start_matches(' ');
    if s.is_empty() {
        return None;
    }
    match s.find(' ') {
        Some(pos) => Some((&s[..pos], &s[pos + 1..])),
        None => Some((s, "")),
    }
}

pub struct GedcomReader {
    reader: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
    line_number: u64,
}

impl GedcomReader {
    /// Opens a `.ged` file; `.bz2` files are decompressed on the fly.
    pub fn open(path: &str) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open GEDCOM file: {}", path))?;
        let reader: Box<dyn BufRead + Send> = if path.ends_with(".bz2") {
            Box::new(BufReader::new(BzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::from_boxed(reader))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self::from_boxed(Box::new(reader))
    }

    fn from_boxed(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            line_number: 0,
        }
    }
}

impl Iterator for GedcomReader {
    type Item = GedcomLine;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!(line = self.line_number, error = %e, "Read error, stopping");
                    return None;
                }
            }
            self.line_number += 1;

            // Legacy exports are often ANSI; keep going rather than failing the file.
            let text = String::from_utf8_lossy(&self.buf);
            if text.trim().is_empty() {
                continue;
            }
            match GedcomLine::parse(&text) {
                Some(line) => return Some(line),
                None => {
                    warn!(
                        line = self.line_number,
                        text = %text.trim_end(),
                        "Malformed line, skipping"
                    );
                }
            }
        }
    }
}
