//! Line-level source maps.
//!
//! Maps only record which source line each generated line came from: type
//! erasure reports a source line per printed line and every later pass keeps
//! lines intact. They serialize to the version 3 format with one segment per
//! mapped line.

use serde::Serialize;
use std::path::Path;

use crate::build::discovery::slash_path;
use crate::resolve::node::relative_path;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Per generated line, the source it maps to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    /// Absolute source paths
    pub sources: Vec<String>,
    /// `(source index, source line)` per generated line, 0-based
    pub lines: Vec<Option<(u32, u32)>>,
}

impl LineMap {
    /// Map `line_count` generated lines to `source`, starting at `first_line`.
    pub fn identity(source: impl Into<String>, line_count: usize, first_line: u32) -> Self {
        Self {
            sources: vec![source.into()],
            lines: (0..line_count as u32).map(|l| Some((0, first_line + l))).collect(),
        }
    }

    /// Map generated lines to the given 0-based lines of `source`.
    pub fn from_source_lines(source: impl Into<String>, lines: &[Option<u32>]) -> Self {
        Self { sources: vec![source.into()], lines: lines.iter().map(|l| l.map(|l| (0, l))).collect() }
    }

    /// Insert `count` unmapped lines at the top.
    pub fn shift(&mut self, count: usize) {
        self.lines.splice(0..0, std::iter::repeat(None).take(count));
    }

    /// Extend with unmapped lines up to `line_count`.
    pub fn pad_to(&mut self, line_count: usize) {
        if self.lines.len() < line_count {
            self.lines.resize(line_count, None);
        }
    }

    pub fn push_unmapped(&mut self) {
        self.lines.push(None);
    }

    /// Append the lines of another map, merging its sources.
    pub fn append(&mut self, other: &LineMap) {
        let indices: Vec<u32> = other
            .sources
            .iter()
            .map(|source| match self.sources.iter().position(|s| s == source) {
                Some(index) => index as u32,
                None => {
                    self.sources.push(source.clone());
                    (self.sources.len() - 1) as u32
                }
            })
            .collect();
        self.lines.extend(
            other.lines.iter().map(|line| line.map(|(src, l)| (indices[src as usize], l))),
        );
    }

    /// Encode the `mappings` field.
    pub fn mappings(&self) -> String {
        let mut out = String::new();
        let mut previous_source = 0i64;
        let mut previous_line = 0i64;
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                out.push(';');
            }
            if let Some((source, source_line)) = line {
                let (source, source_line) = (*source as i64, *source_line as i64);
                encode_vlq(&mut out, 0);
                encode_vlq(&mut out, source - previous_source);
                encode_vlq(&mut out, source_line - previous_line);
                encode_vlq(&mut out, 0);
                previous_source = source;
                previous_line = source_line;
            }
        }
        out
    }

    /// Serialize as a version 3 map for the output file `file`; source paths
    /// are written relative to the file's directory.
    pub fn to_json(&self, file: &Path) -> String {
        let dir = file.parent().unwrap_or(Path::new(""));
        let sources = self
            .sources
            .iter()
            .map(|source| slash_path(&relative_path(dir, Path::new(source))))
            .collect();
        let document = SourceMapDocument {
            version: 3,
            file: file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            sources,
            names: Vec::new(),
            mappings: self.mappings(),
        };
        serde_json::to_string(&document).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct SourceMapDocument {
    version: u8,
    file: String,
    sources: Vec<String>,
    names: Vec<String>,
    mappings: String,
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 { ((-value) << 1) | 1 } else { value << 1 } as u64;
    loop {
        let mut digit = (vlq & 0b11111) as u8;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Trailing comment pointing at a map file.
pub fn mapping_url_comment(map_file_name: &str) -> String {
    format!("//# sourceMappingURL={}", map_file_name)
}
