use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::range::Position;

const BASE64_CHARS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

/// Source Map revision 3.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
struct Mapping {
    generated_line: u32,
    generated_column: u32,
    original_line: u32,
    original_column: u32,
    name: Option<usize>,
}

#[derive(Debug, Default)]
pub struct SourceMapGenerator {
    file: String,
    source_content: Option<String>,
    names: Vec<String>,
    name_indices: FxHashMap<String, usize>,
    mappings: Vec<Mapping>,
}

impl SourceMapGenerator {
    pub fn new(file: impl Into<String>, source_content: Option<String>) -> Self {
        Self {
            file: file.into(),
            source_content,
            ..Default::default()
        }
    }

    /// Maps a zero-based generated position to a source position.
    pub fn add_mapping(&mut self, generated_line: u32, generated_column: u32, original: Position, name: Option<&str>) {
        let name = name.map(|name| match self.name_indices.get(name) {
            Some(index) => *index,
            None => {
                let index = self.names.len();
                self.names.push(name.to_string());
                self.name_indices.insert(name.to_string(), index);
                index
            }
        });

        self.mappings.push(Mapping {
            generated_line,
            generated_column,
            original_line: original.line.saturating_sub(1),
            original_column: original.column.saturating_sub(1),
            name,
        });
    }

    pub fn to_source_map(&self) -> SourceMap {
        SourceMap {
            version: 3,
            file: self.file.clone(),
            sources: vec![self.file.clone()],
            sources_content: vec![self.source_content.clone()],
            names: self.names.clone(),
            mappings: self.encode_mappings(),
        }
    }

    fn encode_mappings(&self) -> String {
        let mut mappings = self.mappings.clone();
        mappings.sort_by_key(|mapping| (mapping.generated_line, mapping.generated_column));

        let mut encoded = String::new();
        let mut line = 0;
        let mut prev_generated_column = 0i64;
        let mut prev_original_line = 0i64;
        let mut prev_original_column = 0i64;
        let mut prev_name = 0i64;
        let mut first_in_line = true;

        for mapping in mappings {
            while line < mapping.generated_line {
                encoded.push(';');
                line += 1;
                prev_generated_column = 0;
                first_in_line = true;
            }

            if !first_in_line {
                encoded.push(',');
            }
            first_in_line = false;

            encode_vlq(&mut encoded, mapping.generated_column as i64 - prev_generated_column);
            prev_generated_column = mapping.generated_column as i64;
            // single source
            encode_vlq(&mut encoded, 0);
            encode_vlq(&mut encoded, mapping.original_line as i64 - prev_original_line);
            prev_original_line = mapping.original_line as i64;
            encode_vlq(&mut encoded, mapping.original_column as i64 - prev_original_column);
            prev_original_column = mapping.original_column as i64;

            if let Some(name) = mapping.name {
                encode_vlq(&mut encoded, name as i64 - prev_name);
                prev_name = name as i64;
            }
        }

        encoded
    }
}

fn encode_vlq(buf: &mut String, value: i64) {
    let mut vlq = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };

    loop {
        let mut digit = vlq & VLQ_BASE_MASK;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        buf.push(BASE64_CHARS[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}
