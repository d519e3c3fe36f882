use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::error::QcError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FastaEntry {
    pub identifier: String,
    pub description: String,
    pub sequence: String,
}

pub fn load_fasta(path: &Path) -> Result<Vec<FastaEntry>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_fasta(&text).map_err(|message| {
        QcError::Format {
            path: path.to_path_buf(),
            message,
        }
        .into()
    })
}

pub fn parse_fasta(text: &str) -> std::result::Result<Vec<FastaEntry>, String> {
    let mut entries = Vec::new();
    let mut current: Option<FastaEntry> = None;
    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            if let Some(done) = current.take() {
                entries.push(done);
            }
            let (identifier, description) = match header.split_once(char::is_whitespace) {
                Some((id, desc)) => (id.to_string(), desc.trim().to_string()),
                None => (header.to_string(), String::new()),
            };
            current = Some(FastaEntry {
                identifier,
                description,
                sequence: String::new(),
            });
        } else {
            match current.as_mut() {
                Some(entry) => entry
                    .sequence
                    .extend(line.chars().filter(|c| !c.is_whitespace() && *c != '*')),
                None => {
                    return Err(format!(
                        "line {}: sequence data before the first '>' header",
                        line_no + 1
                    ))
                }
            }
        }
    }
    if let Some(done) = current.take() {
        entries.push(done);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_line_entries() {
        let text = ">sp|P00761|TRYP_PIG Trypsin\nIVGGYTCAAN\nSIPYQVSLNS*\n\n>CONT_KERATIN\nMSCQISCKSR\n";
        let entries = parse_fasta(text).expect("fasta");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identifier, "sp|P00761|TRYP_PIG");
        assert_eq!(entries[0].description, "Trypsin");
        assert_eq!(entries[0].sequence, "IVGGYTCAANSIPYQVSLNS");
        assert_eq!(entries[1].description, "");
        assert_eq!(entries[1].sequence, "MSCQISCKSR");
    }

    #[test]
    fn rejects_sequence_without_header() {
        let err = parse_fasta("ACDEFG\n>x\nAA\n").expect_err("must fail");
        assert!(err.contains("line 1"), "{}", err);
    }
}
