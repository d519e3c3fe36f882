use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub mod consensus;
pub mod error;
pub mod fasta;
pub mod feature;
pub mod identification;
pub mod meta;
pub mod mztab;
pub mod spectrum;
pub mod transformation;

pub use consensus::{ConsensusFeature, ConsensusMap, IdGroup};
pub use error::QcError;
pub use fasta::{load_fasta, FastaEntry};
pub use feature::{Feature, FeatureMap};
pub use identification::{PeptideHit, PeptideIdentification, ProteinIdentification, SearchParameters};
pub use meta::{MetaInfo, MetaValue};
pub use mztab::{MzTab, MzTabMetaData, MzTabParameter};
pub use spectrum::{MsExperiment, Precursor, SpectraMap, Spectrum};
pub use transformation::TransformationDescription;

/// Meta key carrying the persisted unique identifier of a peptide identification.
pub const UID_KEY: &str = "UID";
/// Meta key stamped on canonical identifications with the index of their consensus feature.
pub const SOURCE_GROUP_KEY: &str = "cf_id";
/// `SOURCE_GROUP_KEY` value for unassigned identifications.
pub const UNASSIGNED_GROUP: i64 = -1;

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(sha256_bytes(&bytes))
}

pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

pub fn atomic_write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

/// Reads and deserializes one of the JSON inputs, reporting parse failures as
/// [`QcError::Format`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        QcError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "qc_core_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        ensure_dir(&dir).expect("scratch dir");
        dir
    }

    #[test]
    fn atomic_write_then_load_json() {
        let dir = scratch_dir("atomic");
        let path = dir.join("nested").join("value.json");
        atomic_write_json_pretty(&path, &json!({"a": 1})).expect("write");
        let loaded: Value = load_json(&path).expect("load");
        assert_eq!(loaded["a"], 1);
        let leftovers: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_json_reports_format_error_with_path() {
        let dir = scratch_dir("format");
        let path = dir.join("broken.json");
        atomic_write_bytes(&path, b"{not json").expect("write");
        let err = load_json::<Value>(&path).expect_err("must fail");
        match err.downcast_ref::<QcError>() {
            Some(QcError::Format { path: p, .. }) => assert_eq!(p, &path),
            other => panic!("unexpected error: {:?}", other),
        }
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
