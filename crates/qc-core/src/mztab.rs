//! Minimal mzTab 1.0 (Summary / Identification) model and writer.
//!
//! Only the sections the QC report needs are produced: `MTD`, `PEH`/`PEP`
//! (one row per consensus feature) and `PSH`/`PSM` (one row per peptide
//! identification, hitless ones included). Annotations of an identification and
//! of its top hit are exported as `opt_global_<key>` columns.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use crate::consensus::ConsensusMap;
use crate::identification::PeptideIdentification;
use crate::{atomic_write_bytes, SOURCE_GROUP_KEY};

const NULL: &str = "null";

/// `[cv_label, accession, name, value]` parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MzTabParameter {
    pub cv_label: String,
    pub accession: String,
    pub name: String,
    pub value: String,
}

impl fmt::Display for MzTabParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.cv_label, self.accession, self.name, self.value
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MzTabMetaData {
    pub version: String,
    pub mode: String,
    pub kind: String,
    pub description: String,
    pub ms_run_locations: Vec<String>,
    /// Custom parameters keyed from 0; written as `custom[key + 1]`.
    pub custom: BTreeMap<usize, MzTabParameter>,
}

impl Default for MzTabMetaData {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            mode: "Summary".to_string(),
            kind: "Identification".to_string(),
            description: String::new(),
            ms_run_locations: Vec::new(),
            custom: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PepRow {
    pub sequence: Option<String>,
    pub accession: Option<String>,
    pub charge: i32,
    pub mz: f64,
    pub rt: f64,
    pub abundance: f64,
    pub best_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsmRow {
    pub psm_id: usize,
    pub sequence: Option<String>,
    pub accession: Option<String>,
    pub charge: Option<i32>,
    pub mz: f64,
    pub rt: f64,
    pub score: Option<f64>,
    pub spectra_ref: Option<String>,
    pub opt: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MzTab {
    pub meta: MzTabMetaData,
    pub peptides: Vec<PepRow>,
    pub psms: Vec<PsmRow>,
}

impl MzTab {
    /// Builds the report tables from a (conflict-resolved) consensus map.
    pub fn from_consensus_map(map: &ConsensusMap, source_name: &str) -> Self {
        let mut meta = MzTabMetaData {
            description: format!("QC export of consensus map {}", source_name),
            ..MzTabMetaData::default()
        };
        let mut run_index_by_identifier: HashMap<&str, usize> = HashMap::new();
        for prot in &map.protein_identifications {
            for path in &prot.primary_ms_run_path {
                if !meta.ms_run_locations.contains(path) {
                    meta.ms_run_locations.push(path.clone());
                }
            }
            if let Some(first) = prot.primary_ms_run_path.first() {
                if let Some(pos) = meta.ms_run_locations.iter().position(|p| p == first) {
                    run_index_by_identifier.insert(prot.identifier.as_str(), pos + 1);
                }
            }
        }

        let peptides = map
            .features
            .iter()
            .map(|feature| {
                let best = feature
                    .peptide_identifications
                    .first()
                    .and_then(|id| id.top_hit());
                PepRow {
                    sequence: best.map(|h| h.sequence.clone()),
                    accession: best.and_then(|h| h.protein_accessions.first().cloned()),
                    charge: feature.charge,
                    mz: feature.mz,
                    rt: feature.rt,
                    abundance: feature.intensity,
                    best_score: best.map(|h| h.score),
                }
            })
            .collect();

        let all_ids = map
            .features
            .iter()
            .flat_map(|f| f.peptide_identifications.iter())
            .chain(map.unassigned_peptide_identifications.iter());
        let psms = all_ids
            .enumerate()
            .map(|(i, id)| psm_row(i + 1, id, &run_index_by_identifier))
            .collect();

        Self {
            meta,
            peptides,
            psms,
        }
    }

    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        let m = &self.meta;
        push_row(&mut out, &["MTD", "mzTab-version", &m.version]);
        push_row(&mut out, &["MTD", "mzTab-mode", &m.mode]);
        push_row(&mut out, &["MTD", "mzTab-type", &m.kind]);
        push_row(&mut out, &["MTD", "description", &m.description]);
        for (i, location) in m.ms_run_locations.iter().enumerate() {
            push_row(
                &mut out,
                &["MTD", &format!("ms_run[{}]-location", i + 1), location],
            );
        }
        for (key, param) in m.custom.iter() {
            push_row(
                &mut out,
                &["MTD", &format!("custom[{}]", key + 1), &param.to_string()],
            );
        }
        out.push('\n');

        push_row(
            &mut out,
            &[
                "PEH",
                "sequence",
                "accession",
                "charge",
                "mass_to_charge",
                "retention_time",
                "peptide_abundance_study_variable[1]",
                "best_search_engine_score[1]",
            ],
        );
        for row in &self.peptides {
            push_row(
                &mut out,
                &[
                    "PEP",
                    row.sequence.as_deref().unwrap_or(NULL),
                    row.accession.as_deref().unwrap_or(NULL),
                    &row.charge.to_string(),
                    &row.mz.to_string(),
                    &row.rt.to_string(),
                    &row.abundance.to_string(),
                    &opt_to_string(row.best_score),
                ],
            );
        }
        out.push('\n');

        let opt_keys: BTreeSet<&str> = self
            .psms
            .iter()
            .flat_map(|r| r.opt.keys().map(|k| k.as_str()))
            .collect();
        let mut header: Vec<String> = [
            "PSH",
            "sequence",
            "PSM_ID",
            "accession",
            "charge",
            "exp_mass_to_charge",
            "retention_time",
            "search_engine_score[1]",
            "spectra_ref",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend(opt_keys.iter().map(|k| format!("opt_global_{}", k)));
        let header_refs: Vec<&str> = header.iter().map(|s| s.as_str()).collect();
        push_row(&mut out, &header_refs);
        for row in &self.psms {
            let mut cells: Vec<String> = vec![
                "PSM".to_string(),
                row.sequence.clone().unwrap_or_else(|| NULL.to_string()),
                row.psm_id.to_string(),
                row.accession.clone().unwrap_or_else(|| NULL.to_string()),
                row.charge
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| NULL.to_string()),
                row.mz.to_string(),
                row.rt.to_string(),
                opt_to_string(row.score),
                row.spectra_ref.clone().unwrap_or_else(|| NULL.to_string()),
            ];
            for key in opt_keys.iter() {
                cells.push(row.opt.get(*key).cloned().unwrap_or_else(|| NULL.to_string()));
            }
            let refs: Vec<&str> = cells.iter().map(|s| s.as_str()).collect();
            push_row(&mut out, &refs);
        }
        out
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        atomic_write_bytes(path, self.to_tsv().as_bytes())
    }
}

fn psm_row(
    psm_id: usize,
    id: &PeptideIdentification,
    run_index_by_identifier: &HashMap<&str, usize>,
) -> PsmRow {
    let hit = id.top_hit();
    let mut opt = BTreeMap::new();
    for (key, value) in id.meta.iter() {
        opt.insert(key.to_string(), sanitize_cell(&value.to_string()));
    }
    if let Some(hit) = hit {
        for (key, value) in hit.meta.iter() {
            opt.insert(key.to_string(), sanitize_cell(&value.to_string()));
        }
    }
    // the source-group stamp is bookkeeping, not a reported annotation
    opt.remove(SOURCE_GROUP_KEY);
    let run_index = run_index_by_identifier
        .get(id.identifier.as_str())
        .copied()
        .unwrap_or(1);
    PsmRow {
        psm_id,
        sequence: hit.map(|h| h.sequence.clone()),
        accession: hit.and_then(|h| h.protein_accessions.first().cloned()),
        charge: hit.map(|h| h.charge),
        mz: id.mz,
        rt: id.rt,
        score: hit.map(|h| h.score),
        spectra_ref: id
            .spectrum_reference
            .as_ref()
            .map(|r| format!("ms_run[{}]:{}", run_index, r)),
        opt,
    }
}

fn opt_to_string(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NULL.to_string())
}

fn sanitize_cell(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

fn push_row(out: &mut String, cells: &[&str]) {
    out.push_str(&cells.join("\t"));
    out.push('\n');
}
