use anyhow::{anyhow, Context, Result};
use qc_core::{
    atomic_write_json_pretty, load_fasta, load_json, sha256_file, ConsensusMap, FastaEntry,
    FeatureMap, IdGroup, MsExperiment, MzTab, MzTabMetaData, MzTabParameter,
    PeptideIdentification, QcError, SpectraMap, TransformationDescription, SOURCE_GROUP_KEY,
    UID_KEY,
};
use qc_metrics::{
    standard_metrics, MetricParams, QcMetric, Requirement, RunInput, Status, SummarySeries,
    SummaryValue,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct QcInputs {
    pub in_cm: PathBuf,
    pub in_raw: Vec<PathBuf>,
    pub in_post_fdr: Vec<PathBuf>,
    pub in_trafo: Vec<PathBuf>,
    pub in_contaminants: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct QcOutputs {
    pub out: PathBuf,
    pub out_cm: Option<PathBuf>,
    pub out_feat: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedMetric {
    pub name: &'static str,
    pub missing: Vec<Requirement>,
}

#[derive(Debug, Serialize)]
pub struct QcPlan {
    pub number_exps: usize,
    pub status: Status,
    pub runnable: Vec<&'static str>,
    pub skipped: Vec<SkippedMetric>,
}

#[derive(Debug, Serialize)]
pub struct QcRunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub report_path: PathBuf,
    pub number_exps: usize,
    pub status: Status,
    pub executed: Vec<&'static str>,
    pub skipped: Vec<SkippedMetric>,
    pub merged_ids: usize,
    pub staged_ids: usize,
    pub dropped_conflicts: usize,
    pub custom_entries: usize,
    pub in_cm_sha256: String,
}

// ---------------------------------------------------------------------------
// per-run file lists
// ---------------------------------------------------------------------------

/// Checks that every non-empty per-run file list describes the same number
/// of runs, and records which inputs are present.
#[derive(Debug, Default)]
pub struct FileListValidator {
    number_exps: Option<usize>,
    status: Status,
}

impl FileListValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check<'a>(
        &mut self,
        port: &str,
        files: &'a [PathBuf],
        req: Requirement,
    ) -> Result<&'a [PathBuf]> {
        if files.is_empty() {
            return Ok(files);
        }
        let expected = *self.number_exps.get_or_insert(files.len());
        if expected != files.len() {
            return Err(anyhow!(QcError::illegal(
                port,
                format!(
                    "invalid number of files ({}), expected {}",
                    files.len(),
                    expected
                )
            )));
        }
        self.status.insert(req);
        Ok(files)
    }

    pub fn number_exps(&self) -> usize {
        self.number_exps.unwrap_or(0)
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

fn validate_inputs(inputs: &QcInputs) -> Result<(usize, Status)> {
    let mut validator = FileListValidator::new();
    validator.check("in_raw", &inputs.in_raw, Requirement::RawMzml)?;
    validator.check("in_post_fdr", &inputs.in_post_fdr, Requirement::PostFdrFeat)?;
    validator.check("in_trafo", &inputs.in_trafo, Requirement::TrafoAlign)?;
    let mut status = validator.status();
    status.note_availability(Requirement::Contaminants, inputs.in_contaminants.is_some());
    Ok((validator.number_exps(), status))
}

// ---------------------------------------------------------------------------
// identity join: UID -> canonical identification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdHandle {
    pub group: IdGroup,
    pub slot: usize,
}

/// Maps each canonical identification's `UID` to its position in the
/// consensus map. Handles stay valid while the map only grows.
#[derive(Debug, Default)]
pub struct IdJoinIndex {
    by_uid: HashMap<String, IdHandle>,
}

fn require_uid<'a>(id: &'a PeptideIdentification, context: &str) -> Result<Cow<'a, str>> {
    if let Some(uid) = id.uid() {
        return Ok(uid);
    }
    let message = match id.meta.get(UID_KEY) {
        Some(value) => format!(
            "unique key (UID) on peptide identification must be a string or integer, found '{}'",
            value
        ),
        None => "missing unique key (UID) on peptide identification; run required precomputation first"
            .to_string(),
    };
    Err(anyhow!(QcError::illegal(context, message)))
}

impl IdJoinIndex {
    /// Indexes every identification (assigned and unassigned) and stamps it
    /// with its source group.
    pub fn build(cmap: &mut ConsensusMap) -> Result<Self> {
        let mut by_uid = HashMap::new();
        let groups: Vec<IdGroup> = cmap.groups().collect();
        for group in groups {
            let ids = match cmap.peptide_identifications_mut(group) {
                Some(ids) => ids,
                None => continue,
            };
            for (slot, id) in ids.iter_mut().enumerate() {
                let uid = require_uid(id, "in_cm")?.into_owned();
                id.meta.set(SOURCE_GROUP_KEY, group.stamp());
                if let Some(previous) = by_uid.insert(uid.clone(), IdHandle { group, slot }) {
                    warn!(
                        uid = %uid,
                        previous = %previous.group,
                        current = %group,
                        "duplicate UID in consensus map, later identification wins"
                    );
                }
            }
        }
        Ok(Self { by_uid })
    }

    pub fn get(&self, uid: &str) -> Option<IdHandle> {
        self.by_uid.get(uid).copied()
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

// ---------------------------------------------------------------------------
// run path -> protein identification identifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RunIdentifierMap {
    by_run_path: BTreeMap<Vec<String>, String>,
}

impl RunIdentifierMap {
    pub fn build(cmap: &ConsensusMap) -> Result<Self> {
        let mut by_run_path = BTreeMap::new();
        for prot in &cmap.protein_identifications {
            let key = prot.primary_ms_run_path.clone();
            if by_run_path.contains_key(&key) {
                return Err(anyhow!(QcError::illegal(
                    "in_cm",
                    format!(
                        "multiple protein identifications share the run path signature {:?}",
                        key
                    )
                )));
            }
            by_run_path.insert(key, prot.identifier.clone());
        }
        Ok(Self { by_run_path })
    }

    pub fn lookup(&self, run_path: &[String]) -> Result<&str> {
        self.by_run_path
            .get(run_path)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                anyhow!(QcError::illegal(
                    "in_post_fdr",
                    format!(
                        "feature map (MS run {:?}) does not correspond to any run of the consensus map, check input",
                        run_path
                    )
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.by_run_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_run_path.is_empty()
    }
}

/// Stamps `created` with the identifier of the run's protein identification
/// and appends them to `staged`. On lookup failure `staged` is left untouched.
pub fn stage_synthesized(
    created: Vec<PeptideIdentification>,
    run_path: &[String],
    identifiers: &RunIdentifierMap,
    staged: &mut Vec<PeptideIdentification>,
) -> Result<usize> {
    let identifier = identifiers.lookup(run_path)?;
    let count = created.len();
    staged.extend(created.into_iter().map(|mut id| {
        id.identifier = identifier.to_string();
        id
    }));
    Ok(count)
}

// ---------------------------------------------------------------------------
// scheduling
// ---------------------------------------------------------------------------

/// Splits metrics into runnable (by index) and skipped with the exact
/// requirements each one lacks.
pub fn schedule(metrics: &[Box<dyn QcMetric>], status: Status) -> (Vec<usize>, Vec<SkippedMetric>) {
    let mut runnable = Vec::new();
    let mut skipped = Vec::new();
    for (i, metric) in metrics.iter().enumerate() {
        if status.is_superset_of(metric.requires()) {
            runnable.push(i);
        } else {
            skipped.push(SkippedMetric {
                name: metric.name(),
                missing: metric.requires().difference(status),
            });
        }
    }
    (runnable, skipped)
}

fn warn_skipped(skipped: &[SkippedMetric]) {
    for metric in skipped {
        for req in &metric.missing {
            warn!(
                "metric '{}' cannot run because input data '{}' ({}) is missing",
                metric.name,
                req.name(),
                req.input_param()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// merge-back
// ---------------------------------------------------------------------------

/// Copies identification-level and top-hit annotations of `transient`
/// identifications onto their canonical counterparts. Hitless identifications
/// are skipped. When several metrics wrote the same key the value present in
/// `transient` (the last writer) is what lands in the canonical map.
pub fn merge_peptide_ids(
    transient: &[PeptideIdentification],
    index: &IdJoinIndex,
    cmap: &mut ConsensusMap,
) -> Result<usize> {
    let mut merged = 0;
    for source in transient {
        if source.hits.is_empty() {
            continue;
        }
        let uid = require_uid(source, "in_post_fdr")?;
        let handle = index.get(&uid).ok_or_else(|| {
            anyhow!(QcError::illegal(
                "in_post_fdr",
                format!("UID '{}' does not exist in the consensus map", uid)
            ))
        })?;
        let target = cmap
            .peptide_identification_mut(handle.group, handle.slot)
            .ok_or_else(|| anyhow!("join index entry for UID '{}' is stale", uid))?;
        target.meta.copy_from(&source.meta);
        if let (Some(from), Some(to)) = (source.top_hit(), target.top_hit_mut()) {
            to.meta.copy_from(&from.meta);
        }
        merged += 1;
    }
    Ok(merged)
}

pub fn merge_feature_map(
    fmap: &FeatureMap,
    index: &IdJoinIndex,
    cmap: &mut ConsensusMap,
) -> Result<usize> {
    let mut merged = merge_peptide_ids(&fmap.unassigned_peptide_identifications, index, cmap)?;
    for feature in &fmap.features {
        merged += merge_peptide_ids(&feature.peptide_identifications, index, cmap)?;
    }
    Ok(merged)
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

const SUMMARY_ORDER: [&str; 2] = ["TIC", "MS2_ID_Rate"];

fn render_summary_value(value: &SummaryValue) -> String {
    match value {
        SummaryValue::Curve(points) => format!(
            "[{}]",
            points
                .iter()
                .map(|(x, y)| format!("{}, {}", x, y))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        SummaryValue::Rate(rate) => (100.0 * rate).to_string(),
    }
}

/// Adds one custom entry per run, named `<KIND>_<run>`, with keys counting up
/// from the current number of entries and never replacing an existing one.
pub fn append_summary(meta: &mut MzTabMetaData, series: &SummarySeries) -> usize {
    let mut key = meta.custom.len();
    for (i, value) in series.values.iter().enumerate() {
        while meta.custom.contains_key(&key) {
            key += 1;
        }
        meta.custom.insert(
            key,
            MzTabParameter {
                cv_label: series.cv_label.to_string(),
                accession: series.accession.to_string(),
                name: format!("{}_{}", series.kind, i + 1),
                value: render_summary_value(value),
            },
        );
    }
    series.values.len()
}

pub struct AssembledReport {
    pub mztab: MzTab,
    pub dropped_conflicts: usize,
    pub custom_entries: usize,
}

/// Resolves identification conflicts, attaches staged identifications as
/// unassigned, exports the map and appends the per-run summaries.
pub fn assemble_report(
    cmap: &mut ConsensusMap,
    staged: Vec<PeptideIdentification>,
    metrics: &[Box<dyn QcMetric>],
    source_name: &str,
) -> AssembledReport {
    let dropped_conflicts = cmap.resolve_id_conflicts();
    cmap.unassigned_peptide_identifications.extend(staged);
    let mut mztab = MzTab::from_consensus_map(cmap, source_name);

    let mut series: Vec<SummarySeries> = metrics.iter().filter_map(|m| m.summary()).collect();
    series.sort_by_key(|s| {
        SUMMARY_ORDER
            .iter()
            .position(|k| *k == s.kind)
            .unwrap_or(SUMMARY_ORDER.len())
    });
    let custom_entries = series
        .iter()
        .map(|s| append_summary(&mut mztab.meta, s))
        .sum();
    AssembledReport {
        mztab,
        dropped_conflicts,
        custom_entries,
    }
}

// ---------------------------------------------------------------------------
// pipeline
// ---------------------------------------------------------------------------

pub fn load_params(path: &Path) -> Result<MetricParams> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read params file {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(MetricParams::default());
    }
    let params: MetricParams = serde_yaml::from_str(&raw).map_err(|e| {
        anyhow!(QcError::Format {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })?;
    let tolerance = params.fragment_mass_error.tolerance;
    if tolerance.is_nan() || tolerance <= 0.0 {
        return Err(anyhow!(QcError::illegal(
            "fragment_mass_error.tolerance",
            "must be a positive number"
        )));
    }
    Ok(params)
}

pub fn describe_quality_control(inputs: &QcInputs) -> Result<QcPlan> {
    let (number_exps, status) = validate_inputs(inputs)?;
    let metrics = standard_metrics(&MetricParams::default());
    let (runnable, skipped) = schedule(&metrics, status);
    Ok(QcPlan {
        number_exps,
        status,
        runnable: runnable.iter().map(|&i| metrics[i].name()).collect(),
        skipped,
    })
}

pub fn run_quality_control(
    inputs: &QcInputs,
    outputs: &QcOutputs,
    params: &MetricParams,
) -> Result<QcRunResult> {
    let started_at = Utc::now();
    let (number_exps, status) = validate_inputs(inputs)?;
    if !outputs.out_feat.is_empty() && outputs.out_feat.len() != number_exps {
        return Err(anyhow!(QcError::illegal(
            "out_feat",
            format!(
                "invalid number of files ({}), expected {}",
                outputs.out_feat.len(),
                number_exps
            )
        )));
    }
    info!(runs = number_exps, status = %status, "starting quality control");

    let contaminants: Vec<FastaEntry> = match &inputs.in_contaminants {
        Some(path) => load_fasta(path)?,
        None => Vec::new(),
    };

    let in_cm_sha256 = sha256_file(&inputs.in_cm)?;
    let mut cmap: ConsensusMap = load_json(&inputs.in_cm)
        .with_context(|| format!("failed to load consensus map {}", inputs.in_cm.display()))?;
    let join_index = IdJoinIndex::build(&mut cmap)?;
    let identifiers = RunIdentifierMap::build(&cmap)?;
    debug!(
        ids = join_index.len(),
        runs = identifiers.len(),
        "consensus map indexed"
    );

    let mut metrics = standard_metrics(params);
    let (runnable, skipped) = schedule(&metrics, status);
    if number_exps > 0 {
        warn_skipped(&skipped);
    }

    let mut staged: Vec<PeptideIdentification> = Vec::new();
    let mut merged_ids = 0usize;
    for i in 0..number_exps {
        info!(run = i + 1, of = number_exps, "processing run");
        let exp: MsExperiment = match inputs.in_raw.get(i) {
            Some(path) => load_json(path)?,
            None => MsExperiment::default(),
        };
        let spectra_map = SpectraMap::calculate(&exp);
        let mut fmap: FeatureMap = match inputs.in_post_fdr.get(i) {
            Some(path) => load_json(path)?,
            None => FeatureMap::default(),
        };
        let trafo: TransformationDescription = match inputs.in_trafo.get(i) {
            Some(path) => load_json(path)?,
            None => TransformationDescription::default(),
        };

        let mut run = RunInput {
            run_index: i,
            features: &mut fmap,
            spectra: &exp,
            spectra_map: &spectra_map,
            transformation: &trafo,
            contaminants: &contaminants,
        };
        for &m in &runnable {
            let metric = &mut metrics[m];
            let created = metric
                .compute(&mut run)
                .with_context(|| format!("metric '{}' failed on run {}", metric.name(), i + 1))?;
            if !created.is_empty() {
                let count = stage_synthesized(
                    created,
                    &run.features.primary_ms_run_path,
                    &identifiers,
                    &mut staged,
                )?;
                debug!(metric = metric.name(), run = i + 1, count, "staged new identifications");
            }
        }

        if let Some(path) = outputs.out_feat.get(i) {
            atomic_write_json_pretty(path, &fmap)?;
        }
        merged_ids += merge_feature_map(&fmap, &join_index, &mut cmap)?;
    }
    // handles must not be used once staged identifications change the map
    drop(join_index);

    let staged_ids = staged.len();
    let source_name = inputs.in_cm.display().to_string();
    let report = assemble_report(&mut cmap, staged, &metrics, &source_name);
    if let Some(path) = &outputs.out_cm {
        atomic_write_json_pretty(path, &cmap)?;
    }
    report.mztab.store(&outputs.out)?;
    info!(
        report = %outputs.out.display(),
        merged = merged_ids,
        staged = staged_ids,
        "quality control finished"
    );

    Ok(QcRunResult {
        started_at,
        finished_at: Utc::now(),
        report_path: outputs.out.clone(),
        number_exps,
        status,
        executed: if number_exps == 0 {
            Vec::new()
        } else {
            runnable.iter().map(|&i| metrics[i].name()).collect()
        },
        skipped,
        merged_ids,
        staged_ids,
        dropped_conflicts: report.dropped_conflicts,
        custom_entries: report.custom_entries,
        in_cm_sha256,
    })
}
