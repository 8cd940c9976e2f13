// rust/engine/src/estimate/checkpoint.rs
#![forbid(unsafe_code)]

/*
Checkpoint files (JSON Lines)

line 1      RunHeader: every setting that changes what a class estimate means
line 2..    one ClassEstimate per completed class, appended and flushed as soon
            as the class finishes

A run that stops for any reason leaves a valid prefix. A torn final line (the
process died mid-write) is dropped with a warning and the file is rewritten
before new rows are appended; so is a complete final row that lost its
newline, which would otherwise fuse with the next append. Anything malformed before the last line is an
error: that file was not produced by a clean append.
*/

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::CensusError;

use super::ratio::StoppingRule;
use super::record::ClassEstimate;
use super::sampler::SideToMove;

pub const CHECKPOINT_FORMAT: u32 = 1;

/// Fingerprint of a run. Two checkpoints can be resumed or merged only when
/// their headers are equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub format: u32,
    pub seed: u64,
    pub confidence: f64,
    pub stopping: StoppingRule,
    pub side_to_move: SideToMove,
    pub exact_threshold: u64,
    pub oracle: String,
    pub max_pieces: usize,
    pub shards: u32,
    pub round_size: u64,
}

impl RunHeader {
    /// Names the first differing field, for error messages.
    pub fn first_difference(&self, other: &RunHeader) -> Option<&'static str> {
        if self.format != other.format {
            Some("format")
        } else if self.seed != other.seed {
            Some("seed")
        } else if self.confidence != other.confidence {
            Some("confidence")
        } else if self.stopping != other.stopping {
            Some("stopping rule")
        } else if self.side_to_move != other.side_to_move {
            Some("side to move")
        } else if self.exact_threshold != other.exact_threshold {
            Some("exact threshold")
        } else if self.oracle != other.oracle {
            Some("oracle")
        } else if self.max_pieces != other.max_pieces {
            Some("max pieces")
        } else if self.shards != other.shards {
            Some("shards")
        } else if self.round_size != other.round_size {
            Some("round size")
        } else {
            None
        }
    }
}

/// Parsed checkpoint contents, estimates sorted by class index.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    pub header: RunHeader,
    pub estimates: Vec<ClassEstimate>,
    /// The final line was incomplete and has been ignored.
    pub torn_tail: bool,
}

pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, CensusError> {
    let file = File::open(path)?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()?;

    let mut rows = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, first) = rows
        .next()
        .ok_or_else(|| CensusError::Checkpoint(format!("{}: empty file", path.display())))?;
    let header: RunHeader = serde_json::from_str(first).map_err(|e| {
        CensusError::Checkpoint(format!("{}: bad header: {e}", path.display()))
    })?;
    if header.format != CHECKPOINT_FORMAT {
        return Err(CensusError::Checkpoint(format!(
            "{}: format {} not supported (expected {CHECKPOINT_FORMAT})",
            path.display(),
            header.format
        )));
    }

    let rows: Vec<(usize, &String)> = rows.collect();
    let last = rows.len().saturating_sub(1);
    let mut estimates = Vec::with_capacity(rows.len());
    let mut torn_tail = false;

    for (pos, (line_no, line)) in rows.into_iter().enumerate() {
        match serde_json::from_str::<ClassEstimate>(line) {
            Ok(est) => estimates.push(est),
            Err(e) if pos == last => {
                warn!(
                    "{}:{}: dropping incomplete final line ({e})",
                    path.display(),
                    line_no + 1
                );
                torn_tail = true;
            }
            Err(e) => {
                return Err(CensusError::Checkpoint(format!(
                    "{}:{}: {e}",
                    path.display(),
                    line_no + 1
                )));
            }
        }
    }

    Ok(Checkpoint {
        header,
        estimates: dedup_estimates(estimates)?,
        torn_tail,
    })
}

/// Unions estimates by class index. Identical repeats collapse; conflicting
/// repeats are an error.
pub fn dedup_estimates(estimates: Vec<ClassEstimate>) -> Result<Vec<ClassEstimate>, CensusError> {
    let mut by_index: FxHashMap<u64, ClassEstimate> = FxHashMap::default();
    for est in estimates {
        match by_index.get(&est.index) {
            Some(prev) if *prev == est => {}
            Some(prev) => {
                return Err(CensusError::DuplicateClass {
                    index: est.index,
                    class: if prev.class == est.class {
                        est.class.descriptor()
                    } else {
                        format!("{} / {}", prev.class, est.class)
                    },
                });
            }
            None => {
                by_index.insert(est.index, est);
            }
        }
    }
    let mut out: Vec<ClassEstimate> = by_index.into_values().collect();
    out.sort_by_key(|e| e.index);
    Ok(out)
}

/// Combines checkpoints of range-sharded runs that share one header.
pub fn merge_checkpoints(paths: &[PathBuf]) -> Result<Checkpoint, CensusError> {
    let (first_path, rest) = paths
        .split_first()
        .ok_or_else(|| CensusError::Configuration("no checkpoint files to merge".to_string()))?;

    let base = load_checkpoint(first_path)?;
    let header = base.header;
    let mut all = base.estimates;

    for path in rest {
        let cp = load_checkpoint(path)?;
        if let Some(field) = header.first_difference(&cp.header) {
            return Err(CensusError::Checkpoint(format!(
                "{} was produced with a different {field} than {}",
                path.display(),
                first_path.display()
            )));
        }
        all.extend(cp.estimates);
    }

    let estimates = dedup_estimates(all)?;
    info!(
        "merged {} checkpoint(s): {} distinct classes",
        paths.len(),
        estimates.len()
    );
    Ok(Checkpoint {
        header,
        estimates,
        torn_tail: false,
    })
}

/// Append-only writer; every row is flushed before `append` returns.
pub struct CheckpointWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl CheckpointWriter {
    /// Opens `path` for a run described by `header`.
    ///
    /// A missing or empty file is created with the header. An existing file
    /// must carry an equal header; its completed estimates are returned so the
    /// run can skip them.
    pub fn open(path: &Path, header: &RunHeader) -> Result<(Self, Vec<ClassEstimate>), CensusError> {
        let existing = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        if !existing {
            let mut out = BufWriter::new(File::create(path)?);
            write_row(&mut out, header)?;
            return Ok((
                Self {
                    path: path.to_path_buf(),
                    out,
                },
                Vec::new(),
            ));
        }

        let cp = load_checkpoint(path)?;
        if let Some(field) = cp.header.first_difference(header) {
            return Err(CensusError::Checkpoint(format!(
                "{} belongs to a run with a different {field}; refusing to resume",
                path.display()
            )));
        }

        if cp.torn_tail || !ends_with_newline(path)? {
            rewrite(path, &cp.header, &cp.estimates)?;
        }

        let file = OpenOptions::new().append(true).open(path)?;
        info!(
            "resuming from {}: {} class(es) already done",
            path.display(),
            cp.estimates.len()
        );
        Ok((
            Self {
                path: path.to_path_buf(),
                out: BufWriter::new(file),
            },
            cp.estimates,
        ))
    }

    pub fn append(&mut self, est: &ClassEstimate) -> Result<(), CensusError> {
        write_row(&mut self.out, est)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_row<T: Serialize>(out: &mut BufWriter<File>, row: &T) -> Result<(), CensusError> {
    serde_json::to_writer(&mut *out, row)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn ends_with_newline(path: &Path) -> Result<bool, CensusError> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Replaces `path` with a clean copy through a sibling temp file.
fn rewrite(path: &Path, header: &RunHeader, estimates: &[ClassEstimate]) -> Result<(), CensusError> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        write_row(&mut out, header)?;
        for est in estimates {
            write_row(&mut out, est)?;
        }
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
