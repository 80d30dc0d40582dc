use std::path::{Path, PathBuf};

use miner_core::rigs::{parse_rig_line, read_rigs_from_path};
use miner_core::{RigListError, RigSpec, RigSpecError};
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub(crate) enum RigsError {
    /// Clap-логика должна гарантировать источник ригов
    #[error("rigs source is missing: provide --rigs-file and/or --rig")]
    MissingSource,

    #[error("rig list is empty (file: {path:?})")]
    EmptyFromFile { path: PathBuf },

    #[error("failed to read rigs file {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: RigListError,
    },

    #[error("bad --rig value {raw:?}: {source}")]
    BadRigArg {
        raw: String,
        #[source]
        source: RigSpecError,
    },
}

pub(crate) type Result<T> = std::result::Result<T, RigsError>;

/// Риги из `--rigs-file`, затем из каждого `--rig`
pub(crate) fn load_rigs(args: &Args) -> Result<Vec<RigSpec>> {
    let mut rigs = Vec::new();

    if let Some(path) = &args.rigs_file {
        let from_file = load_from_file(path)?;
        if from_file.is_empty() && args.rig.is_empty() {
            return Err(RigsError::EmptyFromFile { path: path.clone() });
        }
        rigs.extend(from_file);
    }

    for raw in &args.rig {
        rigs.push(load_from_arg(raw)?);
    }

    if rigs.is_empty() {
        return Err(RigsError::MissingSource);
    }

    Ok(rigs)
}

fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<RigSpec>> {
    let path = path.as_ref().to_path_buf();

    read_rigs_from_path(&path).map_err(|source| RigsError::ReadFile { path, source })
}

fn load_from_arg(raw: &str) -> Result<RigSpec> {
    parse_rig_line(raw).map_err(|source| RigsError::BadRigArg {
        raw: raw.to_string(),
        source,
    })
}
