//! Persistent cache of the runtime's support files.
//!
//! The payloads are embedded in the binary; the cache exists so the runtime
//! can load them from disk paths, and it is re-verified against the embedded
//! bytes on every bootstrap. Any mismatch throws the whole directory away and
//! re-extracts rather than patching files in place.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

pub struct Artifact {
    pub file_name: &'static str,
    pub payload: &'static [u8],
}

pub const ARTIFACTS: [Artifact; 2] = [
    Artifact { file_name: "prelude.rhai", payload: include_bytes!("../runtime/prelude.rhai") },
    Artifact { file_name: "palette.rhai", payload: include_bytes!("../runtime/palette.rhai") },
];

impl Artifact {
    pub fn known_digest(&self) -> blake3::Hash {
        blake3::hash(self.payload)
    }
}

/// Versioned, platform-scoped cache directory under `root`.
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join("rivet")
        .join(env!("CARGO_PKG_VERSION"))
        .join(format!("{}-{}", env::consts::OS, env::consts::ARCH))
}

pub struct PreparedCache {
    /// Directory the runtime should load support files from.
    pub dir: PathBuf,
    /// Staging directory left behind when the atomic publish lost a race;
    /// deleted best-effort at shutdown.
    pub scratch: Option<PathBuf>,
}

/// True when every artifact exists in `dir` and matches its known digest.
pub fn verify(dir: &Path) -> bool {
    ARTIFACTS.iter().all(|artifact| match fs::read(dir.join(artifact.file_name)) {
        Ok(bytes) => blake3::hash(&bytes) == artifact.known_digest(),
        Err(_) => false,
    })
}

/// Ensures a verified cache directory exists under `root` and returns it.
///
/// A corrupted or partial directory is removed and rebuilt from the embedded
/// payloads in a staging directory that is renamed into place. If the rename
/// fails (another process may have published first) the staging directory is
/// used directly and reported as scratch.
pub fn prepare(root: &Path) -> Result<PreparedCache> {
    prepare_with(root, |stage, dir| fs::rename(stage, dir))
}

fn prepare_with(
    root: &Path,
    publish: impl FnOnce(&Path, &Path) -> std::io::Result<()>,
) -> Result<PreparedCache> {
    let dir = cache_dir(root);
    if dir.is_dir() && verify(&dir) {
        return Ok(PreparedCache { dir, scratch: None });
    }
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("removing stale cache directory {}", dir.display()))?;
    }

    let parent = dir.parent().context("cache directory has no parent")?;
    let stage = parent.join(format!(".stage-{}", process::id()));
    if stage.exists() {
        fs::remove_dir_all(&stage)
            .with_context(|| format!("clearing leftover staging directory {}", stage.display()))?;
    }
    fs::create_dir_all(&stage)
        .with_context(|| format!("creating staging directory {}", stage.display()))?;
    for artifact in &ARTIFACTS {
        let path = stage.join(artifact.file_name);
        fs::write(&path, artifact.payload)
            .with_context(|| format!("writing support file {}", path.display()))?;
    }

    match publish(&stage, &dir) {
        Ok(()) => Ok(PreparedCache { dir, scratch: None }),
        Err(err) => {
            eprintln!("[cache] publish to {} failed ({err}); using staging directory", dir.display());
            Ok(PreparedCache { dir: stage.clone(), scratch: Some(stage) })
        }
    }
}

/// Default cache root: platform cache dir, else the system temp dir.
pub fn default_root() -> PathBuf {
    dirs::cache_dir().unwrap_or_else(env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn prepare_extracts_and_verifies() {
        let root = tempdir().expect("temp dir");
        let prepared = prepare(root.path()).expect("prepare");
        assert!(prepared.scratch.is_none());
        assert_eq!(prepared.dir, cache_dir(root.path()));
        assert!(verify(&prepared.dir));
    }

    #[test]
    fn corrupted_artifact_triggers_full_reextraction() {
        let root = tempdir().expect("temp dir");
        let prepared = prepare(root.path()).expect("prepare");

        let target = prepared.dir.join(ARTIFACTS[0].file_name);
        let mut bytes = fs::read(&target).expect("read artifact");
        bytes[0] ^= 0xff;
        fs::write(&target, &bytes).expect("corrupt artifact");
        assert!(!verify(&prepared.dir));

        let repaired = prepare(root.path()).expect("re-prepare");
        assert!(verify(&repaired.dir));
        for artifact in &ARTIFACTS {
            let on_disk = fs::read(repaired.dir.join(artifact.file_name)).expect("read");
            assert_eq!(blake3::hash(&on_disk), artifact.known_digest());
        }
    }

    #[test]
    fn lost_publish_race_falls_back_to_the_staging_directory() {
        let root = tempdir().expect("temp dir");
        let prepared = prepare_with(root.path(), |_, _| {
            Err(std::io::Error::new(std::io::ErrorKind::AlreadyExists, "published elsewhere"))
        })
        .expect("prepare");

        let scratch = prepared.scratch.as_deref().expect("stage dir reported as scratch");
        assert_eq!(prepared.dir, scratch);
        assert!(
            prepared.dir.file_name().is_some_and(|n| n.to_string_lossy().starts_with(".stage-")),
            "runtime loads straight from the staging directory"
        );
        assert!(verify(&prepared.dir));
    }

    #[test]
    fn missing_artifact_fails_verification() {
        let root = tempdir().expect("temp dir");
        let prepared = prepare(root.path()).expect("prepare");
        fs::remove_file(prepared.dir.join(ARTIFACTS[1].file_name)).expect("remove");
        assert!(!verify(&prepared.dir));
    }
}
