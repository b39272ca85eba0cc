//! Artifact export
//!
//! Writes the classical model bundle, the plain label mapping and, when a
//! network was trained, the portable network directory. Every file goes
//! through a temp file in the destination directory and is renamed into
//! place. After writing, all artifacts are read back and their label maps
//! compared against the bundle's codec.

use signaura_nmf_core::portable::{MODEL_JSON, WEIGHTS_SHARD};
use signaura_nmf_core::{LabelCodec, ModelBundle, PortableNetwork};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::errors::{Result, TrainerError};

pub const BUNDLE_FILE: &str = "nmf_classifier.bin";
pub const LABEL_MAPPING_FILE: &str = "label_mapping.json";
pub const NETWORK_DIR: &str = "nmf_model";

/// Paths of everything written by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArtifacts {
    pub bundle: PathBuf,
    pub label_mapping: PathBuf,
    /// Absent when no network was trained
    pub network_dir: Option<PathBuf>,
}

pub struct Exporter {
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn export(
        &self,
        bundle: &ModelBundle,
        network: Option<&PortableNetwork>,
    ) -> Result<ExportedArtifacts> {
        if let Some(network) = network {
            if network.codec != *bundle.codec() {
                return Err(TrainerError::Export(
                    "network and classifier were trained with different label codecs".to_string(),
                ));
            }
        }

        fs::create_dir_all(&self.output_dir)?;

        let bundle_path = self.output_dir.join(BUNDLE_FILE);
        write_atomic(&bundle_path, &bundle.to_bytes()?)?;
        info!("Model saved to {}", bundle_path.display());

        let mapping_path = self.output_dir.join(LABEL_MAPPING_FILE);
        write_atomic(&mapping_path, bundle.codec().to_mapping_json()?.as_bytes())?;
        info!("Label mapping saved to {}", mapping_path.display());

        let network_dir = match network {
            Some(network) => {
                let dir = self.output_dir.join(NETWORK_DIR);
                fs::create_dir_all(&dir)?;
                let generated_by = format!("signaura-nmf-trainer {}", crate::VERSION);
                let (model_json, shard) = network.render(&generated_by)?;
                write_atomic(&dir.join(WEIGHTS_SHARD), &shard)?;
                write_atomic(&dir.join(MODEL_JSON), model_json.as_bytes())?;
                info!("Portable network saved to {}", dir.display());
                Some(dir)
            }
            None => {
                let stale = self.output_dir.join(NETWORK_DIR);
                if stale.exists() {
                    warn!("Removing {} left over from an earlier run", stale.display());
                    fs::remove_dir_all(&stale)?;
                }
                None
            }
        };

        let artifacts = ExportedArtifacts {
            bundle: bundle_path,
            label_mapping: mapping_path,
            network_dir,
        };
        verify_artifacts(&artifacts, bundle.codec())?;
        Ok(artifacts)
    }
}

/// Write `bytes` to `path` through a synced temp file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        TrainerError::Export(format!("persist {} failed: {}", path.display(), e.error))
    })?;
    Ok(())
}

/// Re-read every artifact and check all label maps equal `expected`
pub fn verify_artifacts(artifacts: &ExportedArtifacts, expected: &LabelCodec) -> Result<()> {
    let check = |what: &str, codec: &LabelCodec| {
        if codec == expected {
            Ok(())
        } else {
            Err(TrainerError::Export(format!(
                "{} label map {:?} disagrees with {:?}",
                what,
                codec.classes(),
                expected.classes()
            )))
        }
    };

    let bundle = ModelBundle::load(&artifacts.bundle)?;
    check("bundle", bundle.codec())?;
    check("mapping", &LabelCodec::read_mapping(&artifacts.label_mapping)?)?;
    match &artifacts.network_dir {
        Some(dir) => check("network", &PortableNetwork::load(dir)?.codec)?,
        None => {
            let unexpected = artifacts
                .bundle
                .parent()
                .map(|dir| dir.join(NETWORK_DIR))
                .filter(|dir| dir.exists());
            if let Some(dir) = unexpected {
                return Err(TrainerError::Export(format!(
                    "{} was not written by this export",
                    dir.display()
                )));
            }
        }
    }
    Ok(())
}
