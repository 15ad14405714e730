//! Persisted snapshots of a [`Trainer`](crate::Trainer).
use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

/// Policy parameters and optimizer state as opaque blobs.
///
/// The encoding of each blob is up to the [`Trainer`](crate::Trainer); the
/// checkpoint only gives them stable names and a file format.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Snapshot of the policy parameters.
    pub model_state_dict: Vec<u8>,

    /// Snapshot of the optimizer state.
    pub optimizer_state_dict: Vec<u8>,
}

impl Checkpoint {
    /// Constructs a checkpoint from the two blobs.
    pub fn new(model_state_dict: Vec<u8>, optimizer_state_dict: Vec<u8>) -> Self {
        Self {
            model_state_dict,
            optimizer_state_dict,
        }
    }

    /// Default file name, `<env_name>_<algorithm_name>_<%Y%m%d_%H%M%S>.ckpt`.
    pub fn default_file_name(env_name: &str, algorithm_name: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        format!("{}_{}_{}.ckpt", env_name, algorithm_name, timestamp)
    }

    /// Default path of a checkpoint in `dir`.
    pub fn default_path(dir: impl AsRef<Path>, env_name: &str, algorithm_name: &str) -> PathBuf {
        dir.as_ref()
            .join(Self::default_file_name(env_name, algorithm_name))
    }

    /// Writes the checkpoint, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
        }
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a checkpoint.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let checkpoint = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Failed to read checkpoint {:?}", path))?;
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_save_load() -> Result<()> {
        let dir = TempDir::new("checkpoint")?;
        let path = dir.path().join("nested").join("model.ckpt");
        let checkpoint = Checkpoint::new(vec![1, 2, 3], vec![4, 5]);
        checkpoint.save(&path)?;
        assert_eq!(Checkpoint::load(&path)?, checkpoint);
        Ok(())
    }

    #[test]
    fn test_default_file_name() {
        let name = Checkpoint::default_file_name("search-deliver", "rmappo");
        assert!(name.starts_with("search-deliver_rmappo_"));
        assert!(name.ends_with(".ckpt"));
        // %Y%m%d_%H%M%S
        let stamp = &name["search-deliver_rmappo_".len()..name.len() - ".ckpt".len()];
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }
}
