use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::DatasetDescriptor;
use crate::error::MirrorError;
use crate::normalize::normalize;

/// Output directory layout for mirrored artifacts.
#[derive(Debug, Clone)]
pub struct Store {
    output_root: Utf8PathBuf,
}

impl Store {
    pub fn new(output_root: Utf8PathBuf) -> Self {
        Self { output_root }
    }

    pub fn artifact_file_name(descriptor: &DatasetDescriptor) -> String {
        format!("{}_{}.csv", descriptor.id, normalize(&descriptor.title))
    }

    pub fn artifact_path(&self, descriptor: &DatasetDescriptor) -> Utf8PathBuf {
        self.output_root.join(Self::artifact_file_name(descriptor))
    }

    pub fn ensure_output_root(&self) -> Result<(), MirrorError> {
        fs::create_dir_all(self.output_root.as_std_path())
            .map_err(|err| MirrorError::Filesystem(format!("create {}: {err}", self.output_root)))
    }

    pub fn write_artifact(
        &self,
        descriptor: &DatasetDescriptor,
        content: &[u8],
    ) -> Result<Utf8PathBuf, MirrorError> {
        check_file_component(&descriptor.id)?;
        self.ensure_output_root()?;
        let path = self.artifact_path(descriptor);
        write_bytes_atomic(&path, content)?;
        Ok(path)
    }
}

/// Dataset ids come from the remote catalog and end up in a filename; they
/// must name a single entry directly inside the output directory.
fn check_file_component(dataset_id: &str) -> Result<(), MirrorError> {
    let unsafe_id = dataset_id.is_empty()
        || dataset_id == "."
        || dataset_id == ".."
        || dataset_id.contains(['/', '\\', '\0']);
    if unsafe_id {
        return Err(MirrorError::Filesystem(format!(
            "dataset id {dataset_id:?} is not a safe file name component"
        )));
    }
    Ok(())
}

/// Writes `content` to a temp file next to `path` and renames it over `path`,
/// so readers observe either the old file or the complete new one.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), MirrorError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| MirrorError::Filesystem(format!("create {parent}: {err}")))?;
    let file_name = path.file_name().unwrap_or("artifact");
    let mut temp = Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| MirrorError::Filesystem(format!("write {path}: {err}")))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| MirrorError::Filesystem(format!("sync {path}: {err}")))?;
    temp.persist(path.as_std_path())
        .map_err(|err| MirrorError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}
