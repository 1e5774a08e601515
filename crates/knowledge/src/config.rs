//! Workspace paths for knowledge base storage.

use std::path::{Path, PathBuf};

/// Get the `.docbase` directory of a workspace.
pub fn get_docbase_dir(workspace: &Path) -> PathBuf {
    workspace.join(".docbase")
}

/// Get the directory holding every base's storage.
pub fn get_bases_dir(workspace: &Path) -> PathBuf {
    get_docbase_dir(workspace).join("bases")
}

/// Get the storage directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_id: &str) -> PathBuf {
    get_bases_dir(workspace).join(base_id)
}

/// Get the document repository manifest path.
pub fn get_manifest_path(workspace: &Path) -> PathBuf {
    get_docbase_dir(workspace).join("docrepo.json")
}
