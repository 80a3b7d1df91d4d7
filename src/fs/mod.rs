use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Extension of the files compass indexes.
pub const PYTHON_EXTENSION: &str = "py";

/// Walks `path` for Python sources, honouring .gitignore and the given
/// ignore globs. Results are sorted.
pub fn walk_python_files(
    path: &Path,
    ignore_patterns: &[String],
    max_file_size: Option<u64>,
) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(path);

    // In the override builder "!glob" ignores and a bare glob whitelists.
    let mut override_builder = ignore::overrides::OverrideBuilder::new(path);
    for pattern in ignore_patterns {
        override_builder.add(&format!("!{}", pattern))?;
    }
    builder.overrides(override_builder.build()?);
    builder.standard_filters(true);
    builder.max_filesize(max_file_size);

    let mut files = Vec::new();
    for result in builder.build() {
        match result {
            Ok(entry) => {
                let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
                let is_python = entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == PYTHON_EXTENSION);
                if is_file && is_python {
                    files.push(entry.into_path());
                }
            }
            Err(err) => tracing::warn!("Error walking directory: {}", err),
        }
    }

    files.sort();
    Ok(files)
}

/// Project-relative, `/`-separated key for a file under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
