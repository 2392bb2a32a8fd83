//! Slicer executable resolution
//!
//! Resolution order: an explicitly configured path, then the `PATH`
//! search for the known command names, then the per-platform install
//! locations. A configured path that does not exist is reported as
//! not found; it never falls back to the search.

use printkit_core::SliceError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Command names the slicer ships under
pub const SLICER_NAMES: [&str; 3] = ["prusa-slicer", "prusa-slicer-console", "prusa_slicer"];

/// Finds the slicer executable
#[derive(Debug, Clone, Default)]
pub struct SlicerLocator {
    configured: Option<PathBuf>,
    search_path: Option<OsString>,
    well_known: Vec<PathBuf>,
}

impl SlicerLocator {
    /// Locator for this machine: the process `PATH` and the platform's
    /// install locations
    pub fn system(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            search_path: std::env::var_os("PATH"),
            well_known: well_known_locations(),
        }
    }

    /// Locator over an explicit search path and location list
    pub fn new(
        configured: Option<PathBuf>,
        search_path: Option<OsString>,
        well_known: Vec<PathBuf>,
    ) -> Self {
        Self {
            configured,
            search_path,
            well_known,
        }
    }

    /// Resolve the executable, or report every candidate that was tried
    pub fn resolve(&self) -> Result<PathBuf, SliceError> {
        if let Some(configured) = &self.configured {
            if is_executable(configured) {
                return Ok(configured.clone());
            }
            tracing::warn!("Configured slicer {} not found", configured.display());
            return Err(SliceError::ToolNotFound {
                searched: vec![configured.display().to_string()],
            });
        }

        let mut searched = Vec::new();

        if let Some(search_path) = &self.search_path {
            for name in command_names() {
                for dir in std::env::split_paths(search_path) {
                    let candidate = dir.join(&name);
                    if is_executable(&candidate) {
                        tracing::debug!("Found slicer on PATH: {}", candidate.display());
                        return Ok(candidate);
                    }
                }
                searched.push(name);
            }
        }

        for candidate in &self.well_known {
            if is_executable(candidate) {
                tracing::debug!("Found slicer at {}", candidate.display());
                return Ok(candidate.clone());
            }
            searched.push(candidate.display().to_string());
        }

        Err(SliceError::ToolNotFound { searched })
    }
}

fn command_names() -> Vec<String> {
    let names = SLICER_NAMES.iter().map(|name| name.to_string());
    if cfg!(windows) {
        SLICER_NAMES
            .iter()
            .map(|name| format!("{}.exe", name))
            .chain(names)
            .collect()
    } else {
        names.collect()
    }
}

/// Install locations checked when nothing is on `PATH`
pub fn well_known_locations() -> Vec<PathBuf> {
    if cfg!(windows) {
        let program_files = std::env::var_os("ProgramFiles")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Program Files"));
        vec![
            program_files
                .join("Prusa3D")
                .join("PrusaSlicer")
                .join("prusa-slicer.exe"),
            program_files.join("PrusaSlicer").join("prusa-slicer.exe"),
        ]
    } else if cfg!(target_os = "macos") {
        vec![PathBuf::from(
            "/Applications/PrusaSlicer.app/Contents/MacOS/PrusaSlicer",
        )]
    } else {
        vec![
            PathBuf::from("/usr/bin/prusa-slicer"),
            PathBuf::from("/usr/bin/prusa-slicer-console"),
            PathBuf::from("/snap/bin/prusa-slicer"),
        ]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_path_does_not_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let locator = SlicerLocator::new(
            Some(dir.path().join("nope")),
            Some(std::env::var_os("PATH").unwrap_or_default()),
            well_known_locations(),
        );
        match locator.resolve() {
            Err(SliceError::ToolNotFound { searched }) => assert_eq!(searched.len(), 1),
            other => panic!("expected ToolNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_nothing_found_lists_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let locator = SlicerLocator::new(
            None,
            Some(dir.path().as_os_str().to_owned()),
            vec![dir.path().join("PrusaSlicer")],
        );
        let err = locator.resolve().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("prusa-slicer"));
        assert!(text.contains("PrusaSlicer"));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_search_skips_non_executables() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("prusa-slicer");
        std::fs::write(&plain, "").unwrap();
        let console = dir.path().join("prusa-slicer-console");
        std::fs::write(&console, "").unwrap();
        std::fs::set_permissions(&console, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = SlicerLocator::new(None, Some(dir.path().as_os_str().to_owned()), vec![]);
        assert_eq!(locator.resolve().unwrap(), console);
    }
}
