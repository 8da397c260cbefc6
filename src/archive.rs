use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use zip::ZipArchive;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("I/O error within archive domain")]
    #[diagnostic(code(splat::archive::io))]
    Io(#[from] IoError),

    #[error("unable to read archive '{path}'")]
    #[diagnostic(
        code(splat::archive::open),
        help("The download may be incomplete or the file is not a zip archive")
    )]
    Open {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("'{entry}' resolves to '{path}', outside of the extraction directory")]
    #[diagnostic(
        code(splat::archive::illegal_path),
        help("The archive is malformed or hostile; nothing was extracted")
    )]
    IllegalPath { entry: String, path: PathBuf },

    #[error("unexpected archive layout: {reason}")]
    #[diagnostic(
        code(splat::archive::unexpected_layout),
        help("Release archives must wrap the template in a single top-level directory")
    )]
    UnexpectedLayout { reason: String },
}

#[cfg(unix)]
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Where a single archive entry lands on disk.
struct PlannedEntry {
    index: usize,
    destination: PathBuf,
    is_dir: bool,
}

/// Extracts the zip at `archive_path` into `destination` and returns the path of the
/// top-level directory that wraps the archive contents.
///
/// Release archives produced by source hosts contain a single wrapper directory named
/// after the repository and commit (`org-repo-abcdef/`). That directory must be the first
/// entry. Every entry is checked to resolve inside `destination` before anything is
/// written, so an archive with a single escaping entry extracts nothing.
///
/// # Errors
///
/// Returns an [`ArchiveError`] if:
///
/// - The archive cannot be opened or an entry cannot be read.
/// - The archive is empty or its first entry is not a directory.
/// - An entry would be written outside of `destination`.
/// - A directory or file cannot be created or written to.
pub fn extract(archive_path: &Path, destination: &Path) -> Result<PathBuf, ArchiveError> {
    let file = fs::File::open(archive_path)
        .map_err(|error| IoError::new(FileOperation::Open, archive_path.to_path_buf(), error))?;

    let mut archive = ZipArchive::new(file).map_err(|error| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        source: error,
    })?;

    let (top_level, plan) = plan_entries(&mut archive, archive_path, destination)?;

    log::debug!(
        "extracting {} entries from {} into {}",
        plan.len(),
        archive_path.display(),
        destination.display()
    );

    for entry in plan {
        if entry.is_dir {
            fs::create_dir_all(&entry.destination).map_err(|error| {
                IoError::new(FileOperation::Mkdir, entry.destination.clone(), error)
            })?;
            continue;
        }

        extract_file(&mut archive, archive_path, &entry)?;
    }

    Ok(destination.join(top_level))
}

/// Validates every entry and computes its destination without touching the filesystem.
fn plan_entries<R: io::Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    archive_path: &Path,
    destination: &Path,
) -> Result<(String, Vec<PlannedEntry>), ArchiveError> {
    let mut top_level: Option<String> = None;
    let mut plan = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|error| ArchiveError::Open {
            path: archive_path.to_path_buf(),
            source: error,
        })?;

        let name = entry.name().to_string();
        let is_dir = entry.is_dir();

        // `None` for absolute names and for `..` climbing above the archive root
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            return Err(ArchiveError::IllegalPath {
                path: destination.join(&name),
                entry: name,
            });
        };
        let entry_destination = destination.join(relative);

        let top = match &top_level {
            Some(top) => top,
            None => {
                if !is_dir {
                    return Err(ArchiveError::UnexpectedLayout {
                        reason: format!("first entry '{name}' is not a directory"),
                    });
                }
                if Path::new(&name).components().count() != 1 {
                    return Err(ArchiveError::UnexpectedLayout {
                        reason: format!("first entry '{name}' is not a top-level directory"),
                    });
                }

                log::debug!("recording top-level directory: {name}");
                // not created here, it appears as the parent of its children
                top_level = Some(name);
                continue;
            }
        };

        if !Path::new(&name).starts_with(top) {
            log::warn!("archive entry '{name}' is outside of top-level directory '{top}'");
        }

        plan.push(PlannedEntry {
            index,
            destination: entry_destination,
            is_dir,
        });
    }

    let top_level = top_level.ok_or_else(|| ArchiveError::UnexpectedLayout {
        reason: "archive is empty".to_string(),
    })?;

    Ok((top_level, plan))
}

fn extract_file<R: io::Read + io::Seek>(
    archive: &mut ZipArchive<R>,
    archive_path: &Path,
    entry: &PlannedEntry,
) -> Result<(), ArchiveError> {
    let mut zipped = archive
        .by_index(entry.index)
        .map_err(|error| ArchiveError::Open {
            path: archive_path.to_path_buf(),
            source: error,
        })?;

    if let Some(parent) = entry.destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|error| IoError::new(FileOperation::Mkdir, parent.to_path_buf(), error))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(
        zipped
            .unix_mode()
            .map(|mode| mode & 0o777)
            .filter(|mode| *mode != 0)
            .unwrap_or(DEFAULT_FILE_MODE),
    );

    let mut out = options
        .open(&entry.destination)
        .map_err(|error| IoError::new(FileOperation::Write, entry.destination.clone(), error))?;

    let bytes = io::copy(&mut zipped, &mut out)
        .map_err(|error| IoError::new(FileOperation::Write, entry.destination.clone(), error))?;

    log::debug!("extracted {} ({bytes} bytes)", entry.destination.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::{write::SimpleFileOptions, ZipWriter};

    enum Entry<'a> {
        Dir(&'a str),
        File(&'a str, &'a str),
    }

    fn build_zip(path: &Path, entries: &[Entry]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        for entry in entries {
            match entry {
                Entry::Dir(name) => writer.add_directory(*name, options).unwrap(),
                Entry::File(name, contents) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(contents.as_bytes()).unwrap();
                }
            }
        }

        writer.finish().unwrap();
    }

    fn list_files(root: &Path) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_extract_returns_wrapper_directory() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("template.zip");
        let destination = work.path().join("template");

        build_zip(
            &archive,
            &[
                Entry::Dir("org-repo-abcdef/"),
                Entry::File("org-repo-abcdef/file1", "one"),
                Entry::Dir("org-repo-abcdef/sub/"),
                Entry::File("org-repo-abcdef/sub/file2", "two"),
            ],
        );

        let root = extract(&archive, &destination).unwrap();

        assert_eq!(root, destination.join("org-repo-abcdef"));
        assert_eq!(list_files(&root), vec!["file1", "sub/file2"]);
        assert!(!root.join("org-repo-abcdef").exists());
        assert_eq!(fs::read_to_string(root.join("sub/file2")).unwrap(), "two");
    }

    #[test]
    fn test_extract_creates_missing_parents_for_files() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("template.zip");
        let destination = work.path().join("template");

        build_zip(
            &archive,
            &[
                Entry::Dir("org-repo-abcdef/"),
                Entry::File("org-repo-abcdef/deep/nested/file", "x"),
            ],
        );

        let root = extract(&archive, &destination).unwrap();

        assert_eq!(list_files(&root), vec!["deep/nested/file"]);
    }

    #[test]
    fn test_extract_rejects_archive_slip() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("evil.zip");
        let destination = work.path().join("a/b/template");

        build_zip(
            &archive,
            &[
                Entry::Dir("org-repo-abcdef/"),
                Entry::File("org-repo-abcdef/innocent", "fine"),
                Entry::File("../../evil", "pwned"),
            ],
        );

        let result = extract(&archive, &destination);

        assert!(matches!(result, Err(ArchiveError::IllegalPath { .. })));
        assert!(!work.path().join("evil").exists());
        assert!(!work.path().join("a/evil").exists());
        // validation happens before the first write
        assert!(!destination.exists());
    }

    #[test]
    fn test_extract_rejects_escaping_directory_entry() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("evil.zip");
        let destination = work.path().join("a/b/template");

        build_zip(
            &archive,
            &[
                Entry::Dir("org-repo-abcdef/"),
                Entry::Dir("org-repo-abcdef/../../evil/"),
                Entry::File("org-repo-abcdef/file1", "one"),
            ],
        );

        let result = extract(&archive, &destination);

        assert!(matches!(result, Err(ArchiveError::IllegalPath { .. })));
        assert!(!work.path().join("a/evil").exists());
        assert!(!destination.exists());
    }

    #[test]
    fn test_extract_rejects_absolute_entry() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("evil.zip");
        let destination = work.path().join("template");
        let target = work.path().join("absolute-evil");

        build_zip(
            &archive,
            &[
                Entry::Dir("org-repo-abcdef/"),
                Entry::File(target.to_str().unwrap(), "pwned"),
            ],
        );

        let result = extract(&archive, &destination);

        assert!(matches!(result, Err(ArchiveError::IllegalPath { .. })));
        assert!(!target.exists());
        assert!(!destination.exists());
    }

    #[test]
    fn test_extract_allows_parent_segments_that_stay_inside() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("template.zip");
        let destination = work.path().join("template");

        build_zip(
            &archive,
            &[
                Entry::Dir("org-repo-abcdef/"),
                Entry::File("org-repo-abcdef/sub/../file1", "one"),
            ],
        );

        let root = extract(&archive, &destination).unwrap();

        assert_eq!(fs::read_to_string(root.join("file1")).unwrap(), "one");
    }

    #[test]
    fn test_extract_rejects_first_entry_that_is_not_a_directory() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("flat.zip");

        build_zip(
            &archive,
            &[Entry::File("README.md", "hi"), Entry::Dir("src/")],
        );

        let result = extract(&archive, &work.path().join("template"));

        assert!(matches!(
            result,
            Err(ArchiveError::UnexpectedLayout { .. })
        ));
    }

    #[test]
    fn test_extract_rejects_empty_archive() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("empty.zip");

        build_zip(&archive, &[]);

        let result = extract(&archive, &work.path().join("template"));

        assert!(matches!(
            result,
            Err(ArchiveError::UnexpectedLayout { .. })
        ));
    }

    #[test]
    fn test_extract_rejects_corrupt_archive() {
        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("corrupt.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let result = extract(&archive, &work.path().join("template"));

        assert!(matches!(result, Err(ArchiveError::Open { .. })));
    }

    #[test]
    fn test_extract_missing_archive_is_io_error() {
        let work = tempfile::tempdir().unwrap();

        let result = extract(&work.path().join("missing.zip"), work.path());

        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_keeps_recorded_mode() {
        use std::os::unix::fs::PermissionsExt;

        let work = tempfile::tempdir().unwrap();
        let archive = work.path().join("template.zip");
        let destination = work.path().join("template");

        let file = fs::File::create(&archive).unwrap();
        let mut writer = ZipWriter::new(file);
        writer
            .add_directory("org-repo-abcdef/", SimpleFileOptions::default())
            .unwrap();
        writer
            .start_file(
                "org-repo-abcdef/run.sh",
                SimpleFileOptions::default().unix_permissions(0o700),
            )
            .unwrap();
        writer.write_all(b"#!/bin/sh\n").unwrap();
        writer.finish().unwrap();

        let root = extract(&archive, &destination).unwrap();
        let mode = fs::metadata(root.join("run.sh")).unwrap().permissions().mode();

        assert_eq!(mode & 0o777, 0o700);
    }
}
