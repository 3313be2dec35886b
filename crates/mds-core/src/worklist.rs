//! Work-list intake: source URLs from text files on disk.
//!
//! The supervisor core does not care where cases come from; this is the
//! file-based collaborator the CLI uses. A work list is one text file, or a
//! directory whose `.txt` files are read in name order so new lists can be
//! dropped in between runs.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::case::Case;

/// Read source URLs from a file, or from every `.txt` file in a directory.
/// Blank lines and `#` comments are skipped; duplicates are left in, since
/// duplicate detection is the officer's job.
pub fn collect_sources(path: &Path) -> Result<Vec<String>> {
    if !path.is_dir() {
        return read_url_file(path);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("reading url list directory {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    let mut sources = Vec::new();
    for file in files {
        sources.extend(read_url_file(&file)?);
    }
    Ok(sources)
}

fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading url list {}", path.display()))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Partition cases into (needs download, already present on disk). Present
/// files can be handed to the completeness audit instead of re-downloaded.
pub fn split_already_present(cases: Vec<Case>) -> (Vec<Case>, Vec<Case>) {
    cases
        .into_iter()
        .partition(|case| !case.destination().exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::CaseFactory;

    #[test]
    fn reads_one_file_skipping_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("urls.txt");
        fs::write(
            &list,
            "https://example.com/a.gz\n\n# a comment\n  https://example.com/b.gz  \n",
        )
        .unwrap();
        let sources = collect_sources(&list).unwrap();
        assert_eq!(
            sources,
            vec!["https://example.com/a.gz", "https://example.com/b.gz"]
        );
    }

    #[test]
    fn reads_txt_files_from_a_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("02.txt"), "https://example.com/b.gz\n").unwrap();
        fs::write(dir.path().join("01.txt"), "https://example.com/a.gz\n").unwrap();
        fs::write(dir.path().join("notes.md"), "https://example.com/ignored\n").unwrap();
        let sources = collect_sources(dir.path()).unwrap();
        assert_eq!(
            sources,
            vec!["https://example.com/a.gz", "https://example.com/b.gz"]
        );
    }

    #[test]
    fn splits_present_files_from_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let factory = CaseFactory::new(dir.path().to_path_buf());
        let present = factory.case("https://example.com/have.gz").unwrap();
        let missing = factory.case("https://example.com/need.gz").unwrap();
        fs::write(present.destination(), b"data").unwrap();

        let (to_download, already_present) = split_already_present(vec![present, missing]);
        assert_eq!(to_download.len(), 1);
        assert_eq!(to_download[0].source(), "https://example.com/need.gz");
        assert_eq!(already_present.len(), 1);
        assert_eq!(already_present[0].source(), "https://example.com/have.gz");
    }
}
