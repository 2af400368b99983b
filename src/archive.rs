//! Legacy distribution archive: HTTP download and ZIP extraction

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source archives are large; allow a slow mirror
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Download `url` into `dest`, creating parent directories; returns bytes written
pub fn download(url: &str, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let client = reqwest::blocking::Client::builder()
        .user_agent(format!("srg-remap/{}", VERSION))
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("failed to create HTTP client")?;

    info!(url, "downloading archive");
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to download {url}"))?
        .error_for_status()
        .with_context(|| format!("failed to download {url}"))?;

    let bytes = save_to(&mut response, dest)?;
    info!(bytes, path = %dest.display(), "archive downloaded");
    Ok(bytes)
}

/// Stream `body` into a new file at `dest`, flushing before returning
fn save_to(body: &mut impl Read, dest: &Path) -> Result<u64> {
    let file = File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes = io::copy(body, &mut writer)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(bytes)
}

/// Extract every entry of `archive` under `dest`; returns the number of files
///
/// Entries whose names would land outside `dest` abort the extraction.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).with_context(|| format!("failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a ZIP archive", archive.display()))?;

    let mut extracted = 0;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .with_context(|| format!("failed to read entry {index} of {}", archive.display()))?;

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            bail!("archive entry {:?} escapes {}", entry.name(), dest.display());
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut out = File::create(&target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to extract {}", target.display()))?;
        extracted += 1;
    }

    info!(files = extracted, dest = %dest.display(), "archive extracted");
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();

        for (name, body) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_save_to_writes_whole_body() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("CraftBukkit.zip");
        let body = vec![7u8; 20_000];

        let bytes = save_to(&mut body.as_slice(), &dest).unwrap();
        assert_eq!(bytes, 20_000);
        assert_eq!(fs::read(&dest).unwrap(), body);
    }

    #[test]
    fn test_save_to_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing/CraftBukkit.zip");
        let err = save_to(&mut &b"zip"[..], &dest).unwrap_err();
        assert!(err.to_string().contains("failed to create"));
    }

    #[test]
    fn test_extract_into_destination() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("CraftBukkit.zip");
        make_zip(
            &archive,
            &[
                ("src/", ""),
                ("src/main/java/org/bukkit/craftbukkit/CraftServer.java", "class CraftServer {}\n"),
                ("pom.xml", "<project/>\n"),
            ],
        );

        let dest = dir.path().join("Old");
        let count = extract(&archive, &dest).unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(dest.join("src/main/java/org/bukkit/craftbukkit/CraftServer.java")).unwrap(),
            "class CraftServer {}\n"
        );
        assert!(dest.join("pom.xml").is_file());
    }

    #[test]
    fn test_extract_rejects_escaping_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        make_zip(&archive, &[("../escape.txt", "x")]);

        let dest = dir.path().join("Old");
        let err = extract(&archive, &dest).unwrap_err();
        assert!(err.to_string().contains("escapes"));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("plain.zip");
        fs::write(&archive, "not a zip").unwrap();
        assert!(extract(&archive, &dir.path().join("out")).is_err());
    }
}
