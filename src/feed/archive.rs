//! Extraction of the two compressed formats a feed drop contains: the
//! tar.gz lookup bundle and single-stream gzip data files.

use super::types::FeedError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Unpack a lookup bundle into `lookup_dir`.
///
/// The directory is recreated from scratch so a previous partition's tables
/// can never bleed into this one. Extracting the same bundle twice yields the
/// same directory contents.
pub fn extract_lookup_bundle(archive: &Path, lookup_dir: &Path) -> Result<(), FeedError> {
    if lookup_dir.exists() {
        fs::remove_dir_all(lookup_dir).map_err(|e| {
            FeedError::Archive(format!(
                "failed to clear lookup dir '{}': {}",
                lookup_dir.display(),
                e
            ))
        })?;
    }
    fs::create_dir_all(lookup_dir).map_err(|e| {
        FeedError::Archive(format!(
            "failed to create lookup dir '{}': {}",
            lookup_dir.display(),
            e
        ))
    })?;

    let file = File::open(archive).map_err(|e| {
        FeedError::Archive(format!("failed to open archive '{}': {}", archive.display(), e))
    })?;
    let mut bundle = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    bundle.unpack(lookup_dir).map_err(|e| {
        FeedError::Archive(format!(
            "failed to unpack archive '{}': {}",
            archive.display(),
            e
        ))
    })?;

    debug!("Unpacked lookup bundle '{}'", archive.display());
    Ok(())
}

/// Decompress one gzip data file next to its source.
///
/// `01-suite_2024-05-01.tsv.gz` becomes `01-suite_2024-05-01.tsv` in the same
/// directory. The source is left in place; deleting it is the caller's
/// decision, made only after the partition exports. Returns the output path.
pub fn decompress_data_file(src: &Path) -> Result<PathBuf, FeedError> {
    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FeedError::Archive(format!("bad data file path '{}'", src.display())))?;
    let stem = name.strip_suffix(".gz").ok_or_else(|| {
        FeedError::Archive(format!("data file '{}' is not gzip-compressed", name))
    })?;
    let out = src.with_file_name(stem);

    let file = File::open(src).map_err(|e| {
        FeedError::Archive(format!("failed to open data file '{}': {}", src.display(), e))
    })?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut writer = BufWriter::new(File::create(&out).map_err(|e| {
        FeedError::Archive(format!("failed to create '{}': {}", out.display(), e))
    })?);
    io::copy(&mut decoder, &mut writer).map_err(|e| {
        FeedError::Archive(format!(
            "failed to decompress '{}': {}",
            src.display(),
            e
        ))
    })?;

    debug!("Decompressed '{}' to '{}'", src.display(), out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn build_bundle(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let enc = GzEncoder::new(file, Compression::default());
        let mut tar = tar::Builder::new(enc);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            tar.append_data(&mut header, name, contents.as_bytes()).unwrap();
        }
        tar.into_inner().unwrap().finish().unwrap();
    }

    fn write_gzip(path: &Path, contents: &str) {
        let file = File::create(path).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(contents.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn test_extract_lookup_bundle() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("suite_2024-05-01-lookup_data.tar.gz");
        build_bundle(
            &archive,
            &[("browser.tsv", "70\tFirefox\n"), ("country.tsv", "1\tUS\n")],
        );

        let lookup_dir = dir.path().join("lookup_tables");
        extract_lookup_bundle(&archive, &lookup_dir).unwrap();

        assert_eq!(
            fs::read_to_string(lookup_dir.join("browser.tsv")).unwrap(),
            "70\tFirefox\n"
        );
        assert_eq!(
            fs::read_to_string(lookup_dir.join("country.tsv")).unwrap(),
            "1\tUS\n"
        );
    }

    #[test]
    fn test_extract_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let lookup_dir = dir.path().join("lookup_tables");
        fs::create_dir_all(&lookup_dir).unwrap();
        fs::write(lookup_dir.join("stale.tsv"), "left over\n").unwrap();

        let archive = dir.path().join("suite_2024-05-01-lookup_data.tar.gz");
        build_bundle(&archive, &[("browser.tsv", "70\tFirefox\n")]);
        extract_lookup_bundle(&archive, &lookup_dir).unwrap();

        assert!(!lookup_dir.join("stale.tsv").exists());
        assert!(lookup_dir.join("browser.tsv").exists());
    }

    #[test]
    fn test_extract_missing_archive_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let err = extract_lookup_bundle(
            &dir.path().join("nope.tar.gz"),
            &dir.path().join("lookup_tables"),
        )
        .unwrap_err();
        assert!(matches!(err, FeedError::Archive(_)));
    }

    #[test]
    fn test_extract_corrupt_archive_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bad.tar.gz");
        fs::write(&archive, b"this is not gzip data").unwrap();

        let err =
            extract_lookup_bundle(&archive, &dir.path().join("lookup_tables")).unwrap_err();
        assert!(matches!(err, FeedError::Archive(_)));
    }

    #[test]
    fn test_decompress_data_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("01-suite_2024-05-01.tsv.gz");
        write_gzip(&src, "a\tb\tc\n1\t2\t3\n");

        let out = decompress_data_file(&src).unwrap();
        assert_eq!(out, dir.path().join("01-suite_2024-05-01.tsv"));
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\tb\tc\n1\t2\t3\n");
        // Source retained for the post-export cleanup step
        assert!(src.exists());
    }

    #[test]
    fn test_decompress_twice_is_identical() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("01-suite_2024-05-01.tsv.gz");
        write_gzip(&src, "row\n");

        let first = decompress_data_file(&src).unwrap();
        let bytes_first = fs::read(&first).unwrap();
        let second = decompress_data_file(&src).unwrap();
        let bytes_second = fs::read(&second).unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn test_decompress_rejects_uncompressed_name() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("01-suite_2024-05-01.tsv");
        fs::write(&src, "plain\n").unwrap();

        let err = decompress_data_file(&src).unwrap_err();
        assert!(matches!(err, FeedError::Archive(_)));
        assert!(err.to_string().contains("not gzip-compressed"));
    }

    #[test]
    fn test_decompress_corrupt_gzip_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("01-suite_2024-05-01.tsv.gz");
        fs::write(&src, b"definitely not gzip").unwrap();

        let err = decompress_data_file(&src).unwrap_err();
        assert!(matches!(err, FeedError::Archive(_)));
    }
}
