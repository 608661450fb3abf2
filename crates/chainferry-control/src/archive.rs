//! TLS-material extraction from uploaded archives.
//!
//! Workload uploads arrive as gzip-compressed tar streams of credential
//! files. Directory structure inside the archive carries no meaning; every
//! regular file is keyed by its base filename.

use std::collections::BTreeMap;
use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tar::Archive;

use crate::{ControlError, Result};

/// Extract credential files from a gzip-compressed tar stream.
///
/// Returns a map from base filename to file content, ready to project into
/// a ConfigMap.
///
/// # Errors
///
/// Returns [`ControlError::ArchiveCorrupt`] if the stream does not decode
/// as gzip+tar, or if any entry is not valid UTF-8.
pub fn extract_material(content: &Bytes) -> Result<BTreeMap<String, String>> {
    let decoder = GzDecoder::new(content.as_ref());
    let mut archive = Archive::new(decoder);

    let mut material = BTreeMap::new();

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let file_name = {
            let path = entry.path().map_err(corrupt)?;
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            }
        };

        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(corrupt)?;

        material.insert(file_name, content);
    }

    Ok(material)
}

fn corrupt(err: std::io::Error) -> ControlError {
    ControlError::ArchiveCorrupt(err.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Build a gzip+tar fixture from `(path, content)` pairs.
    pub(crate) fn targz(files: &[(&str, &str)]) -> Bytes {
        let mut builder = tar::Builder::new(Vec::new());

        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }

        let tarball = builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut encoder, &tarball).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    #[test]
    fn extracts_files_keyed_by_base_name() {
        let content = targz(&[
            ("certs/client.key", "KEY"),
            ("certs/client.crt", "CRT"),
            ("peer.crt", "PEER"),
        ]);

        let material = extract_material(&content).unwrap();
        assert_eq!(material.len(), 3);
        assert_eq!(material.get("client.key").map(String::as_str), Some("KEY"));
        assert_eq!(material.get("client.crt").map(String::as_str), Some("CRT"));
        assert_eq!(material.get("peer.crt").map(String::as_str), Some("PEER"));
    }

    #[test]
    fn rejects_non_archive_bytes() {
        let err = extract_material(&Bytes::from_static(b"not a tarball")).unwrap_err();
        assert!(matches!(err, ControlError::ArchiveCorrupt(_)));
    }

    #[test]
    fn empty_archive_yields_empty_material() {
        let material = extract_material(&targz(&[])).unwrap();
        assert!(material.is_empty());
    }
}
