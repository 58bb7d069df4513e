//! Copying an object or materialising a manifest into a flat object.

use std::io::{Read, Write};

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::metadata::Store;
use crate::model::{Container, Object};
use crate::service::downloader::download_manifest;
use crate::service::resolve::Target;

/// 5 GiB — the cap on materialising a manifest into a flat copy.
const MAX_MANIFEST_COPY_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Copies a plain object's blob to `(dest_container, dest_key)` and
/// persists a fresh object record pointing at it.
pub fn copy_object(
    blob: &Blob,
    source_container: &Container,
    source: &Object,
    dest_container: &Container,
    dest_key: &str,
) -> Result<(u64, String)> {
    blob.copy(&source_container.name, &source.key, &dest_container.name, dest_key)?;
    Ok((source.size, source.checksum.clone()))
}

/// Materialises a manifest into a flat object at `(dest_container,
/// dest_key)`: streams every segment through an MD5 hasher, unlike manifest
/// creation which hashes the segments' own checksum strings.
pub fn copy_manifest(
    store: &Store,
    blob: &Blob,
    manifest_container: &Container,
    manifest_id: &str,
    manifest_size: u64,
    dest_container: &Container,
    dest_key: &str,
) -> Result<(u64, String)> {
    if manifest_size > MAX_MANIFEST_COPY_BYTES {
        return Err(Error::too_large());
    }

    let manifest = store
        .find_manifest(manifest_id)?
        .ok_or_else(Error::not_found_object)?;
    let mut download = download_manifest(store, blob, &manifest)?;

    let mut writer = blob.writer(&dest_container.name, dest_key)?;
    let mut hasher = md5::Context::new();
    let mut written: u64 = 0;
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = download.reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        hasher.consume(&buf[..n]);
        written += n as u64;
    }
    writer.flush()?;

    if written != manifest_size {
        let _ = blob.remove(&dest_container.name, dest_key);
        return Err(Error::object_corrupted());
    }

    let _ = manifest_container;
    Ok((written, format!("{:x}", hasher.compute())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Manifest;
    use std::io::Write as _;

    fn setup() -> (Store, Blob, tempfile::TempDir, tempfile::TempDir) {
        let db_dir = tempfile::tempdir().unwrap();
        let blob_dir = tempfile::tempdir().unwrap();
        let store = Store::open(db_dir.path().join("db")).unwrap();
        let blob = Blob::new(blob_dir.path());
        (store, blob, db_dir, blob_dir)
    }

    #[test]
    fn copy_object_preserves_bytes_and_metadata() {
        let (_store, blob, _d1, _d2) = setup();
        let source_container = Container { id: "c1".into(), name: "bucket".into(), ..Default::default() };
        let dest_container = Container { id: "c2".into(), name: "other".into(), ..Default::default() };

        let mut writer = blob.writer("bucket", "a.txt").unwrap();
        writer.write_all(b"payload").unwrap();
        drop(writer);

        let object = Object {
            container_id: "c1".into(),
            key: "a.txt".into(),
            size: 7,
            checksum: format!("{:x}", md5::compute(b"payload")),
            ..Default::default()
        };

        let (size, checksum) = copy_object(&blob, &source_container, &object, &dest_container, "b.txt").unwrap();
        assert_eq!(size, 7);
        assert_eq!(checksum, object.checksum);
        assert!(blob.exists("other", "b.txt"));
    }

    #[test]
    fn copy_manifest_computes_byte_checksum_and_rejects_oversize() {
        let (store, blob, _d1, _d2) = setup();
        let container = Container { id: "c1".into(), name: "bucket".into(), ..Default::default() };
        let dest = Container { id: "c2".into(), name: "dest".into(), ..Default::default() };

        let mut manifest = Manifest { container_id: "c1".into(), key: "whole.txt".into(), ..Default::default() };
        store.save_manifest(&mut manifest).unwrap();

        for (i, body) in [&b"AA"[..], &b"BB"[..]].iter().enumerate() {
            let mut writer = blob.writer("bucket", &format!("seg/{i}")).unwrap();
            writer.write_all(body).unwrap();
            drop(writer);
            let mut object = Object {
                container_id: "c1".into(),
                key: format!("seg/{i}"),
                manifest_id: Some(manifest.id.clone()),
                size: 2,
                ..Default::default()
            };
            store.save_object(&mut object).unwrap();
        }

        let (size, checksum) =
            copy_manifest(&store, &blob, &container, &manifest.id, 4, &dest, "flat.txt").unwrap();
        assert_eq!(size, 4);
        assert_eq!(checksum, format!("{:x}", md5::compute(b"AABB")));

        let result = copy_manifest(&store, &blob, &container, &manifest.id, MAX_MANIFEST_COPY_BYTES + 1, &dest, "flat2.txt");
        assert!(result.is_err());
    }
}
