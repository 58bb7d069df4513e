//! Dynamic Large Object manifest creation.

use chrono::Utc;

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::metadata::Store;
use crate::model::{Container, Manifest};
use crate::path::Entities;
use crate::service::resolve::find_container;

/// Builds a manifest at `(container, key)` over the segments already
/// uploaded under the prefix named by `segment_spec` (the decoded
/// `X-Object-Manifest` header, `segment_container/basekey`).
pub fn create(
    store: &Store,
    blob: &Blob,
    container: &Container,
    key: &str,
    segment_spec: &str,
    content_type: Option<String>,
) -> Result<Manifest> {
    let entities = Entities::parse(segment_spec);
    let segment_container = find_container(store, &entities.container)?;

    let filenames = blob
        .filenames_from(&format!("{}/{}", segment_container.name, entities.object))
        .map_err(|_| Error::bad_request("no segments found for manifest"))?;
    if filenames.is_empty() {
        return Err(Error::bad_request("no segments found for manifest"));
    }

    let mut manifest = Manifest {
        container_id: container.id.clone(),
        key: key.to_string(),
        content_type: content_type.unwrap_or_default(),
        ..Default::default()
    };
    store.save_manifest(&mut manifest)?;

    for filename in &filenames {
        let segment_key = format!("{}/{}", entities.object, filename);
        if let Some(mut segment) = store.find_object_by_key(&segment_container.id, &segment_key)? {
            segment.manifest_id = Some(manifest.id.clone());
            store.save_object(&mut segment)?;
        }
    }

    let segments = store.find_objects_by_manifest(&manifest.id)?;
    if segments.is_empty() {
        store.delete_manifest(&manifest.id)?;
        return Err(Error::bad_request("no segments found for manifest"));
    }

    manifest.size = segments.iter().map(|segment| segment.size).sum();
    if manifest.content_type.is_empty() {
        manifest.content_type = segments[0].content_type.clone();
    }

    let concatenated_checksums: String = segments.iter().map(|segment| segment.checksum.as_str()).collect();
    manifest.checksum = format!("{:x}", md5::compute(concatenated_checksums.as_bytes()));
    manifest.updated_at = Utc::now();
    store.save_manifest(&mut manifest)?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Object;

    fn setup() -> (Store, Blob, tempfile::TempDir, tempfile::TempDir) {
        let db_dir = tempfile::tempdir().unwrap();
        let blob_dir = tempfile::tempdir().unwrap();
        let store = Store::open(db_dir.path().join("db")).unwrap();
        let blob = Blob::new(blob_dir.path());
        (store, blob, db_dir, blob_dir)
    }

    #[test]
    fn checksum_is_hash_of_segment_checksums_not_bytes() {
        let (store, blob, _d1, _d2) = setup();

        let mut container = Container { name: "segs".into(), ..Default::default() };
        store.save_container(&mut container).unwrap();

        let mut checksums = Vec::new();
        for (i, body) in [&b"aaa"[..], &b"bb"[..]].iter().enumerate() {
            let uploaded = crate::service::uploader::upload(&blob, &container.name, &format!("big/{i}"), body).unwrap();
            let mut object = Object {
                container_id: container.id.clone(),
                key: format!("big/{i}"),
                size: uploaded.size,
                checksum: uploaded.checksum.clone(),
                content_type: "text/plain".into(),
                ..Default::default()
            };
            store.save_object(&mut object).unwrap();
            checksums.push(uploaded.checksum);
        }

        let manifest = create(&store, &blob, &container, "whole.txt", "segs/big", None).unwrap();
        assert_eq!(manifest.size, 5);
        let expected = format!("{:x}", md5::compute(checksums.concat().as_bytes()));
        assert_eq!(manifest.checksum, expected);
        assert_eq!(manifest.content_type, "text/plain");
    }

    #[test]
    fn no_segments_is_bad_request() {
        let (store, blob, _d1, _d2) = setup();
        let mut container = Container { name: "segs".into(), ..Default::default() };
        store.save_container(&mut container).unwrap();

        let result = create(&store, &blob, &container, "whole.txt", "segs/missing", None);
        assert!(result.is_err());
    }
}
