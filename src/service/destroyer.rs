//! Removing an object or a manifest (with its segments), blob first so a
//! crash between the two steps leaves only a cleanable orphan record.

use crate::blob::Blob;
use crate::error::Result;
use crate::metadata::Store;
use crate::model::{Container, Manifest, Object};
use crate::service::resolve::find_container;

pub fn destroy_object(store: &Store, blob: &Blob, container: &Container, object: &Object) -> Result<()> {
    blob.remove(&container.name, &object.key)?;
    store.delete_metas_for(&container.id, &object.key)?;
    store.delete_object(&object.id)?;
    Ok(())
}

pub fn destroy_manifest(store: &Store, blob: &Blob, manifest: &Manifest) -> Result<()> {
    let segments = store.find_objects_by_manifest(&manifest.id)?;
    for segment in segments {
        let segment_container = find_container_by_id(store, &segment.container_id)?;
        let _ = blob.remove(&segment_container.name, &segment.key);
        store.delete_object(&segment.id)?;
    }

    store.delete_metas_for(&manifest.container_id, &manifest.key)?;
    store.delete_manifest(&manifest.id)?;
    Ok(())
}

fn find_container_by_id(store: &Store, id: &str) -> Result<Container> {
    match store.find_container(id)? {
        Some(container) => Ok(container),
        None => Ok(Container { id: id.to_string(), name: String::new(), ..Default::default() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn setup() -> (Store, Blob, tempfile::TempDir, tempfile::TempDir) {
        let db_dir = tempfile::tempdir().unwrap();
        let blob_dir = tempfile::tempdir().unwrap();
        let store = Store::open(db_dir.path().join("db")).unwrap();
        let blob = Blob::new(blob_dir.path());
        (store, blob, db_dir, blob_dir)
    }

    #[test]
    fn destroy_object_removes_blob_meta_and_record() {
        let (store, blob, _d1, _d2) = setup();
        let mut container = Container { name: "bucket".into(), ..Default::default() };
        store.save_container(&mut container).unwrap();

        let mut writer = blob.writer("bucket", "a.txt").unwrap();
        writer.write_all(b"x").unwrap();
        drop(writer);

        let mut object = Object { container_id: container.id.clone(), key: "a.txt".into(), ..Default::default() };
        store.save_object(&mut object).unwrap();
        store.add_meta(&container.id, &object.key, "X-Object-Meta-Owner", "alice").unwrap();

        destroy_object(&store, &blob, &container, &object).unwrap();

        assert!(!blob.exists("bucket", "a.txt"));
        assert!(store.find_object(&object.id).unwrap().is_none());
        assert!(store.find_meta_for(&container.id, &object.key).unwrap().is_empty());
    }

    #[test]
    fn destroy_manifest_cascades_to_segments() {
        let (store, blob, _d1, _d2) = setup();
        let mut container = Container { name: "bucket".into(), ..Default::default() };
        store.save_container(&mut container).unwrap();

        let mut manifest = Manifest { container_id: container.id.clone(), key: "whole.txt".into(), ..Default::default() };
        store.save_manifest(&mut manifest).unwrap();

        for i in 0..2 {
            let mut writer = blob.writer("bucket", &format!("seg/{i}")).unwrap();
            writer.write_all(b"x").unwrap();
            drop(writer);
            let mut object = Object {
                container_id: container.id.clone(),
                key: format!("seg/{i}"),
                manifest_id: Some(manifest.id.clone()),
                ..Default::default()
            };
            store.save_object(&mut object).unwrap();
        }

        destroy_manifest(&store, &blob, &manifest).unwrap();

        assert!(!blob.exists("bucket", "seg/0"));
        assert!(!blob.exists("bucket", "seg/1"));
        assert!(store.find_objects_by_manifest(&manifest.id).unwrap().is_empty());
        assert!(store.find_manifest(&manifest.id).unwrap().is_none());
    }
}
