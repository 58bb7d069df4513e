//! Embedded, single-process metadata store.
//!
//! Records are JSON-encoded and held in a primary [`sled`] tree per kind;
//! secondary indexes are separate trees keyed so that a lexicographic range
//! scan gives the ordering (or prefix match) each query needs — there is no
//! query planner or regex engine, just byte-range scans over composite keys.
//!
//! All operations are synchronous; callers on the async request path should
//! run them through [`blocking`] so a slow disk doesn't stall the executor.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::model::{Container, Manifest, Meta, Object, Record};

const SEP: u8 = 0;

fn join(parts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEP);
        }
        out.extend_from_slice(part.as_bytes());
    }
    out
}

/// Runs a blocking call (a metadata-store or blob-backend operation, or a
/// mix of both) on the tokio blocking thread pool, off the async executor.
/// The closure returns a classified [`crate::error::Result`] directly —
/// `?` on an [`anyhow::Error`] (e.g. from a `sled` call) still converts via
/// [`crate::error::Error`]'s `From` impl, collapsing to `Kind::Internal`,
/// while a handler can still return a specific [`crate::error::Kind`] when
/// it knows one applies (not-found, conflict, ...).
pub async fn blocking<F, T>(f: F) -> crate::error::Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(join_err) => Err(crate::error::Error::internal(join_err.to_string())),
    }
}

/// A handle to the embedded database. Cheaply cloneable (all trees are
/// reference-counted handles onto the same [`sled::Db`]).
#[derive(Clone)]
pub struct Store {
    db: Arc<sled::Db>,
    containers: sled::Tree,
    containers_by_name: sled::Tree,
    objects: sled::Tree,
    objects_by_container_key: sled::Tree,
    objects_by_manifest: sled::Tree,
    manifests: sled::Tree,
    manifests_by_container_key: sled::Tree,
    metas: sled::Tree,
    metas_by_entity: sled::Tree,
}

impl Store {
    /// Opens (creating if absent) the database at `path`, with all trees
    /// that constitute its schema. Used both by normal startup and by the
    /// `init` CLI command.
    pub fn open(path: impl AsRef<Path>) -> AnyResult<Self> {
        let db = sled::open(path).context("could not get database connection")?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> AnyResult<Self> {
        Ok(Store {
            containers: db.open_tree("containers")?,
            containers_by_name: db.open_tree("containers_by_name")?,
            objects: db.open_tree("objects")?,
            objects_by_container_key: db.open_tree("objects_by_container_key")?,
            objects_by_manifest: db.open_tree("objects_by_manifest")?,
            manifests: db.open_tree("manifests")?,
            manifests_by_container_key: db.open_tree("manifests_by_container_key")?,
            metas: db.open_tree("metas")?,
            metas_by_entity: db.open_tree("metas_by_entity")?,
            db: Arc::new(db),
        })
    }

    /// Rebuilds every secondary index from the primary record trees. A
    /// repair tool for an index that has drifted from the primary data.
    pub fn reindex(path: impl AsRef<Path>) -> AnyResult<()> {
        let store = Store::open(path)?;

        store.containers_by_name.clear()?;
        for entry in store.containers.iter() {
            let (_, value) = entry?;
            let container: Container = decode(&value)?;
            store.containers_by_name.insert(container.name.as_bytes(), container.id.as_bytes())?;
        }

        store.objects_by_container_key.clear()?;
        store.objects_by_manifest.clear()?;
        for entry in store.objects.iter() {
            let (_, value) = entry?;
            let object: Object = decode(&value)?;
            store.index_object(&object)?;
        }

        store.manifests_by_container_key.clear()?;
        for entry in store.manifests.iter() {
            let (_, value) = entry?;
            let manifest: Manifest = decode(&value)?;
            let key = join(&[&manifest.container_id, &manifest.key]);
            store.manifests_by_container_key.insert(key, manifest.id.as_bytes())?;
        }

        store.metas_by_entity.clear()?;
        for entry in store.metas.iter() {
            let (_, value) = entry?;
            let meta: Meta = decode(&value)?;
            let key = join(&[&meta.container_id, &meta.object_key, &meta.id]);
            store.metas_by_entity.insert(key, meta.id.as_bytes())?;
        }

        store.db.flush()?;
        Ok(())
    }

    fn index_object(&self, object: &Object) -> AnyResult<()> {
        let by_key = join(&[&object.container_id, &object.key]);
        self.objects_by_container_key.insert(by_key, object.id.as_bytes())?;

        if let Some(manifest_id) = &object.manifest_id {
            let ordinal = format!("{:020}", object.created_at.timestamp_nanos_opt().unwrap_or(0));
            let by_manifest = join(&[manifest_id, &ordinal, &object.key, &object.id]);
            self.objects_by_manifest.insert(by_manifest, object.id.as_bytes())?;
        }
        Ok(())
    }

    fn deindex_object(&self, object: &Object) -> AnyResult<()> {
        let by_key = join(&[&object.container_id, &object.key]);
        self.objects_by_container_key.remove(by_key)?;

        if let Some(manifest_id) = &object.manifest_id {
            let ordinal = format!("{:020}", object.created_at.timestamp_nanos_opt().unwrap_or(0));
            let by_manifest = join(&[manifest_id, &ordinal, &object.key, &object.id]);
            self.objects_by_manifest.remove(by_manifest)?;
        }
        Ok(())
    }

    //
    // Container
    //

    /// Insert-or-update. Assigns an id and `created_at` the first time.
    pub fn save_container(&self, container: &mut Container) -> AnyResult<()> {
        if let Some(existing_id) = self.containers_by_name.get(container.name.as_bytes())? {
            let existing_id = String::from_utf8_lossy(&existing_id).into_owned();
            if !container.id.is_empty() && container.id != existing_id {
                anyhow::bail!("container name '{}' already exists", container.name);
            }
        }

        assign_timestamps(container);
        self.containers.insert(container.id.as_bytes(), encode(container)?)?;
        self.containers_by_name.insert(container.name.as_bytes(), container.id.as_bytes())?;
        Ok(())
    }

    pub fn list_containers(&self) -> AnyResult<Vec<Container>> {
        let mut containers = Vec::new();
        for entry in self.containers_by_name.iter() {
            let (_, id) = entry?;
            let id = String::from_utf8_lossy(&id).into_owned();
            if let Some(container) = self.find_container(&id)? {
                containers.push(container);
            }
        }
        Ok(containers)
    }

    pub fn find_container(&self, id: &str) -> AnyResult<Option<Container>> {
        match self.containers.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn find_container_by_name(&self, name: &str) -> AnyResult<Option<Container>> {
        match self.containers_by_name.get(name.as_bytes())? {
            Some(id) => self.find_container(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn delete_container(&self, id: &str) -> AnyResult<()> {
        if let Some(container) = self.find_container(id)? {
            self.containers_by_name.remove(container.name.as_bytes())?;
        }
        self.containers.remove(id.as_bytes())?;
        Ok(())
    }

    //
    // Object
    //

    pub fn save_object(&self, object: &mut Object) -> AnyResult<()> {
        if !object.id.is_empty() {
            if let Some(previous) = self.find_object(&object.id)? {
                self.deindex_object(&previous)?;
            }
        }

        assign_timestamps(object);
        self.objects.insert(object.id.as_bytes(), encode(object)?)?;
        self.index_object(object)?;
        Ok(())
    }

    pub fn all_objects(&self) -> AnyResult<Vec<Object>> {
        let mut objects = Vec::new();
        for entry in self.objects.iter() {
            let (_, value) = entry?;
            objects.push(decode(&value)?);
        }
        Ok(objects)
    }

    /// Objects whose `container_id` matches, with `key` starting with
    /// `key_prefix`, ordered by `key` ascending. `limit <= 0` means no cap.
    pub fn find_objects_by_container(
        &self,
        container_id: &str,
        limit: i64,
        key_prefix: &str,
    ) -> AnyResult<Vec<Object>> {
        let prefix = join(&[container_id, key_prefix]);
        let mut objects = Vec::new();
        for entry in self.objects_by_container_key.scan_prefix(&prefix) {
            let (_, id) = entry?;
            if let Some(object) = self.find_object(&String::from_utf8_lossy(&id))? {
                objects.push(object);
            }
            if limit > 0 && objects.len() as i64 >= limit {
                break;
            }
        }
        Ok(objects)
    }

    /// Segment objects of a manifest, ordered by `created_at` then `key`.
    pub fn find_objects_by_manifest(&self, manifest_id: &str) -> AnyResult<Vec<Object>> {
        let prefix = join(&[manifest_id]);
        let mut objects = Vec::new();
        for entry in self.objects_by_manifest.scan_prefix(&prefix) {
            let (_, id) = entry?;
            if let Some(object) = self.find_object(&String::from_utf8_lossy(&id))? {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    pub fn find_object_by_key(&self, container_id: &str, key: &str) -> AnyResult<Option<Object>> {
        let index_key = join(&[container_id, key]);
        match self.objects_by_container_key.get(index_key)? {
            Some(id) => self.find_object(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn find_object(&self, id: &str) -> AnyResult<Option<Object>> {
        match self.objects.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn delete_object(&self, id: &str) -> AnyResult<()> {
        if let Some(object) = self.find_object(id)? {
            self.deindex_object(&object)?;
        }
        self.objects.remove(id.as_bytes())?;
        Ok(())
    }

    //
    // Manifest
    //

    pub fn save_manifest(&self, manifest: &mut Manifest) -> AnyResult<()> {
        if !manifest.id.is_empty() {
            if let Some(previous) = self.find_manifest(&manifest.id)? {
                let key = join(&[&previous.container_id, &previous.key]);
                self.manifests_by_container_key.remove(key)?;
            }
        }

        assign_timestamps(manifest);
        self.manifests.insert(manifest.id.as_bytes(), encode(manifest)?)?;
        let key = join(&[&manifest.container_id, &manifest.key]);
        self.manifests_by_container_key.insert(key, manifest.id.as_bytes())?;
        Ok(())
    }

    /// Manifests whose `container_id` matches, ordered by `key` ascending.
    pub fn find_manifests_by_container(&self, container_id: &str) -> AnyResult<Vec<Manifest>> {
        let prefix = join(&[container_id, ""]);
        let mut manifests = Vec::new();
        for entry in self.manifests_by_container_key.scan_prefix(&prefix) {
            let (_, id) = entry?;
            if let Some(manifest) = self.find_manifest(&String::from_utf8_lossy(&id))? {
                manifests.push(manifest);
            }
        }
        Ok(manifests)
    }

    pub fn find_manifest_by_key(&self, container_id: &str, key: &str) -> AnyResult<Option<Manifest>> {
        let index_key = join(&[container_id, key]);
        match self.manifests_by_container_key.get(index_key)? {
            Some(id) => self.find_manifest(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    pub fn find_manifest(&self, id: &str) -> AnyResult<Option<Manifest>> {
        match self.manifests.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    pub fn delete_manifest(&self, id: &str) -> AnyResult<()> {
        if let Some(manifest) = self.find_manifest(id)? {
            let key = join(&[&manifest.container_id, &manifest.key]);
            self.manifests_by_container_key.remove(key)?;
        }
        self.manifests.remove(id.as_bytes())?;
        Ok(())
    }

    //
    // Meta
    //

    pub fn add_meta(&self, container_id: &str, object_key: &str, key: &str, value: &str) -> AnyResult<Meta> {
        let mut meta = Meta {
            container_id: container_id.to_string(),
            object_key: object_key.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            ..Default::default()
        };
        assign_timestamps(&mut meta);
        self.metas.insert(meta.id.as_bytes(), encode(&meta)?)?;
        let index_key = join(&[container_id, object_key, &meta.id]);
        self.metas_by_entity.insert(index_key, meta.id.as_bytes())?;
        Ok(meta)
    }

    pub fn find_meta_for(&self, container_id: &str, object_key: &str) -> AnyResult<Vec<Meta>> {
        let mut prefix = join(&[container_id, object_key]);
        prefix.push(SEP);
        let mut metas = Vec::new();
        for entry in self.metas_by_entity.scan_prefix(&prefix) {
            let (_, id) = entry?;
            if let Some(value) = self.metas.get(&id)? {
                metas.push(decode(&value)?);
            }
        }
        Ok(metas)
    }

    pub fn delete_meta_one(&self, container_id: &str, object_key: &str, key: &str) -> AnyResult<()> {
        for meta in self.find_meta_for(container_id, object_key)? {
            if meta.key == key {
                self.remove_meta(&meta)?;
            }
        }
        Ok(())
    }

    pub fn delete_metas_for(&self, container_id: &str, object_key: &str) -> AnyResult<()> {
        for meta in self.find_meta_for(container_id, object_key)? {
            self.remove_meta(&meta)?;
        }
        Ok(())
    }

    fn remove_meta(&self, meta: &Meta) -> AnyResult<()> {
        let index_key = join(&[&meta.container_id, &meta.object_key, &meta.id]);
        self.metas_by_entity.remove(index_key)?;
        self.metas.remove(meta.id.as_bytes())?;
        Ok(())
    }
}

fn assign_timestamps<R: Record>(record: &mut R) {
    let now = Utc::now();
    if record.id().is_empty() {
        record.set_id(Uuid::new_v4().to_string());
        record.set_created_at(now);
    }
    record.set_updated_at(now);
}

fn encode<T: Serialize>(value: &T) -> AnyResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> AnyResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
