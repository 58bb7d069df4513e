//! Name resolution: turns `(container, key)` into the record that owns it.
//!
//! An object at a given key takes precedence over a manifest at the same
//! key — the two kinds never coexist under correct usage, but a stale
//! manifest row left behind by a partial failure should not shadow a
//! freshly uploaded object.

use crate::error::{Error, Result};
use crate::metadata::Store;
use crate::model::{Container, Manifest, Object};

/// The record a `(container, key)` lookup resolved to.
pub enum Target {
    Object(Object),
    Manifest(Manifest),
}

/// Looks up `container_name` and then `key` within it, per §4.6: object
/// before manifest, 404 *container not found* or *object not found*
/// otherwise.
pub fn resolve(store: &Store, container_name: &str, key: &str) -> Result<(Container, Target)> {
    let container = find_container(store, container_name)?;

    if let Some(object) = store.find_object_by_key(&container.id, key)? {
        return Ok((container, Target::Object(object)));
    }

    if let Some(manifest) = store.find_manifest_by_key(&container.id, key)? {
        return Ok((container, Target::Manifest(manifest)));
    }

    Err(Error::not_found_object())
}

pub fn find_container(store: &Store, name: &str) -> Result<Container> {
    store.find_container_by_name(name)?.ok_or_else(Error::not_found_container)
}
