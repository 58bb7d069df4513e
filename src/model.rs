//! Record kinds held by the metadata store: [`Container`], [`Object`],
//! [`Manifest`], and [`Meta`]. All four share an opaque id and UTC
//! creation/update timestamps, assigned by [`crate::metadata::Store::save`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields common to every record kind.
pub trait Record {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

macro_rules! impl_record {
    ($ty:ty) => {
        impl Record for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
            fn set_created_at(&mut self, at: DateTime<Utc>) {
                self.created_at = at;
            }
            fn set_updated_at(&mut self, at: DateTime<Utc>) {
                self.updated_at = at;
            }
        }
    };
}

/// A top-level namespace holding objects and manifests.
///
/// `name` is globally unique across all containers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    pub name: String,
}
impl_record!(Container);

/// A blob stored on the filesystem, or a segment of a [`Manifest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Object {
    #[serde(default)]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    pub container_id: String,
    /// Non-empty means this object is a segment of that manifest.
    #[serde(default)]
    pub manifest_id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub checksum: String,
    /// `None` means no expiry.
    #[serde(default)]
    pub ttl: Option<DateTime<Utc>>,
}
impl_record!(Object);

/// Aggregates a blob across several segment [`Object`]s, used for chunked
/// (Dynamic Large Object) uploads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    pub container_id: String,
    pub key: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub checksum: String,
}
impl_record!(Manifest);

/// Arbitrary user key/value attached to a container or an object.
///
/// `object_key` empty means the meta targets the container itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    pub container_id: String,
    #[serde(default)]
    pub object_key: String,
    pub key: String,
    pub value: String,
}
impl_record!(Meta);
