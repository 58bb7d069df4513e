//! Reading an object's (or a manifest's) bytes back out, concatenating
//! segment blobs in order for manifests.

use std::collections::VecDeque;
use std::io::{self, Read};

use chrono::{DateTime, Utc};

use crate::blob::Blob;
use crate::error::Result;
use crate::metadata::Store;
use crate::model::{Container, Manifest, Object};
use crate::service::resolve::find_container;

/// What a download exposes to the HTTP adaptor regardless of whether the
/// underlying entity was a single object or a manifest.
pub struct Download {
    pub content_type: String,
    pub size: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Option<DateTime<Utc>>,
    pub reader: Box<dyn Read + Send>,
}

pub fn download_object(blob: &Blob, container: &Container, object: &Object) -> Result<Download> {
    let reader = blob.reader(&container.name, &object.key)?;
    Ok(Download {
        content_type: object.content_type.clone(),
        size: object.size,
        checksum: object.checksum.clone(),
        created_at: object.created_at,
        ttl: object.ttl,
        reader: Box::new(reader),
    })
}

pub fn download_manifest(store: &Store, blob: &Blob, manifest: &Manifest) -> Result<Download> {
    let segments = store.find_objects_by_manifest(&manifest.id)?;

    let mut queue = VecDeque::new();
    for segment in segments {
        let segment_container = find_container_by_id(store, &segment.container_id)?;
        queue.push_back((segment_container.name, segment.key));
    }

    Ok(Download {
        content_type: manifest.content_type.clone(),
        size: manifest.size,
        checksum: manifest.checksum.clone(),
        created_at: manifest.created_at,
        ttl: None,
        reader: Box::new(ConcatenatingReader { blob: blob.clone(), queue, current: None }),
    })
}

fn find_container_by_id(store: &Store, id: &str) -> Result<Container> {
    let container = store
        .find_container(id)?
        .unwrap_or_else(|| Container { id: id.to_string(), name: String::new(), ..Default::default() });
    Ok(container)
}

/// Reads each queued segment in order, closing one before opening the next.
struct ConcatenatingReader {
    blob: Blob,
    queue: VecDeque<(String, String)>,
    current: Option<std::fs::File>,
}

impl Read for ConcatenatingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(file) = &mut self.current {
                let n = file.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }

            match self.queue.pop_front() {
                Some((container, key)) => {
                    let file = self
                        .blob
                        .reader(&container, &key)
                        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
                    self.current = Some(file);
                }
                None => return Ok(0),
            }
        }
    }
}
