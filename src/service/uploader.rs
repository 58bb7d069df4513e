//! Object upload: write bytes to the blob backend while tee-ing them
//! through an MD5 hasher, and TTL header parsing.

use std::io::{self, Write};
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, TimeZone, Utc};

use crate::blob::Blob;
use crate::error::{Error, Result};

/// Writes every byte passed to `write` into both an open file and a running
/// MD5 digest, so the checksum comes out of the same pass as the write.
struct TeeWriter<'a> {
    file: &'a mut std::fs::File,
    hasher: md5::Context,
    written: u64,
}

impl<'a> Write for TeeWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.consume(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// The outcome of a successful upload: bytes written and their hex MD5.
pub struct Uploaded {
    pub size: u64,
    pub checksum: String,
}

/// Opens a blob writer at `(container, key)` and copies `body` into it,
/// computing the hex MD5 checksum as it goes. The object record is *not*
/// persisted here — callers must only save it once this returns `Ok`.
pub fn upload(blob: &Blob, container: &str, key: &str, body: &[u8]) -> Result<Uploaded> {
    let mut file = blob.writer(container, key)?;
    let mut tee = TeeWriter { file: &mut file, hasher: md5::Context::new(), written: 0 };
    tee.write_all(body)?;
    tee.flush()?;

    let digest = tee.hasher.compute();
    Ok(Uploaded { size: tee.written, checksum: format!("{digest:x}") })
}

/// Resolves the object's TTL from `X-Delete-After` (seconds from now, takes
/// priority) or `X-Delete-At` (unix seconds). Returns `Ok(None)` when
/// neither header is present. A non-integer value is a bad request.
pub fn setup_ttl(headers: &HeaderMap) -> Result<Option<DateTime<Utc>>> {
    if let Some(value) = headers.get("x-delete-after") {
        let seconds: i64 = parse_header_i64(value, "X-Delete-After")?;
        return Ok(Some(Utc::now() + Duration::from_secs(seconds.max(0) as u64)));
    }

    if let Some(value) = headers.get("x-delete-at") {
        let unix: i64 = parse_header_i64(value, "X-Delete-At")?;
        return Ok(Some(
            Utc.timestamp_opt(unix, 0).single().ok_or_else(|| Error::bad_request("invalid X-Delete-At"))?,
        ));
    }

    Ok(None)
}

fn parse_header_i64(value: &axum::http::HeaderValue, name: &str) -> Result<i64> {
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| Error::bad_request(format!("{name} must be an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_computes_size_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let blob = Blob::new(dir.path());

        let uploaded = upload(&blob, "bucket", "a.txt", b"hello world").unwrap();
        assert_eq!(uploaded.size, 11);
        assert_eq!(uploaded.checksum, format!("{:x}", md5::compute(b"hello world")));
    }

    #[test]
    fn ttl_prefers_delete_after_over_delete_at() {
        let mut headers = HeaderMap::new();
        headers.insert("x-delete-after", "60".parse().unwrap());
        headers.insert("x-delete-at", "1000000000".parse().unwrap());

        let ttl = setup_ttl(&headers).unwrap().unwrap();
        assert!(ttl > Utc::now());
    }

    #[test]
    fn ttl_none_when_absent() {
        assert!(setup_ttl(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn ttl_rejects_non_integer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-delete-after", "soon".parse().unwrap());
        assert!(setup_ttl(&headers).is_err());
    }
}
