//! Shapes container and object listings into Swift's JSON or plain-text
//! representations, chosen by `Accept`.

use serde::Serialize;

use crate::model::{Container, Object};

#[derive(Serialize)]
pub struct ContainerEntry {
    pub name: String,
}

#[derive(Serialize)]
pub struct ObjectEntry {
    pub name: String,
    pub hash: String,
    pub bytes: u64,
    pub content_type: String,
    pub last_modified: String,
}

pub fn containers_json(containers: &[Container]) -> Vec<ContainerEntry> {
    containers.iter().map(|c| ContainerEntry { name: c.name.clone() }).collect()
}

pub fn containers_text(containers: &[Container]) -> String {
    containers.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join("\n")
}

pub fn objects_json(objects: &[Object]) -> Vec<ObjectEntry> {
    objects
        .iter()
        .map(|o| ObjectEntry {
            name: o.key.clone(),
            hash: o.checksum.clone(),
            bytes: o.size,
            content_type: o.content_type.clone(),
            last_modified: o.updated_at.to_rfc3339(),
        })
        .collect()
}

pub fn objects_text(objects: &[Object]) -> String {
    objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>().join("\n")
}

/// `true` when the client asked for `text/plain` instead of the JSON
/// default.
pub fn wants_text(accept: Option<&str>) -> bool {
    accept.map(|value| value.contains("text/plain")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wants_text_matches_plain_accept_header() {
        assert!(wants_text(Some("text/plain")));
        assert!(wants_text(Some("text/plain; charset=utf-8")));
        assert!(!wants_text(Some("application/json")));
        assert!(!wants_text(None));
    }

    #[test]
    fn containers_text_joins_names_with_newlines() {
        let containers = vec![
            Container { name: "a".into(), ..Default::default() },
            Container { name: "b".into(), ..Default::default() },
        ];
        assert_eq!(containers_text(&containers), "a\nb");
    }
}
