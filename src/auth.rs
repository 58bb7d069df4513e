//! Keystone v3 authentication stub: a single hard-coded tenant/user accepts
//! a password grant and is handed a deterministic bearer token.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    auth: AuthBody,
}

#[derive(Debug, Deserialize)]
struct AuthBody {
    identity: Identity,
    scope: Scope,
}

#[derive(Debug, Deserialize)]
struct Identity {
    methods: Vec<String>,
    password: PasswordIdentity,
}

#[derive(Debug, Deserialize)]
struct PasswordIdentity {
    user: User,
}

#[derive(Debug, Deserialize)]
struct User {
    name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct Scope {
    project: Project,
}

#[derive(Debug, Deserialize)]
struct Project {
    name: String,
    domain: Domain,
}

#[derive(Debug, Deserialize)]
struct Domain {
    name: String,
}

/// The deterministic bearer token issued for `username`.
pub fn token_for(username: &str) -> String {
    format!("tk_{username}")
}

/// Validates `request` against `config`'s hard-coded credentials and, if it
/// matches, returns the issued token plus the catalog body advertising the
/// single public endpoint at `<base_url>/v1/AUTH_<username>`.
pub fn issue(config: &Config, request: &TokenRequest, base_url: &str) -> Result<(String, Value)> {
    let identity = &request.auth.identity;
    let user = &identity.password.user;
    let project = &request.auth.scope.project;

    let matches = identity.methods.iter().any(|method| method == "password")
        && user.name == config.username
        && user.password == config.password
        && project.name == config.tenant
        && project.domain.name == config.domain;

    if !matches {
        return Err(Error::authorization_failed());
    }

    let token = token_for(&user.name);
    let public_url = format!("{base_url}/v1/AUTH_{}", user.name);

    let body = json!({
        "token": {
            "methods": ["password"],
            "user": { "name": user.name, "domain": { "name": config.domain } },
            "project": { "name": config.tenant, "domain": { "name": config.domain } },
            "catalog": [{
                "type": "object-store",
                "name": "swift",
                "endpoints": [{
                    "interface": "public",
                    "region": "RegionOne",
                    "url": public_url,
                }]
            }]
        }
    });

    Ok((token, body))
}

/// Checks the `X-Auth-Token` header against the token for `config`'s
/// configured username.
pub fn check_bearer(config: &Config, presented: Option<&str>) -> Result<()> {
    let expected = token_for(&config.username);
    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(Error::authorization_failed()),
    }
}

#[derive(Serialize)]
pub struct VersionBody {
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_path: String::new(),
            storage_path: String::new(),
            tenant: "test".into(),
            domain: "Default".into(),
            username: "tester".into(),
            password: "testing".into(),
        }
    }

    fn request(password: &str) -> TokenRequest {
        serde_json::from_value(json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": { "user": { "name": "tester", "password": password } }
                },
                "scope": { "project": { "name": "test", "domain": { "name": "Default" } } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn issue_succeeds_with_matching_credentials() {
        let (token, _body) = issue(&config(), &request("testing"), "http://localhost:5000").unwrap();
        assert_eq!(token, "tk_tester");
    }

    #[test]
    fn issue_rejects_wrong_password() {
        assert!(issue(&config(), &request("wrong"), "http://localhost:5000").is_err());
    }

    #[test]
    fn check_bearer_requires_exact_token() {
        let config = config();
        assert!(check_bearer(&config, Some("tk_tester")).is_ok());
        assert!(check_bearer(&config, Some("tk_other")).is_err());
        assert!(check_bearer(&config, None).is_err());
    }
}
