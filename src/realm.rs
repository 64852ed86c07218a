//! Realm configuration.
//!
//! A realm is one tenant or environment of the backend, reachable under a
//! canonical host and any number of aliases. The set of realms is loaded once
//! at startup and then only read.

use crate::options::Options;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a single realm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Canonical host of the realm.
    pub host: String,

    /// Other hosts that resolve to this realm.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Session token used for calls into this realm.
    #[serde(default)]
    pub session: String,
}

impl RealmConfig {
    /// Client options that scope a client to this realm.
    pub fn client_options(&self) -> Options {
        Options {
            host: self.host.clone(),
            session: self.session.clone(),
            ..Default::default()
        }
    }

    fn has_alias(&self, host: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| strip_default_port(alias) == host)
    }
}

/// Realm configurations keyed by realm name.
///
/// # Examples
///
/// ```
/// use realm_client::RealmsConfig;
///
/// let realms = RealmsConfig::from_json(r#"{
///     "acme_inc": { "host": "example.com", "aliases": ["acme.test"], "session": "42smurf99" }
/// }"#).unwrap();
///
/// assert_eq!(realms.find_by_host("example.com:80").unwrap().0, "acme_inc");
/// assert_eq!(realms.find_by_host("acme.test").unwrap().0, "acme_inc");
/// assert!(realms.find_by_host("unknown.test").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RealmsConfig {
    realms: BTreeMap<String, RealmConfig>,
}

impl RealmsConfig {
    /// Creates an empty realm set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object of realm name to realm configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("Invalid realm configuration: {}", e)))
    }

    /// Adds or replaces a realm.
    pub fn insert(&mut self, name: impl Into<String>, config: RealmConfig) -> &mut Self {
        self.realms.insert(name.into(), config);
        self
    }

    /// Looks up a realm by name.
    pub fn get(&self, name: &str) -> Option<&RealmConfig> {
        self.realms.get(name)
    }

    /// Finds the realm serving `host`.
    ///
    /// An explicit `:80` is ignored. Aliases are checked before canonical
    /// hosts; comparison is exact and case-sensitive.
    pub fn find_by_host(&self, host: &str) -> Option<(&str, &RealmConfig)> {
        let host = strip_default_port(host);
        self.iter()
            .find(|(_, config)| config.has_alias(host))
            .or_else(|| {
                self.iter()
                    .find(|(_, config)| strip_default_port(&config.host) == host)
            })
    }

    /// Like [`RealmsConfig::find_by_host`], but failing with
    /// [`Error::NoHostConfig`].
    pub fn resolve_host(&self, host: &str) -> Result<(&str, &RealmConfig)> {
        self.find_by_host(host).ok_or_else(|| Error::NoHostConfig {
            host: host.to_string(),
        })
    }

    /// Iterates over realms in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RealmConfig)> {
        self.realms.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Number of realms.
    pub fn len(&self) -> usize {
        self.realms.len()
    }

    /// Returns `true` if no realms are configured.
    pub fn is_empty(&self) -> bool {
        self.realms.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, RealmConfig)> for RealmsConfig {
    fn from_iter<I: IntoIterator<Item = (N, RealmConfig)>>(iter: I) -> Self {
        Self {
            realms: iter
                .into_iter()
                .map(|(name, config)| (name.into(), config))
                .collect(),
        }
    }
}

/// Removes an explicit `:80` from a host.
pub(crate) fn strip_default_port(host: &str) -> &str {
    host.strip_suffix(":80").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realms() -> RealmsConfig {
        [
            (
                "acme_inc",
                RealmConfig {
                    host: "example.com".into(),
                    aliases: vec!["acme.test".into(), "www.example.com:80".into()],
                    session: "42smurf99".into(),
                },
            ),
            (
                "globex",
                RealmConfig {
                    host: "globex.test".into(),
                    aliases: vec!["example.com".into()],
                    session: "s3cr3t".into(),
                },
            ),
            (
                "staging",
                RealmConfig {
                    host: "localhost:3000".into(),
                    ..Default::default()
                },
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn canonical_host_matches() {
        let realms = realms();
        assert_eq!(realms.find_by_host("globex.test").unwrap().0, "globex");
        assert_eq!(realms.find_by_host("localhost:3000").unwrap().0, "staging");
    }

    #[test]
    fn default_port_is_ignored() {
        let realms = realms();
        assert_eq!(realms.find_by_host("globex.test:80").unwrap().0, "globex");
        assert_eq!(realms.find_by_host("www.example.com").unwrap().0, "acme_inc");
    }

    #[test]
    fn aliases_take_precedence_over_canonical_hosts() {
        assert_eq!(realms().find_by_host("example.com").unwrap().0, "globex");
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(realms().find_by_host("GLOBEX.TEST").is_none());
    }

    #[test]
    fn unknown_host_names_the_host() {
        match realms().resolve_host("unknown.test") {
            Err(Error::NoHostConfig { host }) => assert_eq!(host, "unknown.test"),
            other => panic!("Expected NoHostConfig, got {:?}", other),
        }
    }

    #[test]
    fn parses_json_with_optional_fields() {
        let realms = RealmsConfig::from_json(r#"{"acme_inc": {"host": "example.com"}}"#).unwrap();
        let config = realms.get("acme_inc").unwrap();
        assert_eq!(config.host, "example.com");
        assert!(config.aliases.is_empty());
        assert_eq!(config.session, "");

        assert!(RealmsConfig::from_json("[]").is_err());
    }

    #[test]
    fn client_options_carry_host_and_session() {
        let options = realms().get("acme_inc").unwrap().client_options();
        assert_eq!(options.host, "example.com");
        assert_eq!(options.session, "42smurf99");
        assert_eq!(options.service_name, "");
    }
}
