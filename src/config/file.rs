use serde::Deserialize;
use std::{path::Path, path::PathBuf, time::Duration};
use tokio::fs;

use super::{ConfigError, types::NegotiationPolicy};

// -----------------------------------------------------------------------------
// ----- ConfigFile ------------------------------------------------------------

/// Optional TOML source. Every key may be omitted; flags and env vars win.
///
/// ```toml
/// listen = "127.0.0.1:15432"
/// backend = "db.internal:5432"
/// client_cert = "/etc/pgssl/client.crt"
/// client_key = "/etc/pgssl/client.key"
/// backend_ca = "/etc/pgssl/ca.crt"
/// ssl_policy = "reject-silently"
/// connect_timeout = "5s"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub listen: Option<String>,

    #[serde(default)]
    pub backend: Option<String>,

    #[serde(default)]
    pub client_cert: Option<PathBuf>,

    #[serde(default)]
    pub client_key: Option<PathBuf>,

    #[serde(default)]
    pub backend_ca: Option<PathBuf>,

    #[serde(default)]
    pub ssl_policy: Option<NegotiationPolicy>,

    #[serde(default, deserialize_with = "de_duration")]
    pub connect_timeout: Option<Duration>,
}

// -----------------------------------------------------------------------------
// ----- ConfigFile: Static ----------------------------------------------------

impl ConfigFile {
    pub async fn from_file_async(path: &Path) -> Result<ConfigFile, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&raw).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(raw: &str) -> Result<ConfigFile, toml::de::Error> {
        toml::from_str(raw)
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// `"5s"` / `"250ms"` via humantime, or a bare integer of milliseconds.
fn de_duration<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{Error, Unexpected, Visitor};
    use std::fmt;

    struct OptVisitor;
    struct DurationVisitor;

    impl<'de> Visitor<'de> for OptVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"5s\" or integer milliseconds")
        }
        fn visit_none<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_unit<E: Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_some<D2>(self, d2: D2) -> Result<Self::Value, D2::Error>
        where
            D2: serde::Deserializer<'de>,
        {
            d2.deserialize_any(DurationVisitor)
        }
    }

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"5s\" or integer milliseconds")
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Duration::from_millis(v)))
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<Self::Value, E> {
            if v < 0 {
                return Err(E::invalid_value(Unexpected::Signed(v), &self));
            }
            Ok(Some(Duration::from_millis(v as u64)))
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<Self::Value, E> {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    d.deserialize_option(OptVisitor)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
