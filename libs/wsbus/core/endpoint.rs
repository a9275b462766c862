use crate::config::ClientConfig;
use crate::error::{Result, WsBusError};
use tokio_tungstenite::tungstenite::http::Uri;

/// Resolved connection target
///
/// Built once from [`ClientConfig`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    uri: String,
}

impl Endpoint {
    /// Resolve the endpoint described by `config`
    ///
    /// An explicit `uri` wins and is used verbatim, and the scheme setting is
    /// then not checked. Otherwise the URI is composed as
    /// `scheme + host + ':' + port + path`.
    ///
    /// # Errors
    /// `WsBusError::Configuration` if no host is given without an override,
    /// the composed scheme is not a WebSocket scheme, or the result is not a
    /// valid URI.
    pub fn resolve(config: &ClientConfig) -> Result<Self> {
        let path = normalize_path(&config.path);

        let endpoint = match config.uri.as_deref() {
            Some(uri) if !uri.trim().is_empty() => Self {
                scheme: config.scheme.clone(),
                host: config.host.clone(),
                port: config.port,
                path,
                uri: uri.to_string(),
            },
            _ => {
                let scheme = normalize_scheme(&config.scheme)?;
                let host = config
                    .host
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| {
                        WsBusError::Configuration(
                            "host is required when no uri override is given".into(),
                        )
                    })?
                    .to_string();
                let port = config.port.unwrap_or_else(|| default_port(&scheme));
                let uri = format!("{}{}:{}{}", scheme, host, port, path);

                Self {
                    scheme,
                    host: Some(host),
                    port: Some(port),
                    path,
                    uri,
                }
            }
        };

        endpoint
            .uri
            .parse::<Uri>()
            .map_err(|e| WsBusError::Configuration(format!("invalid uri '{}': {}", endpoint.uri, e)))?;

        Ok(endpoint)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The final URI the transport connects to
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

fn normalize_scheme(scheme: &str) -> Result<String> {
    let bare = scheme.trim().trim_end_matches("://").to_ascii_lowercase();
    match bare.as_str() {
        "ws" | "wss" => Ok(format!("{}://", bare)),
        _ => Err(WsBusError::Configuration(format!(
            "unsupported scheme '{}', expected ws:// or wss://",
            scheme
        ))),
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn default_port(scheme: &str) -> u16 {
    if scheme == "wss://" {
        443
    } else {
        80
    }
}
