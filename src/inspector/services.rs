//! Service reachability report: local ports, systemd units and named
//! endpoints, all probed concurrently.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Config;

/// Local ports probed on every report.
const LOCAL_PORTS: &[(&str, u16)] = &[("SSH", 22), ("HTTP", 80), ("HTTPS", 443)];

const PORT_TIMEOUT: Duration = Duration::from_secs(2);
const HTTP_TIMEOUT: Duration = Duration::from_secs(3);
const UNIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Online(String),
    /// Reachable but unhealthy, e.g. an HTTP 503.
    Degraded(String),
    Offline(String),
    /// The probe itself could not run or the target is malformed.
    Unknown(String),
}

impl ServiceStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Online(_) => "✅",
            Self::Degraded(_) => "⚠️",
            Self::Offline(_) => "❌",
            Self::Unknown(_) => "❔",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online(d) | Self::Degraded(d) | Self::Offline(d) | Self::Unknown(d) => {
                f.write_str(d)
            }
        }
    }
}

/// A named external endpoint from config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Http(Url),
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// `http(s)://…` becomes an HTTP check, `host:port` a TCP check.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Url::parse(raw)
                .map(Self::Http)
                .map_err(|e| format!("invalid endpoint: {}", e));
        }
        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => port
                .parse::<u16>()
                .map(|port| Self::Tcp {
                    host: host.trim_matches(|c| c == '[' || c == ']').to_string(),
                    port,
                })
                .map_err(|_| format!("invalid endpoint: bad port `{}`", port)),
            _ => Err("invalid endpoint".to_string()),
        }
    }
}

/// What the services report probes.
#[derive(Debug, Clone, Default)]
pub struct ServiceTargets {
    pub ports: Vec<(String, u16)>,
    pub units: Vec<String>,
    /// name → raw endpoint string, parsed at probe time
    pub endpoints: BTreeMap<String, String>,
}

impl ServiceTargets {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ports: LOCAL_PORTS
                .iter()
                .map(|(name, port)| (name.to_string(), *port))
                .collect(),
            units: config.service_units.clone(),
            endpoints: config.services.clone(),
        }
    }
}

/// Connect to `host:port` within `timeout`.
pub async fn check_tcp(host: &str, port: u16, timeout: Duration) -> ServiceStatus {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => ServiceStatus::Online("Online".into()),
        Ok(Err(e)) => ServiceStatus::Offline(format!("Offline ({})", e)),
        Err(_) => ServiceStatus::Offline("Offline (timed out)".into()),
    }
}

/// GET a URL or connect to a TCP endpoint.
pub async fn check_endpoint(client: &reqwest::Client, endpoint: &Endpoint) -> ServiceStatus {
    match endpoint {
        Endpoint::Http(url) => match client.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => {
                ServiceStatus::Online(format!("Online ({})", resp.status().as_u16()))
            }
            Ok(resp) => ServiceStatus::Degraded(format!("Error {}", resp.status().as_u16())),
            Err(e) => ServiceStatus::Offline(format!("Offline ({})", e)),
        },
        Endpoint::Tcp { host, port } => check_tcp(host, *port, PORT_TIMEOUT).await,
    }
}

async fn unit_status(systemctl: Option<&Path>, unit: &str) -> ServiceStatus {
    let Some(systemctl) = systemctl else {
        return ServiceStatus::Unknown("unknown (systemctl unavailable)".into());
    };
    let mut cmd = Command::new(systemctl);
    cmd.args(["is-active", unit]).kill_on_drop(true);
    match tokio::time::timeout(UNIT_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) => {
            let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if state == "active" {
                ServiceStatus::Online("running".into())
            } else if state.is_empty() {
                ServiceStatus::Offline("not running".into())
            } else {
                ServiceStatus::Offline(format!("not running ({})", state))
            }
        }
        Ok(Err(e)) => {
            debug!(unit, error = %e, "systemctl unavailable");
            ServiceStatus::Unknown("unknown (systemctl unavailable)".into())
        }
        Err(_) => ServiceStatus::Unknown("unknown (systemctl timed out)".into()),
    }
}

fn line(name: &str, status: &ServiceStatus) -> String {
    format!("{} *{}*: {}\n", status.icon(), name, status)
}

/// Probe every target concurrently and render one line per target.
#[instrument(skip_all, fields(ports = targets.ports.len(), units = targets.units.len(), endpoints = targets.endpoints.len()))]
pub async fn services_summary(targets: &ServiceTargets) -> String {
    let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build();

    let ports = join_all(
        targets
            .ports
            .iter()
            .map(|(_, port)| check_tcp("127.0.0.1", *port, PORT_TIMEOUT)),
    );
    let systemctl = which::which("systemctl").ok();
    let units = join_all(
        targets
            .units
            .iter()
            .map(|unit| unit_status(systemctl.as_deref(), unit)),
    );
    let endpoints = join_all(targets.endpoints.values().map(|raw| {
        let client = client.as_ref();
        async move {
            match (Endpoint::parse(raw), client) {
                (Err(reason), _) => ServiceStatus::Unknown(reason),
                (Ok(endpoint), Ok(client)) => check_endpoint(client, &endpoint).await,
                (Ok(Endpoint::Tcp { host, port }), Err(_)) => {
                    check_tcp(&host, port, PORT_TIMEOUT).await
                }
                (Ok(Endpoint::Http(_)), Err(e)) => {
                    ServiceStatus::Unknown(format!("unknown (HTTP client unavailable: {})", e))
                }
            }
        }
    }));
    let (ports, units, endpoints) = tokio::join!(ports, units, endpoints);

    let mut out = String::from("🔧 *Services*\n");
    if !ports.is_empty() {
        out.push_str("\n*Ports:*\n");
        for ((name, port), status) in targets.ports.iter().zip(&ports) {
            out.push_str(&line(&format!("{} ({})", name, port), status));
        }
    }
    if !units.is_empty() {
        out.push_str("\n*System units:*\n");
        for (unit, status) in targets.units.iter().zip(&units) {
            out.push_str(&line(unit, status));
        }
    }
    if !endpoints.is_empty() {
        out.push_str("\n*Endpoints:*\n");
        for (name, status) in targets.endpoints.keys().zip(&endpoints) {
            out.push_str(&line(name, status));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_endpoint() {
        let ep = Endpoint::parse("https://example.com/health").unwrap();
        assert!(matches!(ep, Endpoint::Http(url) if url.host_str() == Some("example.com")));
    }

    #[test]
    fn test_parse_tcp_endpoint() {
        assert_eq!(
            Endpoint::parse("game.example.com:25565").unwrap(),
            Endpoint::Tcp {
                host: "game.example.com".into(),
                port: 25565
            }
        );
        assert_eq!(
            Endpoint::parse("[::1]:8080").unwrap(),
            Endpoint::Tcp {
                host: "::1".into(),
                port: 8080
            }
        );
    }

    #[test]
    fn test_parse_invalid_endpoint() {
        assert!(Endpoint::parse("example.com").is_err());
        assert!(Endpoint::parse("example.com:http").is_err());
        assert!(Endpoint::parse(":80").is_err());
    }

    #[test]
    fn test_status_line() {
        let status = ServiceStatus::Degraded("Error 503".into());
        assert_eq!(line("api", &status), "⚠️ *api*: Error 503\n");
    }

    #[tokio::test]
    async fn test_invalid_endpoint_does_not_hide_others() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let targets = ServiceTargets {
            ports: Vec::new(),
            units: Vec::new(),
            endpoints: BTreeMap::from([
                ("broken".to_string(), "nonsense".to_string()),
                ("local".to_string(), format!("127.0.0.1:{}", port)),
            ]),
        };
        let text = services_summary(&targets).await;
        assert!(text.contains("❔ *broken*: invalid endpoint"));
        assert!(text.contains("✅ *local*: Online"));
    }
}
