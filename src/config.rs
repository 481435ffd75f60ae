use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    /// JSON seed loaded into the catalog at startup. Empty catalog when unset.
    pub seed_path: Option<PathBuf>,
    /// Allow any origin, method and header. Needed when a browser frontend
    /// is served from a different origin.
    pub permissive_cors: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            seed_path: None,
            permissive_cors: true,
        }
    }
}

impl ServiceConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, path: PathBuf) -> Self {
        self.seed_path = Some(path);
        self
    }

    pub fn with_permissive_cors(mut self, enabled: bool) -> Self {
        self.permissive_cors = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_config_default() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:8080");
        assert!(cfg.seed_path.is_none());
        assert!(cfg.permissive_cors);
    }

    #[test]
    fn service_config_new() {
        let addr: SocketAddr = "10.0.0.1:9000".parse().unwrap();
        let cfg = ServiceConfig::new(addr);
        assert_eq!(cfg.listen_addr, addr);
        assert!(cfg.seed_path.is_none());
    }

    #[test]
    fn service_config_builders() {
        let cfg = ServiceConfig::default()
            .with_seed(PathBuf::from("/etc/lab/seed.json"))
            .with_permissive_cors(false);
        assert_eq!(cfg.seed_path, Some(PathBuf::from("/etc/lab/seed.json")));
        assert!(!cfg.permissive_cors);
    }
}
