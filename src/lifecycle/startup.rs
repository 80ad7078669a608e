//! Startup configuration resolution.
//!
//! # Responsibilities
//! - Load the optional config file
//! - Apply command-line overrides (listen address, TLS)
//! - Validate the result before anything binds
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Command-line flags win over the config file

use std::path::PathBuf;

use crate::config::{load_config, validate_config, ConfigError, ProxyConfig, TlsConfig};

/// Options collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Listen address override.
    pub listen: Option<String>,
    /// Optional TOML configuration file.
    pub config_path: Option<PathBuf>,
    /// Serve TLS with a self-signed certificate.
    pub tls: bool,
}

/// Build the validated configuration the proxy will run with.
pub fn resolve_config(options: &StartupOptions) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(listen) = &options.listen {
        config.listener.bind_address = listen.clone();
    }
    if options.tls && config.listener.tls.is_none() {
        config.listener.tls = Some(TlsConfig::self_signed());
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationError;
    use std::io::Write;

    #[test]
    fn defaults_without_file_or_flags() {
        let config = resolve_config(&StartupOptions::default()).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nbind_address = \"127.0.0.1:3128\"\n[timeouts]\nconnect_secs = 5"
        )
        .unwrap();

        let config = resolve_config(&StartupOptions {
            listen: Some("127.0.0.1:9999".into()),
            config_path: Some(file.path().to_path_buf()),
            tls: true,
        })
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.timeouts.connect_secs, 5);
        assert_eq!(config.listener.tls, Some(TlsConfig::self_signed()));
    }

    #[test]
    fn invalid_listen_flag_is_rejected() {
        let err = resolve_config(&StartupOptions {
            listen: Some("not an address".into()),
            ..Default::default()
        })
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(
                errors,
                vec![ValidationError::InvalidListenAddress("not an address".into())]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }
}
