#[cfg(test)]
mod tests {
    use relay_config::ConfigLoader;
    use relay_config::schema::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "127.0.0.1:4000");
        assert_eq!(config.auth_token, DEFAULT_AUTH_TOKEN);
        assert!(!config.cors);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_mailbox_config_defaults() {
        let config = MailboxConfig::default();
        assert_eq!(config.agent_timeout_secs, 300);
        assert_eq!(config.sweep_interval_secs, 60);
    }

    #[test]
    fn test_client_and_logging_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.client.url, "http://127.0.0.1:4000");
        assert!(config.client.agent_id.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = RelayConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: RelayConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.server.listen, config.server.listen);
        assert_eq!(restored.relay.agent_timeout_secs, config.relay.agent_timeout_secs);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[server]
auth_token = "s3cret"

[relay]
agent_timeout_secs = 120
"#;
        let config: RelayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.auth_token, "s3cret");
        assert_eq!(config.relay.agent_timeout_secs, 120);
        assert_eq!(config.server.listen, "127.0.0.1:4000");
        assert_eq!(config.relay.sweep_interval_secs, 60);
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_is_valid() {
        let warnings = RelayConfig::default().validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_empty_token_is_error() {
        let mut config = RelayConfig::default();
        config.server.auth_token.clear();
        let err = config.validate().unwrap_err();
        assert!(err.contains("server.auth_token"));
    }

    #[test]
    fn test_bad_listen_is_error() {
        let mut config = RelayConfig::default();
        config.server.listen = "localhost".into();
        assert!(config.validate().unwrap_err().contains("server.listen"));
    }

    #[test]
    fn test_default_token_on_public_bind_warns() {
        let mut config = RelayConfig::default();
        config.server.listen = "0.0.0.0:4000".into();
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "server.auth_token"
            && w.severity == WarningSeverity::Warning));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = RelayConfig::default();
        config.relay.agent_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_timing_is_error() {
        let mut config = RelayConfig::default();
        config.relay.agent_timeout_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.contains("relay.agent_timeout_secs"), "{err}");

        let mut config = RelayConfig::default();
        config.relay.agent_timeout_secs = MAX_TIMING_SECS;
        config.relay.sweep_interval_secs = MAX_TIMING_SECS + 1;
        assert!(config.validate().is_err());

        config.relay.sweep_interval_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_slow_sweep_warns() {
        let mut config = RelayConfig::default();
        config.relay.sweep_interval_secs = 600;
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "relay.sweep_interval_secs"));
    }

    #[test]
    fn test_warning_display_includes_hint() {
        let w = ConfigWarning {
            field: "logging.level".into(),
            message: "unknown log level 'loud'".into(),
            severity: WarningSeverity::Warning,
            hint: Some("Valid values: info".into()),
        };
        let rendered = w.to_string();
        assert!(rendered.contains("logging.level"));
        assert!(rendered.contains("↳ Valid values: info"));
    }

    // ── Env override tests ─────────────────────────────────────

    #[test]
    fn test_env_overrides() {
        let env = env_from(&[
            ("RELAY_AUTH_TOKEN", "from-env"),
            ("RELAY_AGENT_ID", "alice"),
            ("RELAY_LOG_LEVEL", "debug"),
            ("RELAY_URL", "http://relay.internal:4000"),
        ]);
        let config = ConfigLoader::apply_env_overrides(RelayConfig::default(), env);
        assert_eq!(config.server.auth_token, "from-env");
        assert_eq!(config.client.agent_id.as_deref(), Some("alice"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.client.url, "http://relay.internal:4000");
    }

    #[test]
    fn test_port_override_keeps_host() {
        let env = env_from(&[("RELAY_LISTEN", "0.0.0.0:9000"), ("RELAY_PORT", "4100")]);
        let config = ConfigLoader::apply_env_overrides(RelayConfig::default(), env);
        assert_eq!(config.server.listen, "0.0.0.0:4100");
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let env = env_from(&[("RELAY_PORT", "not-a-port")]);
        let config = ConfigLoader::apply_env_overrides(RelayConfig::default(), env);
        assert_eq!(config.server.listen, "127.0.0.1:4000");
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
listen = "127.0.0.1:4555"
auth_token = "file-token"
"#
        )
        .unwrap();
        let loader = ConfigLoader::load_with_env(Some(file.path()), |_| None).unwrap();
        let config = loader.get();
        assert_eq!(config.server.listen, "127.0.0.1:4555");
        assert_eq!(config.server.auth_token, "file-token");
        assert_eq!(loader.path(), file.path());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let loader = ConfigLoader::load_with_env(Some(&path), |_| None).unwrap();
        assert_eq!(loader.get().server.listen, "127.0.0.1:4000");
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nlisten = ").unwrap();
        let err = ConfigLoader::load_with_env(Some(file.path()), |_| None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay]\nagent_timeout_secs = 0").unwrap();
        assert!(ConfigLoader::load_with_env(Some(file.path()), |_| None).is_err());
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let p = std::path::Path::new("/tmp/custom-relay.toml");
        assert_eq!(ConfigLoader::resolve_path(Some(p)), p.to_path_buf());
    }
}
