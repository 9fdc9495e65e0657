use portico::Config;

#[test]
fn test_defaults() {
    let cfg = Config::default();
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.backlog, 1024);
    assert_eq!(cfg.limits.timeout_secs, 30);
    assert_eq!(cfg.limits.max_header_bytes, 64 * 1024);
    assert!(cfg.ssl.is_none());
    assert_eq!(cfg.compression, vec!["gzip", "deflate"]);
}

#[test]
fn test_listen_addr_formatting() {
    let mut cfg = Config::default();
    cfg.server.host = "0.0.0.0".to_string();
    cfg.server.port = 9000;
    assert_eq!(cfg.listen_addr(), "0.0.0.0:9000");
}

#[test]
fn test_timeout_conversion() {
    let mut cfg = Config::default();
    cfg.limits.timeout_secs = 5;
    assert_eq!(cfg.timeout(), std::time::Duration::from_secs(5));
}

#[test]
fn test_load_from_yaml_file() {
    let yaml = r#"
server:
  host: "0.0.0.0"
  port: 9000
  backlog: 64

limits:
  timeout_secs: 10

ssl:
  cert_file: "certs/server.crt"
  key_file: "certs/server.key"

compression:
  - gzip
"#;
    let path = std::env::temp_dir().join(format!("portico_cfg_{}.yaml", std::process::id()));
    std::fs::write(&path, yaml).unwrap();

    let cfg = Config::load_from_file(&path).unwrap();
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.backlog, 64);
    assert_eq!(cfg.limits.timeout_secs, 10);
    // unspecified limits fall back to their defaults
    assert_eq!(cfg.limits.max_header_bytes, 64 * 1024);
    let ssl = cfg.ssl.expect("ssl section parsed");
    assert_eq!(ssl.cert_file.to_str().unwrap(), "certs/server.crt");
    assert!(ssl.passwd.is_none());
    assert_eq!(cfg.compression, vec!["gzip"]);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::load_from_file("/definitely/not/here.yaml").is_err());
}
