use inbox_otp::*;
use std::io::Write;

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = Config::from_toml_str("inbox_capacity = 10\nfallback = \"latin1\"\n").unwrap();

    assert_eq!(config.inbox_capacity, 10);
    assert_eq!(config.fallback, Fallback::Latin1);
    assert_eq!(config.code_ttl_secs, DEFAULT_CODE_TTL_SECS);
    assert_eq!(config.default_list_limit, DEFAULT_LIST_LIMIT);
}

#[test]
fn test_invalid_toml() {
    assert!(matches!(
        Config::from_toml_str("inbox_capacity = \"many\""),
        Err(IngestError::Config(_))
    ));
    assert!(matches!(
        Config::from_toml_str("inbox_capacity = 0"),
        Err(IngestError::Config(_))
    ));
}

#[test]
fn test_code_ttl_is_bounded() {
    let huge = Config::from_toml_str("code_ttl_secs = 9223372036854775807");
    assert!(matches!(huge, Err(IngestError::Config(_))));

    let max = Config::from_toml_str(&format!("code_ttl_secs = {MAX_CODE_TTL_SECS}")).unwrap();
    assert_eq!(max.code_ttl_secs, MAX_CODE_TTL_SECS);
}

#[test]
fn test_unbounded_ttl_does_not_crash_ingest() {
    let store = MemoryStore::new();
    let config = Config {
        code_ttl_secs: u64::MAX,
        ..Config::default()
    };
    let message = InboundMessage::new("a@b.c", "me@inbox.example")
        .with_chunk(b"Subject: x\r\n\r\nCode: 482913\r\n".to_vec());

    let result = tokio_test::block_on(ingest(&store, &config, &message));
    assert!(matches!(result, Err(IngestError::Storage { .. })));
}

#[test]
fn test_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "code_ttl_secs = 120").unwrap();
    writeln!(file, "epin = \"1234\"").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.code_ttl_secs, 120);
    assert_eq!(config.epin.as_deref(), Some("1234"));
    assert!(config.auth_enabled());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::from_file(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(IngestError::Io(_))));
}

#[test]
fn test_latin1_fallback_changes_decoding() {
    let raw = b"Subject: x\r\n\r\nCode: 482913 caf\xe9\r\n";
    let message = InboundMessage::new("a@b.c", "me@inbox.example").with_chunk(raw.to_vec());

    let lenient = assemble(&message, Fallback::LenientUtf8, 0);
    let latin1 = assemble(&message, Fallback::Latin1, 0);

    assert_eq!(lenient.text, "Code: 482913 caf\u{FFFD}");
    assert_eq!(latin1.text, "Code: 482913 café");
    assert_eq!(latin1.verification_code.as_deref(), Some("482913"));
}
