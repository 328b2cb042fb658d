use letitup_client::ColorMode;
use letitup_daemon::LetItUpConfig;
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = LetItUpConfig::load_from(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.config_path, path);
    assert_eq!(config.hub.port, 3000);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[hub]"));
    assert!(written.contains("[client]"));
    assert!(written.contains("[pulse]"));
}

#[test]
fn test_saved_changes_are_loaded_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = LetItUpConfig::load_from(&path).unwrap();
    config.hub.exclusive_producer = true;
    config.hub.port = 3100;
    config.client.color_mode = ColorMode::White;
    config.save().unwrap();

    let loaded = LetItUpConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.hub_settings().exclusive_producer);
    assert_eq!(loaded.hub_settings().listen_addr, "0.0.0.0:3100");
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[hub]\nport = \"three thousand\"\n").unwrap();
    assert!(LetItUpConfig::load_from(&path).is_err());

    std::fs::write(&path, "[pulse]\nintensity = 2.0\n").unwrap();
    assert!(LetItUpConfig::load_from(&path).is_err());
}
