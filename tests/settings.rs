use std::fs;

use tfscope::TfscopeError;
use tfscope::settings::Settings;

#[test]
fn defaults_fill_unset_keys() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("service.toml");
    fs::write(&path, "database_path = \"/data/tfbp.db\"\n").expect("settings written");

    let settings = Settings::from_file(path.to_str().unwrap()).expect("settings load");
    assert_eq!(settings, Settings::new("/data/tfbp.db"));
    assert_eq!(settings.page_size_default, 100);
    assert_eq!(settings.page_size_max, 10000);
    assert_eq!(settings.cors_origins, vec!["http://localhost:5173".to_string()]);
    assert!(settings.hf_token.is_none());
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("service.toml");
    fs::write(
        &path,
        r#"
database_path = "views.db"
hf_token = "hf_abc"
cors_origins = ["http://a.example", "http://b.example"]
page_size_max = 500
bind = "0.0.0.0:9000"
"#,
    )
    .expect("settings written");

    let settings = Settings::from_file(path.to_str().unwrap()).expect("settings load");
    assert_eq!(settings.database_path, "views.db");
    assert_eq!(settings.hf_token.as_deref(), Some("hf_abc"));
    assert_eq!(settings.cors_origins.len(), 2);
    assert_eq!(settings.page_size_max, 500);
    assert_eq!(settings.page_size_default, 100);
    assert_eq!(settings.bind, "0.0.0.0:9000");
}

#[test]
fn database_path_is_required() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("service.toml");
    fs::write(&path, "page_size_max = 10\n").expect("settings written");
    let err = Settings::from_file(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, TfscopeError::Config(_)), "got {err}");
    assert!(!err.is_client_error());
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("service.toml");
    fs::write(&path, "database_path = \n").expect("settings written");
    assert!(matches!(
        Settings::from_file(path.to_str().unwrap()),
        Err(TfscopeError::Config(_))
    ));
}
