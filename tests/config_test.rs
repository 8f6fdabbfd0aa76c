use std::fs::File;
use std::io::Write;

use hcache::config::{Config, HandlerSettings, Settings};
use hcache::error::HttpCacheError;
use hcache::http::Method;
use tempfile::NamedTempFile;

fn settings_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_read_settings_file() {
    let file = settings_file(
        "# mutations\nenable_conditional_patch=false\nenable_clear_related_after_put=false\n\nforce_revalidation_of_stale_entries=true\n",
    );
    let settings = Config::new(File::open(file.path()).unwrap()).unwrap();
    assert!(settings.conditional_mutation(&Method::PUT));
    assert!(!settings.conditional_mutation(&Method::PATCH));
    assert!(!settings.clear_related(&Method::PUT));
    assert!(settings.clear_related(&Method::PATCH));
    assert!(settings.force_revalidation_of_stale_entries());
}

#[test]
fn test_read_empty_settings_file_is_defaults() {
    let file = settings_file("");
    let settings = Config::new(File::open(file.path()).unwrap()).unwrap();
    assert_eq!(Settings::default(), settings);
}

#[test]
fn test_read_settings_file_with_unknown_key_is_configuration_error() {
    let file = settings_file("enable_conditional_put=true\ncache_location=/tmp/cache\n");
    let err = Config::new(File::open(file.path()).unwrap()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HttpCacheError>(),
        Some(HttpCacheError::ConfigurationError(_))
    ));
}

#[test]
fn test_read_settings_file_with_bad_value_is_configuration_error() {
    let file = settings_file("enable_clear_related_after_patch=1\n");
    let err = Config::new(File::open(file.path()).unwrap()).unwrap_err();
    assert!(err.to_string().contains("enable_clear_related_after_patch"));
}
