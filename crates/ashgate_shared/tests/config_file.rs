//! The shipped configuration file must stay loadable and equal to the defaults.

use std::path::PathBuf;

use ashgate_shared::ServiceConfig;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/ashgate.toml")
}

#[test]
fn test_shipped_config_loads_and_validates() {
    let config = ServiceConfig::from_file(shipped_config()).unwrap();
    let errors = config.validate();
    assert!(errors.is_empty(), "shipped config invalid: {errors:?}");
}

#[test]
fn test_shipped_config_matches_defaults() {
    let shipped = ServiceConfig::from_file(shipped_config()).unwrap();
    let defaults = ServiceConfig::default();

    // Compare through TOML; the config types are not PartialEq.
    assert_eq!(
        toml::to_string(&shipped).unwrap(),
        toml::to_string(&defaults).unwrap()
    );
}
