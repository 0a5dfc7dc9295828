//! Configuration files, environment overrides, and extra-library loading.

use std::collections::HashMap;
use std::io::Write;

use aion_gpi::{load_config, parse_extra_list, ExtraEntry, GpiConfig, GpiError};
use aion_gpi_conformance::{Harness, CLOCKED};

#[test]
fn file_then_environment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
log_level = "warn"
args = ["+verbose"]

[[extra]]
library = "/opt/sim/libfirst.so"
"#
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.extra, vec![ExtraEntry::new("/opt/sim/libfirst.so")]);

    let env: HashMap<&str, &str> = [
        ("GPI_EXTRA", "/opt/a.so:start_a, /opt/b.so"),
        ("GPI_LOG_LEVEL", "aion_gpi=trace"),
    ]
    .into_iter()
    .collect();
    let config = config
        .with_overrides(|key| env.get(key).map(|v| v.to_string()))
        .unwrap();
    assert_eq!(config.log_level, "aion_gpi=trace");
    assert_eq!(config.args, vec!["+verbose"]);
    assert_eq!(config.extra.len(), 2);
    assert_eq!(config.extra[0].entry, "start_a");
    assert_eq!(config.extra[1], ExtraEntry::new("/opt/b.so"));
}

#[test]
fn defaults_without_any_source() {
    let config = GpiConfig::default().with_overrides(|_| None).unwrap();
    assert_eq!(config, GpiConfig::default());
    assert_eq!(config.log_level, "info");
    assert!(config.extra.is_empty());
}

#[test]
fn extra_list_keeps_order() {
    let entries = parse_extra_list("one.so,two.so:go,,three.so").unwrap();
    let names: Vec<_> = entries
        .iter()
        .map(|e| e.library.display().to_string())
        .collect();
    assert_eq!(names, vec!["one.so", "two.so", "three.so"]);
    assert_eq!(entries[1].entry, "go");
}

#[test]
fn missing_library_stops_loading() {
    let h = Harness::new(CLOCKED);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("libabsent.so");
    let entries = vec![ExtraEntry::new(&missing), ExtraEntry::new("libnever_reached.so")];
    let err = h.gpi.load_extras(&entries).unwrap_err();
    match err {
        GpiError::ExtraLoad { library, .. } => {
            assert_eq!(library, missing.display().to_string());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn no_extras_is_a_no_op() {
    let h = Harness::new(CLOCKED);
    assert_eq!(h.gpi.load_extras(&[]).unwrap(), 0);
    assert_eq!(h.gpi.backend_names(), vec!["primary".to_string()]);
}
