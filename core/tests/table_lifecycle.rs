//! Tests for loading cin tables from disk through the coordinator.
//!
//! Covers:
//! - Resolving identities from configuration and loading them from files
//! - Reload on a new selection, no reload on an unchanged one
//! - Failures carried as values to every waiter

use std::path::Path;
use std::sync::Arc;

use libcin_core::{
    CinFileLoader, ConfigStore, Configuration, EnsureOutcome, FileConfigStore, LoadError,
    LoadState, TableError, TableKind, TableLoadCoordinator, TableSet,
};

const MAIN: [&str; 3] = ["thphonetic.cin", "CnsPhonetic.cin", "bpmf.cin"];

fn write_cin(dir: &Path, name: &str, ename: &str, defs: &str) {
    let source = format!(
        "%ename {ename}\n%keyname begin\n1 ㄅ\nu ㄧ\n3 ˇ\n%keyname end\n%chardef begin\n{defs}%chardef end\n"
    );
    std::fs::write(dir.join(name), source).unwrap();
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_cin(dir.path(), "thphonetic.cin", "thphonetic", "1u3 比\n1u3 筆\n");
    write_cin(dir.path(), "bpmf.cin", "bpmf", "1u3 匕\n");
    dir
}

#[test]
fn test_selected_table_loads_from_disk() {
    let dir = fixture();
    let config = Configuration {
        cin_dir: dir.path().to_path_buf(),
        ..Configuration::default()
    };
    let tables = TableSet::new();
    let coordinator = TableLoadCoordinator::new(CinFileLoader::new());

    let identity = config.identity(TableKind::Main, &MAIN).unwrap().unwrap();
    let content = coordinator.wait_ready(&tables.main, &identity).unwrap();
    assert_eq!(content.ename, "thphonetic");
    assert_eq!(content.candidates("1u3"), ["比", "筆"]);
    assert_eq!(content.code_display("1u3"), "ㄅㄧˇ");
    assert!(tables.main.status(&identity).is_ok());
}

#[test]
fn test_new_selection_reloads_and_same_selection_does_not() {
    let dir = fixture();
    let mut config = Configuration {
        cin_dir: dir.path().to_path_buf(),
        ..Configuration::default()
    };
    let tables = TableSet::new();
    let coordinator = TableLoadCoordinator::new(CinFileLoader::new());

    let first = config.identity(TableKind::Main, &MAIN).unwrap().unwrap();
    coordinator.wait_ready(&tables.main, &first).unwrap();

    config.sel_cin_type = 2;
    let second = config.identity(TableKind::Main, &MAIN).unwrap().unwrap();
    let content = match coordinator.ensure_loaded(&tables.main, &second).unwrap() {
        EnsureOutcome::Started(handle) => handle.wait().unwrap(),
        EnsureOutcome::Ready(_) => panic!("selection change did not reload"),
    };
    assert_eq!(content.ename, "bpmf");

    assert!(matches!(
        coordinator.ensure_loaded(&tables.main, &second).unwrap(),
        EnsureOutcome::Ready(_)
    ));
    assert_eq!(tables.main.loads_started(), 2);
    // the other tables were never touched
    assert_eq!(tables.reverse.loads_started(), 0);
    assert_eq!(tables.homophone.state(), LoadState::Idle);
}

#[test]
fn test_missing_file_is_a_status_not_a_panic() {
    let dir = fixture();
    let config = Configuration {
        cin_dir: dir.path().to_path_buf(),
        sel_cin_type: 1,
        ..Configuration::default()
    };
    let tables = TableSet::new();
    let coordinator = TableLoadCoordinator::new(CinFileLoader::new());
    let identity = config.identity(TableKind::Main, &MAIN).unwrap().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let coordinator = coordinator.clone();
            let entry = Arc::clone(&tables.main);
            let identity = identity.clone();
            std::thread::spawn(move || coordinator.wait_ready(&entry, &identity))
        })
        .collect();
    for waiter in waiters {
        assert!(matches!(waiter.join().unwrap(), Err(LoadError::Io { .. })));
    }

    assert_eq!(tables.main.state(), LoadState::Idle);
    assert!(tables.main.content().is_none());
    let status = tables.main.status(&identity).unwrap_err();
    assert!(matches!(status, TableError::LoadFailed { kind: TableKind::Main, .. }));
    assert!(status.to_string().contains("main"));
}

#[test]
fn test_file_store_feeds_identities() {
    let dir = fixture();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{ "selCinType": 2, "homophoneQuery": true, "selHCinType": 2, "cinDir": {:?} }}"#,
            dir.path()
        ),
    )
    .unwrap();

    let store = FileConfigStore::new(&config_path);
    let config = store.load().unwrap();
    assert_eq!(config.version, store.version());

    let main = config.identity(TableKind::Main, &MAIN).unwrap().unwrap();
    let homophone = config.identity(TableKind::Homophone, &MAIN).unwrap().unwrap();
    // both select bpmf.cin, through different lists
    assert_eq!(main.files, homophone.files);
    assert_eq!(config.identity(TableKind::Reverse, &MAIN).unwrap(), None);
}
