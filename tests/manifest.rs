mod common;

use common::ScriptedReader;
use ndata_container::*;
use std::fs;
use std::rc::Rc;

fn write_manifest(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("batch.toml");
    fs::write(&path, text).unwrap();
    path
}

fn reader() -> Rc<ScriptedReader> {
    Rc::new(ScriptedReader::with_units(&[("s0", &[1, 2]), ("s1", &[3])]))
}

#[test]
fn load_builds_loads_and_selects_units() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        &dir,
        r#"
share_positions = true
units = "all"

[[files]]
modality = "spike"
filenames = ["s0", "s1"]
object_names = ["3", "3"]
systems = ["Axona", "Axona"]

[[files]]
modality = "position"
filenames = ["arena"]
"#,
    );

    let reader = reader();
    let shared = Rc::clone(&reader);
    let mut data = load(&path, move || NData::new(shared.clone())).unwrap();

    assert!(data.share_positions());
    assert_eq!(data.num_sessions(), 2);
    assert_eq!(data.len(), 3);
    assert_eq!(reader.count(Modality::Position), 1);
    assert_eq!(data.get(2).unwrap().active_unit(), Some(3));
    assert_eq!(data.sessions()[1].system(), Some("Axona"));
}

#[test]
fn explicit_units_from_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(
        &dir,
        r#"
units = [[1, 2], "bad"]

[[files]]
modality = "spike"
filenames = ["s0", "s1"]
"#,
    );

    let reader = reader();
    let data = load(&path, move || NData::new(reader.clone())).unwrap();

    assert_eq!(data.units(), &[Some(vec![1, 2]), None]);
    assert_eq!(data.len(), 2);
    assert_eq!(data.diagnostics().len(), 1);
}

#[test]
fn manifest_without_units_leaves_index_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, "[[files]]\nmodality = \"spike\"\nfilenames = [\"s0\"]\n");

    let reader = reader();
    let data = load(&path, move || NData::new(reader.clone())).unwrap();
    assert_eq!(data.num_sessions(), 1);
    assert!(data.is_empty());
}

#[test]
fn bad_group_is_reported_not_fatal() {
    let manifest: Manifest = r#"
[[files]]
modality = "spike"
filenames = ["s0", "s1"]
systems = ["Axona"]

[[files]]
modality = "lfp"
filenames = ["e0"]
"#
    .parse()
    .unwrap();

    let reader = reader();
    let data = manifest.build(move || NData::new(reader.clone()));
    assert!(data.descriptors(Modality::Spike).is_empty());
    assert_eq!(data.descriptors(Modality::Lfp).len(), 1);
    assert_eq!(data.diagnostics().len(), 1);
}

#[test]
fn missing_manifest_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let reader = reader();
    let result = load(dir.path().join("absent.toml"), move || NData::new(reader.clone()));
    assert!(matches!(result, Err(ContainerError::Io(_))));
}
