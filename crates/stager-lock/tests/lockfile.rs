use stager_lock::{ArtifactKind, LockError, Lockfile};
use stager_verify::HashAlgorithm;

const CLIENT_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
const NATIVES_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

fn document(artifacts: &str) -> String {
    format!(r#"{{"schemaVersion":1,"targetVersion":"1.20.1","artifacts":[{artifacts}]}}"#)
}

fn client() -> String {
    format!(
        r#"{{"name":"client.jar","kind":"file","sourceLocation":"https://example.invalid/client.jar",
            "relativePath":"versions/1.20.1/1.20.1.jar","checksum":{{"algorithm":"sha1","value":"{CLIENT_SHA1}"}},"size":11}}"#
    )
}

fn natives() -> String {
    format!(
        r#"{{"name":"lwjgl-natives","kind":"archive","sourceLocation":"https://example.invalid/n.jar",
            "relativePath":"libraries/org/lwjgl/lwjgl-natives-linux.jar","checksum":{{"algorithm":"sha256","value":"{NATIVES_SHA256}"}}}}"#
    )
}

#[test]
fn parses_a_valid_lockfile() {
    let lockfile = Lockfile::parse(&document(&format!("{},{}", client(), natives()))).unwrap();

    assert_eq!(lockfile.target_version, "1.20.1");
    assert_eq!(lockfile.artifacts.len(), 2);

    let client = &lockfile.artifacts[0];
    assert_eq!(client.kind().unwrap(), ArtifactKind::File);
    assert_eq!(client.checksum.algorithm(), HashAlgorithm::Sha1);
    assert_eq!(client.size, Some(11));

    let natives = &lockfile.artifacts[1];
    assert_eq!(natives.kind().unwrap(), ArtifactKind::Archive);
    assert_eq!(natives.size, None);
    assert!(lockfile.unsupported_kinds().is_empty());
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pack.lock.json");
    std::fs::write(&path, document(&client())).unwrap();

    assert_eq!(Lockfile::load(&path).unwrap().artifacts.len(), 1);
    assert!(matches!(
        Lockfile::load(dir.path().join("missing.json")),
        Err(LockError::Read { .. })
    ));
}

#[test]
fn malformed_json_is_rejected() {
    assert!(matches!(Lockfile::parse("{"), Err(LockError::Malformed(_))));
    assert!(matches!(
        Lockfile::parse(&document(&client().replace(CLIENT_SHA1, "ABC"))),
        Err(LockError::Malformed(_))
    ));
}

#[test]
fn wrong_schema_version_is_rejected() {
    let text = document(&client()).replace(r#""schemaVersion":1"#, r#""schemaVersion":2"#);
    match Lockfile::parse(&text) {
        Err(LockError::Invalid(message)) => assert!(message.contains("schemaVersion 2")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn duplicate_names_are_rejected() {
    let text = document(&format!("{},{}", client(), client()));
    match Lockfile::parse(&text) {
        Err(LockError::Invalid(message)) => assert!(message.contains("client.jar")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn traversal_paths_are_rejected() {
    let text = document(&client().replace("versions/1.20.1/1.20.1.jar", "versions/../../x.jar"));
    assert!(matches!(
        Lockfile::parse(&text),
        Err(LockError::InvalidPath { .. })
    ));
}

#[test]
fn unsupported_kinds_are_counted_by_tag() {
    let text = document(&format!(
        "{},{},{}",
        client().replace(r#""kind":"file""#, r#""kind":"installer""#),
        natives().replace(r#""kind":"archive""#, r#""kind":"installer""#),
        client()
            .replace("client.jar", "extra.jar")
            .replace("1.20.1.jar", "extra.jar")
    ));
    let lockfile = Lockfile::parse(&text).unwrap();
    let kinds = lockfile.unsupported_kinds();
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds["installer"], 2);
}
