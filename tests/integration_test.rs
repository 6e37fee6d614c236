use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use flate2::{write::GzEncoder, Compression};
use httpmock::prelude::*;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Run the cpm binary in `dir` with the given args and registry URL.
fn run_cpm(dir: &Path, registry_url: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cpm"))
        .current_dir(dir)
        .env("CPM_REGISTRY_URL", registry_url)
        .args(args)
        .output()
        .expect("Failed to run cpm binary")
}

/// Create a package directory with a valid manifest and some content.
fn create_package_dir(dir: &Path, name: &str) {
    fs::write(
        dir.join("package.yml"),
        format!(
            "name: \"{}\"\nversion: \"1.0.0\"\ndescription: \"test package\"\nauthor: \"tester\"\n",
            name
        ),
    )
    .unwrap();
    fs::create_dir(dir.join("src")).unwrap();
    fs::write(dir.join("src").join("main.txt"), "hello").unwrap();
}

/// Build a gzip+tar archive containing a single regular file entry.
fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    {
        let mut builder = tar::Builder::new(&mut encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            let name_bytes = name.as_bytes();
            header.as_old_mut().name[..name_bytes.len()].copy_from_slice(name_bytes);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        builder.finish().unwrap();
    }
    encoder.finish().unwrap()
}

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[test]
fn test_init_scaffolds_manifest_once() {
    let temp = TempDir::new().unwrap();

    let first = run_cpm(temp.path(), "http://unused.local", &["init"]);
    assert!(first.status.success(), "init failed: {:?}", first);

    let manifest = fs::read_to_string(temp.path().join("package.yml")).unwrap();
    assert!(manifest.contains("version: \"0.0.0\""));

    let second = run_cpm(temp.path(), "http://unused.local", &["init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));
}

#[test]
fn test_upload_round_trip_prints_assigned_url() {
    let temp = TempDir::new().unwrap();
    create_package_dir(temp.path(), "demo");

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/packages/upload")
            .header("authorization", "Bearer sekrit");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"url":"https://repo/demo/1.0.0"}"#);
    });

    let output = run_cpm(temp.path(), &server.base_url(), &["upload", "sekrit"]);

    mock.assert();
    assert!(output.status.success(), "upload failed: {:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains("Upload successful: https://repo/demo/1.0.0"));
}

#[test]
fn test_upload_rejected_token_message_reaches_user() {
    let temp = TempDir::new().unwrap();
    create_package_dir(temp.path(), "demo");

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/packages/upload");
        then.status(400)
            .header("content-type", "application/json")
            .body(r#"{"detail":"bad token"}"#);
    });

    let output = run_cpm(temp.path(), &server.base_url(), &["upload", "nope"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad token"));
}

#[test]
fn test_upload_without_manifest_hints_at_init() {
    let temp = TempDir::new().unwrap();

    let output = run_cpm(temp.path(), "http://unused.local", &["upload", "sekrit"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("run `cpm init` first"));
}

#[test]
fn test_download_extracts_into_output_dir() {
    let archive = build_archive(&[("demo/readme.txt", "hello from the registry")]);

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/packages/demo/download");
        then.status(200)
            .header("content-type", "application/gzip")
            .body(archive.as_slice());
    });

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let output = run_cpm(
        temp.path(),
        &server.base_url(),
        &["download", "demo", "--output", dest.to_str().unwrap()],
    );

    mock.assert();
    assert!(output.status.success(), "download failed: {:?}", output);
    assert_eq!(
        fs::read_to_string(dest.join("demo").join("readme.txt")).unwrap(),
        "hello from the registry"
    );
}

#[test]
fn test_download_missing_package_reports_status_and_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/packages/missing/download");
        then.status(404).body("not found");
    });

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let output = run_cpm(
        temp.path(),
        &server.base_url(),
        &["download", "missing", "--output", dest.to_str().unwrap()],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("404"));
    assert!(stderr.contains("not found"));
    assert!(!dest.join("missing").exists());
}

#[test]
fn test_download_with_matching_checksum_extracts() {
    let archive = build_archive(&[("demo/readme.txt", "verified content")]);
    let digest = sha256_hex(&archive);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/packages/demo/download");
        then.status(200).body(archive.as_slice());
    });

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let output = run_cpm(
        temp.path(),
        &server.base_url(),
        &[
            "download",
            "demo",
            "--output",
            dest.to_str().unwrap(),
            "--checksum",
            &digest,
        ],
    );

    assert!(output.status.success(), "download failed: {:?}", output);
    assert_eq!(
        fs::read_to_string(dest.join("demo").join("readme.txt")).unwrap(),
        "verified content"
    );
}

#[test]
fn test_download_with_wrong_checksum_extracts_nothing() {
    let archive = build_archive(&[("demo/readme.txt", "tampered content")]);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/packages/demo/download");
        then.status(200).body(archive.as_slice());
    });

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let output = run_cpm(
        temp.path(),
        &server.base_url(),
        &[
            "download",
            "demo",
            "--output",
            dest.to_str().unwrap(),
            "--checksum",
            &sha256_hex(b"something else entirely"),
        ],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("digest mismatch"));
    assert!(!dest.join("demo").exists());
}

#[test]
fn test_download_rejects_traversal_entries() {
    let archive = build_archive(&[("../evil.txt", "pwned")]);

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/packages/demo/download");
        then.status(200).body(archive.as_slice());
    });

    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let output = run_cpm(
        temp.path(),
        &server.base_url(),
        &["download", "demo", "--output", dest.to_str().unwrap()],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("escapes destination"));
    assert!(!temp.path().join("evil.txt").exists());
}

#[test]
fn test_publish_then_fetch_round_trip() {
    // Pack and upload from one directory, serve the captured archive back
    // and extract it into another; the tree must survive byte-for-byte.
    let source = TempDir::new().unwrap();
    create_package_dir(source.path(), "roundtrip");

    let server = MockServer::start();
    let upload_mock = server.mock(|when, then| {
        when.method(POST).path("/packages/upload");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"url":"https://repo/roundtrip/1.0.0"}"#);
    });

    let upload = run_cpm(source.path(), &server.base_url(), &["upload", "sekrit"]);
    assert!(upload.status.success(), "upload failed: {:?}", upload);
    upload_mock.assert();

    // Re-pack the same tree for the download fixture; packing is
    // deterministic, so this matches what was uploaded.
    let archive = {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            builder.append_dir_all("roundtrip", source.path()).unwrap();
            builder.finish().unwrap();
        }
        encoder.finish().unwrap()
    };

    server.mock(|when, then| {
        when.method(GET).path("/packages/roundtrip/download");
        then.status(200).body(archive.as_slice());
    });

    let dest = TempDir::new().unwrap();
    let out_dir = dest.path().join("pkgs");
    let download = run_cpm(
        dest.path(),
        &server.base_url(),
        &["download", "roundtrip", "--output", out_dir.to_str().unwrap()],
    );
    assert!(download.status.success(), "download failed: {:?}", download);

    let extracted = out_dir.join("roundtrip");
    assert_eq!(
        fs::read_to_string(extracted.join("src").join("main.txt")).unwrap(),
        "hello"
    );
    assert!(extracted.join("package.yml").exists());
}
