//! End-to-end pipeline tests: build a fixture tree, snapshot it, simulate
//! bulk encryption, and verify the comparison output all the way through
//! the persisted baseline.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use entropy_sentinel::prelude::*;

/// 64 KiB cycling through every byte value: Shannon entropy exactly 8.0.
fn encrypted_bytes() -> Vec<u8> {
    (0..65_536usize).map(|i| (i % 256) as u8).collect()
}

/// Repetitive ASCII text, low entropy, well above the 64-byte floor.
fn document_bytes() -> Vec<u8> {
    b"quarterly report: revenue grew while costs held steady. "
        .iter()
        .copied()
        .cycle()
        .take(8192)
        .collect()
}

fn write_tree(root: &Path, files: &[(&str, Vec<u8>)]) {
    for (rel, bytes) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
    }
}

#[test]
fn scan_produces_expected_profile() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("docs/a.docx", document_bytes()),
            ("docs/b.docx", document_bytes()),
            ("db/dump.sql", document_bytes()),
            ("media/photo.jpg", encrypted_bytes()),
        ],
    );

    let snap = scan(tmp.path(), &Config::default(), None).unwrap();
    assert_eq!(snap.total_files, 4);
    assert_eq!(snap.very_high_count, 1);
    assert_eq!(snap.suspicious.len(), 1);
    assert!(snap.suspicious[0].path.ends_with("photo.jpg"));
    assert_eq!(snap.by_extension[".docx"].count, 2);
    assert!(snap.by_extension[".docx"].avg_entropy < 6.0);
    assert!(snap.by_extension[".jpg"].avg_entropy > 7.9);
}

#[test]
fn pruned_directories_never_contribute() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("src/main.txt", document_bytes()),
            (".git/objects/pack.bin", encrypted_bytes()),
            ("node_modules/dep/blob.bin", encrypted_bytes()),
        ],
    );

    let snap = scan(tmp.path(), &Config::default(), None).unwrap();
    assert_eq!(snap.total_files, 1);
    assert_eq!(snap.very_high_count, 0);
}

#[test]
fn encryption_event_raises_critical() {
    let tmp = TempDir::new().unwrap();
    let files: Vec<(String, Vec<u8>)> = (0..20)
        .map(|i| (format!("docs/report_{i}.docx"), document_bytes()))
        .collect();
    for (rel, bytes) in &files {
        write_tree(tmp.path(), &[(rel.as_str(), bytes.clone())]);
    }

    let config = Config::default();
    let baseline = scan(tmp.path(), &config, None).unwrap();
    assert_eq!(baseline.total_files, 20);
    assert_eq!(baseline.very_high_count, 0);

    // Simulate ransomware: rewrite every document with ciphertext-like bytes.
    for (rel, _) in &files {
        fs::write(tmp.path().join(rel), encrypted_bytes()).unwrap();
    }

    let current = scan(tmp.path(), &config, None).unwrap();
    let report = compare(&baseline, &current, &config.compare);

    assert_eq!(report.severity, Severity::Critical);
    assert_eq!(report.severity.exit_code(), 2);
    let signals: Vec<Signal> = report.alerts.iter().map(|a| a.signal).collect();
    assert!(signals.contains(&Signal::EntropySpike));
    assert!(signals.contains(&Signal::MassEncryption));
    assert!(signals.contains(&Signal::ExtensionEntropyShift));
    assert!(report.entropy_delta > 1.5);
}

#[test]
fn partial_encryption_raises_extension_shift_only() {
    let tmp = TempDir::new().unwrap();
    let mut files = vec![
        ("a.docx".to_string(), document_bytes()),
        ("b.docx".to_string(), document_bytes()),
    ];
    for i in 0..10 {
        files.push((format!("big/table_{i}.sql"), document_bytes()));
    }
    for (rel, bytes) in &files {
        write_tree(tmp.path(), &[(rel.as_str(), bytes.clone())]);
    }

    let config = Config::default();
    let baseline = scan(tmp.path(), &config, None).unwrap();
    assert_eq!(baseline.total_files, 12);

    // Only the two .docx files flip: 2 of 12 is under the 20% mass
    // threshold, and the global average moves well under the 1.5 spike,
    // so the per-extension check is the only one that fires.
    fs::write(tmp.path().join("a.docx"), encrypted_bytes()).unwrap();
    fs::write(tmp.path().join("b.docx"), encrypted_bytes()).unwrap();

    let current = scan(tmp.path(), &config, None).unwrap();
    let report = compare(&baseline, &current, &config.compare);

    assert_eq!(report.alerts.len(), 1);
    let ext_alert = &report.alerts[0];
    assert_eq!(ext_alert.signal, Signal::ExtensionEntropyShift);
    assert_eq!(ext_alert.extension.as_deref(), Some(".docx"));
    assert_eq!(ext_alert.severity, Severity::High);
    assert_eq!(report.severity, Severity::High);
    assert_eq!(report.severity.exit_code(), 1);
}

#[test]
fn steady_state_comparison_is_ok() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("a.txt", document_bytes()),
            ("b.txt", document_bytes()),
            ("archive.zip", encrypted_bytes()),
        ],
    );

    let config = Config::default();
    let baseline = scan(tmp.path(), &config, None).unwrap();
    let current = scan(tmp.path(), &config, None).unwrap();
    let report = compare(&baseline, &current, &config.compare);

    assert_eq!(report.severity, Severity::Ok);
    assert_eq!(report.severity.exit_code(), 0);
    assert!(report.alerts.is_empty());
    assert!(report.entropy_delta.abs() < 1e-9);
}

#[test]
fn excluded_extensions_never_alert_on_shift() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("backup.zip", document_bytes())]);

    let config = Config::default();
    let baseline = scan(tmp.path(), &config, None).unwrap();

    fs::write(tmp.path().join("backup.zip"), encrypted_bytes()).unwrap();
    let current = scan(tmp.path(), &config, None).unwrap();
    let report = compare(&baseline, &current, &config.compare);

    assert!(
        !report
            .alerts
            .iter()
            .any(|a| a.signal == Signal::ExtensionEntropyShift),
        "archive formats are exempt from the per-extension check"
    );
}

#[test]
fn baseline_store_round_trips_through_disk() {
    let scan_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    write_tree(
        scan_dir.path(),
        &[("x.txt", document_bytes()), ("y.bin", encrypted_bytes())],
    );

    let config = Config::default();
    let snap = scan(scan_dir.path(), &config, None).unwrap();

    let store = JsonBaselineStore::new(store_dir.path());
    let written = store.save(&snap).unwrap();
    assert!(written.starts_with(store_dir.path()));
    assert!(
        written
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("baseline-")
    );

    let loaded = store.load(scan_dir.path()).unwrap();
    assert_eq!(loaded, snap);

    // The loaded baseline works as a comparison input.
    let report = compare(&loaded, &snap, &config.compare);
    assert_eq!(report.severity, Severity::Ok);
}

#[test]
fn snapshot_json_matches_documented_shape() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path(), &[("enc.dat", encrypted_bytes())]);

    let snap = scan(tmp.path(), &Config::default(), None).unwrap();
    let json = snap.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    for field in [
        "path",
        "timestamp",
        "total_files",
        "avg_entropy",
        "high_entropy_count",
        "very_high_count",
        "by_extension",
        "suspicious",
    ] {
        assert!(value.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(value["total_files"], 1);
    assert_eq!(value["by_extension"][".dat"]["count"], 1);
    assert_eq!(value["suspicious"][0]["ext"], ".dat");

    // Timestamps survive the round trip bit-exact.
    let restored = Snapshot::from_json(&json).unwrap();
    assert_eq!(restored, snap);
}

#[test]
fn extension_filter_restricts_end_to_end() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("keep.docx", encrypted_bytes()),
            ("skip.log", encrypted_bytes()),
        ],
    );

    let filter: HashSet<String> = ["docx".to_string()].into_iter().collect();
    let snap = scan(tmp.path(), &Config::default(), Some(&filter)).unwrap();
    assert_eq!(snap.total_files, 1);
    assert!(snap.by_extension.contains_key(".docx"));
    assert!(!snap.by_extension.contains_key(".log"));
}

#[test]
fn random_payload_reads_as_very_high_entropy() {
    use rand::RngCore;

    let tmp = TempDir::new().unwrap();
    let mut payload = vec![0u8; 65_536];
    rand::rng().fill_bytes(&mut payload);
    fs::write(tmp.path().join("cipher.docx"), &payload).unwrap();

    let snap = scan(tmp.path(), &Config::default(), None).unwrap();
    // 64 KiB of uniform random bytes sits within a hair of 8.0 bits/byte.
    assert_eq!(snap.very_high_count, 1);
    assert!(snap.avg_entropy > 7.9);
}

#[test]
fn growing_tree_without_encryption_stays_quiet() {
    let tmp = TempDir::new().unwrap();
    write_tree(
        tmp.path(),
        &[("a.txt", document_bytes()), ("b.txt", document_bytes())],
    );

    let config = Config::default();
    let baseline = scan(tmp.path(), &config, None).unwrap();

    // New low-entropy files shift nothing.
    write_tree(
        tmp.path(),
        &[("c.txt", document_bytes()), ("d.txt", document_bytes())],
    );
    let current = scan(tmp.path(), &config, None).unwrap();
    let report = compare(&baseline, &current, &config.compare);
    assert_eq!(report.severity, Severity::Ok);
}
