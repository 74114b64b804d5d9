use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::fixtures::{blank_document, document_with_pages, text_at};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).expect("fixture should be written");
    path
}

/// "Hello" covers page box (100, 80, 30, 12).
fn hello_pdf(dir: &Path) -> PathBuf {
    write_fixture(dir, "hello.pdf", &document_with_pages(&[text_at(100.0, 700.0, "Hello world")]))
}

fn stdout_json(mut command: assert_cmd::Command) -> Value {
    let output = command.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

fn cli() -> assert_cmd::Command {
    cargo_bin_cmd!("pdf-annotator")
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "three.pdf", &blank_document(3));

    let mut command = cli();
    command.arg("info").arg(&file);
    let value = stdout_json(command);
    assert_eq!(value["page_count"], 3);
    assert_eq!(value["first_page_size_pt"]["width"], 612.0);
    assert_eq!(value["first_page_size_pt"]["height"], 792.0);
    assert_eq!(value["path"], file.display().to_string());
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    cli()
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "invalid.pdf", b"this is not a pdf");
    cli()
        .arg("info")
        .arg(file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn info_fails_for_encrypted_marker_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let mut bytes = blank_document(1);
    bytes.extend_from_slice(b"\n% /Encrypt\n");
    let file = write_fixture(temp.path(), "encrypted.pdf", &bytes);
    cli()
        .arg("info")
        .arg(file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn shape_prints_presentation_forms_in_visual_order() {
    cli().args(["shape", "بت"]).assert().success().stdout("\u{FE96}\u{FE91}\n");
}

#[test]
fn shape_leaves_latin_text_alone() {
    cli().args(["shape", "hello world"]).assert().success().stdout("hello world\n");
}

#[test]
fn locate_prints_word_box() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = hello_pdf(temp.path());

    let mut command = cli();
    command.arg("locate").arg(&file).args(["--page", "1", "--x", "110", "--y", "86"]);
    let value = stdout_json(command);
    assert_eq!(value["x"], 100.0);
    assert_eq!(value["y"], 80.0);
    assert_eq!(value["width"], 30.0);
    assert_eq!(value["height"], 12.0);
}

#[test]
fn locate_prints_null_on_miss() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = hello_pdf(temp.path());

    cli()
        .arg("locate")
        .arg(&file)
        .args(["--x", "1000", "--y", "1000"])
        .assert()
        .success()
        .stdout("null\n");
}

#[test]
fn locate_rejects_page_zero() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = hello_pdf(temp.path());

    cli()
        .arg("locate")
        .arg(&file)
        .args(["--page", "0", "--x", "1", "--y", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn annotate_writes_annotated_copy() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = hello_pdf(temp.path());
    let annotations = write_fixture(
        temp.path(),
        "annotations.json",
        br##"[
            { "kind": "highlight", "page_index": 0, "x": 100, "y": 80, "width": 30, "height": 12 },
            { "kind": "underline", "page_index": 0, "x": 136, "y": 80, "width": 30, "height": 12, "color": "#FF0000" },
            { "kind": "stroke", "page_index": 0, "points": [{ "x": 10, "y": 10 }, { "x": 50, "y": 60 }] },
            { "kind": "text", "page_index": 0, "x": 72, "y": 100, "text": "Reviewed" }
        ]"##,
    );
    let output = temp.path().join("out").join("annotated.pdf");

    let mut command = cli();
    command.arg("annotate").arg(&file).arg("--annotations").arg(&annotations).arg("--output").arg(&output);
    let value = stdout_json(command);
    assert_eq!(value["annotations"], 4);

    let saved = fs::read(&output).expect("annotated file should exist");
    assert_eq!(value["bytes"], saved.len());
    assert!(saved.starts_with(b"%PDF"));
    assert_ne!(saved, fs::read(&file).unwrap());

    cli().arg("info").arg(&output).assert().success();
}

#[test]
fn annotate_rejects_malformed_list() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = hello_pdf(temp.path());
    let annotations = write_fixture(temp.path(), "annotations.json", br#"[{ "kind": "circle" }]"#);

    cli()
        .arg("annotate")
        .arg(&file)
        .arg("--annotations")
        .arg(&annotations)
        .arg("--output")
        .arg(temp.path().join("out.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed annotation list"));
}

#[test]
fn render_writes_png_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "two.pdf", &blank_document(2));
    let output_path = temp.path().join("page.png");

    cli()
        .arg("render")
        .arg(&file)
        .args(["--page", "2", "--scale", "0.5"])
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("render should be readable image");
    assert_eq!((image.width(), image.height()), (306, 396));
}

#[test]
fn render_succeeds_when_page_exceeds_cache_capacity() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "one.pdf", &blank_document(1));
    let config = temp.path().join("config.json");
    fs::write(&config, r#"{ "cache": { "capacity_bytes": 1024 } }"#).expect("config should be written");
    let output_path = temp.path().join("big.png");

    cli()
        .arg("--config")
        .arg(&config)
        .arg("render")
        .arg(&file)
        .args(["--scale", "1.0"])
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("render should be readable image");
    assert_eq!((image.width(), image.height()), (612, 792));
}

#[test]
fn render_rejects_out_of_range_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = write_fixture(temp.path(), "one.pdf", &blank_document(1));

    cli()
        .arg("render")
        .arg(&file)
        .args(["--page", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn version_prints_package_version() {
    cli()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
