use blockscript_core::cli::Args;
use blockscript_core::run_cli;
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CANVAS_JSON: &str = r#"{
  "blocks": {
    "blocks": [
      {
        "type": "controls_repeat_ext",
        "id": "loop",
        "inputs": {
          "TIMES": {"shadow": {"type": "math_number", "fields": {"NUM": 2}}},
          "DO": {"block": {"type": "draw_circle", "id": "c"}}
        }
      }
    ]
  }
}"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

fn args(list: &[&str]) -> Args {
    let mut argv = vec!["blockscript"];
    argv.extend_from_slice(list);
    Args::try_parse_from(argv).unwrap()
}

fn out_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).display().to_string()
}

#[test]
fn writes_generated_code_to_output() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "ws.json", CANVAS_JSON);
    let output = out_path(&dir, "out.js");
    run_cli(&args(&[input.as_str(), output.as_str(), "--vocabulary", "canvas"])).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "for (var count = 0; count < 2; count++) {\n  drawCircle(0, 0, 10);\n}\n"
    );
}

#[test]
fn run_writes_svg_of_the_surface() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "ws.json", CANVAS_JSON);
    let output = out_path(&dir, "out.js");
    let svg = out_path(&dir, "out.svg");
    run_cli(&args(&[
        input.as_str(),
        output.as_str(),
        "--vocabulary",
        "canvas",
        "--run",
        "--svg",
        svg.as_str(),
    ]))
    .unwrap();
    let svg = fs::read_to_string(&svg).unwrap();
    assert_eq!(svg.matches("<circle").count(), 2);
}

#[test]
fn svg_without_run_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "ws.json", CANVAS_JSON);
    let svg = out_path(&dir, "out.svg");
    assert!(run_cli(&args(&[input.as_str(), "--svg", svg.as_str()])).is_err());
}

#[test]
fn emits_toolbox_for_vocabulary() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "ws.json", r#"{"blocks": {"blocks": []}}"#);
    let output = out_path(&dir, "out.js");
    let toolbox = out_path(&dir, "toolbox.xml");
    run_cli(&args(&[
        input.as_str(),
        output.as_str(),
        "--vocabulary",
        "automation",
        "--emit-toolbox",
        toolbox.as_str(),
    ]))
    .unwrap();
    let xml = fs::read_to_string(&toolbox).unwrap();
    assert!(xml.contains("sap_in_table"));
    assert!(xml.contains("controls_repeat_ext"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "");
}

#[test]
fn custom_blocks_are_registered_but_not_generated() {
    let dir = TempDir::new().unwrap();
    let blocks = write(
        &dir,
        "blocks.json",
        r#"[{"type": "beep", "message0": "beep", "previousStatement": null, "nextStatement": null}]"#,
    );
    let input = write(
        &dir,
        "ws.xml",
        r#"<xml><block type="beep" id="b1"></block></xml>"#,
    );
    let output = out_path(&dir, "out.js");
    run_cli(&args(&[input.as_str(), output.as_str(), "--blocks", blocks.as_str(), "--lint"])).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "// Unsupported block type: beep (block b1)\n"
    );
}

#[test]
fn missing_input_is_an_error() {
    let err = run_cli(&args(&["definitely-missing.json"])).unwrap_err();
    assert!(err.to_string().contains("Input file not found"));
}

#[test]
fn unknown_vocabulary_is_an_error() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "ws.json", CANVAS_JSON);
    assert!(run_cli(&args(&[input.as_str(), "--vocabulary", "lego"])).is_err());
    assert!(Path::new(&input).exists());
}
