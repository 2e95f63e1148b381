pub mod adapter;
pub mod ast;
pub mod automation;
pub mod blocks;
pub mod canvas;
pub mod generator;
pub mod graph;
pub mod interpreter;
pub mod javascript;
pub mod lexer;
pub mod parser;
pub mod sandbox;
pub mod schema;
pub mod semantic;
pub mod surface;
pub mod toolbox;
pub mod vocabulary;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(not(target_arch = "wasm32"))]
pub mod logging;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use adapter::{ChangeEvent, HeadlessEditor, WorkspaceAdapter};
use anyhow::{Context, Result};
use graph::{BlockGraph, Workspace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vocabulary::{Preset, Vocabulary};

/// Generates text for a serialized workspace (JSON or XML) with one of the
/// built-in vocabularies.
pub fn generate_source(source: &str, vocabulary: &str) -> Result<String> {
    let preset = Vocabulary::parse(vocabulary)?.build()?;
    let workspace = Workspace::from_source(source)?;
    Ok(preset.generator.workspace_to_code(&workspace))
}

/// Mounts `workspace` behind a headless editor and returns the text the
/// adapter delivers for it.
pub fn generate_with_adapter(preset: &Preset, workspace: Workspace) -> Result<String> {
    let mut adapter = WorkspaceAdapter::new(
        preset.generator.clone(),
        Arc::clone(&preset.registry),
        Arc::new(preset.toolbox.clone()),
    );
    adapter.mount(HeadlessEditor::new(workspace))?;
    let first = adapter
        .editor()
        .and_then(|e| e.workspace().top_blocks().first().map(|id| id.to_string()))
        .unwrap_or_default();
    let code = adapter
        .handle_event(&ChangeEvent::Create { block_id: first })
        .unwrap_or_default();
    adapter.dispose();
    Ok(code)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    use sandbox::{Sandbox, SandboxOptions};
    use std::time::Duration;

    if args.svg.is_some() && !args.run {
        anyhow::bail!("--svg requires --run.");
    }

    let total_stages = 4
        + usize::from(args.lint)
        + usize::from(args.emit_toolbox.is_some())
        + usize::from(args.output.is_some())
        + usize::from(args.run)
        + usize::from(args.svg.is_some());
    let progress = CliProgress::new("Generate", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(&args.input)?;

    stage += 1;
    progress.emit(stage, "Loading block vocabulary");
    let vocabulary = Vocabulary::parse(&args.vocabulary)?;
    let extra_blocks = match &args.blocks {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read block descriptors '{}'.", pretty_path(path)))?,
        ),
        None => None,
    };
    let preset = vocabulary.build_with(extra_blocks.as_deref())?;

    stage += 1;
    progress.emit(stage, "Loading workspace");
    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read workspace '{}'.", pretty_path(&input)))?;
    let workspace = Workspace::from_source(&source)
        .with_context(|| format!("Failed to load workspace '{}'.", pretty_path(&input)))?;
    tracing::info!(blocks = workspace.len(), vocabulary = %vocabulary, "workspace loaded");

    if args.lint {
        stage += 1;
        progress.emit(stage, "Checking block graph");
        let report = semantic::analyze(&workspace, &preset.registry);
        for warning in &report.warnings {
            eprintln!("[Lint] {}", warning);
        }
    }

    stage += 1;
    progress.emit(stage, "Generating code");
    let code = generate_with_adapter(&preset, workspace)?;

    if let Some(path) = &args.emit_toolbox {
        stage += 1;
        progress.emit(stage, "Writing toolbox");
        std::fs::write(path, preset.toolbox.to_xml()?)
            .with_context(|| format!("Failed to write toolbox '{}'.", pretty_path(path)))?;
    }

    match &args.output {
        Some(path) => {
            stage += 1;
            progress.emit(stage, "Writing generated code");
            std::fs::write(path, code.as_bytes())
                .with_context(|| format!("Failed to write output '{}'.", pretty_path(path)))?;
        }
        None => print!("{}", code),
    }

    if args.run {
        stage += 1;
        progress.emit(stage, "Running sandbox");
        let mut sandbox = Sandbox::new(SandboxOptions {
            step_delay: Duration::from_millis(args.step_delay_ms),
            max_steps: Some(args.max_steps),
            ..SandboxOptions::default()
        });
        let steps = sandbox.execute(&code, |delay| {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        })?;
        for line in sandbox.output() {
            eprintln!("[Run] {}", line);
        }
        tracing::info!(steps, circles = sandbox.surface().circles().len(), "sandbox finished");

        if let Some(path) = &args.svg {
            stage += 1;
            progress.emit(stage, "Writing drawing surface");
            std::fs::write(path, sandbox.surface().to_svg()?)
                .with_context(|| format!("Failed to write SVG '{}'.", pretty_path(path)))?;
        }
    }

    Ok(())
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

fn pretty_path(path: &Path) -> String {
    let raw = path.display().to_string();
    match raw.strip_prefix(r"\\?\") {
        Some(stripped) => stripped.to_string(),
        None => raw,
    }
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix,
            label,
            step,
            self.total,
            render_progress_bar(step, self.total, 14)
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total.max(1);
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.extend((0..width).map(|i| if i < filled { '=' } else { '-' }));
    bar.push(']');
    bar
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(render_progress_bar(1, 2, 4), "[==--]");
        assert_eq!(render_progress_bar(3, 3, 4), "[====]");
    }

    #[test]
    fn generate_source_accepts_xml_and_json() {
        let xml = r#"<xml><block type="text_print"><value name="TEXT"><block type="text"><field name="TEXT">hi</field></block></value></block></xml>"#;
        let json = r#"{"blocks": {"blocks": [{"type": "text_print", "inputs": {"TEXT": {"block": {"type": "text", "fields": {"TEXT": "hi"}}}}}]}}"#;
        assert_eq!(generate_source(xml, "standard").unwrap(), "window.alert('hi');\n");
        assert_eq!(generate_source(json, "standard").unwrap(), "window.alert('hi');\n");
    }

    #[test]
    fn adapter_path_matches_direct_generation() {
        let preset = Vocabulary::Canvas.build().unwrap();
        let mut ws = Workspace::new();
        ws.add_block("c", "draw_circle").unwrap();
        let direct = preset.generator.workspace_to_code(&ws);
        assert_eq!(generate_with_adapter(&preset, ws).unwrap(), direct);
    }
}
