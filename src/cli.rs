use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "blockscript",
    about = "Generate script text from a block workspace (Blockly JSON or XML), optionally run it."
)]
pub struct Args {
    #[arg(value_name = "INPUT", help = "Workspace file (.json or .xml).")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Write generated text here instead of stdout.")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        default_value = "standard",
        help = "Block vocabulary: standard, automation or canvas."
    )]
    pub vocabulary: String,

    #[arg(long, value_name = "JSON", help = "Extra block descriptors (JSON array) to register.")]
    pub blocks: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Write the vocabulary's toolbox XML to this path.")]
    pub emit_toolbox: Option<PathBuf>,

    #[arg(long, help = "Report graph warnings (unknown types, misplaced blocks) on stderr.")]
    pub lint: bool,

    #[arg(long, help = "Execute the generated text in the sandbox.")]
    pub run: bool,

    #[arg(long, value_name = "PATH", help = "With --run, write the drawing surface as SVG.")]
    pub svg: Option<PathBuf>,

    #[arg(long, default_value_t = 0, help = "With --run, delay between interpreter steps.")]
    pub step_delay_ms: u64,

    #[arg(long, default_value_t = 1_000_000, help = "With --run, abort after this many steps.")]
    pub max_steps: usize,

    #[arg(short, long, help = "Log progress details (RUST_LOG overrides).")]
    pub verbose: bool,
}
