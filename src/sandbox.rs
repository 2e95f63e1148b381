use crate::interpreter::{Host, Interpreter, RuntimeError, StepStatus, Value};
use crate::parser::{parse_program, ParseError};
use crate::surface::DrawingSurface;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DRAW_CIRCLE: &str = crate::canvas::DRAW_CIRCLE;

#[derive(Debug, Clone)]
pub struct SandboxOptions {
    /// Delay handed to the host between two steps.
    pub step_delay: Duration,
    /// Stops runaway loops in `run_to_end`. `None` means unbounded.
    pub max_steps: Option<usize>,
    pub width: u32,
    pub height: u32,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(10),
            max_steps: Some(1_000_000),
            width: 400,
            height: 400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Idle,
    Running,
}

#[derive(Debug)]
pub enum SandboxError {
    Parse(ParseError),
    Runtime(RuntimeError),
    StepBudget(usize),
}

impl Display for SandboxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::Parse(e) => write!(f, "Parse error: {}", e),
            SandboxError::Runtime(e) => write!(f, "Runtime error: {}", e),
            SandboxError::StepBudget(n) => write!(f, "Step budget of {} exhausted", n),
        }
    }
}

impl Error for SandboxError {}

impl From<ParseError> for SandboxError {
    fn from(e: ParseError) -> Self {
        SandboxError::Parse(e)
    }
}

impl From<RuntimeError> for SandboxError {
    fn from(e: RuntimeError) -> Self {
        SandboxError::Runtime(e)
    }
}

/// Native functions visible to sandboxed scripts.
#[derive(Debug, Clone)]
pub struct CapabilitySurface {
    surface: DrawingSurface,
    output: Vec<String>,
}

impl CapabilitySurface {
    pub fn new(surface: DrawingSurface) -> Self {
        Self {
            surface,
            output: Vec::new(),
        }
    }

    pub fn names() -> &'static [&'static str] {
        &[DRAW_CIRCLE, "window.alert", "console.log"]
    }

    pub fn surface(&self) -> &DrawingSurface {
        &self.surface
    }

    /// Text passed to `window.alert` / `console.log`, one entry per call.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    fn reset(&mut self) {
        self.surface.clear();
        self.output.clear();
    }
}

impl Host for CapabilitySurface {
    fn call(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, String>> {
        match name {
            DRAW_CIRCLE => {
                let arg = |i: usize| args.get(i).map(Value::to_number).unwrap_or(f64::NAN);
                let (x, y, radius) = (arg(0), arg(1), arg(2));
                if x.is_finite() && y.is_finite() && radius.is_finite() {
                    self.surface.fill_circle(x, y, radius);
                } else {
                    tracing::debug!(?args, "drawCircle ignored non-numeric arguments");
                }
                Some(Ok(Value::Undefined))
            }
            "window.alert" | "console.log" => {
                let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
                tracing::info!(target: "sandbox", "{}", line);
                self.output.push(line);
                Some(Ok(Value::Undefined))
            }
            _ => None,
        }
    }
}

pub struct Sandbox {
    options: SandboxOptions,
    state: SandboxState,
    capabilities: CapabilitySurface,
    interpreter: Option<Interpreter>,
}

impl Sandbox {
    pub fn new(options: SandboxOptions) -> Self {
        let surface = DrawingSurface::new(options.width, options.height);
        Self {
            options,
            state: SandboxState::Idle,
            capabilities: CapabilitySurface::new(surface),
            interpreter: None,
        }
    }

    pub fn state(&self) -> SandboxState {
        self.state
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    pub fn surface(&self) -> &DrawingSurface {
        self.capabilities.surface()
    }

    pub fn output(&self) -> &[String] {
        self.capabilities.output()
    }

    pub fn interpreter(&self) -> Option<&Interpreter> {
        self.interpreter.as_ref()
    }

    /// Starts a fresh run. Prior drawings and interpreter state are dropped
    /// before parsing, so a failed parse leaves a blank idle sandbox.
    pub fn run(&mut self, source: &str) -> Result<(), ParseError> {
        self.capabilities.reset();
        self.interpreter = None;
        self.state = SandboxState::Idle;
        let program = parse_program(source)?;
        let interpreter = Interpreter::new(&program);
        tracing::info!(ops = interpreter.ops().len(), "sandbox run started");
        self.interpreter = Some(interpreter);
        self.state = SandboxState::Running;
        Ok(())
    }

    /// Executes one instruction. A fault ends the run.
    pub fn step(&mut self) -> Result<SandboxState, RuntimeError> {
        let Some(interpreter) = self.interpreter.as_mut() else {
            self.state = SandboxState::Idle;
            return Ok(self.state);
        };
        if self.state == SandboxState::Idle {
            return Ok(self.state);
        }
        match interpreter.step(&mut self.capabilities) {
            Ok(StepStatus::Running) => {}
            Ok(StepStatus::Done) => {
                tracing::debug!(steps = interpreter.steps(), "sandbox run finished");
                self.state = SandboxState::Idle;
            }
            Err(err) => {
                tracing::warn!(error = %err, "sandbox step failed");
                self.state = SandboxState::Idle;
                return Err(err);
            }
        }
        Ok(self.state)
    }

    /// Drives `step` until idle, handing `step_delay` to `yield_fn` between
    /// steps. Returns the number of steps executed.
    pub fn run_to_end<F>(&mut self, mut yield_fn: F) -> Result<usize, SandboxError>
    where
        F: FnMut(Duration),
    {
        let mut steps = 0usize;
        while self.state == SandboxState::Running {
            if let Some(limit) = self.options.max_steps {
                if steps >= limit {
                    self.state = SandboxState::Idle;
                    return Err(SandboxError::StepBudget(limit));
                }
            }
            self.step()?;
            steps += 1;
            if self.state == SandboxState::Running {
                yield_fn(self.options.step_delay);
            }
        }
        Ok(steps)
    }

    /// Convenience for hosts without a scheduler: parse then drive to the end.
    pub fn execute<F>(&mut self, source: &str, yield_fn: F) -> Result<usize, SandboxError>
    where
        F: FnMut(Duration),
    {
        self.run(source)?;
        self.run_to_end(yield_fn)
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_wait(_: Duration) {}

    #[test]
    fn draws_circles_from_generated_loop() {
        let mut sandbox = Sandbox::default();
        let source = "for (var count = 0; count < 3; count++) {\n  drawCircle(count * 10, 5, 2);\n}\n";
        sandbox.execute(source, no_wait).unwrap();
        let xs = sandbox.surface().circles().iter().map(|c| c.x).collect::<Vec<_>>();
        assert_eq!(xs, vec![0.0, 10.0, 20.0]);
        assert_eq!(sandbox.state(), SandboxState::Idle);
    }

    #[test]
    fn new_run_resets_surface() {
        let mut sandbox = Sandbox::default();
        sandbox.execute("drawCircle(1, 1, 1);", no_wait).unwrap();
        assert_eq!(sandbox.surface().circles().len(), 1);
        sandbox.run("var x = 1;").unwrap();
        assert!(sandbox.surface().is_blank());
        assert_eq!(sandbox.state(), SandboxState::Running);
    }

    #[test]
    fn yields_between_steps_with_configured_delay() {
        let mut sandbox = Sandbox::new(SandboxOptions {
            step_delay: Duration::from_millis(7),
            ..SandboxOptions::default()
        });
        let mut delays = Vec::new();
        let steps = sandbox
            .execute("drawCircle(1, 2, 3);", |d| delays.push(d))
            .unwrap();
        assert_eq!(delays.len(), steps - 1);
        assert!(delays.iter().all(|d| *d == Duration::from_millis(7)));
    }

    #[test]
    fn step_budget_stops_infinite_loop() {
        let mut sandbox = Sandbox::new(SandboxOptions {
            max_steps: Some(50),
            ..SandboxOptions::default()
        });
        let err = sandbox.execute("while (true) { }", no_wait).unwrap_err();
        assert!(matches!(err, SandboxError::StepBudget(50)));
        assert_eq!(sandbox.state(), SandboxState::Idle);
    }

    #[test]
    fn parse_error_leaves_sandbox_idle() {
        let mut sandbox = Sandbox::default();
        assert!(sandbox.run("drawCircle(1, 2").is_err());
        assert_eq!(sandbox.state(), SandboxState::Idle);
        assert!(sandbox.interpreter().is_none());
    }

    #[test]
    fn alert_output_is_captured() {
        let mut sandbox = Sandbox::default();
        sandbox.execute("window.alert('n = ' + 4);", no_wait).unwrap();
        assert_eq!(sandbox.output(), ["n = 4".to_string()]);
    }

    #[test]
    fn commented_engine_calls_are_inert() {
        let mut sandbox = Sandbox::default();
        sandbox
            .execute("// engine.login('PRD', '100', 'bob', 'secret');\n", no_wait)
            .unwrap();
        assert!(sandbox.interpreter().unwrap().ops().is_empty());
        assert!(sandbox.surface().is_blank());
        assert!(sandbox.output().is_empty());
    }
}
