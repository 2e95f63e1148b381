//! Stepped evaluator: the parsed script is flattened into a list of ops
//! with explicit jumps so a host can run it one op at a time.

use crate::ast::{AssignOp, BinaryOp, Expr, Position, Program, Statement, UnaryOp};
use crate::javascript::format_number;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
        }
    }

    /// `==` without object identity: null and undefined match each other,
    /// mixed primitives compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => self.to_number() == other.to_number(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub pos: Position,
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (line {}, column {})",
            self.message, self.pos.line, self.pos.column
        )
    }
}

impl Error for RuntimeError {}

/// Functions the embedding host exposes to scripts.
pub trait Host {
    /// `None` when the host has no function of that name.
    fn call(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, String>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Push(Value),
    Load(String),
    Store(String),
    Declare(String),
    Pop,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Jump(usize),
    JumpIfFalse(usize),
    /// Short-circuit: jump keeping the value when falsy, else pop it.
    AndJump(usize),
    /// Short-circuit: jump keeping the value when truthy, else pop it.
    OrJump(usize),
    Call { callee: String, argc: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Done,
}

#[derive(Debug, Default)]
pub struct Interpreter {
    code: Vec<Op>,
    positions: Vec<Position>,
    ip: usize,
    stack: Vec<Value>,
    globals: HashMap<String, Value>,
    steps: usize,
}

impl Interpreter {
    pub fn new(program: &Program) -> Self {
        let mut compiler = Compiler::default();
        for statement in &program.body {
            compiler.statement(statement);
        }
        Self {
            code: compiler.code,
            positions: compiler.positions,
            ..Self::default()
        }
    }

    pub fn ops(&self) -> &[Op] {
        &self.code
    }

    pub fn is_done(&self) -> bool {
        self.ip >= self.code.len()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Executes one op.
    pub fn step(&mut self, host: &mut dyn Host) -> Result<StepStatus, RuntimeError> {
        let Some(op) = self.code.get(self.ip).cloned() else {
            return Ok(StepStatus::Done);
        };
        let pos = self.positions[self.ip];
        self.ip += 1;
        self.steps += 1;
        match op {
            Op::Push(value) => self.stack.push(value),
            Op::Load(name) => match self.globals.get(&name) {
                Some(value) => self.stack.push(value.clone()),
                None => return Err(fault(pos, format!("{} is not defined", name))),
            },
            Op::Store(name) => {
                let value = self.pop(pos)?;
                self.globals.insert(name, value);
            }
            Op::Declare(name) => {
                self.globals.entry(name).or_insert(Value::Undefined);
            }
            Op::Pop => {
                self.pop(pos)?;
            }
            Op::Unary(op) => {
                let value = self.pop(pos)?;
                self.stack.push(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Negate => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                });
            }
            Op::Binary(op) => {
                let right = self.pop(pos)?;
                let left = self.pop(pos)?;
                self.stack.push(binary(op, &left, &right));
            }
            Op::Jump(target) => self.ip = target,
            Op::JumpIfFalse(target) => {
                if !self.pop(pos)?.truthy() {
                    self.ip = target;
                }
            }
            Op::AndJump(target) => self.short_circuit(target, false, pos)?,
            Op::OrJump(target) => self.short_circuit(target, true, pos)?,
            Op::Call { callee, argc } => {
                if self.stack.len() < argc {
                    return Err(fault(pos, "stack underflow"));
                }
                let args = self.stack.split_off(self.stack.len() - argc);
                let result = match builtin(&callee, &args) {
                    Some(value) => value,
                    None => match host.call(&callee, &args) {
                        Some(Ok(value)) => value,
                        Some(Err(message)) => return Err(fault(pos, message)),
                        None => return Err(fault(pos, format!("{} is not a function", callee))),
                    },
                };
                self.stack.push(result);
            }
        }
        Ok(if self.is_done() {
            StepStatus::Done
        } else {
            StepStatus::Running
        })
    }

    fn pop(&mut self, pos: Position) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or_else(|| fault(pos, "stack underflow"))
    }

    fn short_circuit(&mut self, target: usize, jump_when: bool, pos: Position) -> Result<(), RuntimeError> {
        let truthy = self
            .stack
            .last()
            .map(Value::truthy)
            .ok_or_else(|| fault(pos, "stack underflow"))?;
        if truthy == jump_when {
            self.ip = target;
        } else {
            self.stack.pop();
        }
        Ok(())
    }
}

fn fault(pos: Position, message: impl Into<String>) -> RuntimeError {
    RuntimeError {
        message: message.into(),
        pos,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!("{}{}", left, right)),
            _ => num(|a, b| a + b),
        },
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Mod => num(|a, b| a % b),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match ordering {
                None => false,
                Some(o) => match op {
                    BinaryOp::Lt => o.is_lt(),
                    BinaryOp::Le => o.is_le(),
                    BinaryOp::Gt => o.is_gt(),
                    _ => o.is_ge(),
                },
            })
        }
        // Short-circuit forms compile to jumps; reaching here means both sides ran.
        BinaryOp::And => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
    }
}

fn builtin(name: &str, args: &[Value]) -> Option<Value> {
    let arg = |i: usize| args.get(i).map(Value::to_number).unwrap_or(f64::NAN);
    let n = match name {
        "Math.pow" => arg(0).powf(arg(1)),
        "Math.sqrt" => arg(0).sqrt(),
        "Math.abs" => arg(0).abs(),
        "Math.floor" => arg(0).floor(),
        "Math.ceil" => arg(0).ceil(),
        "Math.round" => (arg(0) + 0.5).floor(),
        "Math.min" => args.iter().map(Value::to_number).fold(f64::INFINITY, f64::min),
        "Math.max" => args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, f64::max),
        "Number" => arg(0),
        "String" => {
            return Some(Value::String(
                args.first().map(|v| v.to_string()).unwrap_or_default(),
            ))
        }
        _ => return None,
    };
    Some(Value::Number(n))
}

#[derive(Default)]
struct Compiler {
    code: Vec<Op>,
    positions: Vec<Position>,
}

impl Compiler {
    fn emit(&mut self, op: Op, pos: Position) -> usize {
        self.code.push(op);
        self.positions.push(pos);
        self.code.len() - 1
    }

    fn patch(&mut self, at: usize) {
        let target = self.code.len();
        match &mut self.code[at] {
            Op::Jump(t) | Op::JumpIfFalse(t) | Op::AndJump(t) | Op::OrJump(t) => *t = target,
            _ => {}
        }
    }

    fn block(&mut self, body: &[Statement]) {
        for statement in body {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Declare { pos, names } => {
                for (name, init) in names {
                    match init {
                        Some(expr) => {
                            self.expr(expr);
                            self.emit(Op::Store(name.clone()), *pos);
                        }
                        None => {
                            self.emit(Op::Declare(name.clone()), *pos);
                        }
                    }
                }
            }
            Statement::Assign { pos, name, op, value } => {
                match op {
                    AssignOp::Set => self.expr(value),
                    AssignOp::Add | AssignOp::Sub => {
                        self.emit(Op::Load(name.clone()), *pos);
                        self.expr(value);
                        let bin = if *op == AssignOp::Add {
                            BinaryOp::Add
                        } else {
                            BinaryOp::Sub
                        };
                        self.emit(Op::Binary(bin), *pos);
                    }
                }
                self.emit(Op::Store(name.clone()), *pos);
            }
            Statement::Expr { pos, expr } => {
                self.expr(expr);
                self.emit(Op::Pop, *pos);
            }
            Statement::If {
                pos,
                branches,
                else_body,
            } => {
                let mut exits = Vec::new();
                for (condition, body) in branches {
                    self.expr(condition);
                    let skip = self.emit(Op::JumpIfFalse(0), *pos);
                    self.block(body);
                    exits.push(self.emit(Op::Jump(0), *pos));
                    self.patch(skip);
                }
                self.block(else_body);
                for exit in exits {
                    self.patch(exit);
                }
            }
            Statement::While { pos, condition, body } => {
                let start = self.code.len();
                self.expr(condition);
                let exit = self.emit(Op::JumpIfFalse(0), *pos);
                self.block(body);
                self.emit(Op::Jump(start), *pos);
                self.patch(exit);
            }
            Statement::For {
                pos,
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.statement(init);
                }
                let start = self.code.len();
                let exit = condition.as_ref().map(|condition| {
                    self.expr(condition);
                    self.emit(Op::JumpIfFalse(0), *pos)
                });
                self.block(body);
                if let Some(update) = update {
                    self.statement(update);
                }
                self.emit(Op::Jump(start), *pos);
                if let Some(exit) = exit {
                    self.patch(exit);
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let pos = expr.pos();
        match expr {
            Expr::Number { value, .. } => {
                self.emit(Op::Push(Value::Number(*value)), pos);
            }
            Expr::String { value, .. } => {
                self.emit(Op::Push(Value::String(value.clone())), pos);
            }
            Expr::Bool { value, .. } => {
                self.emit(Op::Push(Value::Bool(*value)), pos);
            }
            Expr::Null { .. } => {
                self.emit(Op::Push(Value::Null), pos);
            }
            Expr::Var { name, .. } => {
                self.emit(Op::Load(name.clone()), pos);
            }
            Expr::Unary { op, operand, .. } => {
                self.expr(operand);
                self.emit(Op::Unary(*op), pos);
            }
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
                ..
            } => {
                self.expr(left);
                let jump = if *op == BinaryOp::And {
                    Op::AndJump(0)
                } else {
                    Op::OrJump(0)
                };
                let at = self.emit(jump, pos);
                self.expr(right);
                self.patch(at);
            }
            Expr::Binary { op, left, right, .. } => {
                self.expr(left);
                self.expr(right);
                self.emit(Op::Binary(*op), pos);
            }
            Expr::Conditional {
                test, then, otherwise, ..
            } => {
                self.expr(test);
                let skip = self.emit(Op::JumpIfFalse(0), pos);
                self.expr(then);
                let exit = self.emit(Op::Jump(0), pos);
                self.patch(skip);
                self.expr(otherwise);
                self.patch(exit);
            }
            Expr::Call { callee, args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
                self.emit(
                    Op::Call {
                        callee: callee.clone(),
                        argc: args.len(),
                    },
                    pos,
                );
            }
        }
    }
}
