use std::{borrow::Cow, collections::HashSet, fmt::Write as _};

use tracing::debug;

use crate::{
    ast::{
        Block, Class, ElseBranch, Expr, ExprKind, Function, Literal, Program, Stmt, StmtKind,
        UnaryOp,
    },
    diagnostics::Diagnostic,
    lexer::{Lexer, Token},
    package::{ImportResolution, PackageLoader},
    parser::{Parser, DEFAULT_MAX_NESTING},
};

const INDENT: &str = "    ";

/// Identifier that marks a program as using the graphics façade.
pub const GRAPHICS_NAMESPACE: &str = "gfx";
pub const GRAPHICS_IMPORT: &str = "from prisma import pygfx_api as gfx";
pub const ENTRY_GUARD: &str = "if __name__ == \"__main__\":\n    main()";

/// Runtime support emitted once at the top of every non-REPL output.
pub const RUNTIME_PREAMBLE: &str = r#"
import functools
import os
import random
import sys
import time

_PROFILING_DATA = {}
_styles = []


def profiler(func):
    """Records cumulative call time per function, in milliseconds."""
    @functools.wraps(func)
    def wrapper(*args, **kwargs):
        start = time.perf_counter()
        try:
            return func(*args, **kwargs)
        finally:
            duration = (time.perf_counter() - start) * 1000
            _PROFILING_DATA[func.__name__] = _PROFILING_DATA.get(func.__name__, 0) + duration
            if os.environ.get("OPN_PROFILE"):
                print(f"[PROFILE] {func.__name__} executed in {duration:.4f} ms", file=sys.stderr)
    return wrapper


def c_printf(format_string, *values):
    print(format_string % values)


def cpp_cout(value):
    print(value)


def cs_write_line(value):
    print(value)


def py_print(line, *values):
    print(f"[line {line}]", *values)


def py_breakpoint():
    breakpoint()


def py_input(prompt=""):
    return input(prompt)


def py_random_randint(a, b):
    return random.randint(a, b)


def css_set(selector, prop, value):
    rule = f"{selector} {{ {prop}: {value}; }}"
    _styles.append(rule)
    print(f"css: {rule}")


def js_log(value):
    print(f"js: {value}")


def str_char_at(text, index):
    return text[index]


def to_string(value):
    return str(value)


def to_number(value):
    try:
        return int(value)
    except (TypeError, ValueError):
        pass
    try:
        return float(value)
    except (TypeError, ValueError) as exc:
        raise ValueError(f"cannot convert {value!r} to a number") from exc
"#;

/// Mapping from a dotted OPN call name to a runtime shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallAlias {
    pub name: &'static str,
    pub target: &'static str,
    /// Print-like shims receive the caller's source line as first argument.
    pub injects_line: bool,
}

pub const CALL_ALIASES: &[CallAlias] = &[
    CallAlias { name: "c.printf", target: "c_printf", injects_line: false },
    CallAlias { name: "cpp.cout", target: "cpp_cout", injects_line: false },
    CallAlias { name: "cs.write_line", target: "cs_write_line", injects_line: false },
    CallAlias { name: "py.print", target: "py_print", injects_line: true },
    CallAlias { name: "py.breakpoint", target: "py_breakpoint", injects_line: false },
    CallAlias { name: "py.input", target: "py_input", injects_line: false },
    CallAlias { name: "py.random.randint", target: "py_random_randint", injects_line: false },
    CallAlias { name: "css.set", target: "css_set", injects_line: false },
    CallAlias { name: "str.length", target: "len", injects_line: false },
    CallAlias { name: "str.charAt", target: "str_char_at", injects_line: false },
    CallAlias { name: "js.log", target: "js_log", injects_line: false },
];

pub fn lookup_alias(name: &str) -> Option<&'static CallAlias> {
    CALL_ALIASES.iter().find(|alias| alias.name == name)
}

/// Python reserved words. OPN names that collide get a trailing `_`.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub fn python_identifier(name: &str) -> Cow<'_, str> {
    if PYTHON_KEYWORDS.contains(&name) {
        Cow::Owned(format!("{name}_"))
    } else {
        Cow::Borrowed(name)
    }
}

fn python_params<'n>(names: impl IntoIterator<Item = &'n str>) -> String {
    names
        .into_iter()
        .map(python_identifier)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether any identifier token names the graphics namespace.
pub fn uses_graphics(tokens: &[Token]) -> bool {
    tokens.iter().any(|token| token.is_identifier(GRAPHICS_NAMESPACE))
}

/// Lowers a [`Program`] to Python 3 source.
pub struct PythonEmitter<'a> {
    loader: &'a PackageLoader,
    repl: bool,
    needs_graphics: bool,
    max_nesting: usize,
    lines: Vec<String>,
    indent: usize,
    inlined: HashSet<String>,
}

impl<'a> PythonEmitter<'a> {
    pub fn new(loader: &'a PackageLoader) -> Self {
        Self {
            loader,
            repl: false,
            needs_graphics: false,
            max_nesting: DEFAULT_MAX_NESTING,
            lines: Vec::new(),
            indent: 0,
            inlined: HashSet::new(),
        }
    }

    /// REPL output carries neither the preamble nor the entry guard.
    pub fn repl(mut self, repl: bool) -> Self {
        self.repl = repl;
        self
    }

    pub fn graphics(mut self, uses_graphics: bool) -> Self {
        self.needs_graphics = uses_graphics;
        self
    }

    /// Nesting limit applied when parsing inlined packages.
    pub fn max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    pub fn emit(mut self, program: &Program) -> Result<String, Diagnostic> {
        self.emit_program(program)?;
        let body = self.lines.join("\n").trim_end().to_string();
        debug!(lines = self.lines.len(), repl = self.repl, "emitted program");

        if self.repl {
            return Ok(if body.is_empty() { body } else { body + "\n" });
        }

        let mut preamble = RUNTIME_PREAMBLE.trim().to_string();
        if self.needs_graphics {
            preamble.push_str("\n\n");
            preamble.push_str(GRAPHICS_IMPORT);
        }
        let guard = if program.has_main() { ENTRY_GUARD } else { "" };
        let segments = [preamble.as_str(), body.as_str(), guard];
        let mut output = segments
            .iter()
            .filter(|segment| !segment.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n\n");
        output.push('\n');
        Ok(output)
    }

    fn emit_program(&mut self, program: &Program) -> Result<(), Diagnostic> {
        let (imports, loose): (Vec<&Stmt>, Vec<&Stmt>) = program
            .statements
            .iter()
            .partition(|stmt| matches!(stmt.kind, StmtKind::Import(_)));

        for stmt in imports {
            self.visit_statement(stmt)?;
        }
        if !self.lines.is_empty() {
            self.blank();
        }
        for class in &program.classes {
            self.visit_class(class)?;
            self.blank();
        }
        for function in &program.functions {
            self.visit_function(function)?;
            self.blank();
        }
        for stmt in loose {
            self.visit_statement(stmt)?;
        }
        Ok(())
    }

    fn line(&mut self, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", INDENT.repeat(self.indent), text.as_ref()));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn indented(
        &mut self,
        emit: impl FnOnce(&mut Self) -> Result<(), Diagnostic>,
    ) -> Result<(), Diagnostic> {
        self.indent += 1;
        let result = emit(self);
        self.indent -= 1;
        result
    }

    fn visit_block(&mut self, block: &Block) -> Result<(), Diagnostic> {
        self.indented(|emitter| {
            if block.statements.is_empty() {
                emitter.line("pass");
            }
            for stmt in &block.statements {
                emitter.visit_statement(stmt)?;
            }
            Ok(())
        })
    }

    fn visit_function(&mut self, function: &Function) -> Result<(), Diagnostic> {
        self.line("@profiler");
        self.line(format!(
            "def {}({}):",
            python_identifier(&function.name),
            python_params(function.params.iter().map(String::as_str))
        ));
        self.visit_block(&function.body)
    }

    /// Methods take an explicit receiver. Class fields are lowered into the
    /// constructor ahead of its own body.
    fn visit_method(
        &mut self,
        method: &Function,
        fields: &[(&str, &Expr)],
    ) -> Result<(), Diagnostic> {
        let name = if method.name == "constructor" {
            Cow::Borrowed("__init__")
        } else {
            python_identifier(&method.name)
        };
        let params =
            python_params(std::iter::once("self").chain(method.params.iter().map(String::as_str)));
        self.line("@profiler");
        self.line(format!("def {name}({params}):"));
        self.emit_function_body(fields, &method.body)
    }

    fn emit_function_body(
        &mut self,
        fields: &[(&str, &Expr)],
        body: &Block,
    ) -> Result<(), Diagnostic> {
        if fields.is_empty() {
            return self.visit_block(body);
        }
        self.indented(|emitter| {
            for (name, value) in fields {
                let value = emitter.render_expr(value);
                emitter.line(format!("self.{} = {value}", python_identifier(name)));
            }
            for stmt in &body.statements {
                emitter.visit_statement(stmt)?;
            }
            Ok(())
        })
    }

    fn visit_class(&mut self, class: &Class) -> Result<(), Diagnostic> {
        for stmt in &class.body.statements {
            if !matches!(stmt.kind, StmtKind::Function(_) | StmtKind::Let { .. }) {
                return Err(Diagnostic::emit(format!(
                    "unsupported member in class '{}': only methods and fields can be lowered",
                    class.name
                )));
            }
        }

        match &class.superclass {
            Some(base) => self.line(format!(
                "class {}({}):",
                python_identifier(&class.name),
                python_identifier(base)
            )),
            None => self.line(format!("class {}:", python_identifier(&class.name))),
        }

        let fields: Vec<(&str, &Expr)> = class.fields().collect();
        let methods: Vec<&Function> = class.methods().collect();
        let has_constructor = methods.iter().any(|m| m.name == "constructor");

        self.indented(|emitter| {
            if methods.is_empty() && fields.is_empty() {
                emitter.line("pass");
                return Ok(());
            }
            if !has_constructor && !fields.is_empty() {
                emitter.line("def __init__(self, *args, **kwargs):");
                emitter.indented(|emitter| {
                    if class.superclass.is_some() {
                        emitter.line("super().__init__(*args, **kwargs)");
                    }
                    for (name, value) in &fields {
                        let value = emitter.render_expr(value);
                        emitter.line(format!("self.{} = {value}", python_identifier(name)));
                    }
                    Ok(())
                })?;
                emitter.blank();
            }
            for method in &methods {
                let method_fields: &[(&str, &Expr)] = if method.name == "constructor" {
                    &fields
                } else {
                    &[]
                };
                emitter.visit_method(method, method_fields)?;
                emitter.blank();
            }
            Ok(())
        })?;
        Ok(())
    }

    fn visit_statement(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        match &stmt.kind {
            StmtKind::Let { name, value } | StmtKind::Set { name, value } => {
                let value = self.render_expr(value);
                self.line(format!("{} = {value}", python_identifier(name)));
            }
            StmtKind::Assign { target, value } => {
                let target = self.render_expr(target);
                let value = self.render_expr(value);
                self.line(format!("{target} = {value}"));
            }
            StmtKind::Import(module) => self.emit_import(module)?,
            StmtKind::Return(None) => self.line("return"),
            StmtKind::Return(Some(value)) => {
                let value = self.render_expr(value);
                self.line(format!("return {value}"));
            }
            StmtKind::Expr(expr) => {
                let rendered = self.render_expr(expr);
                self.line(rendered);
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.render_expr(condition);
                self.line(format!("if {condition}:"));
                self.visit_block(then_branch)?;
                match else_branch {
                    None => {}
                    Some(ElseBranch::Block(block)) => {
                        self.line("else:");
                        self.visit_block(block)?;
                    }
                    Some(ElseBranch::If(chained)) => {
                        self.line("else:");
                        self.indented(|emitter| emitter.visit_statement(chained))?;
                    }
                }
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let iterable = self.render_expr(iterable);
                self.line(format!("for {} in {iterable}:", python_identifier(binding)));
                self.visit_block(body)?;
            }
            StmtKind::While { condition, body } => {
                let condition = self.render_expr(condition);
                self.line(format!("while {condition}:"));
                self.visit_block(body)?;
            }
            StmtKind::Try {
                body,
                error_binding,
                handler,
            } => {
                self.line("try:");
                self.visit_block(body)?;
                match error_binding {
                    Some(name) => {
                        self.line(format!("except Exception as {}:", python_identifier(name)))
                    }
                    None => self.line("except Exception:"),
                }
                self.visit_block(handler)?;
            }
            StmtKind::Function(function) => {
                return Err(Diagnostic::emit(format!(
                    "function '{}' can only be declared at the top level or inside a class",
                    function.name
                )));
            }
        }
        Ok(())
    }

    fn emit_import(&mut self, module: &str) -> Result<(), Diagnostic> {
        match self.loader.resolve_import(module) {
            ImportResolution::Host(name) => self.line(format!("import {name}")),
            ImportResolution::Inline { package, source } => {
                self.line(format!("# OPN Package: {package}"));
                if !self.inlined.insert(package.clone()) {
                    debug!(package = %package, "package already inlined");
                    return Ok(());
                }
                // A truncated package never becomes complete by reading more
                // of the importing input.
                let in_package = |mut err: Diagnostic| {
                    err.incomplete = false;
                    err.with_hint(format!(
                        "the error is in OPN package '{package}', not in the importing file"
                    ))
                };
                let tokens = Lexer::new(&source).tokenize().map_err(in_package)?;
                if uses_graphics(&tokens) {
                    self.needs_graphics = true;
                }
                let program = Parser::new(tokens)
                    .with_max_nesting(self.max_nesting)
                    .parse_program()
                    .map_err(in_package)?;
                self.emit_program(&program)?;
            }
        }
        Ok(())
    }

    fn render_expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Identifier(name) => python_identifier(name).into_owned(),
            ExprKind::This => "self".to_string(),
            ExprKind::Attribute { base, name } => {
                format!("{}.{}", self.render_expr(base), python_identifier(name))
            }
            ExprKind::Literal(literal) => render_literal(literal),
            ExprKind::Unary { op, operand } => {
                let operand = self.render_expr(operand);
                match op {
                    UnaryOp::Negate => format!("(-{operand})"),
                    UnaryOp::Not => format!("(not {operand})"),
                }
            }
            ExprKind::Binary { op, left, right } => format!(
                "({} {} {})",
                self.render_expr(left),
                op.symbol(),
                self.render_expr(right)
            ),
            ExprKind::Call { callee, args } => self.render_call(expr, callee, args),
            ExprKind::Range { start, end } => format!(
                "range({}, {} + 1)",
                self.render_expr(start),
                self.render_expr(end)
            ),
            ExprKind::List(elements) => format!("[{}]", self.render_list(elements)),
            ExprKind::Index { target, index } => {
                format!("{}[{}]", self.render_expr(target), self.render_expr(index))
            }
        }
    }

    fn render_call(&self, call: &Expr, callee: &Expr, args: &[Expr]) -> String {
        let alias = callee.dotted_name().and_then(|name| lookup_alias(&name));
        let mut rendered_args = self.render_list(args);
        match alias {
            Some(alias) => {
                if alias.injects_line {
                    let line = call.position.line;
                    rendered_args = if rendered_args.is_empty() {
                        line.to_string()
                    } else {
                        format!("{line}, {rendered_args}")
                    };
                }
                format!("{}({rendered_args})", alias.target)
            }
            None => format!("{}({rendered_args})", self.render_expr(callee)),
        }
    }

    fn render_list(&self, exprs: &[Expr]) -> String {
        exprs
            .iter()
            .map(|e| self.render_expr(e))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Int(digits) => digits.clone(),
        Literal::Float(value) if value.is_finite() => format!("{value:?}"),
        Literal::Float(_) => "float(\"inf\")".to_string(),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::String(value) => python_string(value),
    }
}

/// Quotes `value` as a Python string literal.
pub fn python_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
