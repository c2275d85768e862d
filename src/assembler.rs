use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::decoder::Op;
use crate::instructions;
use crate::labels::{self, LabelError};
use crate::program::{Program, Word};
use crate::registers::Reg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Directive that does not split into directive, name and value.
    WrongSyntax,
    UnknownDirective,
    UnknownMnemonic,
    WrongOperandCount,
    /// Operand that is no literal, register, constant or variable.
    UnknownOperand,
    /// Jump, call or label mnemonic without exactly one label name.
    MalformedLabel,
    /// Constant or variable declared a second time.
    Redefined,
    InvalidValue,
    ByteOutOfRange,
    /// String value not wrapped in single quotes.
    MalformedString,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::WrongSyntax => "ignored wrong syntax",
            WarningKind::UnknownDirective => "unknown directive",
            WarningKind::UnknownMnemonic => "wrong operation code",
            WarningKind::WrongOperandCount => "wrong number of operands",
            WarningKind::UnknownOperand => "wrong register or not defined",
            WarningKind::MalformedLabel => "wrong formatted label",
            WarningKind::Redefined => "already defined, ignored",
            WarningKind::InvalidValue => "invalid value",
            WarningKind::ByteOutOfRange => "byte value out of range",
            WarningKind::MalformedString => "wrong string format, ' missing?",
        };
        f.write_str(s)
    }
}

/// One non-fatal problem found while scanning a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based source line.
    pub line: usize,
    pub kind: WarningKind,
    /// The offending token, or the whole line.
    pub text: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.kind, self.text)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("assembly failed with {} diagnostic(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    #[error(transparent)]
    Label(#[from] LabelError),
}

const CONST: &str = ".const";
const DWORD: &str = ".dword";
const BYTES: &str = ".bytes";
const STRING: &str = ".string";

/// Line-at-a-time assembler. Feed every source line, then call
/// [`Assembler::finish`] to resolve labels.
#[derive(Debug, Default)]
pub struct Assembler {
    constants: HashMap<String, Word>,
    /// Variable name and size in bytes, in declaration order.
    variables: Vec<(String, usize)>,
    diagnostics: Vec<Diagnostic>,
    words: Vec<Word>,
    line: usize,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_line(&mut self, raw: &str) {
        self.line += 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            return;
        }
        let emitted = if line.starts_with('.') {
            self.directive(line)
        } else {
            self.instruction(line)
        };
        if let Some(words) = emitted {
            self.words.extend(words);
        }
    }

    /// Resolves labels when no line produced a diagnostic.
    pub fn finish(self) -> Result<Program, AsmError> {
        if !self.diagnostics.is_empty() {
            return Err(AsmError::Diagnostics(self.diagnostics));
        }
        debug!(
            words = self.words.len(),
            constants = self.constants.len(),
            variables = self.variables.len(),
            "assembled"
        );
        Ok(labels::resolve(self.words)?)
    }

    /// Memory offset of a declared variable: the total size of every
    /// variable declared before it.
    pub fn variable_offset(&self, name: &str) -> Option<usize> {
        let pos = self.variables.iter().position(|(n, _)| n == name)?;
        Some(self.variables[..pos].iter().map(|(_, size)| size).sum())
    }

    pub fn constant(&self, name: &str) -> Option<Word> {
        self.constants.get(name).copied()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Words emitted so far, labels still unresolved.
    pub fn raw_words(&self) -> &[Word] {
        &self.words
    }

    fn warn(&mut self, kind: WarningKind, text: &str) {
        let d = Diagnostic {
            line: self.line,
            kind,
            text: text.to_string(),
        };
        warn!("{d}");
        self.diagnostics.push(d);
    }

    fn used_space(&self) -> usize {
        self.variables.iter().map(|(_, size)| size).sum()
    }

    fn is_declared(&self, name: &str) -> bool {
        self.variables.iter().any(|(n, _)| n == name)
    }

    fn directive(&mut self, line: &str) -> Option<Vec<Word>> {
        let Some((directive, name, value)) = split_directive(line) else {
            self.warn(WarningKind::WrongSyntax, line);
            return None;
        };
        let already = match directive {
            CONST => self.constants.contains_key(name),
            DWORD | BYTES | STRING => self.is_declared(name),
            _ => {
                self.warn(WarningKind::UnknownDirective, directive);
                return None;
            }
        };
        if already {
            self.warn(WarningKind::Redefined, name);
            return None;
        }

        let base = self.used_space() as Word;
        match directive {
            CONST => {
                let v = parse_int(value).or_else(|| self.variable_offset(value).map(|o| o as Word));
                match v {
                    Some(v) => {
                        self.constants.insert(name.to_string(), v);
                    }
                    None => self.warn(WarningKind::InvalidValue, value),
                }
                None
            }
            DWORD => {
                let Some(v) = parse_int(value) else {
                    self.warn(WarningKind::InvalidValue, value);
                    return None;
                };
                self.variables.push((name.to_string(), 4));
                Some(vec![Op::WriteMemIntDword.opcode(), base, v])
            }
            BYTES => {
                let mut words = Vec::new();
                let mut items: Vec<&str> = value.split(',').collect();
                while items.len() > 1 && items.last().is_some_and(|s| s.trim().is_empty()) {
                    items.pop();
                }
                for (i, item) in items.iter().enumerate() {
                    let Some(v) = parse_int(item) else {
                        self.warn(WarningKind::InvalidValue, item);
                        return None;
                    };
                    if !(0..=Word::from(i8::MAX)).contains(&v) {
                        self.warn(WarningKind::ByteOutOfRange, item);
                        return None;
                    }
                    words.extend([Op::WriteMemByteDword.opcode(), base + i as Word, v]);
                }
                self.variables.push((name.to_string(), items.len()));
                Some(words)
            }
            _ => {
                let Some(text) = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                else {
                    self.warn(WarningKind::MalformedString, value);
                    return None;
                };
                let mut words = Vec::with_capacity(text.len() * 3);
                for (i, b) in text.bytes().enumerate() {
                    // sign-extended like a signed char; the store keeps the low byte
                    words.extend([Op::WriteMemByteDword.opcode(), base + i as Word, Word::from(b as i8)]);
                }
                // one byte of padding after every string, no terminator is written
                self.variables.push((name.to_string(), text.len() + 1));
                Some(words)
            }
        }
    }

    fn instruction(&mut self, line: &str) -> Option<Vec<Word>> {
        if let Some(name) = line.strip_suffix(':') {
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                self.warn(WarningKind::MalformedLabel, line);
                return None;
            }
            return Some(vec![Op::Label.opcode(), labels::label_id(name)]);
        }

        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        let Some((mnemonic, operands)) = tokens.split_first() else {
            self.warn(WarningKind::WrongSyntax, line);
            return None;
        };
        let Some(op) = instructions::from_mnemonic(mnemonic) else {
            self.warn(WarningKind::UnknownMnemonic, line);
            return None;
        };

        // the whole line is dropped so later instructions stay aligned
        if op.takes_label() {
            return match operands {
                [name] => Some(vec![op.opcode(), labels::label_id(name)]),
                _ => {
                    self.warn(WarningKind::MalformedLabel, line);
                    None
                }
            };
        }

        if operands.len() != op.operand_count() {
            self.warn(WarningKind::WrongOperandCount, line);
            return None;
        }
        let mut words = vec![op.opcode()];
        for token in operands {
            match self.operand(token) {
                Some(v) => words.push(v),
                None => {
                    self.warn(WarningKind::UnknownOperand, token);
                    return None;
                }
            }
        }
        Some(words)
    }

    /// Literal, then register, then constant, then variable offset.
    fn operand(&self, token: &str) -> Option<Word> {
        parse_int(token)
            .or_else(|| Reg::from_mnemonic(token).map(|r| r.index() as Word))
            .or_else(|| self.constant(token))
            .or_else(|| self.variable_offset(token).map(|o| o as Word))
    }
}

/// Assembles a whole source text.
pub fn assemble(source: &str) -> Result<Program, AsmError> {
    let mut asm = Assembler::new();
    for line in source.lines() {
        asm.feed_line(line);
    }
    asm.finish()
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(p) => &line[..p],
        None => line,
    }
}

/// `directive name value`. A string keeps everything after its name so
/// quoted text may contain spaces.
fn split_directive(line: &str) -> Option<(&str, &str, &str)> {
    let (directive, rest) = split_token(line)?;
    let (name, rest) = split_token(rest)?;
    let value = rest.trim();
    if value.is_empty() {
        return None;
    }
    if directive != STRING && value.contains(char::is_whitespace) {
        return None;
    }
    Some((directive, name, value))
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(match s.find(char::is_whitespace) {
        Some(p) => (&s[..p], &s[p..]),
        None => (s, ""),
    })
}

/// Decimal, or `0x` hex taken as a 32-bit pattern (`0xffffffff` is -1).
fn parse_int(s: &str) -> Option<Word> {
    let t = s.trim();
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok().map(|v| v as Word)
    } else {
        t.parse::<Word>().ok()
    }
}
