use crate::decoder::{Decoded, Decoder, TableDecoder};
use crate::instructions::{self, Form};
use crate::program::{Program, Word};
use crate::registers::Reg;

pub fn fmt_decoded(d: &Decoded) -> String {
    let Some(desc) = instructions::describe(d.op.opcode()) else {
        return format!(".word {:#x}", d.op.opcode());
    };
    let mn = desc.mnemonic;
    match desc.form {
        Form::Bare => mn.to_string(),
        Form::Reg => format!("{mn} {}", reg(d.a)),
        Form::RegImm => format!("{mn} {}, {:#x}", reg(d.a), d.b),
        Form::RegReg => format!("{mn} {}, {}", reg(d.a), reg(d.b)),
        Form::ImmImm => format!("{mn} [{:#x}], {:#x}", d.a, d.b),
        Form::Imm => format!("{mn} {:#x}", d.a),
        Form::Marker => format!("{mn} #{:08x}", d.a as u32),
        Form::Rel => match branch_target(d) {
            Some(t) => format!("{mn} {:+} -> {t}", d.a),
            None => format!("{mn} {:+}", d.a),
        },
        Form::Call => match branch_target(d) {
            Some(t) => format!("{mn} -> {t}"),
            None => format!("{mn} {:#x}", d.a),
        },
    }
}

/// Word index a resolved jump or call transfers control to.
pub fn branch_target(d: &Decoded) -> Option<usize> {
    let target = match instructions::describe(d.op.opcode())?.form {
        Form::Rel => d.at as i64 + i64::from(d.a),
        Form::Call => i64::from(d.a) + 1,
        _ => return None,
    };
    usize::try_from(target).ok()
}

/// Linear listing of a program: `(index, instruction text)` per instruction,
/// with undecodable words shown as `.word`.
pub fn listing(program: &Program) -> Vec<(usize, String)> {
    let dec = TableDecoder::new();
    let words = program.words();
    let mut out = Vec::new();
    let mut at = 0;
    while at < words.len() {
        match dec.decode(words, at) {
            Some(d) => {
                out.push((at, fmt_decoded(&d)));
                at += d.width();
            }
            None => {
                out.push((at, format!(".word {:#x}", words[at])));
                at += 1;
            }
        }
    }
    out
}

fn reg(index: Word) -> String {
    match Reg::from_index(index) {
        Some(r) => r.mnemonic().to_string(),
        None => format!("r?{index}"),
    }
}
