use pretty_assertions::assert_eq;
use simplevm::{assemble, label_id, AsmError, Assembler, LabelError, WarningKind};

fn kinds(src: &str) -> Vec<(usize, WarningKind)> {
    match assemble(src) {
        Err(AsmError::Diagnostics(d)) => d.iter().map(|d| (d.line, d.kind)).collect(),
        other => panic!("expected diagnostics, got {other:?}"),
    }
}

#[test]
fn every_bad_line_is_reported() {
    let src = "\
movd r1 5
frob r1
movd r9 1
movd r1
.dword x
.weird a 1
hlt
";
    assert_eq!(
        kinds(src),
        vec![
            (2, WarningKind::UnknownMnemonic),
            (3, WarningKind::UnknownOperand),
            (4, WarningKind::WrongOperandCount),
            (5, WarningKind::WrongSyntax),
            (6, WarningKind::UnknownDirective),
        ]
    );
}

#[test]
fn malformed_jump_drops_the_whole_line() {
    let mut asm = Assembler::new();
    for line in ["movd r1 1", "jmp", "jmp a b", "call", "hlt"] {
        asm.feed_line(line);
    }
    assert_eq!(asm.raw_words(), &[1, 0, 1, 32][..]);
    let kinds: Vec<_> = asm.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![WarningKind::MalformedLabel; 3]);
}

#[test]
fn undefined_label_is_fatal() {
    assert_eq!(
        assemble("jmp nowhere\nhlt"),
        Err(AsmError::Label(LabelError::Undefined {
            id: label_id("nowhere"),
            at: 0
        }))
    );
}

#[test]
fn redefined_label_is_fatal() {
    let err = assemble("a:\nlabel a\nhlt").unwrap_err();
    assert_eq!(
        err,
        AsmError::Label(LabelError::Redefined {
            id: label_id("a"),
            at: 2
        })
    );
}

#[test]
fn label_spellings_are_equivalent() {
    let words = |src: &str| assemble(src).unwrap().into_words();
    let expected = words("label top\njmp top");
    assert_eq!(words("top:\njmp top"), expected);
    assert_eq!(words("@ top\njmp top"), expected);
    assert_eq!(words("proc top\njmp top"), expected);
    assert_eq!(expected, vec![18, label_id("top"), 19, -2]);
}

#[test]
fn mnemonics_and_registers_ignore_case() {
    let p = assemble("MOVD R1 0X10\nHlt").unwrap();
    assert_eq!(p.words(), &[1, 0, 16, 32][..]);
}

#[test]
fn commas_between_operands_are_accepted() {
    let p = assemble("movr r2, r1").unwrap();
    assert_eq!(p.words(), &[8, 1, 0][..]);
}

#[test]
fn variables_pack_in_declaration_order() {
    let src = "\
.dword count 0x10
.bytes table 1,2,127
.string msg 'a b'
.dword after 7
";
    let mut asm = Assembler::new();
    for line in src.lines() {
        asm.feed_line(line);
    }
    assert!(asm.diagnostics().is_empty());
    assert_eq!(asm.variable_offset("count"), Some(0));
    assert_eq!(asm.variable_offset("table"), Some(4));
    assert_eq!(asm.variable_offset("msg"), Some(7));
    // three bytes of text plus one byte of padding
    assert_eq!(asm.variable_offset("after"), Some(11));
    assert_eq!(
        asm.raw_words(),
        &[
            25, 0, 16, //
            24, 4, 1, 24, 5, 2, 24, 6, 127, //
            24, 7, 97, 24, 8, 32, 24, 9, 98, //
            25, 11, 7,
        ][..]
    );
}

#[test]
fn strings_initialise_memory_at_run_time() {
    use simplevm::{CpuConfig, Machine};
    let p = assemble(".string s 'hey'\n.dword n 258").unwrap();
    let mut m = Machine::new(CpuConfig::default());
    m.run(&p).unwrap();
    assert_eq!(&m.mem.mem[..8], &[b'h', b'e', b'y', 0, 0, 0, 1, 2]);
}

#[test]
fn directive_problems_are_warnings() {
    let src = "\
.const k 1
.const k 2
.bytes b 1,200
.bytes c 1,x
.string s nope
.dword d zz
.const e missing
";
    assert_eq!(
        kinds(src),
        vec![
            (2, WarningKind::Redefined),
            (3, WarningKind::ByteOutOfRange),
            (4, WarningKind::InvalidValue),
            (5, WarningKind::MalformedString),
            (6, WarningKind::InvalidValue),
            (7, WarningKind::InvalidValue),
        ]
    );
}

#[test]
fn first_constant_definition_wins() {
    let mut asm = Assembler::new();
    asm.feed_line(".const k 1");
    asm.feed_line(".const k 2");
    assert_eq!(asm.constant("k"), Some(1));
    assert!(asm.finish().is_err());
}

#[test]
fn constants_and_variables_as_operands() {
    let src = ".const limit 0x20\n.dword v 3\n.dword w 4\nmovd r1 limit\nrmid r2 w";
    let p = assemble(src).unwrap();
    assert_eq!(p.words(), &[25, 0, 3, 25, 4, 4, 1, 0, 32, 27, 1, 4][..]);
}

#[test]
fn comment_after_code_is_stripped() {
    let p = assemble("incr r1 # bump\n   # only a comment\n").unwrap();
    assert_eq!(p.words(), &[16, 0][..]);
}
