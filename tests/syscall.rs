use std::collections::{HashMap, VecDeque};
use std::io;

use pretty_assertions::assert_eq;
use simplevm::{assemble, CpuConfig, Machine, Reg, Syscall, SystemCalls, Trap};

/// Console and file system backed by memory.
#[derive(Debug, Default)]
struct Script {
    input: VecDeque<String>,
    prompts: Vec<String>,
    output: Vec<String>,
    files: HashMap<String, Vec<u8>>,
}

impl SystemCalls for Script {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        Ok(self.input.pop_front().unwrap_or_default())
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.output.push(text.to_string());
        Ok(())
    }

    fn read_file_byte(&mut self, path: &str, position: u64) -> io::Result<Option<u8>> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        Ok(file.get(position as usize).copied())
    }

    fn write_file_byte(&mut self, path: &str, position: u64, value: u8) -> io::Result<()> {
        let file = self.files.entry(path.to_string()).or_default();
        let pos = position as usize;
        if file.len() <= pos {
            file.resize(pos + 1, 0);
        }
        file[pos] = value;
        Ok(())
    }

    fn file_size(&mut self, path: &str) -> io::Result<u64> {
        Ok(self.files.get(path).map_or(0, |f| f.len() as u64))
    }
}

fn machine(script: Script) -> Machine<simplevm::LinearMemory, Script> {
    Machine::with_system(CpuConfig::default(), script)
}

#[test]
fn console_read_and_write() {
    let src = "\
.string prompt 'name? '
.string greet 'hi there'
movd r1 prompt
movd r2 100
int 0
movr r3 r1
movd r1 100
int 1
movd r1 greet
int 1
";
    let mut m = machine(Script {
        input: VecDeque::from(["bob".to_string()]),
        ..Script::default()
    });
    m.run(&assemble(src).unwrap()).unwrap();
    assert_eq!(m.sys.prompts, vec!["name? "]);
    assert_eq!(m.sys.output, vec!["bob", "hi there"]);
    assert_eq!(m.cpu.get(Reg::R3), 3);
    assert_eq!(&m.mem.mem[100..104], b"bob\0");
}

#[test]
fn end_of_input_reads_as_empty_line() {
    let mut m = machine(Script::default());
    m.run(&assemble("movd r1 50\nmovd r2 10\nint 0").unwrap()).unwrap();
    assert_eq!(m.cpu.get(Reg::R1), 0);
    assert_eq!(m.sys.prompts, vec![""]);
}

#[test]
fn file_bytes_and_size() {
    let src = "\
.string path 'out.bin'
movd r1 path
movd r2 2
movd r3 65
int 3
movd r1 path
int 4
movr r5 r1
movd r1 path
movd r2 2
int 2
movr r6 r1
movd r1 path
movd r2 3
int 2
";
    let mut m = machine(Script::default());
    m.run(&assemble(src).unwrap()).unwrap();
    assert_eq!(m.sys.files["out.bin"], vec![0, 0, 65]);
    assert_eq!(m.cpu.get(Reg::R5), 3);
    assert_eq!(m.cpu.get(Reg::R6), 65);
    assert_eq!(m.cpu.get(Reg::R1), -1);
}

#[test]
fn missing_file_has_size_zero() {
    let src = ".string path 'nope'\nmovd r1 path\nint 4";
    let mut m = machine(Script::default());
    m.run(&assemble(src).unwrap()).unwrap();
    assert_eq!(m.cpu.get(Reg::R1), 0);
}

#[test]
fn memory_size_comes_from_the_bus() {
    let mut m = machine(Script::default());
    assert_eq!(m.run(&assemble("int 5").unwrap()).unwrap().code, 65536);
}

#[test]
fn io_failure_faults() {
    let src = ".string path 'nope'\nmovd r1 path\nint 2";
    let mut m = machine(Script::default());
    let fault = m.run(&assemble(src).unwrap()).unwrap_err();
    assert!(matches!(
        fault.trap,
        Trap::Syscall {
            call: Syscall::ReadFileByte,
            ..
        }
    ));
}

#[test]
fn negative_file_position_faults() {
    let src = ".string path 'x'\nmovd r1 path\nmovd r2 -1\nint 2";
    let mut m = machine(Script::default());
    let fault = m.run(&assemble(src).unwrap()).unwrap_err();
    assert!(matches!(fault.trap, Trap::Syscall { .. }));
}

#[test]
fn unknown_function_id_faults() {
    let mut m = machine(Script::default());
    let fault = m.run(&assemble("int 9").unwrap()).unwrap_err();
    assert!(matches!(fault.trap, Trap::UnknownSyscall { id: 9 }));
}

#[test]
fn string_pointer_outside_memory_faults() {
    for (src, addr) in [("movd r1 -1\nint 1", -1), ("movd r1 65536\nint 4", 65536)] {
        let mut m = machine(Script::default());
        let fault = m.run(&assemble(src).unwrap()).unwrap_err();
        assert!(matches!(fault.trap, Trap::Bus { addr: a, .. } if a == addr), "{src}");
        assert!(m.sys.output.is_empty());
    }
}

#[test]
fn reused_machine_starts_from_zeroed_memory() {
    let mut m = machine(Script::default());
    m.run(&assemble(".string a 'hello'\nmovd r1 a\nint 1").unwrap()).unwrap();
    m.run(&assemble(".string s 'hi'\nmovd r1 s\nint 1").unwrap()).unwrap();
    assert_eq!(m.sys.output, vec!["hello", "hi"]);
}
