use pretty_assertions::assert_eq;
use simplevm::decoder::TableDecoder;
use simplevm::exec::IntExecutor;
use simplevm::stack::StackError;
use simplevm::{assemble, Cpu, CpuConfig, HostSystem, LinearMemory, Machine, Reg, Trap};

#[test]
fn retn_resumes_after_call_operand() {
    let src = "\
call f
movd r2 1
hlt
f:
movd r1 9
retn
";
    let p = assemble(src).unwrap();
    assert_eq!(p.words()[..2], [30, 5]);

    let cfg = CpuConfig::default();
    let mut cpu = Cpu::new(cfg);
    let mut mem = LinearMemory::new(cfg.memory_size);
    let mut sys = HostSystem;
    let (dec, exec) = (TableDecoder::new(), IntExecutor);
    cpu.load(&p);

    cpu.step(&p, &mut mem, &mut sys, &dec, &exec).unwrap(); // call
    assert_eq!(cpu.ip(), 6);
    assert_eq!(cpu.stack.iter_top_down().collect::<Vec<_>>(), vec![0]);
    cpu.step(&p, &mut mem, &mut sys, &dec, &exec).unwrap(); // label
    cpu.step(&p, &mut mem, &mut sys, &dec, &exec).unwrap(); // movd
    cpu.step(&p, &mut mem, &mut sys, &dec, &exec).unwrap(); // retn
    assert_eq!(cpu.ip(), 2);
    assert!(cpu.stack.is_empty());

    cpu.run(&p, &mut mem, &mut sys, &dec, &exec).unwrap();
    assert_eq!((cpu.get(Reg::R1), cpu.get(Reg::R2)), (9, 1));
}

#[test]
fn retn_on_empty_stack_halts() {
    let p = assemble("movd r1 4\nretn\nmovd r1 5").unwrap();
    let mut m = Machine::new(CpuConfig::default());
    assert_eq!(m.run(&p).unwrap().code, 4);
}

#[test]
fn nested_calls_with_push_pop_and_aliases() {
    let src = "\
movd r1 1
call outer
hlt

function outer
    push r1
    call inner
    pop r2
end_function

proc inner
    addd r1 10
end_proc
";
    let p = assemble(src).unwrap();
    let mut m = Machine::new(CpuConfig::default());
    let exit = m.run(&p).unwrap();
    assert_eq!(exit.code, 11);
    assert_eq!(m.cpu.get(Reg::R2), 1);
    assert!(m.cpu.stack.is_empty());
}

#[test]
fn runaway_recursion_overflows_the_stack() {
    let p = assemble("rec:\ncall rec").unwrap();
    let cfg = CpuConfig {
        stack_capacity: 4,
        ..CpuConfig::default()
    };
    let mut m = Machine::new(cfg);
    let fault = m.run(&p).unwrap_err();
    assert!(matches!(
        fault.trap,
        Trap::Stack(StackError::Overflow { capacity: 4 })
    ));
    assert_eq!(fault.dump.stack, vec![2, 2, 2, 2]);
}

#[test]
fn pop_on_empty_stack_faults() {
    let p = assemble("pop r1").unwrap();
    let mut m = Machine::new(CpuConfig::default());
    let fault = m.run(&p).unwrap_err();
    assert!(matches!(fault.trap, Trap::Stack(StackError::Underflow)));
}

#[test]
fn push_pop_round_trip_reverses_order() {
    let p = assemble("movd r1 1\nmovd r2 2\npush r1\npush r2\npop r3\npop r4").unwrap();
    let mut m = Machine::new(CpuConfig::default());
    m.run(&p).unwrap();
    assert_eq!((m.cpu.get(Reg::R3), m.cpu.get(Reg::R4)), (2, 1));
}
