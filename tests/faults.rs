use simplevm::{CpuConfig, Machine, Program, Trap};

fn fault(words: Vec<i32>, cfg: CpuConfig) -> Trap {
    let p = Program::from_resolved(words).unwrap();
    let mut m = Machine::new(cfg);
    let fault = m.run(&p).unwrap_err();
    assert!(!m.cpu.is_running());
    fault.trap
}

#[test]
fn register_index_out_of_range() {
    // r1..r6, rbp, rsp, rip are 0..=8; 9 is one past the end
    let t = fault(vec![1, 9, 1], CpuConfig::default());
    assert!(matches!(t, Trap::Register { index: 9 }));
    let t = fault(vec![8, 0, -1], CpuConfig::default());
    assert!(matches!(t, Trap::Register { index: -1 }));
}

#[test]
fn rip_is_an_addressable_register() {
    // movd rip 5, then the step increment lands on hlt at 6
    let p = Program::from_resolved(vec![1, 8, 5, 1, 0, 7, 32]).unwrap();
    let mut m = Machine::new(CpuConfig::default());
    assert_eq!(m.run(&p).unwrap().code, 0);
}

#[test]
fn step_limit_stops_endless_loops() {
    let cfg = CpuConfig {
        max_steps: Some(50),
        ..CpuConfig::default()
    };
    // the jump lands right after the label, on itself
    let t = fault(vec![18, 1, 19, -2], cfg);
    assert!(matches!(t, Trap::StepLimit { limit: 50 }));
}

#[test]
fn unresolved_garbage_is_rejected_before_running() {
    assert!(Program::from_resolved(vec![99]).is_err());
    assert!(Program::from_resolved(vec![1, 0]).is_err());
}

#[test]
fn fault_dump_is_serializable() {
    let p = Program::from_resolved(vec![1, 0, 42, 29, 0]).unwrap();
    let mut m = Machine::new(CpuConfig {
        dump_bytes: 4,
        ..CpuConfig::default()
    });
    let fault = m.run(&p).unwrap_err();
    let json = serde_json::to_value(&*fault.dump).unwrap();
    assert_eq!(json["registers"][0]["name"], "r1");
    assert_eq!(json["registers"][0]["value"], 42);
    assert_eq!(json["memory"].as_array().map(Vec::len), Some(4));
}
