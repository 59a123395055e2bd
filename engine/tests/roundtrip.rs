//! Persistence and clipboard round-trip laws.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rpn42_engine::{Arg, Value};

fn populated_core() -> rpn42_engine::Core<common::TestHost> {
    let mut core = core();
    core.paste("LBL \"F\"\nRCL \"X\"\nX^2\nRTN").unwrap();
    core.paste("LBL \"G\"\n1\n+\nEND").unwrap();
    push(&mut core, 2.5);
    sto_var(&mut core, "A");
    push(&mut core, 0.0);
    cmd(&mut core, "ENTER").unwrap();
    push(&mut core, 1.0);
    cmd(&mut core, "COMPLEX").unwrap();
    sto_var(&mut core, "C");
    push(&mut core, 7.0);
    cmd_arg(&mut core, "SF", Arg::Num(11)).unwrap();
    cmd_arg(&mut core, "FIX", Arg::Num(2)).unwrap();
    cmd(&mut core, "RAD").unwrap();
    push(&mut core, 65.0);
    cmd(&mut core, "XTOA").unwrap();
    core
}

#[test]
fn save_then_load_reproduces_core_state() {
    let mut core = populated_core();
    core.save_state().unwrap();

    let stack = core.stack().clone();
    let flags = core.flags().clone();
    let vars = core.vars().clone();
    let prgms = core.prgms().clone();
    let alpha = core.alpha().clone();
    let modes = core.modes().clone();

    // carry the saved bytes into a brand-new core
    let host = core.cleanup();
    let mut fresh = rpn42_engine::Core::new(common::TestHost {
        saved_state: host.saved_state,
        ..Default::default()
    });
    fresh.init(true).unwrap();

    assert_eq!(fresh.stack(), &stack);
    assert_eq!(fresh.flags(), &flags);
    assert_eq!(fresh.vars(), &vars);
    assert_eq!(fresh.prgms(), &prgms);
    assert_eq!(fresh.alpha(), &alpha);
    assert_eq!(fresh.modes(), &modes);
}

#[test]
fn load_rejects_garbage_without_clobbering() {
    let mut core = rpn42_engine::Core::new(common::TestHost {
        saved_state: b"not a state file at all".to_vec(),
        ..Default::default()
    });
    push(&mut core, 42.0);
    assert!(core.load_state().is_err());
    assert_eq!(x_real(&core), 42.0);
}

#[test]
fn export_then_import_restores_program_bytes() {
    let mut core = populated_core();
    let before: Vec<Vec<u8>> = (0..2)
        .map(|i| core.prgms().prgm(i).unwrap().bytes().to_vec())
        .collect();
    core.export_programs(&[0, 1]).unwrap();

    let host = core.cleanup();
    let mut fresh = rpn42_engine::Core::new(common::TestHost {
        import_src: host.exported,
        ..Default::default()
    });
    let imported = fresh.import_programs().unwrap();
    assert_eq!(imported, 2);
    for (i, bytes) in before.iter().enumerate() {
        assert_eq!(fresh.prgms().prgm(i).unwrap().bytes(), &bytes[..]);
    }
}

#[test]
fn paste_number_and_copy_x() {
    let mut core = core();
    core.paste("-12.5").unwrap();
    assert_eq!(x_real(&core), -12.5);
    let copied = core.copy().unwrap();
    assert!(copied.contains("12.5"), "{copied}");
}

#[test]
fn paste_program_listing_installs_program() {
    let mut core = core();
    core.paste("LBL \"Z\"\n2\n*\nRTN").unwrap();
    assert!(core.prgms().find_global_label(&ident("Z")).is_ok());
    push(&mut core, 21.0);
    cmd_arg(&mut core, "XEQ", Arg::Str(ident("Z"))).unwrap();
    core.run_to_completion(1000).unwrap();
    assert_eq!(x_real(&core), 42.0);
}

#[test]
fn list_programs_names_by_first_label() {
    let core = populated_core();
    let names = core.list_programs();
    assert!(names.contains(&"F".to_string()));
    assert!(names.contains(&"G".to_string()));
    // the entry program is always last
    assert_eq!(names.last().unwrap(), ".END.");
}

#[test]
fn state_with_unknown_block_is_skipped() {
    let mut core = populated_core();
    core.save_state().unwrap();
    let mut host = core.cleanup();
    // splice an unknown block (tag 999, 4-byte body) right after the header
    let insert_at = 4 + 4 + 4; // magic, version, shell size (zero)
    let mut unknown = Vec::new();
    unknown.extend_from_slice(&999u32.to_be_bytes());
    unknown.extend_from_slice(&4u32.to_be_bytes());
    unknown.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    let mut spliced = host.saved_state[..insert_at].to_vec();
    spliced.extend_from_slice(&unknown);
    spliced.extend_from_slice(&host.saved_state[insert_at..]);
    host.saved_state = spliced;

    let mut fresh = rpn42_engine::Core::new(common::TestHost {
        saved_state: host.saved_state,
        ..Default::default()
    });
    fresh.init(true).unwrap();
    assert_eq!(
        fresh.vars().recall(&ident("A")),
        Some(&Value::Real(2.5))
    );
}
