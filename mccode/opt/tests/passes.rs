use mccode_frontend::{McParser, Workspace};
use mccode_ir::{Builder, Context, InstIdx};
use mccode_opt::pass_manager::{PassManager, PassResult};
use std::{fs, path::Path};

const ORIGIN: &str = "DEFINE COMPONENT Origin
TRACE
%{
  SCATTER;
%}
END
";

const ARM: &str = "DEFINE COMPONENT Arm
END
";

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// Build `instr` as `dir/Test.instr`, with the test components available.
fn build(dir: &Path, instr: &str) -> Context {
    write(dir, "Origin.comp", ORIGIN);
    write(dir, "Arm.comp", ARM);
    let path = dir.join("Test.instr");
    fs::write(&path, instr).unwrap();
    let file = McParser::parse_file(&path).unwrap();
    Builder::new(Workspace::construct(&Some(path), &[], None))
        .build(&file)
        .unwrap()
}

fn run(ctx: &mut Context, passes: &[&str]) -> PassResult<()> {
    let pm = PassManager::default_passes()?;
    let incl: Vec<String> = passes.iter().map(|p| p.to_string()).collect();
    pm.execute_plan(ctx, &incl, &[])
}

fn skipped(ctx: &Context) -> Vec<bool> {
    ctx.instrument
        .instances
        .iter()
        .map(|inst| inst.skip_transform)
        .collect()
}

#[test]
fn skip_transforms_of_inert_instances() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
COMPONENT c = Arm() AT (0,0,1) RELATIVE b
COMPONENT d = Arm() AT (0,0,1) RELATIVE c
EXTEND
%{
  x = 0;
%}
COMPONENT e = Arm() AT (0,0,1) RELATIVE d
END
",
    );
    run(&mut ctx, &["all"]).unwrap();
    assert_eq!(skipped(&ctx), vec![false, true, true, false, true]);
}

#[test]
fn jump_source_and_target_keep_their_transform() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
COMPONENT c = Arm() AT (0,0,1) RELATIVE b
COMPONENT d = Arm() AT (0,0,1) RELATIVE c
JUMP b ITERATE 3
COMPONENT e = Arm() AT (0,0,1) RELATIVE d
END
",
    );
    run(&mut ctx, &["all"]).unwrap();
    let d = &ctx.instrument.instances[3];
    assert_eq!(d.jumps[0].target_index, Some(InstIdx::new(2)));
    assert_eq!(skipped(&ctx), vec![false, false, true, false, true]);
}

#[test]
fn forward_named_jump_is_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
JUMP c WHEN (1)
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
COMPONENT c = Arm() AT (0,0,1) RELATIVE b
END
",
    );
    run(&mut ctx, &["validate"]).unwrap();
    let a = &ctx.instrument.instances[0];
    assert_eq!(a.jumps[0].target_index, Some(InstIdx::new(3)));
}

#[test]
fn unknown_jump_target_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
JUMP nowhere WHEN (1)
JUMP NEXT(4) WHEN (1)
END
",
    );
    let err = run(&mut ctx, &["resolve-jumps"]).unwrap_err();
    assert_eq!(err.len(), 2);
    let msgs: Vec<_> = err.errors().iter().map(|e| e.message()).collect();
    assert!(msgs[0].contains("nowhere"), "{msgs:?}");
    assert!(msgs[1].contains("NEXT_4"), "{msgs:?}");
}

#[test]
fn group_needs_two_consecutive_members() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE GROUP lonely
COMPONENT b = Arm() AT (0,0,1) ABSOLUTE GROUP split
COMPONENT c = Arm() AT (0,0,1) ABSOLUTE
COMPONENT d = Arm() AT (0,0,1) ABSOLUTE GROUP split
END
",
    );
    let err = run(&mut ctx, &["well-formed"]).unwrap_err();
    let msgs: Vec<_> = err.errors().iter().map(|e| e.message()).collect();
    assert_eq!(msgs.len(), 2, "{msgs:?}");
    assert!(msgs[0].contains("GROUP lonely"), "{msgs:?}");
    assert!(msgs[1].contains("consecutive"), "{msgs:?}");
}

#[test]
fn repeated_component_parameters() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Twice.comp",
        "DEFINE COMPONENT Twice
DEFINITION PARAMETERS (n = 1)
SETTING PARAMETERS (w = 1, w = 2, n = 3)
END
",
    );
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Twice() AT (0,0,0) ABSOLUTE
END
",
    );
    let err = run(&mut ctx, &["well-formed"]).unwrap_err();
    let msgs: Vec<_> = err.errors().iter().map(|e| e.message()).collect();
    assert!(
        msgs.iter().any(|m| m.contains("w is used multiple times")),
        "{msgs:?}"
    );
    assert!(
        msgs.iter()
            .any(|m| m.contains("n is used in both DEFINITION and SETTING")),
        "{msgs:?}"
    );
}

#[test]
fn funnel_check_only_warns() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
JUMP MYSELF ITERATE 2
END
",
    );
    run(&mut ctx, &["funnel-check"]).unwrap();
}

#[test]
fn keep_all_option() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
END
",
    );
    ctx.extra_opts = vec!["skip-transforms:keep-all".to_string()];
    run(&mut ctx, &["skip-transforms"]).unwrap();
    assert_eq!(skipped(&ctx), vec![false, false]);
}

#[test]
fn excluded_pass_does_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE
END
",
    );
    let pm = PassManager::default_passes().unwrap();
    pm.execute_plan(
        &mut ctx,
        &["all".to_string()],
        &["skip-transforms".to_string()],
    )
    .unwrap();
    assert_eq!(skipped(&ctx), vec![false]);
}

#[test]
fn unknown_pass_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE
END
",
    );
    let err = run(&mut ctx, &["no-such-pass"]).unwrap_err();
    assert!(err.errors()[0].message().contains("Unknown pass: no-such-pass"));
}
