use mccode_frontend::{McParser, Workspace};
use mccode_ir::{Builder, Context, Id, InstIdx, JumpTarget};
use mccode_utils::{DiagnosticContext, McResult};
use std::{fs, path::Path};

const ORIGIN: &str = "DEFINE COMPONENT Origin
TRACE
%{
%}
END
";

const ARM: &str = "DEFINE COMPONENT Arm
END
";

const SLIT: &str = "DEFINE COMPONENT Slit
SETTING PARAMETERS (xwidth, yheight = 0.1, string filename = 0)
OUTPUT PARAMETERS (area)
TRACE
%{
  PROP_Z0;
%}
END
";

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn with_library(dir: &Path) {
    write(dir, "Origin.comp", ORIGIN);
    write(dir, "Arm.comp", ARM);
    write(dir, "Slit.comp", SLIT);
}

/// Build `instr` as `dir/Test.instr`.
fn construct(
    dir: &Path,
    instr: &str,
) -> (McResult<()>, Context, DiagnosticContext) {
    let path = dir.join("Test.instr");
    fs::write(&path, instr).unwrap();
    let file = McParser::parse_file(&path).unwrap();
    let mut builder = Builder::new(Workspace::construct(&Some(path), &[], None));
    let built = builder.construct(&file);
    let (ctx, diag) = builder.finish();
    (built, ctx, diag)
}

fn build_ok(dir: &Path, instr: &str) -> (Context, DiagnosticContext) {
    let (built, ctx, diag) = construct(dir, instr);
    built.unwrap();
    (ctx, diag)
}

#[test]
fn previous_reference_chain() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE PREVIOUS
END
",
    );
    assert_eq!(diag.error_count(), 0);
    let instr = &ctx.instrument;
    assert_eq!(instr.len(), 2);
    assert_eq!(instr.instances[0].name, "a");
    assert_eq!(instr.instances[0].index, InstIdx::new(1));
    assert_eq!(instr.instances[1].index, InstIdx::new(2));
    assert_eq!(instr.instances[1].position.place_rel, Some(InstIdx::new(1)));
    // No ROTATED: the orientation follows the placement reference.
    assert_eq!(
        instr.instances[1].position.orientation_rel,
        Some(InstIdx::new(1))
    );
    assert_eq!(instr.instances[1].position.orientation.x.text, "0");
}

#[test]
fn unassigned_parameter_binds_zero() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT s = Slit() AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 1);
    let msg = diag.errors_iter().next().unwrap().message();
    assert!(msg.contains("xwidth"), "{msg}");
    let slit = &ctx.instrument.instances[0];
    assert_eq!(slit.setpar[&Id::new("xwidth")].text, "0.0");
    assert_eq!(slit.setpar[&Id::new("yheight")].text, "0.1");
    assert_eq!(slit.setpar.len(), 3);
}

#[test]
fn duplicate_instance_name_is_one_error() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT det = Arm() AT (0,0,0) ABSOLUTE
COMPONENT det = Arm() AT (0,0,1) ABSOLUTE
COMPONENT s = Slit(xwidth = 1, bogus = 2) AT (0,0,2) ABSOLUTE
END
",
    );
    // The duplicate and the unmatched actual are both reported.
    assert_eq!(diag.error_count(), 2);
    let msgs: Vec<_> = diag.errors_iter().map(|e| e.message()).collect();
    assert!(msgs[0].contains("det"), "{msgs:?}");
    assert!(msgs[0].contains("already defined"), "{msgs:?}");
    assert_eq!(ctx.instrument.len(), 3);
    assert_eq!(ctx.instrument.instances[1].index, InstIdx::new(2));
}

#[test]
fn instance_named_like_a_parameter() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (_, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT area = Slit(xwidth = 1) AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 1);
}

#[test]
fn misspelled_actual_gets_a_suggestion() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (_, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT s = Slit(xwidth = 1, YHeight = 2) AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 1);
    let err = format!("{:?}", diag.errors_iter().next().unwrap());
    assert!(err.contains("Unmatched actual parameter YHeight"), "{err}");
    assert!(err.contains("misspelling of `yheight'"), "{err}");
}

#[test]
fn split_on_second_group_member_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (built, _, _) = construct(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE GROUP g
SPLIT 4 COMPONENT b = Arm() AT (0,0,0) ABSOLUTE GROUP g
END
",
    );
    let err = built.unwrap_err();
    assert!(err.is_fatal());
    let msg = err.message();
    assert!(msg.contains("GROUP g"), "{msg}");
    assert!(msg.contains("Move the SPLIT to a"), "{msg}");
}

#[test]
fn split_on_first_group_member_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
SPLIT COMPONENT a = Arm() AT (0,0,0) ABSOLUTE GROUP g
COMPONENT b = Arm() AT (0,0,0) ABSOLUTE GROUP g
COMPONENT c = Arm() AT (0,0,1) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 0);
    assert_eq!(diag.warning_iter().count(), 1);
    let instr = &ctx.instrument;
    assert_eq!(instr.instances[0].split.as_ref().unwrap().text, "10");
    let g = &instr.groups[0];
    assert_eq!(g.first, ("a".into(), InstIdx::new(1)));
    assert_eq!(g.last, ("b".into(), InstIdx::new(2)));
    assert_eq!(g.members, vec![InstIdx::new(1), InstIdx::new(2)]);
    assert!(instr.instances[2].group.is_none());
}

#[test]
fn missing_component_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (built, ctx, _) = construct(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT f = Foo() AT (0,0,0) ABSOLUTE
END
",
    );
    let err = built.unwrap_err();
    assert!(err.is_fatal());
    assert!(err.message().contains("Cannot find file"));
    assert!(ctx.instrument.is_empty());
}

#[test]
fn file_without_the_definition() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Foo.comp", ARM);
    let (_, ctx, diag) = construct(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT f = Foo() AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 1);
    assert!(ctx.instrument.is_empty());
    // The definition found in the file is still registered.
    assert!(ctx.definitions.find("Arm".into()).is_some());
}

#[test]
fn copy_extend_keeps_parent_lines_first() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "Base.comp",
        "DEFINE COMPONENT Base
SETTING PARAMETERS (r = 1)
TRACE
%{
  base_trace();
%}
FINALLY
%{
  base_finally();
%}
END
",
    );
    write(
        dir.path(),
        "Child.comp",
        "DEFINE COMPONENT Child COPY Base
SETTING PARAMETERS (h = 2)
TRACE COPY Base EXTEND
%{
  child_trace();
%}
END
",
    );
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT c = Child() AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 0);
    let child = ctx.def_of(&ctx.instrument.instances[0]);
    assert_eq!(child.trace.lines, vec!["  base_trace();", "  child_trace();"]);
    assert!(child.trace.file.ends_with("Base.comp"));
    assert_eq!(child.trace.line, 5);
    assert_eq!(child.finally.lines, vec!["  base_finally();"]);
    let names: Vec<_> = child.set_par.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["r", "h"]);
}

#[test]
fn copied_instance_overrides_actuals() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT s1 = Slit(xwidth = 1) WHEN (1) AT (0,0,0) ABSOLUTE
EXTEND %{
  x = 1;
%}
COMPONENT COPY(s1) = COPY(s1)(yheight = 2) AT (0,0,1) RELATIVE s1
COMPONENT MYSELF = Arm() AT (0,0,2) RELATIVE PREVIOUS(2)
END
",
    );
    assert_eq!(diag.error_count(), 0);
    let instr = &ctx.instrument;
    let copy = &instr.instances[1];
    assert_eq!(copy.name, "s1_2");
    assert_eq!(copy.type_name, "Slit");
    assert_eq!(copy.setpar[&Id::new("xwidth")].text, "1");
    assert_eq!(copy.setpar[&Id::new("yheight")].text, "2");
    assert_eq!(copy.when.as_ref().unwrap().text, "( 1 )");
    assert_eq!(copy.extend.lines, vec!["  x = 1;"]);
    assert!(copy.split.is_none());
    let me = &instr.instances[2];
    assert_eq!(me.name, "Comp_3");
    assert_eq!(me.position.place_rel, Some(InstIdx::new(1)));
}

#[test]
fn unresolved_references_degrade_to_absolute() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Arm() AT (0,0,0) RELATIVE PREVIOUS
COMPONENT b = Arm() AT (0,0,0) RELATIVE nowhere
END
",
    );
    assert_eq!(diag.warning_iter().count(), 1);
    assert_eq!(diag.error_count(), 1);
    assert!(ctx.instrument.instances[0].position.place_rel.is_none());
    assert!(ctx.instrument.instances[1].position.place_rel.is_none());
}

#[test]
fn instrument_parameters_in_expressions() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T(w = 0.1, int n = 2, string f = \"a.dat\", w = 0.2)
TRACE
COMPONENT s = Slit(xwidth = w * 2, filename = f) AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 0);
    // The second `w` wins; the first is cleared.
    assert_eq!(diag.warning_iter().count(), 1);
    let instr = &ctx.instrument;
    assert_eq!(instr.formals[0].name, "");
    assert_eq!(instr.params().count(), 3);
    let s = &instr.instances[0];
    assert_eq!(
        s.setpar[&Id::new("xwidth")].text,
        "_instrument_var._parameters.w * 2"
    );
    assert!(!s.setpar[&Id::new("xwidth")].is_value);
    assert!(s.setpar[&Id::new("filename")].is_value);
}

#[test]
fn jumps_resolve_relative_targets() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, _) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,0) ABSOLUTE
JUMP PREVIOUS ITERATE 3
JUMP c WHEN (x > 1)
COMPONENT c = Arm() AT (0,0,0) ABSOLUTE
END
",
    );
    let b = &ctx.instrument.instances[1];
    assert_eq!(b.jumps.len(), 2);
    assert!(b.jumps[0].iterate);
    assert_eq!(b.jumps[0].target_index, Some(InstIdx::new(1)));
    assert_eq!(b.jumps[1].target, JumpTarget::Named("c".into()));
    assert_eq!(b.jumps[1].target_index, None);
}

#[test]
fn dependency_flags() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    write(
        dir.path(),
        "Gpuless.comp",
        "DEFINE COMPONENT Gpuless
DEPENDENCY \"-lgsl\"
NOACC
END
",
    );
    let (ctx, _) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
DEPENDENCY \"-lm\"
TRACE
COMPONENT a = Gpuless() AT (0,0,0) ABSOLUTE
COMPONENT b = Gpuless() AT (0,0,0) ABSOLUTE
END
",
    );
    assert_eq!(ctx.instrument.dependency, " -lm -lgsl -DFUNNEL");
}

#[test]
fn included_instrument_is_spliced() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    write(
        dir.path(),
        "Inner.instr",
        "DEFINE INSTRUMENT Inner(E = 5)
DECLARE
%{
  double inner;
%}
TRACE
COMPONENT origin = Origin() AT (0,0,0) ABSOLUTE
REMOVABLE COMPONENT extra = Arm() AT (0,0,1) RELATIVE PREVIOUS
COMPONENT arm = Arm() AT (0,0,1) RELATIVE PREVIOUS
END
",
    );
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT Outer(L = 1)
DECLARE
%{
  double outer;
%}
TRACE
%include \"Inner\"
COMPONENT last = Arm() AT (0,0,L) RELATIVE arm
END
",
    );
    assert_eq!(diag.error_count(), 0);
    let instr = &ctx.instrument;
    assert_eq!(instr.name, "Outer");
    assert_eq!(instr.included, 1);
    let names: Vec<_> = instr.instances.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["origin", "arm", "last"]);
    for (slot, inst) in instr.instances.iter().enumerate() {
        assert_eq!(inst.index, InstIdx::from_slot(slot));
    }
    assert_eq!(instr.instances[1].position.place_rel, Some(InstIdx::new(1)));
    assert_eq!(instr.decls.lines, vec!["  double inner;", "  double outer;"]);
    let params: Vec<_> = instr.params().map(|f| f.name.as_str()).collect();
    assert_eq!(params, vec!["L", "E"]);
}

#[test]
fn repeated_instrument_parameter_keeps_the_last() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T(L = 1, M = 2, L = 3)
TRACE
COMPONENT a = Arm() AT (0,0,L) ABSOLUTE
END
",
    );
    assert_eq!(diag.error_count(), 0);
    let names: Vec<&str> =
        ctx.instrument.formals.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["", "M", "L"]);
    assert_eq!(ctx.instrument.formals[2].default.as_ref().unwrap().text, "3");
    assert_eq!(ctx.instrument.params().count(), 2);
    assert!(diag.warning_iter().any(|w| w.message().contains(
        "Instrument parameter name L is used multiple times in instrument T. Using the last definition."
    )));
}

#[test]
fn copy_with_its_own_extend_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    with_library(dir.path());
    let (ctx, diag) = build_ok(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT s1 = Slit(xwidth = 1) AT (0,0,0) ABSOLUTE
EXTEND %{
  x = 1;
%}
COMPONENT s2 = COPY(s1) AT (0,0,1) RELATIVE s1
EXTEND %{
  y = 2;
%}
END
",
    );
    assert_eq!(diag.error_count(), 0);
    let overwritten = diag
        .warning_iter()
        .filter(|w| {
            w.message()
                .contains("Existing (COPY) EXTEND block in COMPONENT s2 is overwritten")
        })
        .count();
    assert_eq!(overwritten, 1);
    let instr = &ctx.instrument;
    assert_eq!(instr.instances[0].extend.lines, vec!["  x = 1;"]);
    assert_eq!(instr.instances[1].extend.lines, vec!["  y = 2;"]);
}
