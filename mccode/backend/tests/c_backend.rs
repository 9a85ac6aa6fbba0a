use mccode_backend::{Backend, CBackend, JsonBackend, RuntimeEmbedder};
use mccode_frontend::{McParser, Workspace};
use mccode_ir::{Builder, Context};
use mccode_opt::pass_manager::PassManager;
use mccode_utils::OutputFile;
use std::{fs, io, path::Path};

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

const SLIT: &str = "DEFINE COMPONENT Slit
SETTING PARAMETERS (w = 0.1, string file = 0)
DECLARE
%{
  double half;
%}
INITIALIZE
%{
  half = w / 2;
%}
TRACE
%{
  if (x > half) ABSORB;
%}
END
";

const LENS: &str = "DEFINE COMPONENT Lens
SETTING PARAMETERS (vector coef = NULL)
TRACE
%{
  p *= coef[0];
%}
END
";

/// Runtime files are replaced by a marker comment.
struct FakeRuntime;

impl RuntimeEmbedder for FakeRuntime {
    fn read(&self, name: &str) -> io::Result<String> {
        Ok(format!("/* runtime {name} */"))
    }

    fn include_path(&self, name: &str) -> String {
        format!("share/{name}")
    }
}

fn build(dir: &Path, instr: &str) -> Context {
    fs::write(dir.join("Origin.comp"), ORIGIN).unwrap();
    fs::write(dir.join("Arm.comp"), ARM).unwrap();
    fs::write(dir.join("Slit.comp"), SLIT).unwrap();
    fs::write(dir.join("Lens.comp"), LENS).unwrap();
    let path = dir.join("Test.instr");
    fs::write(&path, instr).unwrap();
    let file = McParser::parse_file(&path).unwrap();
    let mut ctx = Builder::new(Workspace::construct(&Some(path), &[], None))
        .build(&file)
        .unwrap();
    let pm = PassManager::default_passes().unwrap();
    pm.execute_plan(&mut ctx, &["all".to_string()], &[]).unwrap();
    ctx
}

fn generate(instr: &str) -> String {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build(dir.path(), instr);
    let mut buf = Vec::new();
    CBackend::generate(&ctx, &FakeRuntime, Box::new(&mut buf), "Test.c")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn state_machine_visits_every_instance() {
    let out = generate(
        "DEFINE INSTRUMENT T(E = 1)
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT s = Slit(w = E) AT (0,0,1) RELATIVE a
END
",
    );
    assert!(out.contains("if (!ABSORBED && _particle->_index == 1) {"));
    assert!(out.contains("if (!ABSORBED && _particle->_index == 2) {"));
    assert!(out.contains("class_Slit_trace(&_s_var, _particle);"));
    assert!(out.contains(
        "if (_particle->_index > 2) ABSORBED++; /* absorbed when passed all components */"
    ));
    assert!(out.contains("  _s_var._parameters.w = _instrument_var._parameters.E;"));
    assert!(out.contains("  #define half (_comp->_parameters.half)"));
    assert!(out.ends_with("/* end of generated C code Test.c */\n"));
}

#[test]
fn header_includes_runtime_when_not_embedded() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
END
",
    );
    assert!(out.contains("#include \"share/mccode-r.h\""));
    assert!(!out.contains("/* runtime mccode-r.c */"));
    // The trailer is always copied in.
    assert!(out.contains("/* runtime mccode_main.c */"));
}

#[test]
fn type_routines_are_written_once() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT s1 = Slit() AT (0,0,1) RELATIVE a
COMPONENT s2 = Slit() AT (0,0,2) RELATIVE a
EXTEND
%{
  p *= 2;
%}
END
",
    );
    assert_eq!(out.matches("void class_Slit_trace(_class_Slit *_comp").count(), 1);
    assert_eq!(out.matches("_class_Slit *class_Slit_init(_class_Slit *_comp").count(), 1);
    assert!(out.contains("if (_comp->_index == 3) { // EXTEND 's2'"));
    assert!(out.contains("class_Slit_trace(&_s2_var, _particle); /* contains EXTEND code */"));
    assert!(out.contains("  class_Slit_init(&_s1_var);"));
    assert!(out.contains("  class_Slit_init(&_s2_var);"));
}

#[test]
fn string_parameter_copy() {
    let out = generate(
        "DEFINE INSTRUMENT T(string name = \"data\")
TRACE
COMPONENT s = Slit(file = name) AT (0,0,0) ABSOLUTE
END
",
    );
    assert!(out.contains("  char file[16384];"));
    assert!(out.contains("  _s_var._parameters.file[0]='\\0';"));
    assert!(out.contains("  else "));
}

#[test]
fn iterate_jump_uses_a_particle_counter() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
COMPONENT c = Origin() AT (0,0,1) RELATIVE b
JUMP b ITERATE 3
END
",
    );
    assert!(out.contains("  long Jump_c_b; /* the JUMP connection <from>_<to> */"));
    assert!(out.contains("  _particle->_logic.Jump_c_b=0;"));
    assert!(out.contains("if (++_particle->_logic.Jump_c_b < 3) { /* test for iteration */"));
    assert!(out.contains("        _particle->_index = 1;"));
    assert!(out.contains("      else _particle->_logic.Jump_c_b=0;"));
    assert!(out.contains("--> JUMP found at COMPONENT 3, c"));
}

#[test]
fn conditional_jump() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
JUMP NEXT(2) WHEN (x > 0)
COMPONENT b = Origin() AT (0,0,1) RELATIVE a
COMPONENT c = Origin() AT (0,0,1) RELATIVE b
END
",
    );
    assert!(out.contains("if (( x > 0 )) {/* conditional JUMP to NEXT_2 */"));
    assert!(out.contains("        _particle->_index=2;"));
}

#[test]
fn group_members_restore_or_absorb() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT g1 = Slit() AT (0,0,1) RELATIVE a GROUP choice
COMPONENT g2 = Slit() AT (0,0,1) RELATIVE a GROUP choice
COMPONENT d = Origin() AT (0,0,2) RELATIVE a
END
",
    );
    assert!(out.contains("      // GROUP choice: from g1 [2] to g2 [3]"));
    assert!(out.contains(
        "      if (SCATTERED) _particle->_index = 3; // when SCATTERED in GROUP: reach exit of GROUP after g2"
    ));
    assert!(out.contains(
        "      else particle_restore(_particle, &_particle_save); // not SCATTERED in GROUP, restore"
    ));
    assert!(out.contains(
        "      else ABSORBED=1; // not SCATTERED at last GROUP member: absorbed"
    ));
    assert!(out.contains(
        "        else ABSORBED=0; // not SCATTERED within GROUP: always tries next"
    ));
    assert!(out.contains(
        "      mccoordschange(_g2_var._position_relative, _g2_var._rotation_relative, &_particle_save);"
    ));
}

#[test]
fn split_loops_over_the_rest_of_the_instrument() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
SPLIT 10 COMPONENT s = Slit() AT (0,0,1) RELATIVE a
COMPONENT d = Origin() AT (0,0,2) RELATIVE a
END
",
    );
    assert!(out.contains("    int SplitS_s = 10;"));
    assert!(out.contains(
        "    for (Split_s_counter = 0; Split_s_counter< SplitS_s; Split_s_counter++) {"
    ));
    assert!(out.contains("      p /= SplitS_s > 0 ? SplitS_s : 1;"));
    assert!(out.contains("    } /* end SPLIT at s */"));
    let closer = out.find("} /* end SPLIT at s */").unwrap();
    let last = out.find("} /* end component d [3] */").unwrap();
    assert!(last < closer);
    assert!(out.contains("livebatchsize = mc_partition_live(particles, pbuffer, livebatchsize);"));
}

#[test]
fn funnel_switches_loops_for_cpu_components() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
CPU COMPONENT b = Slit() AT (0,0,1) RELATIVE a
COMPONENT c = Origin() AT (0,0,2) RELATIVE a
END
",
    );
    let funnel = &out[out.find("void raytrace_all_funnel").unwrap()..];
    assert_eq!(funnel.matches("    #pragma acc parallel loop device_type(host)").count(), 1);
    assert_eq!(
        funnel.matches("for (unsigned long pidx=0 ; pidx < livebatchsize ; pidx++) {").count(),
        4
    );
    assert!(out.contains("#ifdef FUNNEL"));
    assert!(out.contains("#endif // FUNNEL"));
}

#[test]
fn inert_instances_skip_their_transform() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
COMPONENT c = Origin() AT (0,0,1) RELATIVE b
END
",
    );
    assert!(!out.contains("DEBUG_COMP(_b_var._name);"));
    assert!(out.contains("DEBUG_COMP(_c_var._name);"));
    // The relative placement of c is taken from a, the last instance
    // entered.
    assert!(out.contains(
        "    tc1 = coords_sub(_a_var._position_absolute, _c_var._position_absolute);"
    ));
    // Arm has no TRACE: no call.
    assert!(!out.contains("class_Arm_trace"));
}

#[test]
fn parameter_without_default_has_empty_default() {
    let out = generate(
        "DEFINE INSTRUMENT T(E, lambda / \"AA\" = 2)
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
END
",
    );
    assert!(out.contains(
        "  \"E\", &(_instrument_var._parameters.E), instr_type_double, \"\", \"\","
    ));
    assert!(out.contains(
        "  \"lambda\", &(_instrument_var._parameters.lambda), instr_type_double, \"2\", \"AA\","
    ));
    assert!(out.contains("int numipar = 2;"));
}

#[test]
fn json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = build(
        dir.path(),
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT s = Slit() AT (0,0,1) RELATIVE a
END
",
    );
    let path = dir.path().join("T.json");
    JsonBackend
        .run(&ctx, OutputFile::file(path.clone()))
        .unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value["instrument"]["name"], "T");
    assert_eq!(value["instrument"]["instances"][1]["name"], "s");
    assert_eq!(value["components"].as_array().unwrap().len(), 2);
}

#[test]
fn static_vector_holds_the_longest_list() {
    let out = generate(
        "DEFINE INSTRUMENT T()
TRACE
COMPONENT a = Origin() AT (0,0,0) ABSOLUTE
COMPONENT l1 = Lens(coef = {1, 2}) AT (0,0,1) RELATIVE a
COMPONENT l2 = Lens(coef = {1, 2, 3, 4}) AT (0,0,2) RELATIVE a
END
",
    );
    assert!(out.contains("  MCNUM coef[4];"));
    assert!(out.contains("  _l2_var._parameters.coef[3] = 4;"));
}
