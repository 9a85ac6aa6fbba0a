use crate::traversal::{
    Action, DiagnosticContext, DiagnosticPass, Named, VisResult, Visitor,
};
use itertools::Itertools;
use mccode_ir::{
    CompFormal, ComponentDefinition, ComponentInstance, Context, InstIdx,
};
use mccode_utils::{Error, Id};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashSet;

/// Pass to check if the instrument is well-formed.
///
/// Catches the following errors:
/// 1. A parameter name repeated in the DEFINITION, SETTING or OUTPUT list of
///    a component, or shared by its DEFINITION and SETTING lists.
/// 2. Empty parameter names.
/// 3. Instrument parameters declared twice after the "later wins" policy
///    was applied.
/// 4. Instances whose bindings do not match the formals of their type.
/// 5. GROUPs that are not a contiguous run of at least two instances.
/// 6. SPLIT on a GROUP member other than the first.
/// 7. Placement references to the instance itself or to a later instance.
#[derive(Default)]
pub struct WellFormed {
    /// Placement reference graph: an edge `r -> i` when `i` is placed or
    /// rotated relative to `r`.
    placement: DiGraphMap<InstIdx, ()>,
    /// Diagnostic context for reporting multiple errors
    diag: DiagnosticContext,
}

impl Named for WellFormed {
    fn name() -> &'static str {
        "well-formed"
    }

    fn description() -> &'static str {
        "Check that the instrument and its components are well-formed"
    }
}

impl DiagnosticPass for WellFormed {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl WellFormed {
    /// Report names repeated in `formals`.
    fn unique_names<'a>(
        &mut self,
        formals: impl Iterator<Item = &'a CompFormal>,
        kind: &str,
        comp: Id,
    ) {
        let mut seen = HashSet::new();
        for formal in formals {
            if formal.name.as_str().is_empty() {
                self.diag.err(
                    Error::malformed_structure(format!(
                        "Empty parameter name in {kind} PARAMETERS of component {comp}"
                    ))
                    .with_pos(formal),
                );
            } else if !seen.insert(formal.name) {
                self.diag.err(
                    Error::misc(format!(
                        "Parameter name {} is used multiple times in {kind} PARAMETERS of component {comp}",
                        formal.name
                    ))
                    .with_pos(formal),
                );
            }
        }
    }

    fn check_definition(&mut self, def: &ComponentDefinition) {
        self.unique_names(def.def_par.iter(), "DEFINITION", def.name);
        self.unique_names(def.set_par.iter(), "SETTING", def.name);
        self.unique_names(def.out_par.iter(), "OUTPUT", def.name);

        let defs: HashSet<Id> = def.def_par.iter().map(|f| f.name).collect();
        for formal in def.set_par.iter().filter(|f| defs.contains(&f.name)) {
            self.diag.err(
                Error::misc(format!(
                    "Parameter name {} is used in both DEFINITION and SETTING PARAMETERS of component {}",
                    formal.name, def.name
                ))
                .with_pos(formal),
            );
        }
    }

    /// Check that `bound` has exactly one entry per formal.
    fn check_bindings<'a>(
        &mut self,
        inst: &ComponentInstance,
        formals: &[CompFormal],
        bound: impl Iterator<Item = &'a Id>,
        kind: &str,
    ) {
        let bound = bound.copied().collect_vec();
        for formal in formals {
            if !bound.contains(&formal.name) {
                self.diag.err(
                    Error::malformed_structure(format!(
                        "{kind} parameter {} of component {}={}() has no value",
                        formal.name, inst.name, inst.type_name
                    ))
                    .with_pos(inst),
                );
            }
        }
        for name in bound {
            if !formals.iter().any(|f| f.name == name) {
                self.diag.err(
                    Error::malformed_structure(format!(
                        "Component {}={}() binds {name}, which is not one of its {kind} parameters",
                        inst.name, inst.type_name
                    ))
                    .with_pos(inst),
                );
            }
        }
    }

    fn check_placement_ref(
        &mut self,
        inst: &ComponentInstance,
        reference: Option<InstIdx>,
        what: &str,
    ) {
        let Some(r) = reference else {
            return;
        };
        if r >= inst.index {
            self.diag.err(
                Error::malformed_structure(format!(
                    "{what} of component {} refers to component {r}, which is not placed before it",
                    inst.name
                ))
                .with_pos(inst),
            );
        }
        self.placement.add_edge(r, inst.index, ());
    }

    fn check_groups(&mut self, ctx: &Context) {
        let instr = &ctx.instrument;
        for group in &instr.groups {
            if group.members.len() < 2 {
                self.diag.err(
                    Error::misc(format!(
                        "GROUP {} has only one member ({}). A GROUP needs at least two components.",
                        group.name, group.first.0
                    ))
                    .with_pos(group),
                );
            }
            let contiguous = group
                .members
                .iter()
                .tuple_windows()
                .all(|(a, b)| b.get() == a.get() + 1);
            if !contiguous {
                self.diag.err(
                    Error::malformed_structure(format!(
                        "Members of GROUP {} must be consecutive components (from {} to {})",
                        group.name, group.first.0, group.last.0
                    ))
                    .with_pos(group),
                );
            }
            for member in group.members.iter().skip(1) {
                let inst = instr.get(*member);
                if inst.split.is_some() {
                    self.diag.err(
                        Error::misc(format!(
                            "Component {}={}() is in GROUP {} and has a SPLIT. Only the first component of a GROUP may impose SPLIT.",
                            inst.name, inst.type_name, group.name
                        ))
                        .with_pos(inst),
                    );
                }
            }
        }
    }
}

impl Visitor for WellFormed {
    fn start(&mut self, ctx: &mut Context) -> VisResult {
        for (_, def) in ctx.definitions.iter() {
            self.check_definition(def);
        }

        let mut seen = HashSet::new();
        for formal in ctx.instrument.params() {
            if !seen.insert(formal.name) {
                self.diag.err(
                    Error::malformed_structure(format!(
                        "Instrument parameter {} is declared more than once",
                        formal.name
                    ))
                    .with_pos(formal),
                );
            }
        }
        Ok(Action::Continue)
    }

    fn instance(
        &mut self,
        inst: &mut ComponentInstance,
        def: &ComponentDefinition,
    ) -> VisResult {
        self.check_bindings(
            inst,
            &def.def_par,
            inst.defpar.keys(),
            "DEFINITION",
        );
        self.check_bindings(inst, &def.set_par, inst.setpar.keys(), "SETTING");
        self.placement.add_node(inst.index);
        self.check_placement_ref(inst, inst.position.place_rel, "Position");
        self.check_placement_ref(
            inst,
            inst.position.orientation_rel,
            "Orientation",
        );
        Ok(Action::Continue)
    }

    fn finish(&mut self, ctx: &mut Context) -> VisResult {
        self.check_groups(ctx);
        if is_cyclic_directed(&self.placement) {
            self.diag.err(
                Error::malformed_structure(
                    "Component placements refer to each other in a cycle",
                )
                .with_pos(&ctx.instrument),
            );
        }
        Ok(Action::Continue)
    }
}
