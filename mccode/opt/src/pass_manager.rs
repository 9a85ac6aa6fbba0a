//! Define the PassManager structure that is used to construct and run
//! passes.
use crate::traversal;
use mccode_ir::Context;
use mccode_utils::{Error, MultiError};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::time::Instant;

pub type PassResult<T> = std::result::Result<T, MultiError>;

/// Top-level type for all passes that transform a [Context]
pub type PassClosure = Box<dyn Fn(&mut Context) -> PassResult<()>>;

/// Structure that tracks all registered passes for the compiler.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes
    passes: HashMap<String, PassClosure>,
    /// Tracks alias for groups of passes that run together.
    aliases: HashMap<String, Vec<String>>,
    // Track the help information for passes
    help: HashMap<String, String>,
}

impl PassManager {
    /// Register a new pass and return an error if another pass with the
    /// same name has already been registered.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut pm = PassManager::default();
    /// pm.register_pass::<SkipTransforms>()?;
    /// ```
    pub fn register_pass<Pass>(&mut self) -> PassResult<()>
    where
        Pass:
            traversal::Visitor + traversal::ConstructVisitor + traversal::Named,
    {
        self.register_generic_pass::<Pass>(Box::new(|ctx| {
            Pass::do_pass_default(ctx)?;
            Ok(())
        }))
    }

    /// Registers a diagnostic pass as a normal pass. If there are errors,
    /// all of them are reported together. Warnings are only shown when
    /// there is no error.
    pub fn register_diagnostic<Pass>(&mut self) -> PassResult<()>
    where
        Pass: traversal::Visitor
            + traversal::ConstructVisitor
            + traversal::Named
            + traversal::DiagnosticPass,
    {
        self.register_generic_pass::<Pass>(Box::new(|ctx| {
            let mut visitor = Pass::from(ctx)?;
            visitor.do_pass(ctx)?;

            let errors: Vec<_> =
                visitor.diagnostics().errors_iter().cloned().collect();
            if !errors.is_empty() {
                Err(MultiError::from(errors))
            } else {
                visitor.diagnostics().warning_iter().for_each(
                    |warning| log::warn!(target: Pass::name(), "{warning:?}"),
                );
                Ok(())
            }
        }))
    }

    fn register_generic_pass<Pass>(
        &mut self,
        pass_closure: PassClosure,
    ) -> PassResult<()>
    where
        Pass:
            traversal::Visitor + traversal::ConstructVisitor + traversal::Named,
    {
        let name = Pass::name().to_string();
        if self.passes.contains_key(&name) {
            return Err(Error::misc(format!(
                "Pass with name '{}' is already registered.",
                name
            ))
            .into());
        }
        self.passes.insert(name.clone(), pass_closure);
        let mut help = format!("- {}: {}", name, Pass::description());
        for opt in Pass::opts() {
            let _ = write!(
                &mut help,
                "\n  * {}: {} (default: {})",
                opt.name(),
                opt.description(),
                opt.default()
            );
        }
        self.help.insert(name, help);
        Ok(())
    }

    /// Adds a new alias for groups of passes. An alias is a list of strings
    /// that represent valid pass names OR an alias.
    /// The passes and aliases are executed in the order of specification.
    pub fn add_alias(
        &mut self,
        name: String,
        passes: Vec<String>,
    ) -> PassResult<()> {
        if self.aliases.contains_key(&name) {
            return Err(Error::misc(format!(
                "Alias with name '{}'  already registered.",
                name
            ))
            .into());
        }
        // Expand any aliases used in defining this alias.
        let mut all_passes = Vec::with_capacity(passes.len());
        for pass in passes {
            if let Some(expanded) = self.aliases.get(&pass) {
                all_passes.extend(expanded.iter().cloned());
            } else if self.passes.contains_key(&pass) {
                all_passes.push(pass);
            } else {
                return Err(Error::misc(format!(
                    "No pass or alias named: {}",
                    pass
                ))
                .into());
            }
        }
        self.aliases.insert(name, all_passes);
        Ok(())
    }

    /// Return the help string for a specific pass.
    pub fn specific_help(&self, pass: &str) -> Option<String> {
        self.help.get(pass).cloned().or_else(|| {
            self.aliases.get(pass).map(|passes| {
                let pass_str = passes
                    .iter()
                    .map(|p| format!("- {p}"))
                    .collect::<Vec<String>>()
                    .join("\n");
                format!("`{pass}' is an alias for pass pipeline:\n{}", pass_str)
            })
        })
    }

    /// Return a string representation to show all available passes and
    /// aliases. Appropriate for help text.
    pub fn complete_help(&self) -> String {
        let mut ret = String::with_capacity(1000);

        // Push all passes.
        let mut pass_names = self.passes.keys().collect::<Vec<_>>();
        pass_names.sort();
        ret.push_str("Passes:\n");
        pass_names.iter().for_each(|&pass| {
            let _ = writeln!(ret, "{}", self.help[pass]);
        });

        // Push all aliases
        let mut aliases = self.aliases.iter().collect::<Vec<_>>();
        aliases.sort_by(|kv1, kv2| kv1.0.cmp(kv2.0));
        ret.push_str("\nAliases:\n");
        aliases.iter().for_each(|(alias, passes)| {
            let _ = writeln!(ret, "- {}: {}", alias, passes.join(", "));
        });
        ret
    }

    /// Attempts to resolve the alias name. If there is no alias with this
    /// name, assumes that this is a pass instead.
    fn resolve_alias(&self, maybe_alias: &str) -> Vec<String> {
        self.aliases
            .get(maybe_alias)
            .cloned()
            .unwrap_or_else(|| vec![maybe_alias.to_string()])
    }

    /// Creates a plan using an inclusion and exclusion list which might
    /// contain aliases.
    fn create_plan(
        &self,
        incls: &[String],
        excls: &[String],
    ) -> PassResult<(Vec<String>, HashSet<String>)> {
        // Incls and excls can have aliases in them. Resolve them.
        let passes = incls
            .iter()
            .flat_map(|maybe_alias| self.resolve_alias(maybe_alias))
            .collect::<Vec<_>>();

        let excl_set = excls
            .iter()
            .flat_map(|maybe_alias| self.resolve_alias(maybe_alias))
            .collect::<HashSet<String>>();

        // Validate that names of passes in incl and excl sets are known
        passes.iter().chain(excl_set.iter()).try_for_each(|pass| {
            if !self.passes.contains_key(pass) {
                Err(Error::misc(format!(
                    "Unknown pass: {pass}. Run the compiler with --list-passes to view registered passes."
                )))
            } else {
                Ok(())
            }
        })?;

        Ok((passes, excl_set))
    }

    /// Executes a given "plan" constructed using the incl and excl lists.
    pub fn execute_plan(
        &self,
        ctx: &mut Context,
        incl: &[String],
        excl: &[String],
    ) -> PassResult<()> {
        let (passes, excl_set) = self.create_plan(incl, excl)?;

        for name in passes {
            if excl_set.contains(&name) {
                log::info!("{name}: Ignored");
                continue;
            }
            // Pass is known to exist because create_plan validates the
            // names of passes.
            let pass = &self.passes[&name];
            let start = Instant::now();
            pass(ctx)?;
            let elapsed = start.elapsed();
            // Warn if pass takes more than 5 seconds.
            if elapsed.as_secs() > 5 {
                log::warn!("{name}: {}ms", elapsed.as_millis());
            } else {
                log::info!("{name}: {}ms", elapsed.as_millis());
            }
        }

        Ok(())
    }
}

/// Simple macro to register an alias with a pass manager.
///
/// ## Example
/// ```rust,ignore
/// let mut pm = PassManager::default();
/// register_alias!(pm, "validate", [WellFormed, ResolveJumps]);
/// ```
#[macro_export]
macro_rules! register_alias {
    (@unwrap_name $pass:ident) => {
        $pass::name().to_string()
    };

    (@unwrap_name $pass:literal) => {
        $pass.to_string()
    };

    ($manager:expr, $alias:literal, [ $($pass:tt),* $(,)? ]) => {
        $manager.add_alias($alias.to_string(), vec![
            $(register_alias!(@unwrap_name $pass)),*
        ])?;
    };
}

#[cfg(test)]
mod tests {
    use super::PassManager;

    #[test]
    fn alias_of_unknown_pass() {
        let mut pm = PassManager::default_passes().unwrap();
        let err = pm
            .add_alias("broken".to_string(), vec!["nope".to_string()])
            .unwrap_err();
        assert!(err.errors()[0].message().contains("nope"));
        assert!(pm.specific_help("broken").is_none());
    }

    #[test]
    fn aliases_expand_nested_aliases() {
        let pm = PassManager::default_passes().unwrap();
        let help = pm.specific_help("all").unwrap();
        assert!(help.contains("- well-formed"), "{help}");
        assert!(help.contains("- funnel-check"), "{help}");
        let complete = pm.complete_help();
        assert!(complete.contains("* keep-all"), "{complete}");
    }
}
