use crate::Exp;
use mccode_utils::{GPosIdx, Id, WithPos};
use strum_macros::{Display, EnumIter, EnumString};

/// Type of a formal parameter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ParamType {
    #[default]
    Double,
    Int,
    String,
    Vector,
    /// Component parameters only: a name passed through unchanged.
    Symbol,
}

impl ParamType {
    /// Resolve the type written in front of a formal. `char *` is a string
    /// and `double *` a vector. Returns `None` for anything else, or for a
    /// `symbol` outside of a component.
    pub fn resolve(name: &str, pointer: bool, component: bool) -> Option<Self> {
        if pointer {
            return match name {
                "char" => Some(ParamType::String),
                "double" => Some(ParamType::Vector),
                _ => None,
            };
        }
        match name.parse::<ParamType>().ok()? {
            ParamType::Symbol if !component => None,
            ParamType::Vector if !component => None,
            ty => Some(ty),
        }
    }

    /// C type used for values of this type.
    pub fn c_type(&self) -> &'static str {
        match self {
            ParamType::Double => "MCNUM",
            ParamType::Int => "int",
            ParamType::String => "char*",
            ParamType::Vector => "MCNUM*",
            ParamType::Symbol => "double",
        }
    }

    /// Tag of the type in the instrument parameter table.
    pub fn tag(&self) -> &'static str {
        match self {
            ParamType::Double => "instr_type_double",
            ParamType::Int => "instr_type_int",
            ParamType::String => "instr_type_string",
            ParamType::Vector => "instr_type_vector",
            ParamType::Symbol => "instr_type_symbol",
        }
    }
}

/// A DEFINITION, SETTING or OUTPUT parameter of a component.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CompFormal {
    pub name: Id,
    pub ty: ParamType,
    pub default: Option<Exp>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl WithPos for CompFormal {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// A parameter of the instrument, set when the simulation is started.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct InstrFormal {
    /// Empty when the parameter was overridden by a later one of the same
    /// name.
    pub name: Id,
    pub ty: ParamType,
    pub default: Option<Exp>,
    pub unit: Option<String>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl InstrFormal {
    pub fn is_active(&self) -> bool {
        !self.name.as_str().is_empty()
    }
}

impl WithPos for InstrFormal {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::ParamType;

    #[test]
    fn resolve_types() {
        assert_eq!(ParamType::resolve("int", false, true), Some(ParamType::Int));
        assert_eq!(
            ParamType::resolve("char", true, false),
            Some(ParamType::String)
        );
        assert_eq!(
            ParamType::resolve("double", true, false),
            Some(ParamType::Vector)
        );
        assert_eq!(
            ParamType::resolve("symbol", false, true),
            Some(ParamType::Symbol)
        );
        assert_eq!(ParamType::resolve("symbol", false, false), None);
        assert_eq!(ParamType::resolve("float", false, true), None);
        assert_eq!(ParamType::Vector.to_string(), "vector");
    }
}
