use itertools::Itertools;
use std::str::FromStr;

/// Enumeration of valid backends
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOpt {
    #[default]
    C,
    Json,
    None,
}

/// Return a vector that maps strings to Backends.
#[inline(always)]
fn backends() -> Vec<(&'static str, BackendOpt)> {
    vec![
        ("c", BackendOpt::C),
        ("json", BackendOpt::Json),
        ("none", BackendOpt::None),
    ]
}

/// Command line parsing for the Backend enum
impl FromStr for BackendOpt {
    type Err = String;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let backends = backends();
        let found_backend = backends
            .iter()
            .find(|(backend_name, _)| &input == backend_name);
        if let Some((_, opt)) = found_backend {
            Ok(*opt)
        } else {
            let backend_str = backends
                .iter()
                .map(|(name, _)| (*name).to_string())
                .join(", ");
            Err(format!(
                "`{}` is not a valid backend.\nValid backends: {}",
                input, backend_str
            ))
        }
    }
}

impl std::fmt::Display for BackendOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::C => "c",
            Self::Json => "json",
            Self::None => "none",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::BackendOpt;

    #[test]
    fn parse_backend_names() {
        assert_eq!("json".parse::<BackendOpt>(), Ok(BackendOpt::Json));
        assert_eq!(BackendOpt::default().to_string(), "c");
        let err = "verilog".parse::<BackendOpt>().unwrap_err();
        assert!(err.contains("Valid backends: c, json, none"));
    }
}
