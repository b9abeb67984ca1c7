//! Fit-strategy selection policy.

use std::fmt;

/// Policy for choosing which free block satisfies an allocation request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitStrategy {
    /// First free block that fits, in address order.
    #[default]
    First,
    /// Smallest free block that fits; ties break toward lower addresses.
    Best,
    /// Largest free block that fits; ties break toward lower addresses.
    Worst,
}

impl FitStrategy {
    /// Parses the command spellings accepted by the harness.
    ///
    /// Case-sensitive. Unknown strings fall back to [`FitStrategy::First`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "first" | "first_fit" | "first-fit" | "firstfit" => Self::First,
            "best" | "best_fit" | "best-fit" | "bestfit" => Self::Best,
            "worst" | "worst_fit" | "worst-fit" | "worstfit" => Self::Worst,
            _ => Self::First,
        }
    }
}

impl fmt::Display for FitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Best => f.write_str("best"),
            Self::Worst => f.write_str("worst"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_first_spellings() {
        for s in ["first", "first_fit", "first-fit", "firstfit"] {
            assert_eq!(FitStrategy::parse(s), FitStrategy::First, "{s}");
        }
    }

    #[test]
    fn parse_best_spellings() {
        for s in ["best", "best_fit", "best-fit", "bestfit"] {
            assert_eq!(FitStrategy::parse(s), FitStrategy::Best, "{s}");
        }
    }

    #[test]
    fn parse_worst_spellings() {
        for s in ["worst", "worst_fit", "worst-fit", "worstfit"] {
            assert_eq!(FitStrategy::parse(s), FitStrategy::Worst, "{s}");
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(FitStrategy::parse("Best"), FitStrategy::First);
        assert_eq!(FitStrategy::parse("WORST"), FitStrategy::First);
    }

    #[test]
    fn parse_unknown_falls_back_to_first() {
        assert_eq!(FitStrategy::parse(""), FitStrategy::First);
        assert_eq!(FitStrategy::parse("buddy"), FitStrategy::First);
    }

    #[test]
    fn display_roundtrip() {
        for strat in [FitStrategy::First, FitStrategy::Best, FitStrategy::Worst] {
            assert_eq!(FitStrategy::parse(&strat.to_string()), strat);
        }
    }
}
