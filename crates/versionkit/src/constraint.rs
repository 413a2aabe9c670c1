//! Version constraint expressions and the satisfaction check
//!
//! A declared version is read, in priority order, as:
//!
//! 1. an exact version `X.Y.Z`
//! 2. a single pessimistic constraint `~>X.Y.Z`
//! 3. a comma-separated list of `<op> <version>` terms (`>= 3.0, != 3.1.0`),
//!    with `op` one of `=`, `!=`, `>`, `>=`, `<`, `<=` and `~>`; a term
//!    without an operator means `=`

use crate::error::{Error, Result};
use crate::version::DottedVersion;
use regex::Regex;
use std::sync::LazyLock;

static EXACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("valid regex"));

static PESSIMISTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<op>~>\s*)(?P<version>[0-9]+\.[0-9]+(?:\.[0-9]+)?)$").expect("valid regex")
});

/// Operators, longest spelling first so `>=` is not read as `>`.
const OPERATORS: [(&str, RangeOp); 7] = [
    ("~>", RangeOp::Pessimistic),
    (">=", RangeOp::Ge),
    ("<=", RangeOp::Le),
    ("!=", RangeOp::Ne),
    ("=", RangeOp::Eq),
    (">", RangeOp::Gt),
    ("<", RangeOp::Lt),
];

/// Comparison operator of a range term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Allows only the rightmost given component to grow
    Pessimistic,
}

/// One `<op> <version>` term of a range.
#[derive(Debug, Clone)]
pub struct RangeTerm {
    op: RangeOp,
    version: DottedVersion,
    /// Number of components written in the declaration
    precision: usize,
}

impl RangeTerm {
    fn parse(expression: &str, term: &str) -> Result<Self> {
        let term = term.trim();
        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(spelling, op)| term.strip_prefix(spelling).map(|rest| (*op, rest)))
            .unwrap_or((RangeOp::Eq, term));
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(Error::constraint(expression, format!("missing version in '{term}'")));
        }

        let numeric = rest.split(['-', '+']).next().unwrap_or(rest);
        let precision = numeric.split('.').count();
        let padded = if precision == 1 {
            format!("{numeric}.0{}", &rest[numeric.len()..])
        } else {
            rest.to_string()
        };
        let version = padded
            .parse()
            .map_err(|_| Error::constraint(expression, format!("invalid version in '{term}'")))?;
        Ok(Self {
            op,
            version,
            precision,
        })
    }

    fn matches(&self, candidate: &DottedVersion) -> bool {
        let version = &self.version;
        match self.op {
            RangeOp::Eq => candidate == version,
            RangeOp::Ne => candidate != version,
            RangeOp::Gt => candidate > version,
            RangeOp::Ge => candidate >= version,
            RangeOp::Lt => candidate < version,
            RangeOp::Le => candidate <= version,
            RangeOp::Pessimistic => {
                candidate >= version
                    && match self.precision {
                        1 | 2 => candidate.major() == version.major(),
                        _ => {
                            candidate.major() == version.major()
                                && candidate.minor() == version.minor()
                        }
                    }
            }
        }
    }
}

/// A parsed version expression.
#[derive(Debug, Clone)]
pub enum VersionConstraint {
    /// `X.Y.Z`
    Exact(DottedVersion),
    /// `~>X.Y.Z`; `operator` keeps the spelling used in the declaration
    Pessimistic {
        operator: String,
        version: DottedVersion,
    },
    /// Anything else; every term must match
    Range(Vec<RangeTerm>),
}

impl VersionConstraint {
    /// Parse a declared version expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstraintParse`] for an empty expression or one
    /// whose terms are not `<op> <version>`.
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(Error::constraint(expression, "empty version expression"));
        }

        if EXACT_RE.is_match(expression) {
            return Ok(Self::Exact(expression.parse()?));
        }

        if let Some(caps) = PESSIMISTIC_RE.captures(expression) {
            return Ok(Self::Pessimistic {
                operator: caps["op"].to_string(),
                version: caps["version"].parse()?,
            });
        }

        expression
            .split(',')
            .map(|term| RangeTerm::parse(expression, term))
            .collect::<Result<Vec<_>>>()
            .map(Self::Range)
    }

    /// Whether `newest` is already covered by this constraint.
    ///
    /// The pessimistic rule never accepts a lower minor version within the
    /// same major, but a strictly higher declared major always stands.
    #[must_use]
    pub fn is_satisfied_by(&self, newest: &DottedVersion) -> bool {
        match self {
            Self::Exact(current) => current >= newest,
            Self::Pessimistic {
                version: current, ..
            } => {
                current.major() > newest.major()
                    || (current.major() >= newest.major() && current.minor() >= newest.minor())
            }
            Self::Range(terms) => terms.iter().all(|term| term.matches(newest)),
        }
    }

    /// Whether this is a pessimistic constraint.
    #[must_use]
    pub fn is_pessimistic(&self) -> bool {
        matches!(self, Self::Pessimistic { .. })
    }

    /// Render a resolved version in the declaration's notation.
    ///
    /// Pessimistic constraints stay pessimistic after an upgrade.
    #[must_use]
    pub fn render(&self, version: &str) -> String {
        match self {
            Self::Pessimistic { operator, .. } => format!("{operator}{version}"),
            _ => version.to_string(),
        }
    }
}

/// Check a declared version expression against the newest known version.
///
/// A missing `newest` counts as satisfied; callers record that case as
/// "no version found" rather than "up to date".
///
/// # Errors
///
/// Returns [`Error::ConstraintParse`] when `current` cannot be parsed, or
/// [`Error::InvalidVersion`] when `newest` is not a dotted version.
pub fn satisfied(current: &str, newest: Option<&str>) -> Result<bool> {
    let constraint = VersionConstraint::parse(current)?;
    let Some(newest) = newest else {
        return Ok(true);
    };
    let newest: DottedVersion = strip_operator(newest).parse()?;
    Ok(constraint.is_satisfied_by(&newest))
}

/// Strip a leading pessimistic operator from a rendered version.
#[must_use]
pub fn strip_operator(version: &str) -> &str {
    version.trim().trim_start_matches("~>").trim_start()
}
