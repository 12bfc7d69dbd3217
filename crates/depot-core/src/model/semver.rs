//! Semantic version strings (`MAJOR.MINOR.PATCH[-pre][+build]`)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::version::ChangeType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl SemVer {
    pub const INITIAL: SemVer = SemVer::new(1, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    /// Next release for a change of the given kind; pre-release and build
    /// metadata are dropped
    pub fn bump(&self, change_type: ChangeType) -> SemVer {
        match change_type {
            ChangeType::Major => SemVer::new(self.major + 1, 0, 0),
            ChangeType::Minor => SemVer::new(self.major, self.minor + 1, 0),
            ChangeType::Patch | ChangeType::Hotfix => {
                SemVer::new(self.major, self.minor, self.patch + 1)
            }
        }
    }

    /// True for `X.0.0` releases
    pub fn is_milestone(&self) -> bool {
        self.minor == 0 && self.patch == 0 && self.pre.is_none()
    }
}

fn parse_numeric(part: &str, input: &str) -> Result<u64, String> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid numeric component '{}' in '{}'", part, input));
    }
    if part.len() > 1 && part.starts_with('0') {
        return Err(format!("leading zero in '{}' of '{}'", part, input));
    }
    part.parse::<u64>()
        .map_err(|e| format!("invalid numeric component '{}' in '{}': {}", part, input, e))
}

fn parse_identifiers(part: &str, input: &str) -> Result<String, String> {
    let valid = !part.is_empty()
        && part.split('.').all(|ident| {
            !ident.is_empty() && ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
    if valid {
        Ok(part.to_string())
    } else {
        Err(format!("invalid identifier '{}' in '{}'", part, input))
    }
}

impl FromStr for SemVer {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (rest, build) = match input.split_once('+') {
            Some((rest, build)) => (rest, Some(parse_identifiers(build, input)?)),
            None => (input, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(parse_identifiers(pre, input)?)),
            None => (rest, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(format!("expected MAJOR.MINOR.PATCH, got '{}'", input));
        }

        Ok(SemVer {
            major: parse_numeric(parts[0], input)?,
            minor: parse_numeric(parts[1], input)?,
            patch: parse_numeric(parts[2], input)?,
            pre,
            build,
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

// Build metadata does not take part in precedence; a release outranks its
// pre-releases.
impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
