use std::str::FromStr;

use crate::error::{Error, Result};

/// `owner/name` pair resolved from any of the accepted identifier forms:
/// `owner/name`, `https://github.com/owner/name[.git][/tree/...]`,
/// `github.com/owner/name`, `git@github.com:owner/name.git`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(identifier: &str) -> Result<Self> {
        let trimmed = identifier.trim();
        let invalid = || Error::InvalidRepository(identifier.to_string());

        let rest = if let Some(rest) = trimmed.strip_prefix("git@github.com:") {
            rest
        } else {
            let (had_scheme, no_scheme) = match trimmed
                .strip_prefix("https://")
                .or_else(|| trimmed.strip_prefix("http://"))
            {
                Some(rest) => (true, rest),
                None => (false, trimmed),
            };
            match no_scheme
                .strip_prefix("www.github.com/")
                .or_else(|| no_scheme.strip_prefix("github.com/"))
            {
                Some(rest) => rest,
                None if had_scheme => return Err(invalid()),
                None => no_scheme,
            }
        };

        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let owner = segments.next();
        let name = segments.next().map(|n| n.strip_suffix(".git").unwrap_or(n));

        match (owner, name) {
            (Some(owner), Some(name)) if is_valid_owner(owner) && is_valid_name(name) => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn is_valid_owner(owner: &str) -> bool {
    !owner.is_empty() && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepoRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
