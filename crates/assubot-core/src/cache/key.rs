use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identity of a cached query: the endpoint name plus its serialized args.
///
/// Rendered as `endpoint(args)`, e.g. `getContracts({"page":1,"limit":20})`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: String,
    args: String,
}

impl CacheKey {
    pub fn new<A: Serialize + ?Sized>(endpoint: &str, args: &A) -> Self {
        let args = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
        Self::raw(endpoint, args)
    }

    /// Key with pre-serialized args, taken as-is
    pub fn raw(endpoint: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            args: args.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn serialized_args(&self) -> &str {
        &self.args
    }

    /// Recover the original query args; `None` when they do not parse
    pub fn args<A: DeserializeOwned>(&self) -> Option<A> {
        serde_json::from_str(&self.args).ok()
    }

    /// Parse the `endpoint(args)` rendering back into a key
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let inner = s[open + 1..].strip_suffix(')')?;
        let endpoint = &s[..open];
        if endpoint.is_empty() {
            return None;
        }
        Some(Self::raw(endpoint, inner))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}

/// Args of single-entity queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityArgs {
    pub id: String,
}

impl EntityArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Contract,
    Template,
    Dashboard,
}

/// Invalidation label attached to cached queries.
///
/// `id: None` tags the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: Option<String>,
}

impl Tag {
    pub fn entity(kind: TagKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
        }
    }

    pub fn list(kind: TagKind) -> Self {
        Self { kind, id: None }
    }
}
