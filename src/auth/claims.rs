//! Claim-based authorization.
//!
//! A [`ClaimSet`] is a conjunction of required `name = value` claims. An
//! [`AuthorizationPolicy`] is a disjunction of claim sets: a user is
//! authorized when every claim of at least one set is present in their
//! verified token with exactly the required value.
//!
//! ```text
//! policy  = [{role: admin}, {team: ops, level: 2}]
//! claims  = {team: ops, level: 2, sub: 42}   → authorized (second set)
//! claims  = {team: ops}                      → rejected
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::error::ConfigError;

// =============================================================================
// Verified Claims
// =============================================================================

/// Claims taken from a verified identity token.
///
/// String claims keep their value; booleans and numbers are stored as their
/// JSON rendering (`true`, `2`). Arrays, objects and nulls cannot be matched
/// against a literal value and are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedClaims(BTreeMap<String, String>);

impl VerifiedClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the top-level members of a JSON object.
    pub fn from_json(claims: &serde_json::Map<String, Value>) -> Self {
        let values = claims
            .iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => return None,
                };
                Some((name.clone(), value))
            })
            .collect();
        Self(values)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VerifiedClaims {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Claim Set
// =============================================================================

/// A non-empty set of claims that must all match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet(BTreeMap<String, String>);

impl ClaimSet {
    /// Create a claim set; an empty map is rejected.
    pub fn new(claims: BTreeMap<String, String>) -> Result<Self, ConfigError> {
        if claims.is_empty() {
            return Err(ConfigError::EmptyClaimSet);
        }
        Ok(Self(claims))
    }

    /// Parse `name=value` pairs separated by commas, e.g. `team=ops,level=2`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut claims = BTreeMap::new();

        for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidClaim(pair.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidClaim(pair.to_string()));
            }
            claims.insert(name.to_string(), value.trim().to_string());
        }

        Self::new(claims)
    }

    /// Whether every claim in this set is present in `claims` with the same value.
    pub fn is_satisfied_by(&self, claims: &VerifiedClaims) -> bool {
        self.0
            .iter()
            .all(|(name, required)| claims.get(name) == Some(required.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for ClaimSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

// =============================================================================
// Authorization Policy
// =============================================================================

/// A non-empty list of alternative claim sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy(Vec<ClaimSet>);

impl AuthorizationPolicy {
    /// Create a policy; an empty list is rejected.
    pub fn new(sets: Vec<ClaimSet>) -> Result<Self, ConfigError> {
        if sets.is_empty() {
            return Err(ConfigError::EmptyPolicy);
        }
        Ok(Self(sets))
    }

    /// Whether any claim set is fully satisfied by `claims`.
    pub fn satisfies(&self, claims: &VerifiedClaims) -> bool {
        self.0.iter().any(|set| set.is_satisfied_by(claims))
    }

    pub fn claim_sets(&self) -> &[ClaimSet] {
        &self.0
    }

    /// Distinct claim names referenced by the policy, in sorted order.
    ///
    /// These are requested as additional scopes so the provider releases
    /// the claims the policy needs.
    pub fn scopes(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|set| set.names())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Whether `claims` satisfy `policy`. See [`AuthorizationPolicy::satisfies`].
pub fn satisfies(policy: &AuthorizationPolicy, claims: &VerifiedClaims) -> bool {
    policy.satisfies(claims)
}
