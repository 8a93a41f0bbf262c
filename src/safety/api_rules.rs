//! Path/method risk classification for management-API operations.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::risk::RiskLevel;

/// One row of the embedded (method, path-pattern, risk) table.
///
/// `pattern` segments written as `{name}` match any non-slash run; a match
/// is always full-path (anchored start to end).
#[derive(Debug, Clone, Copy)]
pub struct ApiSafetyRule {
    pub method: &'static str,
    pub pattern: &'static str,
    pub risk: RiskLevel,
}

/// A concrete management-API call: the payload stored in a pending
/// confirmation and passed to the safety manager for gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOperation {
    pub method: String,
    pub path: String,
    pub path_params: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

/// The closed rule table, evaluated in decreasing risk order so the
/// highest-risk matching pattern always wins.
pub struct RuleTable {
    rules: Vec<ApiSafetyRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleTable {
    pub fn new() -> Self {
        let mut rules = CANONICAL_RULES.to_vec();
        rules.sort_by(|a, b| b.risk.cmp(&a.risk));
        Self { rules }
    }

    /// Risk of the highest-risk rule whose method and pattern match; LOW if
    /// nothing matches.
    pub fn risk_of(&self, method: &str, path: &str) -> RiskLevel {
        self.rules
            .iter()
            .find(|rule| rule.method.eq_ignore_ascii_case(method) && pattern_matches(rule.pattern, path))
            .map(|rule| rule.risk)
            .unwrap_or(RiskLevel::Low)
    }

    /// `{risk -> {method -> [pattern]}}`, used by the help/rules surface.
    pub fn introspect(&self) -> BTreeMap<RiskLevel, BTreeMap<String, Vec<String>>> {
        let mut out: BTreeMap<RiskLevel, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for rule in &self.rules {
            out.entry(rule.risk)
                .or_default()
                .entry(rule.method.to_string())
                .or_default()
                .push(rule.pattern.to_string());
        }
        out
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    static CACHE: OnceLock<std::sync::Mutex<BTreeMap<String, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(Default::default);
    let mut guard = cache.lock().expect("rule regex cache poisoned");

    if !guard.contains_key(pattern) {
        let escaped = regex::escape(pattern);
        let templated = escaped.replace(r"\{", "{").replace(r"\}", "}");
        let mut body = String::with_capacity(templated.len() + 4);
        body.push('^');
        let mut rest = templated.as_str();
        while let Some(start) = rest.find('{') {
            body.push_str(&rest[..start]);
            let end = rest[start..].find('}').map(|i| start + i).unwrap_or(rest.len());
            body.push_str("[^/]+");
            rest = &rest[(end + 1).min(rest.len())..];
        }
        body.push_str(rest);
        body.push('$');
        let re = Regex::new(&body).expect("rule pattern compiles to a valid regex");
        guard.insert(pattern.to_string(), re);
    }

    guard.get(pattern).expect("just inserted").is_match(path)
}

macro_rules! rule {
    ($method:expr, $pattern:expr, $risk:ident) => {
        ApiSafetyRule {
            method: $method,
            pattern: $pattern,
            risk: RiskLevel::$risk,
        }
    };
}

static CANONICAL_RULES: &[ApiSafetyRule] = &[
    rule!("DELETE", "/v1/projects/{ref}", Extreme),
    rule!("DELETE", "/v1/projects/{ref}/branches/{branch_id}", High),
    rule!("DELETE", "/v1/projects/{ref}/branches", High),
    rule!("DELETE", "/v1/projects/{ref}/custom-hostname", High),
    rule!("DELETE", "/v1/projects/{ref}/vanity-subdomain", High),
    rule!("DELETE", "/v1/projects/{ref}/network-bans", High),
    rule!("DELETE", "/v1/projects/{ref}/secrets", High),
    rule!("DELETE", "/v1/projects/{ref}/functions/{function_slug}", High),
    rule!("DELETE", "/v1/projects/{ref}/api-keys/{id}", High),
    rule!(
        "DELETE",
        "/v1/projects/{ref}/config/auth/sso/providers/{provider_id}",
        High
    ),
    rule!(
        "DELETE",
        "/v1/projects/{ref}/config/auth/signing-keys/{id}",
        High
    ),
    rule!("POST", "/v1/projects/{ref}/pause", High),
    rule!("POST", "/v1/projects/{ref}/restore", High),
    rule!("POST", "/v1/projects/{ref}/upgrade", High),
    rule!("POST", "/v1/projects/{ref}/read-replicas/remove", High),
    rule!("POST", "/v1/projects/{ref}/restore/cancel", High),
    rule!(
        "POST",
        "/v1/projects/{ref}/readonly/temporary-disable",
        High
    ),
    rule!("POST", "/v1/projects", Medium),
    rule!("POST", "/v1/projects/{ref}/branches", Medium),
    rule!("PATCH", "/v1/projects/{ref}/branches/{branch_id}", Medium),
    rule!("POST", "/v1/projects/{ref}/custom-hostname", Medium),
    rule!("POST", "/v1/projects/{ref}/custom-hostname/initialize", Medium),
    rule!("POST", "/v1/projects/{ref}/vanity-subdomain", Medium),
    rule!("POST", "/v1/projects/{ref}/secrets", Medium),
    rule!("POST", "/v1/projects/{ref}/webhooks", Medium),
    rule!("PATCH", "/v1/projects/{ref}/webhooks", Medium),
    rule!("POST", "/v1/projects/{ref}/functions", Medium),
    rule!("PATCH", "/v1/projects/{ref}/functions/{function_slug}", Medium),
    rule!(
        "POST",
        "/v1/projects/{ref}/config/auth/sso/providers",
        Medium
    ),
    rule!(
        "PATCH",
        "/v1/projects/{ref}/config/auth/sso/providers/{provider_id}",
        Medium
    ),
    rule!("PATCH", "/v1/projects/{ref}/config/database/postgres", Medium),
    rule!("PATCH", "/v1/projects/{ref}/config/database/pooler", Medium),
    rule!("PATCH", "/v1/projects/{ref}/ssl-enforcement", Medium),
    rule!("POST", "/v1/projects/{ref}/database/query", Medium),
    rule!("POST", "/v1/oauth/token", Medium),
    rule!("POST", "/v1/oauth/revoke", Medium),
    rule!("POST", "/v1/projects/{ref}/api-keys", Medium),
    rule!("PATCH", "/v1/projects/{ref}/api-keys/{id}", Medium),
    rule!(
        "POST",
        "/v1/projects/{ref}/config/auth/signing-keys",
        Medium
    ),
    rule!(
        "PATCH",
        "/v1/projects/{ref}/config/auth/signing-keys/{id}",
        Medium
    ),
    rule!("PUT", "/v1/projects/{ref}/config/auth", Medium),
    rule!("PATCH", "/v1/projects/{ref}/config/auth", Medium),
];
