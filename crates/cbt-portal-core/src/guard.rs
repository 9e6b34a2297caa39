//! Declarative role-based route guarding.
//!
//! One table decides, for any path, whether the current session may
//! enter it. Dashboards no longer repeat their own redirect logic.

use crate::auth::Session;
use crate::models::Role;

/// Where `GuardDecision::RedirectToLogin` sends the user
pub const LOGIN_PATH: &str = "/login";

const PUBLIC_PREFIXES: &[&str] = &[
    LOGIN_PATH,
    "/register",
    "/forgot-password",
    "/reset-password",
    "/auth/verify-email",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    /// Send the user to this path instead (usually their dashboard)
    RedirectTo(String),
}

#[derive(Debug, Clone)]
struct RoleRule {
    prefix: String,
    roles: Vec<Role>,
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    public: Vec<String>,
    rules: Vec<RoleRule>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new()
            .rule("/dashboard/admin", &[Role::Admin])
            .rule("/dashboard/lecturer", &[Role::Lecturer])
            .rule("/dashboard/student", &[Role::Student])
    }
}

impl RouteGuard {
    /// Guard with the standard public pages and no role rules
    pub fn new() -> Self {
        Self {
            public: PUBLIC_PREFIXES.iter().map(|p| p.to_string()).collect(),
            rules: Vec::new(),
        }
    }

    /// Restrict paths under `prefix` to `roles`. The longest matching prefix wins.
    pub fn rule(mut self, prefix: &str, roles: &[Role]) -> Self {
        self.rules.push(RoleRule {
            prefix: prefix.trim_end_matches('/').to_string(),
            roles: roles.to_vec(),
        });
        self.rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|prefix| matches_prefix(path, prefix))
    }

    pub fn check(&self, path: &str, session: &Session) -> GuardDecision {
        if path == "/" {
            return GuardDecision::Allow;
        }

        let role = session
            .is_authenticated
            .then(|| session.role())
            .flatten();

        if self.is_public(path) {
            // Signed-in users have no business on the auth pages
            return match role {
                Some(role) => GuardDecision::RedirectTo(role.home_path().to_string()),
                None => GuardDecision::Allow,
            };
        }

        let Some(role) = role else {
            return GuardDecision::RedirectToLogin;
        };

        match self.rules.iter().find(|rule| matches_prefix(path, &rule.prefix)) {
            Some(rule) if !rule.roles.contains(&role) => {
                GuardDecision::RedirectTo(role.home_path().to_string())
            }
            _ => GuardDecision::Allow,
        }
    }
}

/// Segment-aware prefix match: `/login` matches `/login/x` but not `/loginx`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}
