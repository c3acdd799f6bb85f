//! Paths that never require authentication.

/// Built-in allow-list: sign-up, both login flows, route refresh and the
/// temporary queue endpoints.
pub const DEFAULT_ALLOW_LIST: [&str; 7] = [
    "/auth/signup",
    "/auth/login/root",
    "/auth/login/iam",
    "/routes/refresh-routes",
    "/temporary-queue/queue/add",
    "/temporary-queue/queue/consume",
    "/temporary-queue/queue/ranks",
];

/// Ordered set of exact request paths exempt from authentication.
///
/// Matching is exact: no prefix, no trailing-slash folding, no case folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    paths: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !out.contains(&path) {
                out.push(path);
            }
        }
        Self { paths: out }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOW_LIST)
    }
}
