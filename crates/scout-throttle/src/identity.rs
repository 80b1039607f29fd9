use rand::Rng;

/// Common desktop user agents used when no pool is configured.
pub const DEFAULT_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Rotating pool of outbound identities (user-agent strings).
#[derive(Debug, Clone)]
pub struct IdentityPool {
    agents: Vec<String>,
    current: usize,
}

impl IdentityPool {
    /// Build a pool starting at a random entry. An empty list falls back to
    /// [`DEFAULT_USER_AGENTS`].
    #[must_use]
    pub fn new(agents: Vec<String>) -> Self {
        let agents = if agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(ToString::to_string).collect()
        } else {
            agents
        };
        let current = rand::thread_rng().gen_range(0..agents.len());
        Self { agents, current }
    }

    /// The identity in use.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.agents[self.current]
    }

    /// Switch to the next identity and return it.
    pub fn rotate(&mut self) -> &str {
        self.current = (self.current + 1) % self.agents.len();
        self.current()
    }

    /// Number of identities in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Always false; the pool falls back to defaults rather than being empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for IdentityPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool() {
        let pool = IdentityPool::default();
        assert_eq!(pool.len(), DEFAULT_USER_AGENTS.len());
        assert!(!pool.current().is_empty());
    }

    #[test]
    fn test_rotation_cycles_through_every_agent() {
        let mut pool = IdentityPool::new(vec!["a".into(), "b".into(), "c".into()]);
        let start = pool.current().to_string();
        let mut seen = vec![start.clone()];
        for _ in 0..2 {
            seen.push(pool.rotate().to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(pool.rotate(), start);
    }

    #[test]
    fn test_single_agent_pool_rotates_to_itself() {
        let mut pool = IdentityPool::new(vec!["only".into()]);
        assert_eq!(pool.rotate(), "only");
    }

    #[test]
    fn test_random_start_varies() {
        // Probabilistic, but ten identical starts across four agents is very unlikely
        let starts: Vec<_> = (0..10)
            .map(|_| IdentityPool::default().current().to_string())
            .collect();
        assert!(!starts.iter().all(|s| s == &starts[0]), "Expected variation in start identity");
    }
}
