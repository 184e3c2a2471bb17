use std::time::Duration;

/// Named TTL policies, one per cache-entry kind.
///
/// Volatile data (search results) expires quickly; stable data (movie
/// details) lives longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlPolicy {
    ActorProfile,
    ActorMovies,
    SearchResults,
    ActorComparison,
    ActorName,
    HealthCheck,
    MovieDetails,
}

impl TtlPolicy {
    /// The time-to-live this policy assigns.
    pub fn duration(&self) -> Duration {
        let secs = match self {
            TtlPolicy::ActorProfile => 1800,
            TtlPolicy::ActorMovies => 600,
            TtlPolicy::SearchResults => 300,
            TtlPolicy::ActorComparison => 900,
            TtlPolicy::ActorName => 1800,
            TtlPolicy::HealthCheck => 60,
            TtlPolicy::MovieDetails => 3600,
        };
        Duration::from_secs(secs)
    }
}

/// TTL specification for a cache write.
///
/// Resolution order: explicit duration, then named policy, then the
/// manager's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Explicit(Duration),
    Policy(TtlPolicy),
    Default,
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::Explicit(ttl)
    }
}

impl From<TtlPolicy> for Ttl {
    fn from(policy: TtlPolicy) -> Self {
        Ttl::Policy(policy)
    }
}

impl Ttl {
    /// Resolves to a concrete duration, falling back to `default`.
    pub fn resolve(self, default: Duration) -> Duration {
        match self {
            Ttl::Explicit(ttl) => ttl,
            Ttl::Policy(policy) => policy.duration(),
            Ttl::Default => default,
        }
    }
}
