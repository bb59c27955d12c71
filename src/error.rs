// Typed error taxonomy for the physics core.
//
// Numerical pathologies inside a tick (non-finite positions, NaN density) are
// clamped by the solver/resolver rather than raised here -- see the clamps in
// `sph.rs` and `resolver.rs`. This enum only covers what's rejected at
// admission or reported back to an orchestrator.

#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("invalid configuration: {0}")]
    ConfigurationError(String),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
