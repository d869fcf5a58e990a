//! Physics error handling
//!
//! Error type for the solver and its public accessors, plus helpers that
//! replace `unwrap()` calls with proper error propagation.

/// Solver errors
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("Invalid entity handle: {id}")]
    InvalidEntity { id: u32 },

    #[error("Operation not supported: {operation}")]
    NotSupported { operation: String },

    #[error("Cannot create {kind} entity without particles")]
    EmptyEntity { kind: String },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Invalid {side} boundary plane: {reason}")]
    InvalidBoundary { side: String, reason: String },

    #[error("Force of kind {kind} already present")]
    ForceAlreadyPresent { kind: String },

    #[error("Capacity overflow in {structure}: capacity {capacity}, requested {requested}")]
    CapacityOverflow {
        structure: String,
        capacity: usize,
        requested: usize,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Type alias for solver operation results
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Helper trait for mapping foreign errors into configuration errors
pub trait PhysicsErrorContext<T> {
    fn physics_context(self, context: &str) -> PhysicsResult<T>;
}

impl<T, E> PhysicsErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn physics_context(self, context: &str) -> PhysicsResult<T> {
        self.map_err(|e| PhysicsError::Config {
            message: format!("{}: {}", context, e),
        })
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(name: &str, reason: impl std::fmt::Display) -> PhysicsError {
    PhysicsError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a capacity overflow error
pub fn capacity_overflow(structure: &str, capacity: usize, requested: usize) -> PhysicsError {
    PhysicsError::CapacityOverflow {
        structure: structure.to_string(),
        capacity,
        requested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_maps_to_config_error() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.physics_context("loading params").unwrap_err();
        match err {
            PhysicsError::Config { message } => {
                assert!(message.starts_with("loading params"));
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_messages() {
        let err = capacity_overflow("hash grid bucket", 4, 5);
        assert_eq!(
            err.to_string(),
            "Capacity overflow in hash grid bucket: capacity 4, requested 5"
        );
        assert_eq!(
            PhysicsError::InvalidEntity { id: 7 }.to_string(),
            "Invalid entity handle: 7"
        );
    }
}
