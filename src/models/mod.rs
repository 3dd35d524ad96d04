pub mod agent;
pub mod property;

pub use agent::{Agent, NewAgent};
pub use property::{NewProperty, Property, PropertyInquiries};

/// Generate a random opaque identifier (16 hex chars)
pub fn generate_id() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    format!("{:016x}", rng.random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_id(), generate_id());
    }
}
