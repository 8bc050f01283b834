/// Deterministic idempotency keys
use sha2::{Digest, Sha256};

/// Hex SHA-256 over the components, separated so that ("ab", "c") != ("a", "bc")
pub fn generate_idempotency_key(components: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for component in components {
        hasher.update(component.as_bytes());
        hasher.update([0u8]);
    }
    let result = hasher.finalize();
    format!("{:x}", result)
}
