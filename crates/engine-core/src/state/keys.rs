//! Key layout. Every concern is namespaced per entity.

use model::core::{entity::Entity, identifiers::RunId};

#[inline]
pub fn lock(entity: Entity) -> String {
    format!("lock:{entity}")
}

#[inline]
pub fn checkpoint(entity: Entity) -> String {
    format!("checkpoint:{entity}")
}

#[inline]
pub fn progress(entity: Entity) -> String {
    format!("progress:{entity}")
}

#[inline]
pub fn errors_prefix(entity: Entity, run_id: &RunId) -> String {
    format!("errors:{entity}:{run_id}:")
}

/// Zero-padded so a prefix scan returns records in fetch order.
#[inline]
pub fn error(entity: Entity, run_id: &RunId, position: u64) -> String {
    format!("{}{position:020}", errors_prefix(entity, run_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(lock(Entity::Products), "lock:products");
        assert_eq!(checkpoint(Entity::Orders), "checkpoint:orders");
        assert_eq!(progress(Entity::Customers), "progress:customers");
        assert_eq!(
            error(Entity::Products, &RunId::new("r1"), 7),
            "errors:products:r1:00000000000000000007"
        );
    }

    #[test]
    fn error_keys_sort_by_position() {
        let run = RunId::new("r");
        assert!(error(Entity::Orders, &run, 9) < error(Entity::Orders, &run, 10));
    }
}
