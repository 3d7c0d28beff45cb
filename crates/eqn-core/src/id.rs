use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a component (waiting system, discipline, collaborator)
    /// registered with the simulation.
    pub struct ComponentId;
}

/// Identifies a job. Unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

/// Job category, used by category-based dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct CategoryId(pub u32);

/// A named connection point on a component. Links are resolved by the
/// simulation, so components never hold each other's ids directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Port {
    /// Where finished or forwarded jobs go.
    Downstream,
    /// The waiting system a discipline pulls from and requeues into.
    Queue,
    /// Where a waiting system diverts jobs it cannot buffer.
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_ordering() {
        assert!(JobId(1) < JobId(2));
        assert_eq!(JobId(3), JobId(3));
    }

    #[test]
    fn category_default_is_zero() {
        assert_eq!(CategoryId::default(), CategoryId(0));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(CategoryId(0), 2usize);
        map.insert(CategoryId(1), 0usize);
        assert_eq!(map[&CategoryId(0)], 2);
    }

    #[test]
    fn ports_are_distinct() {
        assert_ne!(Port::Downstream, Port::Queue);
        assert_ne!(Port::Queue, Port::Overflow);
    }
}
