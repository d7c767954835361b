//! Operator allowlist.

use std::collections::HashSet;

/// Operators permitted to use the bot. Built once from config, never mutated.
#[derive(Debug, Clone, Default)]
pub struct AdminAllowlist {
    ids: HashSet<i64>,
}

impl AdminAllowlist {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, operator_id: i64) -> bool {
        self.ids.contains(&operator_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
