//! Soft-delete filter registry.
//!
//! # Responsibility
//! - Derive, once at startup, the standing `is_deleted == false` predicate for
//!   every registered soft-deletable entity type.
//! - Decide the delete policy (soft tombstone or physical removal) per type.
//!
//! # Invariants
//! - The registry is written by exactly one builder and is immutable after
//!   `build()`; stores share it through `Arc`.
//! - Standing filters are composed with caller predicates by AND, never
//!   replacing them.
//! - Types without the soft-delete capability always use hard delete.
//!
//! # See also
//! - `repo::sqlite` and `repo::memory` for how stores apply `scope`.

use crate::model::entity::{Entity, SOFT_DELETE_FIELD};
use crate::repo::predicate::Predicate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How `delete` treats a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Set the tombstone flag and persist the record as an update.
    #[default]
    Soft,
    /// Remove the record physically.
    Hard,
}

#[derive(Debug, Clone)]
struct FilterEntry {
    standing: Option<Predicate>,
    policy: DeletePolicy,
}

/// Immutable per-type filter table.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    entries: BTreeMap<&'static str, FilterEntry>,
}

impl FilterRegistry {
    pub fn builder(default_policy: DeletePolicy) -> FilterRegistryBuilder {
        FilterRegistryBuilder {
            default_policy,
            entries: BTreeMap::new(),
        }
    }

    /// Registry with no registered types: no standing filters, hard deletes.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Standing predicate for `T`, if `T` was registered as soft-deletable.
    pub fn standing_filter<T: Entity>(&self) -> Option<&Predicate> {
        self.entries
            .get(T::ENTITY_NAME)
            .and_then(|entry| entry.standing.as_ref())
    }

    /// Returns `caller AND standing` for `T`.
    pub fn scope<T: Entity>(&self, caller: &Predicate) -> Predicate {
        match self.standing_filter::<T>() {
            Some(standing) => caller.clone().and(standing),
            None => caller.clone(),
        }
    }

    pub fn delete_policy<T: Entity>(&self) -> DeletePolicy {
        self.entries
            .get(T::ENTITY_NAME)
            .map_or(DeletePolicy::Hard, |entry| entry.policy)
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.entries.contains_key(T::ENTITY_NAME)
    }

    /// Registered type names in sorted order.
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

/// Single-writer builder for [`FilterRegistry`].
pub struct FilterRegistryBuilder {
    default_policy: DeletePolicy,
    entries: BTreeMap<&'static str, FilterEntry>,
}

impl FilterRegistryBuilder {
    /// Registers `T` with the builder's default delete policy.
    pub fn register<T: Entity>(self) -> Self {
        let policy = self.default_policy;
        self.register_with_policy::<T>(policy)
    }

    /// Registers `T` with an explicit delete policy.
    ///
    /// A soft policy on a type without the soft-delete capability is
    /// downgraded to hard delete.
    pub fn register_with_policy<T: Entity>(mut self, policy: DeletePolicy) -> Self {
        let soft_deletable = T::capabilities().soft_deletable;
        let entry = if soft_deletable {
            FilterEntry {
                standing: Some(Predicate::field_eq(SOFT_DELETE_FIELD, false)),
                policy,
            }
        } else {
            if policy == DeletePolicy::Soft {
                warn!(
                    "event=filter_register module=filter status=downgraded entity={} policy=hard reason=not_soft_deletable",
                    T::ENTITY_NAME
                );
            }
            FilterEntry {
                standing: None,
                policy: DeletePolicy::Hard,
            }
        };

        if self.entries.insert(T::ENTITY_NAME, entry).is_some() {
            warn!(
                "event=filter_register module=filter status=replaced entity={}",
                T::ENTITY_NAME
            );
        }
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> Arc<FilterRegistry> {
        let filtered = self
            .entries
            .values()
            .filter(|entry| entry.standing.is_some())
            .count();
        info!(
            "event=filter_build module=filter status=ok registered={} soft_filtered={}",
            self.entries.len(),
            filtered
        );
        Arc::new(FilterRegistry {
            entries: self.entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{DeletePolicy, FilterRegistry};
    use crate::model::entity::FieldValue;
    use crate::model::password::Password;
    use crate::model::user::User;
    use crate::repo::predicate::Predicate;

    #[test]
    fn soft_deletable_types_get_standing_filter() {
        let registry = FilterRegistry::builder(DeletePolicy::Soft)
            .register::<User>()
            .register::<Password>()
            .build();

        let standing = registry.standing_filter::<User>().unwrap();
        assert_eq!(standing.clauses()[0].field, "is_deleted");
        assert_eq!(standing.clauses()[0].value, FieldValue::Bool(false));
        assert!(registry.standing_filter::<Password>().is_none());
        assert_eq!(registry.delete_policy::<User>(), DeletePolicy::Soft);
        assert_eq!(registry.delete_policy::<Password>(), DeletePolicy::Hard);
        assert_eq!(registry.registered_types(), vec!["Password", "User"]);
    }

    #[test]
    fn scope_keeps_caller_clauses() {
        let registry = FilterRegistry::builder(DeletePolicy::Soft)
            .register::<User>()
            .build();
        let caller = Predicate::field_eq("is_deleted", true);
        let scoped = registry.scope::<User>(&caller);
        assert_eq!(scoped.clauses().len(), 2);
        assert_eq!(scoped.clauses()[0].value, FieldValue::Bool(true));
    }

    #[test]
    fn explicit_hard_policy_is_kept_for_soft_deletable_types() {
        let registry = FilterRegistry::builder(DeletePolicy::Soft)
            .register_with_policy::<User>(DeletePolicy::Hard)
            .build();
        assert_eq!(registry.delete_policy::<User>(), DeletePolicy::Hard);
        assert!(registry.standing_filter::<User>().is_some());
    }

    #[test]
    fn unregistered_types_are_unfiltered() {
        let registry = FilterRegistry::empty();
        assert!(!registry.is_registered::<User>());
        assert!(registry.standing_filter::<User>().is_none());
        assert_eq!(registry.delete_policy::<User>(), DeletePolicy::Hard);
    }
}
