//! Point-in-time rewriting of eager-loaded relations.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::hooks::Scope;
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::statement::{PreloadCondition, Statement};
use crate::traits::TimeMachine;
use crate::versioning::rewriter::{apply_as_of, resolve_as_of};
use crate::versioning::VersionLogStore;

type Preloads = BTreeMap<String, Vec<PreloadCondition>>;

/// What stays fixed while the preload paths of one read are walked.
struct PathWalker<'a> {
    schemas: &'a SchemaRegistry,
    root: &'a Arc<EntitySchema>,
    as_of: DateTime<Utc>,
    /// Preloads as the caller attached them.
    original: &'a Preloads,
}

/// Injects point-in-time modifiers into the preload paths of a read.
#[derive(Clone)]
pub struct RelationRewriter {
    store: Arc<dyn VersionLogStore>,
    time_machine: Arc<dyn TimeMachine>,
}

impl RelationRewriter {
    pub fn new(store: Arc<dyn VersionLogStore>, time_machine: Arc<dyn TimeMachine>) -> Self {
        Self {
            store,
            time_machine,
        }
    }

    /// Before-preload handler. Returns the relation paths that received a
    /// point-in-time modifier.
    ///
    /// Every prefix of every path is visited. A prefix whose target entity is
    /// versioned gets one modifier placed ahead of the conditions the caller
    /// attached to that prefix. Targets sharing the root's log table are left
    /// to the root rewrite, which also governs reads of those relations.
    pub fn rewrite_preloads(&self, scope: &mut Scope<'_>) -> BTreeSet<String> {
        let mut handled = BTreeSet::new();
        if scope.has_error() || scope.statement.unscoped || scope.statement.preloads.is_empty() {
            return handled;
        }
        let Some(root) = scope.schema.clone() else {
            return handled;
        };
        let Some(as_of) = resolve_as_of(self.time_machine.as_ref(), &scope.statement.context)
        else {
            return handled;
        };

        let original = std::mem::take(&mut scope.statement.preloads);
        let walker = PathWalker {
            schemas: scope.schemas,
            root: &root,
            as_of,
            original: &original,
        };
        let mut rewritten = original.clone();
        for path in original.keys() {
            self.walk(&walker, path, &mut rewritten, &mut handled);
        }
        scope.statement.preloads = rewritten;

        if !handled.is_empty() {
            tracing::debug!(
                entity = %root.name,
                paths = ?handled,
                "Rewrote preloads to point in time"
            );
        }
        handled
    }

    fn walk(
        &self,
        walker: &PathWalker<'_>,
        path: &str,
        rewritten: &mut Preloads,
        handled: &mut BTreeSet<String>,
    ) {
        let hops: Vec<&str> = path.split('.').collect();
        let mut owner = Arc::clone(walker.root);
        for depth in 0..hops.len() {
            let target = match walker.schemas.resolve_relation(&owner, hops[depth]) {
                Ok((_, target)) => target,
                Err(e) => {
                    // The host reports unknown relations when it loads them.
                    tracing::debug!(path, "Stopped walking preload path: {}", e);
                    return;
                }
            };
            owner = Arc::clone(&target);

            let Some(log_table) = target.shadow_table.as_deref() else {
                continue;
            };
            if walker.root.shadow_table.as_deref() == Some(log_table) {
                continue;
            }
            let prefix = hops[..=depth].join(".");
            if handled.contains(&prefix) {
                continue;
            }
            let existing = walker
                .original
                .get(&prefix)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if existing.iter().any(PreloadCondition::is_as_of) {
                continue;
            }

            let mut conditions = Vec::with_capacity(existing.len() + 1);
            conditions.push(self.modifier(walker.as_of, Arc::clone(&target)));
            conditions.extend(existing.iter().cloned());
            rewritten.insert(prefix.clone(), conditions);
            handled.insert(prefix);
        }
    }

    fn modifier(&self, as_of: DateTime<Utc>, target: Arc<EntitySchema>) -> PreloadCondition {
        let store = Arc::clone(&self.store);
        PreloadCondition::AsOf(Arc::new(move |stmt: &mut Statement| {
            apply_as_of(store.as_ref(), stmt, as_of, &target);
        }))
    }
}
