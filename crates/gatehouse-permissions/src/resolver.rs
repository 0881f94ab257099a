//! Authorization verdicts over permission sets
//!
//! These functions are the only place where the administrator bypass is
//! applied. Everything that gates on permissions calls through here so the
//! single-object and bulk answers never diverge.

use std::collections::HashSet;

use tracing::debug;

use crate::{
    models::{ObjectClass, ObjectPermission, ObjectPermissionType},
    set::ObjectPermissionSet,
    subject::Subject,
    Result,
};

/// Whether a subject may exercise `permission` on `identifier`
pub fn has_permission(
    subject_is_admin: bool,
    set: &dyn ObjectPermissionSet,
    permission: ObjectPermissionType,
    identifier: &str,
) -> Result<bool> {
    if subject_is_admin {
        return Ok(true);
    }
    set.has_permission(permission, identifier)
}

/// Members of `identifiers` on which the subject holds at least one of `types`
///
/// An empty input yields an empty result without consulting the set. The
/// result is always a subset of `identifiers`, whatever the set returns.
pub fn accessible_identifiers(
    subject_is_admin: bool,
    set: &dyn ObjectPermissionSet,
    types: &[ObjectPermissionType],
    identifiers: &HashSet<String>,
) -> Result<HashSet<String>> {
    if identifiers.is_empty() {
        return Ok(HashSet::new());
    }
    if subject_is_admin {
        return Ok(identifiers.clone());
    }

    let mut accessible = set.accessible_objects(types, identifiers)?;
    accessible.retain(|identifier| identifiers.contains(identifier));
    Ok(accessible)
}

/// Whether `actor` may grant or revoke `changes` for the user `target`
///
/// Non-administrators need UPDATE on the target user and ADMINISTER on every
/// object the changes reference. The check is an explicit subset test of the
/// affected identifiers against the ADMINISTER-accessible ones.
pub fn can_alter_permissions(
    actor: &dyn Subject,
    target: &str,
    class: ObjectClass,
    changes: &HashSet<ObjectPermission>,
) -> Result<bool> {
    if actor.is_administrator()? {
        return Ok(true);
    }

    let users = actor.object_permissions(ObjectClass::User);
    if !has_permission(false, users.as_ref(), ObjectPermissionType::Update, target)? {
        debug!(actor = actor.identifier(), target, "Actor lacks UPDATE on target user");
        return Ok(false);
    }

    let affected: HashSet<String> = changes.iter().map(|p| p.identifier.clone()).collect();
    let set = actor.object_permissions(class);
    let administrable = accessible_identifiers(
        false,
        set.as_ref(),
        &[ObjectPermissionType::Administer],
        &affected,
    )?;

    Ok(affected.is_subset(&administrable))
}

/// Whether `actor` may read the permissions of the user `target`
pub fn can_read_permissions(actor: &dyn Subject, target: &str) -> Result<bool> {
    if actor.identifier() == target || actor.is_administrator()? {
        return Ok(true);
    }
    let users = actor.object_permissions(ObjectClass::User);
    has_permission(false, users.as_ref(), ObjectPermissionType::Read, target)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::SystemPermissionType,
        set::{SimpleObjectPermissionSet, SimpleSystemPermissionSet, SystemPermissionSet},
        FixedSubject,
    };

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn changes(values: &[&str]) -> HashSet<ObjectPermission> {
        values
            .iter()
            .map(|id| ObjectPermission::new(ObjectPermissionType::Read, *id))
            .collect()
    }

    fn subject(
        system: &[SystemPermissionType],
        users: SimpleObjectPermissionSet,
        connections: SimpleObjectPermissionSet,
    ) -> FixedSubject {
        FixedSubject::new(
            "actor",
            SimpleSystemPermissionSet::new(system.iter().copied()),
            users,
            connections,
            SimpleObjectPermissionSet::default(),
        )
    }

    /// Returns a fixed answer from `accessible_objects` regardless of input
    struct OverreachingSet {
        answer: HashSet<String>,
    }

    impl ObjectPermissionSet for OverreachingSet {
        fn has_permission(&self, _: ObjectPermissionType, identifier: &str) -> Result<bool> {
            Ok(self.answer.contains(identifier))
        }

        fn accessible_objects(
            &self,
            _: &[ObjectPermissionType],
            _: &HashSet<String>,
        ) -> Result<HashSet<String>> {
            Ok(self.answer.clone())
        }

        fn permissions(&self) -> Result<HashSet<ObjectPermission>> {
            Ok(HashSet::new())
        }

        fn add_permissions(&self, _: &HashSet<ObjectPermission>) -> Result<()> {
            Ok(())
        }

        fn remove_permissions(&self, _: &HashSet<ObjectPermission>) -> Result<()> {
            Ok(())
        }
    }

    struct OverreachingSubject {
        users: Arc<SimpleObjectPermissionSet>,
        connections: Arc<OverreachingSet>,
    }

    impl Subject for OverreachingSubject {
        fn identifier(&self) -> &str {
            "actor"
        }

        fn system_permissions(&self) -> Arc<dyn SystemPermissionSet> {
            Arc::new(SimpleSystemPermissionSet::default())
        }

        fn object_permissions(&self, class: ObjectClass) -> Arc<dyn ObjectPermissionSet> {
            match class {
                ObjectClass::User => self.users.clone(),
                _ => self.connections.clone(),
            }
        }
    }

    #[test]
    fn test_empty_input_never_consults_set() {
        let set = OverreachingSet {
            answer: ids(&["1", "2"]),
        };
        let result =
            accessible_identifiers(false, &set, &[ObjectPermissionType::Read], &HashSet::new())
                .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_admin_gets_input_unchanged() {
        let set = SimpleObjectPermissionSet::default();
        let input = ids(&["1", "2", "3"]);
        let result =
            accessible_identifiers(true, &set, &[ObjectPermissionType::Delete], &input).unwrap();
        assert_eq!(result, input);
        assert!(has_permission(true, &set, ObjectPermissionType::Administer, "9").unwrap());
    }

    #[test]
    fn test_result_clamped_to_input() {
        let set = OverreachingSet {
            answer: ids(&["1", "x"]),
        };
        let result =
            accessible_identifiers(false, &set, &[ObjectPermissionType::Read], &ids(&["1", "2"]))
                .unwrap();
        assert_eq!(result, ids(&["1"]));
    }

    #[test]
    fn test_can_alter_requires_update_on_target() {
        let actor = subject(
            &[],
            SimpleObjectPermissionSet::default(),
            SimpleObjectPermissionSet::granting(&[ObjectPermissionType::Administer], ["1"]),
        );
        assert!(!can_alter_permissions(&actor, "bob", ObjectClass::Connection, &changes(&["1"]))
            .unwrap());
    }

    #[test]
    fn test_can_alter_requires_administer_on_every_object() {
        let actor = subject(
            &[],
            SimpleObjectPermissionSet::granting(&[ObjectPermissionType::Update], ["bob"]),
            SimpleObjectPermissionSet::granting(&[ObjectPermissionType::Administer], ["1", "2"]),
        );

        assert!(
            can_alter_permissions(&actor, "bob", ObjectClass::Connection, &changes(&["1", "2"]))
                .unwrap()
        );
        assert!(
            !can_alter_permissions(&actor, "bob", ObjectClass::Connection, &changes(&["1", "3"]))
                .unwrap()
        );
    }

    #[test]
    fn test_can_alter_same_cardinality_different_members_is_denied() {
        // The set answers {1, x} for input {1, 2}: equal sizes, different members.
        let actor = OverreachingSubject {
            users: Arc::new(SimpleObjectPermissionSet::granting(
                &[ObjectPermissionType::Update],
                ["bob"],
            )),
            connections: Arc::new(OverreachingSet {
                answer: ids(&["1", "x"]),
            }),
        };

        let verdict =
            can_alter_permissions(&actor, "bob", ObjectClass::Connection, &changes(&["1", "2"]))
                .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_admin_can_alter_anything() {
        let actor = subject(
            &[SystemPermissionType::Administer],
            SimpleObjectPermissionSet::default(),
            SimpleObjectPermissionSet::default(),
        );
        assert!(can_alter_permissions(&actor, "bob", ObjectClass::Connection, &changes(&["1"]))
            .unwrap());
    }

    #[test]
    fn test_can_read_permissions() {
        let actor = subject(
            &[],
            SimpleObjectPermissionSet::granting(&[ObjectPermissionType::Read], ["bob"]),
            SimpleObjectPermissionSet::default(),
        );
        assert!(can_read_permissions(&actor, "actor").unwrap());
        assert!(can_read_permissions(&actor, "bob").unwrap());
        assert!(!can_read_permissions(&actor, "carol").unwrap());
    }
}
