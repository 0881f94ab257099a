//! Property-based tests for gatehouse-permissions
//!
//! These tests verify that bulk and single-object authorization answers agree
//! for arbitrary permission sets and identifier sets.

use std::collections::HashSet;

use gatehouse_permissions::{
    accessible_identifiers, has_permission, ObjectPermission, ObjectPermissionType,
    SimpleObjectPermissionSet,
};
use proptest::prelude::*;

/// Strategy for generating object identifiers from a small space so that
/// permission sets and queries overlap
fn identifier_strategy() -> impl Strategy<Value = String> {
    (0u8..24).prop_map(|n| n.to_string())
}

fn permission_type_strategy() -> impl Strategy<Value = ObjectPermissionType> {
    prop::sample::select(ObjectPermissionType::ALL.to_vec())
}

fn permission_set_strategy() -> impl Strategy<Value = SimpleObjectPermissionSet> {
    prop::collection::vec((permission_type_strategy(), identifier_strategy()), 0..40).prop_map(
        |grants| {
            SimpleObjectPermissionSet::new(
                grants
                    .into_iter()
                    .map(|(permission_type, id)| ObjectPermission::new(permission_type, id)),
            )
        },
    )
}

fn identifiers_strategy() -> impl Strategy<Value = HashSet<String>> {
    prop::collection::hash_set(identifier_strategy(), 0..20)
}

fn types_strategy() -> impl Strategy<Value = Vec<ObjectPermissionType>> {
    prop::collection::vec(permission_type_strategy(), 1..4)
}

proptest! {
    /// The accessible subset never contains identifiers outside the input
    #[test]
    fn prop_accessible_is_subset_of_input(
        set in permission_set_strategy(),
        types in types_strategy(),
        identifiers in identifiers_strategy(),
        admin in any::<bool>(),
    ) {
        let result = accessible_identifiers(admin, &set, &types, &identifiers).unwrap();
        prop_assert!(result.is_subset(&identifiers));
    }

    /// An identifier is accessible exactly when some requested type is held
    #[test]
    fn prop_accessible_agrees_with_has_permission(
        set in permission_set_strategy(),
        types in types_strategy(),
        identifiers in identifiers_strategy(),
    ) {
        let result = accessible_identifiers(false, &set, &types, &identifiers).unwrap();

        for identifier in &identifiers {
            let held = types
                .iter()
                .any(|t| has_permission(false, &set, *t, identifier).unwrap());
            prop_assert_eq!(
                result.contains(identifier),
                held,
                "Bulk and single answers disagree for {}",
                identifier
            );
        }
    }

    /// Nothing is implicitly accessible
    #[test]
    fn prop_empty_input_gives_empty_result(
        set in permission_set_strategy(),
        types in types_strategy(),
        admin in any::<bool>(),
    ) {
        let result = accessible_identifiers(admin, &set, &types, &HashSet::new()).unwrap();
        prop_assert!(result.is_empty());
    }

    /// Administrators can access every identifier they ask about
    #[test]
    fn prop_admin_gets_everything(
        set in permission_set_strategy(),
        types in types_strategy(),
        identifiers in prop::collection::hash_set(identifier_strategy(), 1..20),
    ) {
        let result = accessible_identifiers(true, &set, &types, &identifiers).unwrap();
        prop_assert_eq!(result, identifiers);
    }
}
