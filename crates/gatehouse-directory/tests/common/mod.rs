//! Shared fixtures for directory tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use gatehouse_directory::{Argon2PasswordEncryption, Directory, DirectoryStores};
use gatehouse_permissions::{
    ObjectClass, ObjectPermission, ObjectPermissionType, StoredSubject, SystemPermission,
    SystemPermissionType,
};

pub fn directory() -> Directory {
    let hasher = Arc::new(Argon2PasswordEncryption::with_params(1024, 1).unwrap());
    Directory::new(DirectoryStores::in_memory(), hasher, 100)
}

/// Subject holding system ADMINISTER
pub fn admin(directory: &Directory) -> StoredSubject {
    grant_system(directory, "admin", &[SystemPermissionType::Administer]);
    directory.subject("admin")
}

pub fn grant_system(directory: &Directory, subject: &str, types: &[SystemPermissionType]) {
    let rows: HashSet<_> = types.iter().map(|t| SystemPermission::new(*t)).collect();
    directory
        .stores()
        .permissions
        .insert_system_permissions(subject, &rows)
        .unwrap();
}

pub fn grant(
    directory: &Directory,
    subject: &str,
    class: ObjectClass,
    permission_type: ObjectPermissionType,
    identifier: &str,
) {
    let rows: HashSet<_> = [ObjectPermission::new(permission_type, identifier)]
        .into_iter()
        .collect();
    directory
        .stores()
        .permissions
        .insert_object_permissions(subject, class, &rows)
        .unwrap();
}

pub fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}
