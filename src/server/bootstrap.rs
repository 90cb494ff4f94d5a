//! First-run setup: seeds the admin account so a fresh install is usable.

use chrono::Utc;
use uuid::Uuid;

use crate::access::grant_role;
use crate::auth::{PasswordService, generate_password};
use crate::error::Result;
use crate::server::validation::unique_space_slug;
use crate::store::Store;
use crate::types::{GlobalRole, Group, ResourceKind, Role, Space, SpaceType, User};

/// Creates the initial `admin` user, the `Administrators` group, and the
/// admin's personal space when the user table is empty. The generated
/// password is logged exactly once; it cannot be recovered afterwards.
pub fn bootstrap(store: &dyn Store, passwords: &PasswordService) -> Result<()> {
    if store.count_users()? > 0 {
        return Ok(());
    }

    let password = generate_password();
    let password_hash = passwords.hash(&password)?;
    let now = Utc::now();

    let admin = User {
        id: Uuid::new_v4().to_string(),
        username: "admin".to_string(),
        email: "admin@localhost".to_string(),
        password_hash,
        global_role: GlobalRole::Admin,
        active: true,
        preferences: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&admin)?;

    let group = Group {
        id: Uuid::new_v4().to_string(),
        name: "Administrators".to_string(),
        owner_id: admin.id.clone(),
        global_role: GlobalRole::Admin,
        created_at: now,
        updated_at: now,
    };
    store.create_group(&group)?;
    store.add_group_member(&group.id, &admin.id)?;

    create_personal_space(store, &admin)?;

    tracing::info!("Created initial admin user \"admin\" with password: {password}");
    Ok(())
}

/// Every account gets a personal space it owns, with an explicit owner
/// permission row alongside the `owner_id` column.
pub fn create_personal_space(store: &dyn Store, user: &User) -> Result<Space> {
    let slug = unique_space_slug(store, &user.username)?;
    let now = Utc::now();
    let space = Space {
        id: Uuid::new_v4().to_string(),
        name: format!("{}'s Space", user.username),
        slug,
        icon: None,
        owner_id: Some(user.id.clone()),
        space_type: SpaceType::Personal,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    store.create_space(&space)?;
    grant_role(store, ResourceKind::Space, &space.id, &user.id, Role::Owner)?;
    Ok(space)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_bootstrap_seeds_admin_once() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new(dir.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let passwords = PasswordService::new();

        bootstrap(&store, &passwords).unwrap();

        let admin = store.get_user_by_username("admin").unwrap().unwrap();
        assert_eq!(admin.global_role, GlobalRole::Admin);
        assert!(admin.active);

        let group = store.get_group_by_name("Administrators").unwrap().unwrap();
        assert_eq!(group.owner_id, admin.id);
        let members = store.list_group_members(&group.id).unwrap();
        assert_eq!(members.len(), 1);

        let spaces = store.list_spaces_for_user(&admin.id).unwrap();
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].space_type, SpaceType::Personal);

        // A second run must not duplicate anything.
        bootstrap(&store, &passwords).unwrap();
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn test_personal_space_slugs_stay_unique() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new(dir.path().join("test.db")).unwrap();
        store.initialize().unwrap();

        let now = Utc::now();
        let mut users = Vec::new();
        // "alice" and "Alice" slugify to the same base.
        for (n, username) in ["alice", "Alice"].iter().enumerate() {
            let user = User {
                id: Uuid::new_v4().to_string(),
                username: (*username).to_string(),
                email: format!("alice{n}@example.com"),
                password_hash: "x".to_string(),
                global_role: GlobalRole::User,
                active: true,
                preferences: None,
                created_at: now,
                updated_at: now,
            };
            store.create_user(&user).unwrap();
            users.push(user);
        }

        let a = create_personal_space(&store, &users[0]).unwrap();
        let b = create_personal_space(&store, &users[1]).unwrap();
        assert_eq!(a.slug, "alice");
        assert_eq!(b.slug, "alice-2");
    }
}
