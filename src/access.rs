//! Role resolution for spaces and the content they contain.
//!
//! A user's effective role on a resource is resolved in precedence order:
//! global admins hold owner everywhere; then a direct user grant; then the
//! highest group grant; then, for spaces, ownership and the space-type
//! default; content resources without their own grants inherit from the
//! containing space. An explicit `denied` grant stops resolution and never
//! satisfies any requirement.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Permission, ResourceKind, Role, SpaceType, User};

pub fn effective_role(
    store: &dyn Store,
    user: Option<&User>,
    kind: ResourceKind,
    resource_id: &str,
    space_id: &str,
) -> Result<Option<Role>> {
    if let Some(user) = user {
        if user.is_admin() {
            return Ok(Some(Role::Owner));
        }

        if let Some(perm) = store.get_user_permission(kind, resource_id, &user.id)? {
            return Ok(match perm.role {
                Role::Denied => None,
                role => Some(role),
            });
        }

        let group_roles = store.list_group_roles_for_user(kind, resource_id, &user.id)?;
        if let Some(best) = group_roles.into_iter().max() {
            return Ok(match best {
                Role::Denied => None,
                role => Some(role),
            });
        }
    }

    match kind {
        ResourceKind::Space => {
            let Some(space) = store.get_space(space_id)? else {
                return Ok(None);
            };
            if let Some(user) = user {
                if space.owner_id.as_deref() == Some(user.id.as_str()) {
                    return Ok(Some(Role::Owner));
                }
            }
            if space.space_type == SpaceType::Public {
                return Ok(Some(Role::Viewer));
            }
            Ok(None)
        }
        // Content without grants of its own inherits from the space.
        _ => effective_role(store, user, ResourceKind::Space, space_id, space_id),
    }
}

/// Resolves the user's role and fails with `Forbidden` unless it satisfies
/// the requirement.
pub fn require_role(
    store: &dyn Store,
    user: &User,
    kind: ResourceKind,
    resource_id: &str,
    space_id: &str,
    required: Role,
) -> Result<Role> {
    match effective_role(store, Some(user), kind, resource_id, space_id)? {
        Some(role) if role.satisfies(required) => Ok(role),
        _ => Err(Error::Forbidden),
    }
}

pub fn can_view(
    store: &dyn Store,
    user: &User,
    kind: ResourceKind,
    resource_id: &str,
    space_id: &str,
) -> Result<bool> {
    Ok(effective_role(store, Some(user), kind, resource_id, space_id)?
        .is_some_and(|role| role.satisfies(Role::Viewer)))
}

/// Whether the user may grant or revoke roles on a resource. Spaces are
/// managed by their admins and owners; content is managed by its owner or
/// by an admin of the containing space.
pub fn can_manage_permissions(
    store: &dyn Store,
    user: &User,
    kind: ResourceKind,
    resource_id: &str,
    space_id: &str,
) -> Result<bool> {
    let own = effective_role(store, Some(user), kind, resource_id, space_id)?;
    if kind == ResourceKind::Space {
        return Ok(own.is_some_and(|role| role.satisfies(Role::Admin)));
    }
    if own == Some(Role::Owner) {
        return Ok(true);
    }
    let space = effective_role(store, Some(user), ResourceKind::Space, space_id, space_id)?;
    Ok(space.is_some_and(|role| role.satisfies(Role::Admin)))
}

/// Writes a user grant, reviving a revoked row for the same subject if one
/// exists.
pub fn grant_role(
    store: &dyn Store,
    kind: ResourceKind,
    resource_id: &str,
    user_id: &str,
    role: Role,
) -> Result<Permission> {
    let now = Utc::now();
    store.upsert_permission(&Permission {
        id: Uuid::new_v4().to_string(),
        resource_kind: kind,
        resource_id: resource_id.to_string(),
        user_id: Some(user_id.to_string()),
        group_id: None,
        role,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}
