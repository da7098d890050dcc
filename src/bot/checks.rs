//! Role allow-list checks.

use crate::{
    bot::Context,
    config::AppConfig,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;

/// Raw role ids of a member
pub fn role_ids(member: &serenity::Member) -> Vec<u64> {
    member.roles.iter().map(|role| role.get()).collect()
}

/// Fails with `PermissionDenied` unless the caller holds an allow-listed role.
///
/// `role_ids` is `None` when the interaction carries no guild member (e.g. a DM).
pub fn ensure_allowed(config: &AppConfig, role_ids: Option<&[u64]>) -> Result<()> {
    match role_ids {
        Some(roles) if config.is_allowed(roles) => Ok(()),
        _ => Err(Error::PermissionDenied),
    }
}

/// Poise `check` for every command that changes or reads attendance.
pub async fn require_allowed_role(ctx: Context<'_>) -> Result<bool> {
    let roles = ctx.author_member().await.map(|member| role_ids(&member));
    ensure_allowed(&ctx.data().config, roles.as_deref())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_allowed_role_passes() {
        let config = test_config();
        assert!(ensure_allowed(&config, Some(&[ADVANCED_ROLE, COACH_ROLE])).is_ok());
    }

    #[test]
    fn test_missing_allowed_role_is_denied() {
        let config = test_config();
        assert!(matches!(
            ensure_allowed(&config, Some(&[ADVANCED_ROLE, STUDENT_ROLE])),
            Err(Error::PermissionDenied)
        ));
        assert!(matches!(
            ensure_allowed(&config, Some(&[])),
            Err(Error::PermissionDenied)
        ));
    }

    #[test]
    fn test_caller_without_member_is_denied() {
        let config = test_config();
        assert!(matches!(
            ensure_allowed(&config, None),
            Err(Error::PermissionDenied)
        ));
    }
}
