// libs/appointment-cell/src/services/identity.rs
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::UserDirectory;
use shared_models::auth::User;
use shared_models::user::Actor;

use crate::models::AppointmentError;

/// Resolve the authenticated principal to the scheduling party it acts as.
///
/// The directory is searched by the token's email first and by its subject
/// id second. Users holding neither the doctor nor the patient role cannot
/// take part in appointments.
pub async fn resolve_actor(directory: &dyn UserDirectory, principal: &User) -> Result<Actor, AppointmentError> {
    let mut account = None;

    if let Some(email) = principal.email.as_deref().filter(|email| !email.is_empty()) {
        account = directory.find_by_email(email).await?;
    }

    if account.is_none() {
        if let Ok(id) = Uuid::parse_str(&principal.id) {
            account = directory.find_by_id(id).await?;
        }
    }

    let account = account.ok_or_else(|| {
        warn!(subject = %principal.id, "authenticated principal is not in the user directory");
        AppointmentError::NotFound("User not found".to_string())
    })?;

    let actor = Actor::from_account(&account).ok_or_else(|| {
        warn!(user_id = %account.id, role = %account.role, "role cannot take part in appointments");
        AppointmentError::AccessDenied(format!("Role {} cannot manage appointments", account.role))
    })?;

    debug!(%actor, "resolved caller");
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::MemoryUserDirectory;
    use shared_utils::test_utils::TestUser;

    #[tokio::test]
    async fn resolves_by_email() {
        let patient = TestUser::patient("Ada");
        let directory = MemoryUserDirectory::with_users(vec![patient.to_account()]);

        let mut principal = patient.to_user();
        principal.id = "not-a-uuid".to_string();

        assert_eq!(resolve_actor(&directory, &principal).await, Ok(Actor::Patient(patient.id)));
    }

    #[tokio::test]
    async fn falls_back_to_subject_id() {
        let doctor = TestUser::doctor("House");
        let directory = MemoryUserDirectory::with_users(vec![doctor.to_account()]);

        let mut principal = doctor.to_user();
        principal.email = Some("renamed@clinic.test".to_string());

        assert_eq!(resolve_actor(&directory, &principal).await, Ok(Actor::Doctor(doctor.id)));
    }

    #[tokio::test]
    async fn unknown_principal_is_not_found() {
        let directory = MemoryUserDirectory::new();
        let principal = TestUser::patient("Ghost").to_user();

        assert_matches!(resolve_actor(&directory, &principal).await, Err(AppointmentError::NotFound(_)));
    }

    #[tokio::test]
    async fn other_roles_are_denied() {
        let admin = TestUser::admin("Root");
        let directory = MemoryUserDirectory::with_users(vec![admin.to_account()]);

        assert_matches!(
            resolve_actor(&directory, &admin.to_user()).await,
            Err(AppointmentError::AccessDenied(_))
        );
    }
}
