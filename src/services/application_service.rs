//! Florist onboarding: public applications, admin review and account provisioning.

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::applications::{
        ApplicationDecision, ApplicationList, ProvisionFloristRequest, ProvisionedFlorist,
        RejectApplicationRequest, SubmitApplicationRequest,
    },
    entity::{
        florist_applications::{
            ActiveModel as ApplicationActive, Column as ApplicationCol,
            Entity as FloristApplications, Model as ApplicationModel,
        },
        florist_profiles::{
            ActiveModel as FloristActive, Column as FloristCol, Entity as FloristProfiles,
        },
        profiles::{ActiveModel as ProfileActive, Column as ProfileCol, Entity as Profiles},
    },
    error::{AppError, AppResult},
    integrations::email::{self, templates},
    middleware::auth::{AuthUser, ensure_admin},
    models::{FloristApplication, ROLE_CUSTOMER, ROLE_FLORIST},
    response::{ApiResponse, Meta},
    routes::params::ApplicationQuery,
    services::auth_service::{hash_password, normalize_email, validate_password},
    state::AppState,
};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";

/// Decide whether a new application may be filed given the latest one for the same email.
pub fn reapplication_check(latest: Option<&ApplicationModel>, now: DateTime<Utc>) -> AppResult<()> {
    let Some(latest) = latest else {
        return Ok(());
    };
    match latest.status.as_str() {
        STATUS_PENDING => Err(AppError::Conflict(
            "An application for this email is already under review".into(),
        )),
        STATUS_APPROVED => Err(AppError::Conflict(
            "This email already belongs to an approved florist".into(),
        )),
        _ if !latest.allow_reapply => Err(AppError::BadRequest(
            "This application is not eligible for reapplication".into(),
        )),
        _ => match latest.reapply_after {
            Some(after) if after.with_timezone(&Utc) > now => Err(AppError::BadRequest(format!(
                "You can reapply after {}",
                after.with_timezone(&Utc).format("%Y-%m-%d")
            ))),
            _ => Ok(()),
        },
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

pub async fn submit_application(
    state: &AppState,
    payload: SubmitApplicationRequest,
) -> AppResult<ApiResponse<FloristApplication>> {
    let email = normalize_email(&payload.email)?;
    let full_name = required(&payload.full_name, "full_name")?;
    let business_name = required(&payload.business_name, "business_name")?;

    let latest = FloristApplications::find()
        .filter(ApplicationCol::Email.eq(email.as_str()))
        .order_by_desc(ApplicationCol::CreatedAt)
        .one(&state.orm)
        .await?;
    reapplication_check(latest.as_ref(), Utc::now())?;

    let application = ApplicationActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        full_name: Set(full_name),
        business_name: Set(business_name),
        phone: Set(payload.phone),
        address: Set(payload.address),
        website: Set(payload.website),
        status: Set(STATUS_PENDING.to_string()),
        rejection_reason: Set(None),
        allow_reapply: Set(false),
        reapply_after: Set(None),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(application_id = %application.id, "florist application submitted");
    Ok(ApiResponse::success(
        "Application submitted",
        application.into(),
        Some(Meta::empty()),
    ))
}

pub async fn list_applications(
    state: &AppState,
    user: &AuthUser,
    query: ApplicationQuery,
) -> AppResult<ApiResponse<ApplicationList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = FloristApplications::find().order_by_desc(ApplicationCol::CreatedAt);
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        finder = finder.filter(ApplicationCol::Status.eq(status.clone()));
    }
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(FloristApplication::from)
        .collect();

    Ok(ApiResponse::success(
        "Applications",
        ApplicationList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub struct ProvisionInput {
    pub email: String,
    pub full_name: Option<String>,
    pub store_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub password: Option<String>,
}

pub struct Provisioned {
    pub florist: ProvisionedFlorist,
    /// Set when a new login was created with a generated password.
    pub temporary_password: Option<String>,
}

fn generate_temporary_password() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw[..12].to_string()
}

/// Create (or promote) the login and its store profile on `conn`.
/// Callers pass a transaction so a failure leaves no half-created account.
pub async fn provision_florist<C: ConnectionTrait>(
    conn: &C,
    input: ProvisionInput,
) -> AppResult<Provisioned> {
    let email = normalize_email(&input.email)?;
    let store_name = required(&input.store_name, "store_name")?;

    let existing = Profiles::find()
        .filter(ProfileCol::Email.eq(email.as_str()))
        .one(conn)
        .await?;

    let (profile, temporary_password) = match existing {
        Some(profile) => {
            let has_store = FloristProfiles::find()
                .filter(FloristCol::UserId.eq(profile.id))
                .count(conn)
                .await?
                > 0;
            if has_store {
                return Err(AppError::Conflict(
                    "This account already has a store".into(),
                ));
            }
            if profile.role != ROLE_CUSTOMER && profile.role != ROLE_FLORIST {
                return Err(AppError::Conflict(format!(
                    "Cannot convert a {} account into a florist",
                    profile.role
                )));
            }
            let mut active: ProfileActive = profile.into();
            active.role = Set(ROLE_FLORIST.to_string());
            (active.update(conn).await?, None)
        }
        None => {
            let (password, generated) = match input.password {
                Some(password) => {
                    validate_password(&password)?;
                    (password, false)
                }
                None => (generate_temporary_password(), true),
            };
            let profile = ProfileActive {
                id: Set(Uuid::new_v4()),
                email: Set(email),
                password_hash: Set(hash_password(&password)?),
                full_name: Set(input.full_name),
                role: Set(ROLE_FLORIST.to_string()),
                stripe_customer_id: Set(None),
                created_at: NotSet,
            }
            .insert(conn)
            .await?;
            (profile, generated.then_some(password))
        }
    };

    let florist = FloristActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(profile.id),
        store_name: Set(store_name),
        about: Set(None),
        phone: Set(input.phone),
        website: Set(input.website),
        address: Set(input.address),
        suburb: Set(None),
        state: Set(None),
        postcode: Set(None),
        latitude: Set(None),
        longitude: Set(None),
        operating_hours: Set(None),
        delivery_enabled: Set(true),
        pickup_enabled: Set(true),
        delivery_radius_km: Set(10.0),
        delivery_fee: Set(0),
        minimum_order: Set(0),
        same_day_cutoff: Set(None),
        logo_url: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(Provisioned {
        florist: ProvisionedFlorist {
            profile: profile.into(),
            florist: florist.into(),
        },
        temporary_password,
    })
}

fn send_welcome(state: &AppState, provisioned: &Provisioned) {
    let Some(password) = provisioned.temporary_password.as_deref() else {
        return;
    };
    let message = templates::florist_welcome(
        &provisioned.florist.profile.email,
        &provisioned.florist.florist.store_name,
        password,
    );
    email::send_in_background(state.integrations.mailer.clone(), message);
}

pub async fn provision_florist_directly(
    state: &AppState,
    user: &AuthUser,
    payload: ProvisionFloristRequest,
) -> AppResult<ApiResponse<ProvisionedFlorist>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let provisioned = provision_florist(
        &txn,
        ProvisionInput {
            email: payload.email,
            full_name: payload.full_name,
            store_name: payload.store_name,
            phone: payload.phone,
            address: payload.address,
            website: payload.website,
            password: payload.password,
        },
    )
    .await?;
    txn.commit().await?;

    send_welcome(state, &provisioned);
    audit::record(
        &state.pool,
        Some(user.user_id),
        "florist_provision",
        "florist_profiles",
        serde_json::json!({ "florist_id": provisioned.florist.florist.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Florist created",
        provisioned.florist,
        Some(Meta::empty()),
    ))
}

async fn find_pending<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<ApplicationModel> {
    let application = FloristApplications::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    if application.status != STATUS_PENDING {
        return Err(AppError::Conflict(format!(
            "Application has already been {}",
            application.status
        )));
    }
    Ok(application)
}

pub async fn approve_application(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ApplicationDecision>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let application = find_pending(&txn, id).await?;

    let provisioned = provision_florist(
        &txn,
        ProvisionInput {
            email: application.email.clone(),
            full_name: Some(application.full_name.clone()),
            store_name: application.business_name.clone(),
            phone: application.phone.clone(),
            address: application.address.clone(),
            website: application.website.clone(),
            password: None,
        },
    )
    .await?;

    let mut active: ApplicationActive = application.into();
    active.status = Set(STATUS_APPROVED.to_string());
    active.reviewed_by = Set(Some(user.user_id));
    active.reviewed_at = Set(Some(Utc::now().into()));
    let application = active.update(&txn).await?;
    txn.commit().await?;

    send_welcome(state, &provisioned);
    audit::record(
        &state.pool,
        Some(user.user_id),
        "application_approve",
        "florist_applications",
        serde_json::json!({ "application_id": application.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Application approved",
        ApplicationDecision {
            application: application.into(),
            provisioned: Some(provisioned.florist),
        },
        Some(Meta::empty()),
    ))
}

pub const MAX_COOLDOWN_DAYS: i64 = 3650;

/// When a rejected applicant may try again, or `None` if the rejection is final.
pub fn reapply_date(
    now: DateTime<Utc>,
    allow_reapply: bool,
    cooldown_days: i64,
) -> AppResult<Option<DateTime<Utc>>> {
    if !(0..=MAX_COOLDOWN_DAYS).contains(&cooldown_days) {
        return Err(AppError::BadRequest(format!(
            "cooldown_days must be between 0 and {MAX_COOLDOWN_DAYS}"
        )));
    }
    if !allow_reapply {
        return Ok(None);
    }
    TimeDelta::try_days(cooldown_days)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(Some)
        .ok_or_else(|| AppError::BadRequest("cooldown_days is out of range".into()))
}

pub async fn reject_application(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RejectApplicationRequest,
) -> AppResult<ApiResponse<ApplicationDecision>> {
    ensure_admin(user)?;
    let cooldown_days = payload
        .cooldown_days
        .unwrap_or(state.config.reapply_cooldown_days);
    let now = Utc::now();
    let reapply_after = reapply_date(now, payload.allow_reapply, cooldown_days)?;

    let txn = state.orm.begin().await?;
    let application = find_pending(&txn, id).await?;

    let reason = payload.reason.filter(|r| !r.trim().is_empty());

    let mut active: ApplicationActive = application.into();
    active.status = Set(STATUS_REJECTED.to_string());
    active.rejection_reason = Set(reason.clone());
    active.allow_reapply = Set(payload.allow_reapply);
    active.reapply_after = Set(reapply_after.map(Into::into));
    active.reviewed_by = Set(Some(user.user_id));
    active.reviewed_at = Set(Some(now.into()));
    let application = active.update(&txn).await?;
    txn.commit().await?;

    let reapply_note = match reapply_after {
        Some(after) => format!("You are welcome to reapply after {}.", after.format("%Y-%m-%d")),
        None => "This decision is final.".to_string(),
    };
    email::send_in_background(
        state.integrations.mailer.clone(),
        templates::application_rejected(&application.email, reason.as_deref(), &reapply_note),
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "application_reject",
        "florist_applications",
        serde_json::json!({ "application_id": application.id, "allow_reapply": application.allow_reapply }),
    )
    .await;

    Ok(ApiResponse::success(
        "Application rejected",
        ApplicationDecision {
            application: application.into(),
            provisioned: None,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(status: &str, allow_reapply: bool, reapply_after: Option<DateTime<Utc>>) -> ApplicationModel {
        ApplicationModel {
            id: Uuid::new_v4(),
            email: "petals@example.com".into(),
            full_name: "Ivy Green".into(),
            business_name: "Ivy's Blooms".into(),
            phone: None,
            address: None,
            website: None,
            status: status.into(),
            rejection_reason: None,
            allow_reapply,
            reapply_after: reapply_after.map(Into::into),
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn first_application_is_allowed() {
        assert!(reapplication_check(None, Utc::now()).is_ok());
    }

    #[test]
    fn pending_and_approved_block_new_applications() {
        let now = Utc::now();
        assert!(matches!(
            reapplication_check(Some(&application(STATUS_PENDING, false, None)), now),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            reapplication_check(Some(&application(STATUS_APPROVED, false, None)), now),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn rejection_respects_cooldown() {
        let now = Utc::now();
        let final_rejection = application(STATUS_REJECTED, false, None);
        assert!(reapplication_check(Some(&final_rejection), now).is_err());

        let cooling = application(STATUS_REJECTED, true, Some(now + TimeDelta::days(10)));
        assert!(reapplication_check(Some(&cooling), now).is_err());

        let cooled = application(STATUS_REJECTED, true, Some(now - TimeDelta::days(1)));
        assert!(reapplication_check(Some(&cooled), now).is_ok());

        let no_window = application(STATUS_REJECTED, true, None);
        assert!(reapplication_check(Some(&no_window), now).is_ok());
    }

    #[test]
    fn cooldown_is_bounded() {
        let now = Utc::now();
        assert_eq!(reapply_date(now, false, 30).unwrap(), None);
        assert_eq!(
            reapply_date(now, true, 30).unwrap(),
            Some(now + TimeDelta::days(30))
        );
        assert_eq!(reapply_date(now, true, 0).unwrap(), Some(now));
        assert!(matches!(reapply_date(now, true, -1), Err(AppError::BadRequest(_))));
        assert!(matches!(
            reapply_date(now, true, 1_000_000_000_000),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn temporary_passwords_meet_minimum_length() {
        let password = generate_temporary_password();
        assert_eq!(password.len(), 12);
        assert!(validate_password(&password).is_ok());
    }
}
