use chrono::{NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use sea_orm::sea_query::{Expr, extension::postgres::PgExpr};
use uuid::Uuid;

use crate::{
    audit,
    dto::florists::{
        DeliveryQuote, DeliveryQuoteQuery, FloristList, SetupProgress, UpdateFloristProfileRequest,
    },
    entity::{
        florist_profiles::{
            ActiveModel as FloristActive, Column as FloristCol, Entity as FloristProfiles,
            Model as FloristModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    integrations::Coordinates,
    middleware::auth::{AuthUser, ensure_florist},
    models::{FloristProfile, OperatingHours},
    response::{ApiResponse, Meta},
    routes::params::FloristQuery,
    state::AppState,
};

pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// The store profile owned by the signed-in florist.
pub async fn florist_for_user(state: &AppState, user: &AuthUser) -> AppResult<FloristModel> {
    FloristProfiles::find()
        .filter(FloristCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("No store profile for this account".into()))
}

pub fn parse_hhmm(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| AppError::BadRequest(format!("'{value}' is not a valid HH:MM time")))
}

pub fn validate_operating_hours(hours: &OperatingHours) -> AppResult<()> {
    for (day, slot) in hours {
        if !WEEKDAYS.contains(&day.as_str()) {
            return Err(AppError::BadRequest(format!("unknown weekday '{day}'")));
        }
        if slot.closed {
            continue;
        }
        let (Some(open), Some(close)) = (slot.open.as_deref(), slot.close.as_deref()) else {
            return Err(AppError::BadRequest(format!(
                "{day} needs open and close times unless closed"
            )));
        };
        if parse_hhmm(open)? >= parse_hhmm(close)? {
            return Err(AppError::BadRequest(format!(
                "{day} must open before it closes"
            )));
        }
    }
    Ok(())
}

fn validate_profile_update(payload: &UpdateFloristProfileRequest) -> AppResult<()> {
    if let Some(name) = &payload.store_name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("store_name must not be empty".into()));
        }
    }
    if payload.delivery_radius_km.is_some_and(|r| !r.is_finite() || r < 0.0) {
        return Err(AppError::BadRequest(
            "delivery_radius_km must be 0 or more".into(),
        ));
    }
    if payload.delivery_fee.is_some_and(|f| f < 0) {
        return Err(AppError::BadRequest("delivery_fee must be 0 or more".into()));
    }
    if payload.minimum_order.is_some_and(|m| m < 0) {
        return Err(AppError::BadRequest("minimum_order must be 0 or more".into()));
    }
    if let Some(cutoff) = &payload.same_day_cutoff {
        parse_hhmm(cutoff)?;
    }
    if let Some(hours) = &payload.operating_hours {
        validate_operating_hours(hours)?;
    }
    match (payload.latitude, payload.longitude) {
        (Some(lat), Some(lng)) => {
            Coordinates::new(lat, lng)?;
        }
        (None, None) => {}
        _ => {
            return Err(AppError::BadRequest(
                "latitude and longitude must be set together".into(),
            ));
        }
    }
    Ok(())
}

pub async fn get_own_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FloristProfile>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;
    Ok(ApiResponse::success("OK", florist.into(), Some(Meta::empty())))
}

pub async fn update_own_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateFloristProfileRequest,
) -> AppResult<ApiResponse<FloristProfile>> {
    ensure_florist(user)?;
    validate_profile_update(&payload)?;
    let florist = florist_for_user(state, user).await?;

    let mut active: FloristActive = florist.into();
    if let Some(v) = payload.store_name {
        active.store_name = Set(v.trim().to_string());
    }
    if let Some(v) = payload.about {
        active.about = Set(Some(v));
    }
    if let Some(v) = payload.phone {
        active.phone = Set(Some(v));
    }
    if let Some(v) = payload.website {
        active.website = Set(Some(v));
    }
    if let Some(v) = payload.address {
        active.address = Set(Some(v));
    }
    if let Some(v) = payload.suburb {
        active.suburb = Set(Some(v));
    }
    if let Some(v) = payload.state {
        active.state = Set(Some(v));
    }
    if let Some(v) = payload.postcode {
        active.postcode = Set(Some(v));
    }
    if let (Some(lat), Some(lng)) = (payload.latitude, payload.longitude) {
        active.latitude = Set(Some(lat));
        active.longitude = Set(Some(lng));
    }
    if let Some(hours) = payload.operating_hours {
        let value = serde_json::to_value(hours).map_err(anyhow::Error::from)?;
        active.operating_hours = Set(Some(value));
    }
    if let Some(v) = payload.delivery_enabled {
        active.delivery_enabled = Set(v);
    }
    if let Some(v) = payload.pickup_enabled {
        active.pickup_enabled = Set(v);
    }
    if let Some(v) = payload.delivery_radius_km {
        active.delivery_radius_km = Set(v);
    }
    if let Some(v) = payload.delivery_fee {
        active.delivery_fee = Set(v);
    }
    if let Some(v) = payload.minimum_order {
        active.minimum_order = Set(v);
    }
    if let Some(v) = payload.same_day_cutoff {
        active.same_day_cutoff = Set(Some(v.trim().to_string()));
    }
    if let Some(v) = payload.logo_url {
        active.logo_url = Set(Some(v));
    }
    active.updated_at = Set(Utc::now().into());
    let florist = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "florist_profile_update",
        "florist_profiles",
        serde_json::json!({ "florist_id": florist.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Store updated",
        florist.into(),
        Some(Meta::empty()),
    ))
}

pub fn compute_setup_progress(florist: &FloristProfile, product_count: u64) -> SetupProgress {
    let store_details = !florist.store_name.trim().is_empty()
        && florist.phone.as_deref().is_some_and(|p| !p.trim().is_empty());
    let address = florist.address.as_deref().is_some_and(|a| !a.trim().is_empty())
        && florist.latitude.is_some()
        && florist.longitude.is_some();
    let operating_hours = florist
        .operating_hours
        .as_ref()
        .is_some_and(|hours| hours.values().any(|day| !day.closed));
    let fulfillment_settings = florist.pickup_enabled
        || (florist.delivery_enabled && florist.delivery_radius_km > 0.0);
    let products = product_count > 0;

    let steps = [store_details, address, operating_hours, fulfillment_settings, products];
    let completed_steps = steps.iter().filter(|done| **done).count() as u8;
    let total_steps = steps.len() as u8;
    SetupProgress {
        store_details,
        address,
        operating_hours,
        fulfillment_settings,
        products,
        completed_steps,
        total_steps,
        percent: completed_steps * 100 / total_steps,
    }
}

pub async fn setup_progress(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SetupProgress>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;
    let product_count = Products::find()
        .filter(ProdCol::FloristId.eq(florist.id))
        .count(&state.orm)
        .await?;
    let progress = compute_setup_progress(&florist.into(), product_count);
    Ok(ApiResponse::success("OK", progress, Some(Meta::empty())))
}

/// Case-insensitive match on store name or suburb.
fn store_search(q: Option<&str>) -> Condition {
    let mut condition = Condition::all();
    if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(FloristCol::StoreName).ilike(pattern.clone()))
                .add(Expr::col(FloristCol::Suburb).ilike(pattern)),
        );
    }
    condition
}

pub async fn list_florists(
    state: &AppState,
    query: FloristQuery,
) -> AppResult<ApiResponse<FloristList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let finder = FloristProfiles::find()
        .filter(store_search(query.q.as_deref()))
        .order_by_asc(FloristCol::StoreName);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(FloristProfile::from)
        .collect();

    Ok(ApiResponse::success(
        "Florists",
        FloristList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_florist(state: &AppState, id: Uuid) -> AppResult<ApiResponse<FloristProfile>> {
    let florist = FloristProfiles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Florist", florist.into(), None))
}

pub fn store_location(florist: &FloristModel) -> AppResult<Coordinates> {
    match (florist.latitude, florist.longitude) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        _ => Err(AppError::BadRequest(
            "This florist has not set a store location".into(),
        )),
    }
}

pub async fn delivery_quote(
    state: &AppState,
    id: Uuid,
    query: DeliveryQuoteQuery,
) -> AppResult<ApiResponse<DeliveryQuote>> {
    let florist = FloristProfiles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !florist.delivery_enabled {
        return Err(AppError::BadRequest("This florist does not deliver".into()));
    }
    let from = store_location(&florist)?;
    let to = Coordinates::new(query.latitude, query.longitude)?;
    let route = state.integrations.router.driving_route(from, to).await?;

    let quote = DeliveryQuote {
        within_radius: route.distance_km <= florist.delivery_radius_km,
        route,
        delivery_radius_km: florist.delivery_radius_km,
        delivery_fee: florist.delivery_fee,
        minimum_order: florist.minimum_order,
    };
    Ok(ApiResponse::success("Delivery quote", quote, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayHours;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn store_search_ignores_case() {
        let sql = FloristProfiles::find()
            .filter(store_search(Some(" Fitzroy ")))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""store_name" ILIKE '%Fitzroy%'"#));
        assert!(sql.contains(r#""suburb" ILIKE '%Fitzroy%'"#));

        let all = FloristProfiles::find()
            .filter(store_search(Some("  ")))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(!all.contains("ILIKE"));
    }

    fn florist() -> FloristProfile {
        FloristProfile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            store_name: "Wild Stems".into(),
            about: None,
            phone: None,
            website: None,
            address: None,
            suburb: None,
            state: None,
            postcode: None,
            latitude: None,
            longitude: None,
            operating_hours: None,
            delivery_enabled: false,
            pickup_enabled: false,
            delivery_radius_km: 0.0,
            delivery_fee: 0,
            minimum_order: 0,
            same_day_cutoff: None,
            logo_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(open: &str, close: &str) -> DayHours {
        DayHours {
            open: Some(open.into()),
            close: Some(close.into()),
            closed: false,
        }
    }

    #[test]
    fn new_store_has_no_progress() {
        let progress = compute_setup_progress(&florist(), 0);
        assert_eq!(progress.completed_steps, 0);
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn complete_store_reaches_one_hundred_percent() {
        let mut f = florist();
        f.phone = Some("0400 000 000".into());
        f.address = Some("1 Petal St".into());
        f.latitude = Some(-37.81);
        f.longitude = Some(144.96);
        f.operating_hours = Some(OperatingHours::from([("monday".to_string(), day("08:00", "17:00"))]));
        f.delivery_enabled = true;
        f.delivery_radius_km = 15.0;

        let progress = compute_setup_progress(&f, 3);
        assert_eq!(progress.completed_steps, 5);
        assert_eq!(progress.percent, 100);

        let progress = compute_setup_progress(&f, 0);
        assert!(!progress.products);
        assert_eq!(progress.percent, 80);
    }

    #[test]
    fn operating_hours_validation() {
        let good = OperatingHours::from([
            ("monday".to_string(), day("08:00", "17:00")),
            (
                "sunday".to_string(),
                DayHours {
                    open: None,
                    close: None,
                    closed: true,
                },
            ),
        ]);
        assert!(validate_operating_hours(&good).is_ok());

        let backwards = OperatingHours::from([("friday".to_string(), day("17:00", "08:00"))]);
        assert!(validate_operating_hours(&backwards).is_err());

        let unknown = OperatingHours::from([("funday".to_string(), day("08:00", "09:00"))]);
        assert!(validate_operating_hours(&unknown).is_err());

        let bad_time = OperatingHours::from([("monday".to_string(), day("8am", "17:00"))]);
        assert!(validate_operating_hours(&bad_time).is_err());
    }

    #[test]
    fn profile_update_validation() {
        let payload = UpdateFloristProfileRequest {
            delivery_fee: Some(-1),
            ..Default::default()
        };
        assert!(validate_profile_update(&payload).is_err());

        let payload = UpdateFloristProfileRequest {
            latitude: Some(-33.0),
            ..Default::default()
        };
        assert!(validate_profile_update(&payload).is_err());

        let payload = UpdateFloristProfileRequest {
            same_day_cutoff: Some("14:30".into()),
            delivery_radius_km: Some(12.5),
            ..Default::default()
        };
        assert!(validate_profile_update(&payload).is_ok());
    }
}
