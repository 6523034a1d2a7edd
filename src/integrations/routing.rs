use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

const MAPBOX_DIRECTIONS_URL: &str = "https://api.mapbox.com/directions/v5/mapbox/driving";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::BadRequest("coordinates out of range".into()));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_minutes: f64,
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn driving_route(&self, from: Coordinates, to: Coordinates) -> AppResult<RouteEstimate>;
}

pub struct MapboxRouter {
    client: reqwest::Client,
    access_token: Option<String>,
}

impl MapboxRouter {
    pub fn new(client: reqwest::Client, access_token: Option<String>) -> Self {
        Self {
            client,
            access_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

#[async_trait]
impl RouteProvider for MapboxRouter {
    async fn driving_route(&self, from: Coordinates, to: Coordinates) -> AppResult<RouteEstimate> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(AppError::ServiceUnavailable("routing is not configured"))?;

        let url = format!(
            "{MAPBOX_DIRECTIONS_URL}/{},{};{},{}",
            from.longitude, from.latitude, to.longitude, to.latitude
        );
        let response = self
            .client
            .get(url)
            .query(&[("access_token", token), ("overview", "false")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("routing request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "routing API returned {}",
                response.status()
            )));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid routing response: {e}")))?;

        route_from_response(body)
    }
}

fn route_from_response(body: DirectionsResponse) -> AppResult<RouteEstimate> {
    if body.code != "Ok" {
        return Err(AppError::BadRequest(format!(
            "no driving route found ({})",
            body.code
        )));
    }
    let route = body
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("no driving route found".into()))?;

    Ok(RouteEstimate {
        distance_km: route.distance / 1000.0,
        duration_minutes: route.duration / 60.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_meters_and_seconds() {
        let body: DirectionsResponse = serde_json::from_str(
            r#"{"code":"Ok","routes":[{"distance":12500.0,"duration":900.0,"weight":1.0}]}"#,
        )
        .unwrap();
        let route = route_from_response(body).unwrap();
        assert_eq!(route.distance_km, 12.5);
        assert_eq!(route.duration_minutes, 15.0);
    }

    #[test]
    fn no_route_is_a_client_error() {
        let body: DirectionsResponse =
            serde_json::from_str(r#"{"code":"NoRoute","routes":[]}"#).unwrap();
        assert!(matches!(
            route_from_response(body),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinates::new(-33.86, 151.2).is_ok());
        assert!(Coordinates::new(95.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
    }

    #[tokio::test]
    async fn unconfigured_router_is_unavailable() {
        let router = MapboxRouter::new(reqwest::Client::new(), None);
        let point = Coordinates::new(0.0, 0.0).unwrap();
        let result = router.driving_route(point, point).await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
    }
}
