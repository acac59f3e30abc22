use std::str::FromStr;

use geojson::{FeatureCollection, GeoJson};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SurveyError;
use crate::types::{GeoBounds, OverlayDescriptor, Route, RoutePoint};

/// A route as sent to, and listed by, the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub points: Vec<RoutePoint>,
    #[serde(default)]
    pub point_count: Option<usize>,
}

impl RoutePayload {
    /// Blank names are sent as `null` so the backend falls back to a timestamp name.
    pub fn new(route: &Route, name: Option<&str>, created_at: String) -> Self {
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
        RoutePayload {
            name,
            created_at: Some(created_at),
            points: route.points.clone(),
            point_count: Some(route.points.len()),
        }
    }

    pub fn point_count(&self) -> usize {
        self.point_count.unwrap_or(self.points.len())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Stratification {
    pub image_path: String,
    pub bounds: GeoBounds,
    #[serde(default)]
    pub cluster_count: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub site_id: String,
    pub site_name: String,
    #[serde(default)]
    pub stratifications: Vec<Stratification>,
}

impl SiteRecord {
    /// One raster overlay per stratification, keyed by its image path.
    pub fn descriptors(&self) -> Vec<OverlayDescriptor> {
        self.stratifications
            .iter()
            .map(|strat| {
                let mut descriptor = OverlayDescriptor::raster(&strat.image_path, &strat.image_path, strat.bounds);
                descriptor.label = Some(format!("{} Clusters", strat.cluster_count));
                descriptor
            })
            .collect()
    }
}

/// A bird-spotting location; observations are kept as-is for the details panel.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotRecord {
    #[serde(default)]
    pub spot_id: Option<String>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub observations: Vec<Value>,
}

pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection, SurveyError> {
    match GeoJson::from_str(text)? {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection { bbox: None, features: vec![feature], foreign_members: None }),
        GeoJson::Geometry(_) => Err(SurveyError::InvalidOverlay("expected features, got a bare geometry".into())),
    }
}

/// Turns a non-2xx response into `Rejected`, using the server's `message` or `detail`.
async fn check(response: Response) -> Result<Response, SurveyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SurveyError::Rejected { status: status.as_u16(), message: error_message(&body, status.as_u16()) })
}

fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("detail"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| format!("HTTP error! status: {}", status))
}

fn endpoint(api_base: &str, path: &str) -> String {
    format!("{}/{}", api_base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// REST collaborator for the survey backend.
#[derive(Clone)]
pub struct Backend {
    client: Client,
    api_base: String,
}

impl Backend {
    pub fn new(api_base: &str) -> Self {
        Backend { client: Client::new(), api_base: api_base.to_string() }
    }

    /// Returns the server's confirmation message.
    pub async fn save_route(&self, payload: &RoutePayload) -> Result<String, SurveyError> {
        log::info!("Saving route with {} points", payload.point_count());
        let response = self.client.post(endpoint(&self.api_base, "api/save-route")).json(payload).send().await?;
        let json = check(response).await?.json::<Value>().await?;
        Ok(json.get("message").and_then(|m| m.as_str()).unwrap_or("Route saved").to_string())
    }

    pub async fn fetch_routes(&self) -> Result<Vec<RoutePayload>, SurveyError> {
        let response = self.client.get(endpoint(&self.api_base, "api/get-routes")).send().await?;
        let routes = check(response).await?.json::<Vec<RoutePayload>>().await?;
        log::info!("Fetched {} saved routes", routes.len());
        Ok(routes)
    }

    pub async fn fetch_sites(&self) -> Result<Vec<SiteRecord>, SurveyError> {
        let response = self.client.get(endpoint(&self.api_base, "api/get-sites")).send().await?;
        let sites = check(response).await?.json::<Vec<SiteRecord>>().await?;
        log::info!("Fetched {} sites", sites.len());
        Ok(sites)
    }

    pub async fn fetch_spots(&self) -> Result<Vec<SpotRecord>, SurveyError> {
        let response = self.client.get(endpoint(&self.api_base, "api/get-spots")).send().await?;
        let spots = check(response).await?.json::<Vec<SpotRecord>>().await?;
        log::info!("Fetched {} spots", spots.len());
        Ok(spots)
    }

    /// Relative urls are resolved against the api base.
    pub async fn fetch_feature_collection(&self, url: &str) -> Result<FeatureCollection, SurveyError> {
        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            endpoint(&self.api_base, url.trim_start_matches("./"))
        };
        let response = self.client.get(&url).send().await?;
        let text = check(response).await?.text().await?;
        parse_feature_collection(&text)
    }
}
