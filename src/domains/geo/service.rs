use crate::domains::geo::types::{BoundingBox, GeoMatch, GeoPoint};
use crate::errors::{ServiceError, ServiceResult};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// ~40 km box for biasing searches around a device location.
const LOCAL_BIAS_DELTA: f64 = 0.35;

fn postal_regex() -> &'static Regex {
    static POSTAL_REGEX: OnceLock<Regex> = OnceLock::new();
    POSTAL_REGEX.get_or_init(|| Regex::new(r"\b\d{5,6}\b").unwrap())
}

/// Raw Nominatim search/reverse record.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    boundingbox: Option<Vec<String>>,
}

/// Best-effort forward/reverse geocoding against OpenStreetMap Nominatim.
///
/// Collaborator, not core: every failure here degrades to "no location" and
/// must never block the report flow.
pub struct GeocodingService {
    client: reqwest::Client,
    base_url: String,
}

impl GeocodingService {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("village_health_core/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Find coordinates for a free-form place name. Candidate queries are
    /// tried in relevance order, first biased around `bias` (when known),
    /// then globally. `Ok(None)` means no match anywhere.
    pub async fn forward(
        &self,
        query: &str,
        bias: Option<GeoPoint>,
    ) -> ServiceResult<Option<GeoMatch>> {
        let cleaned = clean_query(query);
        if cleaned.is_empty() {
            return Ok(None);
        }
        let candidates = build_candidates(&cleaned);

        if let Some(center) = bias {
            let viewbox = BoundingBox::around(center, LOCAL_BIAS_DELTA);
            for candidate in &candidates {
                if let Some(found) = self.search(candidate, Some(&viewbox)).await? {
                    return Ok(Some(found));
                }
            }
        }

        for candidate in &candidates {
            if let Some(found) = self.search(candidate, None).await? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// Resolve coordinates into a display address.
    pub async fn reverse(&self, point: GeoPoint) -> ServiceResult<Option<String>> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("lat", &point.latitude.to_string()),
                ("lon", &point.longitude.to_string()),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("Reverse geocoding failed: {}", e)))?;

        let place: Option<NominatimPlace> = response.json().await.ok();
        Ok(place.map(|p| p.display_name))
    }

    async fn search(
        &self,
        query: &str,
        viewbox: Option<&BoundingBox>,
    ) -> ServiceResult<Option<GeoMatch>> {
        let url = format!("{}/search", self.base_url);
        let mut params = vec![
            ("format".to_string(), "json".to_string()),
            ("q".to_string(), query.to_string()),
            ("limit".to_string(), "1".to_string()),
            ("addressdetails".to_string(), "1".to_string()),
        ];
        if let Some(viewbox) = viewbox {
            params.push(("viewbox".to_string(), viewbox.as_viewbox_param()));
            params.push(("bounded".to_string(), "1".to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("Geocoding failed: {}", e)))?;

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalService(format!("Geocoding response invalid: {}", e)))?;

        Ok(places.into_iter().next().and_then(parse_place))
    }
}

impl Default for GeocodingService {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip parentheses and collapse whitespace.
fn clean_query(query: &str) -> String {
    let no_parens: String = query
        .chars()
        .map(|c| if c == '(' || c == ')' { ' ' } else { c })
        .collect();
    no_parens.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Candidate queries in relevance order: the cleaned input, a bare postal
/// code when one is embedded, and a country-context fallback.
fn build_candidates(cleaned: &str) -> Vec<String> {
    let mut candidates = vec![cleaned.to_string()];

    if let Some(postal) = postal_regex().find(cleaned) {
        candidates.push(postal.as_str().to_string());
    }

    let has_country = cleaned
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("india") || word == "IN");
    if !has_country {
        candidates.push(format!("{}, India", cleaned));
    }

    candidates
}

fn parse_place(place: NominatimPlace) -> Option<GeoMatch> {
    let latitude: f64 = place.lat.parse().ok()?;
    let longitude: f64 = place.lon.parse().ok()?;

    // Nominatim bounding box order: south, north, west, east.
    let bounding_box = place.boundingbox.as_ref().and_then(|bb| {
        if bb.len() != 4 {
            return None;
        }
        let parsed: Vec<f64> = bb.iter().filter_map(|v| v.parse().ok()).collect();
        if parsed.len() != 4 {
            return None;
        }
        Some(BoundingBox {
            south: parsed[0],
            north: parsed[1],
            west: parsed[2],
            east: parsed[3],
        })
    });

    Some(GeoMatch {
        latitude,
        longitude,
        display_name: place.display_name,
        bounding_box,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_query_strips_parens_and_spaces() {
        assert_eq!(clean_query("Barasat (North)   743201"), "Barasat North 743201");
        assert_eq!(clean_query("   "), "");
    }

    #[test]
    fn test_candidates_include_postal_and_country_fallback() {
        let candidates = build_candidates("Barasat 743201");
        assert_eq!(
            candidates,
            vec![
                "Barasat 743201".to_string(),
                "743201".to_string(),
                "Barasat 743201, India".to_string(),
            ]
        );
    }

    #[test]
    fn test_candidates_skip_country_fallback_when_present() {
        let candidates = build_candidates("Kolkata, India");
        assert_eq!(candidates, vec!["Kolkata, India".to_string()]);
    }

    #[test]
    fn test_parse_place_with_bounding_box() {
        let place = NominatimPlace {
            lat: "22.72".to_string(),
            lon: "88.48".to_string(),
            display_name: "Barasat, West Bengal, India".to_string(),
            boundingbox: Some(vec![
                "22.68".to_string(),
                "22.76".to_string(),
                "88.44".to_string(),
                "88.52".to_string(),
            ]),
        };

        let parsed = parse_place(place).unwrap();
        assert_eq!(parsed.latitude, 22.72);
        let bbox = parsed.bounding_box.unwrap();
        assert_eq!(bbox.south, 22.68);
        assert_eq!(bbox.east, 88.52);
    }

    #[test]
    fn test_parse_place_rejects_bad_coordinates() {
        let place = NominatimPlace {
            lat: "not-a-number".to_string(),
            lon: "88.48".to_string(),
            display_name: "nowhere".to_string(),
            boundingbox: None,
        };
        assert!(parse_place(place).is_none());
    }
}
