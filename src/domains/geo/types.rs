use serde::{Deserialize, Serialize};

/// A plain coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// South/west/north/east box used both for result bounds and search bias.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// A box of `delta` degrees in every direction around `center`.
    pub fn around(center: GeoPoint, delta: f64) -> Self {
        Self {
            south: center.latitude - delta,
            west: center.longitude - delta,
            north: center.latitude + delta,
            east: center.longitude + delta,
        }
    }

    /// Nominatim viewbox parameter order: west,south,east,north.
    pub fn as_viewbox_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// Best geocoding hit for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoMatch {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewbox_param_order() {
        let bbox = BoundingBox::around(
            GeoPoint {
                latitude: 22.72,
                longitude: 88.48,
            },
            0.35,
        );
        let param = bbox.as_viewbox_param();
        let parts: Vec<&str> = param.split(',').collect();
        assert_eq!(parts.len(), 4);
        // west < east, south < north
        assert!(parts[0].parse::<f64>().unwrap() < parts[2].parse::<f64>().unwrap());
        assert!(parts[1].parse::<f64>().unwrap() < parts[3].parse::<f64>().unwrap());
    }
}
