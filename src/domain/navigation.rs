//! Geocoding lookup parameters

use serde::Deserialize;

/// Query of `GET /api/navigation/reverse`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReverseQuery {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lng: Option<String>,
    /// Nominatim spelling, accepted as an alias of `lng`
    #[serde(default)]
    pub lon: Option<String>,
}

/// Query of `GET /api/navigation/forward`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ForwardQuery {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl ReverseQuery {
    pub fn coordinates(&self) -> Result<Coordinates, String> {
        let lat = parse_coordinate("lat", self.lat.as_deref(), 90.0)?;
        let lng = parse_coordinate("lng", self.lng.as_deref().or(self.lon.as_deref()), 180.0)?;
        Ok(Coordinates { lat, lng })
    }
}

impl ForwardQuery {
    pub fn address(&self) -> Result<&str, String> {
        self.address
            .as_deref()
            .or(self.q.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| "address is required".to_string())
    }
}

fn parse_coordinate(name: &str, raw: Option<&str>, bound: f64) -> Result<f64, String> {
    let raw = raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| format!("{} is required", name))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("{} must be a number", name))?;
    if !value.is_finite() || value.abs() > bound {
        return Err(format!("{} must be between -{} and {}", name, bound, bound));
    }
    Ok(value)
}
