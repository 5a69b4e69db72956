//! HTTP client for the parcel backend.
//!
//! Every endpoint answers with a JSON envelope
//! `{"status": "success" | "error", "message": ..., <payload fields>}`.

use super::{GeometryService, MergeRequest, PreviewRequest, SaveRequest};
use crate::config::EditorConfig;
use crate::errors::ServiceError;
use crate::models::{AttributeRecord, Parcel, PreviewPart, SplitLine, TableRef};
use crate::registry::TableSource;
use ahash::AHashMap;
use geo_types::Polygon;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const NOT_FOUND_MESSAGE: &str = "Parcel not found.";

#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    payload: T,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<(T, Option<String>), ServiceError> {
        if self.status == "success" {
            Ok((self.payload, self.message))
        } else {
            Err(ServiceError::Rejected(self.message.unwrap_or_else(|| {
                format!("backend answered with status \"{}\"", self.status)
            })))
        }
    }
}

#[derive(Deserialize)]
struct NoPayload {}

#[derive(Deserialize)]
struct PreviewPayload {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct WirePart {
    geom: geojson::Geometry,
    #[serde(default)]
    suggested_pin: Option<String>,
}

#[derive(Deserialize)]
struct MergePayload {
    new_pin: Option<String>,
}

#[derive(Deserialize)]
struct InfoPayload {
    data: Option<AttributeRecord>,
}

#[derive(Serialize)]
struct SplitBody<'a> {
    schema: &'a str,
    table: &'a str,
    pin: &'a str,
    split_lines: &'a [SplitLine],
    #[serde(skip_serializing_if = "Option::is_none")]
    new_pins: Option<&'a [String]>,
}

#[derive(Serialize)]
struct MergeBody<'a> {
    schema: &'a str,
    table: &'a str,
    base_props: &'a AttributeRecord,
    original_pins: &'a [String],
    geometries: Vec<geojson::Geometry>,
}

pub fn polygon_from_geojson(geometry: geojson::Geometry) -> Result<Polygon<f64>, ServiceError> {
    let geometry = geo_types::Geometry::<f64>::try_from(geometry)
        .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

    match geometry {
        geo_types::Geometry::Polygon(polygon) => Ok(polygon),
        geo_types::Geometry::MultiPolygon(multi) if multi.0.len() == 1 => multi
            .0
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::MalformedResponse("empty multipolygon".into())),
        _ => Err(ServiceError::MalformedResponse(
            "expected a single polygon".to_string(),
        )),
    }
}

pub fn polygon_to_geojson(polygon: &Polygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(polygon))
}

fn property_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Turns a GeoJSON table dump into parcels. Features without a `pin` are
/// skipped; features whose geometry cannot be read keep `geometry: None`.
pub fn parcels_from_geojson(body: &str, table: &TableRef) -> Result<Vec<Parcel>, ServiceError> {
    let geojson: geojson::GeoJson = body
        .parse()
        .map_err(|e: geojson::Error| ServiceError::MalformedResponse(e.to_string()))?;

    let features = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc.features,
        geojson::GeoJson::Feature(f) => vec![f],
        geojson::GeoJson::Geometry(_) => {
            return Err(ServiceError::MalformedResponse(
                "expected features, got a bare geometry".to_string(),
            ));
        }
    };

    let mut parcels = Vec::with_capacity(features.len());

    for feature in features {
        let properties: AHashMap<String, String> = feature
            .properties
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), property_to_string(v)))
            .collect();

        let Some(pin) = properties.get("pin").filter(|p| !p.is_empty()).cloned() else {
            tracing::debug!("skipping feature without pin in {}", table);
            continue;
        };

        let geometry = match feature.geometry {
            Some(g) => match polygon_from_geojson(g) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("parcel {} has unusable geometry: {}", pin, e);
                    None
                }
            },
            None => None,
        };

        let source_dataset = properties
            .get("source_schema")
            .cloned()
            .unwrap_or_else(|| table.dataset.clone());
        let source_table = properties
            .get("source_table")
            .cloned()
            .unwrap_or_else(|| table.table.clone());

        parcels.push(Parcel {
            identifier: pin,
            geometry,
            source_table,
            source_dataset,
            properties,
        });
    }

    Ok(parcels)
}

#[derive(Clone, Debug)]
pub struct HttpGeometryService {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpGeometryService {
    pub fn from_config(config: &EditorConfig) -> Result<Self, ServiceError> {
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ServiceError::Transport(format!("bad api url {}: {}", base, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::Transport(e.to_string()))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read_envelope<T: DeserializeOwned + Send>(
        response: reqwest::Response,
    ) -> Result<(T, Option<String>), ServiceError> {
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<Envelope<T>>(&text) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => {
                Err(ServiceError::Transport(format!("HTTP {}: {}", status, text)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<(T, Option<String>), ServiceError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let url = self.endpoint(path)?;
        let response = self.authorize(self.client.post(url)).json(body).send().await?;
        Self::read_envelope(response).await
    }
}

impl GeometryService for HttpGeometryService {
    #[tracing::instrument(skip(self, request), fields(pin = %request.base_identifier))]
    async fn preview(&self, request: &PreviewRequest) -> Result<Vec<PreviewPart>, ServiceError> {
        let body = SplitBody {
            schema: &request.table.dataset,
            table: &request.table.table,
            pin: &request.base_identifier,
            split_lines: &request.lines,
            new_pins: None,
        };

        let (payload, _) = self
            .post::<_, PreviewPayload>("subdivide/preview", &body)
            .await?;

        payload
            .parts
            .into_iter()
            .map(|part| {
                Ok(PreviewPart {
                    geometry: polygon_from_geojson(part.geom)?,
                    suggested_identifier: part.suggested_pin.unwrap_or_default(),
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, request), fields(pin = %request.base_identifier))]
    async fn save(&self, request: &SaveRequest) -> Result<String, ServiceError> {
        let body = SplitBody {
            schema: &request.table.dataset,
            table: &request.table.table,
            pin: &request.base_identifier,
            split_lines: &request.lines,
            new_pins: Some(&request.new_identifiers),
        };

        let (_, message) = self.post::<_, NoPayload>("subdivide", &body).await?;
        Ok(message.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, request), fields(originals = request.original_identifiers.len()))]
    async fn merge(&self, request: &MergeRequest) -> Result<String, ServiceError> {
        let body = MergeBody {
            schema: &request.table.dataset,
            table: &request.table.table,
            base_props: &request.base_attributes,
            original_pins: &request.original_identifiers,
            geometries: request.geometries.iter().map(polygon_to_geojson).collect(),
        };

        let (payload, _) = self
            .post::<_, MergePayload>("merge-parcels-postgis", &body)
            .await?;

        payload
            .new_pin
            .filter(|pin| !pin.is_empty())
            .ok_or_else(|| ServiceError::MalformedResponse("merge returned no new_pin".into()))
    }

    #[tracing::instrument(skip(self))]
    async fn lookup_parcel(
        &self,
        dataset: &str,
        identifier: &str,
    ) -> Result<Option<AttributeRecord>, ServiceError> {
        let mut url = self.endpoint("parcel-info")?;
        url.query_pairs_mut()
            .append_pair("pin", identifier)
            .append_pair("schema", dataset);

        let response = self.authorize(self.client.get(url)).send().await?;

        match Self::read_envelope::<InfoPayload>(response).await {
            Ok((payload, _)) => Ok(payload.data),
            Err(ServiceError::Rejected(message)) if message == NOT_FOUND_MESSAGE => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl TableSource for HttpGeometryService {
    #[tracing::instrument(skip(self), fields(table = %table))]
    async fn load_table(&self, table: &TableRef) -> Result<Vec<Parcel>, ServiceError> {
        let mut url = self.endpoint("single-table")?;
        url.query_pairs_mut()
            .append_pair("schema", &table.dataset)
            .append_pair("table", &table.table);

        let response = self.authorize(self.client.get(url)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Transport(format!("HTTP {}: {}", status, body)));
        }

        parcels_from_geojson(&body, table)
    }
}
