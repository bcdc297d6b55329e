//! HTTP implementation of [`ConsultationGateway`].

use std::time::{SystemTime, UNIX_EPOCH};

use consulta_core::{
    async_trait, section_has_data, AiEditRequest, Consultation, ConsultationGateway,
    ConsultationPage, ConsultationPatch, FieldUpdate, FieldUpdateResult, GatewayError,
    GenerationRequest, ListQuery, PatientIntake, Section,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;

/// AI edit body as the gateway expects it: the request plus the webhook the
/// gateway should forward it to.
#[derive(Debug, Serialize)]
struct AiEditBody<'a> {
    #[serde(rename = "webhookUrl")]
    webhook_url: &'a str,
    #[serde(flatten)]
    request: &'a AiEditRequest,
}

/// Client for the consultation gateway.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a client with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %config.base_url, "Gateway client initialized");

        Ok(Self { http, config })
    }

    /// Create a client from environment variables.
    ///
    /// See [`GatewayConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::from_env()?)
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build an authenticated request against the gateway.
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.config.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body.
    async fn send(&self, builder: RequestBuilder) -> Result<Value, GatewayError> {
        let response = builder.send().await.map_err(transport_error)?;
        handle_response(response).await
    }
}

/// Convert a non-success status into the matching error, or decode the body.
///
/// An empty success body decodes to `Value::Null`.
async fn handle_response(response: Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let path = response.url().path().to_string();

    match status {
        status if status.is_success() => {
            let body = response.text().await.map_err(transport_error)?;
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
        }
        StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
        StatusCode::FORBIDDEN => {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Forbidden(if body.is_empty() { path } else { body }))
        }
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound(path)),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::Status {
                code: status.as_u16(),
                body,
            })
        }
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_decode() {
        GatewayError::Decode(e.to_string())
    } else {
        GatewayError::Network(e.to_string())
    }
}

/// Strip a `{success, data}` / `{<key>: ...}` envelope.
///
/// `success: false` becomes [`GatewayError::Rejected`] carrying the gateway's
/// `message` or `error` text.
fn unwrap_envelope(value: Value, key: &str) -> Result<Value, GatewayError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };

    if map.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = ["message", "error"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .unwrap_or("request rejected")
            .to_string();
        return Err(GatewayError::Rejected(reason));
    }

    if let Some(inner) = map.remove(key) {
        return Ok(inner);
    }
    if let Some(inner) = map.remove("data") {
        if let Value::Object(ref data) = inner {
            if let Some(nested) = data.get(key) {
                return Ok(nested.clone());
            }
        }
        return Ok(inner);
    }

    // An acknowledgement with no payload carries no data.
    if map.remove("success").is_some() {
        map.remove("message");
        map.remove("error");
        if map.is_empty() {
            return Ok(Value::Null);
        }
    }
    Ok(Value::Object(map))
}

fn decode_consultation(value: Value) -> Result<Consultation, GatewayError> {
    let value = unwrap_envelope(value, "consultation")?;
    serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn decode_page(value: Value, query: &ListQuery) -> Result<ConsultationPage, GatewayError> {
    let has_rows = matches!(
        &value,
        Value::Object(map) if map.contains_key("consultations") || map.contains_key("items")
    );
    let value = if has_rows || value.is_array() {
        value
    } else {
        unwrap_envelope(value, "data")?
    };

    let (rows, pagination) = match value {
        Value::Array(rows) => (rows, Value::Null),
        Value::Object(mut map) => {
            let rows = match map.remove("consultations").or_else(|| map.remove("items")) {
                Some(Value::Array(rows)) => rows,
                _ => {
                    return Err(GatewayError::Decode(
                        "list response has no consultations array".to_string(),
                    ))
                }
            };
            let pagination = map.remove("pagination").unwrap_or(Value::Object(map));
            (rows, pagination)
        }
        other => {
            return Err(GatewayError::Decode(format!(
                "unexpected list response: {}",
                other
            )))
        }
    };

    let mut consultations = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<Consultation>(row) {
            Ok(consultation) => consultations.push(consultation),
            Err(e) => warn!(error = %e, "Skipping unparseable consultation row"),
        }
    }

    let number = |key: &str| pagination.get(key).and_then(Value::as_u64);

    Ok(ConsultationPage {
        consultations,
        total: number("total"),
        page: number("page").map(|p| p as u32).unwrap_or(query.page),
        limit: number("limit").map(|l| l as u32).unwrap_or(query.limit),
    })
}

fn decode_intake(value: Value) -> Result<PatientIntake, GatewayError> {
    let patient = unwrap_envelope(value, "patient")?;
    let status = patient
        .pointer("/anamnese/status")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(PatientIntake { status })
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl ConsultationGateway for GatewayClient {
    async fn list_consultations(&self, query: &ListQuery) -> Result<ConsultationPage, GatewayError> {
        let url = self.config.consultations_url();
        debug!(page = query.page, limit = query.limit, "List consultations");

        let body = self
            .send(self.request(Method::GET, &url).query(&query.to_pairs()))
            .await?;
        decode_page(body, query)
    }

    async fn get_consultation(&self, id: &str) -> Result<Consultation, GatewayError> {
        let url = self.config.consultation_url(id);
        debug!(consultation_id = %id, "Get consultation");

        let body = self
            .send(
                self.request(Method::GET, &url)
                    .header("Cache-Control", "no-cache")
                    .query(&[("_t", cache_buster())]),
            )
            .await?;
        decode_consultation(body)
    }

    async fn update_consultation(
        &self,
        id: &str,
        patch: &ConsultationPatch,
    ) -> Result<Consultation, GatewayError> {
        let url = self.config.consultation_url(id);
        debug!(consultation_id = %id, patch = ?patch, "Update consultation");

        let body = self
            .send(self.request(Method::PATCH, &url).json(patch))
            .await?;

        match decode_consultation(body) {
            Ok(consultation) => Ok(consultation),
            Err(GatewayError::Decode(reason)) => {
                debug!(consultation_id = %id, reason = %reason, "Update response had no record, re-reading");
                self.get_consultation(id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_consultation(&self, id: &str) -> Result<(), GatewayError> {
        let url = self.config.consultation_url(id);
        info!(consultation_id = %id, "Delete consultation");

        let body = self.send(self.request(Method::DELETE, &url)).await?;
        unwrap_envelope(body, "consultation").map(|_| ())
    }

    async fn get_section(&self, id: &str, section: Section) -> Result<Option<Value>, GatewayError> {
        let url = self.config.section_url(id, section);
        debug!(consultation_id = %id, section = %section, "Get section");

        let body = match self.send(self.request(Method::GET, &url)).await {
            Ok(body) => body,
            Err(GatewayError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let data = unwrap_envelope(body, "data")?;
        Ok(section_has_data(&data).then_some(data))
    }

    async fn update_field(
        &self,
        id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldUpdateResult, GatewayError> {
        let url = self.config.update_field_url(id, update.section);
        debug!(
            consultation_id = %id,
            section = %update.section,
            field_path = %update.field_path,
            "Update field"
        );

        let body = self
            .send(self.request(Method::POST, &url).json(update))
            .await?;
        let data = unwrap_envelope(body, "data")?;

        Ok(FieldUpdateResult {
            data: section_has_data(&data).then_some(data),
        })
    }

    async fn get_patient_intake(&self, patient_id: &str) -> Result<PatientIntake, GatewayError> {
        let url = self.config.patient_url(patient_id);
        debug!(patient_id = %patient_id, "Get patient intake");

        let body = self.send(self.request(Method::GET, &url)).await?;
        decode_intake(body)
    }

    async fn dispatch_ai_edit(&self, request: &AiEditRequest) -> Result<Value, GatewayError> {
        let webhook_url = self.config.ai_edit_webhook_url.as_deref().ok_or_else(|| {
            GatewayError::Configuration("CONSULTAS_AI_EDIT_WEBHOOK_URL not set".to_string())
        })?;
        let url = self.config.ai_edit_url();
        debug!(
            consultation_id = %request.consultation_id,
            field_path = %request.field_path,
            "Dispatch AI edit"
        );

        let body = AiEditBody {
            webhook_url,
            request,
        };
        self.send(self.request(Method::POST, &url).json(&body)).await
    }

    async fn trigger_generation(&self, request: &GenerationRequest) -> Result<(), GatewayError> {
        let url = self.config.generation_webhook(request.kind).ok_or_else(|| {
            GatewayError::Configuration(format!("no webhook configured for {:?}", request.kind))
        })?;
        info!(
            consultation_id = %request.consultation_id,
            kind = ?request.kind,
            "Trigger generation"
        );

        // External webhook: no gateway credentials.
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(response).await.map(|_| ())
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consulta_core::ConsultationStatus;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope_variants() {
        let bare = json!({"id": "c-1", "status": "CREATED"});
        assert_eq!(unwrap_envelope(bare.clone(), "consultation").unwrap(), bare);

        let keyed = json!({"consultation": {"id": "c-1"}});
        assert_eq!(
            unwrap_envelope(keyed, "consultation").unwrap(),
            json!({"id": "c-1"})
        );

        let data = json!({"success": true, "data": {"id": "c-1"}});
        assert_eq!(
            unwrap_envelope(data, "consultation").unwrap(),
            json!({"id": "c-1"})
        );

        let nested = json!({"success": true, "data": {"patient": {"id": "p-1"}}});
        assert_eq!(unwrap_envelope(nested, "patient").unwrap(), json!({"id": "p-1"}));
    }

    #[test]
    fn test_unwrap_envelope_acknowledgement() {
        let ack = json!({"success": true, "message": "Campo atualizado"});
        assert_eq!(unwrap_envelope(ack, "data").unwrap(), Value::Null);

        let keyed_null = json!({"success": true, "diagnostico": null});
        let value = unwrap_envelope(keyed_null, "data").unwrap();
        assert_eq!(value, json!({"diagnostico": null}));
        assert!(!section_has_data(&value));
    }

    #[test]
    fn test_unwrap_envelope_rejection() {
        let rejected = json!({"success": false, "message": "campo inválido"});
        match unwrap_envelope(rejected, "data") {
            Err(GatewayError::Rejected(reason)) => assert_eq!(reason, "campo inválido"),
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_page_with_pagination() {
        let body = json!({
            "consultations": [
                {"id": "c-1", "status": "PROCESSING"},
                {"id": 42},
                {"id": "c-2", "status": "COMPLETED"}
            ],
            "pagination": {"page": 2, "limit": 10, "total": 31}
        });

        let page = decode_page(body, &ListQuery::default()).unwrap();
        assert_eq!(page.consultations.len(), 2);
        assert_eq!(page.consultations[0].status, ConsultationStatus::Processing);
        assert_eq!(page.total, Some(31));
        assert_eq!(page.page, 2);
        assert_eq!(page.limit, 10);
    }

    #[test]
    fn test_decode_page_bare_array_uses_query() {
        let body = json!([{"id": "c-1", "status": "CREATED"}]);
        let query = ListQuery {
            page: 3,
            limit: 5,
            ..Default::default()
        };
        let page = decode_page(body, &query).unwrap();
        assert_eq!(page.consultations.len(), 1);
        assert_eq!(page.page, 3);
        assert_eq!(page.limit, 5);
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_decode_intake() {
        let body = json!({"patient": {"id": "p-1", "anamnese": {"status": "preenchida"}}});
        assert!(decode_intake(body).unwrap().is_filled());

        let body = json!({"id": "p-1"});
        assert_eq!(decode_intake(body).unwrap(), PatientIntake { status: None });
    }
}
