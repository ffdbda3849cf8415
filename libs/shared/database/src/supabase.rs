use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::schedule::slot_duration;
use shared_models::user::{Role, UserAccount};

use crate::store::{AppointmentStore, StoreError, UserDirectory};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Non-success answer from the PostgREST API.
#[derive(Error, Debug)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, extra: Option<HeaderMap>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.anon_key))?,
        );

        if let Some(extra) = extra {
            headers.extend(extra);
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self.client.request(method, &url)
            .headers(self.get_headers(headers)?);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(anyhow!(ApiError {
                status: status.as_u16(),
                message: error_text,
            }));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn backend_error(err: anyhow::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// `409` is the exclusion constraint refusing an overlapping active slot.
fn write_error(err: anyhow::Error, appointment: &Appointment) -> StoreError {
    match err.downcast_ref::<ApiError>() {
        Some(api) if api.status == 409 => StoreError::SlotTaken {
            doctor_id: appointment.doctor_id,
            start: appointment.appointment_time,
        },
        _ => backend_error(err),
    }
}

fn format_time(time: NaiveDateTime) -> String {
    urlencoding::encode(&time.format(TIME_FORMAT).to_string()).into_owned()
}

/// Appointment store backed by the `appointments` table behind PostgREST.
///
/// The overlap guarantee comes from the table's exclusion constraint (see
/// `migrations/`); PostgREST reports its violation as `409 Conflict`.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn list(&self, filters: &str) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?{}&order=appointment_time.asc", filters);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(backend_error)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn save(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let body = serde_json::to_value(&appointment)?;
        let result: std::result::Result<Vec<Value>, anyhow::Error> = self.supabase
            .request_with_headers(Method::POST, "/rest/v1/appointments?on_conflict=id", Some(body), Some(headers))
            .await;

        let rows = result.map_err(|err| write_error(err, &appointment))?;

        match rows.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Err(StoreError::Backend("save returned no representation".to_string())),
        }
    }

    async fn save_if_unchanged(
        &self,
        appointment: Appointment,
        read: &Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&doctor_id=eq.{}&patient_id=eq.{}&appointment_time=eq.{}&status=eq.{}",
            read.id,
            read.doctor_id,
            read.patient_id,
            format_time(read.appointment_time),
            read.status,
        );
        let body = serde_json::to_value(&appointment)?;
        let rows: Vec<Value> = self.supabase
            .request_with_headers(Method::PATCH, &path, Some(body), Some(headers))
            .await
            .map_err(|err| write_error(err, &appointment))?;

        // No row matched the filter: someone else wrote first or the row is gone.
        match rows.into_iter().next() {
            Some(row) => Ok(serde_json::from_value(row)?),
            None => Err(StoreError::Stale { id: read.id }),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.list(&format!("id=eq.{}", id)).await?.into_iter().next())
    }

    async fn find_by_doctor_id(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.list(&format!("doctor_id=eq.{}", doctor_id)).await
    }

    async fn find_by_patient_id(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.list(&format!("patient_id=eq.{}", patient_id)).await
    }

    async fn find_by_doctor_id_and_status(
        &self,
        doctor_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(&format!("doctor_id=eq.{}&status=eq.{}", doctor_id, status)).await
    }

    async fn find_by_patient_id_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(&format!("patient_id=eq.{}&status=eq.{}", patient_id, status)).await
    }

    async fn exists_overlapping(
        &self,
        doctor_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        // existing.start + slot > start  <=>  existing.start > start - slot
        let mut filters = format!(
            "doctor_id=eq.{}&status=in.(PENDING,BOOKED)&appointment_time=lt.{}&appointment_time=gt.{}",
            doctor_id,
            format_time(end),
            format_time(start - slot_duration()),
        );
        if let Some(id) = exclude {
            filters.push_str(&format!("&id=neq.{}", id));
        }

        let path = format!("/rest/v1/appointments?select=id&{}&limit=1", filters);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(backend_error)?;
        Ok(!rows.is_empty())
    }

    async fn find_for_doctor_excluding_status(
        &self,
        doctor_id: Uuid,
        excluded: AppointmentStatus,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(&format!(
            "doctor_id=eq.{}&status=neq.{}&appointment_time=gte.{}&appointment_time=lt.{}",
            doctor_id,
            excluded,
            format_time(start),
            format_time(end),
        ))
        .await
    }
}

/// User directory backed by the `users` table behind PostgREST.
pub struct SupabaseUserDirectory {
    supabase: SupabaseClient,
}

impl SupabaseUserDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn list(&self, filters: &str) -> Result<Vec<UserAccount>, StoreError> {
        let path = format!("/rest/v1/users?select=id,name,email,role&{}", filters);
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(backend_error)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.list(&format!("id=eq.{}", id)).await?.into_iter().next())
    }

    async fn find_by_id_and_role(&self, id: Uuid, role: Role) -> Result<Option<UserAccount>, StoreError> {
        Ok(self
            .list(&format!("id=eq.{}&role=eq.{}", id, role))
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        Ok(self
            .list(&format!("email=eq.{}", urlencoding::encode(email)))
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_role(&self, role: Role) -> Result<Vec<UserAccount>, StoreError> {
        self.list(&format!("role=eq.{}&order=name.asc", role)).await
    }
}
