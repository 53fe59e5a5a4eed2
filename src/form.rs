//! Mutation form: create/edit dialog state for one resource.
//!
//! The form owns its field map and error string. Submission is a two-phase
//! state machine (`begin_submit` / `finish_submit`) so the in-flight guard —
//! the disabled submit button — is part of the contract: a second submit
//! while one is pending issues no request. On failure the entered values are
//! kept so the user can retry.

use std::marker::PhantomData;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::Transport;
use crate::error::ApiError;
use crate::models::Resource;
use crate::session::ShopId;

/// Uploaded images are embedded in the payload as data URLs, entirely in
/// memory; these caps bound that payload.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_IMAGE_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    /// Editing the record with this id.
    Edit(i64),
}

/// A validated, in-flight submission produced by `begin_submit`.
#[derive(Debug)]
pub struct PendingSubmit {
    pub method: Method,
    pub path: String,
    pub payload: Value,
}

pub struct MutationForm<R: Resource> {
    mode: FormMode,
    fields: Map<String, Value>,
    error: Option<String>,
    submitting: bool,
    open: bool,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Default for MutationForm<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> MutationForm<R> {
    pub fn new() -> Self {
        Self {
            mode: FormMode::Create,
            fields: Map::new(),
            error: None,
            submitting: false,
            open: false,
            _resource: PhantomData,
        }
    }

    /// Open in create mode. Fields reset to the given defaults (or blank).
    pub fn open_create(&mut self, defaults: Option<Value>) {
        self.mode = FormMode::Create;
        self.fields = match defaults {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self.fields.remove("id");
        self.error = None;
        self.submitting = false;
        self.open = true;
    }

    /// Open in edit mode, pre-populated from the record. The id is carried in
    /// the mode, never as an editable field.
    pub fn open_edit(&mut self, record: &R) {
        self.mode = FormMode::Edit(record.id());
        self.fields = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self.fields.remove("id");
        self.error = None;
        self.submitting = false;
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.fields.clear();
        self.error = None;
        self.submitting = false;
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validate and embed an uploaded image as a data URL field.
    pub fn attach_image(&mut self, field: &str, bytes: &[u8]) -> Result<(), String> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err("Image is too large (max 5 MB)".to_string());
        }
        let format =
            image::guess_format(bytes).map_err(|_| "Unrecognized image format".to_string())?;
        let mime = match format {
            image::ImageFormat::Png => "image/png",
            image::ImageFormat::Jpeg => "image/jpeg",
            _ => return Err("Only PNG and JPEG images are supported".to_string()),
        };
        let img = image::load_from_memory(bytes).map_err(|e| format!("Invalid image: {e}"))?;
        if img.width() > MAX_IMAGE_DIMENSION || img.height() > MAX_IMAGE_DIMENSION {
            return Err(format!(
                "Image dimensions exceed {MAX_IMAGE_DIMENSION}x{MAX_IMAGE_DIMENSION}"
            ));
        }
        let encoded = BASE64_STANDARD.encode(bytes);
        self.fields.insert(
            field.to_string(),
            Value::String(format!("data:{mime};base64,{encoded}")),
        );
        Ok(())
    }

    /// Validate the fields and mark the form in-flight.
    ///
    /// Fails without a request when the form is closed, a submit is already
    /// pending, or a required field is missing/blank.
    pub fn begin_submit(&mut self, shop: ShopId) -> Result<PendingSubmit, String> {
        if !self.open {
            return Err("Form is not open".to_string());
        }
        if self.submitting {
            return Err("A save is already in progress".to_string());
        }
        for field in R::REQUIRED_FIELDS {
            if !field_present(self.fields.get(*field)) {
                return Err(format!("Missing required field: {field}"));
            }
        }

        let creating = matches!(self.mode, FormMode::Create);
        let mut payload = self.fields.clone();
        payload.remove("id");
        payload.insert("shop_id".to_string(), Value::from(shop));
        R::prepare_payload(&mut payload, creating)?;

        let (method, path) = match self.mode {
            FormMode::Create => (Method::POST, R::PATH.to_string()),
            FormMode::Edit(id) => (Method::PUT, format!("{}/{id}", R::PATH)),
        };

        self.submitting = true;
        debug!(resource = R::NOUN, %method, path, "mutation submit started");
        Ok(PendingSubmit {
            method,
            path,
            payload: Value::Object(payload),
        })
    }

    /// Apply the round-trip result. Success closes and resets the form;
    /// failure keeps the entered values and records one human-readable error.
    pub fn finish_submit(&mut self, result: Result<Value, ApiError>) -> Result<(), String> {
        self.submitting = false;
        match result {
            Ok(_) => {
                self.close();
                Ok(())
            }
            Err(e) => {
                let msg = mutation_error::<R>(e);
                self.error = Some(msg.clone());
                Err(msg)
            }
        }
    }

    /// Full submission round trip. The caller refetches its list controller
    /// after an `Ok`.
    pub async fn submit(
        &mut self,
        transport: &dyn Transport,
        shop: ShopId,
    ) -> Result<(), String> {
        let pending = self.begin_submit(shop)?;
        let result = transport
            .request(pending.method, &pending.path, &[], Some(pending.payload))
            .await;
        self.finish_submit(result)
    }
}

/// One error string for the open form: the backend's own message when the
/// response body carried one, else the resource-specific fallback.
fn mutation_error<R: Resource>(err: ApiError) -> String {
    match err {
        ApiError::Status {
            detail: Some(detail),
            ..
        } => detail,
        ApiError::Status { detail: None, .. } => format!("Failed to save {}", R::NOUN),
        other => other.to_string(),
    }
}

fn field_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
