//! Endee REST client implementing [`VectorDatabase`] over blocking ureq calls.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::{
    application::services::VectorDatabase,
    domain::{
        BackupInfo, DomainError, FilterCondition, FilterUpdate, IndexConfig, IndexInfo,
        OperationResult, SearchQuery, SearchResult, VectorItem,
    },
    settings::EndeeSettings,
};

use super::{encode_segment, map_ureq_error, read_body_bytes, read_body_text};

pub struct EndeeClient {
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
}

impl EndeeClient {
    pub fn new(settings: &EndeeSettings) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        Self {
            base_url: format!("{}/api/v1", settings.url.trim_end_matches('/')),
            auth_token: settings.auth_token.clone(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = format!("{}{}", self.base_url, path);
        trace!(target: "endee_mcp::client", %method, %url, "request");
        let request = self.agent.request(method, &url);
        match &self.auth_token {
            Some(token) => request.set("Authorization", token),
            None => request,
        }
    }

    fn call(&self, method: &str, path: &str) -> Result<ureq::Response, DomainError> {
        self.request(method, path).call().map_err(map_ureq_error)
    }

    fn send<T: Serialize>(
        &self,
        method: &str,
        path: &str,
        body: &T,
    ) -> Result<ureq::Response, DomainError> {
        let body = serde_json::to_value(body)
            .map_err(|err| DomainError::other(format!("failed to encode request body: {err}")))?;
        self.request(method, path)
            .send_json(body)
            .map_err(map_ureq_error)
    }

    fn json(response: ureq::Response) -> Result<Value, DomainError> {
        response
            .into_json()
            .map_err(|err| DomainError::decode(format!("invalid JSON response: {err}")))
    }

    fn acknowledged(response: ureq::Response) -> Result<OperationResult, DomainError> {
        Ok(OperationResult::ok(read_body_text(response)?.trim()))
    }

    fn index_path(index: &str, rest: &str) -> String {
        format!("/index/{}{}", encode_segment(index), rest)
    }
}

impl VectorDatabase for EndeeClient {
    fn health(&self) -> Result<Value, DomainError> {
        Self::json(self.call("GET", "/health")?)
    }

    fn stats(&self) -> Result<Value, DomainError> {
        Self::json(self.call("GET", "/stats")?)
    }

    fn create_index(&self, config: &IndexConfig) -> Result<OperationResult, DomainError> {
        let response = self.send("POST", "/index/create", &config.to_wire())?;
        Self::acknowledged(response)
    }

    fn list_indexes(&self) -> Result<Vec<IndexInfo>, DomainError> {
        let body = Self::json(self.call("GET", "/index/list")?)?;
        let entries = match body.get("indexes") {
            Some(Value::Array(entries)) => entries.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(DomainError::decode(format!(
                    "expected an `indexes` array, got {other}"
                )))
            }
        };

        entries
            .into_iter()
            .map(|entry| {
                let entry = match entry {
                    Value::String(name) => json!({ "name": name }),
                    other => other,
                };
                serde_json::from_value(entry)
                    .map_err(|err| DomainError::decode(format!("invalid index entry: {err}")))
            })
            .collect()
    }

    fn describe_index(&self, name: &str) -> Result<Value, DomainError> {
        Self::json(self.call("GET", &Self::index_path(name, "/info"))?)
    }

    fn delete_index(&self, name: &str) -> Result<OperationResult, DomainError> {
        Self::acknowledged(self.call("DELETE", &Self::index_path(name, "/delete"))?)
    }

    fn upsert_vectors(&self, index: &str, vectors: &[VectorItem]) -> Result<(), DomainError> {
        self.send("POST", &Self::index_path(index, "/vector/insert"), &vectors)?;
        debug!(target: "endee_mcp::client", index, count = vectors.len(), "vectors upserted");
        Ok(())
    }

    fn get_vector(&self, index: &str, id: &str) -> Result<Option<Value>, DomainError> {
        let response = match self.send(
            "POST",
            &Self::index_path(index, "/vector/get"),
            &json!({ "id": id }),
        ) {
            Ok(response) => response,
            Err(DomainError::RemoteService { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };

        let bytes = read_body_bytes(response)?;
        rmp_serde::from_slice::<Value>(&bytes)
            .map(Some)
            .map_err(|err| DomainError::decode(format!("invalid MessagePack vector: {err}")))
    }

    fn delete_vector(&self, index: &str, id: &str) -> Result<OperationResult, DomainError> {
        let path = Self::index_path(index, &format!("/vector/{}/delete", encode_segment(id)));
        Self::acknowledged(self.call("DELETE", &path)?)
    }

    fn delete_by_filter(
        &self,
        index: &str,
        filter: &[FilterCondition],
    ) -> Result<u64, DomainError> {
        let response = self.send(
            "DELETE",
            &Self::index_path(index, "/vectors/delete"),
            &json!({ "filter": filter }),
        )?;
        let text = read_body_text(response)?;
        parse_deleted_count(&text)
    }

    fn update_filters(
        &self,
        index: &str,
        updates: &[FilterUpdate],
    ) -> Result<OperationResult, DomainError> {
        let response = self.send(
            "POST",
            &Self::index_path(index, "/filters/update"),
            &json!({ "updates": updates }),
        )?;
        Self::acknowledged(response)
    }

    fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError> {
        let response = self.send("POST", &Self::index_path(index, "/search"), &query.to_wire()?)?;
        let bytes = read_body_bytes(response)?;
        let results: Vec<SearchResult> = rmp_serde::from_slice(&bytes)
            .map_err(|err| DomainError::decode(format!("invalid MessagePack search response: {err}")))?;
        debug!(target: "endee_mcp::client", index, hits = results.len(), "search completed");
        Ok(results)
    }

    fn create_backup(&self, index: &str, backup: &str) -> Result<OperationResult, DomainError> {
        let response = self.send(
            "POST",
            &Self::index_path(index, "/backup"),
            &json!({ "name": backup }),
        )?;
        Self::acknowledged(response)
    }

    fn list_backups(&self) -> Result<Vec<BackupInfo>, DomainError> {
        let body = Self::json(self.call("GET", "/backups")?)?;
        match body.get("backups") {
            Some(Value::Array(entries)) => entries
                .iter()
                .cloned()
                .map(BackupInfo::from_value)
                .collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(DomainError::decode(format!(
                "expected a `backups` array, got {other}"
            ))),
        }
    }

    fn restore_backup(
        &self,
        backup: &str,
        target_index: &str,
    ) -> Result<OperationResult, DomainError> {
        let path = format!("/backups/{}/restore", encode_segment(backup));
        let response = self.send("POST", &path, &json!({ "target_index_name": target_index }))?;
        Self::acknowledged(response)
    }

    fn delete_backup(&self, backup: &str) -> Result<OperationResult, DomainError> {
        let path = format!("/backups/{}", encode_segment(backup));
        Self::acknowledged(self.call("DELETE", &path)?)
    }
}

/// Endee answers filter deletes with text such as `"12 vectors deleted"`.
fn parse_deleted_count(text: &str) -> Result<u64, DomainError> {
    text.split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| DomainError::decode(format!("unexpected delete response `{}`", text.trim())))
}
