use std::{fs, path::Path, sync::Arc};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    application::dtos::ImportReport,
    domain::{models::check_range, DomainError, JsonMap, VectorItem},
};

use super::endee_service::{ProviderSource, VectorDatabase};

pub const MAX_BATCH_SIZE: usize = 10_000;

/// One row of an import source. Rows that could not be parsed are kept so
/// they are reported as failed instead of silently vanishing.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    Parsed(JsonMap),
    Malformed(String),
}

/// Where a record's dense vector comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorSource {
    /// Pre-computed vector: a numeric array or a JSON-encoded array string.
    Field(String),
    /// Text embedded with the active provider.
    Text(String),
}

/// How source fields map onto a [`VectorItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub id_field: String,
    pub source: VectorSource,
    pub meta_fields: Vec<String>,
    pub filter_fields: Vec<String>,
}

impl FieldMapping {
    /// A vector field wins over a text field when both are given.
    pub fn new(
        id_field: String,
        text_field: Option<String>,
        vector_field: Option<String>,
        meta_fields: Vec<String>,
        filter_fields: Vec<String>,
    ) -> Result<Self, DomainError> {
        if id_field.trim().is_empty() {
            return Err(DomainError::validation("id field cannot be empty"));
        }

        let non_blank = |field: Option<String>| field.filter(|f| !f.trim().is_empty());
        let source = match (non_blank(vector_field), non_blank(text_field)) {
            (Some(vector), _) => VectorSource::Field(vector),
            (None, Some(text)) => VectorSource::Text(text),
            (None, None) => {
                return Err(DomainError::validation(
                    "either a text field or a vector field must be provided",
                ))
            }
        };

        Ok(Self {
            id_field,
            source,
            meta_fields,
            filter_fields,
        })
    }

    fn project(&self, record: &JsonMap) -> Result<(VectorItem, Option<String>), String> {
        let id = match record.get(&self.id_field) {
            Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(format!("missing id field `{}`", self.id_field)),
        };

        let (vector, text) = match &self.source {
            VectorSource::Field(field) => {
                let vector = record
                    .get(field)
                    .and_then(parse_vector)
                    .ok_or_else(|| format!("record `{id}` has no numeric vector in `{field}`"))?;
                (vector, None)
            }
            VectorSource::Text(field) => match record.get(field) {
                Some(Value::String(text)) if !text.trim().is_empty() => (Vec::new(), Some(text.clone())),
                _ => return Err(format!("record `{id}` has no text in `{field}`")),
            },
        };

        let mut item = VectorItem::new(id, vector);
        item.meta = pick_fields(record, &self.meta_fields);
        item.filter = pick_fields(record, &self.filter_fields);
        Ok((item, text))
    }
}

fn pick_fields(record: &JsonMap, fields: &[String]) -> Option<JsonMap> {
    if fields.is_empty() {
        return None;
    }
    Some(
        fields
            .iter()
            .filter_map(|field| record.get(field).map(|v| (field.clone(), v.clone())))
            .collect(),
    )
}

fn parse_vector(value: &Value) -> Option<Vec<f32>> {
    let parsed;
    let array = match value {
        Value::Array(array) => array,
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).ok()?;
            parsed.as_array()?
        }
        _ => return None,
    };
    if array.is_empty() {
        return None;
    }
    array
        .iter()
        .map(|component| component.as_f64().map(|c| c as f32))
        .collect()
}

fn ensure_exists(path: &Path) -> Result<(), DomainError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DomainError::file_not_found(path.display().to_string()))
    }
}

/// Reads a `.json` array, or one object per line for `.jsonl` / `.ndjson`.
pub fn read_json_records(path: impl AsRef<Path>) -> Result<Vec<SourceRecord>, DomainError> {
    let path = path.as_ref();
    ensure_exists(path)?;
    let content = fs::read_to_string(path)
        .map_err(|err| DomainError::other(format!("failed to read {}: {err}", path.display())))?;

    let line_delimited = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"));

    if line_delimited {
        return Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(number, line)| match serde_json::from_str::<Value>(line) {
                Ok(value) => into_record(value),
                Err(err) => SourceRecord::Malformed(format!("line {}: {err}", number + 1)),
            })
            .collect());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(values)) => Ok(values.into_iter().map(into_record).collect()),
        Ok(_) => Err(DomainError::validation(format!(
            "{} must contain a JSON array of records",
            path.display()
        ))),
        Err(err) => Err(DomainError::decode(format!(
            "{} is not valid JSON: {err}",
            path.display()
        ))),
    }
}

fn into_record(value: Value) -> SourceRecord {
    match value {
        Value::Object(map) => SourceRecord::Parsed(map),
        other => SourceRecord::Malformed(format!("expected an object, got {other}")),
    }
}

/// Reads a headed CSV file; every cell becomes a JSON string.
pub fn read_csv_records(
    path: impl AsRef<Path>,
    delimiter: &str,
) -> Result<Vec<SourceRecord>, DomainError> {
    let path = path.as_ref();
    let delimiter = parse_delimiter(delimiter)?;
    ensure_exists(path)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|err| DomainError::other(format!("failed to open {}: {err}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|err| DomainError::decode(format!("invalid CSV header: {err}")))?
        .clone();

    Ok(reader
        .records()
        .map(|row| match row {
            Ok(row) => SourceRecord::Parsed(
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(column, cell)| (column.to_string(), Value::from(cell)))
                    .collect(),
            ),
            Err(err) => SourceRecord::Malformed(err.to_string()),
        })
        .collect())
}

fn parse_delimiter(raw: &str) -> Result<u8, DomainError> {
    match raw {
        "\t" | "\\t" | "tab" => Ok(b'\t'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        other => Err(DomainError::validation(format!(
            "delimiter must be a single ASCII character, got `{other}`"
        ))),
    }
}

/// Best-effort bulk loader: bad rows and failed batches are counted, not fatal.
pub struct BatchImporter {
    database: Arc<dyn VectorDatabase>,
    embeddings: Arc<dyn ProviderSource>,
}

impl BatchImporter {
    pub fn new(database: Arc<dyn VectorDatabase>, embeddings: Arc<dyn ProviderSource>) -> Self {
        Self {
            database,
            embeddings,
        }
    }

    pub fn import(
        &self,
        index: &str,
        records: Vec<SourceRecord>,
        mapping: &FieldMapping,
        batch_size: usize,
    ) -> Result<ImportReport, DomainError> {
        check_range("batch_size", batch_size, 1, MAX_BATCH_SIZE)?;

        let provider = match mapping.source {
            VectorSource::Text(_) => Some(self.embeddings.provider()?),
            VectorSource::Field(_) => None,
        };

        let mut report = ImportReport {
            success: true,
            ..ImportReport::default()
        };

        for (batch_number, batch) in records.chunks(batch_size).enumerate() {
            let mut items = Vec::with_capacity(batch.len());
            let mut texts = Vec::new();

            for record in batch {
                let projected = match record {
                    SourceRecord::Parsed(map) => mapping.project(map),
                    SourceRecord::Malformed(reason) => Err(reason.clone()),
                };
                match projected {
                    Ok((item, text)) => {
                        items.push(item);
                        texts.extend(text);
                    }
                    Err(reason) => {
                        debug!(target: "endee_mcp::import", batch = batch_number, %reason, "record skipped");
                        report.failed += 1;
                    }
                }
            }

            if items.is_empty() {
                continue;
            }

            if let Some(provider) = &provider {
                match provider.embed_texts(&texts) {
                    Ok(vectors) if vectors.len() == items.len() => {
                        for (item, vector) in items.iter_mut().zip(vectors) {
                            item.vector = vector;
                        }
                    }
                    Ok(vectors) => {
                        warn!(
                            target: "endee_mcp::import",
                            batch = batch_number,
                            expected = items.len(),
                            received = vectors.len(),
                            "embedding count mismatch, batch skipped"
                        );
                        report.failed += items.len();
                        continue;
                    }
                    Err(err) if err.is_embedding_unavailable() => return Err(err),
                    Err(err) => {
                        warn!(target: "endee_mcp::import", batch = batch_number, error = %err, "embedding failed, batch skipped");
                        report.failed += items.len();
                        continue;
                    }
                }
            }

            match self.database.upsert_vectors(index, &items) {
                Ok(()) => report.total_imported += items.len(),
                Err(err) => {
                    warn!(target: "endee_mcp::import", batch = batch_number, error = %err, "upsert failed, batch skipped");
                    report.failed += items.len();
                }
            }
        }

        info!(
            target: "endee_mcp::import",
            index,
            imported = report.total_imported,
            failed = report.failed,
            "import finished"
        );
        Ok(report)
    }
}
