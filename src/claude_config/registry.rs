//! MCP server registry stored under `mcpServers` in the global document.
//!
//! Project entries are display-only: every mutation loads and writes the
//! global document and nothing else.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};

use super::json_store::{read_json, write_json};
use super::{ConfigError, ConfigPaths};

const SERVERS_KEY: &str = "mcpServers";

/// Which document an entry is shown from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerSource {
    Global,
    Project,
}

/// A registry entry as listed to callers: `{name, ...spec, source}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerEntry {
    pub name: String,
    #[serde(flatten)]
    pub spec: Map<String, Value>,
    pub source: ServerSource,
}

/// An entry as stored in the global document after a mutation: `{name, ...spec}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredServer {
    pub name: String,
    #[serde(flatten)]
    pub spec: Map<String, Value>,
}

/// Result of `add` / `update`: the entry written plus the `.bak` taken.
#[derive(Debug, Clone)]
pub struct ServerChange {
    pub server: StoredServer,
    pub backup: Option<PathBuf>,
}

pub struct McpRegistry<'a> {
    paths: &'a ConfigPaths,
}

impl<'a> McpRegistry<'a> {
    pub fn new(paths: &'a ConfigPaths) -> Self {
        Self { paths }
    }

    /// Global entries overlaid by project entries of the same name. Overridden
    /// entries keep their global position; project-only ones come last.
    pub async fn list(&self) -> Vec<ServerEntry> {
        let (global_path, project_path) = (self.paths.global_settings(), self.paths.project_config());
        let (global, project) = tokio::join!(read_json(&global_path), read_json(&project_path));
        let project_servers = servers_of(&project);

        let mut merged = servers_of(&global);
        for (name, spec) in &project_servers {
            merged.insert(name.clone(), spec.clone());
        }

        merged
            .into_iter()
            .map(|(name, spec)| {
                let source = if project_servers.contains_key(&name) {
                    ServerSource::Project
                } else {
                    ServerSource::Global
                };
                ServerEntry {
                    name,
                    spec: spec_fields(spec),
                    source,
                }
            })
            .collect()
    }

    /// Add a server from a `{name, command, args?, env?}` body.
    pub async fn add(&self, body: &Value) -> Result<ServerChange, ConfigError> {
        let fields = body_object(body)?;
        let name = required_string(fields, "name")?;
        let command = required_string(fields, "command")?;

        let mut spec = Map::new();
        spec.insert("command".into(), Value::String(command));
        if let Some(args) = optional_field(fields, "args") {
            spec.insert("args".into(), validate_args(args)?);
        }
        if let Some(env) = optional_field(fields, "env") {
            spec.insert("env".into(), validate_env(env)?);
        }

        let path = self.paths.global_settings();
        let mut doc = read_json(&path).await;
        let mut servers = servers_of(&doc);
        if servers.contains_key(&name) {
            return Err(ConfigError::Conflict(format!("MCP server \"{name}\" already exists")));
        }

        servers.insert(name.clone(), Value::Object(spec.clone()));
        doc.insert(SERVERS_KEY.into(), Value::Object(servers));
        let backup = write_json(&path, &doc).await?;

        tracing::info!(server = %name, backup = ?backup, "MCP server added");
        Ok(ServerChange {
            server: StoredServer { name, spec },
            backup,
        })
    }

    /// Apply a partial `{command?, args?, env?, newName?}` body to `name`.
    pub async fn update(&self, name: &str, body: &Value) -> Result<ServerChange, ConfigError> {
        let fields = body_object(body)?;
        let new_name = match optional_field(fields, "newName") {
            None => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ConfigError::Validation("newName must be a string".into())),
        };
        let command = match optional_field(fields, "command") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ConfigError::Validation("command must be a string".into())),
        };
        let args = optional_field(fields, "args").map(validate_args).transpose()?;
        let env = optional_field(fields, "env").map(validate_env).transpose()?;

        let path = self.paths.global_settings();
        let mut doc = read_json(&path).await;
        let mut servers = servers_of(&doc);
        let current = servers
            .get(name)
            .ok_or_else(|| ConfigError::NotFound(format!("MCP server \"{name}\" does not exist")))?;

        let rename_to = new_name.filter(|n| n != name);
        if let Some(target) = &rename_to
            && servers.contains_key(target)
        {
            return Err(ConfigError::Conflict(format!("MCP server \"{target}\" already exists")));
        }

        let mut spec = spec_fields(current.clone());
        if let Some(command) = command {
            spec.insert("command".into(), Value::String(command));
        }
        if let Some(args) = args {
            spec.insert("args".into(), args);
        }
        if let Some(env) = env {
            spec.insert("env".into(), env);
        }

        let final_name = match rename_to {
            Some(target) => {
                servers.shift_remove(name);
                servers.insert(target.clone(), Value::Object(spec.clone()));
                target
            }
            None => {
                servers.insert(name.to_string(), Value::Object(spec.clone()));
                name.to_string()
            }
        };
        doc.insert(SERVERS_KEY.into(), Value::Object(servers));
        let backup = write_json(&path, &doc).await?;

        tracing::info!(server = %name, final_name = %final_name, backup = ?backup, "MCP server updated");
        Ok(ServerChange {
            server: StoredServer {
                name: final_name,
                spec,
            },
            backup,
        })
    }

    /// Remove `name` from the global registry. Returns the `.bak` taken.
    pub async fn delete(&self, name: &str) -> Result<Option<PathBuf>, ConfigError> {
        let path = self.paths.global_settings();
        let mut doc = read_json(&path).await;
        let mut servers = servers_of(&doc);
        if servers.shift_remove(name).is_none() {
            return Err(ConfigError::NotFound(format!("MCP server \"{name}\" does not exist")));
        }

        doc.insert(SERVERS_KEY.into(), Value::Object(servers));
        let backup = write_json(&path, &doc).await?;

        tracing::info!(server = %name, backup = ?backup, "MCP server deleted");
        Ok(backup)
    }
}

fn servers_of(doc: &Map<String, Value>) -> Map<String, Value> {
    doc.get(SERVERS_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Stored entries are expected to be objects; anything else lists as `{}`.
fn spec_fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn body_object(body: &Value) -> Result<&Map<String, Value>, ConfigError> {
    body.as_object()
        .ok_or_else(|| ConfigError::Validation("request body must be a JSON object".into()))
}

/// A field counts as present unless it is missing or `null`.
fn optional_field<'b>(fields: &'b Map<String, Value>, key: &str) -> Option<&'b Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn required_string(fields: &Map<String, Value>, key: &str) -> Result<String, ConfigError> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(ConfigError::Validation(format!(
            "{key} is required and must be a string"
        ))),
    }
}

fn validate_args(value: &Value) -> Result<Value, ConfigError> {
    if value.is_array() {
        Ok(value.clone())
    } else {
        Err(ConfigError::Validation("args must be an array".into()))
    }
}

fn validate_env(value: &Value) -> Result<Value, ConfigError> {
    if value.is_object() {
        Ok(value.clone())
    } else {
        Err(ConfigError::Validation("env must be an object".into()))
    }
}
