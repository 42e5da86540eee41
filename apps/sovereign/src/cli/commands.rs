//! # CLI Command Implementations

use crate::AppError;
use crate::api::{self, AppState};
use crate::config::SovereignConfig;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use sovereign_core::{Counter, CounterPolicy, Intake, KvStore, MemoryStore, RedbStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Validate an output path: the parent directory must exist.
///
/// Returns the path with its parent canonicalized.
fn validate_output_path(path: &Path) -> Result<PathBuf, AppError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        AppError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(AppError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| AppError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    config: SovereignConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), AppError> {
    let store = open_store(db_path, backend)?;
    let settings = config.api_settings();
    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let prefix = settings.route_prefix.trim_end_matches('/');

    println!("Sovereign Intake Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", backend);
    println!("  Database: {:?}", db_path);
    println!();
    println!("Endpoints:");
    println!("  GET  {}/sovereign/stats     - Member count", prefix);
    println!("  POST {}/sovereign/increment - Add a member", prefix);
    println!("  POST {}/sovereign/contact   - Submit a dossier", prefix);
    println!("  GET  {}/health              - Health check", prefix);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    let state = AppState::new(store, config.counter);
    api::run_server(&addr, state, &settings).await
}

// =============================================================================
// COUNT COMMANDS
// =============================================================================

/// Show the current member count. The read writes the high-water mark back,
/// exactly as the stats endpoint does.
pub fn cmd_count(
    db_path: &Path,
    backend: &str,
    config: &SovereignConfig,
    json_mode: bool,
) -> Result<(), AppError> {
    let store = open_store(db_path, backend)?;
    let counter = Counter::new(store.as_ref(), &config.counter);
    let count = counter.read(Utc::now())?;
    let persisted = counter.persisted_count()?;

    if json_mode {
        print_json(&json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "count": count,
            "persisted": persisted,
            "max_count": config.counter.max_count,
        }));
        return Ok(());
    }

    println!("Sovereign Member Count");
    println!("======================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend);
    println!();
    println!("Count:     {}", count);
    println!("Cap:       {}", config.counter.max_count);

    Ok(())
}

/// Add one member.
pub fn cmd_increment(
    db_path: &Path,
    backend: &str,
    config: &SovereignConfig,
    json_mode: bool,
) -> Result<(), AppError> {
    let store = open_store(db_path, backend)?;
    let count = Counter::new(store.as_ref(), &config.counter).increment()?;

    if json_mode {
        print_json(&json!({ "count": count }));
    } else {
        println!("Count is now {}", count);
    }
    Ok(())
}

// =============================================================================
// CONTACTS COMMAND
// =============================================================================

/// List stored submissions, oldest first.
pub fn cmd_contacts(
    db_path: &Path,
    backend: &str,
    json_mode: bool,
    limit: Option<usize>,
) -> Result<(), AppError> {
    let store = open_store(db_path, backend)?;
    let mut records = Intake::new(store.as_ref()).list()?;
    if let Some(limit) = limit {
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
    }

    if json_mode {
        print_json(&Value::Array(records));
        return Ok(());
    }

    if records.is_empty() {
        println!("No submissions stored.");
        return Ok(());
    }

    println!("Submissions ({})", records.len());
    println!("==============");
    for record in &records {
        let field = |current: &str, legacy: &str| {
            record
                .get(current)
                .or_else(|| record.get(legacy))
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string()
        };
        println!(
            "{}  {}  {} <{}>",
            record.get("timestamp").and_then(Value::as_str).unwrap_or("-"),
            record.get("id").and_then(Value::as_str).unwrap_or("-"),
            field("alias", "designation"),
            field("contact", "email"),
        );
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write the persisted count and every submission to a JSON file.
pub fn cmd_export(
    db_path: &Path,
    backend: &str,
    config: &SovereignConfig,
    output: &Path,
) -> Result<(), AppError> {
    let validated_output = validate_output_path(output)?;
    let store = open_store(db_path, backend)?;
    let snapshot = export_snapshot(store.as_ref(), &config.counter)?;

    let data = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| AppError::Io(format!("Encode export: {}", e)))?;
    std::fs::write(&validated_output, data)
        .map_err(|e| AppError::Io(format!("Write export: {}", e)))?;

    let contacts = snapshot["contacts"].as_array().map_or(0, Vec::len);
    println!("Exported {} submissions to {:?}", contacts, validated_output);
    Ok(())
}

/// Build the export document.
pub fn export_snapshot(
    store: &dyn KvStore,
    policy: &CounterPolicy,
) -> Result<Value, AppError> {
    let count = Counter::new(store, policy).persisted_count()?;
    let contacts = Intake::new(store).list()?;
    Ok(json!({
        "exported_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "count": count,
        "contacts": contacts,
    }))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(db_path: &Path, backend: &str, force: bool) -> Result<(), AppError> {
    if backend != "redb" {
        return Err(AppError::Config(format!(
            "Backend '{}' has nothing to initialize",
            backend
        )));
    }

    if db_path.exists() {
        if !force {
            return Err(AppError::Config(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| AppError::Io(format!("Remove existing database: {}", e)))?;
    }

    RedbStore::open(db_path)?;
    println!("Initialized new redb database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the store for the selected backend.
pub fn open_store(db_path: &Path, backend: &str) -> Result<Arc<dyn KvStore>, AppError> {
    match backend {
        "redb" => Ok(Arc::new(RedbStore::open(db_path)?)),
        "memory" => {
            tracing::warn!("Using the memory backend: nothing survives a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => Err(AppError::Config(format!(
            "Unknown backend '{}' (expected redb or memory)",
            other
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================
