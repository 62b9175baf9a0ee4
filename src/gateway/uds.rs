// SecureDB: Unix Domain Socket Server
//
// Listens on a Unix domain socket for newline-delimited JSON-RPC 2.0
// requests. Each connection is handled in its own tokio task; all of them
// share one `RecordStore`, so key initialization and transactions are
// coordinated across clients.

use std::io;
use std::path::PathBuf;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::store::{BackingStore, Record, RecordId, RecordStore, StoreError, UpdateOutcome};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, DECRYPTION_FAILED, DUPLICATE_ID, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, KEY_UNAVAILABLE, METHOD_NOT_FOUND, PAYLOAD_CORRUPT,
    UNREADABLE,
};

pub struct UdsServer<B: BackingStore> {
    store: RecordStore<B>,
    socket_path: PathBuf,
}

impl<B: BackingStore> UdsServer<B> {
    pub fn new(store: RecordStore<B>, socket_path: PathBuf) -> Self {
        Self { store, socket_path }
    }

    /// Start the server. Runs until the process is terminated or accepting
    /// a connection fails.
    pub async fn run(&self) -> io::Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Stale socket from a previous run
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(socket = %self.socket_path.display(), "SecureDB gateway listening");

        loop {
            let (stream, _addr) = listener.accept().await?;
            let store = self.store.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, store).await {
                    tracing::error!(error = %e, "Connection handler error");
                }
            });
        }
    }
}

async fn handle_connection<B: BackingStore>(
    stream: UnixStream,
    store: RecordStore<B>,
) -> io::Result<()> {
    match stream.peer_cred() {
        Ok(cred) => tracing::debug!(uid = cred.uid(), pid = ?cred.pid(), "Client connected"),
        Err(_) => tracing::debug!("Client connected"),
    }

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = process_request(&store, &line).await;
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse and dispatch a single JSON-RPC request.
pub(crate) async fn process_request<B: BackingStore>(
    store: &RecordStore<B>,
    raw: &str,
) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let JsonRpcRequest {
        method, params, id, ..
    } = request;

    let outcome = match method.as_str() {
        "add" => handle_add(store, &params).await,
        "read_all" => handle_read_all(store, &params).await,
        "get" => handle_get(store, &params).await,
        "update" => handle_update(store, &params).await,
        "delete" => handle_delete(store, &params).await,
        "clear" => handle_clear(store).await,
        _ => Err(MethodError::Rpc(
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", method),
        )),
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(MethodError::Rpc(code, message)) => JsonRpcResponse::error(id, code, message),
        Err(MethodError::Store(e)) => store_error_response(id, e),
    }
}

enum MethodError {
    Rpc(i32, String),
    Store(StoreError),
}

impl From<StoreError> for MethodError {
    fn from(e: StoreError) -> Self {
        MethodError::Store(e)
    }
}

type MethodResult = Result<Value, MethodError>;

// ─── Method Handlers ─────────────────────────────────────────────────────────

async fn handle_add<B: BackingStore>(store: &RecordStore<B>, params: &Value) -> MethodResult {
    let id = record_id_param(params)?;
    let payload = payload_param(params)?;

    store.add(Record::new(id.clone(), payload)).await?;
    Ok(json!({ "id": id }))
}

async fn handle_read_all<B: BackingStore>(store: &RecordStore<B>, params: &Value) -> MethodResult {
    let partial = params
        .get("partial")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if !partial {
        return Ok(Value::Array(store.read_all().await?));
    }

    let report = store.read_report().await?;
    let records: Vec<Value> = report
        .records
        .into_iter()
        .map(|(id, payload)| json!({ "id": id, "payload": payload }))
        .collect();
    Ok(json!({
        "records": records,
        "failures": failures_json(&report.failures),
    }))
}

async fn handle_get<B: BackingStore>(store: &RecordStore<B>, params: &Value) -> MethodResult {
    let id = record_id_param(params)?;
    match store.get(&id).await? {
        Some(payload) => Ok(payload),
        None => Err(MethodError::Rpc(
            INVALID_PARAMS,
            format!("Record not found: {}", id),
        )),
    }
}

async fn handle_update<B: BackingStore>(store: &RecordStore<B>, params: &Value) -> MethodResult {
    let id = record_id_param(params)?;
    let payload = payload_param(params)?;

    let outcome: UpdateOutcome = store.update(id.clone(), &payload).await?;
    Ok(json!({ "id": id, "outcome": outcome }))
}

async fn handle_delete<B: BackingStore>(store: &RecordStore<B>, params: &Value) -> MethodResult {
    let id = record_id_param(params)?;
    let deleted = store.delete(&id).await?;
    Ok(json!({ "id": id, "deleted": deleted }))
}

async fn handle_clear<B: BackingStore>(store: &RecordStore<B>) -> MethodResult {
    let removed = store.clear().await?;
    Ok(json!({ "removed": removed }))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn record_id_param(params: &Value) -> Result<RecordId, MethodError> {
    let raw = params.get("id").ok_or_else(|| {
        MethodError::Rpc(INVALID_PARAMS, "Missing 'id' parameter".to_string())
    })?;

    serde_json::from_value(raw.clone()).map_err(|_| {
        MethodError::Rpc(
            INVALID_PARAMS,
            "'id' must be a string or an integer".to_string(),
        )
    })
}

fn payload_param(params: &Value) -> Result<Value, MethodError> {
    params
        .get("payload")
        .cloned()
        .ok_or_else(|| MethodError::Rpc(INVALID_PARAMS, "Missing 'payload' parameter".to_string()))
}

fn failures_json(failures: &[crate::store::RecordFailure]) -> Value {
    failures
        .iter()
        .map(|f| json!({ "id": f.id, "reason": f.error.to_string() }))
        .collect()
}

/// Map a store error onto a JSON-RPC error response.
fn store_error_response(id: Value, error: StoreError) -> JsonRpcResponse {
    let message = error.to_string();
    match error {
        StoreError::DuplicateId(record) => {
            JsonRpcResponse::error_with_data(id, DUPLICATE_ID, message, json!({ "id": record }))
        }
        StoreError::DecryptionFailed(record) => {
            JsonRpcResponse::error_with_data(id, DECRYPTION_FAILED, message, json!({ "id": record }))
        }
        StoreError::PayloadCorrupt { id: record, .. } => {
            JsonRpcResponse::error_with_data(id, PAYLOAD_CORRUPT, message, json!({ "id": record }))
        }
        StoreError::KeyUnavailable(_) => JsonRpcResponse::error(id, KEY_UNAVAILABLE, message),
        StoreError::Unreadable { failures } => JsonRpcResponse::error_with_data(
            id,
            UNREADABLE,
            message,
            json!({ "failures": failures_json(&failures) }),
        ),
        other => {
            tracing::error!(error = %other, "Gateway request failed");
            JsonRpcResponse::error(id, INTERNAL_ERROR, message)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
