use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::io::{stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::notify::SessionEvent;
use crate::protocol::*;
use crate::session::SessionHandle;

/// Serve the bridge protocol on stdin/stdout until stdin closes or `shutdown` is received.
pub async fn run_stdio(
    handle: SessionHandle,
    events: UnboundedReceiver<SessionEvent>,
) -> anyhow::Result<()> {
    run_bridge(BufReader::new(stdin()), stdout(), handle, events).await
}

/// Serve the bridge protocol over arbitrary streams.
///
/// Session events and view snapshots are interleaved with responses as they
/// arrive. The session is torn down when the loop ends.
pub async fn run_bridge<R, W>(
    reader: R,
    mut writer: W,
    handle: SessionHandle,
    mut events: UnboundedReceiver<SessionEvent>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut watcher = handle.clone();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let request: BridgeRequest = match serde_json::from_str(&line) {
                    Ok(req) => req,
                    Err(e) => {
                        warn!(error = %e, "Malformed request line");
                        let response = BridgeResponse::failure(None, PARSE_ERROR, e.to_string());
                        write_line(&mut writer, &response).await?;
                        continue;
                    }
                };
                let shutdown = request.method == "shutdown";
                let response = dispatch(&handle, request).await;
                write_line(&mut writer, &response).await?;
                if shutdown {
                    break;
                }
            }
            Some(event) = events.recv() => write_line(&mut writer, &event).await?,
            Ok(view) = watcher.changed() => write_line(&mut writer, &ViewEvent::new(&view)).await?,
        }
    }

    // Already closed is fine.
    let _ = handle.teardown();
    writer.flush().await?;
    Ok(())
}

/// Serve one request against the session.
pub async fn dispatch(handle: &SessionHandle, request: BridgeRequest) -> BridgeResponse {
    debug!(method = %request.method, "Bridge request");
    let params = request.params.unwrap_or(serde_json::Value::Null);
    match call(handle, &request.method, params).await {
        Ok(result) => BridgeResponse::success(request.id, result),
        Err(e) => {
            debug!(method = %request.method, error = %e, "Bridge request failed");
            BridgeResponse::failure(request.id, e.code(), e.to_string())
        }
    }
}

async fn call(
    handle: &SessionHandle,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value, DispatchError> {
    match method {
        "snapshot" => Ok(serde_json::to_value(handle.view())?),
        "submit" => {
            let p: SubmitParams = parse(params)?;
            handle.submit(p.text)?;
            Ok(ack())
        }
        "node_changes" => {
            let p: NodeChangesParams = parse(params)?;
            handle.apply_node_changes(p.changes)?;
            Ok(ack())
        }
        "edge_changes" => {
            let p: EdgeChangesParams = parse(params)?;
            handle.apply_edge_changes(p.changes)?;
            Ok(ack())
        }
        "suggest_related" => {
            let p: LabelParams = parse(params)?;
            let suggestions = handle.suggest_related(&p.label).await?;
            Ok(json!({ "suggestions": suggestions }))
        }
        "accept_suggestion" => {
            let p: AcceptSuggestionParams = parse(params)?;
            handle.accept_related(&p.anchor_id, &p.suggestion)?;
            Ok(ack())
        }
        "merge_temporal" => {
            let p: NodeParams = parse(params)?;
            let related = handle.suggest_temporal(&p.node_id).await?;
            handle.merge_temporal(&related)?;
            Ok(json!({
                "nodes": related.nodes.len(),
                "edges": related.edges.len(),
            }))
        }
        "set_panel" => {
            let p: PanelParams = parse(params)?;
            handle.set_panel_open(p.open)?;
            Ok(ack())
        }
        "reload" => {
            handle.reload()?;
            Ok(ack())
        }
        "shutdown" => {
            handle.teardown()?;
            Ok(ack())
        }
        other => Err(DispatchError::UnknownMethod(other.to_string())),
    }
}

fn parse<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, DispatchError> {
    serde_json::from_value(params).map_err(DispatchError::InvalidParams)
}

fn ack() -> serde_json::Value {
    json!({ "ok": true })
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
