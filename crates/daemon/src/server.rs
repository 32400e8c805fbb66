// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use adv_core::UserId;
use adv_engine::EngineError;
use tokio::net::UnixStream;
use tracing::{debug, error};

use crate::lifecycle::DaemonState;
use crate::protocol::{
    self, PoolSnapshot, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION,
};

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    // Handle request
    let response = handle_request(daemon, request).await;

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
async fn handle_request(daemon: &mut DaemonState, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => status(daemon).await,

        Request::Availability { user_id } => {
            match daemon.engine.availability(&UserId(user_id)).await {
                Ok(availability) => Response::Availability { availability },
                Err(e) => refusal(e),
            }
        }

        Request::TakeAdvance { user_id, amount } => {
            match daemon.engine.take_advance(&UserId(user_id), amount).await {
                Ok(issued) => Response::Issued { issued },
                Err(e) => refusal(e),
            }
        }

        Request::Repay { user_id, amount } => {
            match daemon.engine.repay_manual(&UserId(user_id), amount).await {
                Ok(repayment) => Response::Repaid { repayment },
                Err(e) => refusal(e),
            }
        }

        Request::RunSettlement => match daemon.engine.run_settlement().await {
            Ok(report) => Response::Settlement { report },
            Err(e) => refusal(e),
        },

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}

/// Build the status panel from the store
async fn status(daemon: &DaemonState) -> Response {
    use adv_storage::{AdvanceStore, PoolStore};

    let uptime_secs = daemon.start_time.elapsed().as_secs();

    let pool = match daemon.store.pool(daemon.engine.pool_id()).await {
        Ok(pool) => pool,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };
    let active = match daemon.store.all_active().await {
        Ok(active) => active,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };

    let outstanding_total = active.iter().map(|a| a.outstanding_amount).sum();

    Response::Status {
        uptime_secs,
        pool: PoolSnapshot {
            id: pool.id.0.clone(),
            balance: pool.current_balance,
            total_lent: pool.total_lent,
            total_repaid: pool.total_repaid,
        },
        advances_active: active.len(),
        outstanding_total,
    }
}

/// Map an engine error to the wire.
///
/// Business refusals carry their message to the caller. Saga and
/// infrastructure failures return a generic reply; the detail stays in
/// the daemon log for the operator.
fn refusal(error: EngineError) -> Response {
    if error.is_business() {
        Response::Refused {
            message: error.to_string(),
        }
    } else {
        error!("Request failed: {}", error);
        Response::Error {
            message: "internal error; check the daemon log".to_string(),
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
