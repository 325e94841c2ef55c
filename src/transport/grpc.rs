//! gRPC admin surface.
//!
//! Carries [`AdminCommand`] JSON in and [`AdminResponse`] JSON out. The
//! service is synchronous, so each call runs on the blocking pool.

use std::sync::Arc;

use serde::Serialize;
use tonic::{Request, Response, Status};

use crate::admin::{self, AdminCommand};
use crate::error::NotifyError;
use crate::service::NotificationService;

pub mod proto {
    #![allow(missing_docs)]
    tonic::include_proto!("bucketcast");
}

use proto::admin_service_server::{AdminService, AdminServiceServer};

/// Maximum size of a command JSON payload.
const MAX_COMMAND_JSON_BYTES: usize = 64 * 1024; // 64 KiB

/// Maximum size of a response JSON payload.
const MAX_RESPONSE_JSON_BYTES: usize = 4 * 1024 * 1024; // 4 MiB

/// gRPC service implementation for the admin commands.
pub struct AdminServiceImpl {
    service: Arc<NotificationService>,
}

impl AdminServiceImpl {
    #[must_use]
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }

    #[must_use]
    pub fn into_server(self) -> AdminServiceServer<Self> {
        AdminServiceServer::new(self)
    }
}

fn invalid_argument(msg: impl Into<String>) -> Status {
    Status::invalid_argument(msg.into())
}

fn parse_command(bytes: &[u8]) -> Result<AdminCommand, Status> {
    if bytes.is_empty() {
        return Err(invalid_argument("command_json is required"));
    }
    if bytes.len() > MAX_COMMAND_JSON_BYTES {
        return Err(invalid_argument("command_json exceeds maximum size"));
    }
    serde_json::from_slice(bytes).map_err(|e| invalid_argument(format!("invalid command JSON: {e}")))
}

fn encode_json<T: Serialize>(value: &T, max: usize) -> Result<Vec<u8>, Status> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| Status::internal(format!("failed to serialize response JSON: {e}")))?;
    if bytes.len() > max {
        return Err(Status::resource_exhausted("serialized JSON exceeds size limit"));
    }
    Ok(bytes)
}

fn status_from_notify_error(err: NotifyError) -> Status {
    match err {
        NotifyError::InvalidRule(v) => Status::invalid_argument(v.to_string()),
        e @ (NotifyError::NoSuchBucket { .. } | NotifyError::NoSuchRule { .. }) => Status::not_found(e.to_string()),
        e @ (NotifyError::Remote(_) | NotifyError::Transport(_)) => Status::unavailable(e.to_string()),
        e @ (NotifyError::Storage(_) | NotifyError::Config(_)) => Status::internal(e.to_string()),
        NotifyError::Internal { message } => Status::internal(message),
    }
}

#[tonic::async_trait]
impl AdminService for AdminServiceImpl {
    async fn execute(
        &self,
        request: Request<proto::ExecuteRequest>,
    ) -> Result<Response<proto::ExecuteResponse>, Status> {
        let req = request.into_inner();
        let command = parse_command(&req.command_json)?;

        let service = Arc::clone(&self.service);
        let resp = tokio::task::spawn_blocking(move || admin::execute(&service, command))
            .await
            .map_err(|e| Status::internal(format!("admin task failed: {e}")))?
            .map_err(status_from_notify_error)?;

        let response_json = encode_json(&resp, MAX_RESPONSE_JSON_BYTES)?;
        Ok(Response::new(proto::ExecuteResponse { response_json }))
    }
}
