use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::application::{AccountCommandService, CommandError};
use crate::domain::{
    CloseAccountCommand, DepositFundCommand, OpenAccountCommand, WithdrawFundCommand,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAccountResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("command failed: {}", self);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub async fn open_account(
    State(service): State<Arc<AccountCommandService>>,
    Json(command): Json<OpenAccountCommand>,
) -> Result<impl IntoResponse, CommandError> {
    let id = service.open_account(command).await?;
    Ok((StatusCode::CREATED, Json(OpenAccountResponse { id })))
}

pub async fn deposit_fund(
    State(service): State<Arc<AccountCommandService>>,
    Json(command): Json<DepositFundCommand>,
) -> Result<StatusCode, CommandError> {
    service.deposit_fund(command).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn withdraw_fund(
    State(service): State<Arc<AccountCommandService>>,
    Json(command): Json<WithdrawFundCommand>,
) -> Result<StatusCode, CommandError> {
    service.withdraw_fund(command).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn close_account(
    State(service): State<Arc<AccountCommandService>>,
    Json(command): Json<CloseAccountCommand>,
) -> Result<StatusCode, CommandError> {
    service.close_account(command).await?;
    Ok(StatusCode::ACCEPTED)
}
