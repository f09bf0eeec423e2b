use discount_service::ServiceError;
use thiserror::Error;
use tonic::{Code, Status};

#[derive(Debug, Error)]
pub(crate) enum GrpcError {
    #[error("discount code not found")]
    CodeNotFound,
    #[error("background task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<tokio::task::JoinError> for GrpcError {
    fn from(error: tokio::task::JoinError) -> Self {
        GrpcError::Task(error.to_string())
    }
}

impl From<GrpcError> for Status {
    fn from(error: GrpcError) -> Self {
        match error {
            GrpcError::CodeNotFound => Status::new(Code::NotFound, "discount code not found"),
            GrpcError::Task(source) => Status::new(Code::Internal, source),
            GrpcError::Service(source) => {
                let code = match &source {
                    ServiceError::InvalidArgument(_) => Code::InvalidArgument,
                    ServiceError::Cancelled { .. } => Code::Cancelled,
                    ServiceError::Unavailable(_) => Code::Unavailable,
                    ServiceError::Storage(_) | ServiceError::Generator(_) | ServiceError::Worker(_) => {
                        Code::Internal
                    }
                };
                Status::new(code, source.to_string())
            }
        }
    }
}
