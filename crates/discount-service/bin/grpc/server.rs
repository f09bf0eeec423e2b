use crate::error::GrpcError;
use discount_core::{CodeLength, PageQuery, Repository};
use discount_generator::Generator;
use discount_proto_schema::v1 as proto;
use discount_proto_schema::v1::discount_admin_service_server::DiscountAdminService;
use discount_proto_schema::v1::discount_service_server::DiscountService;
use discount_service::{CancellationToken, DiscountCodeService, RedeemOutcome};
use std::ops::RangeInclusive;
use tonic::{Request, Response, Status};
use tracing::debug;

pub const GENERATE_COUNT_RANGE: RangeInclusive<u32> = 1..=2000;

/// Shared state of both gRPC services.
///
/// Every request runs under a child of the process shutdown token. The token
/// is cancelled when the request future is dropped, which happens when the
/// client disconnects or its deadline expires.
pub struct DiscountGrpcServer<R, G> {
    service: DiscountCodeService<R, G>,
    shutdown: CancellationToken,
}

impl<R: Repository, G: Generator> DiscountGrpcServer<R, G> {
    pub fn new(service: DiscountCodeService<R, G>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }

    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

impl<R, G> Clone for DiscountGrpcServer<R, G> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

fn redeem_result(outcome: RedeemOutcome) -> proto::RedeemResult {
    match outcome {
        RedeemOutcome::Redeemed => proto::RedeemResult::Ok,
        RedeemOutcome::AlreadyUsed => proto::RedeemResult::AlreadyUsed,
        RedeemOutcome::Invalid => proto::RedeemResult::Invalid,
    }
}

#[tonic::async_trait]
impl<R: Repository, G: Generator> DiscountService for DiscountGrpcServer<R, G> {
    async fn generate_codes(
        &self,
        request: Request<proto::GenerateCodesRequest>,
    ) -> Result<Response<proto::GenerateCodesResponse>, Status> {
        let proto::GenerateCodesRequest { count, length } = request.into_inner();

        let length = match CodeLength::try_from(length as usize) {
            Ok(length) if GENERATE_COUNT_RANGE.contains(&count) => length,
            _ => {
                debug!(count, length, "rejecting generation request outside accepted bounds");
                return Ok(Response::new(proto::GenerateCodesResponse { result: false }));
            }
        };

        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let service = self.service.clone();
        let inserted = tokio::spawn(async move {
            service.generate(count as usize, length, &cancel).await
        })
        .await
        .map_err(GrpcError::from)?
        .map_err(GrpcError::from)?;

        Ok(Response::new(proto::GenerateCodesResponse {
            result: inserted == u64::from(count),
        }))
    }

    async fn redeem_code(
        &self,
        request: Request<proto::RedeemCodeRequest>,
    ) -> Result<Response<proto::RedeemCodeResponse>, Status> {
        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let outcome = self
            .service
            .redeem(&request.into_inner().code, &cancel)
            .await
            .map_err(GrpcError::from)?;

        Ok(Response::new(proto::RedeemCodeResponse {
            result: redeem_result(outcome).into(),
        }))
    }
}

#[tonic::async_trait]
impl<R: Repository, G: Generator> DiscountAdminService for DiscountGrpcServer<R, G> {
    async fn create_code(
        &self,
        request: Request<proto::CreateCodeRequest>,
    ) -> Result<Response<proto::CreateCodeResponse>, Status> {
        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let created = self
            .service
            .create_one(&request.into_inner().code, &cancel)
            .await
            .map_err(GrpcError::from)?;

        Ok(Response::new(proto::CreateCodeResponse { created }))
    }

    async fn get_code(
        &self,
        request: Request<proto::GetCodeRequest>,
    ) -> Result<Response<proto::GetCodeResponse>, Status> {
        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let record = self
            .service
            .get(&request.into_inner().code, &cancel)
            .await
            .map_err(GrpcError::from)?
            .ok_or(GrpcError::CodeNotFound)?;

        Ok(Response::new(proto::GetCodeResponse {
            code: Some(record.into()),
        }))
    }

    async fn list_codes(
        &self,
        request: Request<proto::ListCodesRequest>,
    ) -> Result<Response<proto::ListCodesResponse>, Status> {
        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let proto::ListCodesRequest {
            page,
            page_size,
            only_unused,
        } = request.into_inner();

        let page = self
            .service
            .list(PageQuery::new(page, page_size, only_unused), &cancel)
            .await
            .map_err(GrpcError::from)?;

        Ok(Response::new(page.into()))
    }

    async fn update_code(
        &self,
        request: Request<proto::UpdateCodeRequest>,
    ) -> Result<Response<proto::UpdateCodeResponse>, Status> {
        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let proto::UpdateCodeRequest { code, used } = request.into_inner();
        let updated = self
            .service
            .update_used(&code, used, &cancel)
            .await
            .map_err(GrpcError::from)?;

        Ok(Response::new(proto::UpdateCodeResponse { updated }))
    }

    async fn delete_code(
        &self,
        request: Request<proto::DeleteCodeRequest>,
    ) -> Result<Response<proto::DeleteCodeResponse>, Status> {
        let cancel = self.request_token();
        let _guard = cancel.clone().drop_guard();

        let deleted = self
            .service
            .delete(&request.into_inner().code, &cancel)
            .await
            .map_err(GrpcError::from)?;

        Ok(Response::new(proto::DeleteCodeResponse { deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discount_generator::RandomGenerator;
    use discount_storage::InMemoryRepository;
    use tonic::Code;

    fn server() -> DiscountGrpcServer<InMemoryRepository, RandomGenerator> {
        DiscountGrpcServer::new(
            DiscountCodeService::new(InMemoryRepository::new(), RandomGenerator::new()),
            CancellationToken::new(),
        )
    }

    async fn generate(
        server: &DiscountGrpcServer<InMemoryRepository, RandomGenerator>,
        count: u32,
        length: u32,
    ) -> bool {
        server
            .generate_codes(Request::new(proto::GenerateCodesRequest { count, length }))
            .await
            .unwrap()
            .into_inner()
            .result
    }

    async fn redeem(
        server: &DiscountGrpcServer<InMemoryRepository, RandomGenerator>,
        code: &str,
    ) -> proto::RedeemResult {
        let response = server
            .redeem_code(Request::new(proto::RedeemCodeRequest {
                code: code.to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        response.result()
    }

    #[tokio::test]
    async fn generate_codes_rejects_out_of_range_requests() {
        let server = server();

        assert!(!generate(&server, 0, 8).await);
        assert!(!generate(&server, 2001, 8).await);
        assert!(!generate(&server, 10, 6).await);
        assert!(!generate(&server, 10, 9).await);
        assert!(server.service.repository().is_empty());
    }

    #[tokio::test]
    async fn generate_codes_succeeds_on_empty_store() {
        let server = server();

        assert!(generate(&server, 50, 8).await);
        assert_eq!(server.service.repository().len(), 50);
    }

    #[tokio::test]
    async fn redeem_code_reports_each_outcome() {
        let server = server();
        server
            .create_code(Request::new(proto::CreateCodeRequest {
                code: "FRESH77".into(),
            }))
            .await
            .unwrap();

        assert_eq!(redeem(&server, "ZZZZZZZ").await, proto::RedeemResult::Invalid);
        assert_eq!(redeem(&server, "short").await, proto::RedeemResult::Invalid);
        assert_eq!(redeem(&server, "fresh77").await, proto::RedeemResult::Ok);
        assert_eq!(redeem(&server, "FRESH77").await, proto::RedeemResult::AlreadyUsed);
    }

    #[tokio::test]
    async fn create_code_with_bad_length_is_invalid_argument() {
        let server = server();

        let status = server
            .create_code(Request::new(proto::CreateCodeRequest {
                code: "ABC123456".into(),
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("code length must be 7 or 8"));
    }

    #[tokio::test]
    async fn get_code_returns_not_found_for_missing_code() {
        let server = server();

        let status = server
            .get_code(Request::new(proto::GetCodeRequest {
                code: "MISSING".into(),
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn admin_lifecycle() {
        let server = server();

        let created = server
            .create_code(Request::new(proto::CreateCodeRequest {
                code: " abc1234 ".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(created.created);

        let updated = server
            .update_code(Request::new(proto::UpdateCodeRequest {
                code: "ABC1234".into(),
                used: true,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(updated.updated);

        let fetched = server
            .get_code(Request::new(proto::GetCodeRequest {
                code: "abc1234".into(),
            }))
            .await
            .unwrap()
            .into_inner()
            .code
            .unwrap();
        assert!(fetched.used);
        assert!(fetched.used_at.is_some());

        let page = server
            .list_codes(Request::new(proto::ListCodesRequest {
                page: 0,
                page_size: 0,
                only_unused: Some(true),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 50);
        assert_eq!(page.total, 0);

        let deleted = server
            .delete_code(Request::new(proto::DeleteCodeRequest {
                code: "ABC1234".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(deleted.deleted);
    }

    #[tokio::test]
    async fn shutdown_cancels_new_requests() {
        let shutdown = CancellationToken::new();
        let server = DiscountGrpcServer::new(
            DiscountCodeService::new(InMemoryRepository::new(), RandomGenerator::new()),
            shutdown.clone(),
        );
        shutdown.cancel();

        let status = server
            .generate_codes(Request::new(proto::GenerateCodesRequest {
                count: 10,
                length: 7,
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::Cancelled);
    }
}
