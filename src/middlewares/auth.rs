use crate::error::AppError;
use actix_web::http::Method;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

// 需要管理员令牌的路径前缀；其余路径（webhook、swagger）公开
struct ProtectedPaths {
    prefix_paths: Vec<&'static str>,
}

impl ProtectedPaths {
    fn new() -> Self {
        Self {
            prefix_paths: vec!["/api/v1/admin"],
        }
    }

    fn is_protected(&self, path: &str) -> bool {
        self.prefix_paths
            .iter()
            .any(|&prefix| path == prefix || path.starts_with(&format!("{prefix}/")))
    }
}

/// 管理接口的 Bearer 令牌校验
pub struct AdminAuthMiddleware {
    api_token: Rc<String>,
}

impl AdminAuthMiddleware {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: Rc::new(api_token.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddlewareService {
            service,
            api_token: self.api_token.clone(),
            protected_paths: ProtectedPaths::new(),
        }))
    }
}

pub struct AdminAuthMiddlewareService<S> {
    service: S,
    api_token: Rc<String>,
    protected_paths: ProtectedPaths,
}

impl<S> AdminAuthMiddlewareService<S> {
    fn check(&self, req: &ServiceRequest) -> Result<(), AppError> {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match token {
            None => Err(AppError::AuthError("Missing admin token".to_string())),
            // 未配置令牌时拒绝所有管理请求
            Some(_) if self.api_token.is_empty() => {
                Err(AppError::AuthError("Admin API is disabled".to_string()))
            }
            Some(token) if token == self.api_token.as_str() => Ok(()),
            Some(_) => Err(AppError::AuthError("Invalid admin token".to_string())),
        }
    }
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS || !self.protected_paths.is_protected(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        match self.check(&req) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(error) => Box::pin(async move { Err(error.into()) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test as actix_test, web};

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[test]
    fn test_protected_paths() {
        let paths = ProtectedPaths::new();
        assert!(paths.is_protected("/api/v1/admin"));
        assert!(paths.is_protected("/api/v1/admin/cards/3"));
        assert!(!paths.is_protected("/api/v1/administrator"));
        assert!(!paths.is_protected("/webhook/telegram"));
        assert!(!paths.is_protected("/swagger-ui/"));
    }

    #[actix_web::test]
    async fn test_admin_token_required() {
        let app = actix_test::init_service(
            App::new()
                .wrap(AdminAuthMiddleware::new("s3cret"))
                .route("/api/v1/admin/settings", web::get().to(ok))
                .route("/webhook/telegram", web::post().to(ok)),
        )
        .await;

        let missing = actix_test::TestRequest::get()
            .uri("/api/v1/admin/settings")
            .to_request();
        let Err(err) = actix_test::try_call_service(&app, missing).await else {
            panic!("request without token was accepted");
        };
        assert_eq!(
            err.as_response_error().error_response().status(),
            StatusCode::UNAUTHORIZED
        );

        let wrong = actix_test::TestRequest::get()
            .uri("/api/v1/admin/settings")
            .insert_header(("Authorization", "Bearer nope"))
            .to_request();
        assert!(actix_test::try_call_service(&app, wrong).await.is_err());

        let good = actix_test::TestRequest::get()
            .uri("/api/v1/admin/settings")
            .insert_header(("Authorization", "Bearer s3cret"))
            .to_request();
        let resp = actix_test::call_service(&app, good).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let public = actix_test::TestRequest::post().uri("/webhook/telegram").to_request();
        let resp = actix_test::call_service(&app, public).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_empty_token_disables_admin_api() {
        let app = actix_test::init_service(
            App::new()
                .wrap(AdminAuthMiddleware::new(""))
                .route("/api/v1/admin/settings", web::get().to(ok)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/settings")
            .insert_header(("Authorization", "Bearer "))
            .to_request();
        assert!(actix_test::try_call_service(&app, req).await.is_err());
    }
}
