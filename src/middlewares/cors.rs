use actix_cors::Cors;

/// 管理后台跨域：令牌放在 Authorization 头里，不需要 Cookie
pub fn create_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}
