//! 认证服务库
//! 凭据校验、令牌签发、可撤销会话与请求鉴权

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod seed;
pub mod services;
pub mod session;
pub mod telemetry;
