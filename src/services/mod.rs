// src/services/mod.rs

pub mod notification;
pub mod quiz_service;

pub use notification::{FcmGateway, NoopGateway, Notifier, PushGateway};
pub use quiz_service::QuizService;
