// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{Notifier, PushGateway, QuizService},
    store::DynStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Config,
    pub quiz: QuizService,
}

impl AppState {
    /// Wires the services to their store and push gateway.
    pub fn new(store: DynStore, gateway: Arc<dyn PushGateway>, config: Config) -> Self {
        let notifier = Notifier::new(gateway);
        Self {
            quiz: QuizService::new(store.clone(), notifier),
            store,
            config,
        }
    }
}

impl FromRef<AppState> for DynStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for QuizService {
    fn from_ref(state: &AppState) -> Self {
        state.quiz.clone()
    }
}
