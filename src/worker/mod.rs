//! Offline cache manager.
//!
//! A [`ServiceWorker`] owns one cache generation. Install precaches the
//! static assets, activate purges every other generation, and fetch serves
//! markup, styles and scripts network first and everything else cache first.
//! A [`Registration`] holds the worker currently in control.

mod http;
mod lifecycle;
mod network;
mod storage;
mod strategy;

pub use http::{Request, Response};
pub use lifecycle::{
    ActivationReport, CacheGeneration, InstallReport, Registered, Registration, ServiceWorker,
    WorkerState,
};
pub use network::{Network, ReqwestNetwork};
pub use storage::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use strategy::{AssetClass, classify, is_document, normalize_scope, root_document};
