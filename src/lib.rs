#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod metrics;

// Хранилище символов: scratch-файлы со страничным кешем и «райдеры» поверх них
pub mod scratch; // src/scratch/{mod,page}.rs
pub mod rider;
pub mod run;

// Фоновая выгрузка большого документа на диск
pub mod swap;

// Сам документ (цепочка run'ов)
pub mod store; // src/store/{mod,core,edit,reconcile,swap,check,shared}.rs

// Удобные реэкспорты
pub use config::{StoreBuilder, StoreConfig};
pub use metrics::MetricsSnapshot;
pub use store::{ReconcileSummary, SharedTextStore, StoreStats, TextStore};
pub use swap::SwapState;
