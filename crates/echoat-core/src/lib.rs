//! echoat-core
//!
//! Core building blocks for echoat: messages that are echoed back at a
//! requested time, coordinated by any number of schedulers over one shared store.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskKey, Task, Submission, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, DeliverySink, Clock, KeyGenerator）
//! - **app**: アプリケーションロジック（Submitter, Scheduler, SchedulerGroup）
//! - **impls**: 実装（InMemoryTaskStore, StdoutSink など）
//! - **config**: 調整パラメータ

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::app::{Scheduler, SchedulerGroup, SchedulerObserver, SchedulerStatus, Submitter};
pub use self::config::{SchedulerConfig, SubmitConfig};
