//! Interpretador de test cases de UI declarativos.
//!
//! Um [`TestCase`](protocol::TestCase) em JSON é executado step a step
//! contra uma [`Page`](browser::Page) injetada pelo host, e o resultado sai
//! como um [`RunReport`](protocol::RunReport).

pub mod assertions;
pub mod batch;
pub mod browser;
pub mod config;
pub mod context;
pub mod custom;
pub mod engine;
pub mod errors;
pub mod executors;
pub mod loader;
pub mod protocol;
pub mod selector;
pub mod telemetry;
pub mod validation;
