//! Text-generation backends for Versa.
//!
//! All backends implement the `versa_core::Generator` trait.
//! [`build_from_config`] picks and configures one from `AppConfig`.

pub mod factory;
pub mod openai_compat;

pub use factory::build_from_config;
pub use openai_compat::OpenAiCompatGenerator;
