//! # User Interface Module
//!
//! The translator's single window, served as one HTML page by an Actix web
//! server. The `routes` submodule renders the page and wires the "Translate"
//! button to [`crate::text_generator::Translator::translate`].

pub mod routes;
