//! DNS filter console
//!
//! Administrative web console for a DNS-filtering appliance. Settings panels
//! (DNS rewrites, alternate upstreams, client policy, login) are rendered
//! server side and bound to the appliance's `/control` REST API.
//!
//! # Architecture
//!
//! * `form` - headless form-state container, field adapters and validators
//! * `store` - process-wide state holding fetched server configuration and
//!   in-flight request flags, plus the backend transport
//! * `panels` - one controller per settings panel, bridging a store slice
//!   and a form
//! * `ddns` - DDNS helper script download links and script generation
//! * `web` - HTTP server, routing and templates
//! * `config` - console configuration

/// Console configuration file and command line overrides
pub mod config;

/// DDNS script links and generation
pub mod ddns;

/// Form-state container, field adapters and validation helpers
pub mod form;

/// Settings panel controllers
pub mod panels;

/// External store and backend transport
pub mod store;

/// Web server and templates for the console
pub mod web;
