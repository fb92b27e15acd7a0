//! Certificate rendering contract and the batch issuer.

mod render;
mod service;

pub use render::{CertificateRenderer, RenderError, RenderRequest};
pub use service::{
    CertificateService, IssuanceReport, IssuanceSummary, IssueError, IssueFailure, IssueOptions,
    certificate_mail,
};
