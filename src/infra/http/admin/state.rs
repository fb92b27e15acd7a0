use std::sync::Arc;

use crate::application::{certificates::CertificateService, events::EventService};
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct AdminState {
    pub db: Arc<PostgresRepositories>,
    pub events: Arc<EventService>,
    pub certificates: Arc<CertificateService>,
}
