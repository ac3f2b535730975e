pub mod gateway;
pub mod leads;
pub mod normalize;
pub mod payment_service;
pub mod utmify;

pub use payment_service::{PaymentService, RequestContext};
