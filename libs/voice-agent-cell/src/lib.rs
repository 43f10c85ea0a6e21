pub mod models;
pub mod handlers;
pub mod router;
pub mod services;

pub use models::*;
pub use router::*;
pub use services::{
    route_appointment_function, route_medical_ticket_function, route_prescription_function, VoiceContext,
};
