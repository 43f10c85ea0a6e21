pub mod context;
pub mod appointments;
pub mod medical_tickets;
pub mod prescriptions;

pub use context::VoiceContext;
pub use appointments::route_appointment_function;
pub use medical_tickets::route_medical_ticket_function;
pub use prescriptions::route_prescription_function;
