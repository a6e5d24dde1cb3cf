pub mod google_auth;
pub mod google_sheets;
pub mod transfergo;
