pub mod auth;
pub mod companies;
pub mod competencies;
pub mod core;
pub mod dashboard;
pub mod export;
pub mod phase1;
pub mod phase2;
pub mod phase3;
pub mod users;
