pub mod check;
pub mod roles;
pub mod run;
