pub mod answer_admin;
pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod pagination;
pub mod quota;
pub mod respondent;
pub mod statistics;
pub mod store;
pub mod submission;
