// src/models/mod.rs

pub mod user;
pub mod session;
pub mod municipality;
pub mod scrape_run;
pub mod import_batch;
pub mod association;
pub mod description_section;
pub mod contact;
pub mod tag;
pub mod group;
pub mod note;
pub mod activity;
pub mod task;
