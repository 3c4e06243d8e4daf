use serde::Deserialize;

use crate::models::note::Note;

pub type ListNotesResponse = crate::routes::common::ListResponse<Note>;

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    pub association_id: i64,
    pub content: String,
}
