//! Generic REST handler factory and response envelope

mod crud;
mod envelope;

pub use crud::{
    create_one, crud_router, delete_one, get_all, get_one, list_documents, parse_id,
    patch_document, update_one,
};
pub use envelope::{Created, Envelope, EnvelopeStatus, NoContent};
