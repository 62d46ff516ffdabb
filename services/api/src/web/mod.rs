pub mod middleware;
pub mod reservation;
pub mod rest;
pub mod state;

// Re-export the handlers so the binary can build the router from one place.
pub use middleware::resolve_caller;
pub use reservation::reserve_category_name_handler;
pub use rest::{
    create_document_handler, delete_document_handler, get_document_handler,
    update_document_handler,
};
