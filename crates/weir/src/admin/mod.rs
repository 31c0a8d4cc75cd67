//! Generic CRUD admin over registered database models.

mod site;

pub use site::{AdminSite, ModelView, RowPage, default_views};
