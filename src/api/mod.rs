mod client;
pub use client::{
    Client, Endpoint, FetchError, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

mod model;
pub use model::*;

mod pages;
pub use pages::{DevicePages, MessagePages};
