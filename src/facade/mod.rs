mod service;

pub use service::TravelService;
