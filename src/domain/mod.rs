// Domain layer: core models, inbound request shapes and ports (interfaces).

pub mod model;
pub mod ports;
pub mod request;
