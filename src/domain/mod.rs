// Domain layer: shipping settings model and ports. No I/O here.

pub mod model;
pub mod ports;
