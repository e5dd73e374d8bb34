// Domain layer: core models and ports (interfaces). No SMTP or filesystem code here.

pub mod model;
pub mod ports;
