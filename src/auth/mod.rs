pub mod client_ip;
pub mod gate;
pub mod password;
pub mod service;
pub mod throttle;
