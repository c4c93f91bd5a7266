mod scripted_transport;

pub(crate) use scripted_transport::*;
