mod endpoint;
mod target;
