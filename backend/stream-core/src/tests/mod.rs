mod config;
mod lifecycle;
mod support;
