mod helpers;
mod session;
mod websocket;
