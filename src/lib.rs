pub mod config;
pub mod controls;
pub mod doctor;
pub mod gateway;
pub mod media;
pub mod player;
pub mod session;
pub mod subtitles;
pub mod tui;
pub mod wizard;
