
mod chunking;
mod locking;
mod provisioning;
mod settings_api;
mod sharing;
mod spaces;
mod webdav;
