pub mod status;
pub mod transcode;
