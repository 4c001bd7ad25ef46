pub(crate) mod logfile;
pub(crate) mod mft;
pub(crate) mod timeline;
pub(crate) mod usnjrnl;
